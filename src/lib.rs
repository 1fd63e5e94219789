//! lanzou-resolver - direct links for Lanzou cloud shares
//!
//! Turns a share identifier (and optional password) into the short-lived
//! storage URL of the shared file, without a browser and without running
//! the service's page scripts.

pub mod config;
pub mod resolver;
pub mod server;
pub mod stats;

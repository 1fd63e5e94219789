//! Share-link resolution
//!
//! A share identifier is turned into a direct file URL by impersonating one
//! of the service's two page flows (desktop or mobile), lifting the
//! obfuscated request parameters out of the served markup, and following the
//! signed-link exchange up to the storage redirect. Desktop is tried first;
//! mobile is the fallback.
//!
//! Page scripts are never executed. Parameters are read through a fixed set
//! of patterns and a closed literal grammar.

mod client;
mod derive;
mod error;
mod extract;
mod link;
mod literal;
mod probe;
mod share;

#[cfg(test)]
pub(crate) mod mock_host;

pub use client::{ClientProfile, HostClient, Page};
pub use derive::{derive_parameters, ExtractedParameters};
pub use error::{ErrorKind, LinkError, ProbeError, ResolutionError, ResolveError};
pub use extract::Pattern;
pub use link::{ResolvedLink, Resolver};
pub use literal::{Literal, LiteralError, LiteralValue, ObjectLiteral};
pub use probe::{format_size, FileInfo};
pub use share::{parse_share_input, ClientVariant, ShareRequest, MOBILE_PREFIX};

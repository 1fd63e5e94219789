//! Signed-link exchange and client-variant failover

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::client::{HostClient, Page};
use super::derive::{derive_parameters, ExtractedParameters};
use super::error::{LinkError, ProbeError, ResolutionError, ResolveError};
use super::probe::{self, FileInfo};
use super::share::{ClientVariant, ShareRequest};
use crate::config::ResolverConfig;

const AJAX_PATH: &str = "ajaxm.php";

/// Direct, redirect-terminal file address.
///
/// Carries a short-lived signature; use it right away and do not store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLink {
    pub url: String,
}

/// Reply of the ajax endpoint: `{"zt":1,"dom":"https://...","url":"?...","inf":...}`
#[derive(Debug, Deserialize)]
struct AjaxResult {
    zt: Option<Value>,
    dom: Option<String>,
    url: Option<String>,
    inf: Option<Value>,
}

impl AjaxResult {
    /// `{dom}/file/{url}`, the signed URL that redirects to storage
    fn signed_url(&self) -> Result<String, ResolveError> {
        let accepted = self
            .zt
            .as_ref()
            .map_or(true, |zt| zt.as_i64() == Some(1) || zt.as_str() == Some("1"));
        match (&self.dom, &self.url) {
            (Some(dom), Some(url)) if accepted => {
                Ok(format!("{}/file/{}", dom.trim_end_matches('/'), url))
            }
            _ => Err(ResolveError::Rejected(self.message())),
        }
    }

    fn message(&self) -> String {
        match &self.inf {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | None => "no message".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Resolves share identifiers into direct links
#[derive(Debug, Clone)]
pub struct Resolver {
    client: HostClient,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Ok(Self {
            client: HostClient::new(config)?,
        })
    }

    pub fn client(&self) -> &HostClient {
        &self.client
    }

    /// Resolve through the request's variant only
    pub async fn resolve(&self, request: &ShareRequest) -> Result<ResolvedLink, ResolveError> {
        let params = derive_parameters(&self.client, request).await?;

        let page = match params {
            ExtractedParameters::DirectUrl(url) => {
                debug!("Mobile page gave signed url for {}", request.identifier);
                self.client.get(&url, request.variant).await?
            }
            params => {
                let body = params.form_body()?.unwrap_or_default();
                let reply = self
                    .client
                    .post(&self.client.url(AJAX_PATH), body, request.variant)
                    .await?;
                let signed = reply.json::<AjaxResult>()?.signed_url()?;
                debug!("Signed url for {}: {}", request.identifier, signed);
                self.client.get(&signed, request.variant).await?
            }
        };

        redirect_target(&page)
    }

    /// Try every client variant in failover order
    pub async fn resolve_link(
        &self,
        identifier: &str,
        password: Option<&str>,
    ) -> Result<ResolvedLink, LinkError> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.resolve_link_until(identifier, password, cancel_rx).await
    }

    /// Like [`Resolver::resolve_link`], aborting once `cancel` turns `true`.
    ///
    /// Cancellation drops the in-flight request and skips the remaining
    /// variants.
    pub async fn resolve_link_until(
        &self,
        identifier: &str,
        password: Option<&str>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ResolvedLink, LinkError> {
        let mut failures = Vec::new();

        for variant in ClientVariant::FAILOVER_ORDER {
            if *cancel.borrow() {
                return Err(LinkError::Cancelled);
            }

            let request = ShareRequest::new(identifier, password, variant);
            let outcome = tokio::select! {
                outcome = self.resolve(&request) => outcome,
                _ = cancelled(&mut cancel) => Err(ResolveError::Cancelled),
            };

            match outcome {
                Ok(link) => {
                    info!("Resolved {} via {} client", identifier, variant);
                    return Ok(link);
                }
                Err(ResolveError::Cancelled) => {
                    info!("Resolution of {} cancelled during {} attempt", identifier, variant);
                    return Err(LinkError::Cancelled);
                }
                Err(cause) => {
                    warn!("{} client failed for {}: {}", variant, identifier, cause);
                    failures.push(ResolutionError { variant, cause });
                }
            }
        }

        Err(LinkError::Failover(failures))
    }

    /// HEAD the resolved link for its name and size
    pub async fn probe(&self, url: &str) -> Result<FileInfo, ProbeError> {
        probe::probe(&self.client, url).await
    }
}

/// Completes once the flag is set; never completes if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn redirect_target(page: &Page) -> Result<ResolvedLink, ResolveError> {
    match page.location() {
        Some(location) if location.starts_with("http") => Ok(ResolvedLink {
            url: location.to_string(),
        }),
        Some(location) => Err(ResolveError::Unresolved(format!(
            "redirect target {:?} is not a web address",
            location
        ))),
        None => Err(ResolveError::Unresolved(format!(
            "HTTP {} without a redirect target",
            page.status.as_u16()
        ))),
    }
}

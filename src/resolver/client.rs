//! HTTP access to the hosting service
//!
//! Requests carry the headers of one client variant and never follow
//! redirects: for several calls the `Location` header is the payload.

use anyhow::{Context, Result};
use reqwest::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, REFERER,
    USER_AGENT,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{ProbeError, ResolveError};
use super::share::ClientVariant;
use crate::config::ResolverConfig;

const LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36 Edg/96.0.1054.62";

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; Pixel 2 Build/OPD3.170816.012) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.104 Mobile Safari/537.36";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Headers a client variant presents to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub accept_language: &'static str,
    pub referer: String,
    pub user_agent: &'static str,
}

impl ClientProfile {
    pub fn for_variant(variant: ClientVariant, origin: &str) -> Self {
        let user_agent = match variant {
            ClientVariant::Desktop => DESKTOP_USER_AGENT,
            ClientVariant::Mobile => MOBILE_USER_AGENT,
        };

        Self {
            accept_language: LANGUAGE,
            referer: origin.to_string(),
            user_agent,
        }
    }

    fn headers(&self) -> std::result::Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(self.accept_language));
        headers.insert(REFERER, HeaderValue::from_str(&self.referer)?);
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent));
        Ok(headers)
    }
}

/// A fetched response, read in full
#[derive(Debug)]
pub struct Page {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Page {
    /// Redirect target, if the response carries one
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION)?.to_str().ok()
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, ResolveError> {
        serde_json::from_str(&self.body).map_err(|e| {
            ResolveError::UnexpectedResponse(format!("{} in {}", e, truncate(&self.body)))
        })
    }
}

/// Client for the hosting service. Cheap to clone; holds no per-request state.
#[derive(Debug, Clone)]
pub struct HostClient {
    client: Client,
    origin: String,
    desktop: HeaderMap,
    mobile: HeaderMap,
}

impl HostClient {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let origin = config.origin.trim_end_matches('/').to_string();
        let desktop = ClientProfile::for_variant(ClientVariant::Desktop, &origin)
            .headers()
            .context("Invalid desktop client headers")?;
        let mobile = ClientProfile::for_variant(ClientVariant::Mobile, &origin)
            .headers()
            .context("Invalid mobile client headers")?;

        Ok(Self {
            client,
            origin,
            desktop,
            mobile,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Absolute URL for a path on the service; absolute inputs pass through
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.origin, path.trim_start_matches('/'))
        }
    }

    fn headers(&self, variant: ClientVariant) -> HeaderMap {
        match variant {
            ClientVariant::Desktop => self.desktop.clone(),
            ClientVariant::Mobile => self.mobile.clone(),
        }
    }

    pub async fn get(&self, url: &str, variant: ClientVariant) -> std::result::Result<Page, ResolveError> {
        debug!("GET {} ({})", url, variant);

        let response = self
            .client
            .get(url)
            .headers(self.headers(variant))
            .send()
            .await
            .map_err(|error| ResolveError::Network {
                url: url.to_string(),
                error,
            })?;

        read_page(url, response).await
    }

    /// POST a form-encoded body
    pub async fn post(
        &self,
        url: &str,
        body: String,
        variant: ClientVariant,
    ) -> std::result::Result<Page, ResolveError> {
        debug!("POST {} ({}, {} bytes)", url, variant, body.len());

        let response = self
            .client
            .post(url)
            .headers(self.headers(variant))
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(body)
            .send()
            .await
            .map_err(|error| ResolveError::Network {
                url: url.to_string(),
                error,
            })?;

        read_page(url, response).await
    }

    /// Header-only request without variant headers, for the metadata probe
    pub async fn head(&self, url: &str) -> std::result::Result<HeaderMap, ProbeError> {
        debug!("HEAD {}", url);

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|error| ProbeError::Network {
                url: url.to_string(),
                error,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.headers().clone())
    }
}

async fn read_page(url: &str, response: Response) -> std::result::Result<Page, ResolveError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(ResolveError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let headers = response.headers().clone();
    let body = response.text().await.map_err(|error| ResolveError::Network {
        url: url.to_string(),
        error,
    })?;

    Ok(Page {
        status,
        headers,
        body,
    })
}

/// Truncate a response body for error messages
fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None if trimmed.is_empty() => "empty body".to_string(),
        None => trimmed.to_string(),
    }
}

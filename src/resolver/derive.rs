//! Request parameter derivation
//!
//! Each client variant has its own page flow, and each flow differs again for
//! password-protected shares:
//!
//! | variant | password | flow                                                       |
//! |---------|----------|------------------------------------------------------------|
//! | desktop | yes      | share page -> `data : '<token>'+pwd`                       |
//! | desktop | no       | share page -> iframe -> framed page -> `data : {...}`      |
//! | mobile  | yes      | (share page -> `tp/<id>`) -> mobile page -> `data : {...}` |
//! | mobile  | no       | (share page -> `tp/<id>`) -> mobile page -> url + query    |
//!
//! The page-level functions are pure so they can be checked against saved
//! markup; the async entry point only fetches.

use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::debug;

use super::client::HostClient;
use super::error::ResolveError;
use super::extract::{find_first, require, Pattern};
use super::literal::{capture_assignment, capture_literal, lookup_assignment, Literal, ObjectLiteral};
use super::share::{ClientVariant, ShareRequest};

/// Minimum length of a framed-page path, matching the regex contract
const MIN_FRAME_SRC_LEN: usize = 20;

/// What a variant's page flow produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedParameters {
    /// Form fields for the ajax endpoint, in page order
    Fields(Vec<(String, String)>),
    /// Ready-made form body for the ajax endpoint
    Body(String),
    /// Complete URL that redirects to the file (mobile, no password)
    DirectUrl(String),
}

impl ExtractedParameters {
    /// Form body for the ajax endpoint, or `None` for a direct URL
    pub fn form_body(&self) -> Result<Option<String>, ResolveError> {
        match self {
            ExtractedParameters::Fields(fields) => serde_urlencoded::to_string(fields)
                .map(Some)
                .map_err(|e| ResolveError::UnexpectedResponse(format!("unencodable form field: {}", e))),
            ExtractedParameters::Body(body) => Ok(Some(body.clone())),
            ExtractedParameters::DirectUrl(_) => Ok(None),
        }
    }
}

/// Run the page flow for the request's variant
pub async fn derive_parameters(
    client: &HostClient,
    request: &ShareRequest,
) -> Result<ExtractedParameters, ResolveError> {
    match request.variant {
        ClientVariant::Desktop => derive_desktop(client, request).await,
        ClientVariant::Mobile => derive_mobile(client, request).await,
    }
}

async fn derive_desktop(
    client: &HostClient,
    request: &ShareRequest,
) -> Result<ExtractedParameters, ResolveError> {
    let page = client
        .get(&client.url(&request.identifier), ClientVariant::Desktop)
        .await?;

    match request.password.as_deref() {
        Some(password) => desktop_password_params(&page.body, password),
        None => {
            let frame = frame_source(&page.body)?;
            let framed = client.get(&client.url(&frame), ClientVariant::Desktop).await?;
            desktop_frame_params(&framed.body)
        }
    }
}

async fn derive_mobile(
    client: &HostClient,
    request: &ShareRequest,
) -> Result<ExtractedParameters, ResolveError> {
    let id = if request.has_mobile_prefix() {
        request.identifier.clone()
    } else {
        let page = client
            .get(&client.url(&request.identifier), ClientVariant::Mobile)
            .await?;
        let id = mobile_share_id(&page.body)?;
        debug!("{} maps to mobile share {}", request.identifier, id);
        id
    };

    let page = client
        .get(&client.url(&format!("tp/{}", id)), ClientVariant::Mobile)
        .await?;

    match request.password.as_deref() {
        Some(password) => mobile_password_params(&page.body, password),
        None => mobile_direct_url(&page.body),
    }
}

/// Desktop, password: the page holds the whole form body minus the password
pub fn desktop_password_params(page: &str, password: &str) -> Result<ExtractedParameters, ResolveError> {
    let token = capture_literal(Pattern::PasswordToken, page)
        .ok_or(ResolveError::PatternMiss(Pattern::PasswordToken.name()))?;
    Ok(ExtractedParameters::Body(format!(
        "{}{}",
        token.as_str(),
        urlencoding::encode(password)
    )))
}

/// Desktop, no password: path of the framed download page
pub fn frame_source(page: &str) -> Result<String, ResolveError> {
    // Method 1: the iframe as the service writes it
    if let Some(src) = find_first(Pattern::FrameSource, page) {
        return Ok(src.to_string());
    }

    // Method 2: any iframe with a long enough src, whatever its attribute order
    let document = Html::parse_document(page);
    if let Ok(selector) = Selector::parse("iframe[src]") {
        for frame in document.select(&selector) {
            if let Some(src) = frame.value().attr("src") {
                if src.len() >= MIN_FRAME_SRC_LEN {
                    debug!("Found frame source via iframe selector");
                    return Ok(src.to_string());
                }
            }
        }
    }

    Err(ResolveError::PatternMiss(Pattern::FrameSource.name()))
}

/// Desktop, no password: rebuild the ajax payload of the framed page.
///
/// The two sign literals are optional enrichment. Names the object refers to
/// are bound to them first and looked up in the page second; only a name that
/// stays unbound fails the derivation.
pub fn desktop_frame_params(page: &str) -> Result<ExtractedParameters, ResolveError> {
    let object = ObjectLiteral::parse(require(Pattern::DataObject, page)?)?;

    let mut captured: HashMap<String, Literal> = HashMap::new();
    for pattern in [Pattern::ShortSign, Pattern::LongSign] {
        match capture_assignment(pattern, page) {
            Some(assignment) => {
                captured.insert(assignment.name, assignment.value);
            }
            None => debug!("No {} in framed page, continuing without it", pattern.name()),
        }
    }

    let fields = object.bind(|name| {
        captured
            .get(name)
            .cloned()
            .or_else(|| lookup_assignment(page, name))
            .map(Literal::into_string)
    })?;

    Ok(ExtractedParameters::Fields(fields))
}

/// Mobile, identifier without the mobile prefix: the mobile share id
pub fn mobile_share_id(page: &str) -> Result<String, ResolveError> {
    require(Pattern::MobileRedirect, page).map(str::to_string)
}

/// Mobile, password: `pwd` in the payload is the caller's password
pub fn mobile_password_params(page: &str, password: &str) -> Result<ExtractedParameters, ResolveError> {
    let object = ObjectLiteral::parse(require(Pattern::DataObject, page)?)?;

    let fields = object.bind(|name| {
        if name == "pwd" {
            Some(password.to_string())
        } else {
            lookup_assignment(page, name).map(Literal::into_string)
        }
    })?;

    Ok(ExtractedParameters::Fields(fields))
}

/// Mobile, no password: the page carries the signed URL in two pieces
pub fn mobile_direct_url(page: &str) -> Result<ExtractedParameters, ResolveError> {
    let prefix = capture_literal(Pattern::UrlPrefix, page)
        .ok_or(ResolveError::PatternMiss(Pattern::UrlPrefix.name()))?;
    let suffix = capture_literal(Pattern::QuerySuffix, page)
        .ok_or(ResolveError::PatternMiss(Pattern::QuerySuffix.name()))?;

    Ok(ExtractedParameters::DirectUrl(prefix.concat(&suffix)))
}

//! JSON bodies of the endpoint

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::DEFAULT_ORIGIN;
use crate::resolver::FileInfo;

pub const MSG_SUCCESS: &str = "success";
pub const MSG_INVALID_LINK: &str = "invalid link";
pub const MSG_ALL_FAILED: &str = "link not match pwd, or lanzou has changed their webpage";

/// `{code, msg, data?, examples?, detail?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub code: i32,
    pub msg: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LinkData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Resolved link plus whatever the probe could tell about it
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LinkData {
    pub name: Option<String>,
    pub size: Option<String>,
    pub url: String,
}

impl LinkData {
    /// Link without metadata, used when the probe failed
    pub fn bare(url: String) -> Self {
        Self {
            name: None,
            size: None,
            url,
        }
    }
}

impl From<FileInfo> for LinkData {
    fn from(info: FileInfo) -> Self {
        Self {
            name: Some(info.name),
            size: Some(info.size),
            url: info.url,
        }
    }
}

impl ApiResponse {
    pub fn success(data: LinkData) -> Self {
        Self {
            code: 200,
            msg: MSG_SUCCESS,
            data: Some(data),
            examples: None,
            detail: None,
        }
    }

    /// `code -1`, with usage examples rooted at `base_url`
    pub fn invalid_link(base_url: &str) -> Self {
        Self {
            code: -1,
            msg: MSG_INVALID_LINK,
            data: None,
            examples: Some(usage_examples(base_url)),
            detail: None,
        }
    }

    /// `code -2`, carrying every variant's failure
    pub fn all_failed(detail: String) -> Self {
        Self {
            code: -2,
            msg: MSG_ALL_FAILED,
            data: None,
            examples: None,
            detail: Some(detail),
        }
    }

    fn status(&self) -> StatusCode {
        if self.code == -2 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

fn usage_examples(base_url: &str) -> Vec<String> {
    vec![
        format!("{}?url=i4wk2oh&type=down", base_url),
        format!("{}?url={}/i4wk2oh&type=down", base_url, DEFAULT_ORIGIN),
        format!("{}?url={}/i7tit9c&pwd=6svq&type=json", base_url, DEFAULT_ORIGIN),
    ]
}

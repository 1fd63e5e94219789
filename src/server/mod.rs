//! HTTP endpoint
//!
//! `GET /?url=<share>&pwd=<password>&type=<down|json>` on any path. `type=down`
//! redirects to the resolved link; anything else answers with JSON.

mod response;

pub use response::{ApiResponse, LinkData};

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{OriginalUri, RawQuery, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::resolver::{parse_share_input, LinkError, Resolver};
use crate::stats::{CounterSink, Outcome};

/// Shared by every request
#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
    pub counters: Arc<dyn CounterSink>,
}

#[derive(Debug, Default, Deserialize)]
struct LinkQuery {
    url: Option<String>,
    pwd: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl LinkQuery {
    /// Lenient parse; an unreadable query is treated as empty
    fn parse(raw: Option<&str>) -> Self {
        serde_urlencoded::from_str(raw.unwrap_or_default()).unwrap_or_default()
    }

    fn wants_redirect(&self) -> bool {
        self.kind.as_deref() == Some("down")
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle))
        .route("/{*path}", get(handle))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Serve until `shutdown` completes
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

async fn handle(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let base_url = format!("http://{}{}", host, uri.path());
    let query = LinkQuery::parse(query.as_deref());

    respond(state, base_url, query)
        .instrument(info_span!("request", id = %Uuid::new_v4()))
        .await
}

async fn respond(state: AppState, base_url: String, query: LinkQuery) -> Response {
    let identifier = match parse_share_input(query.url.as_deref().unwrap_or_default()) {
        Ok(id) => id,
        Err(e) => {
            info!("{}", e);
            state.counters.notify(Outcome::InvalidInput);
            return ApiResponse::invalid_link(&base_url).into_response();
        }
    };

    let link = match state.resolver.resolve_link(&identifier, query.pwd.as_deref()).await {
        Ok(link) => link,
        Err(LinkError::Input(input)) => {
            state.counters.notify(Outcome::InvalidInput);
            info!("Invalid share input: {}", input);
            return ApiResponse::invalid_link(&base_url).into_response();
        }
        Err(e) => {
            warn!("{}: {}", identifier, e);
            state.counters.notify(Outcome::AllVariantsFailed);
            return ApiResponse::all_failed(e.to_string()).into_response();
        }
    };

    state.counters.notify(Outcome::Success);

    if query.wants_redirect() {
        return (StatusCode::FOUND, [(LOCATION, link.url)]).into_response();
    }

    let data = match state.resolver.probe(&link.url).await {
        Ok(info) => LinkData::from(info),
        Err(e) => {
            warn!("Probe failed for {}: {}", identifier, e);
            LinkData::bare(link.url)
        }
    };

    ApiResponse::success(data).into_response()
}

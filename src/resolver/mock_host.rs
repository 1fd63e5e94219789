//! In-process stand-in for the hosting service, for network-free tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, LOCATION, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::share::ClientVariant;
use crate::config::ResolverConfig;

/// Public share, no password
pub(crate) const PLAIN_ID: &str = "iPlain01";
/// Password-protected share
pub(crate) const SECRET_ID: &str = "iSecret1";
pub(crate) const SECRET_PWD: &str = "6svq";
/// Identifier without the mobile prefix; the mobile page redirects to `PLAIN_ID`
pub(crate) const LEGACY_ID: &str = "dkbdv7";
/// Desktop page no longer matches; only the mobile flow works
pub(crate) const MOBILE_ONLY_ID: &str = "iMobOnly";
/// Neither page matches
pub(crate) const BROKEN_ID: &str = "iBroken1";
/// Every page for this share hangs
pub(crate) const SLOW_ID: &str = "iSlow001";

pub(crate) const FILE_NAME: &str = "demo app.apk";
pub(crate) const FILE_BYTES: usize = 1_572_864;

const SIGNED_QUERY: &str = "?BmBUaFxrBzZVXlFqVmEOblQ2AjpSNgEiVjYLMQ";

/// Markup in the shape the service serves it
pub(crate) mod pages {
    pub(crate) const DESKTOP_PASSWORD_SIGN: &str = "VjFXaQo4AjNRWFtuAzBSa1I_bVcZVyFS";
    pub(crate) const FRAME_SIGN: &str = "BmBUaFxrBzZVXlFqVmEOblQ2AjpSNgEiVjYLMQ_c";
    pub(crate) const MOBILE_SIGN: &str = "UDZRaQ8_ADZXWFFvCjQBalZkUmxUMFdi";
    pub(crate) const MOBILE_QUERY: &str = "?AmUHPlhvAjNWXQY5BDMAaVs1Bm8CYAc2";
    pub(crate) const FRAME_PATH: &str = "/fn?UzUBbVpqBzQCC1RiAjdTaFY6";

    pub(crate) const DESKTOP_SHARE: &str = concat!(
        "<div class=\"ifr\">\n",
        "<iframe class=\"ifr2\" name=\"1634782425\" src=\"/fn?UzUBbVpqBzQCC1RiAjdTaFY6\" frameborder=\"0\" scrolling=\"no\"></iframe>\n",
        "</div>\n",
    );

    pub(crate) const DESKTOP_PASSWORD: &str = concat!(
        "<script type=\"text/javascript\">\n",
        "\t\tfunction down_p(){\n",
        "\t\tvar pwd = document.getElementById('pwd').value;\n",
        "\t\t$.ajax({\n",
        "\t\t\ttype : 'post',\n",
        "\t\t\turl : '/ajaxm.php',\n",
        "\t\t\tdata : 'action=downprocess&sign=VjFXaQo4AjNRWFtuAzBSa1I_bVcZVyFS&p='+pwd,\n",
        "\t\t\tdataType : 'json',\n",
        "\t\t});\n",
        "\t\t}\n",
        "</script>\n",
    );

    pub(crate) const FRAME: &str = concat!(
        "<script type=\"text/javascript\">\n",
        "\t\tvar ajaxdata = '?ctdf';\n",
        "\t\t//var wp_sign = 'AzQBPAk_DzJRWQBsAzAHOgwxV2kAM1c1ADNReQ';\n",
        "\t\tvar wp_sign = 'BmBUaFxrBzZVXlFqVmEOblQ2AjpSNgEiVjYLMQ_c';\n",
        "\t\tvar ciucjdsdc = '';\n",
        "\t\tvar aihidcms = 'PVcW';\n",
        "\t\t$.ajax({\n",
        "\t\t\ttype : 'post',\n",
        "\t\t\turl : '/ajaxm.php',\n",
        "\t\t\tdata : { 'action':'downprocess','signs':ajaxdata,'sign':wp_sign,'ves':1,'websign':ciucjdsdc,'websignkey':aihidcms },\n",
        "\t\t\tdataType : 'json',\n",
        "\t\t});\n",
        "</script>\n",
    );

    pub(crate) const MOBILE_REDIRECT: &str = concat!(
        "<script type=\"text/javascript\">\n",
        "\t\tvar link = 'tp/iPlain01';\n",
        "\t\tlocation.href = link;\n",
        "</script>\n",
    );

    pub(crate) const MOBILE_PASSWORD: &str = concat!(
        "<script type=\"text/javascript\">\n",
        "\t\tfunction down_p(){\n",
        "\t\tvar pwd = $('#pwd').val();\n",
        "\t\t$.ajax({\n",
        "\t\t\ttype : 'post',\n",
        "\t\t\turl : '/ajaxm.php',\n",
        "\t\t\tdata : { 'action':'downprocess','sign':'UDZRaQ8_ADZXWFFvCjQBalZkUmxUMFdi','p':pwd },\n",
        "\t\t\tdataType : 'json',\n",
        "\t\t});\n",
        "\t\t}\n",
        "</script>\n",
    );

    pub(crate) const NOT_FOUND: &str =
        "<div class=\"off\"><div class=\"off0\"><div class=\"off1\"></div></div>来晚啦...文件取消分享了</div>\n";

    /// Mobile page of a public share whose storage lives under `origin`
    pub(crate) fn mobile(origin: &str) -> String {
        format!(
            concat!(
                "<script type=\"text/javascript\">\n",
                "\t\tvar urlpt = '{}/file/';\n",
                "\t\tvar tedomain = '{}';\n",
                "\t\tdocument.getElementById('go').href = urlpt + tedomain;\n",
                "</script>\n",
            ),
            origin, MOBILE_QUERY
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hit {
    pub path: String,
    pub variant: ClientVariant,
}

#[derive(Clone)]
struct MockState {
    origin: String,
    storage_origin: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

/// Running mock host. Stops when dropped.
pub(crate) struct MockHost {
    pub origin: String,
    storage_origin: String,
    hits: Arc<Mutex<Vec<Hit>>>,
    task: JoinHandle<()>,
}

impl MockHost {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Storage answers under a different host name, like the real CDN
        let state = MockState {
            origin: format!("http://127.0.0.1:{}", port),
            storage_origin: format!("http://localhost:{}", port),
            hits: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/fn", get(frame))
            .route("/ajaxm.php", post(ajax))
            .route("/file/", get(file))
            .route("/storage/{name}", get(storage))
            .route("/bare", get(bare))
            .route("/tp/{id}", get(mobile_share))
            .route("/{id}", get(share))
            .layer(middleware::from_fn_with_state(state.clone(), track))
            .with_state(state.clone());

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            origin: state.origin,
            storage_origin: state.storage_origin,
            hits: state.hits,
            task,
        }
    }

    pub(crate) fn config(&self) -> ResolverConfig {
        ResolverConfig {
            origin: self.origin.clone(),
            ..ResolverConfig::default()
        }
    }

    pub(crate) fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    /// Where every successful resolution ends up
    pub(crate) fn file_url(&self) -> String {
        format!("{}/storage/{}", self.storage_origin, urlencoding::encode(FILE_NAME))
    }

    /// A file URL whose response lacks `Content-Disposition`
    pub(crate) fn bare_file_url(&self) -> String {
        format!("{}/bare", self.storage_origin)
    }
}

impl Drop for MockHost {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn variant_of(headers: &HeaderMap) -> ClientVariant {
    let mobile = headers
        .get(USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|ua| ua.contains("Mobile"))
        .unwrap_or(false);
    if mobile {
        ClientVariant::Mobile
    } else {
        ClientVariant::Desktop
    }
}

async fn track(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let hit = Hit {
        path: request.uri().path().to_string(),
        variant: variant_of(request.headers()),
    };
    state.hits.lock().unwrap().push(hit);
    next.run(request).await
}

async fn stall() {
    tokio::time::sleep(Duration::from_secs(30)).await;
}

async fn share(Path(id): Path<String>, headers: HeaderMap) -> Html<&'static str> {
    if id == SLOW_ID {
        stall().await;
    }

    let page = match (variant_of(&headers), id.as_str()) {
        (ClientVariant::Desktop, PLAIN_ID | LEGACY_ID) => pages::DESKTOP_SHARE,
        (ClientVariant::Desktop, SECRET_ID) => pages::DESKTOP_PASSWORD,
        (ClientVariant::Mobile, LEGACY_ID) => pages::MOBILE_REDIRECT,
        _ => pages::NOT_FOUND,
    };
    Html(page)
}

async fn frame() -> Html<&'static str> {
    Html(pages::FRAME)
}

async fn mobile_share(State(state): State<MockState>, Path(id): Path<String>) -> Html<String> {
    if id == SLOW_ID {
        stall().await;
    }

    let page = match id.as_str() {
        PLAIN_ID | MOBILE_ONLY_ID => pages::mobile(&state.origin),
        SECRET_ID => pages::MOBILE_PASSWORD.to_string(),
        _ => pages::NOT_FOUND.to_string(),
    };
    Html(page)
}

async fn ajax(State(state): State<MockState>, body: String) -> Json<serde_json::Value> {
    let form: HashMap<String, String> = serde_urlencoded::from_str(&body).unwrap_or_default();
    let field = |name: &str| form.get(name).map(String::as_str);

    let accepted = if form.contains_key("p") {
        field("p") == Some(SECRET_PWD)
            && matches!(
                field("sign"),
                Some(pages::DESKTOP_PASSWORD_SIGN | pages::MOBILE_SIGN)
            )
    } else {
        field("action") == Some("downprocess")
            && field("signs") == Some("?ctdf")
            && field("sign") == Some(pages::FRAME_SIGN)
            && field("websignkey") == Some("PVcW")
    };

    if accepted {
        Json(json!({ "zt": 1, "dom": state.origin, "url": SIGNED_QUERY, "inf": 0 }))
    } else {
        Json(json!({ "zt": 0, "inf": "密码不正确" }))
    }
}

async fn file(State(state): State<MockState>) -> Response {
    let target = format!("{}/storage/{}", state.storage_origin, urlencoding::encode(FILE_NAME));
    (StatusCode::FOUND, [(LOCATION, target)]).into_response()
}

async fn storage() -> Response {
    (
        [
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename= {}", urlencoding::encode(FILE_NAME)),
            ),
            (CONTENT_LENGTH, FILE_BYTES.to_string()),
        ],
        vec![0u8; FILE_BYTES],
    )
        .into_response()
}

async fn bare() -> Response {
    ([(CONTENT_LENGTH, "4".to_string())], "data").into_response()
}

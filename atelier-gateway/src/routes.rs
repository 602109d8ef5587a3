//! Axum route handlers for the workbench gateway.

use std::path::Path;

use axum::extract::{Path as RoutePath, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use atelier_core::{Query, SessionOptions, UserInfo};

use crate::assets;
use crate::error::GatewayError;
use crate::server::{AppState, SharedState};
use crate::settings::GatewaySettings;
use crate::start_path::{get_first_path, StartPathCandidate};

/// Build the application router over the shared gateway state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/resource", get(resource))
        .route("/vscode-remote-resource", get(resource))
        .route("/webview", get(webview_index))
        .route("/webview/{*rest}", get(webview))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Option<UserInfo> {
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    state.auth.authenticate(cookie)
}

/// `GET /` serves the workbench page.
///
/// Gates run in order: authentication (redirect to the login flow),
/// the administrative disable switch (rendered 500), then session
/// initialization. Any failure while composing the page is caught here
/// and rendered as a failure page carrying the raw error.
async fn root(
    State(state): State<SharedState>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = Query::parse(raw.as_deref().unwrap_or(""));
    let Some(user) = authenticate(&state, &headers) else {
        return GatewayError::Unauthenticated { to: "/".to_owned() }.into_response();
    };
    if state.config.disabled {
        return GatewayError::Disabled.into_response();
    }
    match compose_root(&state, &query, &headers, &user).await {
        Ok(page) => Html(page).into_response(),
        Err(error) => failure_page(&state, &error),
    }
}

async fn compose_root(
    state: &AppState,
    query: &Query,
    headers: &HeaderMap,
    user: &UserInfo,
) -> Result<String, GatewayError> {
    let remote_authority = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let previous = state.settings.read().await;
    let cli_path = state.config.open_path.clone().map(|path| StartPathCandidate {
        urls: vec![absolutize(&path)],
        workspace: None,
    });
    let last_visited = previous
        .last_visited
        .clone()
        .map(|last| StartPathCandidate::known(last.url, last.workspace));
    let start_path = get_first_path(&[
        Some(StartPathCandidate {
            urls: query.values("workspace").to_vec(),
            workspace: Some(true),
        }),
        Some(StartPathCandidate {
            urls: query.values("folder").to_vec(),
            workspace: Some(false),
        }),
        cli_path,
        last_visited,
    ])
    .await;

    let options = SessionOptions {
        remote_authority,
        start_path: start_path.clone(),
        user: Some(user.user.clone()),
        query: query.clone(),
    };
    let (template, workbench) = tokio::join!(
        tokio::fs::read_to_string(state.config.workbench_page_path()),
        state.sessions.initialize(options),
    );
    let template = template?;
    let workbench = workbench?;

    state
        .settings
        .write(&GatewaySettings {
            // A load with no explicit target keeps the previous memory.
            last_visited: start_path.or(previous.last_visited),
            query: query.clone(),
        })
        .await;

    Ok(assets::render_workbench_page(&template, &user.user, &workbench))
}

fn failure_page(state: &AppState, error: &GatewayError) -> Response {
    let hint = if state.config.dev_mode {
        "<div>The worker build may not have finished compiling; check the build output.</div>"
    } else {
        ""
    };
    let body = format!("<div>The workbench failed to load.</div>{hint}<br><br>{error}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(assets::error_page("Workbench failed to load", "500", &body)),
    )
        .into_response()
}

/// `GET /resource` and `GET /vscode-remote-resource` serve filesystem
/// resources named by the `path` query parameter.
async fn resource(
    State(state): State<SharedState>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    if authenticate(&state, &headers).is_none() {
        return Err(GatewayError::Unauthorized);
    }
    let query = Query::parse(raw.as_deref().unwrap_or(""));
    let Some(path) = query.first("path") else {
        return Err(GatewayError::NotFound);
    };
    assets::serve_file(Path::new(path)).await
}

async fn webview_index(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    serve_webview(&state, &headers, String::new()).await
}

/// `GET /webview/...` serves the bundled webview assets, except for
/// internal resource references, which name filesystem paths directly.
async fn webview(
    State(state): State<SharedState>,
    RoutePath(rest): RoutePath<String>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    serve_webview(&state, &headers, rest).await
}

async fn serve_webview(
    state: &AppState,
    headers: &HeaderMap,
    rest: String,
) -> Result<Response, GatewayError> {
    if authenticate(state, headers).is_none() {
        return Err(GatewayError::Unauthorized);
    }
    let request_path = format!("/{rest}");
    if let Some(stripped) = strip_resource_prefix(&request_path) {
        if stripped.is_empty() {
            return Err(GatewayError::NotFound);
        }
        return assets::serve_file(Path::new(stripped)).await;
    }
    assets::serve_file(&state.config.webview_dir().join(rest)).await
}

/// Strip the `/vscode-resource(/file)?` prefix from an internal resource
/// reference, yielding the filesystem path it names.
fn strip_resource_prefix(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/vscode-resource")?;
    Some(rest.strip_prefix("/file").unwrap_or(rest))
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

fn absolutize(path: &str) -> String {
    let path_ref = Path::new(path);
    if path_ref.is_absolute() {
        path.to_owned()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path_ref).display().to_string())
            .unwrap_or_else(|_| path.to_owned())
    }
}

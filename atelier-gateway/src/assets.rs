//! Static asset serving and page composition.

use std::path::Path;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use atelier_core::WorkbenchOptions;

use crate::error::GatewayError;

/// Quoted placeholders in the workbench page that receive JSON blobs.
const JSON_PLACEHOLDERS: [(&str, fn(&WorkbenchOptions) -> &serde_json::Value); 4] = [
    ("\"{{REMOTE_USER_DATA_URI}}\"", |o| &o.remote_user_data_uri),
    ("\"{{PRODUCT_CONFIGURATION}}\"", |o| &o.product_configuration),
    ("\"{{WORKBENCH_WEB_CONFIGURATION}}\"", |o| &o.workbench_web_configuration),
    ("\"{{NLS_CONFIGURATION}}\"", |o| &o.nls_configuration),
];

/// Map a file extension to a Content-Type.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Serve a file from disk.
///
/// # Errors
/// Returns [`GatewayError::NotFound`] when the file cannot be read.
pub async fn serve_file(path: &Path) -> Result<Response, GatewayError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "resource not readable");
        GatewayError::NotFound
    })?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type_for(path))],
        bytes,
    )
        .into_response())
}

/// Fill the workbench page template with the negotiated session state.
///
/// JSON placeholders appear quoted in the template so it stays parseable
/// before substitution; the quotes are replaced together with the token.
#[must_use]
pub fn render_workbench_page(template: &str, user: &str, options: &WorkbenchOptions) -> String {
    let mut page = template.replace("{{CURRENT_USER}}", user);
    for (placeholder, value) in JSON_PLACEHOLDERS {
        let json = value(options).to_string();
        page = page.replace(placeholder, &json);
    }
    page
}

/// Build a self-contained HTML error page.
#[must_use]
pub fn error_page(title: &str, code: &str, body_html: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{code}: {title}</h1>\n{body_html}\n</body>\n</html>\n"
    )
}

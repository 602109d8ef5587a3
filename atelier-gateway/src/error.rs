//! Error types for the gateway crate.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use atelier_worker::WorkerError;

use crate::assets::error_page;

/// Errors that can occur during gateway request handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// A worker lifecycle or protocol failure surfaced from below.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The page requires authentication; the response redirects to the
    /// login flow with the original route as the return target.
    #[error("not authenticated")]
    Unauthenticated {
        /// Route to come back to after logging in.
        to: String,
    },

    /// The route requires credentials and none were presented.
    #[error("unauthorized")]
    Unauthorized,

    /// The workbench is administratively disabled.
    #[error("workbench is disabled")]
    Disabled,

    /// Unmatched route or missing required parameter.
    #[error("not found")]
    NotFound,

    /// The request could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Unauthenticated { to } => {
                let target = utf8_percent_encode(&to, NON_ALPHANUMERIC).to_string();
                Redirect::to(&format!("/login?to={target}")).into_response()
            }
            GatewayError::Unauthorized => error_response(
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "<div>Authentication required.</div>",
            ),
            GatewayError::Disabled => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Workbench is disabled",
                "<div>The workbench is currently disabled. Try again later.</div>",
            ),
            GatewayError::NotFound => {
                error_response(StatusCode::NOT_FOUND, "Not found", "<div>Not found.</div>")
            }
            GatewayError::InvalidRequest(message) => error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request",
                &format!("<div>{message}</div>"),
            ),
            other => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                &format!("<div>{other}</div>"),
            ),
        }
    }
}

fn error_response(status: StatusCode, title: &str, body: &str) -> Response {
    let page = error_page(title, status.as_str(), body);
    (status, Html(page)).into_response()
}

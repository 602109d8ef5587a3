//! Option records exchanged between the gateway, the worker, and the page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::Query;

/// Identity of an authenticated requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Login name, fed into the rendered workbench page.
    pub user: String,
}

impl UserInfo {
    /// Creates a `UserInfo` from any string-like value.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

/// A workspace or folder chosen as the initial open target of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPath {
    /// Filesystem path or URL of the target.
    pub url: String,
    /// `true` when the target is a workspace (a regular file), `false` for
    /// a plain folder.
    pub workspace: bool,
}

/// Options sent to the worker when a logical workbench session begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Host the browser used to reach the gateway; the worker derives
    /// remote URIs from it.
    #[serde(default)]
    pub remote_authority: String,

    /// Initial open target, when one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_path: Option<StartPath>,

    /// Authenticated user driving the session, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Query parameters of the originating page load.
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
}

/// Negotiated configuration the worker returns for a session.
///
/// The gateway treats every field as an opaque blob: each one is
/// substituted verbatim into the workbench page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchOptions {
    /// URI of the per-user data directory on the remote side.
    #[serde(default)]
    pub remote_user_data_uri: Value,

    /// Product branding and capability configuration.
    #[serde(default)]
    pub product_configuration: Value,

    /// Web workbench bootstrap configuration.
    #[serde(default)]
    pub workbench_web_configuration: Value,

    /// Locale / translation configuration.
    #[serde(default)]
    pub nls_configuration: Value,
}

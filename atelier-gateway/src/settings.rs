//! Persisted gateway state.
//!
//! A small JSON file remembers the last visited start path and the query
//! of the last successful page load. Reads degrade to defaults and writes
//! are best-effort: losing this state only costs the "reopen where I left
//! off" nicety.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use atelier_core::{Query, StartPath};

/// State persisted between gateway runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GatewaySettings {
    /// Start path of the most recent successful page load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visited: Option<StartPath>,

    /// Query of the most recent successful page load.
    #[serde(default, skip_serializing_if = "Query::is_empty")]
    pub query: Query,
}

/// JSON-file-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the settings; a missing or corrupt file yields defaults.
    pub async fn read(&self) -> GatewaySettings {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "corrupt settings file");
                    GatewaySettings::default()
                }
            },
            Err(_) => GatewaySettings::default(),
        }
    }

    /// Write the settings; failures are logged, not surfaced.
    pub async fn write(&self, settings: &GatewaySettings) {
        let bytes = match serde_json::to_vec_pretty(settings) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "unserializable settings");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&self.path, bytes).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist settings");
        }
    }
}

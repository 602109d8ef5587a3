//! Gateway configuration, read from `ATELIER_*` environment variables.

use std::path::PathBuf;

/// Runtime configuration for the gateway process.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewayConfig {
    /// Address the TCP listener binds to.
    pub listen_addr: String,

    /// Command used to spawn the workbench worker.
    pub worker_command: PathBuf,

    /// Extra arguments passed to the worker command.
    pub worker_args: Vec<String>,

    /// Install root holding the workbench page and webview assets.
    pub root_dir: PathBuf,

    /// Location of the persisted settings file.
    pub settings_path: PathBuf,

    /// Session cookie token; `None` disables authentication.
    pub auth_token: Option<String>,

    /// Administratively disables the workbench while the gateway keeps
    /// serving (maintenance switch).
    pub disabled: bool,

    /// Adds diagnostic hints to failure pages.
    pub dev_mode: bool,

    /// Optional path to open on first load, the equivalent of a trailing
    /// command-line argument.
    pub open_path: Option<String>,
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let root_dir = PathBuf::from(var("ATELIER_ROOT").unwrap_or_else(|| ".".to_owned()));
        Self {
            listen_addr: var("ATELIER_LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_owned()),
            worker_command: var("ATELIER_WORKER_BIN")
                .map_or_else(|| root_dir.join("bin/atelier-worker"), PathBuf::from),
            worker_args: var("ATELIER_WORKER_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
            settings_path: var("ATELIER_SETTINGS")
                .map_or_else(|| root_dir.join(".atelier/settings.json"), PathBuf::from),
            auth_token: var("ATELIER_AUTH_TOKEN").filter(|t| !t.is_empty()),
            disabled: flag(var("ATELIER_DISABLED")),
            dev_mode: flag(var("ATELIER_DEV")),
            open_path: var("ATELIER_OPEN_PATH").filter(|p| !p.is_empty()),
            root_dir,
        }
    }

    /// Path of the workbench page template.
    #[must_use]
    pub fn workbench_page_path(&self) -> PathBuf {
        self.root_dir.join("browser/workbench.html")
    }

    /// Directory holding the bundled webview assets.
    #[must_use]
    pub fn webview_dir(&self) -> PathBuf {
        self.root_dir.join("webview")
    }
}

fn flag(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

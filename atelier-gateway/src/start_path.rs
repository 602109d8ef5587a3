//! Selection of the initial open path for a page load.

use atelier_core::StartPath;

/// One candidate source for the initial open path, in priority order:
/// query `workspace`, query `folder`, trailing command-line path, persisted
/// last-visited path.
#[derive(Debug, Clone, Default)]
pub struct StartPathCandidate {
    /// Possible urls from this source; the first non-empty one counts.
    pub urls: Vec<String>,
    /// Whether the target is a workspace. `None` means the source cannot
    /// know (only the command-line path), and the filesystem decides.
    pub workspace: Option<bool>,
}

impl StartPathCandidate {
    /// Candidate with a single url and a known workspace flag.
    #[must_use]
    pub fn known(url: impl Into<String>, workspace: bool) -> Self {
        Self { urls: vec![url.into()], workspace: Some(workspace) }
    }
}

/// Choose the first candidate with a non-empty url.
///
/// Candidates without a workspace flag are stat-checked: a regular file is
/// a workspace, anything else (including a failed stat) is not.
pub async fn get_first_path(candidates: &[Option<StartPathCandidate>]) -> Option<StartPath> {
    for candidate in candidates.iter().flatten() {
        let Some(url) = candidate.urls.iter().find(|u| !u.is_empty()) else {
            continue;
        };
        let workspace = match candidate.workspace {
            Some(workspace) => workspace,
            None => is_file(url).await,
        };
        return Some(StartPath { url: url.clone(), workspace });
    }
    None
}

async fn is_file(path: &str) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.is_file(),
        Err(e) => {
            tracing::warn!(%path, error = %e, "could not stat start path");
            false
        }
    }
}

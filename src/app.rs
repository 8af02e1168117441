use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::prune::plan_deletions;
use crate::sources;
use crate::terraform::{DirectiveKind, StateView, TfState, backend, config_files};

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub dir: PathBuf,
    pub tfstate: Option<String>,
    pub dry_run: bool,
}

/// One directive block removed (or, in a dry run, due for removal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedDirective {
    pub path: PathBuf,
    pub kind: DirectiveKind,
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub removed: Vec<RemovedDirective>,
}

/// Cleans every configuration file in `config.dir`.
///
/// Stops at the first failing file; files already rewritten stay rewritten.
pub async fn run(config: &RunConfig) -> Result<RunSummary> {
    let state = load_state(config).await?;
    let state_view = state.as_ref().map(|s| s as &dyn StateView);

    let mut summary = RunSummary::default();
    for path in config_files(&config.dir)? {
        summary.files_scanned += 1;

        let removed = process_file(&path, state_view, config.dry_run)
            .map_err(|err| err.in_file(&path))?;
        if !removed.is_empty() && !config.dry_run {
            summary.files_rewritten += 1;
        }
        summary.removed.extend(removed);
    }

    Ok(summary)
}

/// Resolves the state snapshot: the explicit locator, else a detected S3
/// backend, else none at all.
pub async fn load_state(config: &RunConfig) -> Result<Option<TfState>> {
    let url = match &config.tfstate {
        Some(url) => Some(url.clone()),
        None => backend::detect_state_url(&config.dir)?,
    };

    let Some(url) = url else {
        tracing::warn!("no state configured or detected; every directive block will be removed");
        return Ok(None);
    };

    let state = sources::read_state(&url).await?;
    Ok(Some(state))
}

/// Prunes one file in place and reports what was removed.
pub fn process_file(
    path: &Path,
    state: Option<&dyn StateView>,
    dry_run: bool,
) -> Result<Vec<RemovedDirective>> {
    let source = std::fs::read(path)?;
    let plan = plan_deletions(&source, state)?;
    if plan.is_empty() {
        tracing::debug!(path = %path.display(), "nothing to remove");
        return Ok(Vec::new());
    }

    let removed: Vec<RemovedDirective> = plan
        .iter()
        .map(|deletion| RemovedDirective {
            path: path.to_path_buf(),
            kind: deletion.directive.kind(),
            target: deletion.directive.describe(),
        })
        .collect();

    if !dry_run {
        std::fs::write(path, plan.apply(&source))?;
        tracing::info!(path = %path.display(), count = removed.len(), "removed applied directives");
    }

    Ok(removed)
}

//! High-level pipeline: orchestrates fetch → extract → merge → index → cleanup.
//!
//! This module sequences one synchronisation run over a [`SyncConfig`]:
//!   - Fetches the remote tree with the configured [`Transport`] (clone or zip download)
//!   - Extracts downloaded archives through the [`Extractor`] fallback cascade
//!   - Merges the content root into the publish directory
//!   - Regenerates the index document of the publish directory
//!   - Removes scratch artifacts, on success and on failure alike
//!
//! # Major Types
//! - [`SynchroniseReport`]: what the run did, for logs and the CLI
//! - [`SyncError`]: the failing stage's error
//! - [`PipelineState`]: states walked by a run, traced as they are entered
//!
//! # Responsibilities
//! - Fail-fast orchestration: the first failing stage aborts the run
//! - Cleanup runs exactly once on every path out of [`synchronise`]
//! - Strictly sequential; one run per process, no locking of the shared paths
//!
//! # Error Handling
//! Stage errors are wrapped in [`SyncError`] and returned after cleanup; the
//! CLI logs them and exits non-zero. Entries skipped by a best-effort
//! extraction do not fail the run but are listed in the report.

use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::cleanup::cleanup;
use crate::config::{SyncConfig, TransportKind};
use crate::contract::{
    CommandRunner, ExtractError, IndexError, MergeError, ScratchArtifact, Transport,
    TransportError,
};
use crate::extract::{ExtractStrategy, Extractor};
use crate::index::regenerate_index;
use crate::merge::merge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Fetching,
    Extracting,
    Merging,
    Indexing,
    CleaningUp,
    Done,
    Failing,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not prepare publish directory {path}: {source}")]
    PublishDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("index generation failed: {0}")]
    Index(#[from] IndexError),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchroniseReport {
    pub transport: TransportKind,
    /// Extraction tier that succeeded; `None` for clones.
    pub extraction: Option<ExtractStrategy>,
    pub skipped_entries: Vec<String>,
    pub files_copied: usize,
    pub excluded_removed: Vec<String>,
    pub index_entries: usize,
    pub index_path: PathBuf,
}

fn enter(state: &mut PipelineState, next: PipelineState) {
    info!(from = ?*state, to = ?next, "[SYNC] State transition");
    *state = next;
}

/// Runs the whole pipeline once.
pub async fn synchronise(
    config: &SyncConfig,
    transport: &dyn Transport,
    runner: &dyn CommandRunner,
) -> Result<SynchroniseReport, SyncError> {
    info!("[SYNC] Starting synchronisation pipeline");
    let mut state = PipelineState::Init;

    let result = run_stages(config, transport, runner, &mut state).await;
    if let Err(e) = &result {
        error!(stage = ?state, error = %e, "[SYNC][ERROR] Stage failed, aborting run");
        enter(&mut state, PipelineState::Failing);
    }

    enter(&mut state, PipelineState::CleaningUp);
    cleanup(&config.scratch);

    match result {
        Ok(report) => {
            enter(&mut state, PipelineState::Done);
            info!(?report, "[SYNC] Synchronisation complete");
            Ok(report)
        }
        Err(e) => {
            enter(&mut state, PipelineState::Failed);
            Err(e)
        }
    }
}

async fn run_stages(
    config: &SyncConfig,
    transport: &dyn Transport,
    runner: &dyn CommandRunner,
    state: &mut PipelineState,
) -> Result<SynchroniseReport, SyncError> {
    fs::create_dir_all(&config.publish_dir).map_err(|e| SyncError::PublishDir {
        path: config.publish_dir.clone(),
        source: e,
    })?;

    enter(state, PipelineState::Fetching);
    let artifact = transport.fetch(&config.transport, &config.scratch).await?;
    info!(?artifact, "[SYNC] Fetch succeeded");

    let (root, extraction, skipped_entries) = match artifact {
        ScratchArtifact::Directory(dir) => (dir, None, Vec::new()),
        ScratchArtifact::Archive { archive, dir } => {
            enter(state, PipelineState::Extracting);
            let extracted = Extractor::new(runner).extract(&archive, &dir)?;
            if !extracted.skipped.is_empty() {
                warn!(
                    skipped = extracted.skipped.len(),
                    "[SYNC] Continuing with a partially extracted archive"
                );
            }
            (extracted.root, Some(extracted.strategy), extracted.skipped)
        }
    };

    enter(state, PipelineState::Merging);
    let merged = merge(&root, &config.publish_dir, &config.excluded_files)?;

    enter(state, PipelineState::Indexing);
    let document = regenerate_index(
        &config.publish_dir,
        &config.domain,
        &config.manifest_file,
        &config.index_file,
    )?;

    Ok(SynchroniseReport {
        transport: config.transport.kind,
        extraction,
        skipped_entries,
        files_copied: merged.files_copied,
        excluded_removed: merged.excluded_removed,
        index_entries: document.urls.len(),
        index_path: config.publish_dir.join(&config.index_file),
    })
}

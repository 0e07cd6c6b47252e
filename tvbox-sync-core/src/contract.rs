//! # contract: seams and error taxonomy of the pipeline
//!
//! The pipeline talks to the outside world through two traits:
//! - [`Transport`] acquires the remote tree (clone or zip download).
//! - [`CommandRunner`] launches external tools (`git`, `unzip`, `7z`).
//!
//! Both are annotated for `mockall`, so integration tests can drive the
//! orchestrator and the extractor cascade without network or installed tools.
//! Mocks are exported behind the `test-export-mocks` feature.
//!
//! Each pipeline stage has its own error enum; the orchestrator wraps them in
//! [`crate::synchronise::SyncError`].

use async_trait::async_trait;
use mockall::automock;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use crate::config::{ScratchPaths, TransportConfig};

/// Transient output of a fetch. Owned by one run and removed by cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScratchArtifact {
    /// A checked-out tree, usable as-is.
    Directory(PathBuf),
    /// A downloaded archive plus the directory it will be extracted into.
    Archive { archive: PathBuf, dir: PathBuf },
}

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Lossy rendering for logs.
    pub fn display(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

/// Exit information of a finished invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }

    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Launches external programs and waits for them. No timeout is applied.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutcome>;
}

/// Acquires the remote tree into scratch space.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the remote content described by `config` into `scratch`.
    async fn fetch(
        &self,
        config: &TransportConfig,
        scratch: &ScratchPaths,
    ) -> Result<ScratchArtifact, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed with {status}")]
    CommandFailed { program: String, status: String },

    #[error("download failed for {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("download of {url} timed out")]
    Timeout { url: String },

    #[error("scratch path {path} could not be prepared: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("archive {path} is empty or missing")]
    EmptyOrMissing { path: PathBuf },

    #[error("archive {archive} lies inside the scratch directory {dir}")]
    ArchiveInsideScratch { archive: PathBuf, dir: PathBuf },

    #[error("nothing was extracted into {path}")]
    NothingExtracted { path: PathBuf },

    #[error("every extraction strategy failed: {}", failures.join("; "))]
    Exhausted { failures: Vec<String> },

    #[error("extraction I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("merge source {path} is not a directory")]
    MissingRoot { path: PathBuf },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write index {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

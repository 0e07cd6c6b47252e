//! Archive transports: a shallow `git clone` or an HTTP zip download.
//!
//! Both variants implement [`Transport`]; the orchestrator picks one from
//! [`TransportKind`] via [`transport_for`]. A configured proxy is always
//! handed to the underlying tool explicitly rather than left to ambient
//! environment or global git configuration.

use async_trait::async_trait;
use reqwest::{redirect, Client, Proxy};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::command::SystemCommandRunner;
use crate::config::{redact_proxy, ScratchPaths, TransportConfig, TransportKind};
use crate::contract::{CommandRunner, Invocation, ScratchArtifact, Transport, TransportError};

/// Hard limit for the whole zip download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_REDIRECTS: usize = 10;

/// Builds the transport matching `kind`, backed by real processes and HTTP.
pub fn transport_for(kind: TransportKind) -> Box<dyn Transport> {
    match kind {
        TransportKind::Clone => Box::new(GitTransport::new(SystemCommandRunner)),
        TransportKind::Download => Box::new(HttpTransport::new()),
    }
}

fn log_proxy(proxy: Option<&str>) {
    match proxy {
        Some(proxy) => info!(proxy = %redact_proxy(proxy), "Using proxy"),
        None => info!("No proxy configured"),
    }
}

fn remove_stale_dir(path: &Path) -> Result<(), TransportError> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path).map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to remove existing scratch directory");
        TransportError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    debug!(path = %path.display(), "Removed existing scratch directory");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), TransportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| TransportError::Io {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

/// Shallow single-branch clone through `git`.
pub struct GitTransport<R> {
    runner: R,
}

impl<R: CommandRunner> GitTransport<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

/// `git [-c http.proxy=P -c https.proxy=P] clone --depth=1 [--branch B] --single-branch URL DEST`
pub fn clone_invocation(config: &TransportConfig, dest: &Path) -> Invocation {
    let mut invocation = Invocation::new("git");
    if let Some(proxy) = &config.proxy {
        invocation = invocation
            .arg("-c")
            .arg(format!("http.proxy={proxy}"))
            .arg("-c")
            .arg(format!("https.proxy={proxy}"));
    }
    invocation = invocation.arg("clone").arg("--depth=1");
    if let Some(branch) = &config.branch {
        invocation = invocation.arg("--branch").arg(branch);
    }
    invocation
        .arg("--single-branch")
        .arg(&config.source_url)
        .arg(dest.as_os_str())
}

#[async_trait]
impl<R: CommandRunner> Transport for GitTransport<R> {
    async fn fetch(
        &self,
        config: &TransportConfig,
        scratch: &ScratchPaths,
    ) -> Result<ScratchArtifact, TransportError> {
        log_proxy(config.proxy.as_deref());
        let dest = &scratch.dir;

        // git refuses to clone into a non-empty directory left by a failed run
        remove_stale_dir(dest)?;
        ensure_parent(dest)?;

        info!(
            repo_url = %config.source_url,
            branch = config.branch.as_deref().unwrap_or("<remote default>"),
            path = %dest.display(),
            "Cloning git repository"
        );
        let invocation = clone_invocation(config, dest);
        match self.runner.run(&invocation) {
            Ok(outcome) if outcome.success => {
                info!(path = %dest.display(), "Git clone complete");
                Ok(ScratchArtifact::Directory(dest.clone()))
            }
            Ok(outcome) => {
                error!(
                    repo_url = %config.source_url,
                    status = %outcome.describe(),
                    "Git clone exited unsuccessfully"
                );
                Err(TransportError::CommandFailed {
                    program: invocation.program,
                    status: outcome.describe(),
                })
            }
            Err(e) => {
                error!(error = ?e, "Failed to launch git process");
                Err(TransportError::Launch {
                    program: invocation.program,
                    source: e,
                })
            }
        }
    }
}

/// HTTP download of the zip snapshot.
///
/// TLS certificates are not verified. Redirects are followed up to a limit.
pub struct HttpTransport {
    timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(true)
            .no_proxy();
        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        builder.build()
    }
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_owned(),
        }
    } else {
        TransportError::Http {
            url: url.to_owned(),
            reason: err.to_string(),
        }
    }
}

async fn download_to_file(client: &Client, url: &str, dest: &Path) -> Result<u64, TransportError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| map_reqwest_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Http {
            url: url.to_owned(),
            reason: format!("HTTP {status}"),
        });
    }

    let io_err = |e: std::io::Error| TransportError::Io {
        path: dest.to_path_buf(),
        source: e,
    };
    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| map_reqwest_error(url, e))?
    {
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}

fn remove_partial_download(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) => warn!(error = ?e, path = %path.display(), "Failed to remove partial download"),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        config: &TransportConfig,
        scratch: &ScratchPaths,
    ) -> Result<ScratchArtifact, TransportError> {
        log_proxy(config.proxy.as_deref());
        let url = config.archive_url();
        let archive = &scratch.archive;
        ensure_parent(archive)?;

        let client = self
            .client(config.proxy.as_deref())
            .map_err(|e| TransportError::Http {
                url: url.clone(),
                reason: format!("could not build HTTP client: {e}"),
            })?;

        info!(url = %url, path = %archive.display(), timeout_secs = self.timeout.as_secs(), "Downloading archive");
        match download_to_file(&client, &url, archive).await {
            Ok(bytes) => {
                info!(url = %url, bytes, "Archive downloaded");
                Ok(ScratchArtifact::Archive {
                    archive: archive.clone(),
                    dir: scratch.dir.clone(),
                })
            }
            Err(e) => {
                error!(error = %e, url = %url, "Archive download failed");
                remove_partial_download(archive);
                Err(e)
            }
        }
    }
}

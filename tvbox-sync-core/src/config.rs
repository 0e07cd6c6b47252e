use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Upstream repository cloned when `TV_GIT` is not set.
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/kimwang1978/tvbox.git";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DOMAIN: &str = "example.com";
pub const DEFAULT_MANIFEST_FILE: &str = "api.json";
pub const DEFAULT_INDEX_FILE: &str = "tvtxt.txt";

/// Proxy variables consulted in order; the first non-empty one wins.
pub const PROXY_ENV_VARS: [&str; 4] = ["HTTP_PROXY", "http_proxy", "HTTPS_PROXY", "https_proxy"];

/// How the remote tree is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Shallow single-branch `git clone`.
    #[default]
    Clone,
    /// HTTP download of a zip snapshot, then extraction.
    Download,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clone" | "git" => Ok(TransportKind::Clone),
            "download" | "zip" => Ok(TransportKind::Download),
            other => Err(format!("unknown transport '{other}', expected 'clone' or 'download'")),
        }
    }
}

/// Where and how to fetch the remote tree. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub source_url: String,
    pub branch: Option<String>,
    /// Explicit zip URL; derived from `source_url` and `branch` when absent.
    pub archive_url: Option<String>,
    pub proxy: Option<String>,
}

impl TransportConfig {
    pub fn branch_or_default(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    /// URL of the zip snapshot for the download transport.
    ///
    /// `https://host/owner/repo.git` on branch `main` becomes
    /// `https://host/owner/repo/archive/refs/heads/main.zip`.
    pub fn archive_url(&self) -> String {
        if let Some(url) = &self.archive_url {
            return url.clone();
        }
        let base = self.source_url.trim_end_matches('/');
        let base = base.strip_suffix(".git").unwrap_or(base);
        format!("{}/archive/refs/heads/{}.zip", base, self.branch_or_default())
    }
}

/// Transient locations owned by a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchPaths {
    pub dir: PathBuf,
    pub archive: PathBuf,
}

impl Default for ScratchPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("temp_repo"),
            archive: PathBuf::from("temp_repo.zip"),
        }
    }
}

/// Everything one synchronisation run needs, collected once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub publish_dir: PathBuf,
    pub scratch: ScratchPaths,
    pub transport: TransportConfig,
    pub domain: String,
    pub manifest_file: String,
    pub index_file: String,
    /// Files removed from the publish root after every merge.
    pub excluded_files: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            publish_dir: PathBuf::from("public"),
            scratch: ScratchPaths::default(),
            transport: TransportConfig {
                kind: TransportKind::Clone,
                source_url: DEFAULT_SOURCE_URL.to_string(),
                branch: Some(DEFAULT_BRANCH.to_string()),
                archive_url: None,
                proxy: None,
            },
            domain: DEFAULT_DOMAIN.to_string(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            excluded_files: vec!["tvbox.txt".to_string(), "README.md".to_string()],
        }
    }
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            publish_dir = %self.publish_dir.display(),
            scratch_dir = %self.scratch.dir.display(),
            transport = ?self.transport.kind,
            source_url = %self.transport.source_url,
            branch = self.transport.branch_or_default(),
            domain = %self.domain,
            proxy_set = self.transport.proxy.is_some(),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

/// Picks the proxy from the standard environment variables.
///
/// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map instead.
pub fn select_proxy<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    PROXY_ENV_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Hides credentials in a proxy URL before it is logged.
pub fn redact_proxy(proxy: &str) -> String {
    let (scheme, rest) = match proxy.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, proxy),
    };
    let host = match rest.rsplit_once('@') {
        Some((_, host)) => format!("***@{host}"),
        None => rest.to_string(),
    };
    match scheme {
        Some(scheme) => format!("{scheme}://{host}"),
        None => host,
    }
}

/// `load_config` module: builds the immutable [`SyncConfig`] for one run.
///
/// Layering, lowest precedence first:
///   1. Built-in defaults ([`SyncConfig::default`])
///   2. An optional YAML file passed with `--config`
///   3. Environment variables (`TV_GIT`, `TV_BRANCH`, `TV_ZIP`, `TV_TRANSPORT`,
///      the proxy variables, `domain`/`DOMAIN`)
///
/// CLI flags are applied on top by the caller. The environment is read through
/// an injectable lookup so tests never have to mutate the process env.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tvbox_sync_core::config::{select_proxy, SyncConfig, TransportKind};

/// YAML-side shape. Every key is optional; absent keys keep the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub publish_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub scratch_archive: Option<PathBuf>,
    pub source_url: Option<String>,
    pub branch: Option<String>,
    pub archive_url: Option<String>,
    pub transport: Option<TransportKind>,
    pub domain: Option<String>,
    pub manifest_file: Option<String>,
    pub index_file: Option<String>,
    pub excluded_files: Option<Vec<String>>,
}

impl FileConfig {
    fn apply(self, config: &mut SyncConfig) {
        if let Some(v) = self.publish_dir {
            config.publish_dir = v;
        }
        if let Some(v) = self.scratch_dir {
            config.scratch.dir = v;
        }
        if let Some(v) = self.scratch_archive {
            config.scratch.archive = v;
        }
        if let Some(v) = self.source_url {
            config.transport.source_url = v;
        }
        if let Some(v) = self.branch {
            config.transport.branch = Some(v);
        }
        if let Some(v) = self.archive_url {
            config.transport.archive_url = Some(v);
        }
        if let Some(v) = self.transport {
            config.transport.kind = v;
        }
        if let Some(v) = self.domain {
            config.domain = v;
        }
        if let Some(v) = self.manifest_file {
            config.manifest_file = v;
        }
        if let Some(v) = self.index_file {
            config.index_file = v;
        }
        if let Some(v) = self.excluded_files {
            config.excluded_files = v;
        }
    }
}

/// Reads and parses a YAML config file.
pub fn read_config_file(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    // an empty file parses as YAML null
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(parsed) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(parsed)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Overlays environment values onto `config`.
pub fn apply_env<F>(config: &mut SyncConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = non_empty(&lookup, "TV_GIT") {
        config.transport.source_url = v;
    }
    if let Some(v) = non_empty(&lookup, "TV_BRANCH") {
        config.transport.branch = Some(v);
    }
    if let Some(v) = non_empty(&lookup, "TV_ZIP") {
        config.transport.archive_url = Some(v);
    }
    if let Some(v) = non_empty(&lookup, "TV_TRANSPORT") {
        config.transport.kind = v
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Invalid TV_TRANSPORT: {e}"))?;
    }
    if let Some(v) = non_empty(&lookup, "domain").or_else(|| non_empty(&lookup, "DOMAIN")) {
        config.domain = v;
    }
    if let Some(proxy) = select_proxy(&lookup) {
        config.transport.proxy = Some(proxy);
    }
    Ok(())
}

/// Defaults, then `path` if given, then values from `lookup`.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<SyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = SyncConfig::default();
    if let Some(path) = path {
        read_config_file(path)?.apply(&mut config);
    }
    apply_env(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Rejects layouts the pipeline cannot run with.
pub fn validate(config: &SyncConfig) -> Result<()> {
    if config.scratch.archive.starts_with(&config.scratch.dir) {
        error!(
            scratch_dir = ?config.scratch.dir,
            scratch_archive = ?config.scratch.archive,
            "Scratch archive configured inside the scratch directory"
        );
        return Err(anyhow::anyhow!(
            "scratch_archive {:?} must not be inside scratch_dir {:?}",
            config.scratch.archive,
            config.scratch.dir
        ));
    }
    Ok(())
}

/// [`load_config_with`] against the process environment.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

//! Archive extraction with an ordered fallback cascade.
//!
//! Strategies are tried in order and the first success wins:
//! 1. [`ExtractStrategy::Unzip`]: `unzip -o -q`
//! 2. [`ExtractStrategy::SevenZip`]: `7z x -y`, which copes with more filename encodings
//! 3. [`ExtractStrategy::PerEntry`]: walk the zip table of contents in-process and
//!    extract each entry on its own, skipping entries that fail
//!
//! Adding or removing a tier is a change to the strategy list only.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

use crate::contract::{CommandRunner, ExtractError, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    Unzip,
    SevenZip,
    PerEntry,
}

pub const DEFAULT_STRATEGIES: [ExtractStrategy; 3] = [
    ExtractStrategy::Unzip,
    ExtractStrategy::SevenZip,
    ExtractStrategy::PerEntry,
];

impl ExtractStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractStrategy::Unzip => "unzip",
            ExtractStrategy::SevenZip => "7z",
            ExtractStrategy::PerEntry => "per-entry",
        }
    }

    /// Runs this tier. `Ok` carries the names of skipped entries.
    fn attempt(
        &self,
        runner: &dyn CommandRunner,
        archive: &Path,
        dest: &Path,
    ) -> Result<Vec<String>, String> {
        match self {
            ExtractStrategy::Unzip => {
                let invocation = Invocation::new("unzip")
                    .arg("-o")
                    .arg("-q")
                    .arg(archive.as_os_str())
                    .arg("-d")
                    .arg(dest.as_os_str());
                run_tool(runner, &invocation).map(|()| Vec::new())
            }
            ExtractStrategy::SevenZip => {
                let mut output = OsString::from("-o");
                output.push(dest.as_os_str());
                let invocation = Invocation::new("7z")
                    .arg("x")
                    .arg("-y")
                    .arg(output)
                    .arg(archive.as_os_str());
                run_tool(runner, &invocation).map(|()| Vec::new())
            }
            ExtractStrategy::PerEntry => extract_entries(archive, dest),
        }
    }
}

fn run_tool(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<(), String> {
    debug!(command = %invocation.display(), "Running extraction tool");
    match runner.run(invocation) {
        Ok(outcome) if outcome.success => Ok(()),
        Ok(outcome) => Err(format!("{} failed with {}", invocation.program, outcome.describe())),
        Err(e) => Err(format!("failed to launch {}: {e}", invocation.program)),
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Directory holding the archive's content (`{repo}-{branch}` for GitHub snapshots).
    pub root: PathBuf,
    pub strategy: ExtractStrategy,
    pub skipped: Vec<String>,
}

pub struct Extractor<'a> {
    runner: &'a dyn CommandRunner,
    strategies: Vec<ExtractStrategy>,
}

impl<'a> Extractor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self::with_strategies(runner, DEFAULT_STRATEGIES.to_vec())
    }

    pub fn with_strategies(runner: &'a dyn CommandRunner, strategies: Vec<ExtractStrategy>) -> Self {
        Self { runner, strategies }
    }

    /// Extracts `archive` into a freshly emptied `dest` and locates the content root.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<Extraction, ExtractError> {
        match fs::metadata(archive) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                debug!(path = %archive.display(), bytes = meta.len(), "Archive present");
            }
            _ => {
                error!(path = %archive.display(), "Archive is empty or missing, not extracting");
                return Err(ExtractError::EmptyOrMissing {
                    path: archive.to_path_buf(),
                });
            }
        }

        // emptying the scratch dir would delete the archive itself
        if archive.starts_with(dest) {
            error!(archive = %archive.display(), dir = %dest.display(), "Archive is inside the scratch directory");
            return Err(ExtractError::ArchiveInsideScratch {
                archive: archive.to_path_buf(),
                dir: dest.to_path_buf(),
            });
        }

        reset_dir(dest)?;

        let mut failures = Vec::new();
        let mut succeeded = None;
        for strategy in &self.strategies {
            info!(strategy = strategy.name(), "[EXTRACT] Attempting extraction");
            match strategy.attempt(self.runner, archive, dest) {
                Ok(skipped) => {
                    info!(
                        strategy = strategy.name(),
                        skipped = skipped.len(),
                        "[EXTRACT] Extraction succeeded"
                    );
                    succeeded = Some((*strategy, skipped));
                    break;
                }
                Err(reason) => {
                    warn!(strategy = strategy.name(), reason = %reason, "[EXTRACT] Strategy failed, falling back");
                    failures.push(format!("{}: {}", strategy.name(), reason));
                }
            }
        }

        let root = content_root(dest).map_err(|e| ExtractError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        match (succeeded, root) {
            (_, None) => {
                error!(path = %dest.display(), "Nothing was extracted");
                Err(ExtractError::NothingExtracted {
                    path: dest.to_path_buf(),
                })
            }
            (None, Some(_)) => Err(ExtractError::Exhausted { failures }),
            (Some((strategy, skipped)), Some(root)) => {
                info!(root = %root.display(), strategy = strategy.name(), "Located content root");
                Ok(Extraction {
                    root,
                    strategy,
                    skipped,
                })
            }
        }
    }
}

fn reset_dir(dest: &Path) -> Result<(), ExtractError> {
    let io_err = |e: io::Error| ExtractError::Io {
        path: dest.to_path_buf(),
        source: e,
    };
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(io_err)?;
    }
    fs::create_dir_all(dest).map_err(io_err)
}

/// First top-level entry in name order; the scratch dir itself when that entry is a file.
fn content_root(dest: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dest)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    match entries.first() {
        None => Ok(None),
        Some(first) if first.file_type()?.is_dir() => Ok(Some(first.path())),
        Some(_) => Ok(Some(dest.to_path_buf())),
    }
}

fn extract_entries(archive: &Path, dest: &Path) -> Result<Vec<String>, String> {
    let file = File::open(archive).map_err(|e| format!("cannot open archive: {e}"))?;
    let mut zip =
        ZipArchive::new(file).map_err(|e| format!("cannot read table of contents: {e}"))?;
    info!(entries = zip.len(), "Extracting archive entries individually");

    let mut skipped = Vec::new();
    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index, error = %e, "Skipping unreadable archive entry");
                skipped.push(format!("#{index}"));
                continue;
            }
        };
        let name = entry.name().to_string();
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %name, "Skipping archive entry with unsafe path");
            skipped.push(name);
            continue;
        };
        let target = dest.join(&relative);

        if entry.unix_mode().is_some_and(is_symlink_mode) {
            if let Err(reason) = extract_symlink(&mut entry, &relative, &target) {
                warn!(entry = %name, reason = %reason, "Skipping symlink archive entry");
                skipped.push(name);
            }
            continue;
        }

        let result = if entry.is_dir() {
            fs::create_dir_all(&target)
        } else {
            write_entry(&mut entry, &target)
        };
        match result {
            Ok(()) => apply_mode(&target, entry.unix_mode()),
            Err(e) => {
                warn!(entry = %name, error = %e, "Skipping archive entry that failed to extract");
                skipped.push(name);
            }
        }
    }
    if !skipped.is_empty() {
        warn!(skipped = skipped.len(), "Some archive entries were skipped");
    }
    Ok(skipped)
}

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

fn is_symlink_mode(mode: u32) -> bool {
    mode & S_IFMT == S_IFLNK
}

/// True when `link_target`, resolved next to `entry`, stays under the archive root.
fn link_stays_inside(entry: &Path, link_target: &Path) -> bool {
    let mut depth = entry.parent().map_or(0, |p| {
        p.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    });
    for component in link_target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            _ => return false,
        }
    }
    true
}

/// Recreates a symlink entry. Links pointing outside the archive are refused.
fn extract_symlink(entry: &mut impl io::Read, relative: &Path, target: &Path) -> Result<(), String> {
    let mut link_target = String::new();
    entry
        .read_to_string(&mut link_target)
        .map_err(|e| format!("cannot read link target: {e}"))?;
    if !link_stays_inside(relative, Path::new(&link_target)) {
        return Err(format!("link target {link_target} leaves the archive"));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    create_symlink(Path::new(&link_target), target)
}

#[cfg(unix)]
fn create_symlink(link_target: &Path, target: &Path) -> Result<(), String> {
    std::os::unix::fs::symlink(link_target, target).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn create_symlink(_link_target: &Path, _target: &Path) -> Result<(), String> {
    Err("symlinks are not supported on this platform".to_string())
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        if let Err(e) = fs::set_permissions(target, fs::Permissions::from_mode(mode)) {
            debug!(path = %target.display(), error = %e, "Could not apply entry permissions");
        }
    }
}

#[cfg(not(unix))]
fn apply_mode(_target: &Path, _mode: Option<u32>) {}

fn write_entry(entry: &mut impl io::Read, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    if let Err(e) = io::copy(entry, &mut out) {
        drop(out);
        let _ = fs::remove_file(target);
        return Err(e);
    }
    Ok(())
}

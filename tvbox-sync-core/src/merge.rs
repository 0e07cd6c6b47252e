//! Copies a fetched tree into the publish directory.
//!
//! The merge is additive: existing entries are overwritten, entries with no
//! counterpart in the source are left alone. Files deleted upstream therefore
//! linger in the publish tree until removed by hand.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::contract::MergeError;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub files_copied: usize,
    pub dirs_created: usize,
    /// Excluded names that were present and removed from the publish root.
    pub excluded_removed: Vec<String>,
}

/// Copies every non-hidden top-level entry of `root` into `dest`, then
/// deletes `excluded` names from the root of `dest`.
pub fn merge(root: &Path, dest: &Path, excluded: &[String]) -> Result<MergeReport, MergeError> {
    if !root.is_dir() {
        return Err(MergeError::MissingRoot {
            path: root.to_path_buf(),
        });
    }
    info!(from = %root.display(), to = %dest.display(), "Merging tree into publish directory");
    fs::create_dir_all(dest).map_err(|e| copy_err(root, dest, e))?;

    let mut report = MergeReport::default();
    let entries = fs::read_dir(root).map_err(|e| copy_err(root, dest, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| copy_err(root, dest, e))?;
        let name = entry.file_name();
        // same as the `root/*` glob: dotfiles such as .git stay behind
        if name.to_string_lossy().starts_with('.') {
            debug!(entry = ?name, "Skipping hidden top-level entry");
            continue;
        }
        copy_entry(&entry.path(), &dest.join(&name), &mut report)?;
    }

    for name in excluded {
        let path = dest.join(name);
        if path.is_file() || path.is_symlink() {
            fs::remove_file(&path).map_err(|e| MergeError::Remove {
                path: path.clone(),
                source: e,
            })?;
            info!(file = %name, "Removed excluded file from publish directory");
            report.excluded_removed.push(name.clone());
        }
    }

    info!(
        files = report.files_copied,
        dirs = report.dirs_created,
        excluded = report.excluded_removed.len(),
        "Merge complete"
    );
    Ok(report)
}

fn copy_err(from: &Path, to: &Path, source: io::Error) -> MergeError {
    MergeError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

fn copy_entry(from: &Path, to: &Path, report: &mut MergeReport) -> Result<(), MergeError> {
    let file_type = fs::symlink_metadata(from)
        .map_err(|e| copy_err(from, to, e))?
        .file_type();

    if file_type.is_dir() {
        if to.exists() && !to.is_dir() {
            replace_existing(to)?;
        }
        if to.exists() {
            make_dir_writable(to).map_err(|e| copy_err(from, to, e))?;
        } else {
            fs::create_dir(to).map_err(|e| copy_err(from, to, e))?;
            report.dirs_created += 1;
        }
        let permissions = fs::metadata(from)
            .map_err(|e| copy_err(from, to, e))?
            .permissions();
        for entry in fs::read_dir(from).map_err(|e| copy_err(from, to, e))? {
            let entry = entry.map_err(|e| copy_err(from, to, e))?;
            copy_entry(&entry.path(), &to.join(entry.file_name()), report)?;
        }
        fs::set_permissions(to, permissions).map_err(|e| copy_err(from, to, e))?;
    } else if file_type.is_symlink() {
        if to.exists() || to.is_symlink() {
            replace_existing(to)?;
        }
        copy_symlink(from, to)?;
        report.files_copied += 1;
    } else {
        // fs::copy would write through a symlink
        if to.is_dir() || to.is_symlink() {
            replace_existing(to)?;
        }
        // fs::copy carries the permission bits over
        copy_file(from, to)?;
        report.files_copied += 1;
    }
    Ok(())
}

/// Copies a regular file. A read-only target is removed and the copy retried
/// once, like `cp -f`.
fn copy_file(from: &Path, to: &Path) -> Result<(), MergeError> {
    match fs::copy(from, to) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied && to.is_file() => {
            debug!(path = %to.display(), "Target not writable, removing before copy");
            fs::remove_file(to).map_err(|e| MergeError::Remove {
                path: to.to_path_buf(),
                source: e,
            })?;
            fs::copy(from, to)
                .map(|_| ())
                .map_err(|e| copy_err(from, to, e))
        }
        Err(e) => Err(copy_err(from, to, e)),
    }
}

/// Adds owner write and search bits to an existing directory so its entries
/// can be replaced. The source permissions are applied again afterwards.
#[cfg(unix)]
fn make_dir_writable(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(dir)?.permissions();
    let mode = permissions.mode();
    if mode & 0o300 != 0o300 {
        permissions.set_mode(mode | 0o700);
        fs::set_permissions(dir, permissions)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_dir_writable(dir: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(dir)?.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(dir, permissions)?;
    }
    Ok(())
}

fn replace_existing(path: &Path) -> Result<(), MergeError> {
    warn!(path = %path.display(), "Replacing existing entry of a different kind");
    let result = if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| MergeError::Remove {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), MergeError> {
    let target = fs::read_link(from).map_err(|e| copy_err(from, to, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| copy_err(from, to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), MergeError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| copy_err(from, to, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_root_is_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let err = merge(&dest.path().join("absent"), dest.path(), &[]).unwrap_err();
        assert!(matches!(err, MergeError::MissingRoot { .. }));
    }

    #[test]
    fn file_replaces_directory_of_same_name() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("thing"), b"file now").unwrap();
        fs::create_dir_all(dest.path().join("thing/inner")).unwrap();

        merge(src.path(), dest.path(), &[]).unwrap();

        assert_eq!(fs::read(dest.path().join("thing")).unwrap(), b"file now");
    }
}

//! Project tree synchronization
//!
//! Walks the local project root and mirrors every non-excluded directory
//! and file under the remote project directory. Files are always copied in
//! full; nothing on the remote side is compared or deleted.

use crate::error::{DeployError, Result};
use crate::exclude::ExclusionSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Remote side of a sync
pub trait RemoteFs {
    type File: Write;

    /// Create `path` and any missing ancestors. Must succeed if it exists.
    fn ensure_dir(&mut self, path: &str) -> io::Result<()>;

    /// Create or truncate the file at `path`
    fn create_file(&mut self, path: &str) -> io::Result<Self::File>;
}

/// What the sync does with one walked entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ensure the remote directory exists
    Mkdir,
    /// Copy the file contents
    Copy,
    /// Matched an exclusion fragment
    Excluded(String),
    /// Symlink to a directory, or a dangling link
    SkippedLink,
}

/// One walked entry with its remote destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub local: PathBuf,
    pub remote: String,
    pub action: Action,
}

/// Totals for a finished (or planned) sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    pub skipped: usize,
}

/// Mirrors a local tree under a remote directory
#[derive(Debug, Clone)]
pub struct TreeSync {
    local_root: PathBuf,
    remote_root: String,
    exclusions: ExclusionSet,
}

impl TreeSync {
    pub fn new(local_root: PathBuf, remote_root: &str, exclusions: ExclusionSet) -> Self {
        Self {
            local_root,
            remote_root: remote_root.to_string(),
            exclusions,
        }
    }

    /// Walk the tree and decide what to do with each entry, without
    /// touching the remote side.
    pub fn plan(&self) -> Result<Vec<SyncEntry>> {
        self.entries().collect()
    }

    /// Mirror the tree through `target`, stopping at the first failure
    pub fn sync<F: RemoteFs>(&self, target: &mut F) -> Result<SyncReport> {
        info!(
            local = %self.local_root.display(),
            remote = %self.remote_root,
            "Syncing project tree"
        );

        let mut report = SyncReport::default();
        for entry in self.entries() {
            let entry = entry?;
            match entry.action {
                Action::Mkdir => {
                    debug!(remote = %entry.remote, "Ensuring directory");
                    target
                        .ensure_dir(&entry.remote)
                        .map_err(|source| DeployError::RemoteMkdir {
                            path: entry.remote.clone(),
                            source,
                        })?;
                    report.directories += 1;
                }
                Action::Copy => {
                    debug!(remote = %entry.remote, "Copying file");
                    report.bytes += copy_file(target, &entry.local, &entry.remote)?;
                    report.files += 1;
                }
                Action::Excluded(_) | Action::SkippedLink => report.skipped += 1,
            }
        }

        info!(
            directories = report.directories,
            files = report.files,
            bytes = report.bytes,
            skipped = report.skipped,
            "Sync complete"
        );
        Ok(report)
    }

    fn entries(&self) -> impl Iterator<Item = Result<SyncEntry>> + '_ {
        WalkDir::new(&self.local_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(move |entry| {
                let entry = entry.map_err(|source| DeployError::Walk { source })?;
                self.classify(entry.path(), entry.file_type())
            })
    }

    fn classify(&self, local: &Path, file_type: fs::FileType) -> Result<SyncEntry> {
        let relative = local.strip_prefix(&self.local_root).map_err(|_| {
            DeployError::LocalRead {
                path: local.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path is outside the project root",
                ),
            }
        })?;
        let remote = join_remote(&self.remote_root, relative);

        let action = if let Some(fragment) = self.exclusions.matching_fragment(local, relative) {
            debug!(path = %local.display(), fragment, "Excluded");
            Action::Excluded(fragment.to_string())
        } else if file_type.is_dir() {
            Action::Mkdir
        } else if file_type.is_symlink() {
            match fs::metadata(local) {
                Ok(meta) if meta.is_file() => Action::Copy,
                _ => {
                    warn!(path = %local.display(), "Skipping symlink to directory or missing target");
                    Action::SkippedLink
                }
            }
        } else {
            Action::Copy
        };

        Ok(SyncEntry {
            local: local.to_path_buf(),
            remote,
            action,
        })
    }
}

/// Copy one file. Both handles are closed before this returns, so open
/// handles never accumulate across the walk.
fn copy_file<F: RemoteFs>(target: &mut F, local: &Path, remote: &str) -> Result<u64> {
    let mut reader = File::open(local).map_err(|source| DeployError::LocalRead {
        path: local.to_path_buf(),
        source,
    })?;

    let mut writer = target
        .create_file(remote)
        .map_err(|source| DeployError::RemoteCreate {
            path: remote.to_string(),
            source,
        })?;

    io::copy(&mut reader, &mut writer)
        .and_then(|bytes| writer.flush().map(|_| bytes))
        .map_err(|source| DeployError::RemoteWrite {
            path: remote.to_string(),
            source,
        })
}

/// Map a local path under `local_root` to its remote counterpart
pub fn map_remote_path(local_root: &Path, remote_root: &str, local: &Path) -> Option<String> {
    local
        .strip_prefix(local_root)
        .ok()
        .map(|relative| join_remote(remote_root, relative))
}

fn join_remote(remote_root: &str, relative: &Path) -> String {
    let mut remote = remote_root.to_string();
    for component in relative.components() {
        if !remote.ends_with('/') {
            remote.push('/');
        }
        remote.push_str(&component.as_os_str().to_string_lossy());
    }
    remote
}

/// Every directory from the top of `path` down to `path` itself:
/// `/saas/sub/dir` gives `/saas`, `/saas/sub`, `/saas/sub/dir`.
pub fn remote_ancestors(path: &str) -> Vec<String> {
    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    let mut dirs = Vec::new();
    for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);
        dirs.push(current.clone());
    }
    dirs
}

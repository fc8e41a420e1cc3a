//! SFTP-backed remote filesystem

use crate::sync::{remote_ancestors, RemoteFs};
use ssh2::{File, Sftp};
use std::io;
use std::path::Path;
use tracing::debug;

const DIR_MODE: i32 = 0o755;

/// File-transfer session on an open [`crate::transport::Transport`]
pub struct SftpSession {
    sftp: Sftp,
}

impl SftpSession {
    pub(crate) fn new(sftp: Sftp) -> Self {
        Self { sftp }
    }
}

impl RemoteFs for SftpSession {
    type File = File;

    fn ensure_dir(&mut self, path: &str) -> io::Result<()> {
        mkdir_all(&self.sftp, path)
    }

    fn create_file(&mut self, path: &str) -> io::Result<File> {
        Ok(self.sftp.create(Path::new(path))?)
    }
}

/// Single-directory operations `mkdir_all` is built from
pub(crate) trait DirOps {
    /// `Some(is_dir)` if something exists at `path`
    fn probe(&self, path: &str) -> Option<bool>;

    /// Create one directory whose parent exists
    fn mkdir(&self, path: &str) -> io::Result<()>;
}

impl DirOps for Sftp {
    fn probe(&self, path: &str) -> Option<bool> {
        self.stat(Path::new(path)).ok().map(|stat| stat.is_dir())
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        Ok(Sftp::mkdir(self, Path::new(path), DIR_MODE)?)
    }
}

/// Create `path` and every missing ancestor, top down
pub(crate) fn mkdir_all<D: DirOps>(ops: &D, path: &str) -> io::Result<()> {
    for dir in remote_ancestors(path) {
        match ops.probe(&dir) {
            Some(true) => continue,
            Some(false) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a directory", dir),
                ))
            }
            None => {}
        }

        debug!(path = %dir, "mkdir");
        if let Err(err) = ops.mkdir(&dir) {
            // Some servers report a generic failure when the directory
            // appeared between stat and mkdir.
            if ops.probe(&dir) != Some(true) {
                return Err(err);
            }
        }
    }
    Ok(())
}

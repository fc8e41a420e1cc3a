//! Deployment error taxonomy
//!
//! Every variant carries the path, host or command it failed on so a log
//! line is enough to diagnose the failure without re-running.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors raised while connecting, syncing or running remote commands
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Failed to read SSH key {}: {source}", .path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse SSH key {}: {reason}", .path.display())]
    KeyParse { path: PathBuf, reason: String },

    #[error("Failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("SSH handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("Could not check host key against {}: {reason}", .path.display())]
    KnownHosts { path: PathBuf, reason: String },

    #[error("Host key for {host} does not match the entry in {}", .known_hosts.display())]
    HostKeyMismatch { host: String, known_hosts: PathBuf },

    #[error("Host {host} is not listed in {}", .known_hosts.display())]
    HostKeyUnknown { host: String, known_hosts: PathBuf },

    #[error("Public key authentication failed for {user}@{host}: {source}")]
    Auth {
        user: String,
        host: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("Failed to open SFTP session on {addr}: {source}")]
    TransferSession {
        addr: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("Error while walking through the directory: {source}")]
    Walk {
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to open local file {}: {source}", .path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create remote directory {path}: {source}")]
    RemoteMkdir {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create remote file {path}: {source}")]
    RemoteCreate {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy file to {path}: {source}")]
    RemoteWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to run remote command `{command}`: {source}")]
    ExecSession {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Remote command `{command}` exited with status {status}")]
    RemoteExec {
        command: String,
        status: i32,
        output: String,
    },
}

impl DeployError {
    /// Stable name of the error kind, used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeyRead { .. } => "KeyReadError",
            Self::KeyParse { .. } => "KeyParseError",
            Self::Dial { .. } => "DialError",
            Self::Handshake { .. } => "HandshakeError",
            Self::KnownHosts { .. } => "KnownHostsError",
            Self::HostKeyMismatch { .. } => "HostKeyMismatchError",
            Self::HostKeyUnknown { .. } => "HostKeyUnknownError",
            Self::Auth { .. } => "AuthError",
            Self::TransferSession { .. } => "TransferSessionError",
            Self::Walk { .. } => "WalkError",
            Self::LocalRead { .. } => "LocalReadError",
            Self::RemoteMkdir { .. } => "RemoteMkdirError",
            Self::RemoteCreate { .. } => "RemoteCreateError",
            Self::RemoteWrite { .. } => "RemoteWriteError",
            Self::ExecSession { .. } => "ExecSessionError",
            Self::RemoteExec { .. } => "RemoteExecError",
        }
    }

    /// Output captured from a remote command that exited non-zero
    pub fn remote_output(&self) -> Option<&str> {
        match self {
            Self::RemoteExec { output, .. } => Some(output),
            _ => None,
        }
    }
}

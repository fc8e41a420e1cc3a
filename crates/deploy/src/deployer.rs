//! Deployment orchestration
//!
//! Phase one syncs the project tree over its own connection. Phase two
//! opens a second connection and rebuilds the compose services. The first
//! failure ends the deployment; nothing is retried or rolled back.

use crate::error::Result;
use crate::sync::{SyncReport, TreeSync};
use crate::transport::{Connection, Connector};
use deploy_core::envfile::export_script;
use std::borrow::Cow;
use tracing::info;

/// Compose services rebuilt on every deploy
pub const SERVICES: [&str; 2] = ["backend", "frontend"];

/// The remote compose invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildCommand {
    pub compose_command: String,
    pub compose_file: String,
}

impl Default for RebuildCommand {
    fn default() -> Self {
        Self {
            compose_command: "docker-compose".to_string(),
            compose_file: "docker-compose.production.yml".to_string(),
        }
    }
}

impl RebuildCommand {
    /// Shell line run on the server. `exports` are prepended so the compose
    /// process inherits them.
    pub fn render(&self, remote_dir: &str, exports: &[String]) -> String {
        let mut script = String::new();
        if !exports.is_empty() {
            script.push_str(&export_script(exports));
            script.push('\n');
        }
        script.push_str(&format!(
            "cd {} && {} -f {} up -d --build {}",
            shell_quote(remote_dir),
            self.compose_command,
            shell_quote(&self.compose_file),
            SERVICES.join(" ")
        ));
        script
    }
}

/// Quote `s` for a POSIX shell, leaving plain words untouched
pub fn shell_quote(s: &str) -> Cow<'_, str> {
    let plain = !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(b, b'/' | b'.' | b'_' | b'-' | b'+' | b':' | b'@' | b'%' | b',' | b'=')
        });

    if plain {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', "'\\''")))
    }
}

/// Which phases to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    pub sync: bool,
    pub rebuild: bool,
}

impl Default for Phases {
    fn default() -> Self {
        Self {
            sync: true,
            rebuild: true,
        }
    }
}

/// Outcome of a deployment
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub sync: Option<SyncReport>,
    pub output: Option<Vec<u8>>,
}

/// Sequences the sync and rebuild phases over fresh connections
pub struct Deployer<C: Connector> {
    connector: C,
    tree: TreeSync,
    command: String,
}

impl<C: Connector> Deployer<C> {
    pub fn new(connector: C, tree: TreeSync, command: String) -> Self {
        Self {
            connector,
            tree,
            command,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Copy the project tree over a dedicated connection
    pub fn sync_phase(&self) -> Result<SyncReport> {
        let connection = self.connector.connect()?;
        let mut fs = connection.file_transfer()?;
        self.tree.sync(&mut fs)
    }

    /// Run the rebuild command over a second, dedicated connection
    pub fn rebuild_phase(&self) -> Result<Vec<u8>> {
        let connection = self.connector.connect()?;
        info!(command = %self.command, "Rebuilding services");
        connection.run(&self.command)
    }

    /// Run the selected phases in order, printing progress
    pub fn deploy(&self, phases: Phases) -> Result<DeployReport> {
        let mut report = DeployReport::default();

        if phases.sync {
            println!("Copying the entire project directory to the server...");
            report.sync = Some(self.sync_phase()?);
        }

        if phases.rebuild {
            println!("Logging in to the server to rebuild and restart services...");
            report.output = Some(self.rebuild_phase()?);
        }

        Ok(report)
    }
}

//! Configuration loading for deploy
//!
//! Values come from a TOML file and are then overridden by command-line
//! flags. Everything except the connection target has a default.

use anyhow::{bail, Context, Result};
use deploy_core::paths::expand_path;
use deploy_core::Paths;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::deployer::RebuildCommand;
use crate::exclude::{ExclusionSet, MatchMode, DEFAULT_EXCLUDES};
use crate::transport::{ConnectionParams, HostKeyPolicy, DEFAULT_PORT};

/// Name of the per-project config file, looked up in the project root
pub const PROJECT_CONFIG: &str = "deploy.toml";

/// Contents of a deploy config file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Path to the private key
    pub key: Option<String>,
    pub passphrase: Option<String>,
    pub remote_dir: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub exclude_mode: Option<MatchMode>,
    #[serde(default)]
    pub insecure_accept_any_host_key: bool,
    pub known_hosts: Option<String>,
    pub compose_command: Option<String>,
    pub compose_file: Option<String>,
    #[serde(default)]
    pub load_env: bool,
}

impl FileConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Find and load the config file.
    ///
    /// An explicit path must exist. Otherwise `<project_root>/deploy.toml`
    /// is tried, then the user config file; with neither present the
    /// defaults are used.
    pub fn discover(
        explicit: Option<&Path>,
        project_root: &Path,
        paths: &Paths,
    ) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        for candidate in [project_root.join(PROJECT_CONFIG), paths.config_file()] {
            if candidate.exists() {
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }

        Ok((Self::default(), None))
    }
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub key: Option<String>,
    pub remote_dir: Option<String>,
    /// Appended to the configured exclusions
    pub exclude: Vec<String>,
    pub exclude_mode: Option<MatchMode>,
    pub insecure_accept_any_host_key: bool,
    pub load_env: bool,
}

/// Fully resolved deploy settings
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub connection: ConnectionParams,
    pub remote_dir: String,
    pub exclusions: ExclusionSet,
    pub rebuild: RebuildCommand,
    pub load_env: bool,
}

impl DeployConfig {
    /// Merge file values, overrides and defaults
    pub fn resolve(file: FileConfig, overrides: Overrides, paths: &Paths) -> Result<Self> {
        let user = overrides
            .user
            .or(file.user)
            .context("Missing configuration value: user")?;
        let host = overrides
            .host
            .or(file.host)
            .context("Missing configuration value: host")?;
        let key = overrides
            .key
            .or(file.key)
            .context("Missing configuration value: key")?;

        if user.is_empty() || host.is_empty() {
            bail!("Remote user and host must not be empty");
        }

        let remote_dir = overrides
            .remote_dir
            .or(file.remote_dir)
            .unwrap_or_else(|| "/saas".to_string());
        if !remote_dir.starts_with('/') {
            bail!("Remote project directory must be absolute: {}", remote_dir);
        }

        let accept_any = overrides.insecure_accept_any_host_key || file.insecure_accept_any_host_key;
        let host_key_policy = if accept_any {
            HostKeyPolicy::AcceptAny
        } else {
            HostKeyPolicy::Verify {
                known_hosts: file
                    .known_hosts
                    .as_deref()
                    .map(expand_path)
                    .unwrap_or_else(|| paths.known_hosts()),
            }
        };

        let connection = ConnectionParams::new(&user, &host, expand_path(&key))
            .with_port(overrides.port.or(file.port).unwrap_or(DEFAULT_PORT))
            .with_passphrase(file.passphrase)
            .with_host_key_policy(host_key_policy);

        let mut fragments = file
            .exclude
            .unwrap_or_else(|| DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect());
        fragments.extend(overrides.exclude);
        let exclusions = ExclusionSet::new(fragments).with_mode(
            overrides
                .exclude_mode
                .or(file.exclude_mode)
                .unwrap_or_default(),
        );

        let defaults = RebuildCommand::default();
        let rebuild = RebuildCommand {
            compose_command: file.compose_command.unwrap_or(defaults.compose_command),
            compose_file: file.compose_file.unwrap_or(defaults.compose_file),
        };

        Ok(Self {
            connection,
            remote_dir,
            exclusions,
            rebuild,
            load_env: overrides.load_env || file.load_env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn minimal() -> FileConfig {
        toml::from_str(
            r#"
            user = "deploy"
            host = "203.0.113.7"
            key = "/keys/id_ed25519"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = DeployConfig::resolve(minimal(), Overrides::default(), &Paths::new()).unwrap();

        assert_eq!(config.connection.user, "deploy");
        assert_eq!(config.connection.port, 22);
        assert_eq!(config.connection.key_path, PathBuf::from("/keys/id_ed25519"));
        assert_eq!(config.remote_dir, "/saas");
        assert_eq!(config.exclusions, ExclusionSet::default());
        assert_eq!(config.rebuild, RebuildCommand::default());
        assert!(matches!(
            config.connection.host_key_policy,
            HostKeyPolicy::Verify { .. }
        ));
        assert!(!config.load_env);
    }

    #[test]
    fn test_full_file() {
        let file: FileConfig = toml::from_str(
            r#"
            user = "ops"
            host = "deploy.example.com"
            port = 2222
            key = "/keys/ops"
            remote_dir = "/srv/saas"
            exclude = [".git", "node_modules"]
            exclude_mode = "segment"
            known_hosts = "/etc/ssh/ssh_known_hosts"
            compose_command = "docker compose"
            compose_file = "compose.yml"
            load_env = true
            "#,
        )
        .unwrap();

        let config = DeployConfig::resolve(file, Overrides::default(), &Paths::new()).unwrap();
        assert_eq!(config.connection.addr(), "deploy.example.com:2222");
        assert_eq!(config.remote_dir, "/srv/saas");
        assert_eq!(config.exclusions.fragments(), &[".git", "node_modules"]);
        assert_eq!(config.exclusions.mode(), MatchMode::Segment);
        assert_eq!(
            config.connection.host_key_policy,
            HostKeyPolicy::Verify {
                known_hosts: PathBuf::from("/etc/ssh/ssh_known_hosts")
            }
        );
        assert_eq!(config.rebuild.compose_command, "docker compose");
        assert!(config.load_env);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            host: Some("10.0.0.5".to_string()),
            port: Some(2200),
            remote_dir: Some("/opt/saas".to_string()),
            exclude: vec!["docs".to_string()],
            insecure_accept_any_host_key: true,
            ..Default::default()
        };

        let config = DeployConfig::resolve(minimal(), overrides, &Paths::new()).unwrap();
        assert_eq!(config.connection.addr(), "10.0.0.5:2200");
        assert_eq!(config.remote_dir, "/opt/saas");
        assert_eq!(config.connection.host_key_policy, HostKeyPolicy::AcceptAny);
        assert_eq!(config.exclusions.fragments().last().map(String::as_str), Some("docs"));
        assert_eq!(config.exclusions.fragments().len(), DEFAULT_EXCLUDES.len() + 1);
    }

    #[test]
    fn test_missing_host() {
        let file: FileConfig = toml::from_str("user = \"deploy\"\nkey = \"/k\"\n").unwrap();
        let err = DeployConfig::resolve(file, Overrides::default(), &Paths::new()).unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_relative_remote_dir_rejected() {
        let overrides = Overrides {
            remote_dir: Some("saas".to_string()),
            ..Default::default()
        };
        assert!(DeployConfig::resolve(minimal(), overrides, &Paths::new()).is_err());
    }

    #[test]
    fn test_discover_project_file() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(PROJECT_CONFIG), "host = \"project.example\"\n")?;

        let (file, source) = FileConfig::discover(None, dir.path(), &Paths::new())?;
        assert_eq!(file.host.as_deref(), Some("project.example"));
        assert_eq!(source, Some(dir.path().join(PROJECT_CONFIG)));
        Ok(())
    }

    #[test]
    fn test_discover_explicit_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(FileConfig::discover(Some(&missing), dir.path(), &Paths::new()).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        fs::write(&path, "port = \"twenty-two\"\n").unwrap();
        let err = FileConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}

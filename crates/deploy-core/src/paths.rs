//! Standard paths used by the deploy tools

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Standard deploy-tool paths
pub struct Paths {
    /// Config directory (~/.config/saas-deploy)
    pub config: PathBuf,
    /// Home directory, if one can be determined
    pub home: Option<PathBuf>,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("saas-deploy");

        Self {
            config,
            home: dirs::home_dir(),
        }
    }

    /// User-level config file (~/.config/saas-deploy/config.toml)
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Default OpenSSH known_hosts file
    pub fn known_hosts(&self) -> PathBuf {
        self.home
            .clone()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".ssh")
            .join("known_hosts")
    }
}

/// Resolve the project root: the parent of the current working directory.
pub fn project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;
    project_root_from(&cwd)
}

/// Resolve the project root relative to an explicit working directory
pub fn project_root_from(cwd: &Path) -> Result<PathBuf> {
    cwd.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("Working directory has no parent: {}", cwd.display()))
}

/// Expand a leading `~` or `~/` to the home directory.
///
/// Paths of the form `~user/...` are returned unchanged.
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            let expanded = if path == "~" {
                home
            } else if let Some(rest) = path.strip_prefix("~/") {
                home.join(rest)
            } else {
                return Cow::Borrowed(path);
            };
            return Cow::Owned(expanded.to_string_lossy().into_owned());
        }
    }
    Cow::Borrowed(path)
}

/// [`expand_tilde`] as a `PathBuf`
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(expand_tilde(path).as_ref())
}

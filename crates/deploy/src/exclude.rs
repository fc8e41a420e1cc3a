//! Path exclusion rules for the tree sync

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Paths left out of a deployment unless configured otherwise
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "scripts",
    ".dockerignore",
    ".env",
    ".gitignore",
    "docker-compose-development.yml",
    "docker-compose-staging.yml",
    "LICENSE",
    "mailserver_setup.sh",
    "mailserver.env",
    "docker-data",
];

/// How a fragment is compared against a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Fragment appears anywhere in the full path string
    Substring,
    /// Fragment equals one whole component of the project-relative path
    Segment,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::Segment => "segment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "substring" => Some(Self::Substring),
            "segment" => Some(Self::Segment),
            _ => None,
        }
    }
}

impl Default for MatchMode {
    fn default() -> Self {
        Self::Substring
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered list of path fragments to skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    fragments: Vec<String>,
    mode: MatchMode,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect())
    }
}

impl ExclusionSet {
    /// Build a set from fragments. Empty fragments are dropped, since in
    /// substring mode they would match every path.
    pub fn new(fragments: Vec<String>) -> Self {
        Self {
            fragments: fragments.into_iter().filter(|f| !f.is_empty()).collect(),
            mode: MatchMode::default(),
        }
    }

    /// A set that excludes nothing
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Append a fragment
    pub fn exclude(mut self, fragment: &str) -> Self {
        if !fragment.is_empty() {
            self.fragments.push(fragment.to_string());
        }
        self
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// First fragment that excludes this entry.
    ///
    /// `full` is the path as walked; `relative` is the same path relative to
    /// the project root. Substring mode looks at `full`, segment mode at the
    /// components of `relative`.
    pub fn matching_fragment(&self, full: &Path, relative: &Path) -> Option<&str> {
        match self.mode {
            MatchMode::Substring => {
                let full = full.to_string_lossy();
                self.fragments
                    .iter()
                    .find(|f| full.contains(f.as_str()))
                    .map(String::as_str)
            }
            MatchMode::Segment => self
                .fragments
                .iter()
                .find(|f| relative.components().any(|c| c.as_os_str() == f.as_str()))
                .map(String::as_str),
        }
    }
}

//! Compose environment setup
//!
//! Wraps the Docker Compose CLI to build and start one of the project's
//! named environments from `docker-compose-<env>.yml`.

use anyhow::{bail, Context, Result};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info};
use which::which;

/// Errors specific to environment setup
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("No compose command found. Install the Docker Compose plugin or docker-compose.")]
    ComposeNotAvailable,

    #[error("The docker setup environment '{0}' is not valid (expected development, staging or production)")]
    UnknownEnvironment(String),

    #[error("Compose file not found: {}", .0.display())]
    ComposeFileMissing(PathBuf),
}

/// A named compose environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "development" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    /// Parse an environment name, failing with [`SetupError::UnknownEnvironment`]
    pub fn parse(s: &str) -> Result<Self> {
        match Self::from_str(s) {
            Some(env) => Ok(env),
            None => bail!(SetupError::UnknownEnvironment(s.to_string())),
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Development, Self::Staging, Self::Production]
    }

    /// Compose file for this environment under the project root
    pub fn compose_file(&self, project_root: &Path) -> PathBuf {
        project_root.join(format!("docker-compose-{}.yml", self.as_str()))
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which compose executable is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCli {
    /// `docker compose` (v2 plugin)
    Plugin,
    /// `docker-compose` (v1 standalone)
    Standalone,
}

impl ComposeCli {
    /// Program and leading arguments
    pub fn invocation(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Plugin => ("docker", &["compose"]),
            Self::Standalone => ("docker-compose", &[]),
        }
    }

    /// Prefer the v2 plugin, fall back to standalone docker-compose
    pub fn detect() -> Result<Self> {
        if Command::new("docker")
            .args(["compose", "version"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
        {
            return Ok(Self::Plugin);
        }
        if which("docker-compose").is_ok() {
            return Ok(Self::Standalone);
        }
        bail!(SetupError::ComposeNotAvailable);
    }
}

/// Compose argument lists to run, in order.
///
/// A clean setup is only meaningful for development, where it rebuilds
/// images without cache before starting them. Other environments always
/// build as part of `up`.
pub fn plan(env: Environment, compose_file: &Path, clean: bool) -> Vec<Vec<String>> {
    let file = compose_file.to_string_lossy().into_owned();
    let base = |rest: &[&str]| {
        let mut args = vec!["-f".to_string(), file.clone()];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    };

    if clean && env == Environment::Development {
        vec![base(&["build", "--no-cache"]), base(&["up", "-d"])]
    } else {
        vec![base(&["up", "-d", "--build"])]
    }
}

/// Runs compose commands for one project
pub struct Compose {
    cli: ComposeCli,
}

impl Compose {
    /// Create a runner with an auto-detected compose CLI
    pub fn new() -> Result<Self> {
        Ok(Self {
            cli: ComposeCli::detect()?,
        })
    }

    pub fn with_cli(cli: ComposeCli) -> Self {
        Self { cli }
    }

    /// Build the process for one compose invocation
    pub fn command(&self, args: &[String]) -> Command {
        let (program, leading) = self.cli.invocation();
        let mut cmd = Command::new(program);
        cmd.args(leading).args(args);
        cmd
    }

    /// Run each step, stopping at the first one that fails.
    ///
    /// Returns one record per step that ran; only the last can have failed.
    pub fn run_steps(&self, steps: &[Vec<String>]) -> Result<Vec<StepRun>> {
        let mut runs = Vec::new();
        for args in steps {
            debug!(?args, "Running compose");
            let (status, output) = run_combined(self.command(args))
                .with_context(|| format!("Failed to run compose {}", args.join(" ")))?;
            let run = StepRun {
                args: args.clone(),
                status,
                output,
            };
            let failed = !run.success();
            runs.push(run);
            if failed {
                break;
            }
        }
        Ok(runs)
    }

    /// Bring up `env` from the compose file under `project_root`
    pub fn setup(&self, env: Environment, project_root: &Path, clean: bool) -> Result<Vec<StepRun>> {
        let compose_file = env.compose_file(project_root);
        if !compose_file.is_file() {
            bail!(SetupError::ComposeFileMissing(compose_file));
        }

        info!(%env, clean, file = %compose_file.display(), "Setting up environment");
        self.run_steps(&plan(env, &compose_file, clean))
    }
}

/// One finished compose invocation
#[derive(Debug)]
pub struct StepRun {
    pub args: Vec<String>,
    pub status: ExitStatus,
    /// stdout and stderr, interleaved as written
    pub output: Vec<u8>,
}

impl StepRun {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `cmd` with stdout and stderr sharing one pipe
pub fn run_combined(mut cmd: Command) -> io::Result<(ExitStatus, Vec<u8>)> {
    let (mut reader, writer) = io::pipe()?;
    cmd.stdout(writer.try_clone()?).stderr(writer);

    let mut child = cmd.spawn()?;
    // The command holds write ends too; drop it or the read never sees EOF.
    drop(cmd);

    let mut output = Vec::new();
    reader.read_to_end(&mut output)?;
    let status = child.wait()?;
    Ok((status, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(step: &[String]) -> Vec<&str> {
        step.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_environment_names() {
        for env in Environment::all() {
            assert_eq!(Environment::from_str(env.as_str()), Some(*env));
        }
        assert_eq!(Environment::from_str("Production"), None);
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_unknown_environment() {
        let err = Environment::parse("qa").unwrap_err();
        assert!(err.to_string().contains("'qa' is not valid"));
        assert!(err.downcast_ref::<SetupError>().is_some());
    }

    #[test]
    fn test_compose_file_path() {
        let file = Environment::Development.compose_file(Path::new("/srv/app"));
        assert_eq!(file, PathBuf::from("/srv/app/docker-compose-development.yml"));
    }

    #[test]
    fn test_plan_regular() {
        let steps = plan(Environment::Staging, Path::new("/app/dc.yml"), false);
        assert_eq!(steps.len(), 1);
        assert_eq!(args(&steps[0]), ["-f", "/app/dc.yml", "up", "-d", "--build"]);
    }

    #[test]
    fn test_plan_clean_development() {
        let steps = plan(Environment::Development, Path::new("/app/dc.yml"), true);
        assert_eq!(steps.len(), 2);
        assert_eq!(args(&steps[0]), ["-f", "/app/dc.yml", "build", "--no-cache"]);
        assert_eq!(args(&steps[1]), ["-f", "/app/dc.yml", "up", "-d"]);
    }

    #[test]
    fn test_clean_ignored_outside_development() {
        let steps = plan(Environment::Production, Path::new("/app/dc.yml"), true);
        assert_eq!(args(&steps[0]), ["-f", "/app/dc.yml", "up", "-d", "--build"]);
    }

    #[test]
    fn test_invocation() {
        assert_eq!(ComposeCli::Plugin.invocation(), ("docker", &["compose"][..]));
        assert_eq!(ComposeCli::Standalone.invocation().0, "docker-compose");

        let cmd = Compose::with_cli(ComposeCli::Plugin).command(&["ps".to_string()]);
        assert_eq!(cmd.get_program(), "docker");
        let cmd_args: Vec<_> = cmd.get_args().collect();
        assert_eq!(cmd_args, ["compose", "ps"]);
    }

    #[test]
    fn test_setup_requires_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        let compose = Compose::with_cli(ComposeCli::Standalone);

        let err = compose
            .setup(Environment::Development, dir.path(), false)
            .unwrap_err();
        assert!(err.to_string().contains("docker-compose-development.yml"));
    }

    #[test]
    fn test_run_steps_empty() {
        let compose = Compose::with_cli(ComposeCli::Standalone);
        assert!(compose.run_steps(&[]).unwrap().is_empty());
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[cfg(unix)]
    #[test]
    fn test_run_combined_interleaves_streams() {
        let (status, output) =
            run_combined(shell("echo pulling; echo 'warning: no cache' >&2; echo started")).unwrap();

        assert!(status.success());
        assert_eq!(output, b"pulling\nwarning: no cache\nstarted\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_combined_keeps_failure_output() {
        let (status, output) = run_combined(shell("echo 'no such service: web' >&2; exit 3")).unwrap();

        assert_eq!(status.code(), Some(3));
        assert_eq!(output, b"no such service: web\n");
    }

    #[test]
    fn test_run_combined_missing_program() {
        let err = run_combined(Command::new("definitely-not-a-compose-binary")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

//! deploy - push the project to the production server
//!
//! Run from the project's `scripts/` directory. The parent directory is
//! copied to the server, then the backend and frontend services are
//! rebuilt with docker-compose.

use anyhow::{bail, Context, Result};
use clap::Parser;
use deploy::{
    config::{DeployConfig, FileConfig, Overrides},
    deployer::{Deployer, Phases},
    exclude::MatchMode,
    sync::{Action, TreeSync},
    transport::SshConnector,
    DeployError,
};
use deploy_core::{envfile, paths, Paths};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deploy")]
#[command(about = "Mirror the project to a server over SFTP and rebuild its services")]
#[command(version)]
#[command(after_help = r#"WHEN TO USE:
    Shipping the current checkout to the production host. Every
    non-excluded file is copied in full; nothing is diffed or deleted.

CONFIGURATION:
    Read from --config, else <project>/deploy.toml, else
    ~/.config/saas-deploy/config.toml. Flags override file values.

    user = "deploy"
    host = "203.0.113.7"
    key = "~/.ssh/deploy_ed25519"
    remote_dir = "/saas"

EXAMPLES:
    deploy                          # sync, then rebuild backend + frontend
    deploy --dry-run                # show what would be copied
    deploy --skip-sync              # rebuild only
    deploy -x node_modules          # exclude one more path fragment
    deploy --load-env               # export <project>/.env before rebuilding

HOST KEYS:
    The server must be listed in ~/.ssh/known_hosts (or known_hosts in the
    config). --insecure-accept-any-host-key disables the check.

LOGGING:
    RUST_LOG=deploy=debug deploy    # log every mkdir and copy
"#)]
struct Cli {
    /// Config file to use
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Local project root (default: parent of the working directory)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Remote host name or address
    #[arg(long)]
    host: Option<String>,

    /// Remote user
    #[arg(long, short)]
    user: Option<String>,

    /// SSH port
    #[arg(long, short)]
    port: Option<u16>,

    /// Path to the private key
    #[arg(long, short)]
    key: Option<String>,

    /// Remote project directory
    #[arg(long)]
    remote_dir: Option<String>,

    /// Additional exclusion fragment (repeatable)
    #[arg(long, short = 'x')]
    exclude: Vec<String>,

    /// Exclusion matching: substring or segment
    #[arg(long)]
    exclude_mode: Option<String>,

    /// Accept any host key instead of checking known_hosts
    #[arg(long)]
    insecure_accept_any_host_key: bool,

    /// Export <project>/.env in the rebuild shell
    #[arg(long)]
    load_env: bool,

    /// Only rebuild; do not copy files
    #[arg(long, conflicts_with = "skip_rebuild")]
    skip_sync: bool,

    /// Only copy files; do not rebuild
    #[arg(long)]
    skip_rebuild: bool,

    /// Show what would be copied and run, without connecting
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        match err.downcast_ref::<DeployError>() {
            Some(deploy_err) => {
                error!(kind = deploy_err.kind(), "{:#}", err);
                if let Some(output) = deploy_err.remote_output() {
                    eprintln!("{}", output);
                }
            }
            None => error!("{:#}", err),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let project_root = match cli.project_root {
        Some(root) => root,
        None => paths::project_root()?,
    };
    let project_root = project_root
        .canonicalize()
        .with_context(|| format!("Project root not found: {}", project_root.display()))?;

    let paths = Paths::new();
    let (file, source) = FileConfig::discover(cli.config.as_deref(), &project_root, &paths)?;
    if let Some(source) = &source {
        info!(config = %source.display(), "Loaded configuration");
    }

    let exclude_mode = match cli.exclude_mode.as_deref() {
        Some(mode) => match MatchMode::from_str(mode) {
            Some(mode) => Some(mode),
            None => bail!("Unknown exclude mode '{}' (expected substring or segment)", mode),
        },
        None => None,
    };

    let overrides = Overrides {
        user: cli.user,
        host: cli.host,
        port: cli.port,
        key: cli.key,
        remote_dir: cli.remote_dir,
        exclude: cli.exclude,
        exclude_mode,
        insecure_accept_any_host_key: cli.insecure_accept_any_host_key,
        load_env: cli.load_env,
    };
    let config = DeployConfig::resolve(file, overrides, &paths)?;

    let exports = if config.load_env {
        envfile::load_env_file(&project_root.join(".env"))?
    } else {
        Vec::new()
    };
    let command = config.rebuild.render(&config.remote_dir, &exports);

    let tree = TreeSync::new(project_root, &config.remote_dir, config.exclusions.clone());
    let phases = Phases {
        sync: !cli.skip_sync,
        rebuild: !cli.skip_rebuild,
    };

    if cli.dry_run {
        return dry_run(&tree, &command, phases, &config);
    }

    let deployer = Deployer::new(SshConnector::new(config.connection.clone()), tree, command);
    let report = deployer.deploy(phases)?;

    if let Some(sync) = &report.sync {
        println!(
            "Copied {} files ({} bytes) in {} directories, skipped {} entries.",
            sync.files, sync.bytes, sync.directories, sync.skipped
        );
    }
    if let Some(output) = &report.output {
        print!("{}", String::from_utf8_lossy(output));
        println!("Services rebuilt and restarted successfully.");
    }

    Ok(())
}

fn dry_run(tree: &TreeSync, command: &str, phases: Phases, config: &DeployConfig) -> Result<()> {
    println!("Target: {}", config.connection.display_address());

    if phases.sync {
        let plan = tree.plan()?;
        for entry in &plan {
            match &entry.action {
                Action::Mkdir => println!("  mkdir  {}", entry.remote),
                Action::Copy => println!("  copy   {} -> {}", entry.local.display(), entry.remote),
                Action::Excluded(fragment) => {
                    println!("  skip   {} (matches '{}')", entry.local.display(), fragment)
                }
                Action::SkippedLink => println!("  skip   {} (symlink)", entry.local.display()),
            }
        }
    }

    if phases.rebuild {
        println!("Would run: {}", command);
    }

    Ok(())
}

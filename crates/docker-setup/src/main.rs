//! docker-setup - bring up a compose environment for the project
//!
//! Run from the project's `scripts/` directory; the compose files live one
//! level up as `docker-compose-<environment>.yml`.

use anyhow::Result;
use clap::Parser;
use deploy_core::paths;
use docker_setup::{Compose, Environment};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docker-setup")]
#[command(about = "Bring up the development, staging or production compose environment")]
#[command(version)]
#[command(after_help = r#"AVAILABLE ENVIRONMENTS:
    development     Sets up the development environment.
    staging         Sets up the staging environment.
    production      Sets up the production environment.

EXAMPLES:
    docker-setup --setup development            # up -d --build
    docker-setup --setup development --clean    # build --no-cache, then up -d
    docker-setup --setup staging

COMPOSE:
    Uses `docker compose` when the plugin is installed, otherwise
    `docker-compose`.
"#)]
struct Cli {
    /// Name of the docker setup (development, staging, production)
    #[arg(long)]
    setup: String,

    /// Clean entire local development environment and start from scratch
    #[arg(long)]
    clean: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}

/// Returns whether the compose command succeeded
fn run(cli: Cli) -> Result<bool> {
    let env = Environment::parse(&cli.setup)?;
    let project_root = paths::project_root()?;

    println!("Running setup environment: {} (clean: {})", env, cli.clean);

    let compose = Compose::new()?;
    let runs = compose.setup(env, &project_root, cli.clean)?;

    for run in &runs {
        print!("{}", String::from_utf8_lossy(&run.output));
        if !run.success() {
            error!(
                status = ?run.status.code(),
                args = %run.args.join(" "),
                "Compose command failed"
            );
            return Ok(false);
        }
    }

    Ok(true)
}

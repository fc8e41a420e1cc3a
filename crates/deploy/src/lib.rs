//! deploy - Mirror a project to a server and rebuild its services
//!
//! Copies the project tree over SFTP, skipping excluded paths, then runs
//! `docker-compose ... up -d --build` on the server over a second SSH
//! connection.

pub mod config;
pub mod credential;
pub mod deployer;
pub mod error;
pub mod exclude;
pub mod exec;
pub mod sftp;
pub mod sync;
pub mod transport;

pub use config::{DeployConfig, FileConfig, Overrides};
pub use deployer::{Deployer, Phases, RebuildCommand};
pub use error::{DeployError, Result};
pub use exclude::{ExclusionSet, MatchMode};
pub use sync::{RemoteFs, SyncReport, TreeSync};
pub use transport::{ConnectionParams, HostKeyPolicy, SshConnector, Transport};

//! deploy-core - Shared functionality for the saas deploy tools
//!
//! Both `deploy` and `docker-setup` run from the project's `scripts/`
//! directory and operate on the tree one level above it.

pub mod envfile;
pub mod paths;

pub use paths::Paths;

//! # tfs-mover
//!
//! Mirror every repository of a TFS (Azure DevOps Server) collection to Bitbucket
//!
//! Each repository is mirror-cloned into the work directory, created as a
//! private repository on Bitbucket, repointed and mirror-pushed. Repositories
//! are processed one after the other; a failure only stops the repository it
//! happened to.
//!
//! ## Usage
//!
//! ```txt
//! Usage: tfs-mover [OPTIONS]
//!
//! Options:
//!   -c, --config <CONFIG>      Custom configuration file path
//!       --show-config-path     Show the default config path
//!   -w, --work-dir <WORK_DIR>  Directory receiving the local mirrors (default: tfs)
//!   -o, --only <NAME>          Only migrate the repository with this name (repeatable)
//!   -r, --resolve-existing     Reuse a destination repository that already exists instead of failing
//!       --report <PATH>        Write the outcome of every repository to this JSON file
//!   -v, --verbose...           Verbose mode (-v, -vv, -vvv)
//!   -q, --quiet                Only log warnings and errors
//!   -h, --help                 Print help
//!   -V, --version              Print version
//! ```
//!
//! Credentials come from the environment (or a `.env` file): `TFS_URL`,
//! `TFS_USERNAME`, `TFS_PASSWORD`, `TFS_PAT`, `BITBUCKET_REPO_OWNER`,
//! `BITBUCKET_USER` and `BITBUCKET_PASSWORD`.

#![warn(clippy::all, rust_2018_idioms)]
#![deny(
    missing_docs,
    clippy::all,
    clippy::missing_docs_in_private_items,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![warn(clippy::multiple_crate_versions)]

pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod macros;
pub(crate) mod migrate;
pub(crate) mod mirror;
pub(crate) mod platform;
pub(crate) mod utils;

mod bitbucket;
mod tfs;

pub use bitbucket::{config::BitbucketConfig, platform::BitbucketProvisioner};
pub use cli::{tfs_mover_main, write_report, MoverCli};
pub use config::{ConfigData, MoverConfig, DEFAULT_WORK_DIR};
pub use errors::{MoverError, MoverErrorKind, Stage};
pub use migrate::{
    main_migrate, LogReporter, MigrationRecord, MigrationState, Migrator, ProgressMarker,
    ProgressReporter,
};
pub use mirror::{Credentials, Git2Mirror};
pub use platform::{
    BoxFuture, DestinationProvisioner, MirrorCloner, MirrorPusher, RemoteRepointer, SourceLister,
};
pub use tfs::{config::TfsConfig, platform::TfsLister};
pub use utils::{embed_credentials, slugify, DestinationRepository, LocalMirror, SourceRepository};

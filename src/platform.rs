//! Capability traits for the migration stages
use std::{future::Future, pin::Pin};

use crate::{
    errors::MoverError,
    utils::{DestinationRepository, LocalMirror, SourceRepository},
};

/// Boxed future returned by the network-backed capabilities
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MoverError>> + Send + 'a>>;

/// Source server able to list every repository to migrate
pub trait SourceLister: Sync + Send {
    /// List all repositories of the source server
    /// # Errors
    /// Listing error if the server can't be queried or answers unexpectedly
    fn list(&self) -> BoxFuture<'_, Vec<SourceRepository>>;
}

/// Destination provider able to create repositories
pub trait DestinationProvisioner: Sync + Send {
    /// Create the destination repository for `name` and return where to push
    /// # Errors
    /// Provision error, or ProvisionConflict if the repository already exists
    fn provision<'a>(&'a self, name: &'a str) -> BoxFuture<'a, DestinationRepository>;
}

/// Produces local bare mirrors
pub trait MirrorCloner: Sync + Send {
    /// Mirror-clone `fetch_url` into the work directory under `name`
    /// # Errors
    /// Clone error if the mirror path already exists or the fetch fails
    fn clone_mirror(&self, fetch_url: &str, name: &str) -> Result<LocalMirror, MoverError>;
}

/// Rewrites the remote of a local mirror
pub trait RemoteRepointer: Sync + Send {
    /// Point the mirror's remote at `push_url`, replacing the previous value
    /// # Errors
    /// Repoint error if the mirror is missing or not a repository
    fn repoint(&self, mirror: &LocalMirror, push_url: &str) -> Result<(), MoverError>;
}

/// Pushes every ref of a local mirror
pub trait MirrorPusher: Sync + Send {
    /// Mirror-push to the configured remote
    /// # Errors
    /// Push error naming the repository
    fn push(&self, mirror: &LocalMirror) -> Result<(), MoverError>;
}

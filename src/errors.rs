//! Error handling for the tfs-mover crate.
use std::{error::Error as StdError, fmt};

use serde::Serialize;

/// Error type for the tfs-mover crate.
#[derive(Debug)]
pub struct MoverError {
    /// Inner error.
    inner: Box<Inner>,
}

impl MoverError {
    /// Create a new error.
    pub(crate) fn new(kind: MoverErrorKind) -> Self {
        Self {
            inner: Box::new(Inner {
                kind,
                repo: None,
                source: None,
            }),
        }
    }

    /// Attach a plain text source to the error.
    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.inner.source = Some(Box::new(std::io::Error::other(text)));
        self
    }

    /// Attach a source error.
    pub(crate) fn with_source<E: Into<BoxError>>(mut self, source: E) -> Self {
        self.inner.source = Some(source.into());
        self
    }

    /// Attach the name of the repository being processed.
    pub(crate) fn with_repo(mut self, repo: &str) -> Self {
        self.inner.repo = Some(repo.to_string());
        self
    }

    /// Build a `map_err` adapter wrapping any error into the given kind.
    pub(crate) fn wrap<E: Into<BoxError>>(kind: MoverErrorKind) -> impl FnOnce(E) -> Self {
        move |e| Self::new(kind).with_source(e)
    }

    /// Kind of the error.
    pub fn kind(&self) -> MoverErrorKind {
        self.inner.kind
    }

    /// Repository the error is about, if any.
    pub fn repo(&self) -> Option<&str> {
        self.inner.repo.as_deref()
    }
}

/// Type alias for a boxed error.
pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Inner error type for the tfs-mover crate.
#[derive(Debug)]
struct Inner {
    /// Error kind.
    kind: MoverErrorKind,

    /// Repository name
    repo: Option<String>,

    /// Source error.
    source: Option<BoxError>,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoverErrorKind {
    /// The source repository list could not be obtained.
    Listing,

    /// The mirror clone failed.
    Clone,

    /// The destination repository could not be created.
    Provision,

    /// The destination repository already exists.
    ProvisionConflict,

    /// The mirror remote could not be rewritten.
    Repoint,

    /// The mirror push failed.
    Push,

    /// Invalid or unreadable configuration.
    Config,

    /// Filesystem error outside of a stage.
    Io,

    /// The run report could not be written.
    Report,
}

impl MoverErrorKind {
    /// Stage this kind of error belongs to, if it is repository-scoped.
    pub fn stage(self) -> Option<Stage> {
        match self {
            MoverErrorKind::Clone => Some(Stage::Clone),
            MoverErrorKind::Provision | MoverErrorKind::ProvisionConflict => {
                Some(Stage::Provision)
            }
            MoverErrorKind::Repoint => Some(Stage::Repoint),
            MoverErrorKind::Push => Some(Stage::Push),
            MoverErrorKind::Listing
            | MoverErrorKind::Config
            | MoverErrorKind::Io
            | MoverErrorKind::Report => None,
        }
    }
}

impl fmt::Display for MoverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MoverErrorKind::Listing => "listing failed",
            MoverErrorKind::Clone => "clone failed",
            MoverErrorKind::Provision => "provision failed",
            MoverErrorKind::ProvisionConflict => "destination already exists",
            MoverErrorKind::Repoint => "repoint failed",
            MoverErrorKind::Push => "push failed",
            MoverErrorKind::Config => "configuration error",
            MoverErrorKind::Io => "io error",
            MoverErrorKind::Report => "report error",
        };
        f.write_str(text)
    }
}

/// One of the four ordered operations applied to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Mirror clone from the source
    Clone,
    /// Destination repository creation
    Provision,
    /// Remote rewrite
    Repoint,
    /// Mirror push to the destination
    Push,
}

impl Stage {
    /// Human readable action logged before the stage starts.
    pub fn action(self) -> &'static str {
        match self {
            Stage::Clone => "Cloning repo",
            Stage::Provision => "Creating repo",
            Stage::Repoint => "Changing remote of",
            Stage::Push => "Pushing to remote",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Clone => write!(f, "clone"),
            Stage::Provision => write!(f, "provision"),
            Stage::Repoint => write!(f, "repoint"),
            Stage::Push => write!(f, "push"),
        }
    }
}

impl fmt::Display for MoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.kind)?;
        if let Some(repo) = &self.inner.repo {
            write!(f, " for \"{repo}\"")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for MoverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<std::io::Error> for MoverError {
    fn from(e: std::io::Error) -> Self {
        Self::new(MoverErrorKind::Io).with_source(e)
    }
}

impl From<toml::de::Error> for MoverError {
    fn from(e: toml::de::Error) -> Self {
        Self::new(MoverErrorKind::Config).with_source(e)
    }
}

impl From<serde_json::Error> for MoverError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(MoverErrorKind::Report).with_source(e)
    }
}

impl From<&str> for MoverError {
    fn from(text: &str) -> Self {
        Self::new(MoverErrorKind::Config).with_text(text)
    }
}

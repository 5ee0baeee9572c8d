//! # Error Types
//!
//! Failures are typed by cause and tagged with the stage they happened in, so
//! callers never have to inspect message text to tell "absent" from "broken".
//! Causes are rendered into each message rather than chained as `source()`,
//! so printing an error with `{:#}` shows every part once.

use std::fmt;
use thiserror::Error;

use crate::publish::PublishStage;

/// Invalid settings, reported once at the pipeline boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("analysis window must be greater than zero")]
    InvalidWindow,

    #[error("number of code owners must be greater than zero, got {0}")]
    InvalidLimit(i64),

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("path pattern '{0}' must contain the {{author}} placeholder and no whitespace")]
    InvalidPathPattern(String),

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Failures reported by the hosting-service collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostingError {
    /// Network, authentication or service failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Repository (or another required object) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Branch or pull request name already taken
    #[error("conflict: {0}")]
    Conflict(String),

    /// The base revision moved since it was read
    #[error("stale revision: {0}")]
    StaleRevision(String),
}

impl HostingError {
    /// Whether re-running with a fresh base revision may succeed.
    pub fn is_race(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StaleRevision(_))
    }
}

/// Failure of the publish sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Nothing was mutated on the hosting service.
    #[error("{stage} failed: {cause}")]
    Failed {
        stage: PublishStage,
        cause: HostingError,
    },

    /// At least the branch was created before `stage` failed.
    #[error("{stage} failed after branch '{branch}' was created: {cause}")]
    Partial {
        stage: PublishStage,
        branch: String,
        cause: HostingError,
    },

    #[error("cancelled before {stage}")]
    Cancelled {
        stage: PublishStage,
        branch: Option<String>,
    },
}

impl PublishError {
    pub fn stage(&self) -> PublishStage {
        match self {
            Self::Failed { stage, .. }
            | Self::Partial { stage, .. }
            | Self::Cancelled { stage, .. } => *stage,
        }
    }

    /// Branch left behind on the hosting service, if any.
    pub fn leftover_branch(&self) -> Option<&str> {
        match self {
            Self::Failed { .. } => None,
            Self::Partial { branch, .. } => Some(branch),
            Self::Cancelled { branch, .. } => branch.as_deref(),
        }
    }
}

/// Stages of a reconciliation run that talk to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    ResolveBase,
    FetchCommits,
    FetchExisting,
    Publish,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolveBase => "resolve base revision",
            Self::FetchCommits => "fetch commits",
            Self::FetchExisting => "fetch existing CODEOWNERS",
            Self::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Top-level error of a reconciliation run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(ConfigError),

    #[error("{stage}: {cause}")]
    Hosting {
        stage: PipelineStage,
        cause: HostingError,
    },

    #[error("{stage}: local repository error: {cause}")]
    LocalGit {
        stage: PipelineStage,
        cause: git2::Error,
    },

    #[error("publish: {0}")]
    Publish(PublishError),

    #[error("cancelled before {stage}")]
    Cancelled { stage: PipelineStage },
}

impl Error {
    pub fn hosting(stage: PipelineStage, cause: HostingError) -> Self {
        Self::Hosting { stage, cause }
    }

    /// The stage the run stopped in, if it got past configuration.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Config(_) => None,
            Self::Hosting { stage, .. }
            | Self::LocalGit { stage, .. }
            | Self::Cancelled { stage } => Some(*stage),
            Self::Publish(_) => Some(PipelineStage::Publish),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<PublishError> for Error {
    fn from(err: PublishError) -> Self {
        Self::Publish(err)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

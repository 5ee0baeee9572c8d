//! # Hosting Service
//!
//! The narrow set of operations a reconciliation run needs from the service
//! that hosts the repository. [`GitHubClient`] talks to the GitHub REST API;
//! [`InMemoryHost`] keeps everything in process for tests and rehearsals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::HostingError;
use crate::types::{CommitRecord, PullRequestRef, RepositoryId, Revision};

pub mod github;
pub mod memory;

pub use github::GitHubClient;
pub use memory::{HostOperation, InMemoryHost};

/// A single-file commit on top of `parent`.
#[derive(Debug, Clone)]
pub struct NewCommit<'a> {
    pub branch: &'a str,
    pub parent: &'a Revision,
    pub path: &'a str,
    pub content: &'a str,
    pub message: &'a str,
}

/// A pull request from `from` into `to`.
#[derive(Debug, Clone)]
pub struct NewPullRequest<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// Operations consumed from the hosting service.
///
/// Every call is atomic from the caller's point of view. Implementations do
/// not retry.
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Commits reachable from `branch` authored at or after `since`.
    async fn list_commits(
        &self,
        repo: &RepositoryId,
        branch: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>, HostingError>;

    /// File content at `reference`; `Ok(None)` when the file does not exist.
    async fn get_file_content(
        &self,
        repo: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, HostingError>;

    async fn default_branch(&self, repo: &RepositoryId) -> Result<String, HostingError>;

    async fn branch_head(&self, repo: &RepositoryId, branch: &str)
        -> Result<Revision, HostingError>;

    /// Create `name` pointing at `from`, which must still be the head of
    /// `base_branch`. Returns the new branch head.
    async fn create_branch(
        &self,
        repo: &RepositoryId,
        name: &str,
        base_branch: &str,
        from: &Revision,
    ) -> Result<Revision, HostingError>;

    /// Returns the revision of the new commit, which becomes the branch head.
    async fn create_commit(
        &self,
        repo: &RepositoryId,
        commit: &NewCommit<'_>,
    ) -> Result<Revision, HostingError>;

    /// Opens the pull request, or returns the open one for the same branch pair
    /// with `created == false`.
    async fn create_pull_request(
        &self,
        repo: &RepositoryId,
        request: &NewPullRequest<'_>,
    ) -> Result<PullRequestRef, HostingError>;
}

//! In-process [`HostingClient`] with a deterministic revision counter.
//!
//! Holds one repository's branches, files, commits and pull requests. Calls
//! are recorded in order, and a failure can be queued for any operation to
//! exercise error paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{HostingClient, NewCommit, NewPullRequest};
use crate::error::HostingError;
use crate::types::{CommitRecord, PullRequestRef, RepositoryId, Revision};

/// Operations of [`HostingClient`], used for call logs and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOperation {
    ListCommits,
    GetFileContent,
    DefaultBranch,
    BranchHead,
    CreateBranch,
    CreateCommit,
    CreatePullRequest,
}

/// A pull request stored by [`InMemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPullRequest {
    pub number: u64,
    pub from: String,
    pub to: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct State {
    default_branch: String,
    // branch -> history visible from it
    commits: HashMap<String, Vec<CommitRecord>>,
    branches: HashMap<String, Revision>,
    // (revision, path) -> content
    files: HashMap<(Revision, String), String>,
    pulls: Vec<StoredPullRequest>,
    next_revision: u64,
    calls: Vec<HostOperation>,
    failures: HashMap<HostOperation, HostingError>,
}

impl State {
    fn mint_revision(&mut self) -> Revision {
        self.next_revision += 1;
        Revision(format!("rev-{}", self.next_revision))
    }

    /// Resolve a branch name or a revision id.
    fn resolve(&self, reference: &str) -> Option<Revision> {
        self.branches.get(reference).cloned().or_else(|| {
            let revision = Revision(reference.to_string());
            (self.branches.values().any(|r| *r == revision)
                || self.files.keys().any(|(r, _)| *r == revision))
            .then_some(revision)
        })
    }

    fn files_at(&self, revision: &Revision) -> Vec<(String, String)> {
        self.files
            .iter()
            .filter(|((r, _), _)| r == revision)
            .map(|((_, path), content)| (path.clone(), content.clone()))
            .collect()
    }
}

/// A single repository kept in memory.
pub struct InMemoryHost {
    repo: RepositoryId,
    state: Mutex<State>,
}

impl InMemoryHost {
    /// Repository with one empty commit on `default_branch`.
    pub fn new(repo: RepositoryId, default_branch: &str) -> Self {
        let mut state = State {
            default_branch: default_branch.to_string(),
            ..State::default()
        };
        let initial = state.mint_revision();
        state.branches.insert(default_branch.to_string(), initial);

        Self {
            repo,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and check the repository, consuming a queued failure.
    fn enter(&self, repo: &RepositoryId, operation: HostOperation) -> Result<MutexGuard<'_, State>, HostingError> {
        let mut state = self.lock();
        state.calls.push(operation);
        if let Some(err) = state.failures.remove(&operation) {
            return Err(err);
        }
        if *repo != self.repo {
            return Err(HostingError::NotFound(format!("repository {repo}")));
        }
        Ok(state)
    }

    /// Add commits to the history of the default branch.
    pub fn add_commits(&self, records: impl IntoIterator<Item = CommitRecord>) {
        let mut state = self.lock();
        let branch = state.default_branch.clone();
        state.commits.entry(branch).or_default().extend(records);
    }

    /// Add commits to the history of `branch` only.
    pub fn add_commits_on(&self, branch: &str, records: impl IntoIterator<Item = CommitRecord>) {
        self.lock()
            .commits
            .entry(branch.to_string())
            .or_default()
            .extend(records);
    }

    /// Commit `content` at `path` directly onto `branch`, moving its head.
    pub fn put_file(&self, branch: &str, path: &str, content: &str) -> Revision {
        let mut state = self.lock();
        let parent = state.branches.get(branch).cloned();
        let revision = state.mint_revision();
        if let Some(parent) = parent {
            for (existing_path, existing) in state.files_at(&parent) {
                state.files.insert((revision.clone(), existing_path), existing);
            }
        }
        state
            .files
            .insert((revision.clone(), path.to_string()), content.to_string());
        state.branches.insert(branch.to_string(), revision.clone());
        revision
    }

    /// Make the next call of `operation` fail with `err`.
    pub fn fail_next(&self, operation: HostOperation, err: HostingError) {
        self.lock().failures.insert(operation, err);
    }

    pub fn calls(&self) -> Vec<HostOperation> {
        self.lock().calls.clone()
    }

    pub fn branch(&self, name: &str) -> Option<Revision> {
        self.lock().branches.get(name).cloned()
    }

    pub fn branch_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().branches.keys().cloned().collect();
        names.sort();
        names
    }

    /// File content at the head of `branch`.
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let head = state.branches.get(branch)?;
        state.files.get(&(head.clone(), path.to_string())).cloned()
    }

    pub fn pull_requests(&self) -> Vec<StoredPullRequest> {
        self.lock().pulls.clone()
    }
}

#[async_trait]
impl HostingClient for InMemoryHost {
    async fn list_commits(
        &self,
        repo: &RepositoryId,
        branch: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>, HostingError> {
        let state = self.enter(repo, HostOperation::ListCommits)?;
        if !state.branches.contains_key(branch) {
            return Err(HostingError::NotFound(format!("branch {branch}")));
        }
        Ok(state
            .commits
            .get(branch)
            .into_iter()
            .flatten()
            .filter(|record| record.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, HostingError> {
        let state = self.enter(repo, HostOperation::GetFileContent)?;
        Ok(state
            .resolve(reference)
            .and_then(|revision| state.files.get(&(revision, path.to_string())).cloned()))
    }

    async fn default_branch(&self, repo: &RepositoryId) -> Result<String, HostingError> {
        let state = self.enter(repo, HostOperation::DefaultBranch)?;
        Ok(state.default_branch.clone())
    }

    async fn branch_head(
        &self,
        repo: &RepositoryId,
        branch: &str,
    ) -> Result<Revision, HostingError> {
        let state = self.enter(repo, HostOperation::BranchHead)?;
        state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("branch {branch}")))
    }

    async fn create_branch(
        &self,
        repo: &RepositoryId,
        name: &str,
        base_branch: &str,
        from: &Revision,
    ) -> Result<Revision, HostingError> {
        let mut state = self.enter(repo, HostOperation::CreateBranch)?;
        let current = state
            .branches
            .get(base_branch)
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("branch {base_branch}")))?;
        if current != *from {
            return Err(HostingError::StaleRevision(format!(
                "{base_branch} moved from {from} to {current}"
            )));
        }
        if state.branches.contains_key(name) {
            return Err(HostingError::Conflict(format!("branch {name} already exists")));
        }

        state.branches.insert(name.to_string(), from.clone());
        let history = state.commits.get(base_branch).cloned().unwrap_or_default();
        state.commits.insert(name.to_string(), history);
        Ok(from.clone())
    }

    async fn create_commit(
        &self,
        repo: &RepositoryId,
        commit: &NewCommit<'_>,
    ) -> Result<Revision, HostingError> {
        let mut state = self.enter(repo, HostOperation::CreateCommit)?;
        let head = state
            .branches
            .get(commit.branch)
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("branch {}", commit.branch)))?;
        if head != *commit.parent {
            return Err(HostingError::StaleRevision(format!(
                "{} is at {head}, not {}",
                commit.branch, commit.parent
            )));
        }

        let revision = state.mint_revision();
        for (path, content) in state.files_at(&head) {
            state.files.insert((revision.clone(), path), content);
        }
        state.files.insert(
            (revision.clone(), commit.path.to_string()),
            commit.content.to_string(),
        );
        state
            .branches
            .insert(commit.branch.to_string(), revision.clone());
        Ok(revision)
    }

    async fn create_pull_request(
        &self,
        repo: &RepositoryId,
        pull: &NewPullRequest<'_>,
    ) -> Result<PullRequestRef, HostingError> {
        let mut state = self.enter(repo, HostOperation::CreatePullRequest)?;
        let url = |number: u64| format!("https://example.invalid/{}/pull/{number}", self.repo);

        if let Some(existing) = state
            .pulls
            .iter()
            .find(|p| p.from == pull.from && p.to == pull.to)
        {
            return Ok(PullRequestRef {
                number: existing.number,
                url: url(existing.number),
                created: false,
            });
        }
        for branch in [pull.from, pull.to] {
            if !state.branches.contains_key(branch) {
                return Err(HostingError::NotFound(format!("branch {branch}")));
            }
        }

        let number = state.pulls.len() as u64 + 1;
        state.pulls.push(StoredPullRequest {
            number,
            from: pull.from.to_string(),
            to: pull.to.to_string(),
            title: pull.title.to_string(),
            body: pull.body.to_string(),
        });
        Ok(PullRequestRef {
            number,
            url: url(number),
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn host() -> (InMemoryHost, RepositoryId) {
        let repo = RepositoryId::new("octo", "widgets");
        (InMemoryHost::new(repo.clone(), "main"), repo)
    }

    #[tokio::test]
    async fn test_file_content_by_branch_and_revision() {
        let (host, repo) = host();
        let revision = host.put_file("main", "CODEOWNERS", "* @octo\n");

        let by_branch = host.get_file_content(&repo, "CODEOWNERS", "main").await.unwrap();
        let by_revision = host
            .get_file_content(&repo, "CODEOWNERS", revision.as_str())
            .await
            .unwrap();
        assert_eq!(by_branch.as_deref(), Some("* @octo\n"));
        assert_eq!(by_revision, by_branch);

        let missing = host.get_file_content(&repo, "OTHER", "main").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_unknown_repository() {
        let (host, _) = host();
        let other = RepositoryId::new("octo", "missing");
        let err = host.default_branch(&other).await.unwrap_err();
        assert!(matches!(err, HostingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_branch_conflict_and_stale() {
        let (host, repo) = host();
        let head = host.branch_head(&repo, "main").await.unwrap();

        host.create_branch(&repo, "topic", "main", &head).await.unwrap();
        let again = host.create_branch(&repo, "topic", "main", &head).await;
        assert!(matches!(again, Err(HostingError::Conflict(_))));

        host.put_file("main", "README", "moved\n");
        let stale = host.create_branch(&repo, "other", "main", &head).await;
        assert!(matches!(stale, Err(HostingError::StaleRevision(_))));
    }

    #[tokio::test]
    async fn test_commit_keeps_existing_files() {
        let (host, repo) = host();
        host.put_file("main", "README", "hello\n");
        let head = host.branch_head(&repo, "main").await.unwrap();
        host.create_branch(&repo, "topic", "main", &head).await.unwrap();

        let commit = NewCommit {
            branch: "topic",
            parent: &head,
            path: "CODEOWNERS",
            content: "* @octo\n",
            message: "Add owners",
        };
        let revision = host.create_commit(&repo, &commit).await.unwrap();

        assert_eq!(host.branch("topic"), Some(revision));
        assert_eq!(host.file("topic", "README").as_deref(), Some("hello\n"));
        assert_eq!(host.file("topic", "CODEOWNERS").as_deref(), Some("* @octo\n"));
        assert_eq!(host.file("main", "CODEOWNERS"), None);
    }

    #[tokio::test]
    async fn test_pull_request_is_idempotent() {
        let (host, repo) = host();
        let head = host.branch_head(&repo, "main").await.unwrap();
        host.create_branch(&repo, "topic", "main", &head).await.unwrap();

        let pull = NewPullRequest {
            from: "topic",
            to: "main",
            title: "Update",
            body: "",
        };
        let first = host.create_pull_request(&repo, &pull).await.unwrap();
        let second = host.create_pull_request(&repo, &pull).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.number, second.number);
        assert_eq!(host.pull_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_commits_are_listed_per_branch() {
        let (host, repo) = host();
        let at = Utc::now();
        host.add_commits([CommitRecord::new("main-dev", at)]);
        host.put_file("release", "README", "release\n");
        host.add_commits_on("release", [CommitRecord::new("release-dev", at)]);

        let main = host
            .list_commits(&repo, "main", at - chrono::Duration::days(1))
            .await
            .unwrap();
        let release = host
            .list_commits(&repo, "release", at - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(main, vec![CommitRecord::new("main-dev", at)]);
        assert_eq!(release, vec![CommitRecord::new("release-dev", at)]);

        let missing = host.list_commits(&repo, "gone", at).await;
        assert!(matches!(missing, Err(HostingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fail_next_is_single_shot() {
        let (host, repo) = host();
        host.fail_next(
            HostOperation::DefaultBranch,
            HostingError::Transport("boom".into()),
        );

        assert!(host.default_branch(&repo).await.is_err());
        assert_eq!(host.default_branch(&repo).await.unwrap(), "main");
        assert_eq!(
            host.calls(),
            vec![HostOperation::DefaultBranch, HostOperation::DefaultBranch]
        );
    }
}

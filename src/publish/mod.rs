//! # Publisher
//!
//! Drives `Idle → BranchCreated → CommitCreated → PullRequestOpened → Done`
//! against a [`HostingClient`]. Any external failure moves the machine to
//! `Failed` and is returned with the stage it happened in. Nothing is rolled
//! back: a branch left by a failed run is picked up by housekeeping.

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{HostingError, PublishError};
use crate::hosting::{HostingClient, NewCommit, NewPullRequest};
use crate::types::{PullRequestRef, RankedContributor, RepositoryId, Revision, TimeWindow};

pub const BRANCH_PREFIX: &str = "update-codeowners";
pub const COMMIT_MESSAGE: &str = "Update CODEOWNERS based on top contributors";

/// External steps of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishStage {
    CreateBranch,
    CreateCommit,
    OpenPullRequest,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateBranch => "create branch",
            Self::CreateCommit => "create commit",
            Self::OpenPullRequest => "open pull request",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    BranchCreated { branch: String, head: Revision },
    CommitCreated { branch: String, revision: Revision },
    PullRequestOpened { pull_request: PullRequestRef },
    Done { pull_request: PullRequestRef },
    Failed { stage: PublishStage, cause: HostingError },
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BranchCreated { .. } => "branch-created",
            Self::CommitCreated { .. } => "commit-created",
            Self::PullRequestOpened { .. } => "pull-request-opened",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Everything needed to publish one rendered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub branch: String,
    pub base_branch: String,
    pub base_revision: Revision,
    pub path: String,
    pub content: String,
    pub commit_message: String,
    pub title: String,
    pub body: String,
}

impl PublishRequest {
    /// Request with a fresh branch name derived from `created_at` and `content`.
    pub fn new(
        base_branch: impl Into<String>,
        base_revision: Revision,
        path: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            branch: branch_name(created_at, &content),
            base_branch: base_branch.into(),
            base_revision,
            path: path.into(),
            content,
            commit_message: COMMIT_MESSAGE.to_string(),
            title: COMMIT_MESSAGE.to_string(),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// `update-codeowners-<unix seconds>-<8 hex digits of sha256(content)>`.
///
/// The timestamp keeps runs apart; the hash tells content apart within a second.
pub fn branch_name(created_at: DateTime<Utc>, content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let short: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("{BRANCH_PREFIX}-{}-{short}", created_at.timestamp())
}

/// Pull request description listing the selected owners.
pub fn pull_request_body(ranked: &[RankedContributor], window: &TimeWindow, path: &str) -> String {
    let mut body = format!(
        "Regenerated `{path}` from commits between {} and {}.\n\nOwners by commit count:\n\n",
        window.since.format("%Y-%m-%d"),
        window.until.format("%Y-%m-%d"),
    );
    for contributor in ranked {
        body.push_str(&format!(
            "{}. {} ({} commits)\n",
            contributor.rank + 1,
            contributor.author,
            contributor.commits
        ));
    }
    body
}

/// Publish state machine for one run.
pub struct Publisher<'a> {
    client: &'a dyn HostingClient,
    repo: &'a RepositoryId,
    state: PublishState,
    history: Vec<PublishState>,
}

impl<'a> Publisher<'a> {
    pub fn new(client: &'a dyn HostingClient, repo: &'a RepositoryId) -> Self {
        Self {
            client,
            repo,
            state: PublishState::Idle,
            history: vec![PublishState::Idle],
        }
    }

    pub fn state(&self) -> &PublishState {
        &self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[PublishState] {
        &self.history
    }

    /// Run to completion. Cancellation is honoured between stages only.
    pub async fn run(
        &mut self,
        request: &PublishRequest,
        cancel: &CancellationToken,
    ) -> Result<PullRequestRef, PublishError> {
        loop {
            if let PublishState::Done { pull_request } = &self.state {
                return Ok(pull_request.clone());
            }
            if let Some(stage) = self.next_stage() {
                if cancel.is_cancelled() {
                    warn!(%stage, "publish cancelled");
                    return Err(PublishError::Cancelled {
                        stage,
                        branch: self.created_branch(request),
                    });
                }
            }
            self.advance(request).await?;
        }
    }

    /// Perform exactly one transition.
    pub async fn advance(&mut self, request: &PublishRequest) -> Result<(), PublishError> {
        let next = match &self.state {
            PublishState::Idle => self
                .client
                .create_branch(
                    self.repo,
                    &request.branch,
                    &request.base_branch,
                    &request.base_revision,
                )
                .await
                .map(|head| PublishState::BranchCreated {
                    branch: request.branch.clone(),
                    head,
                }),
            PublishState::BranchCreated { branch, head } => {
                // Parent is the new branch's head, not the base revision read earlier
                let commit = NewCommit {
                    branch,
                    parent: head,
                    path: &request.path,
                    content: &request.content,
                    message: &request.commit_message,
                };
                self.client
                    .create_commit(self.repo, &commit)
                    .await
                    .map(|revision| PublishState::CommitCreated {
                        branch: branch.clone(),
                        revision,
                    })
            }
            PublishState::CommitCreated { branch, .. } => {
                let pull = NewPullRequest {
                    from: branch,
                    to: &request.base_branch,
                    title: &request.title,
                    body: &request.body,
                };
                self.client
                    .create_pull_request(self.repo, &pull)
                    .await
                    .map(|pull_request| PublishState::PullRequestOpened { pull_request })
            }
            PublishState::PullRequestOpened { pull_request } => Ok(PublishState::Done {
                pull_request: pull_request.clone(),
            }),
            PublishState::Done { .. } => return Ok(()),
            PublishState::Failed { stage, cause } => {
                return Err(self.failure(*stage, cause.clone(), request));
            }
        };

        match next {
            Ok(state) => {
                self.enter(state);
                Ok(())
            }
            Err(cause) => {
                // next_stage is Some for every state that reaches an external call
                let stage = self.next_stage().unwrap_or(PublishStage::OpenPullRequest);
                let err = self.failure(stage, cause.clone(), request);
                warn!(%stage, error = %err, "publish failed");
                self.enter(PublishState::Failed { stage, cause });
                Err(err)
            }
        }
    }

    fn enter(&mut self, state: PublishState) {
        match &state {
            PublishState::BranchCreated { branch, head } => {
                info!(repo = %self.repo, %branch, %head, "created branch");
            }
            PublishState::CommitCreated { branch, revision } => {
                info!(repo = %self.repo, %branch, %revision, "created commit");
            }
            PublishState::PullRequestOpened { pull_request } => {
                info!(
                    repo = %self.repo,
                    number = pull_request.number,
                    created = pull_request.created,
                    "pull request open"
                );
            }
            _ => {}
        }
        self.history.push(state.clone());
        self.state = state;
    }

    /// Stage the next transition performs, `None` when it is not external.
    fn next_stage(&self) -> Option<PublishStage> {
        match self.state {
            PublishState::Idle => Some(PublishStage::CreateBranch),
            PublishState::BranchCreated { .. } => Some(PublishStage::CreateCommit),
            PublishState::CommitCreated { .. } => Some(PublishStage::OpenPullRequest),
            _ => None,
        }
    }

    fn created_branch(&self, request: &PublishRequest) -> Option<String> {
        self.history
            .iter()
            .any(|s| matches!(s, PublishState::BranchCreated { .. }))
            .then(|| request.branch.clone())
    }

    fn failure(&self, stage: PublishStage, cause: HostingError, request: &PublishRequest) -> PublishError {
        match self.created_branch(request) {
            Some(branch) => PublishError::Partial {
                stage,
                branch,
                cause,
            },
            None => PublishError::Failed { stage, cause },
        }
    }
}

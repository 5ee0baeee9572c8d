//! # Reconciliation Run
//!
//! One pass of Aggregator → Ranker → Renderer → Reconciler → Publisher.
//! External calls are the only suspension points; the cancellation token is
//! checked before each of them, never in the middle of one.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::analysis::{aggregate, list_local_commits, rank};
use crate::codeowners::{needs_update, OwnershipDocument};
use crate::config::{CommitSource, Config};
use crate::error::{Error, PipelineStage, Result};
use crate::hosting::HostingClient;
use crate::publish::{pull_request_body, PublishRequest, Publisher};
use crate::types::{PullRequestRef, RankedContributor, TimeWindow};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Published content already matches
    UpToDate,
    /// A change was detected but `dry_run` was set
    WouldUpdate,
    /// Pull request opened (or found already open)
    Opened(PullRequestRef),
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub base_branch: String,
    pub window: TimeWindow,
    pub ranked: Vec<RankedContributor>,
    pub document: OwnershipDocument,
    pub outcome: RunOutcome,
}

fn checkpoint(cancel: &CancellationToken, stage: PipelineStage) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { stage });
    }
    Ok(())
}

/// Run one reconciliation against `client` as of `now`.
pub async fn run(
    config: &Config,
    client: &dyn HostingClient,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let repo = &config.repository;

    checkpoint(cancel, PipelineStage::ResolveBase)?;
    let base_branch = match &config.base_branch {
        Some(branch) => branch.clone(),
        None => client
            .default_branch(repo)
            .await
            .map_err(|e| Error::hosting(PipelineStage::ResolveBase, e))?,
    };
    let base_revision = client
        .branch_head(repo, &base_branch)
        .await
        .map_err(|e| Error::hosting(PipelineStage::ResolveBase, e))?;
    info!(%repo, branch = %base_branch, revision = %base_revision, "resolved base");

    let window = TimeWindow::ending_at(now, config.window);
    checkpoint(cancel, PipelineStage::FetchCommits)?;
    let records = match &config.source {
        CommitSource::Hosting => client
            .list_commits(repo, &base_branch, window.since)
            .await
            .map_err(|e| Error::hosting(PipelineStage::FetchCommits, e))?,
        CommitSource::Local(path) => {
            list_local_commits(path.clone(), Some(base_branch.clone()), window)
                .await
                .map_err(|cause| Error::LocalGit {
                    stage: PipelineStage::FetchCommits,
                    cause,
                })?
        }
    };
    info!(commits = records.len(), since = %window.since, "fetched commits");

    let ranked = rank(aggregate(records, &window), config.owners)?;
    info!(
        owners = ?ranked.iter().map(|r| r.author.as_str()).collect::<Vec<_>>(),
        "ranked contributors"
    );
    let document = config.renderer.render(&ranked);
    let rendered = document.to_text();

    checkpoint(cancel, PipelineStage::FetchExisting)?;
    let existing = client
        .get_file_content(repo, &config.codeowners_path, base_revision.as_str())
        .await
        .map_err(|e| Error::hosting(PipelineStage::FetchExisting, e))?;

    let changed = needs_update(&rendered, existing.as_deref());
    info!(
        path = %config.codeowners_path,
        exists = existing.is_some(),
        changed,
        "reconciled"
    );

    let outcome = if !changed {
        RunOutcome::UpToDate
    } else if config.dry_run {
        RunOutcome::WouldUpdate
    } else {
        checkpoint(cancel, PipelineStage::Publish)?;
        let request = PublishRequest::new(
            base_branch.clone(),
            base_revision,
            config.codeowners_path.clone(),
            rendered,
            now,
        )
        .with_body(pull_request_body(&ranked, &window, &config.codeowners_path));

        let pull_request = Publisher::new(client, repo).run(&request, cancel).await?;
        info!(number = pull_request.number, url = %pull_request.url, "published");
        RunOutcome::Opened(pull_request)
    };

    Ok(RunReport {
        base_branch,
        window,
        ranked,
        document,
        outcome,
    })
}

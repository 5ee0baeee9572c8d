use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use codeowners_generator::codeowners::HEADER;
use codeowners_generator::config::{Args, Config};
use codeowners_generator::error::PipelineStage;
use codeowners_generator::hosting::{HostOperation, InMemoryHost};
use codeowners_generator::types::RepositoryId;
use codeowners_generator::{pipeline, CommitRecord, Error, HostingError, PublishError, RunOutcome};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

fn repo() -> RepositoryId {
    RepositoryId::new("octo", "widgets")
}

fn config(extra: &[&str]) -> Config {
    let mut argv = vec![
        "codeowners-generator",
        "--organization-name",
        "octo",
        "--repository-name",
        "widgets",
        "--github-token",
        "secret",
        "--duration",
        "30d",
        "--code-reviewers-count",
        "2",
    ];
    argv.extend_from_slice(extra);
    Config::from_args(Args::try_parse_from(argv).unwrap()).unwrap()
}

fn host_with_history() -> InMemoryHost {
    let host = InMemoryHost::new(repo(), "main");
    host.add_commits([
        CommitRecord::new("a", days_ago(1)),
        CommitRecord::new("b", days_ago(1)),
        CommitRecord::new("a", days_ago(2)),
        CommitRecord::new("c", days_ago(40)),
    ]);
    host
}

fn expected_content() -> String {
    format!("{HEADER}\na/* @a\nb/* @b\n")
}

#[tokio::test]
async fn test_end_to_end_opens_pull_request() {
    let host = host_with_history();
    let config = config(&[]);

    let report = pipeline::run(&config, &host, now(), &CancellationToken::new())
        .await
        .unwrap();

    let ranked: Vec<(&str, usize)> = report
        .ranked
        .iter()
        .map(|r| (r.author.as_str(), r.commits))
        .collect();
    assert_eq!(ranked, vec![("a", 2), ("b", 1)]);
    assert_eq!(report.document.to_text(), expected_content());
    assert_eq!(report.base_branch, "main");

    let RunOutcome::Opened(pull_request) = report.outcome else {
        panic!("expected a pull request, got {:?}", report.outcome);
    };
    assert!(pull_request.created);

    let pulls = host.pull_requests();
    assert_eq!(pulls.len(), 1);
    assert!(pulls[0].from.starts_with("update-codeowners-"));
    assert!(pulls[0].body.contains("1. a (2 commits)"));
    assert_eq!(host.file(&pulls[0].from, "CODEOWNERS"), Some(expected_content()));
}

#[tokio::test]
async fn test_up_to_date_publishes_nothing() {
    let host = host_with_history();
    host.put_file("main", "CODEOWNERS", &expected_content());

    let report = pipeline::run(&config(&[]), &host, now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::UpToDate);
    assert!(!host.calls().contains(&HostOperation::CreateBranch));
    assert_eq!(host.branch_names(), vec!["main"]);
}

#[tokio::test]
async fn test_whitespace_only_difference_is_up_to_date() {
    let host = host_with_history();
    let crlf = expected_content().replace('\n', "  \r\n");
    host.put_file("main", "CODEOWNERS", &crlf);

    let report = pipeline::run(&config(&[]), &host, now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::UpToDate);
}

#[tokio::test]
async fn test_case_difference_triggers_update() {
    let host = host_with_history();
    host.put_file("main", "CODEOWNERS", &expected_content().replace("@a", "@A"));

    let report = pipeline::run(&config(&[]), &host, now(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Opened(_)));
}

#[tokio::test]
async fn test_dry_run_only_reads() {
    let host = host_with_history();

    let report = pipeline::run(
        &config(&["--dry-run"]),
        &host,
        now(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::WouldUpdate);
    assert_eq!(
        host.calls(),
        vec![
            HostOperation::DefaultBranch,
            HostOperation::BranchHead,
            HostOperation::ListCommits,
            HostOperation::GetFileContent,
        ]
    );
}

#[tokio::test]
async fn test_explicit_base_branch_and_path() {
    let host = host_with_history();
    host.put_file("release", "README", "release branch\n");
    host.add_commits_on(
        "release",
        [
            CommitRecord::new("r", days_ago(3)),
            CommitRecord::new("r", days_ago(4)),
            CommitRecord::new("a", days_ago(5)),
        ],
    );

    let report = pipeline::run(
        &config(&["--base-branch", "release", "--codeowners-path", ".github/CODEOWNERS"]),
        &host,
        now(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!host.calls().contains(&HostOperation::DefaultBranch));
    assert_eq!(report.base_branch, "release");

    // Only the release history counts, not the default branch's
    let ranked: Vec<(&str, usize)> = report
        .ranked
        .iter()
        .map(|r| (r.author.as_str(), r.commits))
        .collect();
    assert_eq!(ranked, vec![("r", 2), ("a", 1)]);

    let pulls = host.pull_requests();
    assert_eq!(pulls[0].to, "release");
    assert_eq!(
        host.file(&pulls[0].from, ".github/CODEOWNERS"),
        Some(format!("{HEADER}\nr/* @r\na/* @a\n"))
    );
    assert_eq!(host.file(&pulls[0].from, "README").as_deref(), Some("release branch\n"));
}

#[tokio::test]
async fn test_missing_repository_fails_resolving_base() {
    let host = InMemoryHost::new(RepositoryId::new("octo", "other"), "main");

    let err = pipeline::run(&config(&[]), &host, now(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(PipelineStage::ResolveBase));
    assert!(matches!(
        err,
        Error::Hosting {
            cause: HostingError::NotFound(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_transport_failure_names_stage() {
    let host = host_with_history();
    host.fail_next(
        HostOperation::ListCommits,
        HostingError::Transport("401 Unauthorized".into()),
    );

    let err = pipeline::run(&config(&[]), &host, now(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "fetch commits: transport error: 401 Unauthorized");
}

#[tokio::test]
async fn test_partial_publish_failure_is_reported() {
    let host = host_with_history();
    host.fail_next(
        HostOperation::CreatePullRequest,
        HostingError::Transport("timeout".into()),
    );

    let err = pipeline::run(&config(&[]), &host, now(), &CancellationToken::new())
        .await
        .unwrap_err();

    let Error::Publish(publish) = &err else {
        panic!("expected a publish error, got {err:?}");
    };
    assert!(matches!(publish, PublishError::Partial { .. }));
    let leftover = publish.leftover_branch().unwrap();
    assert_eq!(host.file(leftover, "CODEOWNERS"), Some(expected_content()));
}

#[tokio::test]
async fn test_cancelled_run_makes_no_calls() {
    let host = host_with_history();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline::run(&config(&[]), &host, now(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Cancelled {
            stage: PipelineStage::ResolveBase
        }
    ));
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_repeated_runs_render_identically() {
    let first = pipeline::run(&config(&["--dry-run"]), &host_with_history(), now(), &CancellationToken::new())
        .await
        .unwrap();
    let second = pipeline::run(&config(&["--dry-run"]), &host_with_history(), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.document.to_text(), second.document.to_text());
    assert_eq!(first.ranked, second.ranked);
}

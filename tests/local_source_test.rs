use chrono::{Duration, Utc};
use clap::Parser;
use codeowners_generator::analysis::{aggregate, list_local_commits, rank};
use codeowners_generator::config::{Args, Config};
use codeowners_generator::hosting::{HostOperation, InMemoryHost};
use codeowners_generator::types::RepositoryId;
use codeowners_generator::{pipeline, RunOutcome, TimeWindow};
use git2::{Repository, Signature, Time};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const AUTHORS: [&str; 3] = [
    "101+alice@users.noreply.github.com",
    "bob@example.com",
    "102+carol@users.noreply.github.com",
];

fn run_git_command(repo_path: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).to_string())
}

/// Repository on branch `main` with commits spread over the last 60 days.
fn setup_test_repo() -> (TempDir, Repository) {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();
    repo.set_head("refs/heads/main").unwrap();

    for i in 0..24i64 {
        let file_name = format!("file_{}.txt", i);
        fs::write(temp_dir.path().join(&file_name), format!("Content {}\n", i)).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(&file_name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();

        // Alice commits every time, Bob every other, Carol every fourth
        let email = if i % 4 == 3 {
            AUTHORS[2]
        } else if i % 2 == 1 {
            AUTHORS[1]
        } else {
            AUTHORS[0]
        };
        let when = Utc::now() - Duration::days(60 - i * 2);
        let signature = Signature::new("Dev", email, &Time::new(when.timestamp(), 0)).unwrap();

        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        {
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                &format!("Add {}", file_name),
                &tree,
                &parents,
            )
            .unwrap();
        }
    }

    (temp_dir, repo)
}

#[tokio::test]
async fn test_local_counts_match_git_log() {
    let (temp_dir, _repo) = setup_test_repo();
    let window = TimeWindow::ending_at(Utc::now(), Duration::days(30));
    let since = format!("--since={}", window.since.to_rfc3339());

    let Some(output) = run_git_command(temp_dir.path(), &["log", &since, "--format=%ae"]) else {
        eprintln!("git not available, skipping comparison");
        return;
    };
    let mut git_counts: HashMap<String, usize> = HashMap::new();
    for email in output.lines() {
        let author = codeowners_generator::analysis::git::author_identifier(email);
        *git_counts.entry(author).or_insert(0) += 1;
    }

    let records = list_local_commits(temp_dir.path().to_path_buf(), Some("main".into()), window)
        .await
        .unwrap();
    let counts = aggregate(records, &window);

    assert_eq!(
        counts, git_counts,
        "Author counts don't match! Git: {:?}, Ours: {:?}",
        git_counts, counts
    );
}

#[tokio::test]
async fn test_local_ranking() {
    let (temp_dir, _repo) = setup_test_repo();
    let window = TimeWindow::ending_at(Utc::now(), Duration::days(365));

    let records = list_local_commits(temp_dir.path().to_path_buf(), None, window)
        .await
        .unwrap();
    assert_eq!(records.len(), 24);

    let ranked = rank(aggregate(records, &window), 5).unwrap();
    let summary: Vec<(&str, usize)> = ranked
        .iter()
        .map(|r| (r.author.as_str(), r.commits))
        .collect();
    assert_eq!(
        summary,
        vec![("alice", 12), ("bob@example.com", 6), ("carol", 6)]
    );
}

#[tokio::test]
async fn test_pipeline_with_local_source() {
    let (temp_dir, _repo) = setup_test_repo();
    let host = InMemoryHost::new(RepositoryId::new("octo", "widgets"), "main");
    let local = temp_dir.path().to_str().unwrap().to_string();

    let argv = [
        "codeowners-generator",
        "--organization-name",
        "octo",
        "--repository-name",
        "widgets",
        "--local-repo",
        local.as_str(),
        "--dry-run",
        "--duration",
        "365d",
    ];
    let config = Config::from_args(Args::try_parse_from(argv).unwrap()).unwrap();

    let report = pipeline::run(&config, &host, Utc::now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::WouldUpdate);
    assert!(!host.calls().contains(&HostOperation::ListCommits));
    assert_eq!(
        report.document.to_text().lines().skip(1).collect::<Vec<_>>(),
        vec![
            "alice/* @alice",
            "bob@example.com/* bob@example.com",
            "carol/* @carol"
        ]
    );
}

use chrono::{DateTime, Utc};
use git2::{Error, Repository, Sort};
use std::path::PathBuf;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::types::{CommitRecord, TimeWindow};

const NOREPLY_DOMAIN: &str = "@users.noreply.github.com";

/// Read commit authorship from a local clone.
///
/// Walks `branch` when it exists locally, otherwise `HEAD`. Only commits whose
/// author time falls inside `window` are returned.
pub async fn list_local_commits(
    path: PathBuf,
    branch: Option<String>,
    window: TimeWindow,
) -> Result<Vec<CommitRecord>, Error> {
    // git2 operations are blocking
    spawn_blocking(move || {
        let repo = Repository::open(&path)?;
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;

        let branch_ref = branch
            .as_deref()
            .and_then(|name| repo.find_branch(name, git2::BranchType::Local).ok());
        match branch_ref.as_ref().and_then(|b| b.get().name()) {
            Some(ref_name) => revwalk.push_ref(ref_name)?,
            None => revwalk.push_head()?,
        }

        let mut records = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            let author = commit.author();
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(author.when().seconds(), 0) else {
                continue;
            };
            if !window.contains(timestamp) {
                continue;
            }

            records.push(CommitRecord::new(
                author_identifier(author.email().unwrap_or_default()),
                timestamp,
            ));
        }

        debug!(path = %path.display(), commits = records.len(), "read local commits");
        Ok::<_, Error>(records)
    })
    .await
    .map_err(|e| Error::from_str(&e.to_string()))?
}

/// Owner identifier for a commit author e-mail.
///
/// GitHub noreply addresses (`123+login@users.noreply.github.com`) map back to
/// the login; any other address is used verbatim. Case is preserved.
pub fn author_identifier(email: &str) -> String {
    let email = email.trim();
    match email.strip_suffix(NOREPLY_DOMAIN) {
        Some(local) => local
            .split_once('+')
            .map_or(local, |(_, login)| login)
            .to_string(),
        None => email.to_string(),
    }
}

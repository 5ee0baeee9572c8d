//! GitHub REST implementation of [`HostingClient`].
//!
//! Commits are created through the git data API (tree, commit, ref update) so
//! the parent revision is explicit rather than whatever the branch points at.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{HostingClient, NewCommit, NewPullRequest};
use crate::error::HostingError;
use crate::types::{CommitRecord, PullRequestRef, RepositoryId, Revision};

pub const DEFAULT_SERVER_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("codeowners-generator/", env!("CARGO_PKG_VERSION"));

/// Client for the GitHub REST API (github.com or Enterprise Server).
pub struct GitHubClient {
    base_url: String,
    client: Client,
}

impl GitHubClient {
    /// Create a client for `base_url` (e.g. `https://api.github.com`).
    ///
    /// Without a token only public repositories can be read.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, HostingError> {
        Self::from_builder(base_url, Self::builder(token, timeout)?)
    }

    fn builder(token: Option<&str>, timeout: Duration) -> Result<ClientBuilder, HostingError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                HostingError::Transport("token contains invalid header characters".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers))
    }

    fn from_builder(base_url: &str, builder: ClientBuilder) -> Result<Self, HostingError> {
        let client = builder
            .build()
            .map_err(|e| HostingError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn repo_url(&self, repo: &RepositoryId, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.base_url, repo.owner, repo.name, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HostingError> {
        let response = request
            .send()
            .await
            .map_err(|e| HostingError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| HostingError::Transport(format!("failed to parse response: {e}")));
        }

        let body = response.json::<ApiError>().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl HostingClient for GitHubClient {
    async fn list_commits(
        &self,
        repo: &RepositoryId,
        branch: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>, HostingError> {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut records = Vec::new();

        for page in 1u32.. {
            let request = self.client.get(self.repo_url(repo, "/commits")).query(&[
                ("sha", branch.to_string()),
                ("since", since.clone()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let commits: Vec<ApiCommit> = self.send(request).await?;
            let fetched = commits.len();
            records.extend(commits.into_iter().filter_map(ApiCommit::into_record));

            debug!(%repo, branch, page, fetched, "fetched commit page");
            if fetched < PER_PAGE {
                break;
            }
        }

        Ok(records)
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryId,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, HostingError> {
        let request = self
            .client
            .get(self.repo_url(repo, &format!("/contents/{path}")))
            .query(&[("ref", reference)]);

        match self.send::<ApiContent>(request).await {
            Ok(content) => decode_content(&content).map(Some),
            Err(HostingError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn default_branch(&self, repo: &RepositoryId) -> Result<String, HostingError> {
        let repository: ApiRepository = self.send(self.client.get(self.repo_url(repo, ""))).await?;
        Ok(repository.default_branch)
    }

    async fn branch_head(
        &self,
        repo: &RepositoryId,
        branch: &str,
    ) -> Result<Revision, HostingError> {
        let url = self.repo_url(repo, &format!("/git/ref/heads/{branch}"));
        let reference: ApiRef = self.send(self.client.get(url)).await?;
        Ok(Revision(reference.object.sha))
    }

    async fn create_branch(
        &self,
        repo: &RepositoryId,
        name: &str,
        base_branch: &str,
        from: &Revision,
    ) -> Result<Revision, HostingError> {
        let current = self.branch_head(repo, base_branch).await?;
        if &current != from {
            return Err(HostingError::StaleRevision(format!(
                "{base_branch} moved from {from} to {current}"
            )));
        }

        let request = self
            .client
            .post(self.repo_url(repo, "/git/refs"))
            .json(&json!({ "ref": format!("refs/heads/{name}"), "sha": from.as_str() }));
        let created: ApiRef = self.send(request).await?;
        Ok(Revision(created.object.sha))
    }

    async fn create_commit(
        &self,
        repo: &RepositoryId,
        commit: &NewCommit<'_>,
    ) -> Result<Revision, HostingError> {
        let parent_url = self.repo_url(repo, &format!("/git/commits/{}", commit.parent));
        let parent: ApiGitCommit = self.send(self.client.get(parent_url)).await?;

        let tree_request = self.client.post(self.repo_url(repo, "/git/trees")).json(&json!({
            "base_tree": parent.tree.sha,
            "tree": [{
                "path": commit.path,
                "mode": "100644",
                "type": "blob",
                "content": commit.content,
            }],
        }));
        let tree: ApiSha = self.send(tree_request).await?;

        let commit_request = self.client.post(self.repo_url(repo, "/git/commits")).json(&json!({
            "message": commit.message,
            "tree": tree.sha,
            "parents": [commit.parent.as_str()],
        }));
        let created: ApiSha = self.send(commit_request).await?;

        // Fast-forward only; a moved branch surfaces as a stale revision
        let ref_request = self
            .client
            .patch(self.repo_url(repo, &format!("/git/refs/heads/{}", commit.branch)))
            .json(&json!({ "sha": created.sha, "force": false }));
        let _: ApiRef = self.send(ref_request).await?;

        Ok(Revision(created.sha))
    }

    async fn create_pull_request(
        &self,
        repo: &RepositoryId,
        pull: &NewPullRequest<'_>,
    ) -> Result<PullRequestRef, HostingError> {
        let request = self.client.post(self.repo_url(repo, "/pulls")).json(&json!({
            "title": pull.title,
            "head": pull.from,
            "base": pull.to,
            "body": pull.body,
        }));

        match self.send::<ApiPull>(request).await {
            Ok(created) => Ok(created.into_ref(true)),
            Err(HostingError::Conflict(reason)) => {
                debug!(%repo, from = pull.from, to = pull.to, "pull request already exists");
                let lookup = self.client.get(self.repo_url(repo, "/pulls")).query(&[
                    ("head", format!("{}:{}", repo.owner, pull.from)),
                    ("base", pull.to.to_string()),
                    ("state", "open".to_string()),
                ]);
                let open: Vec<ApiPull> = self.send(lookup).await?;
                open.into_iter()
                    .next()
                    .map(|existing| existing.into_ref(false))
                    .ok_or(HostingError::Conflict(reason))
            }
            Err(e) => Err(e),
        }
    }
}

/// Map a non-success response to a typed error.
fn status_error(status: StatusCode, body: &ApiError) -> HostingError {
    let detail = body.describe();
    let text = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {detail}")
    };
    let lowered = detail.to_ascii_lowercase();

    // GitHub reports both races as a bare 422, so the message is the only
    // signal. Nothing else in the crate classifies errors by their text.
    match status {
        StatusCode::NOT_FOUND => HostingError::NotFound(text),
        StatusCode::CONFLICT => HostingError::Conflict(text),
        StatusCode::UNPROCESSABLE_ENTITY if lowered.contains("already exists") => {
            HostingError::Conflict(text)
        }
        StatusCode::UNPROCESSABLE_ENTITY if lowered.contains("fast forward") => {
            HostingError::StaleRevision(text)
        }
        _ => HostingError::Transport(text),
    }
}

fn decode_content(content: &ApiContent) -> Result<String, HostingError> {
    if content.encoding != "base64" {
        return Err(HostingError::Transport(format!(
            "unsupported content encoding '{}'",
            content.encoding
        )));
    }

    let packed: String = content.content.split_whitespace().collect();
    let bytes = STANDARD
        .decode(packed)
        .map_err(|e| HostingError::Transport(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| HostingError::Transport(format!("content is not UTF-8: {e}")))
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

impl ApiError {
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.message.is_empty() {
            parts.push(self.message.as_str());
        }
        parts.extend(self.errors.iter().filter_map(|e| e.message.as_deref()));
        parts.join("; ")
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    author: Option<ApiUser>,
    commit: ApiCommitDetail,
}

impl ApiCommit {
    /// Commits without a linked account keep an empty author.
    fn into_record(self) -> Option<CommitRecord> {
        let timestamp = self
            .commit
            .author
            .and_then(|signature| signature.date)
            .or_else(|| self.commit.committer.and_then(|signature| signature.date))?;
        let author = self.author.map(|user| user.login).unwrap_or_default();
        Some(CommitRecord::new(author, timestamp))
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    author: Option<ApiSignature>,
    committer: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    content: String,
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    object: ApiSha,
}

#[derive(Debug, Deserialize)]
struct ApiSha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiGitCommit {
    tree: ApiSha,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    html_url: String,
}

impl ApiPull {
    fn into_ref(self, created: bool) -> PullRequestRef {
        PullRequestRef {
            number: self.number,
            url: self.html_url,
            created,
        }
    }
}

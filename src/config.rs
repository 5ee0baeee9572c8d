//! # Configuration
//!
//! Command-line flags (each with an environment fallback) parsed by `clap`,
//! validated once into an immutable [`Config`] that is passed by reference
//! through the pipeline.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;
use clap::Parser;

use crate::codeowners::{Renderer, DEFAULT_CODEOWNERS_PATH, DEFAULT_PATH_PATTERN};
use crate::error::ConfigError;
use crate::hosting::github::DEFAULT_SERVER_URL;
use crate::types::RepositoryId;

/// Raw command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "codeowners-generator",
    version,
    about = "Generates CODEOWNERS file based on top contributors"
)]
pub struct Args {
    /// GitHub server URL
    #[arg(long, env = "GITHUB_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub github_server_url: String,

    /// GitHub organization name
    #[arg(long, env = "ORGANIZATION_NAME")]
    pub organization_name: String,

    /// GitHub repository name
    #[arg(long, env = "REPOSITORY_NAME")]
    pub repository_name: String,

    /// GitHub personal access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Time period for contributor analysis (e.g., 30d, 720h)
    #[arg(long, env = "DURATION", default_value = "30d")]
    pub duration: String,

    /// Number of top contributors to include as code owners
    #[arg(long, env = "CODE_REVIEWERS_COUNT", default_value_t = 3, allow_negative_numbers = true)]
    pub code_reviewers_count: i64,

    /// Branch to analyse and target; defaults to the repository's default branch
    #[arg(long, env = "BASE_BRANCH")]
    pub base_branch: Option<String>,

    /// Location of the CODEOWNERS file in the repository
    #[arg(long, env = "CODEOWNERS_PATH", default_value = DEFAULT_CODEOWNERS_PATH)]
    pub codeowners_path: String,

    /// Path pattern per owner; `{author}` is replaced with the owner
    #[arg(long, env = "PATH_PATTERN", default_value = DEFAULT_PATH_PATTERN)]
    pub path_pattern: String,

    /// Read commits from this local clone instead of the GitHub API
    #[arg(long, env = "LOCAL_REPO")]
    pub local_repo: Option<PathBuf>,

    /// Timeout for each GitHub request
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s")]
    pub request_timeout: String,

    /// Print the generated file and whether it differs, without publishing
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Log filter directive (e.g. `info`, `codeowners_generator=debug`)
    #[arg(long, env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}

/// Where commit authorship is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSource {
    Hosting,
    Local(PathBuf),
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub repository: RepositoryId,
    pub token: Option<String>,
    pub window: Duration,
    pub owners: usize,
    pub base_branch: Option<String>,
    pub codeowners_path: String,
    pub renderer: Renderer,
    pub source: CommitSource,
    pub request_timeout: StdDuration,
    pub dry_run: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let repository = RepositoryId::new(
            non_empty(args.organization_name).ok_or(ConfigError::Missing("organization-name"))?,
            non_empty(args.repository_name).ok_or(ConfigError::Missing("repository-name"))?,
        );

        let token = args.github_token.and_then(non_empty);
        if token.is_none() && !args.dry_run {
            return Err(ConfigError::Missing("github-token"));
        }

        let window = parse_duration(&args.duration)?;
        if window <= Duration::zero() {
            return Err(ConfigError::InvalidWindow);
        }

        let owners = usize::try_from(args.code_reviewers_count)
            .ok()
            .filter(|count| *count > 0)
            .ok_or(ConfigError::InvalidLimit(args.code_reviewers_count))?;

        let request_timeout = parse_duration(&args.request_timeout)?
            .to_std()
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| ConfigError::InvalidDuration {
                value: args.request_timeout.clone(),
                reason: "timeout must be greater than zero".to_string(),
            })?;

        let codeowners_path = non_empty(args.codeowners_path)
            .ok_or(ConfigError::Missing("codeowners-path"))?;

        Ok(Self {
            server_url: args.github_server_url,
            repository,
            token,
            window,
            owners,
            base_branch: args.base_branch.and_then(non_empty),
            codeowners_path,
            renderer: Renderer::new(args.path_pattern)?,
            source: args
                .local_repo
                .map_or(CommitSource::Hosting, CommitSource::Local),
            request_timeout,
            dry_run: args.dry_run,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse durations such as `30d`, `720h`, `1h30m` or `45s`.
///
/// Units: `w`, `d`, `h`, `m`, `s`. Every number needs a unit.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(invalid("expected a number before each unit"));
        }
        let amount: i64 = digits.parse().map_err(|_| invalid("number too large"))?;
        let part = match c {
            'w' => Duration::try_weeks(amount),
            'd' => Duration::try_days(amount),
            'h' => Duration::try_hours(amount),
            'm' => Duration::try_minutes(amount),
            's' => Duration::try_seconds(amount),
            _ => return Err(invalid("unknown unit, expected one of w, d, h, m, s")),
        }
        .ok_or_else(|| invalid("duration too large"))?;
        total = total
            .checked_add(&part)
            .ok_or_else(|| invalid("duration too large"))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid("missing unit"));
    }

    Ok(total)
}

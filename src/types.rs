//! # Common Types
//!
//! This module contains the value objects that flow through one reconciliation
//! run: commit authorship records, per-author tallies, ranked owners and the
//! identifiers the hosting service hands back.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single commit's authorship, as reported by a commit source.
///
/// The author identifier may be empty when the commit is not linked to any
/// account; such records are never attributed ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Login (or e-mail for local sources) of the commit author
    pub author: String,
    /// Author timestamp of the commit
    pub timestamp: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(author: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            timestamp,
        }
    }
}

/// Commit counts keyed by author identifier.
///
/// Iteration order is unspecified; callers must go through
/// [`crate::analysis::rank`] before relying on any ordering.
pub type ContributorCounts = HashMap<String, usize>;

/// An author with their commit count and 0-based position in the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RankedContributor {
    pub author: String,
    pub commits: usize,
    pub rank: usize,
}

/// The analysis window: `since` is inclusive, commits after `until` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// Window covering `duration` back from `now`.
    pub fn ending_at(now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            since: now - duration,
            until: now,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.since && timestamp <= self.until
    }
}

/// `owner/name` pair identifying a repository on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl RepositoryId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A commit id on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(pub String);

impl Revision {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
    /// False when the request already existed for this branch pair
    pub created: bool,
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.url)
    }
}

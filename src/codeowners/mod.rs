//! # CODEOWNERS Rendering
//!
//! Converts a ranked owner list into canonical CODEOWNERS text and decides
//! whether the published copy needs replacing.

use std::fmt;

use crate::error::ConfigError;
use crate::types::RankedContributor;
use crate::utils::normalize_lines;

mod reconcile;

pub use reconcile::needs_update;

/// First line of every generated file. Changing it changes every comparison.
pub const HEADER: &str = "# This file is automatically generated by codeowners-generator";

/// Placeholder substituted with the author identifier in path patterns.
pub const AUTHOR_PLACEHOLDER: &str = "{author}";

pub const DEFAULT_PATH_PATTERN: &str = "{author}/*";

/// Canonical location of the file in the repository.
pub const DEFAULT_CODEOWNERS_PATH: &str = "CODEOWNERS";

/// One `<pattern> <owner>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEntry {
    pub pattern: String,
    pub owner: String,
}

/// Generated CODEOWNERS content.
///
/// Two documents are equal when their text matches after line normalization
/// (see [`normalize_lines`]); the comparison is case-sensitive.
#[derive(Debug, Clone)]
pub struct OwnershipDocument {
    header: String,
    entries: Vec<OwnershipEntry>,
}

impl OwnershipDocument {
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn entries(&self) -> &[OwnershipEntry] {
        &self.entries
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OwnershipDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for entry in &self.entries {
            writeln!(f, "{} {}", entry.pattern, entry.owner)?;
        }
        Ok(())
    }
}

impl PartialEq for OwnershipDocument {
    fn eq(&self, other: &Self) -> bool {
        normalize_lines(&self.to_text()) == normalize_lines(&other.to_text())
    }
}

impl Eq for OwnershipDocument {}

/// Renders ranked owners with a configurable path pattern.
#[derive(Debug, Clone)]
pub struct Renderer {
    path_pattern: String,
}

impl Renderer {
    /// `path_pattern` must contain [`AUTHOR_PLACEHOLDER`] and no whitespace,
    /// which would split the line into extra fields.
    pub fn new(path_pattern: impl Into<String>) -> Result<Self, ConfigError> {
        let path_pattern = path_pattern.into();
        if !path_pattern.contains(AUTHOR_PLACEHOLDER) || path_pattern.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidPathPattern(path_pattern));
        }
        Ok(Self { path_pattern })
    }

    /// One line per contributor, in the order given.
    pub fn render(&self, ranked: &[RankedContributor]) -> OwnershipDocument {
        let entries = ranked
            .iter()
            .map(|contributor| OwnershipEntry {
                pattern: self.path_pattern.replace(AUTHOR_PLACEHOLDER, &contributor.author),
                owner: owner_token(&contributor.author),
            })
            .collect();

        OwnershipDocument {
            header: HEADER.to_string(),
            entries,
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            path_pattern: DEFAULT_PATH_PATTERN.to_string(),
        }
    }
}

/// `@login` for accounts; e-mail owners are written as-is.
pub fn owner_token(author: &str) -> String {
    if author.contains('@') {
        author.to_string()
    } else {
        format!("@{author}")
    }
}

use crate::error::ConfigError;
use crate::types::{ContributorCounts, RankedContributor};

/// Order authors by commit count, highest first, keeping the top `limit`.
///
/// Equal counts are ordered by author identifier (byte-wise ascending) so the
/// result does not depend on map iteration order. Fewer than `limit` authors
/// is fine; a `limit` of zero is a configuration error.
pub fn rank(counts: ContributorCounts, limit: usize) -> Result<Vec<RankedContributor>, ConfigError> {
    if limit == 0 {
        return Err(ConfigError::InvalidLimit(0));
    }

    let mut top_contributors: Vec<(String, usize)> = counts.into_iter().collect();
    top_contributors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_contributors.truncate(limit);

    Ok(top_contributors
        .into_iter()
        .enumerate()
        .map(|(rank, (author, commits))| RankedContributor {
            author,
            commits,
            rank,
        })
        .collect())
}

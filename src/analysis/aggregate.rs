use tracing::debug;

use crate::types::{CommitRecord, ContributorCounts, TimeWindow};

/// Tally commits per author within `window`.
///
/// Records with an empty author or a timestamp outside the window are skipped.
/// An empty window yields an empty map.
pub fn aggregate<I>(records: I, window: &TimeWindow) -> ContributorCounts
where
    I: IntoIterator<Item = CommitRecord>,
{
    let mut author_commit_count = ContributorCounts::new();
    let mut skipped = 0usize;

    for record in records {
        if record.author.is_empty() || !window.contains(record.timestamp) {
            skipped += 1;
            continue;
        }
        *author_commit_count.entry(record.author).or_insert(0) += 1;
    }

    debug!(
        authors = author_commit_count.len(),
        skipped, "aggregated commit authorship"
    );
    author_commit_count
}

//! # Commit Analysis
//!
//! Turns commit authorship into a ranked list of owners. Both stages are pure;
//! the [`git`] submodule is a local commit source used instead of the hosting
//! service's commit listing.

mod aggregate;
pub mod git;
mod rank;

pub use aggregate::aggregate;
pub use git::list_local_commits;
pub use rank::rank;

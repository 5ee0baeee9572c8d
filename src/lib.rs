//! # CODEOWNERS Generator Library
//!
//! `codeowners_generator` derives a CODEOWNERS file from the recent commit
//! history of a repository and, when the result differs from what is
//! published, proposes the change as a branch, a commit and a pull request.
//!
//! ## Pipeline
//!
//! - Tally commits per author within a time window ([`analysis::aggregate`])
//! - Rank authors deterministically and keep the top N ([`analysis::rank`])
//! - Render canonical file content ([`codeowners::Renderer`])
//! - Compare against the published file ([`codeowners::needs_update`])
//! - Publish through an idempotent state machine ([`publish::Publisher`])
//!
//! ## Example
//!
//! ```no_run
//! use chrono::Utc;
//! use clap::Parser;
//! use codeowners_generator::config::{Args, Config};
//! use codeowners_generator::hosting::GitHubClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_args(Args::parse())?;
//! let client = GitHubClient::new(
//!     &config.server_url,
//!     config.token.as_deref(),
//!     config.request_timeout,
//! )?;
//!
//! let report = codeowners_generator::pipeline::run(
//!     &config,
//!     &client,
//!     Utc::now(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! println!("{}", report.document);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod codeowners;
pub mod config;
pub mod error;
pub mod hosting;
pub mod pipeline;
pub mod publish;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use error::{ConfigError, Error, HostingError, PublishError};
pub use pipeline::{RunOutcome, RunReport};
pub use types::{CommitRecord, RankedContributor, TimeWindow};

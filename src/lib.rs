//! # crossref-ris
//!
//! Resolve a list of article titles into RIS citation records using the
//! Crossref works search API.
//!
//! Provides:
//! - **Library**: rate-limited, retrying, concurrent title resolution with
//!   disambiguation of non-article hits (cover images, supporting
//!   information, graphical abstracts...) and RIS formatting
//! - **CLI**: `crossref-ris` binary that turns a text file of titles into a
//!   `.ris` file importable by citation managers
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn example() -> crossref_ris::error::Result<()> {
//! use std::sync::Arc;
//! use crossref_ris::{Config, Pipeline, RisFileWriter};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::default();
//! let pipeline = Pipeline::crossref(&config)?;
//! let titles = crossref_ris::input::read_titles("titles.txt".as_ref())?;
//!
//! let summary = pipeline
//!     .run(&titles, Arc::new(RisFileWriter::new("output.ris")), CancellationToken::new())
//!     .await;
//! println!("{} of {} titles resolved", summary.resolved, summary.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Formatting a single hit
//!
//! ```
//! use crossref_ris::{format_candidate, Candidate, SkipPatterns};
//!
//! let hit = Candidate::from_value(serde_json::json!({
//!     "title": ["Frontispiz: Ein Titel", "Ein Titel"],
//!     "DOI": "10.1000/xyz"
//! }));
//! let record = format_candidate(&hit, &SkipPatterns::default()).unwrap();
//! assert_eq!(record.to_string(), "TY  - JOUR\nTI  - Ein Titel\nDO  - 10.1000/xyz\nER  - ");
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod parse;
pub mod pipeline;
pub mod rate_limit;
pub mod resolver;
pub mod ris;
pub mod skip;
pub mod types;
pub mod writer;

#[cfg(feature = "cli")]
pub mod logging;

// Re-export key types at the crate root.
pub use backend::{MockBackend, MockResponse, SearchBackend};
pub use client::CrossrefClient;
pub use config::Config;
pub use error::ResolverError;
pub use pipeline::{Pipeline, RunSummary, TitleOutcome, TitleStatus};
pub use rate_limit::RateLimiter;
pub use resolver::Resolver;
pub use ris::{format_candidate, RisRecord};
pub use skip::SkipPatterns;
pub use types::*;
pub use writer::{ResultSink, RisFileWriter, WriteOutcome};

//! The feed refresh pipeline: fetch → parse → dedup → persist.
//!
//! - [`fetcher`] - HTTP retrieval of raw feed documents
//! - [`parser`] - RSS/Atom parsing and per-entry field resolution
//! - [`dedup`] - candidate deduplication and entry materialization
//! - [`refresher`] - the per-source orchestrator tying the stages together
//!
//! The scheduler (`crate::scheduler`) drives [`refresher::refresh_source`]
//! periodically for every due source.

pub mod dedup;
pub mod fetcher;
pub mod parser;
pub mod refresher;

pub use fetcher::FetchError;
pub use parser::{ParseError, ParsedEntry};
pub use refresher::{refresh_source, RefreshError, RefreshOptions, RefreshOutcome};

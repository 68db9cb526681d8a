//! feedwell — a feed syndication service.
//!
//! Periodically fetches configured RSS/Atom sources, deduplicates their
//! entries against everything already stored, and records the outcome of
//! every refresh attempt.

pub mod config;
pub mod feed;
pub mod scheduler;
pub mod storage;

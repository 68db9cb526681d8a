//! Candidate deduplication and entry materialization.
//!
//! GUIDs alone are not a safe dedup key: some feeds reuse GUIDs while the
//! content changes, others omit stable GUIDs entirely. Every candidate is
//! therefore fingerprinted with a content hash, and either key matching an
//! already-stored entry (anywhere in the store, not just this source) skips
//! the candidate.

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::feed::parser::ParsedEntry;
use crate::storage::{Database, NewEntry, Source};

/// Content-derived fingerprint, the secondary dedup key.
///
/// SHA-256 over the ordered concatenation of source id, guid, title, link and
/// summary (absent fields as empty strings). Deterministic by construction:
/// the same candidate from the same source always hashes identically.
pub fn entry_signature(
    source_id: i64,
    guid: &str,
    title: &str,
    link: Option<&str>,
    summary: Option<&str>,
) -> String {
    let raw = format!(
        "{}||{}||{}||{}||{}",
        source_id,
        guid,
        title,
        link.unwrap_or(""),
        summary.unwrap_or("")
    );
    let hash = Sha256::digest(raw.as_bytes());
    format!("{:x}", hash)
}

/// Decide which candidates are new and build their persistable records.
///
/// Candidates are checked in feed order; a GUID match OR a signature match
/// against the store skips the candidate silently. Nothing is written here —
/// the returned batch is the orchestrator's to insert.
pub async fn materialize_entries(
    db: &Database,
    source: &Source,
    candidates: Vec<ParsedEntry>,
    fetched_at: i64,
) -> Result<Vec<NewEntry>> {
    let mut staged = Vec::new();

    for candidate in candidates {
        let signature = entry_signature(
            source.id,
            &candidate.guid,
            &candidate.title,
            candidate.link.as_deref(),
            candidate.summary.as_deref(),
        );

        if db.entry_exists_by_guid(&candidate.guid).await?
            || db.entry_exists_by_signature(&signature).await?
        {
            continue;
        }

        staged.push(NewEntry {
            source_id: source.id,
            guid: candidate.guid,
            title: candidate.title,
            summary: candidate.summary,
            content: candidate.content,
            link: candidate.link,
            author: candidate.author,
            published_at: candidate.published_at.map(|dt| dt.timestamp()),
            fetched_at,
            hash_signature: signature,
        });
    }

    Ok(staged)
}

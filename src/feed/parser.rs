//! Feed parsing and per-entry field resolution.
//!
//! Raw feed text is handed to `feed-rs`, which accepts both RSS and Atom and
//! rejects malformed documents (the bozo condition). The loosely-typed entries
//! it produces are then resolved into [`ParsedEntry`] candidates with a fixed
//! precedence rule for every field, so the rest of the pipeline never deals
//! with optional soup.

use chrono::{DateTime, NaiveDateTime, Utc};
use feed_rs::model;
use feed_rs::parser;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The feed document could not be reliably parsed as RSS or Atom.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Feed parse error: {0}")]
    Malformed(#[from] parser::ParseFeedError),
}

/// One candidate entry with all fields resolved.
///
/// A candidate is not yet deduplicated or persisted; see `feed::dedup`.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub guid: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Substituted when a feed item carries no title at all.
pub const UNTITLED_PLACEHOLDER: &str = "untitled entry";

/// Parse raw feed text into resolved candidate entries, in feed order.
///
/// A feed that parses cleanly but contains zero items yields an empty `Vec`,
/// not an error.
pub fn parse_entries(feed_text: &str) -> Result<Vec<ParsedEntry>, ParseError> {
    let feed = feed_parser().parse(feed_text.as_bytes())?;
    Ok(feed.entries.into_iter().map(resolve_entry).collect())
}

/// Parser with this module's timestamp and id rules in place of the feed-rs
/// defaults: zone-less dates are read as UTC rather than dropped, and an
/// entry without any id gets its link or the stable synthetic form, never a
/// random one.
fn feed_parser() -> parser::Parser {
    parser::Builder::new()
        .timestamp_parser(parse_timestamp)
        .id_generator(|links, title, _uri| {
            match links.first().filter(|l| !l.href.is_empty()) {
                Some(link) => link.href.clone(),
                None => synthetic_guid(title.as_ref().map(|t| t.content.as_str())),
            }
        })
        .build()
}

/// Zoned formats (RFC 2822, RFC 3339) first; the same shapes without a zone
/// designator are then read as UTC. Unparseable text yields no date.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    const NAIVE_FORMATS: &[&str] = &[
        "%a, %d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];

    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn resolve_entry(entry: model::Entry) -> ParsedEntry {
    let link = entry.links.first().map(|l| l.href.clone());
    let title = resolve_title(entry.title.as_ref());
    let guid = resolve_guid(&entry.id, link.as_deref(), entry.title.as_ref());
    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .filter(|s| !s.is_empty());
    let content = resolve_content(entry.content.as_ref(), summary.as_deref());
    let author = entry
        .authors
        .first()
        .map(|p| p.name.clone())
        .filter(|a| !a.is_empty());
    let published_at = resolve_published(entry.published, entry.updated);

    ParsedEntry {
        guid,
        title,
        summary,
        content,
        link,
        author,
        published_at,
    }
}

/// Resolve the entry's unique identifier.
///
/// Precedence: the feed-supplied id (feed-rs folds RSS `guid` into it), then
/// the entry link, then a synthetic hash of the title. With the custom
/// id generator in [`feed_parser`] the id is already populated for id-less
/// entries; the fallback chain here only catches whitespace-only ids.
fn resolve_guid(id: &str, link: Option<&str>, title: Option<&model::Text>) -> String {
    let trimmed = id.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    if let Some(link) = link {
        if !link.is_empty() {
            return link.to_string();
        }
    }

    synthetic_guid(title.map(|t| t.content.as_str()))
}

/// Stable synthetic id for entries with no usable identifier, prefixed to
/// mark it as generated. A blank title counts as absent, matching
/// [`resolve_title`].
fn synthetic_guid(title: Option<&str>) -> String {
    let basis = match title.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => "unknown",
    };
    let hash = Sha256::digest(basis.as_bytes());
    format!("gen-{:x}", hash)
}

/// A missing title never rejects an entry; a placeholder is substituted.
fn resolve_title(title: Option<&model::Text>) -> String {
    match title {
        Some(t) if !t.content.trim().is_empty() => t.content.clone(),
        _ => UNTITLED_PLACEHOLDER.to_string(),
    }
}

/// Prefer the entry's content body; fall back to the summary text. An entry
/// with neither simply has no content.
fn resolve_content(content: Option<&model::Content>, summary: Option<&str>) -> Option<String> {
    if let Some(body) = content
        .and_then(|c| c.body.as_deref())
        .filter(|b| !b.is_empty())
    {
        return Some(body.to_string());
    }
    summary.map(str::to_string)
}

/// Published timestamp: `published` first, `updated` as fallback, `None` when
/// the feed supplied neither or the date text was unparseable. Values arrive
/// already normalized to UTC by [`parse_timestamp`].
fn resolve_published(
    published: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    published.or(updated)
}

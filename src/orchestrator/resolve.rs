//! Citation resolution for completed runs.
//!
//! Policy: strip every citation marker from the reply text, then append a
//! deduplicated "Sources:" list of resolved filenames. Marker-in-place
//! replacement is deliberately not supported; one policy only.

use crate::engine::api::AssistantClient;
use crate::model::{AssistantReply, ResolvedReply};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

pub const UNKNOWN_FILE: &str = "Unknown File";

/// Narrow lookup seam so resolution can be tested without a live service.
pub trait FileNameLookup {
    async fn filename(&self, file_id: &str) -> anyhow::Result<String>;
}

impl FileNameLookup for AssistantClient {
    async fn filename(&self, file_id: &str) -> anyhow::Result<String> {
        Ok(self.fetch_file(file_id).await?.filename)
    }
}

fn marker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The service renders citations as 【index:index†label】.
    RE.get_or_init(|| Regex::new("\u{3010}\\d+:\\d+\u{2020}[^\u{3011}]*\u{3011}").unwrap())
}

/// Strip citation markers from the reply text. Removes both the standard
/// marker pattern and any literal marker substrings the annotations carry.
fn strip_markers(reply: &AssistantReply) -> String {
    let mut text = marker_pattern().replace_all(&reply.text, "").into_owned();
    for ann in &reply.annotations {
        if let Some(marker) = ann.marker.as_deref() {
            if !marker.is_empty() && text.contains(marker) {
                text = text.replace(marker, "");
            }
        }
    }
    text.trim_end().to_string()
}

/// Distinct file ids in first-seen order.
fn distinct_file_ids(reply: &AssistantReply) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for ann in &reply.annotations {
        if !ids.contains(&ann.file_id.as_str()) {
            ids.push(&ann.file_id);
        }
    }
    ids
}

/// Resolve a reply's citations into display text plus a source list.
///
/// A failed metadata lookup degrades that one entry to a placeholder name
/// instead of aborting the whole resolution.
pub async fn resolve_citations<L: FileNameLookup>(
    lookup: &L,
    reply: &AssistantReply,
) -> ResolvedReply {
    let text = strip_markers(reply);

    let mut sources: Vec<String> = Vec::new();
    for file_id in distinct_file_ids(reply) {
        let name = match lookup.filename(file_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(file_id, error = %e, "file metadata lookup failed");
                UNKNOWN_FILE.to_string()
            }
        };
        // Two ids can resolve to the same filename; keep first-seen order.
        if !sources.contains(&name) {
            sources.push(name);
        }
    }

    ResolvedReply { text, sources }
}

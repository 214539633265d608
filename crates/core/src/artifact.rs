//! Post-download artifact discovery.
//!
//! The retrieval tool may remux into a different container than the one
//! requested, so the produced file is found by probing a fixed list of
//! candidate extensions.

use std::path::Path;

/// Containers the tool commonly falls back to, in preference order.
pub const FALLBACK_EXTENSIONS: &[&str] = &["webm", "mkv"];

/// Extensions to try: the requested one first, then the fallbacks.
pub fn candidate_extensions(requested: &str) -> Vec<&str> {
    let mut candidates = vec![requested];
    for &ext in FALLBACK_EXTENSIONS {
        if !candidates.contains(&ext) {
            candidates.push(ext);
        }
    }
    candidates
}

/// Return the filename of the first candidate that exists in `dir`.
///
/// Falls back to `<stem>.<requested>` without asserting that it exists.
pub async fn resolve_artifact(dir: &Path, stem: &str, requested: &str) -> String {
    for ext in candidate_extensions(requested) {
        let filename = format!("{stem}.{ext}");
        if tokio::fs::try_exists(dir.join(&filename))
            .await
            .unwrap_or(false)
        {
            return filename;
        }
    }
    format!("{stem}.{requested}")
}

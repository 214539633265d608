//! Filename stems derived from media titles.

use std::sync::LazyLock;

use regex::Regex;

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Longest stem produced by [`sanitize_title`], in characters.
pub const MAX_STEM_LEN: usize = 100;

/// Stem used when a title sanitizes to nothing.
pub const DEFAULT_STEM: &str = "video";

/// Turn a free-form title into a filesystem-safe stem.
///
/// Keeps ASCII letters, digits, `_` and `-`; whitespace runs become a
/// single `_`; everything else is dropped.
///
/// ```
/// use mediarelay_core::naming::sanitize_title;
///
/// assert_eq!(sanitize_title("Rick Astley - Never Gonna Give You Up (Video)"),
///            "Rick_Astley_-_Never_Gonna_Give_You_Up_Video");
/// assert_eq!(sanitize_title("???"), "video");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let kept = DISALLOWED_RE.replace_all(title, "");
    let joined = WHITESPACE_RE.replace_all(kept.trim(), "_");
    let stem: String = joined.chars().take(MAX_STEM_LEN).collect();

    if stem.is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        stem
    }
}

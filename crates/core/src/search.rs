//! Mapping of the tool's one-JSON-object-per-line search output.

use serde::{Deserialize, Serialize};

/// A single search hit as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub thumbnail: String,
    pub author: SearchAuthor,
    /// Human-readable duration, e.g. `"3:05"`.
    pub timestamp: String,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAuthor {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Option<Vec<RawThumbnail>>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration_string: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    view_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    #[serde(default)]
    url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<RawEntry> for SearchResult {
    fn from(raw: RawEntry) -> Self {
        let url = non_empty(raw.url).unwrap_or_else(|| {
            format!(
                "https://youtube.com/watch?v={}",
                raw.id.as_deref().unwrap_or_default()
            )
        });
        let thumbnail = non_empty(raw.thumbnail)
            .or_else(|| {
                raw.thumbnails
                    .and_then(|thumbs| thumbs.into_iter().next())
                    .and_then(|t| non_empty(t.url))
            })
            .unwrap_or_default();
        let author = non_empty(raw.uploader)
            .or_else(|| non_empty(raw.channel))
            .unwrap_or_else(|| "Unknown".to_string());
        let timestamp =
            non_empty(raw.duration_string).unwrap_or_else(|| format_duration(raw.duration));

        Self {
            title: raw.title.unwrap_or_default(),
            url,
            thumbnail,
            author: SearchAuthor { name: author },
            timestamp,
            views: raw.view_count.unwrap_or(0),
        }
    }
}

/// Decode every non-empty output line. Any undecodable line fails the
/// whole batch; no partial result is returned.
pub fn parse_search_output(lines: &[String]) -> Result<Vec<SearchResult>, serde_json::Error> {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str::<RawEntry>(l).map(SearchResult::from))
        .collect()
}

/// Format a duration in seconds as `M:SS`. Missing or zero yields `0:00`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s.floor() as u64,
        _ => return "0:00".to_string(),
    };
    format!("{}:{:02}", total / 60, total % 60)
}

//! Argument vectors for the external retrieval tool.
//!
//! The tool is treated as an opaque subprocess. These builders only fix
//! the flags each job kind needs; positional sources always follow a `--`
//! separator so user input can never be parsed as an option.

use std::path::Path;

use serde::Deserialize;

use crate::types::Invocation;

/// Default executable name of the retrieval tool.
pub const DEFAULT_TOOL_PROGRAM: &str = "yt-dlp";

/// How to launch the retrieval tool: a program plus fixed leading
/// arguments (e.g. `python3 -m yt_dlp`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Parse a whitespace-separated command line such as `"python3 -m yt_dlp"`.
    ///
    /// Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let program = tokens.next()?;
        Some(Self::new(program).with_leading_args(tokens))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build an invocation of the tool with `args` after the leading args.
    pub fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = self
            .leading_args
            .iter()
            .cloned()
            .chain(args.into_iter().map(Into::into))
            .collect();
        Invocation::new(self.program.clone(), args)
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_PROGRAM)
    }
}

/// Container requested for a media download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp4,
    Mp3,
}

impl MediaFormat {
    /// `mp3` (any case) selects audio extraction; anything else is video.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("mp3") => Self::Mp3,
            _ => Self::Mp4,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }
}

/// Flags for a flat search returning one JSON object per line.
pub fn search_args(query: &str, limit: u32) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--flat-playlist".to_string(),
        format!("ytsearch{limit}:{query}"),
    ]
}

/// Flags for fetching metadata of a single source without downloading.
pub fn info_args(source: &str) -> Vec<String> {
    vec!["--dump-json".to_string(), "--".to_string(), source.to_string()]
}

/// Flags for downloading `source` to `output`.
///
/// `--newline` makes the tool print each progress update on its own line
/// instead of redrawing with carriage returns.
pub fn download_args(source: &str, output: &Path, format: MediaFormat) -> Vec<String> {
    let mut args: Vec<String> = match format {
        MediaFormat::Mp3 => vec!["-x".into(), "--audio-format".into(), "mp3".into()],
        MediaFormat::Mp4 => vec!["--merge-output-format".into(), "mp4".into()],
    };
    args.extend([
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
        "--newline".to_string(),
        "--".to_string(),
        source.to_string(),
    ]);
    args
}

/// The subset of the tool's metadata dump the download path needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
}

impl VideoInfo {
    /// Decode the first non-empty line of a metadata dump.
    pub fn parse(stdout_lines: &[String]) -> Result<Self, serde_json::Error> {
        let line = stdout_lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("");
        serde_json::from_str(line)
    }

    pub fn title_or_default(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => "video",
        }
    }
}

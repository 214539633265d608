//! Output line classification.
//!
//! The retrieval tool mixes diagnostic chatter with genuine progress and
//! error signal on both of its output streams, so stderr is not treated
//! as "error". [`ClassifierRules::classify`] maps one raw line plus the
//! stream it came from to a [`Classification`]: an event severity with a
//! cleaned message, or [`Classification::Suppressed`].
//!
//! Classification is pure and total. The rules are evaluated in order and
//! the first match wins:
//!
//! 1. Empty after cleaning -> suppressed.
//! 2. Progress marker for the stream plus a `%` -> [`Severity::Progress`].
//! 3. Any other stdout line -> [`Severity::Info`].
//! 4. Stderr: benign notice -> suppressed; error prefix ->
//!    [`Severity::Error`]; warning marker -> [`Severity::Warning`];
//!    otherwise [`Severity::Info`].
//!
//! A line whose colon-delimited prefix names an error is never suppressed,
//! even when it also mentions a benign marker.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Severity;

/// Matches CSI escape sequences (colours, cursor movement).
static ANSI_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid regex"));

/// Marker the tool prints in front of download progress lines.
pub const DOWNLOAD_PROGRESS_MARKER: &str = "[download]";

/// Stderr notices that are expected noise: network fallbacks,
/// certificate chatter and format negotiation.
pub const DEFAULT_BENIGN_MARKERS: &[&str] = &[
    "falling back",
    "certificate",
    "unable to verify",
    "requested formats are incompatible",
    "format is not available",
    "formats are not available",
    "nsig extraction",
];

/// Which subprocess stream a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

/// Result of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Emit { severity: Severity, message: String },
    Suppressed,
}

impl Classification {
    fn emit(severity: Severity, message: String) -> Self {
        Self::Emit { severity, message }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Emit { severity, .. } => Some(*severity),
            Self::Suppressed => None,
        }
    }
}

/// Marker sets driving classification.
///
/// All markers are stored lowercase except the progress markers, which
/// are matched verbatim.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    stdout_progress_markers: Vec<String>,
    stderr_progress_markers: Vec<String>,
    benign_markers: Vec<String>,
    error_marker: String,
    warning_marker: String,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            stdout_progress_markers: vec![DOWNLOAD_PROGRESS_MARKER.to_string()],
            stderr_progress_markers: vec![DOWNLOAD_PROGRESS_MARKER.to_string()],
            benign_markers: DEFAULT_BENIGN_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            error_marker: "error".to_string(),
            warning_marker: "warning".to_string(),
        }
    }
}

impl ClassifierRules {
    /// Rules with no benign markers and no progress markers.
    pub fn empty() -> Self {
        Self {
            stdout_progress_markers: Vec::new(),
            stderr_progress_markers: Vec::new(),
            benign_markers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_progress_marker(mut self, origin: StreamOrigin, marker: impl Into<String>) -> Self {
        match origin {
            StreamOrigin::Stdout => self.stdout_progress_markers.push(marker.into()),
            StreamOrigin::Stderr => self.stderr_progress_markers.push(marker.into()),
        }
        self
    }

    pub fn with_benign_marker(mut self, marker: impl Into<String>) -> Self {
        self.benign_markers.push(marker.into().to_lowercase());
        self
    }

    /// Classify a raw line read from `origin`.
    pub fn classify(&self, line: &str, origin: StreamOrigin) -> Classification {
        let message = clean_line(line);
        if message.is_empty() {
            return Classification::Suppressed;
        }

        let progress_markers = match origin {
            StreamOrigin::Stdout => &self.stdout_progress_markers,
            StreamOrigin::Stderr => &self.stderr_progress_markers,
        };
        if message.contains('%') && progress_markers.iter().any(|m| message.contains(m.as_str())) {
            return Classification::emit(Severity::Progress, message);
        }

        match origin {
            StreamOrigin::Stdout => Classification::emit(Severity::Info, message),
            StreamOrigin::Stderr => self.classify_stderr(message),
        }
    }

    fn classify_stderr(&self, message: String) -> Classification {
        let lower = message.to_lowercase();
        let is_error = lower
            .split_once(':')
            .is_some_and(|(prefix, _)| prefix.contains(self.error_marker.as_str()));

        if is_error {
            Classification::emit(Severity::Error, message)
        } else if self.benign_markers.iter().any(|m| lower.contains(m.as_str())) {
            Classification::Suppressed
        } else if lower.contains(self.warning_marker.as_str()) {
            Classification::emit(Severity::Warning, message)
        } else {
            Classification::emit(Severity::Info, message)
        }
    }
}

/// Classify with the default rule set.
pub fn classify(line: &str, origin: StreamOrigin) -> Classification {
    static DEFAULT_RULES: LazyLock<ClassifierRules> = LazyLock::new(ClassifierRules::default);
    DEFAULT_RULES.classify(line, origin)
}

/// Strip terminal control sequences from a raw output line.
///
/// Lines redrawn with carriage returns keep only their last non-empty
/// segment. Tabs become spaces; every other control character is dropped.
pub fn clean_line(raw: &str) -> String {
    let stripped = ANSI_ESCAPE_RE.replace_all(raw, "");
    let segment = stripped
        .split('\r')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .next_back()
        .unwrap_or("");

    segment
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

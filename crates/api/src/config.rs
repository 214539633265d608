use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mediarelay_core::tool::ToolCommand;
use mediarelay_worker::orchestrator::DEFAULT_SEARCH_LIMIT;
use mediarelay_worker::OrchestratorConfig;

/// A configuration variable that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{name} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local use.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for running jobs at shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Where downloads are written and served from (default: `./downloads`).
    pub download_dir: PathBuf,
    /// Static frontend assets (default: `./public`).
    pub public_dir: PathBuf,
    /// Retrieval tool launcher, e.g. `yt-dlp` or `python3 -m yt_dlp`.
    pub tool: ToolCommand,
    /// Number of hits requested per search (default: `10`).
    pub search_result_limit: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `10`                    |
    /// | `DOWNLOAD_DIR`          | `./downloads`           |
    /// | `PUBLIC_DIR`            | `./public`              |
    /// | `YTDLP_BIN`             | `yt-dlp`                |
    /// | `SEARCH_RESULT_LIMIT`   | `10`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let cors_origins = var("CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let tool_line = var("YTDLP_BIN", "yt-dlp");
        let tool = ToolCommand::parse(&tool_line).ok_or_else(|| ConfigError {
            name: "YTDLP_BIN",
            expected: "command",
            value: tool_line.clone(),
        })?;

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", "3000", "u16")?,
            cors_origins,
            request_timeout_secs: parse(&lookup, "REQUEST_TIMEOUT_SECS", "30", "u64")?,
            shutdown_timeout_secs: parse(&lookup, "SHUTDOWN_TIMEOUT_SECS", "10", "u64")?,
            download_dir: PathBuf::from(var("DOWNLOAD_DIR", "./downloads")),
            public_dir: PathBuf::from(var("PUBLIC_DIR", "./public")),
            tool,
            search_result_limit: parse(
                &lookup,
                "SEARCH_RESULT_LIMIT",
                &DEFAULT_SEARCH_LIMIT.to_string(),
                "u32",
            )?,
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            tool: self.tool.clone(),
            download_dir: self.download_dir.clone(),
            search_limit: self.search_result_limit,
            ..OrchestratorConfig::default()
        }
    }
}

fn parse<T, F>(
    lookup: &F,
    name: &'static str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|_| ConfigError {
        name,
        expected,
        value: raw,
    })
}

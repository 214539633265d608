//! Command alias resolution for ad-hoc command jobs.
//!
//! A command whose first token has the form `<namespace>:<name>` and whose
//! namespace is recognised is expanded into a concrete executable and
//! argument prefix. Any trailing tokens are appended unchanged.
//!
//! | Alias           | Expands to                   |
//! |-----------------|------------------------------|
//! | `pkg:install`   | `apt-get install -y`         |
//! | `pkg:remove`    | `apt-get remove -y`          |
//! | `pkg:update`    | `apt-get update`             |
//! | `pkg:upgrade`   | `apt-get upgrade -y`         |
//! | `pkg:search`    | `apt-cache search`           |
//! | `tool:update`   | `<retrieval tool> -U`        |
//! | `tool:version`  | `<retrieval tool> --version` |
//!
//! Commands are split on whitespace only. There is no shell, so quoting,
//! globbing and variable expansion do not apply.

use crate::error::CoreError;
use crate::tool::ToolCommand;
use crate::types::Invocation;

/// System package manager shorthand.
pub const PKG_NAMESPACE: &str = "pkg";

/// Shorthand for maintenance commands of the retrieval tool itself.
pub const TOOL_NAMESPACE: &str = "tool";

fn pkg_alias(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "install" => Some(&["apt-get", "install", "-y"]),
        "remove" => Some(&["apt-get", "remove", "-y"]),
        "update" => Some(&["apt-get", "update"]),
        "upgrade" => Some(&["apt-get", "upgrade", "-y"]),
        "search" => Some(&["apt-cache", "search"]),
        _ => None,
    }
}

fn tool_alias(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "update" => Some(&["-U"]),
        "version" => Some(&["--version"]),
        _ => None,
    }
}

fn unknown(namespace: &str, name: &str) -> CoreError {
    CoreError::UnknownAlias {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Turn a command string into an explicit [`Invocation`].
///
/// Fails with [`CoreError::InvalidRequest`] for an empty command and with
/// [`CoreError::UnknownAlias`] when a recognised namespace is used with an
/// alias name it does not define.
pub fn resolve_command(command: &str, tool: &ToolCommand) -> Result<Invocation, CoreError> {
    let mut tokens = command.split_whitespace();
    let first = tokens
        .next()
        .ok_or_else(|| CoreError::InvalidRequest("command must not be empty".to_string()))?;
    let rest: Vec<String> = tokens.map(str::to_string).collect();

    if let Some((namespace, name)) = first.split_once(':') {
        match namespace {
            PKG_NAMESPACE => {
                let expansion = pkg_alias(name).ok_or_else(|| unknown(namespace, name))?;
                let (program, prefix) = expansion
                    .split_first()
                    .ok_or_else(|| unknown(namespace, name))?;
                let args = prefix
                    .iter()
                    .map(|a| a.to_string())
                    .chain(rest)
                    .collect();
                return Ok(Invocation::new(*program, args));
            }
            TOOL_NAMESPACE => {
                let flags = tool_alias(name).ok_or_else(|| unknown(namespace, name))?;
                let args = flags.iter().map(|a| a.to_string()).chain(rest);
                return Ok(tool.invocation(args));
            }
            _ => {}
        }
    }

    Ok(Invocation::new(first, rest))
}

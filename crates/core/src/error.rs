/// Domain errors raised before any subprocess is spawned.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required request parameter is missing or empty.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The alias namespace is known but the alias name is not.
    #[error("Unknown alias '{name}' in namespace '{namespace}'")]
    UnknownAlias { namespace: String, name: String },
}

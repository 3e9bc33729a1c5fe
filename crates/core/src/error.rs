/// Errors raised while loading declarations or programs from interchange JSON.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The JSON did not match the expected shape, including unknown
    /// statement or expression tags.
    #[error("interchange error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two declarations share an identifier.
    #[error("duplicate declaration: {identifier}")]
    DuplicateIdentifier { identifier: String },
}

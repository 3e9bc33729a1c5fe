use itemrule_core::CoreError;

/// Fatal evaluation errors. A run that returns one of these has stopped;
/// values committed by earlier statements stay in the store.
///
/// Recoverable conditions (a lookup without a table, an operator given the
/// wrong operand types) are not errors: they produce `Value::Invalid`.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The program names an operator the registry does not provide.
    #[error("unknown operator: {name}")]
    UnknownOperator { name: String },

    /// A test-level expression ran without a test evaluation context.
    #[error("'{expression}' requires a test evaluation context")]
    MissingTestContext { expression: &'static str },

    /// The program or declarations could not be loaded.
    #[error(transparent)]
    Program(#[from] CoreError),

    /// Configuration failed to parse or validate.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

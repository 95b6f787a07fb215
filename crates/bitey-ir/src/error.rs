use thiserror::Error;

/// Errors raised by a module loader when the bitcode cannot be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed bitcode: {0}")]
    Malformed(String),

    #[error("Bitcode buffer is empty")]
    Empty,
}

/// Errors raised by an execution engine while producing or resolving code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Cannot resolve symbol '{name}': {reason}")]
    UnresolvedSymbol { name: String, reason: String },

    #[error("Symbol '{0}' resolved to a null address")]
    NullAddress(String),

    #[error("Execution engine setup failed: {0}")]
    EngineSetup(String),
}

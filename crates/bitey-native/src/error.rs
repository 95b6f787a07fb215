use bitey_ir::LinkError;
use cranelift_codegen::settings::SetError;
use thiserror::Error;

/// Errors that can occur while lowering types, building trampolines or calling through them.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Cannot wrap signature of '{function}': {source}")]
    UnsupportedSignature {
        function: String,
        #[source]
        source: Box<NativeError>,
    },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Aggregate '{0}' cannot be passed by value under the host calling convention")]
    AggregateByValue(String),

    #[error("Aggregate '{0}' has no fields attached yet")]
    IncompleteAggregate(String),

    #[error("Aggregate '{0}' already has its fields attached")]
    AggregateAlreadyDefined(String),

    #[error("Unknown aggregate id {0}")]
    UnknownAggregate(usize),

    #[error("Layout computation failed: {0}")]
    RepcError(#[from] repc::Error),

    #[error("Wrong number of arguments: expected {expected}, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Argument {index}: expected {expected}, got {found}")]
    ArgumentMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Failed during Cranelift code generation: {0}")]
    CraneliftGen(#[from] cranelift_codegen::CodegenError),

    #[error("Failed during module processing: {0}")]
    CraneliftModule(#[from] cranelift_module::ModuleError),

    #[error("Unsupported host architecture or features")]
    UnsupportedHost,

    #[error("Failed to configure Cranelift settings: {0}")]
    SettingsError(#[from] SetError),

    #[error("ISA setup failed: {0}")]
    IsaSetupError(String),
}

impl NativeError {
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        NativeError::UnsupportedType(what.into())
    }

    /// The `UnsupportedType` at the root of a signature failure, if any.
    pub fn unsupported_type(&self) -> Option<&str> {
        match self {
            NativeError::UnsupportedType(what) => Some(what),
            NativeError::UnsupportedSignature { source, .. } => source.unsupported_type(),
            _ => None,
        }
    }
}

use bitey_ir::{LinkError, ParseError};
use bitey_native::NativeError;
use thiserror::Error;

/// Errors that abort a whole wrapping run.
///
/// Failures confined to a single function never surface here; they are
/// reported as skips in the [`crate::WrapReport`].
#[derive(Error, Debug)]
pub enum BindError {
    #[error("Failed to load module: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to create execution engine: {0}")]
    Link(#[from] LinkError),

    #[error("Native backend setup failed: {0}")]
    Native(#[from] NativeError),
}

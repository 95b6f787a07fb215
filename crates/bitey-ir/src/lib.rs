//! In-memory view of a compiled IR module, as seen by the binding core.
//!
//! The loader and the JIT execution engine are external collaborators; this
//! crate only fixes the shape of what they hand back. Enable the `llvm`
//! feature for an implementation backed by LLVM.

pub mod engine;
pub mod error;
pub mod module;
pub mod types;

#[cfg(feature = "llvm")]
pub mod llvm;

// --- Exports --- 
pub use engine::{CodeAddress, ExecutionEngine, ModuleLoader};
pub use error::{LinkError, ParseError};
pub use module::{FunctionSignature, IrFunction, IrModule, Linkage};
pub use types::{IrType, StructDef, StructId};

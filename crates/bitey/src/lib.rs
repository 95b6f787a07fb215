//! Exposes the functions of a compiled IR module as native callables.
//!
//! Given bitcode, a [`bitey_ir::ModuleLoader`] and a [`NameTable`],
//! [`build_wrappers`] loads and JIT-compiles the module, lowers each exported
//! function's signature to a native call descriptor, and binds a callable
//! [`WrappedFunction`] under the function's name. Struct types met along the
//! way are bound in the same table, once per name.

pub mod config;
pub mod driver;
pub mod error;
pub mod report;

// --- Exports --- 
pub use config::{WrapOptions, DEBUG_ENV_VAR};
pub use driver::{build_wrappers, is_eligible, wrap_function, wrap_module, ENGINE_KEY, MODULE_KEY};
pub use error::BindError;
pub use report::{SkippedFunction, WrapReport};

pub use bitey_ir as ir;
pub use bitey_native::{Binding, CallDescriptor, NameTable, NativeError, NativeType, Value, WrappedFunction};

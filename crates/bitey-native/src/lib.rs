//! Native side of the binding: type lowering, call descriptors and trampolines.

mod abi;
pub mod backend;
pub mod error;
pub mod function;
pub mod layout;
pub mod namespace;
pub mod translator;
pub mod types;
pub mod value;

// --- Exports --- 
pub use backend::{Trampoline, TrampolineBuilder};
pub use error::NativeError;
pub use function::WrappedFunction;
pub use layout::TypeLayout;
pub use namespace::{Binding, NameTable};
pub use translator::lower::{lower_type, struct_name};
pub use translator::signature::{translate_signature, CallDescriptor};
pub use types::{AggregateDescriptor, AggregateId, Field, IntWidth, NativeType};
pub use value::Value;

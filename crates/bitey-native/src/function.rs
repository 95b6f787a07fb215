use crate::backend::Trampoline;
use crate::error::NativeError;
use crate::translator::signature::CallDescriptor;
use crate::value::Value;
use bitey_ir::CodeAddress;
use std::fmt;

/// A JIT-compiled function made callable from the host, tagged with its exported name.
pub struct WrappedFunction {
    name: String,
    trampoline: Trampoline,
}

impl WrappedFunction {
    pub fn new(name: impl Into<String>, trampoline: Trampoline) -> Self {
        WrappedFunction {
            name: name.into(),
            trampoline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        self.trampoline.descriptor()
    }

    pub fn address(&self) -> CodeAddress {
        self.trampoline.target()
    }

    /// Calls the function.
    ///
    /// # Safety
    ///
    /// Same contract as [`Trampoline::invoke`].
    pub unsafe fn call(&self, args: &[Value]) -> Result<Value, NativeError> {
        self.trampoline.invoke(args)
    }
}

impl fmt::Debug for WrappedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<WrappedFunction {}{}>", self.name, self.descriptor())
    }
}

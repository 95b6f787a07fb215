use crate::error::{LinkError, ParseError};
use crate::module::{IrFunction, IrModule};
use std::fmt;
use std::ptr::NonNull;

/// A resolved, non-null address of JIT-compiled machine code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeAddress(NonNull<u8>);

impl CodeAddress {
    pub fn new(ptr: *const u8) -> Option<Self> {
        NonNull::new(ptr as *mut u8).map(CodeAddress)
    }

    pub fn from_usize(address: usize) -> Option<Self> {
        CodeAddress::new(address as *const u8)
    }

    pub fn as_ptr(self) -> *const u8 {
        self.0.as_ptr()
    }

    pub fn as_usize(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for CodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeAddress({:p})", self.0)
    }
}

/// Produces machine code for the functions of a loaded module.
pub trait ExecutionEngine {
    /// Resolves `function` to the address of its compiled code.
    fn resolve(&self, function: &IrFunction) -> Result<CodeAddress, LinkError>;
}

/// Turns a bitcode blob into a loaded module and an engine for it.
pub trait ModuleLoader {
    type Module: AsRef<IrModule>;
    type Engine: ExecutionEngine;

    fn load(&self, bitcode: &[u8]) -> Result<Self::Module, ParseError>;

    fn create_engine(&self, module: &Self::Module) -> Result<Self::Engine, LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_not_a_code_address() {
        assert!(CodeAddress::new(std::ptr::null()).is_none());
        assert!(CodeAddress::from_usize(0).is_none());
    }

    #[test]
    fn test_address_round_trip() {
        let byte = 0u8;
        let address = CodeAddress::new(&byte as *const u8).unwrap();
        assert_eq!(address.as_ptr(), &byte as *const u8);
        assert_eq!(address.as_usize(), &byte as *const u8 as usize);
    }
}

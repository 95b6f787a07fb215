//! Shared test doubles: an execution engine that resolves functions to host
//! `extern "C"` functions, and a loader handing out a prepared module.
#![allow(dead_code)]

use bitey::ir::{CodeAddress, ExecutionEngine, IrFunction, IrModule, LinkError, ModuleLoader, ParseError};
use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::{c_char, c_void};
use std::rc::Rc;

// --- Native code standing in for JIT output --- //

pub extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}

static ARENA: [u64; 4] = [0; 4];

pub extern "C" fn make() -> *mut c_void {
    ARENA.as_ptr() as *mut c_void
}

pub extern "C" fn name() -> *const c_char {
    b"bitey\0".as_ptr() as *const c_char
}

#[repr(C)]
pub struct Node {
    pub value: i32,
    pub next: *const Node,
}

pub extern "C" fn list_sum(mut node: *const Node) -> i64 {
    let mut total = 0i64;
    while !node.is_null() {
        let current = unsafe { &*node };
        total += current.value as i64;
        node = current.next;
    }
    total
}

pub extern "C" fn list_len(mut node: *const Node) -> i32 {
    let mut count = 0;
    while !node.is_null() {
        count += 1;
        node = unsafe { (*node).next };
    }
    count
}

pub extern "C" fn average(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

#[repr(C)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub extern "C" fn norm(p: Point) -> f64 {
    (p.x * p.x + p.y * p.y).sqrt()
}

pub extern "C" fn midpoint(a: Point, b: Point) -> Point {
    Point {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

/// `Point` in its C layout.
pub fn point_bytes(x: f64, y: f64) -> Vec<u8> {
    [x.to_ne_bytes(), y.to_ne_bytes()].concat()
}

// --- Engine --- //

/// Resolves functions by name from a fixed symbol table.
#[derive(Default)]
pub struct SymbolEngine {
    symbols: HashMap<String, usize>,
    /// Flipped when the engine is dropped.
    dropped: Option<Rc<Cell<bool>>>,
}

impl SymbolEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, address: usize) -> Self {
        self.symbols.insert(name.to_string(), address);
        self
    }

    pub fn track_drop(mut self, flag: Rc<Cell<bool>>) -> Self {
        self.dropped = Some(flag);
        self
    }
}

impl ExecutionEngine for SymbolEngine {
    fn resolve(&self, function: &IrFunction) -> Result<CodeAddress, LinkError> {
        let address = self.symbols.get(&function.name).ok_or_else(|| LinkError::UnresolvedSymbol {
            name: function.name.clone(),
            reason: "not in symbol table".to_string(),
        })?;
        CodeAddress::from_usize(*address).ok_or_else(|| LinkError::NullAddress(function.name.clone()))
    }
}

impl Drop for SymbolEngine {
    fn drop(&mut self) {
        if let Some(flag) = &self.dropped {
            flag.set(true);
        }
    }
}

// --- Loader --- //

pub const BITCODE_MAGIC: &[u8] = b"BC\xC0\xDE";

/// Accepts any blob starting with the bitcode magic and returns a prepared module.
pub struct PreparedLoader {
    pub module: IrModule,
    pub symbols: Vec<(String, usize)>,
}

impl ModuleLoader for PreparedLoader {
    type Module = IrModule;
    type Engine = SymbolEngine;

    fn load(&self, bitcode: &[u8]) -> Result<IrModule, ParseError> {
        if bitcode.is_empty() {
            return Err(ParseError::Empty);
        }
        if !bitcode.starts_with(BITCODE_MAGIC) {
            return Err(ParseError::Malformed("missing bitcode magic".to_string()));
        }
        Ok(self.module.clone())
    }

    fn create_engine(&self, _module: &IrModule) -> Result<SymbolEngine, LinkError> {
        Ok(self
            .symbols
            .iter()
            .fold(SymbolEngine::new(), |engine, (name, address)| engine.with(name, *address)))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

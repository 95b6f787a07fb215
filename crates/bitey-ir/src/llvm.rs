//! Loader and execution engine backed by LLVM (MCJIT through `inkwell`).
//!
//! Built against LLVM 14, the last release whose pointer types still carry
//! their pointee. The binding layer needs that to tell `i8*` and `void*`
//! apart from other pointers.

use crate::engine::{CodeAddress, ExecutionEngine, ModuleLoader};
use crate::error::{LinkError, ParseError};
use crate::module::{FunctionSignature, IrFunction, IrModule, Linkage};
use crate::types::{IrType, StructId};
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine as JitEngine;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::{Linkage as LlvmLinkage, Module};
use inkwell::targets::{InitializationConfig, Target};
use inkwell::types::{AnyType, AnyTypeEnum, AsTypeRef, StructType};
use inkwell::values::FunctionValue;
use inkwell::OptimizationLevel;
use rustc_hash::FxHashMap;

/// Parses bitcode with LLVM and JIT-compiles it with MCJIT.
#[derive(Debug, Clone, Copy)]
pub struct LlvmLoader {
    pub opt_level: OptimizationLevel,
}

impl Default for LlvmLoader {
    fn default() -> Self {
        LlvmLoader { opt_level: OptimizationLevel::Default }
    }
}

/// A parsed LLVM module together with its imported [`IrModule`] view.
pub struct LlvmModule {
    ir: IrModule,
    raw: Module<'static>,
}

impl LlvmModule {
    pub fn raw(&self) -> &Module<'static> {
        &self.raw
    }
}

impl AsRef<IrModule> for LlvmModule {
    fn as_ref(&self) -> &IrModule {
        &self.ir
    }
}

pub struct LlvmEngine {
    engine: JitEngine<'static>,
}

impl ModuleLoader for LlvmLoader {
    type Module = LlvmModule;
    type Engine = LlvmEngine;

    fn load(&self, bitcode: &[u8]) -> Result<LlvmModule, ParseError> {
        if bitcode.is_empty() {
            return Err(ParseError::Empty);
        }
        // Types and modules borrow their context; each loaded module gets its
        // own context that lives for the rest of the process.
        let context: &'static Context = Box::leak(Box::new(Context::create()));
        let buffer = MemoryBuffer::create_from_memory_range_copy(bitcode, "bitcode");
        let raw = Module::parse_bitcode_from_buffer(&buffer, context)
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let ir = import_module(&raw);
        Ok(LlvmModule { ir, raw })
    }

    fn create_engine(&self, module: &LlvmModule) -> Result<LlvmEngine, LinkError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(LinkError::EngineSetup)?;
        let engine = module
            .raw
            .create_jit_execution_engine(self.opt_level)
            .map_err(|e| LinkError::EngineSetup(e.to_string()))?;
        Ok(LlvmEngine { engine })
    }
}

impl ExecutionEngine for LlvmEngine {
    fn resolve(&self, function: &IrFunction) -> Result<CodeAddress, LinkError> {
        let address = self
            .engine
            .get_function_address(&function.name)
            .map_err(|e| LinkError::UnresolvedSymbol {
                name: function.name.clone(),
                reason: e.to_string(),
            })?;
        CodeAddress::from_usize(address).ok_or_else(|| LinkError::NullAddress(function.name.clone()))
    }
}

// --- Import --- //

/// Builds the [`IrModule`] view of an LLVM module.
pub fn import_module(raw: &Module<'_>) -> IrModule {
    let mut importer = TypeImporter {
        module: IrModule::new(raw.get_name().to_string_lossy().into_owned()),
        structs: FxHashMap::default(),
    };
    for function in raw.get_functions() {
        let imported = importer.import_function(function);
        importer.module.add_function(imported);
    }
    importer.module
}

struct TypeImporter {
    module: IrModule,
    /// LLVM struct types are uniqued per context, so their type ref is their identity.
    structs: FxHashMap<usize, StructId>,
}

impl TypeImporter {
    fn import_function(&mut self, function: FunctionValue<'_>) -> IrFunction {
        let name = function.get_name().to_string_lossy().into_owned();
        let linkage = match function.get_linkage() {
            LlvmLinkage::External => Linkage::External,
            LlvmLinkage::Internal | LlvmLinkage::Private => Linkage::Internal,
            other => Linkage::Other(format!("{:?}", other)),
        };
        let is_declaration = function.as_global_value().is_declaration();

        let return_type = match function.get_type().get_return_type() {
            Some(ty) => self.import_type(ty.as_any_type_enum()),
            None => IrType::Void,
        };
        let params = function
            .get_param_iter()
            .map(|param| self.import_type(param.get_type().as_any_type_enum()))
            .collect();

        IrFunction {
            name,
            linkage,
            is_declaration,
            signature: FunctionSignature::new(return_type, params),
        }
    }

    fn import_type(&mut self, ty: AnyTypeEnum<'_>) -> IrType {
        match ty {
            AnyTypeEnum::IntType(int) => IrType::int(int.get_bit_width()),
            AnyTypeEnum::FloatType(float) => match float.print_to_string().to_string().as_str() {
                "float" => IrType::Float,
                "double" => IrType::Double,
                other => IrType::Other(other.to_string()),
            },
            AnyTypeEnum::PointerType(pointer) => IrType::ptr(self.import_type(pointer.get_element_type())),
            AnyTypeEnum::StructType(st) => IrType::Struct(self.import_struct(st)),
            AnyTypeEnum::VoidType(_) => IrType::Void,
            other => IrType::Other(other.print_to_string().to_string()),
        }
    }

    fn import_struct(&mut self, st: StructType<'_>) -> StructId {
        let key = st.as_type_ref() as usize;
        if let Some(id) = self.structs.get(&key) {
            return *id;
        }
        let name = st
            .get_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Reserve before importing the body so recursive references find it.
        let id = self.module.add_struct(name);
        self.structs.insert(key, id);

        let elements = st
            .get_field_types()
            .into_iter()
            .map(|field| self.import_type(field.as_any_type_enum()))
            .collect();
        self.module.set_struct_body(id, elements);
        id
    }
}

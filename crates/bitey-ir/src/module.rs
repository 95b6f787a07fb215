use crate::types::{IrType, StructDef, StructId};

/// Export classification of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Linkage {
    External,
    Internal,
    /// Weak, linkonce, common, ... kept by name for diagnostics.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub return_type: IrType,
    pub params: Vec<IrType>,
}

impl FunctionSignature {
    pub fn new(return_type: IrType, params: Vec<IrType>) -> Self {
        FunctionSignature { return_type, params }
    }
}

/// A function as listed by the loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrFunction {
    pub name: String,
    pub linkage: Linkage,
    /// `true` when the module only declares the function (no body).
    pub is_declaration: bool,
    pub signature: FunctionSignature,
}

impl IrFunction {
    /// An externally visible function with a body.
    pub fn defined(name: impl Into<String>, signature: FunctionSignature) -> Self {
        IrFunction {
            name: name.into(),
            linkage: Linkage::External,
            is_declaration: false,
            signature,
        }
    }

    /// An external declaration without a body.
    pub fn declared(name: impl Into<String>, signature: FunctionSignature) -> Self {
        IrFunction {
            is_declaration: true,
            ..IrFunction::defined(name, signature)
        }
    }

    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }
}

/// The loaded module: its struct definitions and its functions, in module order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrModule {
    pub name: String,
    structs: Vec<StructDef>,
    functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        IrModule {
            name: name.into(),
            structs: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Reserves an opaque struct. Its body is attached later with
    /// [`IrModule::set_struct_body`], which is what allows recursive definitions.
    pub fn add_struct(&mut self, name: impl Into<String>) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructDef {
            name: name.into(),
            elements: Vec::new(),
        });
        id
    }

    /// Replaces the body of a previously reserved struct.
    ///
    /// Returns `false` if `id` does not belong to this module.
    pub fn set_struct_body(&mut self, id: StructId, elements: Vec<IrType>) -> bool {
        match self.structs.get_mut(id.0 as usize) {
            Some(def) => {
                def.elements = elements;
                true
            }
            None => false,
        }
    }

    /// Convenience for the common non-recursive case.
    pub fn define_struct(&mut self, name: impl Into<String>, elements: Vec<IrType>) -> StructId {
        let id = self.add_struct(name);
        self.set_struct_body(id, elements);
        id
    }

    pub fn struct_def(&self, id: StructId) -> Option<&StructDef> {
        self.structs.get(id.0 as usize)
    }

    pub fn structs(&self) -> impl Iterator<Item = (StructId, &StructDef)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(i, def)| (StructId(i as u32), def))
    }

    pub fn add_function(&mut self, function: IrFunction) {
        self.functions.push(function);
    }

    pub fn functions(&self) -> &[IrFunction] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl AsRef<IrModule> for IrModule {
    fn as_ref(&self) -> &IrModule {
        self
    }
}

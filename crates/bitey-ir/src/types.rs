use std::fmt;

/// Index of a struct definition inside its owning [`crate::IrModule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub u32);

impl fmt::Display for StructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An IR-level type descriptor.
///
/// Struct types are referenced by id rather than embedded, so a struct may
/// point at itself (or at a struct that points back) without the descriptor
/// tree becoming cyclic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Integer { width: u32 },
    Float,
    Double,
    Pointer(Box<IrType>),
    Struct(StructId),
    Void,
    /// Anything the binding layer has no mapping for (arrays, vectors, labels, ...).
    /// Carries the type's printed form for diagnostics.
    Other(String),
}

impl IrType {
    pub fn int(width: u32) -> Self {
        IrType::Integer { width }
    }

    pub fn ptr(pointee: IrType) -> Self {
        IrType::Pointer(Box::new(pointee))
    }

    /// `i8*`, the C string type.
    pub fn char_ptr() -> Self {
        IrType::ptr(IrType::int(8))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Integer { width } => write!(f, "i{}", width),
            IrType::Float => write!(f, "float"),
            IrType::Double => write!(f, "double"),
            IrType::Pointer(pointee) => write!(f, "{}*", pointee),
            IrType::Struct(id) => write!(f, "{}", id),
            IrType::Void => write!(f, "void"),
            IrType::Other(repr) => write!(f, "{}", repr),
        }
    }
}

/// A struct body. An empty `name` marks a literal (anonymous) struct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructDef {
    pub name: String,
    pub elements: Vec<IrType>,
}

impl StructDef {
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_literal(&self) -> bool {
        self.name.is_empty()
    }
}

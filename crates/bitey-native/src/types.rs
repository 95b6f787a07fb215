use std::fmt;

/// Width of a native fixed-width signed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// The native integer of exactly `bits` bits, if there is one.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(IntWidth::W8),
            16 => Some(IntWidth::W16),
            32 => Some(IntWidth::W32),
            64 => Some(IntWidth::W64),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

/// Identity of an aggregate descriptor inside a [`crate::NameTable`].
///
/// Two lowered aggregates are the same type exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateId(pub(crate) usize);

impl AggregateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A native, C-ABI type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// "No value"; only meaningful as a return type.
    Void,
    Int(IntWidth),
    Float,
    Double,
    /// `char*`, carried as a NUL-terminated byte string.
    CString,
    /// `void*`, an untyped address.
    VoidPtr,
    Pointer(Box<NativeType>),
    Struct(AggregateId),
}

impl NativeType {
    pub fn pointer_to(pointee: NativeType) -> Self {
        NativeType::Pointer(Box::new(pointee))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, NativeType::Void)
    }

    /// Any of the pointer-shaped descriptors.
    pub fn is_pointer(&self) -> bool {
        matches!(self, NativeType::CString | NativeType::VoidPtr | NativeType::Pointer(_))
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Void => write!(f, "void"),
            NativeType::Int(width) => write!(f, "c_int{}", width.bits()),
            NativeType::Float => write!(f, "c_float"),
            NativeType::Double => write!(f, "c_double"),
            NativeType::CString => write!(f, "c_char_p"),
            NativeType::VoidPtr => write!(f, "c_void_p"),
            NativeType::Pointer(pointee) => write!(f, "POINTER({})", pointee),
            NativeType::Struct(id) => write!(f, "struct#{}", id.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: NativeType,
}

/// A named record type. `fields` stays `None` between registration and
/// completion; recursive references observe it in that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateDescriptor {
    pub name: String,
    pub(crate) fields: Option<Vec<Field>>,
}

impl AggregateDescriptor {
    pub fn fields(&self) -> Option<&[Field]> {
        self.fields.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields()?.iter().find(|f| f.name == name)
    }
}

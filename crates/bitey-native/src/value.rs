use std::fmt;

/// A host-side value crossing the native call boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a call to a function returning void.
    Void,
    Int(i64),
    Float(f32),
    Double(f64),
    /// Contents of a C string, without the terminating NUL.
    Bytes(Vec<u8>),
    Address(usize),
    Null,
    /// Raw bytes of an aggregate passed or returned by value, in its C layout.
    Record(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::Address(_) => "address",
            Value::Null => "null",
            Value::Record(_) => "record",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The address carried by a pointer-like value; `Null` is address zero.
    pub fn as_address(&self) -> Option<usize> {
        match self {
            Value::Address(address) => Some(*address),
            Value::Null => Some(0),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[u8]> {
        match self {
            Value::Record(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Bytes(bytes) => write!(f, "b{:?}", String::from_utf8_lossy(bytes)),
            Value::Address(address) => write!(f, "{:#x}", address),
            Value::Null => write!(f, "NULL"),
            Value::Record(bytes) => write!(f, "<record of {} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl<T> From<*const T> for Value {
    fn from(ptr: *const T) -> Self {
        if ptr.is_null() {
            Value::Null
        } else {
            Value::Address(ptr as usize)
        }
    }
}

impl<T> From<*mut T> for Value {
    fn from(ptr: *mut T) -> Self {
        Value::from(ptr as *const T)
    }
}

use crate::error::NativeError;
use crate::namespace::NameTable;
use crate::translator::lower::lower_type;
use crate::types::NativeType;
use bitey_ir::{IrFunction, IrModule};
use std::fmt;

/// The native view of a function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    /// `NativeType::Void` when the function returns nothing.
    pub return_type: NativeType,
    pub params: Vec<NativeType>,
}

impl CallDescriptor {
    pub fn new(return_type: NativeType, params: Vec<NativeType>) -> Self {
        CallDescriptor { return_type, params }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// Translates a function's IR signature into a [`CallDescriptor`].
///
/// The return type is lowered first, then the parameters left to right.
/// The first failure is reported as `UnsupportedSignature`; aggregates
/// registered before it stay in `table`.
pub fn translate_signature(
    function: &IrFunction,
    module: &IrModule,
    table: &mut NameTable,
) -> Result<CallDescriptor, NativeError> {
    let wrap = |source: NativeError| NativeError::UnsupportedSignature {
        function: function.name.clone(),
        source: Box::new(source),
    };

    let return_type = lower_type(&function.signature.return_type, module, table).map_err(wrap)?;

    let mut params = Vec::with_capacity(function.signature.params.len());
    for (index, param) in function.signature.params.iter().enumerate() {
        let ty = lower_type(param, module, table).map_err(wrap)?;
        if ty.is_void() {
            return Err(wrap(NativeError::unsupported(format!("void parameter at position {}", index))));
        }
        params.push(ty);
    }

    Ok(CallDescriptor { return_type, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;
    use bitey_ir::{FunctionSignature, IrType};

    #[test]
    fn test_translate_simple_signature() {
        let module = IrModule::new("m");
        let add = IrFunction::defined("add", FunctionSignature::new(IrType::int(32), vec![IrType::int(32), IrType::int(32)]));
        let mut table = NameTable::new();

        let desc = translate_signature(&add, &module, &mut table).unwrap();
        assert_eq!(desc.return_type, NativeType::Int(IntWidth::W32));
        assert_eq!(desc.params, vec![NativeType::Int(IntWidth::W32); 2]);
        assert_eq!(desc.to_string(), "(c_int32, c_int32) -> c_int32");
    }

    #[test]
    fn test_void_return_is_allowed() {
        let module = IrModule::new("m");
        let reset = IrFunction::defined("reset", FunctionSignature::new(IrType::Void, vec![]));
        let desc = translate_signature(&reset, &module, &mut NameTable::new()).unwrap();
        assert!(desc.return_type.is_void());
        assert_eq!(desc.arity(), 0);
    }

    #[test]
    fn test_unsupported_parameter_wraps_the_type_error() {
        let module = IrModule::new("m");
        let f = IrFunction::defined("f", FunctionSignature::new(IrType::Void, vec![IrType::Double, IrType::int(128)]));
        let err = translate_signature(&f, &module, &mut NameTable::new()).unwrap_err();
        match &err {
            NativeError::UnsupportedSignature { function, source } => {
                assert_eq!(function, "f");
                assert!(matches!(**source, NativeError::UnsupportedType(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.unsupported_type().unwrap().contains("128"));
    }

    #[test]
    fn test_void_parameter_is_rejected() {
        let module = IrModule::new("m");
        let f = IrFunction::defined("f", FunctionSignature::new(IrType::Void, vec![IrType::Void]));
        assert!(matches!(
            translate_signature(&f, &module, &mut NameTable::new()),
            Err(NativeError::UnsupportedSignature { .. })
        ));
    }

    #[test]
    fn test_aggregates_registered_before_failure_stay_cached() {
        let mut module = IrModule::new("m");
        let point = module.define_struct("struct.Point", vec![IrType::Float, IrType::Float]);
        let f = IrFunction::defined(
            "f",
            FunctionSignature::new(IrType::ptr(IrType::Struct(point)), vec![IrType::Other("x86_fp80".into())]),
        );
        let mut table = NameTable::new();
        assert!(translate_signature(&f, &module, &mut table).is_err());
        let id = table.lookup_aggregate("Point").unwrap();
        assert!(table.aggregate(id).unwrap().is_complete());
    }
}

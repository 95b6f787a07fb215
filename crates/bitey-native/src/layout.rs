use crate::error::NativeError;
use crate::namespace::NameTable;
use crate::types::{AggregateId, IntWidth, NativeType};
use repc::layout::{BuiltinType, Record, RecordField, RecordKind, Type, TypeVariant};

/// Size and alignment of a native type on the host, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeLayout {
    pub size_bytes: usize,
    pub align_bytes: usize,
}

impl NameTable {
    /// Computes the C layout of `ty` for the host target.
    ///
    /// Aggregates must have their fields attached; layout is computed on
    /// demand so that definitions registered in any order can be measured.
    pub fn layout_of(&self, ty: &NativeType) -> Result<TypeLayout, NativeError> {
        let repc_type = self.to_repc_type(ty)?;
        let computed = repc::compute_layout(host_target()?, &repc_type)?;
        Ok(TypeLayout {
            size_bytes: (computed.layout.size_bits / 8) as usize,
            // required_alignment_bits only reflects #pragma pack bounds
            align_bytes: (computed.layout.pointer_alignment_bits / 8) as usize,
        })
    }

    /// Byte offset of every field of an aggregate, in declaration order.
    pub fn field_offsets(&self, id: AggregateId) -> Result<Vec<usize>, NativeError> {
        let repc_type = self.to_repc_type(&NativeType::Struct(id))?;
        let computed = repc::compute_layout(host_target()?, &repc_type)?;
        let record = match computed.variant {
            TypeVariant::Record(record) => record,
            _ => return Err(NativeError::UnknownAggregate(id.index())),
        };
        Ok(record
            .fields
            .iter()
            .map(|field| field.layout.map(|l| (l.offset_bits / 8) as usize).unwrap_or(0))
            .collect())
    }

    fn to_repc_type(&self, ty: &NativeType) -> Result<Type<()>, NativeError> {
        let builtin = match ty {
            NativeType::Void => return Err(NativeError::unsupported("void has no layout")),
            NativeType::Int(IntWidth::W8) => BuiltinType::SignedChar,
            NativeType::Int(IntWidth::W16) => BuiltinType::Short,
            NativeType::Int(IntWidth::W32) => BuiltinType::Int,
            NativeType::Int(IntWidth::W64) => BuiltinType::LongLong,
            NativeType::Float => BuiltinType::Float,
            NativeType::Double => BuiltinType::Double,
            NativeType::CString | NativeType::VoidPtr | NativeType::Pointer(_) => BuiltinType::Pointer,
            NativeType::Struct(id) => return self.aggregate_to_repc_type(*id),
        };
        Ok(Type {
            layout: (),
            annotations: vec![],
            variant: TypeVariant::Builtin(builtin),
        })
    }

    fn aggregate_to_repc_type(&self, id: AggregateId) -> Result<Type<()>, NativeError> {
        let aggregate = self.aggregate_or_err(id)?;
        let fields = aggregate
            .fields()
            .ok_or_else(|| NativeError::IncompleteAggregate(aggregate.name.clone()))?;

        let mut record_fields = Vec::with_capacity(fields.len());
        for field in fields {
            // Only by-value members recurse; pointers stop at BuiltinType::Pointer.
            record_fields.push(RecordField {
                layout: None,
                annotations: vec![],
                named: true,
                bit_width: None,
                ty: self.to_repc_type(&field.ty)?,
            });
        }

        Ok(Type {
            layout: (),
            annotations: vec![],
            variant: TypeVariant::Record(Record {
                kind: RecordKind::Struct,
                fields: record_fields,
            }),
        })
    }
}

fn host_target() -> Result<repc::Target, NativeError> {
    repc::HOST_TARGET.ok_or(NativeError::UnsupportedHost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    fn field(name: &str, ty: NativeType) -> Field {
        Field { name: name.to_string(), ty }
    }

    #[test]
    fn test_scalar_layouts() {
        let table = NameTable::new();
        let int32 = table.layout_of(&NativeType::Int(IntWidth::W32)).unwrap();
        assert_eq!(int32, TypeLayout { size_bytes: 4, align_bytes: 4 });
        assert_eq!(table.layout_of(&NativeType::Int(IntWidth::W8)).unwrap().size_bytes, 1);
        assert_eq!(table.layout_of(&NativeType::Double).unwrap().size_bytes, 8);

        assert_eq!(
            table.layout_of(&NativeType::Double).unwrap().align_bytes,
            std::mem::align_of::<f64>()
        );

        let pointer = table.layout_of(&NativeType::CString).unwrap();
        assert_eq!(pointer.size_bytes, std::mem::size_of::<usize>());
        assert_eq!(pointer.align_bytes, std::mem::align_of::<usize>());
        assert!(table.layout_of(&NativeType::Void).is_err());
    }

    #[test]
    fn test_struct_padding_and_offsets() {
        let mut table = NameTable::new();
        let id = table.begin_aggregate("Mixed");
        table
            .finish_aggregate(
                id,
                vec![
                    field("tag", NativeType::Int(IntWidth::W8)),
                    field("value", NativeType::Double),
                    field("count", NativeType::Int(IntWidth::W16)),
                ],
            )
            .unwrap();

        #[repr(C)]
        struct Mixed {
            tag: i8,
            value: f64,
            count: i16,
        }

        let layout = table.layout_of(&NativeType::Struct(id)).unwrap();
        assert_eq!(layout.size_bytes, std::mem::size_of::<Mixed>());
        assert_eq!(layout.align_bytes, std::mem::align_of::<Mixed>());
        assert_eq!(table.field_offsets(id).unwrap(), vec![0, std::mem::align_of::<f64>(), 2 * std::mem::align_of::<f64>()]);
    }

    #[test]
    fn test_incomplete_aggregate_has_no_layout() {
        let mut table = NameTable::new();
        let id = table.begin_aggregate("Pending");
        assert!(matches!(
            table.layout_of(&NativeType::Struct(id)),
            Err(NativeError::IncompleteAggregate(name)) if name == "Pending"
        ));
    }

    #[test]
    fn test_by_value_member_through_pointer_cycle() {
        // struct A { struct B *b; }; struct B { struct A a; int x; };
        let mut table = NameTable::new();
        let a = table.begin_aggregate("A");
        let b = table.begin_aggregate("B");
        table
            .finish_aggregate(b, vec![field("a", NativeType::Struct(a)), field("x", NativeType::Int(IntWidth::W32))])
            .unwrap();
        assert!(table.layout_of(&NativeType::Struct(b)).is_err());

        table
            .finish_aggregate(a, vec![field("b", NativeType::pointer_to(NativeType::Struct(b)))])
            .unwrap();
        let pointer = std::mem::size_of::<usize>();
        let layout = table.layout_of(&NativeType::Struct(b)).unwrap();
        assert_eq!(layout.size_bytes, if pointer == 8 { 16 } else { 8 });
    }
}

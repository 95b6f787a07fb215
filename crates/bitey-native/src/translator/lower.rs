use crate::error::NativeError;
use crate::namespace::{Binding, NameTable};
use crate::types::{Field, IntWidth, NativeType};
use bitey_ir::{IrModule, IrType, StructId};

/// Lowers an IR type into its native descriptor.
///
/// Named structs are looked up in (and registered into) `table`, so lowering
/// the same struct twice yields the same [`crate::AggregateId`].
pub fn lower_type(ir_type: &IrType, module: &IrModule, table: &mut NameTable) -> Result<NativeType, NativeError> {
    match ir_type {
        IrType::Integer { width } => IntWidth::from_bits(*width)
            .map(NativeType::Int)
            .ok_or_else(|| NativeError::unsupported(format!("no native integer of width {}", width))),
        IrType::Float => Ok(NativeType::Float),
        IrType::Double => Ok(NativeType::Double),
        IrType::Void => Ok(NativeType::Void),
        IrType::Pointer(pointee) => lower_pointer(pointee, module, table),
        IrType::Struct(id) => lower_struct(*id, module, table),
        IrType::Other(repr) => Err(NativeError::unsupported(repr.clone())),
    }
}

fn lower_pointer(pointee: &IrType, module: &IrModule, table: &mut NameTable) -> Result<NativeType, NativeError> {
    match pointee {
        // char* travels as a C string, not as a pointer to c_int8
        IrType::Integer { width: 8 } => Ok(NativeType::CString),
        IrType::Void => Ok(NativeType::VoidPtr),
        _ => Ok(NativeType::pointer_to(lower_type(pointee, module, table)?)),
    }
}

/// `struct.Node` -> `Node`
///
/// Only the segment after the last dot is kept, so a renamed duplicate such
/// as `struct.Node.0` registers as `0`.
pub fn struct_name(ir_name: &str) -> &str {
    ir_name.rsplit('.').next().unwrap_or(ir_name)
}

fn lower_struct(id: StructId, module: &IrModule, table: &mut NameTable) -> Result<NativeType, NativeError> {
    let def = module
        .struct_def(id)
        .ok_or_else(|| NativeError::unsupported(format!("struct {} is not defined in module '{}'", id, module.name)))?;
    let name = struct_name(&def.name);

    if let Some(existing) = table.lookup_aggregate(name) {
        return Ok(NativeType::Struct(existing));
    }

    let names = match table.get(name) {
        Some(Binding::FieldNames(hints)) if hints.len() == def.element_count() => hints.clone(),
        _ => (0..def.element_count()).map(|n| format!("e{}", n)).collect(),
    };

    // Register before lowering the elements: a pointer back to this struct
    // must find the placeholder instead of starting over.
    let aggregate = table.begin_aggregate(name);
    log::debug!("Lowering aggregate '{}' ({} fields)", name, def.element_count());

    let mut fields = Vec::with_capacity(def.element_count());
    for (field_name, element) in names.into_iter().zip(&def.elements) {
        let ty = lower_type(element, module, table)?;
        if ty.is_void() {
            return Err(NativeError::unsupported(format!("void field '{}' in struct '{}'", field_name, name)));
        }
        fields.push(Field { name: field_name, ty });
    }

    table.finish_aggregate(aggregate, fields)?;
    Ok(NativeType::Struct(aggregate))
}

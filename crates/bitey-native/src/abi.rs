//! Placement of parameters and return values under the host's C calling convention.
//!
//! Scalars always travel in a single slot. Aggregates passed by value are
//! classified from their C layout: small ones are split into register-sized
//! pieces, larger ones go through memory (copied onto the stack, passed as a
//! pointer to a copy, or returned through a hidden pointer) depending on the
//! convention.

use crate::error::NativeError;
use crate::namespace::NameTable;
use crate::translator::signature::CallDescriptor;
use crate::types::{AggregateId, IntWidth, NativeType};
use cranelift_codegen::ir::{types, AbiParam, ArgumentPurpose, Type};
use cranelift_codegen::isa::{CallConv, TargetIsa};

/// Machine class of a scalar at the call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    Int(IntWidth),
    Float,
    Double,
    Pointer,
}

impl SlotKind {
    pub(crate) fn of_scalar(ty: &NativeType) -> Option<Self> {
        match ty {
            NativeType::Int(width) => Some(SlotKind::Int(*width)),
            NativeType::Float => Some(SlotKind::Float),
            NativeType::Double => Some(SlotKind::Double),
            NativeType::CString | NativeType::VoidPtr | NativeType::Pointer(_) => Some(SlotKind::Pointer),
            NativeType::Struct(_) | NativeType::Void => None,
        }
    }

    pub(crate) fn clif_type(self, pointer_type: Type) -> Type {
        match self {
            SlotKind::Int(IntWidth::W8) => types::I8,
            SlotKind::Int(IntWidth::W16) => types::I16,
            SlotKind::Int(IntWidth::W32) => types::I32,
            SlotKind::Int(IntWidth::W64) => types::I64,
            SlotKind::Float => types::F32,
            SlotKind::Double => types::F64,
            SlotKind::Pointer => pointer_type,
        }
    }

    fn abi_param(self, pointer_type: Type) -> AbiParam {
        let param = AbiParam::new(self.clif_type(pointer_type));
        match self {
            // C promotes narrow signed integers at the call boundary
            SlotKind::Int(IntWidth::W8) | SlotKind::Int(IntWidth::W16) => param.sext(),
            _ => param,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, SlotKind::Float | SlotKind::Double)
    }
}

/// Calling convention family of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostAbi {
    /// x86-64 System V.
    SysV64,
    /// x86-64 Windows.
    Win64,
    /// AArch64 procedure call standard (Linux and Apple).
    Aapcs64,
    /// Anything else: scalars only.
    Other,
}

impl HostAbi {
    pub(crate) fn of(isa: &dyn TargetIsa) -> Self {
        match (isa.name(), isa.default_call_conv()) {
            ("x64", CallConv::WindowsFastcall) => HostAbi::Win64,
            ("x64", _) => HostAbi::SysV64,
            ("aarch64", CallConv::WindowsFastcall) => HostAbi::Other,
            ("aarch64", _) => HostAbi::Aapcs64,
            _ => HostAbi::Other,
        }
    }
}

/// How one value crosses the call boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PassMode {
    /// A scalar in one slot.
    Direct(SlotKind),
    /// A record split into pieces, each at a byte offset within the record.
    Cast { size: usize, pieces: Vec<(u32, SlotKind)> },
    /// A record the call copies into the outgoing stack arguments.
    OnStack { size: usize },
    /// A record passed as a pointer to a copy, or returned through a hidden pointer.
    Indirect { size: usize },
}

impl PassMode {
    /// Byte size of the record behind an aggregate mode.
    pub(crate) fn record_size(&self) -> Option<usize> {
        match self {
            PassMode::Direct(_) => None,
            PassMode::Cast { size, .. } | PassMode::OnStack { size } | PassMode::Indirect { size } => Some(*size),
        }
    }

    pub(crate) fn abi_params(&self, pointer_type: Type) -> Vec<AbiParam> {
        match self {
            PassMode::Direct(kind) => vec![kind.abi_param(pointer_type)],
            PassMode::Cast { pieces, .. } => pieces
                .iter()
                .map(|(_, kind)| AbiParam::new(kind.clif_type(pointer_type)))
                .collect(),
            PassMode::OnStack { size } => {
                let size = round_up(*size, pointer_type.bytes() as usize) as u32;
                vec![AbiParam::special(pointer_type, ArgumentPurpose::StructArgument(size))]
            }
            PassMode::Indirect { .. } => vec![AbiParam::new(pointer_type)],
        }
    }

    /// The hidden return pointer parameter, if any, and the returned values.
    pub(crate) fn abi_returns(&self, pointer_type: Type) -> (Option<AbiParam>, Vec<AbiParam>) {
        match self {
            PassMode::Direct(kind) => (None, vec![kind.abi_param(pointer_type)]),
            PassMode::Cast { pieces, .. } => (
                None,
                pieces
                    .iter()
                    .map(|(_, kind)| AbiParam::new(kind.clif_type(pointer_type)))
                    .collect(),
            ),
            PassMode::OnStack { .. } | PassMode::Indirect { .. } => {
                (Some(AbiParam::special(pointer_type, ArgumentPurpose::StructReturn)), Vec::new())
            }
        }
    }
}

/// Pass modes of a whole call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallAbi {
    pub params: Vec<PassMode>,
    /// `None` for void.
    pub ret: Option<PassMode>,
}

/// Classifies every parameter and the return value of `descriptor`.
pub(crate) fn classify(descriptor: &CallDescriptor, host: HostAbi, table: &NameTable) -> Result<CallAbi, NativeError> {
    let ret = match &descriptor.return_type {
        NativeType::Void => None,
        ty => Some(classify_return(ty, host, table)?),
    };

    let mut registers = ArgRegisters::new(host);
    if let Some(PassMode::Indirect { .. }) = ret {
        registers.take(SlotKind::Pointer);
    }

    let params = descriptor
        .params
        .iter()
        .map(|ty| classify_param(ty, host, table, &mut registers))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallAbi { params, ret })
}

fn classify_param(
    ty: &NativeType,
    host: HostAbi,
    table: &NameTable,
    registers: &mut ArgRegisters,
) -> Result<PassMode, NativeError> {
    let id = match ty {
        NativeType::Struct(id) => *id,
        NativeType::Void => return Err(NativeError::unsupported("void outside of a return position")),
        scalar => {
            let kind = SlotKind::of_scalar(scalar).ok_or_else(|| NativeError::unsupported(scalar.to_string()))?;
            registers.take(kind);
            return Ok(PassMode::Direct(kind));
        }
    };

    let shape = Shape::of(id, table)?;
    match host {
        HostAbi::SysV64 => match shape.sysv_pieces() {
            Some(pieces) if registers.try_take_pieces(&pieces) => Ok(PassMode::Cast { size: shape.size, pieces }),
            // No room for every piece: the whole record goes to memory.
            _ => Ok(PassMode::OnStack { size: shape.size }),
        },
        HostAbi::Win64 => Ok(shape.win64_mode()),
        HostAbi::Aapcs64 => match shape.aapcs_pieces() {
            Some(pieces) if registers.try_take_pieces(&pieces) => Ok(PassMode::Cast { size: shape.size, pieces }),
            Some(_) => Err(NativeError::AggregateByValue(shape.name)),
            None => {
                registers.take(SlotKind::Pointer);
                Ok(PassMode::Indirect { size: shape.size })
            }
        },
        HostAbi::Other => Err(NativeError::AggregateByValue(shape.name)),
    }
}

fn classify_return(ty: &NativeType, host: HostAbi, table: &NameTable) -> Result<PassMode, NativeError> {
    let id = match ty {
        NativeType::Struct(id) => *id,
        scalar => {
            return SlotKind::of_scalar(scalar)
                .map(PassMode::Direct)
                .ok_or_else(|| NativeError::unsupported(scalar.to_string()))
        }
    };

    let shape = Shape::of(id, table)?;
    let pieces = match host {
        HostAbi::SysV64 => shape.sysv_pieces(),
        HostAbi::Win64 => return Ok(shape.win64_mode()),
        HostAbi::Aapcs64 => shape.aapcs_pieces(),
        HostAbi::Other => return Err(NativeError::AggregateByValue(shape.name)),
    };
    Ok(match pieces {
        Some(pieces) => PassMode::Cast { size: shape.size, pieces },
        None => PassMode::Indirect { size: shape.size },
    })
}

// --- Register accounting --- //

/// Argument registers still free. Only consulted where a record that does
/// not fit entirely in registers changes how it is passed.
struct ArgRegisters {
    int: usize,
    float: usize,
}

impl ArgRegisters {
    fn new(host: HostAbi) -> Self {
        match host {
            HostAbi::SysV64 => ArgRegisters { int: 6, float: 8 },
            HostAbi::Aapcs64 => ArgRegisters { int: 8, float: 8 },
            HostAbi::Win64 | HostAbi::Other => ArgRegisters { int: 4, float: 4 },
        }
    }

    fn take(&mut self, kind: SlotKind) {
        if kind.is_float() {
            self.float = self.float.saturating_sub(1);
        } else {
            self.int = self.int.saturating_sub(1);
        }
    }

    fn try_take_pieces(&mut self, pieces: &[(u32, SlotKind)]) -> bool {
        let float = pieces.iter().filter(|(_, kind)| kind.is_float()).count();
        let int = pieces.len() - float;
        if int > self.int || float > self.float {
            return false;
        }
        self.int -= int;
        self.float -= float;
        true
    }
}

// --- Record shapes --- //

/// A record flattened to its scalar members.
struct Shape {
    name: String,
    size: usize,
    /// Byte offset and class of every scalar member, nested records included.
    leaves: Vec<(usize, SlotKind)>,
}

impl Shape {
    fn of(id: AggregateId, table: &NameTable) -> Result<Self, NativeError> {
        let name = table.aggregate_or_err(id)?.name.clone();
        let size = table.layout_of(&NativeType::Struct(id))?.size_bytes;
        let mut leaves = Vec::new();
        flatten(id, 0, table, &mut leaves)?;
        Ok(Shape { name, size, leaves })
    }

    fn words(&self) -> usize {
        round_up(self.size, 8) / 8
    }

    /// Eightbyte classification; `None` for the MEMORY class.
    fn sysv_pieces(&self) -> Option<Vec<(u32, SlotKind)>> {
        if self.size > 16 {
            return None;
        }
        let pieces = (0..self.words())
            .map(|word| {
                let members: Vec<SlotKind> = self
                    .leaves
                    .iter()
                    .filter(|(offset, _)| offset / 8 == word)
                    .map(|(_, kind)| *kind)
                    .collect();
                let kind = match members.as_slice() {
                    [SlotKind::Float] => SlotKind::Float,
                    _ if !members.is_empty() && members.iter().all(|kind| kind.is_float()) => SlotKind::Double,
                    _ => SlotKind::Int(IntWidth::W64),
                };
                ((word * 8) as u32, kind)
            })
            .collect();
        Some(pieces)
    }

    /// Homogeneous floating-point aggregate of one to four members, or a record
    /// of at most 16 bytes in general registers; `None` when passed by reference.
    fn aapcs_pieces(&self) -> Option<Vec<(u32, SlotKind)>> {
        if let Some(element) = self.homogeneous_float() {
            return Some(self.leaves.iter().map(|(offset, _)| (*offset as u32, element)).collect());
        }
        if self.size > 16 {
            return None;
        }
        Some(
            (0..self.words())
                .map(|word| ((word * 8) as u32, SlotKind::Int(IntWidth::W64)))
                .collect(),
        )
    }

    fn homogeneous_float(&self) -> Option<SlotKind> {
        let (_, first) = self.leaves.first()?;
        let element_size = match first {
            SlotKind::Float => 4,
            SlotKind::Double => 8,
            _ => return None,
        };
        let uniform = self.leaves.iter().all(|(_, kind)| kind == first);
        (uniform && self.leaves.len() <= 4 && self.size == self.leaves.len() * element_size).then_some(*first)
    }

    /// Records of 1, 2, 4 or 8 bytes travel as an integer of that size,
    /// everything else by reference.
    fn win64_mode(&self) -> PassMode {
        let width = match self.size {
            1 => IntWidth::W8,
            2 => IntWidth::W16,
            4 => IntWidth::W32,
            8 => IntWidth::W64,
            size => return PassMode::Indirect { size },
        };
        PassMode::Cast {
            size: self.size,
            pieces: vec![(0, SlotKind::Int(width))],
        }
    }
}

fn flatten(id: AggregateId, base: usize, table: &NameTable, leaves: &mut Vec<(usize, SlotKind)>) -> Result<(), NativeError> {
    let aggregate = table.aggregate_or_err(id)?;
    let fields = aggregate
        .fields()
        .ok_or_else(|| NativeError::IncompleteAggregate(aggregate.name.clone()))?;
    let offsets = table.field_offsets(id)?;

    for (field, offset) in fields.iter().zip(offsets) {
        match &field.ty {
            NativeType::Struct(inner) => flatten(*inner, base + offset, table, leaves)?,
            ty => {
                let kind = SlotKind::of_scalar(ty).ok_or_else(|| NativeError::unsupported(ty.to_string()))?;
                leaves.push((base + offset, kind));
            }
        }
    }
    Ok(())
}

fn round_up(size: usize, to: usize) -> usize {
    size.div_ceil(to) * to
}

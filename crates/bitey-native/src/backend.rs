use crate::abi::{classify, HostAbi, PassMode, SlotKind};
use crate::error::NativeError;
use crate::namespace::NameTable;
use crate::translator::signature::CallDescriptor;
use crate::types::{IntWidth, NativeType};
use crate::value::Value;
use bitey_ir::CodeAddress;
use cranelift_codegen::ir::{AbiParam, InstBuilder, MemFlags, UserFuncName};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, Module};
use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::mem;
use std::ptr;
use std::rc::Rc;

/// Every argument travels through an 8-byte slot; records through a pointer to their bytes.
const SLOT_SIZE: usize = 8;

/// Signature of every compiled shim: `(args, ret)`, host C calling convention.
type ShimFn = unsafe extern "C" fn(*const u64, *mut u64);

/// Compiles call shims into a JIT module shared by all trampolines it builds.
pub struct TrampolineBuilder {
    jit: Rc<RefCell<JITModule>>,
    func_ctx: FunctionBuilderContext,
    host: HostAbi,
}

impl TrampolineBuilder {
    /// Sets up Cranelift for the host ISA.
    pub fn new() -> Result<Self, NativeError> {
        let mut flag_builder = settings::builder();
        flag_builder.set("use_colocated_libcalls", "false")?;
        flag_builder.set("is_pic", "false")?;
        flag_builder.set("opt_level", "none")?;
        #[cfg(debug_assertions)]
        flag_builder.set("enable_verifier", "true")?;
        let flags = settings::Flags::new(flag_builder);

        let isa_builder = cranelift_native::builder()
            .map_err(|e| NativeError::IsaSetupError(format!("Host target lookup failed: {}", e)))?;
        let isa = isa_builder.finish(flags)?;
        let host = HostAbi::of(&*isa);
        log::debug!("Trampolines target {} ({:?})", isa.triple(), host);

        let builder = JITBuilder::with_isa(isa, default_libcall_names());
        Ok(TrampolineBuilder {
            jit: Rc::new(RefCell::new(JITModule::new(builder))),
            func_ctx: FunctionBuilderContext::new(),
            host,
        })
    }

    /// Builds a trampoline calling the code at `target` with the given descriptor.
    ///
    /// Aggregates passed or returned by value follow the host's C convention;
    /// where it cannot be expressed the build fails with `AggregateByValue`.
    /// `target` is not checked; its owner must outlive the trampoline.
    pub fn build(
        &mut self,
        descriptor: CallDescriptor,
        target: CodeAddress,
        table: &NameTable,
    ) -> Result<Trampoline, NativeError> {
        let abi = classify(&descriptor, self.host, table)?;
        let shim = self.compile_shim(&abi.params, abi.ret.as_ref(), target)?;
        log::debug!("Built trampoline {} -> {:?}", descriptor, target);

        Ok(Trampoline {
            descriptor,
            params: abi.params,
            ret: abi.ret,
            target,
            shim,
            _code: Rc::clone(&self.jit),
            owner: None,
        })
    }

    fn compile_shim(
        &mut self,
        params: &[PassMode],
        ret: Option<&PassMode>,
        target: CodeAddress,
    ) -> Result<ShimFn, NativeError> {
        let mut jit = self.jit.borrow_mut();
        let pointer_type = jit.target_config().pointer_type();

        let mut shim_sig = jit.make_signature();
        shim_sig.params.push(AbiParam::new(pointer_type));
        shim_sig.params.push(AbiParam::new(pointer_type));

        let mut target_sig = jit.make_signature();
        let (sret, returns) = match ret {
            Some(mode) => mode.abi_returns(pointer_type),
            None => (None, Vec::new()),
        };
        target_sig.params.extend(sret);
        for mode in params {
            target_sig.params.extend(mode.abi_params(pointer_type));
        }
        target_sig.returns = returns;

        let func_id = jit.declare_anonymous_function(&shim_sig)?;
        let mut ctx = jit.make_context();
        ctx.func.signature = shim_sig;
        ctx.func.name = UserFuncName::user(0, func_id.as_u32());

        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut self.func_ctx);
            let entry_block = builder.create_block();
            builder.append_block_params_for_function_params(entry_block);
            builder.switch_to_block(entry_block);
            builder.seal_block(entry_block);

            let args_ptr = builder.block_params(entry_block)[0];
            let ret_ptr = builder.block_params(entry_block)[1];
            let flags = MemFlags::trusted();

            let mut args = Vec::with_capacity(params.len() + 1);
            if sret.is_some() {
                args.push(ret_ptr);
            }
            for (i, mode) in params.iter().enumerate() {
                let offset = (i * SLOT_SIZE) as i32;
                match mode {
                    PassMode::Direct(kind) => {
                        args.push(builder.ins().load(kind.clif_type(pointer_type), flags, args_ptr, offset));
                    }
                    PassMode::Cast { pieces, .. } => {
                        let record = builder.ins().load(pointer_type, flags, args_ptr, offset);
                        for (piece_offset, kind) in pieces {
                            let piece_offset = *piece_offset as i32;
                            args.push(builder.ins().load(kind.clif_type(pointer_type), flags, record, piece_offset));
                        }
                    }
                    PassMode::OnStack { .. } | PassMode::Indirect { .. } => {
                        args.push(builder.ins().load(pointer_type, flags, args_ptr, offset));
                    }
                }
            }

            let sig_ref = builder.import_signature(target_sig);
            let callee = builder.ins().iconst(pointer_type, target.as_usize() as i64);
            let call = builder.ins().call_indirect(sig_ref, callee, &args);
            let results = builder.inst_results(call).to_vec();
            match ret {
                Some(PassMode::Direct(_)) => {
                    builder.ins().store(flags, results[0], ret_ptr, 0);
                }
                Some(PassMode::Cast { pieces, .. }) => {
                    for (result, (piece_offset, _)) in results.iter().zip(pieces) {
                        builder.ins().store(flags, *result, ret_ptr, *piece_offset as i32);
                    }
                }
                // written through the hidden pointer by the callee
                Some(PassMode::OnStack { .. }) | Some(PassMode::Indirect { .. }) | None => {}
            }
            builder.ins().return_(&[]);
            builder.finalize();
        }

        jit.define_function(func_id, &mut ctx)?;
        jit.clear_context(&mut ctx);
        jit.finalize_definitions()?;

        let code = jit.get_finalized_function(func_id);
        // SAFETY: the shim was just compiled with the (ptr, ptr) -> () signature
        // in the host's default calling convention.
        Ok(unsafe { mem::transmute::<*const u8, ShimFn>(code) })
    }
}

impl fmt::Debug for TrampolineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrampolineBuilder").field("jit", &"[JITModule]").finish()
    }
}

/// A callable bound to one native code address.
pub struct Trampoline {
    descriptor: CallDescriptor,
    params: Vec<PassMode>,
    ret: Option<PassMode>,
    target: CodeAddress,
    shim: ShimFn,
    /// The shim's machine code lives in this module.
    _code: Rc<RefCell<JITModule>>,
    /// Keeps the target code's owner alive.
    owner: Option<Rc<dyn Any>>,
}

impl Trampoline {
    /// Ties the lifetime of `owner` (typically the execution engine) to this trampoline.
    pub fn with_owner(mut self, owner: Rc<dyn Any>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> CodeAddress {
        self.target
    }

    /// Marshals `args`, calls the target and converts its return value.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// 1. The target code is still mapped (its owner is alive).
    /// 2. Pointer arguments are valid for whatever the callee does with them.
    /// 3. A returned `char*` is either null or points to a NUL-terminated buffer.
    /// 4. Record bytes form a valid value of the aggregate (pointers inside included).
    pub unsafe fn invoke(&self, args: &[Value]) -> Result<Value, NativeError> {
        if args.len() != self.params.len() {
            return Err(NativeError::ArityMismatch {
                expected: self.params.len(),
                found: args.len(),
            });
        }

        let mut slots = vec![0u64; self.params.len().max(1)];
        // C strings and record copies handed to the callee; alive until the call returns.
        let mut strings: Vec<CString> = Vec::new();
        let mut records: Vec<Vec<u64>> = Vec::new();
        for (index, ((ty, mode), arg)) in self.descriptor.params.iter().zip(&self.params).zip(args).enumerate() {
            match (mode, mode.record_size()) {
                (PassMode::Direct(kind), _) => marshal_arg(index, ty, *kind, arg, &mut slots[index], &mut strings)?,
                (_, Some(size)) => {
                    let record = marshal_record(index, ty, size, arg)?;
                    write_slot(&mut slots[index], record.as_ptr() as usize);
                    records.push(record);
                }
                (_, None) => return Err(mismatch(index, ty, arg)),
            }
        }

        let ret_size = self.ret.as_ref().and_then(PassMode::record_size);
        let mut ret_words = vec![0u64; ret_size.map_or(1, |size| size.div_ceil(SLOT_SIZE).max(1))];
        (self.shim)(slots.as_ptr(), ret_words.as_mut_ptr());
        drop(strings);
        drop(records);

        Ok(match (&self.ret, ret_size) {
            (None, _) => Value::Void,
            (Some(PassMode::Direct(kind)), _) => unmarshal_return(&self.descriptor.return_type, *kind, &ret_words[0]),
            (Some(_), size) => Value::Record(record_bytes(&ret_words, size.unwrap_or(0))),
        })
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("descriptor", &self.descriptor)
            .field("target", &self.target)
            .finish()
    }
}

// --- Marshalling --- //

fn write_slot<T: Copy>(slot: &mut u64, value: T) {
    debug_assert!(mem::size_of::<T>() <= SLOT_SIZE);
    // SAFETY: the slot is 8 bytes and T is no larger.
    unsafe { ptr::write_unaligned(slot as *mut u64 as *mut T, value) }
}

fn read_slot<T: Copy>(slot: &u64) -> T {
    debug_assert!(mem::size_of::<T>() <= SLOT_SIZE);
    // SAFETY: as in write_slot.
    unsafe { ptr::read_unaligned(slot as *const u64 as *const T) }
}

fn mismatch(index: usize, expected: &NativeType, found: &Value) -> NativeError {
    NativeError::ArgumentMismatch {
        index,
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

fn marshal_arg(
    index: usize,
    ty: &NativeType,
    kind: SlotKind,
    arg: &Value,
    slot: &mut u64,
    strings: &mut Vec<CString>,
) -> Result<(), NativeError> {
    match (kind, arg) {
        // Integers truncate to the parameter width.
        (SlotKind::Int(IntWidth::W8), Value::Int(n)) => write_slot(slot, *n as i8),
        (SlotKind::Int(IntWidth::W16), Value::Int(n)) => write_slot(slot, *n as i16),
        (SlotKind::Int(IntWidth::W32), Value::Int(n)) => write_slot(slot, *n as i32),
        (SlotKind::Int(IntWidth::W64), Value::Int(n)) => write_slot(slot, *n),

        (SlotKind::Float, Value::Float(x)) => write_slot(slot, *x),
        (SlotKind::Float, Value::Double(x)) => write_slot(slot, *x as f32),
        (SlotKind::Float, Value::Int(n)) => write_slot(slot, *n as f32),
        (SlotKind::Double, Value::Double(x)) => write_slot(slot, *x),
        (SlotKind::Double, Value::Float(x)) => write_slot(slot, *x as f64),
        (SlotKind::Double, Value::Int(n)) => write_slot(slot, *n as f64),

        (SlotKind::Pointer, Value::Null) => write_slot(slot, 0usize),
        (SlotKind::Pointer, Value::Address(address)) => write_slot(slot, *address),
        (SlotKind::Pointer, Value::Bytes(bytes)) if *ty == NativeType::CString => {
            let string = CString::new(bytes.as_slice()).map_err(|_| NativeError::ArgumentMismatch {
                index,
                expected: ty.to_string(),
                found: "bytes with an interior NUL".to_string(),
            })?;
            write_slot(slot, string.as_ptr() as usize);
            strings.push(string);
        }
        (SlotKind::Pointer, Value::Int(n)) if *ty != NativeType::CString && *n >= 0 => write_slot(slot, *n as usize),

        _ => return Err(mismatch(index, ty, arg)),
    }
    Ok(())
}

/// Copies record bytes into a word-aligned buffer padded to whole slots.
fn marshal_record(index: usize, ty: &NativeType, size: usize, arg: &Value) -> Result<Vec<u64>, NativeError> {
    let bytes = match arg {
        Value::Record(bytes) if bytes.len() == size => bytes,
        Value::Record(bytes) => {
            return Err(NativeError::ArgumentMismatch {
                index,
                expected: format!("{} ({} bytes)", ty, size),
                found: format!("record of {} bytes", bytes.len()),
            })
        }
        _ => return Err(mismatch(index, ty, arg)),
    };
    let mut words = vec![0u64; size.div_ceil(SLOT_SIZE).max(1)];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(SLOT_SIZE)) {
        let mut buf = [0u8; SLOT_SIZE];
        buf[..chunk.len()].copy_from_slice(chunk);
        *word = u64::from_ne_bytes(buf);
    }
    Ok(words)
}

fn record_bytes(words: &[u64], size: usize) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_ne_bytes()).take(size).collect()
}

fn unmarshal_return(ty: &NativeType, kind: SlotKind, slot: &u64) -> Value {
    match kind {
        SlotKind::Int(IntWidth::W8) => Value::Int(read_slot::<i8>(slot) as i64),
        SlotKind::Int(IntWidth::W16) => Value::Int(read_slot::<i16>(slot) as i64),
        SlotKind::Int(IntWidth::W32) => Value::Int(read_slot::<i32>(slot) as i64),
        SlotKind::Int(IntWidth::W64) => Value::Int(read_slot::<i64>(slot)),
        SlotKind::Float => Value::Float(read_slot::<f32>(slot)),
        SlotKind::Double => Value::Double(read_slot::<f64>(slot)),
        SlotKind::Pointer => {
            let address = read_slot::<usize>(slot);
            match ty {
                NativeType::CString if address == 0 => Value::Null,
                NativeType::CString => {
                    // SAFETY: callers of `invoke` vouch for returned C strings.
                    let string = unsafe { CStr::from_ptr(address as *const c_char) };
                    Value::Bytes(string.to_bytes().to_vec())
                }
                NativeType::VoidPtr if address == 0 => Value::Null,
                _ => Value::Address(address),
            }
        }
    }
}

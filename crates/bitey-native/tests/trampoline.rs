use bitey_ir::CodeAddress;
use bitey_native::{CallDescriptor, Field, IntWidth, NameTable, NativeError, NativeType, Trampoline, TrampolineBuilder, Value};
use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicI32, Ordering};

// --- Native targets --- //

extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}

extern "C" fn negate_byte(x: i8) -> i8 {
    x.wrapping_neg()
}

extern "C" fn scale(x: f64, by: f32) -> f64 {
    x * by as f64
}

extern "C" fn greeting() -> *const c_char {
    b"hello\0".as_ptr() as *const c_char
}

extern "C" fn no_string() -> *const c_char {
    std::ptr::null()
}

extern "C" fn c_strlen(s: *const c_char) -> i64 {
    if s.is_null() {
        return -1;
    }
    unsafe { CStr::from_ptr(s) }.to_bytes().len() as i64
}

extern "C" fn identity_ptr(p: *mut u8) -> *mut u8 {
    p
}

#[repr(C)]
struct Point {
    x: i32,
    y: i32,
}

extern "C" fn point_sum(p: *const Point) -> i32 {
    let p = unsafe { &*p };
    p.x + p.y
}

#[allow(clippy::too_many_arguments)]
extern "C" fn weighted(a: i64, b: i32, c: i16, d: i8, e: f64, f: f32, g: i64, h: i64, i: i64) -> f64 {
    (a + b as i64 + c as i64 + d as i64 + g + h + i) as f64 + e + f as f64
}

static BUMPS: AtomicI32 = AtomicI32::new(0);

extern "C" fn bump() {
    BUMPS.fetch_add(1, Ordering::SeqCst);
}

// --- Helpers --- //

fn int32() -> NativeType {
    NativeType::Int(IntWidth::W32)
}

fn build(descriptor: CallDescriptor, address: usize) -> Trampoline {
    let table = NameTable::new();
    let mut builder = TrampolineBuilder::new().expect("host ISA should be available");
    builder
        .build(descriptor, CodeAddress::from_usize(address).unwrap(), &table)
        .expect("trampoline should build")
}

// --- Tests --- //

#[test]
fn test_call_integer_function() {
    let trampoline = build(CallDescriptor::new(int32(), vec![int32(), int32()]), add as usize);
    let result = unsafe { trampoline.invoke(&[Value::Int(2), Value::Int(3)]) }.unwrap();
    assert_eq!(result, Value::Int(5));
}

#[test]
fn test_narrow_integers_sign_extend() {
    let int8 = NativeType::Int(IntWidth::W8);
    let trampoline = build(CallDescriptor::new(int8.clone(), vec![int8]), negate_byte as usize);
    assert_eq!(unsafe { trampoline.invoke(&[Value::Int(5)]) }.unwrap(), Value::Int(-5));
    // 0x180 truncates to -128, whose negation wraps back to -128
    assert_eq!(unsafe { trampoline.invoke(&[Value::Int(0x180)]) }.unwrap(), Value::Int(-128));
}

#[test]
fn test_floating_point_arguments() {
    let trampoline = build(
        CallDescriptor::new(NativeType::Double, vec![NativeType::Double, NativeType::Float]),
        scale as usize,
    );
    let result = unsafe { trampoline.invoke(&[Value::Double(1.5), Value::Float(4.0)]) }.unwrap();
    assert_eq!(result, Value::Double(6.0));
    // integers are accepted where floats are expected
    let result = unsafe { trampoline.invoke(&[Value::Int(3), Value::Int(2)]) }.unwrap();
    assert_eq!(result, Value::Double(6.0));
}

#[test]
fn test_string_return_becomes_bytes() {
    let trampoline = build(CallDescriptor::new(NativeType::CString, vec![]), greeting as usize);
    assert_eq!(unsafe { trampoline.invoke(&[]) }.unwrap(), Value::Bytes(b"hello".to_vec()));

    let trampoline = build(CallDescriptor::new(NativeType::CString, vec![]), no_string as usize);
    assert_eq!(unsafe { trampoline.invoke(&[]) }.unwrap(), Value::Null);
}

#[test]
fn test_string_arguments() {
    let trampoline = build(
        CallDescriptor::new(NativeType::Int(IntWidth::W64), vec![NativeType::CString]),
        c_strlen as usize,
    );
    assert_eq!(unsafe { trampoline.invoke(&[Value::from("bitcode")]) }.unwrap(), Value::Int(7));
    assert_eq!(unsafe { trampoline.invoke(&[Value::Null]) }.unwrap(), Value::Int(-1));

    let err = unsafe { trampoline.invoke(&[Value::Bytes(b"a\0b".to_vec())]) }.unwrap_err();
    assert!(matches!(err, NativeError::ArgumentMismatch { index: 0, .. }));
}

#[test]
fn test_void_pointers() {
    let trampoline = build(
        CallDescriptor::new(NativeType::VoidPtr, vec![NativeType::VoidPtr]),
        identity_ptr as usize,
    );
    assert_eq!(unsafe { trampoline.invoke(&[Value::Address(0x1000)]) }.unwrap(), Value::Address(0x1000));
    assert_eq!(unsafe { trampoline.invoke(&[Value::Null]) }.unwrap(), Value::Null);
}

#[test]
fn test_pointer_to_aggregate() {
    let mut table = NameTable::new();
    let id = table.begin_aggregate("Point");
    table
        .finish_aggregate(
            id,
            vec![Field { name: "x".into(), ty: int32() }, Field { name: "y".into(), ty: int32() }],
        )
        .unwrap();
    assert_eq!(table.layout_of(&NativeType::Struct(id)).unwrap().size_bytes, std::mem::size_of::<Point>());

    let descriptor = CallDescriptor::new(int32(), vec![NativeType::pointer_to(NativeType::Struct(id))]);
    let mut builder = TrampolineBuilder::new().unwrap();
    let trampoline = builder
        .build(descriptor, CodeAddress::from_usize(point_sum as usize).unwrap(), &table)
        .unwrap();

    let point = Point { x: 40, y: 2 };
    let result = unsafe { trampoline.invoke(&[Value::from(&point as *const Point)]) }.unwrap();
    assert_eq!(result, Value::Int(42));
}

#[test]
fn test_many_arguments_spill_to_the_stack() {
    let int64 = NativeType::Int(IntWidth::W64);
    let descriptor = CallDescriptor::new(
        NativeType::Double,
        vec![
            int64.clone(),
            int32(),
            NativeType::Int(IntWidth::W16),
            NativeType::Int(IntWidth::W8),
            NativeType::Double,
            NativeType::Float,
            int64.clone(),
            int64.clone(),
            int64,
        ],
    );
    let trampoline = build(descriptor, weighted as usize);
    let args: Vec<Value> = vec![
        Value::Int(1),
        Value::Int(2),
        Value::Int(3),
        Value::Int(-4),
        Value::Double(0.5),
        Value::Float(0.25),
        Value::Int(10),
        Value::Int(20),
        Value::Int(30),
    ];
    assert_eq!(unsafe { trampoline.invoke(&args) }.unwrap(), Value::Double(62.75));
}

#[test]
fn test_void_return() {
    let trampoline = build(CallDescriptor::new(NativeType::Void, vec![]), bump as usize);
    let before = BUMPS.load(Ordering::SeqCst);
    assert_eq!(unsafe { trampoline.invoke(&[]) }.unwrap(), Value::Void);
    assert_eq!(BUMPS.load(Ordering::SeqCst), before + 1);
}

#[test]
fn test_argument_checks_happen_before_the_call() {
    let trampoline = build(CallDescriptor::new(int32(), vec![int32(), int32()]), add as usize);
    assert!(matches!(
        unsafe { trampoline.invoke(&[Value::Int(1)]) },
        Err(NativeError::ArityMismatch { expected: 2, found: 1 })
    ));
    assert!(matches!(
        unsafe { trampoline.invoke(&[Value::Int(1), Value::from("two")]) },
        Err(NativeError::ArgumentMismatch { index: 1, .. })
    ));
}

#[test]
fn test_one_builder_many_trampolines() {
    let table = NameTable::new();
    let mut builder = TrampolineBuilder::new().unwrap();
    let sum = builder
        .build(CallDescriptor::new(int32(), vec![int32(), int32()]), CodeAddress::from_usize(add as usize).unwrap(), &table)
        .unwrap();
    let hello = builder
        .build(CallDescriptor::new(NativeType::CString, vec![]), CodeAddress::from_usize(greeting as usize).unwrap(), &table)
        .unwrap();
    drop(builder);

    assert_eq!(unsafe { sum.invoke(&[Value::Int(-7), Value::Int(7)]) }.unwrap(), Value::Int(0));
    assert_eq!(unsafe { hello.invoke(&[]) }.unwrap().as_bytes(), Some(&b"hello"[..]));
}

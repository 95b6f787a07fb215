use crate::config::WrapOptions;
use crate::error::BindError;
use crate::report::{SkippedFunction, WrapReport};
use bitey_ir::{ExecutionEngine, IrFunction, IrModule, Linkage, ModuleLoader};
use bitey_native::{translate_signature, Binding, NameTable, NativeError, TrampolineBuilder, WrappedFunction};
use std::any::Any;
use std::rc::Rc;

/// Name under which the loaded module is kept alive in the table.
pub const MODULE_KEY: &str = "_ir_module";
/// Name under which the execution engine is kept alive in the table.
pub const ENGINE_KEY: &str = "_ir_engine";

/// Whether the driver should try to wrap `function` at all.
pub fn is_eligible(function: &IrFunction, options: &WrapOptions) -> bool {
    !function.name.starts_with(&options.internal_prefix)
        && !function.is_declaration
        && function.linkage == Linkage::External
}

/// Translates, resolves and builds one function.
///
/// The resulting wrapper holds `engine` so the compiled code outlives it.
pub fn wrap_function<E>(
    function: &IrFunction,
    module: &IrModule,
    engine: &Rc<E>,
    table: &mut NameTable,
    builder: &mut TrampolineBuilder,
) -> Result<WrappedFunction, NativeError>
where
    E: ExecutionEngine + 'static,
{
    let descriptor = translate_signature(function, module, table)?;
    let address = engine.resolve(function)?;
    let owner: Rc<dyn Any> = engine.clone();
    let trampoline = builder.build(descriptor, address, table)?.with_owner(owner);
    Ok(WrappedFunction::new(function.name.as_str(), trampoline))
}

/// Wraps every eligible function of `module` into `table`.
///
/// A function that cannot be wrapped is skipped and recorded in the report;
/// only a failure to set up the native backend aborts the run. Afterwards the
/// module and engine are bound under [`MODULE_KEY`] and [`ENGINE_KEY`].
pub fn wrap_module<M, E>(
    module: Rc<M>,
    engine: Rc<E>,
    table: &mut NameTable,
    options: &WrapOptions,
) -> Result<WrapReport, BindError>
where
    M: AsRef<IrModule> + 'static,
    E: ExecutionEngine + 'static,
{
    let mut builder = TrampolineBuilder::new()?;
    let ir: &IrModule = (*module).as_ref();
    let mut report = WrapReport::default();

    for function in ir.functions().iter().filter(|f| is_eligible(f, options)) {
        match wrap_function(function, ir, &engine, table, &mut builder) {
            Ok(wrapped) => {
                log::debug!("Wrapped {:?}", wrapped);
                table.set(function.name.as_str(), Binding::Function(Rc::new(wrapped)));
                report.wrapped.push(function.name.clone());
            }
            Err(reason) => {
                log::debug!("Couldn't wrap {}: {}", function.name, reason);
                if options.debug {
                    eprintln!("Couldn't wrap {}: {}", function.name, reason);
                }
                report.skipped.push(SkippedFunction {
                    name: function.name.clone(),
                    reason,
                });
            }
        }
    }

    log::info!("Module '{}': {}", ir.name, report);
    table.set(MODULE_KEY, Binding::Handle(module));
    table.set(ENGINE_KEY, Binding::Handle(engine));
    Ok(report)
}

/// Loads `bitcode`, creates an execution engine for it and wraps its functions into `table`.
pub fn build_wrappers<L>(
    loader: &L,
    bitcode: &[u8],
    table: &mut NameTable,
    options: &WrapOptions,
) -> Result<WrapReport, BindError>
where
    L: ModuleLoader,
    L::Module: 'static,
    L::Engine: 'static,
{
    let module = loader.load(bitcode)?;
    let engine = loader.create_engine(&module)?;
    wrap_module(Rc::new(module), Rc::new(engine), table, options)
}

//! Host driver
//!
//! Composes the allocator, the diagnostics bridges, and the memory view
//! into one guest run: build import namespaces, instantiate, invoke the
//! entry point, and report the first uncaught fault.

use std::fs;

use tracing::{debug, error, info};
use wasmtime::{Engine, Linker, Module, ResourceLimiter, Store};

use crate::alloc::BlockAllocator;
use crate::diagnostics::{DebugBridge, PanicBridge};
use crate::imports::{AllocImports, DebugImports, ImportProvider, PanicImports};
use crate::memory::MemoryView;
use crate::types::{ResourceLimits, RunConfig, RuntimeError, RuntimeResult};

/// Store-level resource limiter for one guest run.
#[derive(Debug)]
pub struct StoreLimits {
    max_memory_bytes: u64,
    max_table_elements: u32,
}

impl StoreLimits {
    fn new(limits: &ResourceLimits) -> Self {
        Self {
            max_memory_bytes: limits.max_memory_bytes(),
            max_table_elements: limits.max_table_elements,
        }
    }
}

impl ResourceLimiter for StoreLimits {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        let max = maximum.unwrap_or(self.max_memory_bytes as usize);
        Ok(desired <= max && desired <= self.max_memory_bytes as usize)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        let max = maximum.unwrap_or(self.max_table_elements as usize);
        Ok(desired <= max && desired <= self.max_table_elements as usize)
    }
}

/// State owned by the store for exactly one guest run.
///
/// The block list, both diagnostics accumulators, and the memory view live
/// and die together with the run; nothing persists into the next run.
pub struct RunState {
    pub(crate) allocator: BlockAllocator,
    pub(crate) panic: PanicBridge,
    pub(crate) debug: DebugBridge,
    view: Option<MemoryView>,
    limits: StoreLimits,
}

impl RunState {
    fn new(limits: &ResourceLimits) -> Self {
        Self {
            allocator: BlockAllocator::new(),
            panic: PanicBridge::new(),
            debug: DebugBridge::new(),
            view: None,
            limits: StoreLimits::new(limits),
        }
    }

    /// The memory view, available once instantiation has resolved the
    /// guest's exports. A boundary call that needs memory before then can
    /// only be a start-function call against an incomplete contract.
    pub(crate) fn view(&self) -> RuntimeResult<MemoryView> {
        self.view.ok_or_else(|| {
            RuntimeError::Fatal("guest memory is not available yet".to_string())
        })
    }
}

/// Drives one sandboxed guest run from artifact to completion or fault.
pub struct HostDriver {
    engine: Engine,
    config: RunConfig,
}

impl HostDriver {
    pub fn new(config: RunConfig) -> Self {
        Self {
            engine: Engine::default(),
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Load the configured module artifact and run it.
    pub fn run(&self) -> RuntimeResult<()> {
        self.report(|| {
            let bytes = fs::read(&self.config.module)?;
            self.execute(&bytes)
        })
    }

    /// Run a guest supplied as raw module bytes (binary or text format).
    pub fn run_bytes(&self, bytes: &[u8]) -> RuntimeResult<()> {
        self.report(|| self.execute(bytes))
    }

    /// Catch any fault of the run (a raised guest panic, an allocator
    /// contract violation, a wasm trap, a load failure) exactly once,
    /// report it to the log sink, and return it. There is no retry.
    fn report(&self, run: impl FnOnce() -> RuntimeResult<()>) -> RuntimeResult<()> {
        match run() {
            Ok(()) => {
                info!("guest run completed");
                Ok(())
            }
            Err(fault) => {
                match &fault {
                    RuntimeError::GuestPanic {
                        message,
                        file,
                        line,
                        column,
                    } => error!(%file, line, column, "guest panicked: {message}"),
                    other => error!("guest run failed: {other}"),
                }
                Err(fault)
            }
        }
    }

    fn execute(&self, bytes: &[u8]) -> RuntimeResult<()> {
        let module = Module::new(&self.engine, bytes)
            .map_err(|e| RuntimeError::Compilation(e.to_string()))?;

        let mut store = Store::new(&self.engine, RunState::new(&self.config.limits));
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<RunState> = Linker::new(&self.engine);
        AllocImports::register(&mut linker)?;
        DebugImports::register(&mut linker)?;
        PanicImports::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| RuntimeError::Instantiation(e.to_string()))?;

        let view = MemoryView::from_instance(&mut store, &instance)?;
        store.data_mut().view = Some(view);

        let entry = instance
            .get_typed_func::<(), ()>(&mut store, &self.config.entry)
            .map_err(|_| {
                RuntimeError::Fatal(format!(
                    "guest does not export entry point `{}`",
                    self.config.entry
                ))
            })?;

        debug!(entry = %self.config.entry, "invoking guest entry point");
        entry.call(&mut store, ()).map_err(demote)
    }
}

/// Recover the host fault carried by a trap, if the trap originated from
/// one; anything else is a plain wasm-level trap.
fn demote(trap: wasmtime::Error) -> RuntimeError {
    match trap.downcast::<RuntimeError>() {
        Ok(fault) => fault,
        Err(trap) => RuntimeError::Trap(trap.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> HostDriver {
        HostDriver::new(RunConfig::default())
    }

    #[test]
    fn test_invalid_module_bytes_fail_compilation() {
        let err = driver().run_bytes(b"not a module").unwrap_err();
        assert!(matches!(err, RuntimeError::Compilation(_)));
    }

    #[test]
    fn test_unknown_import_fails_instantiation() {
        let err = driver()
            .run_bytes(
                br#"
                (module
                    (import "alloc" "gimme" (func (result i32)))
                    (memory (export "memory") 1)
                    (func (export "run")))
                "#,
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Instantiation(_)));
    }

    #[test]
    fn test_missing_memory_export_is_fatal() {
        let err = driver()
            .run_bytes(br#"(module (func (export "run")))"#)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Fatal(_)));
    }

    #[test]
    fn test_missing_entry_point_is_fatal() {
        let err = driver()
            .run_bytes(br#"(module (memory (export "memory") 1))"#)
            .unwrap_err();
        let RuntimeError::Fatal(message) = err else {
            panic!("expected a fatal fault");
        };
        assert!(message.contains("entry point"));
    }

    #[test]
    fn test_plain_wasm_trap_is_reported_as_trap() {
        let err = driver()
            .run_bytes(
                br#"
                (module
                    (memory (export "memory") 1)
                    (func (export "run") unreachable))
                "#,
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Trap(_)));
    }

    #[test]
    fn test_entry_point_name_is_configurable() {
        let driver = HostDriver::new(RunConfig::default().with_entry("start"));
        driver
            .run_bytes(
                br#"
                (module
                    (memory (export "memory") 1)
                    (func (export "start")))
                "#,
            )
            .unwrap();
    }
}

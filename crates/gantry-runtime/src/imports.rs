//! Guest import namespaces
//!
//! Each provider declares one import namespace and binds its boundary
//! functions to the run state carried in the store. The set is fixed at
//! compile time; registration is a convenience for instantiation, not an
//! access-control boundary: every registered function is guest-callable.

use tracing::trace;
use wasmtime::{Caller, Linker};

use crate::driver::RunState;
use crate::types::{RuntimeError, RuntimeResult};

/// A component whose methods back one guest import namespace.
pub trait ImportProvider {
    /// Import namespace the guest links against.
    const NAMESPACE: &'static str;

    /// Register every function of the namespace on the linker.
    fn register(linker: &mut Linker<RunState>) -> RuntimeResult<()>;
}

fn link_err(err: wasmtime::Error) -> RuntimeError {
    RuntimeError::Internal(err.to_string())
}

/// The external allocator namespace: `alloc`, `dealloc`, `realloc`.
pub struct AllocImports;

impl ImportProvider for AllocImports {
    const NAMESPACE: &'static str = "alloc";

    fn register(linker: &mut Linker<RunState>) -> RuntimeResult<()> {
        linker
            .func_wrap(
                Self::NAMESPACE,
                "alloc",
                |mut caller: Caller<'_, RunState>, size: u32, align: u32| -> wasmtime::Result<u32> {
                    let address = caller.data_mut().allocator.alloc(size, align)?;
                    trace!(size, align, address, "guest alloc");
                    Ok(address)
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "dealloc",
                |mut caller: Caller<'_, RunState>,
                 address: u32,
                 size: u32,
                 align: u32|
                 -> wasmtime::Result<()> {
                    caller.data_mut().allocator.dealloc(address, size, align)?;
                    trace!(address, size, "guest dealloc");
                    Ok(())
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "realloc",
                |mut caller: Caller<'_, RunState>,
                 address: u32,
                 size: u32,
                 align: u32,
                 new_size: u32|
                 -> wasmtime::Result<u32> {
                    let memory = caller.data().view()?.memory();
                    let (data, state) = memory.data_and_store_mut(&mut caller);
                    let new_address =
                        state.allocator.realloc(data, address, size, align, new_size)?;
                    trace!(address, size, new_size, new_address, "guest realloc");
                    Ok(new_address)
                },
            )
            .map_err(link_err)?;

        Ok(())
    }
}

/// The debug log namespace: `dblog_ch`, `dblog_str`, `dblog_flush`.
pub struct DebugImports;

impl ImportProvider for DebugImports {
    const NAMESPACE: &'static str = "debug";

    fn register(linker: &mut Linker<RunState>) -> RuntimeResult<()> {
        linker
            .func_wrap(
                Self::NAMESPACE,
                "dblog_ch",
                |mut caller: Caller<'_, RunState>, codepoint: u32| {
                    caller.data_mut().debug.push_char(codepoint);
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "dblog_str",
                |mut caller: Caller<'_, RunState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                    let text = caller.data().view()?.decode_utf8(&caller, ptr, len);
                    caller.data_mut().debug.push_str(&text);
                    Ok(())
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "dblog_flush",
                |mut caller: Caller<'_, RunState>| {
                    caller.data_mut().debug.flush();
                },
            )
            .map_err(link_err)?;

        Ok(())
    }
}

/// The panic namespace: message/file/position fragments plus the terminal
/// `panic` call, which raises the assembled fault and never returns
/// normally to the guest.
pub struct PanicImports;

impl ImportProvider for PanicImports {
    const NAMESPACE: &'static str = "panic";

    fn register(linker: &mut Linker<RunState>) -> RuntimeResult<()> {
        linker
            .func_wrap(
                Self::NAMESPACE,
                "panic_ch",
                |mut caller: Caller<'_, RunState>, codepoint: u32| {
                    caller.data_mut().panic.push_char(codepoint);
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "panic_str",
                |mut caller: Caller<'_, RunState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                    let text = caller.data().view()?.decode_utf8(&caller, ptr, len);
                    caller.data_mut().panic.push_str(&text);
                    Ok(())
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "panic_put_file",
                |mut caller: Caller<'_, RunState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                    let text = caller.data().view()?.decode_utf8(&caller, ptr, len);
                    caller.data_mut().panic.set_file(&text);
                    Ok(())
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "panic_put_line_column",
                |mut caller: Caller<'_, RunState>, line: u32, column: u32| {
                    caller.data_mut().panic.set_location(line, column);
                },
            )
            .map_err(link_err)?;

        linker
            .func_wrap(
                Self::NAMESPACE,
                "panic",
                |caller: Caller<'_, RunState>| -> wasmtime::Result<()> {
                    Err(caller.data().panic.raise().into())
                },
            )
            .map_err(link_err)?;

        Ok(())
    }
}

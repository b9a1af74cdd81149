//! Gantry guest runtime
//!
//! Host-side runtime for sandboxed WebAssembly guests that bring no heap
//! manager of their own. The host services three import namespaces over a
//! synchronous boundary:
//! - `alloc`: an external block-list allocator tracking and reusing
//!   address ranges inside the guest's linear memory
//! - `debug`: a log bridge assembling text fragments into flushed lines
//! - `panic`: a diagnostics bridge assembling fatal guest panics
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      Host (gantry)                        │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │                    HostDriver                       │  │
//! │  │   ┌──────────┐   ┌──────────┐   ┌───────────────┐   │  │
//! │  │   │  Engine  │   │  Linker  │   │ Store<RunState>│  │  │
//! │  │   └──────────┘   └──────────┘   └───────────────┘   │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! │           │ alloc            │ debug           │ panic    │
//! │  ┌────────────────┐ ┌────────────────┐ ┌───────────────┐  │
//! │  │ BlockAllocator │ │  DebugBridge   │ │  PanicBridge  │  │
//! │  └────────────────┘ └────────────────┘ └───────────────┘  │
//! │                          │ MemoryView                     │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │              Guest instance (wasmtime)              │  │
//! │  │    memory · __indirect_function_table · entry       │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Host and guest share one cooperative thread; every boundary call blocks
//! its caller until the callee returns or faults. All faults are fatal to
//! the run: the driver reports the first one and the run ends.

mod alloc;
mod diagnostics;
mod driver;
mod imports;
mod memory;
mod types;

pub use alloc::{Block, BlockAllocator};
pub use diagnostics::{DebugBridge, PanicBridge};
pub use driver::{HostDriver, RunState, StoreLimits};
pub use imports::{AllocImports, DebugImports, ImportProvider, PanicImports};
pub use memory::{FUNCTION_TABLE_EXPORT, MEMORY_EXPORT, MemoryView};
pub use types::{ResourceLimits, RunConfig, RuntimeError, RuntimeResult};

//! Core runtime types
//!
//! Fault taxonomy, resource limits, and per-run configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Faults raised by the host runtime.
///
/// Every kind is fatal to the current guest run. Contract violations are
/// raised synchronously at the call that detects them and propagate through
/// the guest call stack as host traps; the guest cannot intercept them.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no allocated block at {address:#x} (size {size}, align {align})")]
    FreeUnallocated { address: u32, size: u32, align: u32 },

    #[error("block at {address:#x} is already free")]
    FreeAgain { address: u32 },

    #[error(
        "freeing block at {address:#x} with size {given} (align {align}), but its tracked size is {tracked}"
    )]
    FreeMismatchedSize {
        address: u32,
        given: u32,
        tracked: u32,
        align: u32,
    },

    #[error("no allocated block at {address:#x} to reallocate")]
    ReallocUnallocated { address: u32 },

    #[error("reallocating block at {address:#x}, but it is already free")]
    ReallocFreed { address: u32 },

    #[error("block size mismatch at {address:#x}: given {given}, tracked {tracked}")]
    BlockSizeMismatch { address: u32, given: u32, tracked: u32 },

    /// Missing required guest export, invalid host configuration, or an
    /// invalid indirect function id. Unrecoverable by definition.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A panic assembled and raised by the guest itself.
    #[error("guest panicked at {file}:{line}:{column}: {message}")]
    GuestPanic {
        message: String,
        file: String,
        line: u32,
        column: u32,
    },

    #[error("memory access out of bounds: offset={offset}, size={size}")]
    OutOfBounds { offset: u32, size: u32 },

    #[error("failed to compile guest module: {0}")]
    Compilation(String),

    #[error("failed to instantiate guest module: {0}")]
    Instantiation(String),

    /// A wasm-level trap that did not originate from a host fault.
    #[error("guest trapped: {0}")]
    Trap(String),

    #[error("internal runtime error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime result type
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Resource limits applied to a guest store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum linear memory pages (64KB each)
    pub max_memory_pages: u32,
    /// Maximum indirect function table elements
    pub max_table_elements: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16MB
            max_table_elements: 10_000,
        }
    }
}

impl ResourceLimits {
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_pages as u64 * 65536
    }
}

/// Configuration for one guest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Path to the guest module artifact
    pub module: PathBuf,
    /// Name of the guest's no-argument entry point export
    pub entry: String,
    /// Resource limits for the run's store
    pub limits: ResourceLimits,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            module: PathBuf::from("guest.wasm"),
            entry: "run".to_string(),
            limits: ResourceLimits::default(),
        }
    }
}

impl RunConfig {
    pub fn new(module: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, entry: &str) -> Self {
        self.entry = entry.to_string();
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

//! Boundary memory access
//!
//! Typed accessors over the guest's live linear memory, UTF-8 transcoding,
//! and indirect function-table resolution.

use wasmtime::{AsContext, AsContextMut, Func, Instance, Memory, Ref, StoreContext, StoreContextMut, Table};

use crate::types::{RuntimeError, RuntimeResult};

/// Name of the guest's required linear memory export.
pub const MEMORY_EXPORT: &str = "memory";

/// Name of the guest's optional indirect function table export.
pub const FUNCTION_TABLE_EXPORT: &str = "__indirect_function_table";

/// View over the guest's exported memory and function table.
///
/// Holds only the store-level handles. The raw buffer is re-derived from the
/// handle on every access and must never be cached across a boundary call:
/// guest-initiated memory growth invalidates previously obtained slices.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView {
    memory: Memory,
    table: Option<Table>,
}

impl MemoryView {
    /// Resolve the view from a freshly instantiated guest.
    ///
    /// Fails fatally when the guest did not export a `memory`. The indirect
    /// function table is optional and only required for callback dispatch.
    pub fn from_instance(
        mut ctx: impl AsContextMut,
        instance: &Instance,
    ) -> RuntimeResult<Self> {
        let memory = instance
            .get_memory(&mut ctx, MEMORY_EXPORT)
            .ok_or_else(|| {
                RuntimeError::Fatal(format!("guest did not export `{MEMORY_EXPORT}`"))
            })?;
        let table = instance.get_table(&mut ctx, FUNCTION_TABLE_EXPORT);
        Ok(Self { memory, table })
    }

    /// The underlying memory handle.
    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Current memory size in bytes.
    pub fn size(&self, ctx: impl AsContext) -> usize {
        self.memory.data_size(ctx)
    }

    pub fn read_u8(&self, ctx: impl AsContext, offset: u32) -> RuntimeResult<u8> {
        let mut buf = [0u8; 1];
        self.read_into(ctx, offset, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_u8(&self, ctx: impl AsContextMut, offset: u32, value: u8) -> RuntimeResult<()> {
        self.write_from(ctx, offset, &[value])
    }

    pub fn read_i32(&self, ctx: impl AsContext, offset: u32) -> RuntimeResult<i32> {
        let mut buf = [0u8; 4];
        self.read_into(ctx, offset, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn write_i32(
        &self,
        ctx: impl AsContextMut,
        offset: u32,
        value: i32,
    ) -> RuntimeResult<()> {
        self.write_from(ctx, offset, &value.to_le_bytes())
    }

    pub fn read_u32(&self, ctx: impl AsContext, offset: u32) -> RuntimeResult<u32> {
        let mut buf = [0u8; 4];
        self.read_into(ctx, offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn write_u32(
        &self,
        ctx: impl AsContextMut,
        offset: u32,
        value: u32,
    ) -> RuntimeResult<()> {
        self.write_from(ctx, offset, &value.to_le_bytes())
    }

    pub fn read_f32(&self, ctx: impl AsContext, offset: u32) -> RuntimeResult<f32> {
        let mut buf = [0u8; 4];
        self.read_into(ctx, offset, &mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    pub fn write_f32(
        &self,
        ctx: impl AsContextMut,
        offset: u32,
        value: f32,
    ) -> RuntimeResult<()> {
        self.write_from(ctx, offset, &value.to_le_bytes())
    }

    /// Zero-copy view of a byte span.
    pub fn bytes<'a, T: 'a + 'static>(
        &self,
        ctx: impl Into<StoreContext<'a, T>>,
        offset: u32,
        len: u32,
    ) -> RuntimeResult<&'a [u8]> {
        let data = self.memory.data(ctx);
        let range = checked_span(data.len(), offset, len as usize)?;
        Ok(&data[range])
    }

    /// Zero-copy mutable view of a byte span; writes through it are visible
    /// to the guest immediately.
    pub fn bytes_mut<'a, T: 'a + 'static>(
        &self,
        ctx: impl Into<StoreContextMut<'a, T>>,
        offset: u32,
        len: u32,
    ) -> RuntimeResult<&'a mut [u8]> {
        let data = self.memory.data_mut(ctx);
        let range = checked_span(data.len(), offset, len as usize)?;
        Ok(&mut data[range])
    }

    /// Decode a guest byte span as text, substituting U+FFFD for malformed
    /// sequences. Diagnostic text is not program-critical, so the span is
    /// clamped to the buffer and decoding never fails.
    pub fn decode_utf8(&self, ctx: impl AsContext, ptr: u32, len: u32) -> String {
        let data = self.memory.data(&ctx);
        let start = (ptr as usize).min(data.len());
        let end = start.saturating_add(len as usize).min(data.len());
        String::from_utf8_lossy(&data[start..end]).into_owned()
    }

    /// Encode text into a guest byte span of `cap` bytes.
    ///
    /// Returns how many characters were consumed and how many bytes were
    /// written. Truncates at a character boundary instead of overflowing
    /// when the capacity is insufficient.
    pub fn encode_utf8(
        &self,
        mut ctx: impl AsContextMut,
        ptr: u32,
        cap: u32,
        text: &str,
    ) -> (usize, usize) {
        let data = self.memory.data_mut(&mut ctx);
        let start = (ptr as usize).min(data.len());
        let end = start.saturating_add(cap as usize).min(data.len());
        let dst = &mut data[start..end];

        let mut read = 0;
        let mut written = 0;
        for ch in text.chars() {
            let n = ch.len_utf8();
            if written + n > dst.len() {
                break;
            }
            ch.encode_utf8(&mut dst[written..written + n]);
            read += 1;
            written += n;
        }
        (read, written)
    }

    /// Resolve an entry of the guest's exported indirect function table,
    /// for host-initiated dispatch into guest-defined function pointers.
    pub fn get_function(&self, mut ctx: impl AsContextMut, func_id: u32) -> RuntimeResult<Func> {
        let table = self.table.ok_or_else(|| {
            RuntimeError::Fatal(format!("guest did not export `{FUNCTION_TABLE_EXPORT}`"))
        })?;
        match table.get(&mut ctx, u64::from(func_id)) {
            Some(Ref::Func(Some(func))) => Ok(func),
            _ => Err(RuntimeError::Fatal(format!(
                "no guest function at table index {func_id}"
            ))),
        }
    }

    fn read_into(&self, ctx: impl AsContext, offset: u32, buf: &mut [u8]) -> RuntimeResult<()> {
        let data = self.memory.data(&ctx);
        let range = checked_span(data.len(), offset, buf.len())?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write_from(
        &self,
        mut ctx: impl AsContextMut,
        offset: u32,
        bytes: &[u8],
    ) -> RuntimeResult<()> {
        let data = self.memory.data_mut(&mut ctx);
        let range = checked_span(data.len(), offset, bytes.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }
}

fn checked_span(
    buffer_len: usize,
    offset: u32,
    len: usize,
) -> RuntimeResult<std::ops::Range<usize>> {
    let start = offset as usize;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= buffer_len)
        .ok_or(RuntimeError::OutOfBounds {
            offset,
            size: len as u32,
        })?;
    Ok(start..end)
}

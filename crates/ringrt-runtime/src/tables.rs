//! Fixed-fd and fixed-buffer registration tables.
//!
//! Grounded on the teacher's `ksvc-module::fixed_pool::FixedPool`: there it
//! tracks a fixed set of worker-thread slots; here the same "fixed-size
//! pool of slots, `Some`/`None` per slot" discipline tracks which registered
//! fd/buffer indices are live versus sparse (unregistered). `io_uring`
//! itself tracks the *kernel*-side table; this struct just mirrors which
//! slots this process has actually filled, so `update`/`fixed` can fail
//! fast on an unregistered index instead of racing the kernel's own
//! `-EBADF`.

use std::os::unix::io::RawFd;

use ringrt_core::error::{RuntimeError, RuntimeResult};

use crate::ring::RingBridge;

/// A typed reference to a file descriptor: either a raw fd or a fixed slot
/// index registered with the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRef {
    Raw(RawFd),
    Fixed(u32),
}

/// A typed reference to a registered buffer slot, paired with the memory
/// it designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSlot {
    pub index: u32,
}

/// Fixed-size table of kernel file descriptors pre-registered with the
/// ring.
pub struct FdTable {
    slots: Vec<Option<RawFd>>,
}

impl FdTable {
    /// Register `n` sparse slots with the ring (all initially empty, i.e.
    /// `-1`, per `IORING_REGISTER_FILES` convention).
    pub fn init(ring: &RingBridge, n: usize) -> RuntimeResult<Self> {
        let placeholders = vec![-1i32; n];
        ring.register_files(&placeholders)
            .map_err(|source| RuntimeError::RegisterFailed {
                what: "files",
                source,
            })?;
        Ok(FdTable {
            slots: vec![None; n],
        })
    }

    /// Fill or replace `count` slots starting at `offset`.
    pub fn update(&mut self, ring: &RingBridge, offset: u32, fds: &[RawFd]) -> RuntimeResult<()> {
        ring.update_registered_files(offset, fds)
            .map_err(|source| RuntimeError::RegisterFailed {
                what: "files",
                source,
            })?;
        for (i, fd) in fds.iter().enumerate() {
            let slot = offset as usize + i;
            self.slots[slot] = Some(*fd);
        }
        Ok(())
    }

    /// A typed handle to a registered slot, for use by the I/O awaitables.
    ///
    /// Per the table's failure contract, this does not itself validate that
    /// the slot is live — an operation against an empty slot surfaces the
    /// kernel's `-EBADF` unchanged.
    pub fn fixed(&self, index: u32) -> FileRef {
        FileRef::Fixed(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Fixed-size table of iovecs registered with the ring.
pub struct BufferTable {
    slots: Vec<Option<(*mut u8, usize)>>,
}

impl BufferTable {
    /// Register the given buffers as a fixed iovec table.
    pub fn init(ring: &RingBridge, buffers: &[&mut [u8]]) -> RuntimeResult<Self> {
        let iovecs: Vec<libc::iovec> = buffers
            .iter()
            .map(|b| libc::iovec {
                iov_base: b.as_ptr() as *mut libc::c_void,
                iov_len: b.len(),
            })
            .collect();
        ring.register_buffers(&iovecs)
            .map_err(|source| RuntimeError::RegisterFailed {
                what: "buffers",
                source,
            })?;
        let slots = buffers
            .iter()
            .map(|b| Some((b.as_ptr() as *mut u8, b.len())))
            .collect();
        Ok(BufferTable { slots })
    }

    /// A typed handle to a registered buffer slot.
    pub fn fixed(&self, index: u32) -> BufferSlot {
        BufferSlot { index }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ref_variants() {
        assert_eq!(FileRef::Raw(3), FileRef::Raw(3));
        assert_ne!(FileRef::Raw(3), FileRef::Fixed(3));
    }
}

// Buffer Memory Manager
use std::alloc::{self, Layout};

use clap::ValueEnum;
use memmap2::{MmapMut, MmapOptions};
use serde::Deserialize;

use crate::error::{CombineError, Result};

const ELEMENT_SIZE: usize = std::mem::size_of::<f64>();

/// Number of buffers a single run holds at once (A, B and C).
pub const BUFFERS_PER_RUN: u64 = 3;

/// Where buffer storage comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Backing {
    /// Global allocator.
    #[default]
    Heap,
    /// Anonymous private mapping, zero-filled by the OS on first touch.
    Mapped,
}

enum Storage {
    Heap(Vec<f64>),
    Mapped(MmapMut),
}

/// A fixed-length run of `f64` owned by exactly one run.
/// Resources are tied to this struct's lifetime.
pub struct Buffer {
    storage: Storage,
    len: usize,
}

impl Buffer {
    /// Allocates `len` zeroed elements. Never hands back a shorter buffer.
    pub fn allocate(len: usize, backing: Backing) -> Result<Self> {
        let bytes = byte_size(len)?;
        let storage = match backing {
            // Zero-length mappings are rejected by mmap
            _ if len == 0 => Storage::Heap(Vec::new()),
            Backing::Heap => Storage::Heap(zeroed_vec(len, bytes)?),
            Backing::Mapped => {
                let mapping = MmapOptions::new()
                    .len(bytes)
                    .map_anon()
                    .map_err(|e| allocation_error(len, bytes, e))?;
                advise_sequential(&mapping);
                Storage::Mapped(mapping)
            }
        };
        log::debug!("Allocated {:?} buffer: {} elements ({} bytes)", backing, len, bytes);
        Ok(Self { storage, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn backing(&self) -> Backing {
        match self.storage {
            Storage::Heap(_) => Backing::Heap,
            Storage::Mapped(_) => Backing::Mapped,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match &self.storage {
            Storage::Heap(data) => data.as_slice(),
            // Safety: the mapping is page aligned, exactly `len * 8` bytes long and
            // every bit pattern is a valid f64.
            Storage::Mapped(mapping) => unsafe {
                std::slice::from_raw_parts(mapping.as_ptr() as *const f64, self.len)
            },
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        match &mut self.storage {
            Storage::Heap(data) => data.as_mut_slice(),
            // Safety: see `as_slice`; `&mut self` guarantees exclusive access.
            Storage::Mapped(mapping) => unsafe {
                std::slice::from_raw_parts_mut(mapping.as_mut_ptr() as *mut f64, self.len)
            },
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.as_slice().to_vec()
    }
}

/// Bytes needed for one buffer of `elements` values.
pub fn byte_size(elements: usize) -> Result<usize> {
    elements
        .checked_mul(ELEMENT_SIZE)
        .ok_or(CombineError::SizeOverflow { elements })
}

/// Bytes a whole run needs for its three buffers.
pub fn run_footprint(elements: usize) -> Result<u64> {
    (byte_size(elements)? as u64)
        .checked_mul(BUFFERS_PER_RUN)
        .ok_or(CombineError::SizeOverflow { elements })
}

/// Fails before any allocation if the request exceeds memory the kernel can
/// hand out right now. On platforms where memory cannot be queried the check
/// always passes.
pub fn ensure_fits(requested: u64) -> Result<()> {
    match available_memory() {
        Some(available) if requested > available => {
            Err(CombineError::InsufficientMemory {
                requested,
                available,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(target_os = "linux")]
fn sysinfo() -> Option<libc::sysinfo> {
    // Safety: sysinfo only writes into the struct we hand it.
    let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
    if unsafe { libc::sysinfo(&mut info) } != 0 {
        return None;
    }
    Some(info)
}

/// Free RAM plus reclaimable buffers plus free swap, in bytes.
///
/// Total RAM is not used: under overcommit a request between free and total
/// memory would pass both this check and the allocator, then die to the OOM
/// killer on first touch.
#[cfg(target_os = "linux")]
pub fn available_memory() -> Option<u64> {
    let info = sysinfo()?;
    let unit = u64::from(info.mem_unit.max(1));
    let free = (info.freeram as u64)
        .saturating_add(info.bufferram as u64)
        .saturating_add(info.freeswap as u64);
    Some(free.saturating_mul(unit))
}

#[cfg(not(target_os = "linux"))]
pub fn available_memory() -> Option<u64> {
    None
}

/// Zeroed heap storage that reports failure instead of aborting.
///
/// Goes through `alloc_zeroed` so large requests get fresh zero pages from the
/// OS rather than being written element by element.
fn zeroed_vec(len: usize, bytes: usize) -> Result<Vec<f64>> {
    let layout = Layout::array::<f64>(len).map_err(|e| allocation_error(len, bytes, e))?;
    // Safety: `len > 0`, so the layout has a non-zero size.
    let ptr = unsafe { alloc::alloc_zeroed(layout) } as *mut f64;
    if ptr.is_null() {
        return Err(allocation_error(len, bytes, "out of memory"));
    }
    // Safety: `ptr` came from the global allocator with the layout of `[f64; len]`,
    // and all-zero bytes are a valid `0.0` for every element.
    Ok(unsafe { Vec::from_raw_parts(ptr, len, len) })
}

fn allocation_error(elements: usize, bytes: usize, reason: impl std::fmt::Display) -> CombineError {
    CombineError::Allocation {
        elements,
        bytes,
        reason: reason.to_string(),
    }
}

/// Advice OS: buffers are streamed front to back
#[cfg(unix)]
fn advise_sequential(mapping: &MmapMut) {
    let rc = unsafe {
        libc::madvise(
            mapping.as_ptr() as *mut _,
            mapping.len(),
            libc::MADV_SEQUENTIAL,
        )
    };
    if rc != 0 {
        log::debug!("madvise(MADV_SEQUENTIAL) failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn advise_sequential(_mapping: &MmapMut) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_buffer_is_zeroed() {
        let buf = Buffer::allocate(1000, Backing::Heap).unwrap();
        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.backing(), Backing::Heap);
        assert!(buf.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn mapped_buffer_is_zeroed_and_writable() {
        let mut buf = Buffer::allocate(10_000, Backing::Mapped).unwrap();
        assert_eq!(buf.backing(), Backing::Mapped);
        assert!(buf.as_slice().iter().all(|&v| v == 0.0));
        buf.as_mut_slice()[9_999] = 4.5;
        assert_eq!(buf.as_slice()[9_999], 4.5);
    }

    #[test]
    fn empty_buffer_needs_no_mapping() {
        let buf = Buffer::allocate(0, Backing::Mapped).unwrap();
        assert!(buf.is_empty());
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn oversized_heap_request_is_an_allocation_error() {
        let elements = usize::MAX / ELEMENT_SIZE;
        match Buffer::allocate(elements, Backing::Heap) {
            Err(CombineError::Allocation {
                elements: e,
                bytes,
                ..
            }) => {
                assert_eq!(e, elements);
                assert_eq!(bytes, elements * ELEMENT_SIZE);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("allocation unexpectedly succeeded"),
        }
    }

    #[test]
    fn byte_size_overflow_is_detected() {
        assert!(matches!(
            byte_size(usize::MAX),
            Err(CombineError::SizeOverflow { .. })
        ));
        assert_eq!(byte_size(3).unwrap(), 24);
        assert_eq!(run_footprint(50_000_000).unwrap(), 1_200_000_000);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn absurd_footprint_does_not_fit() {
        assert!(available_memory().is_some());
        assert!(matches!(
            ensure_fits(u64::MAX),
            Err(CombineError::InsufficientMemory { .. })
        ));
        assert!(ensure_fits(0).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn precheck_uses_free_not_total_memory() {
        let info = sysinfo().unwrap();
        let unit = u64::from(info.mem_unit.max(1));
        let total = (info.totalram as u64 + info.totalswap as u64) * unit;
        let available = available_memory().unwrap();
        assert!(available <= total);

        // Just past what is free, even if it is well under the installed total.
        match ensure_fits(available + 1) {
            Err(CombineError::InsufficientMemory {
                requested,
                available: reported,
            }) => {
                assert_eq!(requested, available + 1);
                assert!(reported <= total);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn large_heap_buffer_reads_as_zero() {
        let buf = Buffer::allocate(1 << 20, Backing::Heap).unwrap();
        assert_eq!(buf.len(), 1 << 20);
        assert_eq!(buf.as_slice()[0], 0.0);
        assert_eq!(buf.as_slice()[(1 << 20) - 1], 0.0);
    }
}

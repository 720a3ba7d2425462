//! The heap layer: the low-level collaborator the core allocator extends
//! into, abstracted behind [`RawHeap`] so the core can be exercised without
//! sharing process-wide `sbrk` state.
//!
//! This only needs `extend`, `low` and `high`. [`SbrkHeap`] is the
//! production implementation, extending the process's data segment
//! directly; [`FixedCapacityHeap`] is a deterministic arena used by this
//! crate's own tests and suitable for embedding contexts that supply their
//! own backing storage.

use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};

/// The low-level heap extender: hands out additional raw bytes at the high
/// end of a region and reports the region's current bounds.
pub trait RawHeap {
  /// Extends the high end of the heap by exactly `n` bytes, returning the
  /// starting address of the new region, or `None` if the heap refuses to
  /// grow (out of memory).
  fn extend(&mut self, n: usize) -> Option<NonNull<u8>>;

  /// The heap's low address.
  fn low(&self) -> NonNull<u8>;

  /// The heap's current high address (one past the last byte handed out).
  fn high(&self) -> NonNull<u8>;
}

/// Extends the process's data segment via `sbrk(2)`.
///
/// `low` is captured once at construction; `high` is tracked locally and
/// advanced on every successful `extend`, so a query never has to go back
/// to the kernel (and never has anything to return null for).
pub struct SbrkHeap {
  low: NonNull<u8>,
  high: NonNull<u8>,
}

impl SbrkHeap {
  /// Captures the current program break as the heap's low address.
  /// Returns `None` if `sbrk(0)` fails.
  pub fn new() -> Option<Self> {
    let brk = unsafe { sbrk(0) };
    let low = NonNull::new(brk.cast())?;
    Some(SbrkHeap { low, high: low })
  }
}

impl RawHeap for SbrkHeap {
  fn extend(&mut self, n: usize) -> Option<NonNull<u8>> {
    let raw = unsafe { sbrk(n as intptr_t) };
    if raw == usize::MAX as *mut c_void {
      return None;
    }
    let start = NonNull::new(raw.cast())?;
    let new_high = unsafe { start.as_ptr().add(n) };
    self.high = NonNull::new(new_high)?;
    Some(start)
  }

  fn low(&self) -> NonNull<u8> {
    self.low
  }

  fn high(&self) -> NonNull<u8> {
    self.high
  }
}

/// A fixed-capacity arena: a single boxed byte buffer whose "program break"
/// is a cursor advancing from the buffer's start. `extend` returns `None`
/// once the cursor would run past the buffer's end, this crate's concrete
/// realization of "the heap extender refuses to grow".
///
/// The buffer is boxed once at construction and never moved or resized
/// afterwards, so addresses handed out by `extend` stay valid for the
/// arena's lifetime, matching `sbrk`'s own guarantee that existing bytes
/// never move.
pub struct FixedCapacityHeap {
  buf: Box<[u8]>,
  used: usize,
}

impl FixedCapacityHeap {
  pub fn new(capacity: usize) -> Self {
    FixedCapacityHeap {
      buf: vec![0u8; capacity].into_boxed_slice(),
      used: 0,
    }
  }

  fn base(&self) -> NonNull<u8> {
    NonNull::new(self.buf.as_ptr() as *mut u8).expect("boxed buffer is never null")
  }
}

impl RawHeap for FixedCapacityHeap {
  fn extend(&mut self, n: usize) -> Option<NonNull<u8>> {
    if n > self.buf.len() - self.used {
      return None;
    }
    let start = unsafe { self.base().as_ptr().add(self.used) };
    self.used += n;
    NonNull::new(start)
  }

  fn low(&self) -> NonNull<u8> {
    self.base()
  }

  fn high(&self) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(self.base().as_ptr().add(self.used)) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extend_advances_the_cursor_and_reports_bounds() {
    let mut heap = FixedCapacityHeap::new(64);
    let low = heap.low();
    assert_eq!(heap.high(), low);

    let a = heap.extend(16).unwrap();
    assert_eq!(a, low);
    assert_eq!(heap.high().as_ptr(), unsafe { low.as_ptr().add(16) });

    let b = heap.extend(8).unwrap();
    assert_eq!(b.as_ptr(), unsafe { low.as_ptr().add(16) });
  }

  #[test]
  fn extend_refuses_once_exhausted() {
    let mut heap = FixedCapacityHeap::new(16);
    assert!(heap.extend(16).is_some());
    assert!(heap.extend(1).is_none());
  }
}

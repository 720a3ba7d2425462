//! The segregated free-list allocator itself: `init`, `allocate`, `free`,
//! `reallocate`, `calloc`, and the debug-time heap checker.
//!
//! Everything else in this crate (`block`, `bin`, `freelist`, `heap`) is a
//! leaf collaborator; this module is where the first-fit placement policy
//! and boundary-tag coalescing actually live, over a generic [`RawHeap`].

use std::ptr;
use std::ptr::NonNull;

use crate::align::quantize_payload;
use crate::bin;
use crate::block::{Header, WORD_SIZE};
use crate::freelist::FreeLists;
use crate::heap::RawHeap;

/// A segregated-free-list allocator over a heap region supplied by `H`.
///
/// `Allocator` owns no memory of its own beyond its bookkeeping (the 15
/// free-list heads and the last-block pointer); the heap bytes live behind
/// `H`. Not `Send`/`Sync` by virtue of the raw pointers in `FreeLists` and
/// `last_block`; concurrent access is unsupported.
pub struct Allocator<H: RawHeap> {
  heap: H,
  free_lists: FreeLists,
  /// Header address of the highest block currently in the heap. `None`
  /// only before `init` has run.
  last_block: Option<NonNull<u8>>,
}

impl<H: RawHeap> Allocator<H> {
  /// Wraps a heap layer. `init` must still be called before any other
  /// operation.
  pub fn new(heap: H) -> Self {
    Allocator {
      heap,
      free_lists: FreeLists::new(),
      last_block: None,
    }
  }

  /// Places the 8-byte prologue at the heap's low address and resets all
  /// bookkeeping. Must be called once before any other operation; safe to
  /// call again to reset state on a heap that hasn't grown past its
  /// initial low address.
  pub fn init(&mut self) -> bool {
    self.free_lists.clear();
    self.last_block = None;

    let Some(prologue) = self.heap.extend(WORD_SIZE) else {
      return false;
    };
    if prologue != self.heap.low() {
      return false;
    }

    let header = Header::at(prologue);
    header.clear();
    header.set_alloc();
    self.last_block = Some(prologue);
    true
  }

  /// Requests `payload` more bytes at the high end of the heap and stamps
  /// a header for the new (already allocated) block. Returns `None` if
  /// the heap refuses to grow.
  fn extend_heap(&mut self, payload: usize) -> Option<Header> {
    let base = self.heap.extend(WORD_SIZE + payload)?;
    let header = Header::at(base);
    header.clear();
    header.set_size(payload);
    header.set_alloc();

    let prev_alloc = self
      .last_block
      .map(|h| Header::at(h).is_alloc())
      .unwrap_or(true);
    if prev_alloc {
      header.set_prev_alloc();
    } else {
      header.set_prev_free();
    }

    self.last_block = Some(base);
    Some(header)
  }

  #[inline]
  fn is_last(&self, header: Header) -> bool {
    self.last_block == Some(header.0)
  }

  #[inline]
  fn in_heap(&self, payload: NonNull<u8>) -> bool {
    let addr = payload.as_ptr() as usize;
    let lo = self.heap.low().as_ptr() as usize;
    let hi = self.heap.high().as_ptr() as usize;
    addr >= lo && addr < hi
  }

  /// Finds a free block with payload size `>= n`, splitting or extending
  /// the heap as needed, and returns its (now allocated) payload address.
  pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }
    let n = quantize_payload(size);

    let mut index = bin::index(n);
    let mut cursor = self.free_lists.head(index);
    let mut more_bins = true;

    loop {
      match cursor {
        None => {
          if !more_bins {
            break;
          }
          if index == bin::BIN_COUNT - 1 {
            more_bins = false;
          } else {
            index += 1;
            cursor = self.free_lists.head(index);
          }
        }
        Some(payload) => {
          let header = Header::from_payload(payload);
          let block_size = header.size();
          if n <= block_size {
            self.place(header, payload, index, n, block_size);
            return Some(payload);
          }
          if index <= 3 {
            index += 1;
            cursor = self.free_lists.head(index);
          } else {
            cursor = self.free_lists.next(payload);
          }
        }
      }
    }

    let header = self.extend_heap(n)?;
    Some(header.payload())
  }

  /// Commits to allocating `header` (found in `bin`, full size
  /// `block_size`) for a request normalized to `n` bytes, splitting off
  /// the remainder when it would be profitably large.
  fn place(&mut self, header: Header, payload: NonNull<u8>, found_bin: usize, n: usize, block_size: usize) {
    let remainder = block_size - n;
    if remainder >= WORD_SIZE + crate::block::MIN_PAYLOAD {
      let split_size = remainder - WORD_SIZE;
      header.set_size(n);

      let right = header.next_header();
      right.clear();
      right.set_size(split_size);
      right.set_prev_alloc();

      let footer = right.footer();
      footer.clear();
      footer.set_size(split_size);

      if self.is_last(header) {
        self.last_block = Some(right.0);
      }

      self.free_lists.insert(right.payload(), bin::index(split_size));
    } else if !self.is_last(header) {
      header.next_header().set_prev_alloc();
    }

    header.set_alloc();
    self.free_lists.remove(payload, found_bin);
  }

  /// Returns `payload`'s block to the heap, coalescing with either
  /// neighbor that is itself free. A no-op if `payload` is `None` or
  /// falls outside the heap.
  pub fn free(&mut self, payload: Option<NonNull<u8>>) {
    let Some(payload) = payload else { return };
    if !self.in_heap(payload) {
      return;
    }

    let header = Header::from_payload(payload);
    let size = header.size();
    let last = self.is_last(header);

    let right_free = !last && header.next_header().is_free();
    let left_free = header.is_prev_free();

    match (left_free, right_free) {
      (false, false) => {
        let footer = header.footer();
        footer.clear();
        footer.set_size(size);
        header.set_free();
        if !last {
          header.next_header().set_prev_free();
        }
        self.free_lists.insert(payload, bin::index(size));
      }
      (false, true) => {
        let right = header.next_header();
        let right_size = right.size();
        let was_last = self.is_last(right);

        self.free_lists.remove(right.payload(), bin::index(right_size));

        let new_size = size + right_size + WORD_SIZE;
        header.set_size(new_size);
        let footer = header.footer();
        footer.clear();
        footer.set_size(new_size);
        header.set_free();

        if was_last {
          self.last_block = Some(header.0);
        }

        self.free_lists.insert(payload, bin::index(new_size));
      }
      (true, false) => {
        let prev_footer = header.prev_footer();
        let left_size = prev_footer.size();
        let left = header.prev_header(left_size);
        let right = header.next_header();

        self.free_lists.remove(left.payload(), bin::index(left_size));

        let new_size = left_size + size + WORD_SIZE;
        left.set_size(new_size);
        let footer = left.footer();
        footer.clear();
        footer.set_size(new_size);

        if last {
          self.last_block = Some(left.0);
        } else {
          right.set_prev_free();
        }

        self.free_lists.insert(left.payload(), bin::index(new_size));
      }
      (true, true) => {
        let prev_footer = header.prev_footer();
        let left_size = prev_footer.size();
        let left = header.prev_header(left_size);
        let right = header.next_header();
        let right_size = right.size();
        let right_was_last = self.is_last(right);

        self.free_lists.remove(left.payload(), bin::index(left_size));
        self.free_lists.remove(right.payload(), bin::index(right_size));

        let new_size = left_size + size + right_size + 2 * WORD_SIZE;
        left.set_size(new_size);
        let footer = left.footer();
        footer.clear();
        footer.set_size(new_size);

        if right_was_last {
          self.last_block = Some(left.0);
        }

        self.free_lists.insert(left.payload(), bin::index(new_size));
      }
    }
  }

  /// `oldptr` null delegates to `allocate`; `size` zero frees and returns
  /// `None`; otherwise allocates fresh, copies `min(size, old block size)`
  /// bytes, and frees the old block. No in-place growth is attempted.
  pub fn reallocate(&mut self, payload: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
    let Some(old) = payload else {
      return self.allocate(size);
    };
    if size == 0 {
      self.free(Some(old));
      return None;
    }

    let new = self.allocate(size)?;
    let old_size = Header::from_payload(old).size();
    let copy_len = size.min(old_size);
    unsafe {
      ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), copy_len);
    }
    self.free(Some(old));
    Some(new)
  }

  /// `allocate(nmemb * size)` with the result zeroed. The product is not
  /// checked for overflow; callers are responsible.
  pub fn calloc(&mut self, nmemb: usize, size: usize) -> Option<NonNull<u8>> {
    let total = nmemb * size;
    let ptr = self.allocate(total)?;
    unsafe {
      ptr::write_bytes(ptr.as_ptr(), 0, total);
    }
    Some(ptr)
  }

  /// Walks every block and every free list, verifying that no two free
  /// blocks sit next to each other, that every free block's header and
  /// footer agree, that every free block is filed in the bin matching its
  /// size, and that the block walk from the prologue lands exactly on the
  /// heap's high mark. Always runs and returns a real answer; only the
  /// `eprintln!` diagnostics naming which check failed are gated behind
  /// the `debug-checks` feature.
  #[track_caller]
  pub fn check(&self) -> bool {
    let site = std::panic::Location::caller();
    self.check_blocks(site) && self.check_free_lists(site)
  }

  fn check_blocks(&self, site: &std::panic::Location<'_>) -> bool {
    let hi = self.heap.high().as_ptr() as usize;
    let prologue = Header::at(self.heap.low());

    if self.is_last(prologue) {
      // No real blocks have been carved out yet; the prologue alone
      // must already reach the high mark.
      let walked_end = prologue.0.as_ptr() as usize + WORD_SIZE;
      if walked_end != hi {
        self.report(site, format_args!("empty heap walk ends at {walked_end:#x}, heap high is {hi:#x}"));
        return false;
      }
      return true;
    }

    let mut header = prologue.next_header();

    loop {
      let addr = header.0.as_ptr() as usize;
      if addr > hi {
        self.report(site, format_args!("block walk overshot the heap high mark"));
        return false;
      }

      let size = header.size();
      if (size.wrapping_sub(WORD_SIZE)) % 16 != 0 {
        self.report(site, format_args!("block at {:p} has non-quantized size {size}", header.0));
        return false;
      }

      let last = self.is_last(header);

      if header.is_free() {
        if header.footer().size() != size {
          self.report(site, format_args!("block at {:p} header/footer size mismatch", header.0));
          return false;
        }
        if !last {
          let next = header.next_header();
          if next.is_free() {
            self.report(site, format_args!("adjacent free blocks escaped coalescing at {:p}", header.0));
            return false;
          }
          if next.is_prev_alloc() {
            self.report(site, format_args!("block at {:p} is free but its right neighbor disagrees", header.0));
            return false;
          }
        }
        let bin = bin::index(size);
        if !self.free_lists.iter(bin).any(|p| p == header.payload()) {
          self.report(site, format_args!("free block at {:p} is missing from bin {bin}", header.0));
          return false;
        }
      }

      if last {
        let walked_end = header.0.as_ptr() as usize + WORD_SIZE + size;
        if walked_end != hi {
          self.report(site, format_args!("block walk ends at {walked_end:#x}, heap high is {hi:#x}"));
          return false;
        }
        return true;
      }
      header = header.next_header();
    }
  }

  fn check_free_lists(&self, site: &std::panic::Location<'_>) -> bool {
    for bin_idx in 0..bin::BIN_COUNT {
      for payload in self.free_lists.iter(bin_idx) {
        let header = Header::from_payload(payload);
        if header.is_alloc() {
          self.report(site, format_args!("bin {bin_idx} holds an allocated block at {:p}", header.0));
          return false;
        }
        if bin::index(header.size()) != bin_idx {
          self.report(site, format_args!("block at {:p} is filed in the wrong bin", header.0));
          return false;
        }
      }
    }
    true
  }

  fn report(&self, site: &std::panic::Location<'_>, args: std::fmt::Arguments<'_>) {
    #[cfg(feature = "debug-checks")]
    {
      eprintln!("[heap-check {}:{}] {args}", site.file(), site.line());
    }
    #[cfg(not(feature = "debug-checks"))]
    {
      let _ = (site, args);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::heap::FixedCapacityHeap;

  fn fresh(capacity: usize) -> Allocator<FixedCapacityHeap> {
    let mut a = Allocator::new(FixedCapacityHeap::new(capacity));
    assert!(a.init());
    a
  }

  fn write_pattern(p: NonNull<u8>, len: usize) {
    for i in 0..len {
      unsafe { p.as_ptr().add(i).write((i % 256) as u8) };
    }
  }

  fn pattern_matches(p: NonNull<u8>, len: usize) -> bool {
    (0..len).all(|i| unsafe { p.as_ptr().add(i).read() } == (i % 256) as u8)
  }

  #[test]
  fn allocate_zero_returns_none() {
    let mut a = fresh(4096);
    assert!(a.allocate(0).is_none());
    assert!(a.check());
  }

  #[test]
  fn free_null_and_out_of_heap_are_noops() {
    let mut a = fresh(4096);
    a.free(None);
    let bogus = NonNull::new(0x1000 as *mut u8).unwrap();
    a.free(Some(bogus));
    assert!(a.check());
  }

  #[test]
  fn allocate_free_reallocate_same_size_reuses_the_block() {
    let mut a = fresh(4096);
    let p1 = a.allocate(40).unwrap();
    a.free(Some(p1));
    let p2 = a.allocate(40).unwrap();
    assert_eq!(p1, p2);
    assert!(a.check());
  }

  #[test]
  fn splitting_leaves_a_free_remainder_and_no_coalescing() {
    let mut a = fresh(8192);
    let p = a.allocate(2000).unwrap();
    a.free(Some(p));
    let q = a.allocate(24).unwrap();
    assert_eq!(p, q);
    assert!(a.check());

    let q_header = Header::from_payload(q);
    let right = q_header.next_header();
    assert!(right.is_free(), "remainder of the split must be free");
  }

  #[test]
  fn a_minimum_sized_block_is_never_split() {
    let mut a = fresh(4096);
    let p = a.allocate(24).unwrap();
    let header = Header::from_payload(p);
    assert_eq!(header.size(), 24);
  }

  #[test]
  fn forward_coalescing_merges_freed_neighbors() {
    let mut a = fresh(4096);
    let pa = a.allocate(40).unwrap();
    let pb = a.allocate(40).unwrap();
    let pc = a.allocate(40).unwrap();
    a.free(Some(pa));
    a.free(Some(pb));
    assert!(a.check());

    let merged = Header::from_payload(pa);
    assert_eq!(merged.size(), 40 + 40 + 8);
    let c_header = Header::from_payload(pc);
    assert!(c_header.is_prev_free());
  }

  #[test]
  fn backward_and_bidirectional_coalescing_merge_into_one_block() {
    let mut a = fresh(4096);
    let pa = a.allocate(40).unwrap();
    let pb = a.allocate(40).unwrap();
    let pc = a.allocate(40).unwrap();
    a.free(Some(pa));
    a.free(Some(pc));
    a.free(Some(pb));
    assert!(a.check());

    let merged = Header::from_payload(pa);
    assert_eq!(merged.size(), 40 + 40 + 40 + 16);
    assert!(merged.is_free());
  }

  #[test]
  fn reallocate_grows_and_preserves_the_old_bytes() {
    let mut a = fresh(4096);
    let p = a.allocate(40).unwrap();
    write_pattern(p, 40);
    let q = a.reallocate(Some(p), 200).unwrap();
    assert!(pattern_matches(q, 40));
    assert!(a.check());
  }

  #[test]
  fn reallocate_null_delegates_to_allocate() {
    let mut a = fresh(4096);
    let p = a.reallocate(None, 64).unwrap();
    assert_eq!(Header::from_payload(p).size(), 64);
  }

  #[test]
  fn reallocate_zero_frees_and_returns_none() {
    let mut a = fresh(4096);
    let p = a.allocate(64).unwrap();
    assert!(a.reallocate(Some(p), 0).is_none());
    assert!(a.check());
  }

  #[test]
  fn calloc_zeroes_the_full_requested_region() {
    let mut a = fresh(4096);
    let p = a.calloc(8, 8).unwrap();
    assert!((0..64).all(|i| unsafe { p.as_ptr().add(i).read() } == 0));
  }

  #[test]
  fn out_of_memory_surfaces_as_none_and_preserves_invariants() {
    let mut a = fresh(256);
    let mut last = None;
    loop {
      match a.allocate(64) {
        Some(p) => last = Some(p),
        None => break,
      }
    }
    assert!(a.check());
    if let Some(p) = last {
      a.free(Some(p));
      assert!(a.check());
    }
  }
}

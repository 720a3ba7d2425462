//! # rallocator - a segregated free-list dynamic memory allocator
//!
//! This crate implements the classic four-operation allocator contract
//! (`allocate`, `free`, `reallocate`, `calloc`) over a single contiguous,
//! monotonically growing heap region, using a segregated free-list design
//! with boundary-tag coalescing, in-place splitting, and size-class
//! binning.
//!
//! ## Overview
//!
//! ```text
//!   Block layout:
//!
//!   ┌────────┬──────────────────────────────────────────────┬─────────┐
//!   │ header │                   payload                    │ footer* │
//!   │ 8 bytes│         24 + 16k bytes, 16-byte aligned       │ 8 bytes │
//!   └────────┴──────────────────────────────────────────────┴─────────┘
//!                                                        * free blocks only
//!
//!   Header bits:  bit0 = allocated   bit1 = prev-allocated   bits3..63 = size
//! ```
//!
//! A free block's payload doubles as the storage for its doubly-linked
//! free-list pointers, and its last 8 bytes carry a footer mirroring the
//! header's size: the boundary tags that let `free` coalesce with either
//! neighbor in O(1) without walking the whole heap.
//!
//! ## Crate structure
//!
//! ```text
//!   rallocator
//!   ├── align      - requested-size -> valid payload-size quantization
//!   ├── block      - header/footer bit-field accessors, neighbor navigation
//!   ├── bin        - payload size -> free-list index
//!   ├── freelist   - the 15 segregated doubly-linked free lists
//!   ├── heap       - the RawHeap trait + SbrkHeap / FixedCapacityHeap
//!   └── allocator  - Allocator<H>: init/allocate/free/reallocate/calloc/check
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use rallocator::{Allocator, FixedCapacityHeap};
//!
//! let mut allocator = Allocator::new(FixedCapacityHeap::new(1 << 16));
//! assert!(allocator.init());
//!
//! let p = allocator.allocate(40).unwrap();
//! unsafe { p.as_ptr().write(42) };
//! allocator.free(Some(p));
//! assert!(allocator.check());
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; `Allocator`
//!   is neither `Send` nor `Sync`.
//! - **No heap shrinking**: the heap only ever grows; coalescing reclaims
//!   freed bytes for reuse but never returns them to the host.
//! - **No in-place growth**: `reallocate` always allocates fresh and
//!   copies, even when the existing block's right neighbor is free and
//!   could have absorbed the request.
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Every block header, footer, and free-list link is read and written
//! through raw pointer arithmetic; `Allocator`'s own public API is safe to
//! call, but the payload pointers it hands out carry the same safety
//! obligations as any raw allocator: no use-after-free, no double-free, no
//! reading past an allocation's requested size.

pub mod align;
mod allocator;
mod bin;
mod block;
mod freelist;
mod heap;

pub use allocator::Allocator;
pub use heap::{FixedCapacityHeap, RawHeap, SbrkHeap};

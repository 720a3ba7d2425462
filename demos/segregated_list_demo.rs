use std::io::Read;

use rallocator::{Allocator, SbrkHeap};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  // The segregated free-list allocator, backed by the process's own `sbrk`
  // heap. `init` plants the 8-byte prologue at the current program break.
  let mut allocator = Allocator::new(SbrkHeap::new().expect("sbrk(0) should succeed at startup"));
  assert!(allocator.init(), "init should succeed on a freshly captured sbrk heap");

  // --------------------------------------------------------------------
  // 1) Allocate three same-size blocks.
  // --------------------------------------------------------------------
  let a = allocator.allocate(40).unwrap();
  let b = allocator.allocate(40).unwrap();
  let c = allocator.allocate(40).unwrap();
  println!("[1] allocate(40) x3 -> {:?} {:?} {:?}", a, b, c);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the middle block, then reallocate the same size: first-fit
  //    should hand back the exact same address instead of extending the
  //    heap.
  // --------------------------------------------------------------------
  allocator.free(Some(b));
  println!("\n[2] freed b = {b:?}");
  let b2 = allocator.allocate(40).unwrap();
  println!(
    "[2] allocate(40) again -> {b2:?} (reused b? {})",
    b2 == b
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free a and c (a's neighbors on either side of b2), demonstrating
  //    bidirectional coalescing into a single free block.
  // --------------------------------------------------------------------
  allocator.free(Some(a));
  allocator.free(Some(c));
  allocator.free(Some(b2));
  println!("\n[3] freed a, c, then b2 - all three should have merged into one free block");
  assert!(allocator.check(), "heap invariants must hold after coalescing");
  println!("[3] check() passed");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Allocate a large block to observe heap growth, then split it by
  //    freeing and requesting something much smaller.
  // --------------------------------------------------------------------
  let big = allocator.allocate(4096).unwrap();
  println!("\n[4] allocate(4096) -> {big:?}");
  allocator.free(Some(big));
  let small = allocator.allocate(24).unwrap();
  println!(
    "[4] allocate(24) after freeing the big block -> {small:?} (reused prefix? {})",
    small == big
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) calloc and reallocate.
  // --------------------------------------------------------------------
  let zeros = allocator.calloc(8, 8).unwrap();
  println!("\n[5] calloc(8, 8) -> {zeros:?}");
  let grown = allocator.reallocate(Some(zeros), 500).unwrap();
  println!("[5] reallocate(zeros, 500) -> {grown:?}");

  assert!(allocator.check(), "heap invariants must hold at the end of the demo");
  println!("\n[6] End of demo. check() passed; process will exit.");
}

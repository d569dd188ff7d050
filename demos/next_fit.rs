use std::{io::Read, ptr::NonNull};

use libc::sbrk;
use nfalloc::{AllocError, Allocator, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb`, or just watch how allocations move the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_alloc(
  allocator: &Allocator<Sbrk>,
  label: &str,
  size: usize,
  addr: NonNull<u8>,
) {
  let stats = allocator.stats();
  println!(
    "{} {} bytes at {:?} | free blocks = {}, free bytes = {}, arena growths = {}",
    label, size, addr, stats.free_blocks, stats.free_bytes, stats.grow_calls
  );
}

fn main() -> Result<(), AllocError> {
  env_logger::init();

  let mut allocator = Allocator::new();

  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Three fresh blocks. Each one grows the arena.
  // --------------------------------------------------------------------
  let first = allocator.allocate(32)?;
  print_alloc(&allocator, "[1] first ", 32, first);
  let second = allocator.allocate(32)?;
  print_alloc(&allocator, "[1] second", 32, second);
  let third = allocator.allocate(256)?;
  print_alloc(&allocator, "[1] third ", 256, third);

  unsafe {
    first.cast::<u32>().write(0xDEAD_BEEF);
    println!("[1] Value written to first = 0x{:X}", first.cast::<u32>().read());
  }

  print_program_break("after fresh blocks");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free first and second. They sit next to each other, so they merge.
  // --------------------------------------------------------------------
  unsafe {
    allocator.deallocate(first.as_ptr());
    allocator.deallocate(second.as_ptr());
  }
  println!("\n[2] Freed first and second: {:?}", allocator.stats());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A request bigger than either block fits in the merged one.
  // --------------------------------------------------------------------
  let merged = allocator.allocate(64)?;
  print_alloc(&allocator, "[3] merged", 64, merged);
  println!(
    "[3] merged == first? {}",
    if merged == first {
      "Yes, the two freed blocks were coalesced"
    } else {
      "No, the arena grew"
    }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free the big block and take a small piece of it. The rest is split
  //    off and stays on the free list.
  // --------------------------------------------------------------------
  unsafe { allocator.deallocate(third.as_ptr()) };
  let small = allocator.allocate(16)?;
  print_alloc(&allocator, "[4] small ", 16, small);
  println!("[4] small == third? {}", small == third);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Grow a block with reallocate. The contents move along.
  // --------------------------------------------------------------------
  unsafe {
    small.write_bytes(0xAB, 16);
    if let Some(moved) = allocator.reallocate(small.as_ptr(), 1024)? {
      print_alloc(&allocator, "[5] moved ", 1024, moved);
      println!("[5] First byte after the move = 0x{:X}", moved.read());
    }
  }
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) A large zeroed block to watch the program break move.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  let big = allocator.allocate_zeroed(64, 1024)?;
  print_alloc(&allocator, "[6] big   ", 64 * 1024, big);
  print_program_break("after large alloc");
  block_until_enter_pressed();

  println!("\n[7] End of example. The arena is never shrunk; the OS reclaims it at exit.");
  Ok(())
}

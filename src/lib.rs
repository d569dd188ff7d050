//! # nfalloc - A Next-Fit Free-List Allocator
//!
//! This crate provides a single-threaded **free-list allocator** that carves
//! blocks out of one growable arena (by default the process data segment,
//! grown with `sbrk`) and recycles freed blocks with next-fit placement,
//! splitting and coalescing.
//!
//! ## Overview
//!
//! ```text
//!   Arena:
//!
//!   ┌────┬──────┬────┬──────┬────┬──────────┬────┬──────┐
//!   │ H  │ used │ H  │ free │ H  │   used   │ H  │ free │ ← frontier
//!   └────┴──────┴────┴──┬───┴────┴──────────┴────┴──┬───┘
//!                       │                           │
//!   Free list:   head ──┼───────────────────────────┘
//!                       └─── (linked through payload bytes)
//!
//!   H = Header { magic, size }
//! ```
//!
//! - **Allocation**: next-fit search from a persistent cursor; on a miss the
//!   arena grows by exactly one block.
//! - **Split**: a block much larger than the request is cut, and the tail goes
//!   back on the free list.
//! - **Deallocation**: the block is pushed onto the free list and merged with
//!   any free block physically before or after it.
//!
//! ## Crate Structure
//!
//! ```text
//!   nfalloc
//!   ├── align      - ALIGNMENT and the align! macro
//!   ├── block      - Header layout and BlockHandle (the raw-memory boundary)
//!   ├── arena      - HeapGrower, Sbrk, FixedArena and aligned Arena growth
//!   ├── free_list  - FreeList: insert, remove, neighbors, split, coalesce
//!   ├── next_fit   - FreeList::find_fit
//!   ├── allocator  - Allocator: allocate / allocate_zeroed / reallocate / deallocate
//!   ├── locked     - Locked: mutex wrapper implementing GlobalAlloc
//!   ├── logging    - log macros muted while a thread holds the Locked mutex
//!   └── error      - AllocError (recoverable) and HeapFault (fatal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use nfalloc::{Allocator, FixedArena};
//!
//! let mut region = vec![0u8; 4096];
//! let mut allocator = Allocator::with_grower(FixedArena::new(&mut region));
//!
//! let ptr = allocator.allocate(64).unwrap();
//! unsafe {
//!     ptr.cast::<u64>().write(42);
//!     allocator.deallocate(ptr.as_ptr());
//! }
//!
//! // The freed block is handed out again.
//! assert_eq!(allocator.allocate(32).unwrap(), ptr);
//! ```
//!
//! ## Errors
//!
//! Running out of arena and overflowing `count * elem_size` are ordinary
//! [`AllocError`] values. A header whose magic is wrong, freeing the block at
//! the head of the free list a second time, or freeing a block already merged
//! into its neighbor, is a [`HeapFault`]: it is
//! reported and the process aborts, because the free list can no longer be
//! trusted.
//!
//! ## Limitations
//!
//! - **Single-threaded**: wrap in [`Locked`] to share.
//! - **No shrinking**: arena memory is never returned to the OS.
//! - **Linear neighbor lookup**: coalescing scans the free list.
//! - **Best-effort double-free detection**: the free-list head and
//!   blocks already merged away are caught; other repeats go unnoticed.
//! - **Unix-only** for [`Sbrk`]: requires `libc`.

pub mod align;
mod allocator;
mod arena;
mod block;
mod error;
mod free_list;
mod locked;
mod logging;
mod next_fit;

pub use allocator::{Allocator, Stats};
pub use arena::{Arena, FixedArena, HeapGrower, Sbrk};
pub use block::{BlockHandle, HEADER_SIZE, Header, MIN_PAYLOAD, SENTINEL};
pub use error::{AllocError, HeapFault};
pub use free_list::{FreeList, Iter};
pub use locked::{Locked, LockedGuard};

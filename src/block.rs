//! Block layout and the raw-memory boundary.
//!
//! ```text
//!   Allocated block:                       Free block:
//!   ┌──────────────┬──────────────────┐    ┌──────────────┬──────┬───────────┐
//!   │ Header       │ payload (size)   │    │ Header       │ next │ unused    │
//!   │ magic | size │                  │    │ magic | size │      │           │
//!   └──────────────┴──────────────────┘    └──────────────┴──────┴───────────┘
//!                  ▲                                      ▲
//!                  └── pointer handed to the client       └── link lives in the payload
//! ```
//!
//! [`BlockHandle`] is the only type in the crate that reads or writes block
//! memory. Everything else moves handles around.

use std::{fmt, mem, ptr::NonNull};

use crate::align;

/// Bit pattern stamped into every header the allocator creates or grants.
pub const SENTINEL: u32 = 0x0123_4567;

/// Written over headers that were merged into a free neighbor.
const RELEASED: u32 = !SENTINEL;

/// Metadata preceding every payload, allocated or free.
#[repr(C, align(16))]
pub struct Header {
  pub magic: u32,
  /// Payload size in bytes, header excluded.
  pub size: usize,
}

/// Link stored in the first payload bytes of a free block.
type Link = Option<BlockHandle>;

pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Smallest payload a block may have: it must be able to hold the free-list link.
pub const MIN_PAYLOAD: usize = align!(mem::size_of::<Link>());

const _: () = assert!(HEADER_SIZE % align::ALIGNMENT == 0);
const _: () = assert!(mem::align_of::<Header>() >= align::ALIGNMENT);

/// Address of a block header.
///
/// Copying a handle does not copy the block. Handles compare by address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHandle(NonNull<Header>);

impl BlockHandle {
  /// Writes a fresh header at `addr` and returns its handle.
  ///
  /// # Safety
  ///
  /// `addr` must be aligned to [`align::ALIGNMENT`] and valid for writes of
  /// `HEADER_SIZE + size` bytes that no live block overlaps.
  pub unsafe fn create(
    addr: NonNull<u8>,
    size: usize,
  ) -> Self {
    let header = addr.cast::<Header>();
    unsafe {
      header.write(Header { magic: SENTINEL, size });
    }
    Self(header)
  }

  /// Recovers the handle of the block whose payload starts at `payload`.
  ///
  /// The header is not validated; check [`BlockHandle::magic`] before trusting it.
  ///
  /// # Safety
  ///
  /// `payload - HEADER_SIZE` must be readable memory.
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(unsafe { payload.sub(HEADER_SIZE) }.cast())
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  /// First payload byte.
  pub fn payload(self) -> NonNull<u8> {
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  /// Address one past the last payload byte.
  pub fn end(self) -> usize {
    self.addr() + HEADER_SIZE + self.size()
  }

  pub fn magic(self) -> u32 {
    unsafe { (*self.0.as_ptr()).magic }
  }

  pub fn is_valid(self) -> bool {
    self.magic() == SENTINEL
  }

  /// Re-stamps the sentinel.
  pub fn stamp(self) {
    unsafe { (*self.0.as_ptr()).magic = SENTINEL }
  }

  /// Retires a header absorbed by a neighbor; it no longer heads a block.
  pub fn release(self) {
    unsafe { (*self.0.as_ptr()).magic = RELEASED }
  }

  /// Whether this header was retired by [`BlockHandle::release`].
  pub fn is_released(self) -> bool {
    self.magic() == RELEASED
  }

  pub fn size(self) -> usize {
    unsafe { (*self.0.as_ptr()).size }
  }

  pub fn set_size(
    self,
    size: usize,
  ) {
    unsafe { (*self.0.as_ptr()).size = size }
  }

  fn link(self) -> NonNull<Link> {
    self.payload().cast()
  }

  /// Free-list successor. Only meaningful while the block is free.
  pub fn next(self) -> Option<BlockHandle> {
    unsafe { self.link().read() }
  }

  pub fn set_next(
    self,
    next: Option<BlockHandle>,
  ) {
    unsafe { self.link().write(next) }
  }
}

impl fmt::Debug for BlockHandle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "Block({:#x})", self.addr())
  }
}

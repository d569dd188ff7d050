use std::{marker::PhantomData, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align::{self, ALIGNMENT},
  block::{BlockHandle, HEADER_SIZE},
  error::AllocError,
  logging::{debug, warn},
};

/// Source of fresh arena memory.
///
/// # Safety
///
/// A successful [`extend`](HeapGrower::extend) must return the current
/// [`frontier`](HeapGrower::frontier) and hand the caller exclusive, writable
/// ownership of `bytes` bytes starting there. Memory once handed out is never
/// reclaimed or handed out again.
pub unsafe trait HeapGrower {
  /// Address the next [`extend`](HeapGrower::extend) will start at.
  fn frontier(&self) -> usize;

  /// Grows the region by `bytes` and returns the base of the new bytes.
  ///
  /// # Safety
  ///
  /// The caller takes ownership of the returned range and must not assume
  /// anything about memory beyond it.
  unsafe fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// The process data segment, grown through `sbrk(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

unsafe impl HeapGrower for Sbrk {
  fn frontier(&self) -> usize {
    unsafe { sbrk(0) as usize }
  }

  unsafe fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(bytes).ok()?;
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(address.cast())
  }
}

/// A bounded arena carved out of a caller-supplied buffer.
///
/// Behaves like [`Sbrk`] until the buffer is exhausted, then fails every
/// request that does not fit.
pub struct FixedArena<'a> {
  base: NonNull<u8>,
  capacity: usize,
  used: usize,
  _region: PhantomData<&'a mut [u8]>,
}

impl<'a> FixedArena<'a> {
  pub fn new(region: &'a mut [u8]) -> Self {
    Self {
      capacity: region.len(),
      base: NonNull::from(region).cast(),
      used: 0,
      _region: PhantomData,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far, alignment padding included.
  pub fn used(&self) -> usize {
    self.used
  }
}

// SAFETY: behaves like the `&mut [u8]` it was built from.
unsafe impl Send for FixedArena<'_> {}

unsafe impl HeapGrower for FixedArena<'_> {
  fn frontier(&self) -> usize {
    self.base.as_ptr() as usize + self.used
  }

  unsafe fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if bytes > self.capacity - self.used {
      return None;
    }

    let address = unsafe { self.base.add(self.used) };
    self.used += bytes;
    Some(address)
  }
}

/// Arena growth with alignment and accounting on top of a [`HeapGrower`].
pub struct Arena<G> {
  grower: G,
  grow_calls: usize,
  bytes_committed: usize,
  padding_wasted: usize,
}

impl<G: HeapGrower> Arena<G> {
  pub const fn new(grower: G) -> Self {
    Self {
      grower,
      grow_calls: 0,
      bytes_committed: 0,
      padding_wasted: 0,
    }
  }

  /// Carves a brand-new block with `payload_size` payload bytes off the frontier.
  ///
  /// Padding is requested first when the frontier is misaligned. If the block
  /// request then fails, the padding stays committed and is never reused.
  pub fn grow(
    &mut self,
    payload_size: usize,
  ) -> Result<BlockHandle, AllocError> {
    let total = payload_size
      .checked_add(HEADER_SIZE)
      .ok_or(AllocError::OutOfMemory { requested: payload_size })?;

    let padding = align::padding_for(self.grower.frontier());
    if padding != 0 {
      if unsafe { self.grower.extend(padding) }.is_none() {
        warn!("arena: failed to commit {padding} bytes of alignment padding");
        return Err(AllocError::OutOfMemory { requested: padding });
      }
      self.bytes_committed += padding;
      self.padding_wasted += padding;
    }

    let Some(base) = (unsafe { self.grower.extend(total) }) else {
      warn!("arena: failed to grow by {total} bytes");
      return Err(AllocError::OutOfMemory { requested: total });
    };

    debug_assert_eq!(base.as_ptr() as usize % ALIGNMENT, 0);

    self.grow_calls += 1;
    self.bytes_committed += total;

    debug!(
      "arena: grew by {} bytes (padding {}), block at {:?}, frontier = {:#x}",
      total,
      padding,
      base,
      self.grower.frontier()
    );

    Ok(unsafe { BlockHandle::create(base, payload_size) })
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  /// Successful block-carving growths.
  pub fn grow_calls(&self) -> usize {
    self.grow_calls
  }

  /// Bytes taken from the grower, padding included.
  pub fn bytes_committed(&self) -> usize {
    self.bytes_committed
  }

  pub fn padding_wasted(&self) -> usize {
    self.padding_wasted
  }
}

use std::ptr::{self, NonNull};

use crate::{
  align,
  arena::{Arena, HeapGrower, Sbrk},
  block::{BlockHandle, MIN_PAYLOAD},
  error::{AllocError, HeapFault},
  free_list::FreeList,
  logging::{trace, warn},
};

/// Point-in-time view of allocator bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
  /// Members of the free list.
  pub free_blocks: usize,
  /// Payload bytes held by the free list.
  pub free_bytes: usize,
  /// Blocks carved off the arena frontier.
  pub grow_calls: usize,
  /// Bytes taken from the heap grower, padding included.
  pub bytes_committed: usize,
  /// Alignment padding that can never be handed out.
  pub padding_wasted: usize,
}

/// A next-fit free-list allocator over one growable arena.
///
/// All state lives in this value; nothing is process-wide. Operations take
/// `&mut self`, so sharing one instance across threads needs an outer lock
/// such as [`Locked`](crate::Locked).
///
/// Heap corruption and detected double frees abort the process (see
/// [`HeapFault`]).
pub struct Allocator<G> {
  arena: Arena<G>,
  free_list: FreeList,
}

impl Allocator<Sbrk> {
  /// An allocator growing the process data segment.
  pub const fn new() -> Self {
    Self::with_grower(Sbrk)
  }
}

impl Default for Allocator<Sbrk> {
  fn default() -> Self {
    Self::new()
  }
}

impl<G: HeapGrower> Allocator<G> {
  pub const fn with_grower(grower: G) -> Self {
    Self {
      arena: Arena::new(grower),
      free_list: FreeList::new(),
    }
  }

  pub fn grower(&self) -> &G {
    self.arena.grower()
  }

  pub fn free_list(&self) -> &FreeList {
    &self.free_list
  }

  pub fn stats(&self) -> Stats {
    Stats {
      free_blocks: self.free_list.len(),
      free_bytes: self.free_list.free_bytes(),
      grow_calls: self.arena.grow_calls(),
      bytes_committed: self.arena.bytes_committed(),
      padding_wasted: self.arena.padding_wasted(),
    }
  }

  /// Allocates at least `size` bytes aligned to [`ALIGNMENT`](crate::align::ALIGNMENT).
  ///
  /// Reuses a free block when one fits, otherwise grows the arena. A zero
  /// `size` still yields a distinct minimum-size block.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let block = self.allocate_block(size)?;
    trace!("allocate({}) -> {:?}", size, block.payload());
    Ok(block.payload())
  }

  /// Allocates room for `count` elements of `elem_size` bytes, zero-filled.
  ///
  /// Fails with [`AllocError::Overflow`] before touching the heap when the
  /// total size is not representable.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    elem_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let Some(total) = count.checked_mul(elem_size) else {
      warn!("allocate_zeroed({count}, {elem_size}) overflows");
      return Err(AllocError::Overflow { count, elem_size });
    };

    let block = self.allocate_block(total)?;

    unsafe {
      block.payload().write_bytes(0, block.size());
    }

    trace!("allocate_zeroed({}, {}) -> {:?}", count, elem_size, block.payload());
    Ok(block.payload())
  }

  /// Resizes the allocation at `ptr` to hold at least `new_size` bytes.
  ///
  /// - A null `ptr` behaves like [`allocate`](Self::allocate).
  /// - A zero `new_size` frees `ptr` and returns `Ok(None)`.
  /// - If the block already holds `new_size` bytes, `ptr` is returned as is.
  /// - Otherwise the contents move to a new block and the old one is freed.
  ///
  /// On error the original allocation is left intact.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    let Some(payload) = NonNull::new(ptr) else {
      return self.allocate(new_size).map(Some);
    };

    if new_size == 0 {
      unsafe { self.deallocate(ptr) };
      return Ok(None);
    }

    let block = unsafe { Self::checked_block(payload) };
    let old_size = block.size();

    if old_size >= new_size {
      trace!("reallocate({:?}, {}) fits in place ({})", payload, new_size, old_size);
      return Ok(Some(payload));
    }

    let fresh = self.allocate_block(new_size)?;

    unsafe {
      ptr::copy_nonoverlapping(payload.as_ptr(), fresh.payload().as_ptr(), old_size.min(new_size));
      self.release(block);
    }

    trace!("reallocate({:?}, {}) -> {:?}", payload, new_size, fresh.payload());
    Ok(Some(fresh.payload()))
  }

  /// Returns the allocation at `ptr` to the free list, merging it with free
  /// physical neighbors. Null is ignored.
  ///
  /// Aborts on a corrupted header. Also aborts on a second free of a block
  /// that is still the free-list head or that was merged into a free
  /// neighbor. Other double frees go undetected.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator.
  pub unsafe fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(payload) = NonNull::new(ptr) else {
      return;
    };

    let block = unsafe { Self::checked_block(payload) };

    if self.free_list.head() == Some(block) {
      HeapFault::DoubleFree { addr: payload.as_ptr() as usize }.abort();
    }

    trace!("deallocate({:?}), {} bytes", payload, block.size());
    unsafe { self.release(block) };
  }

  /// Payload bytes usable through `ptr`, which may exceed the requested size.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live pointer returned by this allocator.
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { Self::checked_block(ptr) }.size()
  }

  fn allocate_block(
    &mut self,
    size: usize,
  ) -> Result<BlockHandle, AllocError> {
    let needed = align::checked_align(size)
      .ok_or(AllocError::OutOfMemory { requested: size })?
      .max(MIN_PAYLOAD);

    if self.free_list.is_empty() {
      return self.arena.grow(needed);
    }

    match self.free_list.find_fit(needed) {
      Some(block) => Ok(block),
      None => self.arena.grow(needed),
    }
  }

  /// # Safety
  ///
  /// `block` must be allocated by this allocator and validated.
  unsafe fn release(
    &mut self,
    block: BlockHandle,
  ) {
    unsafe {
      self.free_list.insert(block);
      self.free_list.coalesce(block);
    }
  }

  /// Header of the block at `payload`; aborts when the sentinel is wrong.
  unsafe fn checked_block(payload: NonNull<u8>) -> BlockHandle {
    let block = unsafe { BlockHandle::from_payload(payload) };

    if block.is_released() {
      HeapFault::DoubleFree { addr: payload.as_ptr() as usize }.abort();
    }

    if !block.is_valid() {
      HeapFault::Corruption {
        addr: payload.as_ptr() as usize,
        found: block.magic(),
      }
      .abort();
    }

    block
  }
}

use std::marker::PhantomData;

use crate::{
  block::{BlockHandle, HEADER_SIZE, MIN_PAYLOAD},
  logging::trace,
};

/// Unordered, singly linked list of free blocks.
///
/// New members are pushed at the head, so order follows recency of freeing
/// rather than address. Neighbor discovery is a linear scan.
///
/// The list also owns the next-fit cursor (see [`FreeList::find_fit`]). The
/// cursor is either `None` or a current member: removing the member it points
/// at moves it to that member's successor.
///
/// # Invariants
/// - A block is a member iff it is not allocated to a client.
/// - Every member appears exactly once.
/// - Members never overlap.
pub struct FreeList {
  head: Option<BlockHandle>,
  cursor: Option<BlockHandle>,
}

// SAFETY: the list owns its blocks exclusively; handles are plain addresses.
unsafe impl Send for FreeList {}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      head: None,
      cursor: None,
    }
  }

  pub fn head(&self) -> Option<BlockHandle> {
    self.head
  }

  /// Where the next search starts.
  pub fn cursor(&self) -> Option<BlockHandle> {
    self.cursor
  }

  pub(crate) fn set_cursor(
    &mut self,
    cursor: Option<BlockHandle>,
  ) {
    debug_assert!(cursor.is_none_or(|c| self.contains(c)));
    self.cursor = cursor;
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  /// Total payload bytes held by members.
  pub fn free_bytes(&self) -> usize {
    self.iter().map(BlockHandle::size).sum()
  }

  pub fn contains(
    &self,
    block: BlockHandle,
  ) -> bool {
    self.iter().any(|member| member == block)
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      current: self.head,
      _list: PhantomData,
    }
  }

  /// Pushes `block` at the head.
  ///
  /// # Safety
  ///
  /// `block` must be a valid block owned by the allocator, not allocated to a
  /// client and not already a member.
  pub unsafe fn insert(
    &mut self,
    block: BlockHandle,
  ) {
    block.set_next(self.head);
    self.head = Some(block);
  }

  /// Unlinks `block`. Returns `false` and leaves the list untouched when it is
  /// not a member.
  pub fn remove(
    &mut self,
    block: BlockHandle,
  ) -> bool {
    let mut prev: Option<BlockHandle> = None;
    let mut current = self.head;

    while let Some(node) = current {
      if node == block {
        let next = node.next();

        match prev {
          None => self.head = next,
          Some(prev) => prev.set_next(next),
        }

        if self.cursor == Some(block) {
          self.cursor = next;
        }

        return true;
      }

      prev = current;
      current = node.next();
    }

    false
  }

  /// The member ending exactly where `block` starts.
  pub fn find_prev_neighbor(
    &self,
    block: BlockHandle,
  ) -> Option<BlockHandle> {
    self.iter().find(|member| member.end() == block.addr())
  }

  /// The member starting exactly where `block` ends.
  pub fn find_next_neighbor(
    &self,
    block: BlockHandle,
  ) -> Option<BlockHandle> {
    let end = block.end();
    self.iter().find(|member| member.addr() == end)
  }

  /// Cuts `block` down to `needed` payload bytes and inserts the tail as a
  /// new free block.
  ///
  /// Returns `None` without touching `block` when the tail could not hold a
  /// header plus [`MIN_PAYLOAD`] bytes.
  ///
  /// # Safety
  ///
  /// `block` must be owned by the caller and not a member. `needed` must be a
  /// multiple of the alignment.
  pub unsafe fn split(
    &mut self,
    block: BlockHandle,
    needed: usize,
  ) -> Option<BlockHandle> {
    let remainder_size = block
      .size()
      .checked_sub(needed + HEADER_SIZE)
      .filter(|size| *size >= MIN_PAYLOAD)?;

    let remainder = unsafe {
      let remainder = BlockHandle::create(block.payload().add(needed), remainder_size);
      block.set_size(needed);
      self.insert(remainder);
      remainder
    };

    trace!(
      "free list: split {:?} into {} + {} ({:?})",
      block,
      needed,
      remainder_size,
      remainder
    );

    Some(remainder)
  }

  /// Merges the just-inserted `block` with its free physical neighbors and
  /// returns the surviving block.
  ///
  /// A free predecessor absorbs `block`; `block` then absorbs a free successor.
  /// Absorbed blocks are removed and their headers released, so the merged
  /// span is listed exactly once and a stale pointer into it is rejected.
  ///
  /// # Safety
  ///
  /// `block` must be a member.
  pub unsafe fn coalesce(
    &mut self,
    block: BlockHandle,
  ) -> BlockHandle {
    let prev = self.find_prev_neighbor(block);
    let next = self.find_next_neighbor(block);

    let mut survivor = block;

    if let Some(prev) = prev {
      self.remove(block);
      prev.set_size(prev.size() + HEADER_SIZE + block.size());
      block.release();
      trace!("free list: {:?} absorbed {:?}", prev, block);
      survivor = prev;
    }

    if let Some(next) = next {
      self.remove(next);
      survivor.set_size(survivor.size() + HEADER_SIZE + next.size());
      next.release();
      trace!("free list: {:?} absorbed {:?}", survivor, next);
    }

    survivor
  }
}

impl Default for FreeList {
  fn default() -> Self {
    Self::new()
  }
}

/// Members from head to tail.
pub struct Iter<'a> {
  current: Option<BlockHandle>,
  _list: PhantomData<&'a FreeList>,
}

impl Iterator for Iter<'_> {
  type Item = BlockHandle;

  fn next(&mut self) -> Option<BlockHandle> {
    let node = self.current?;
    self.current = node.next();
    Some(node)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use std::ptr::NonNull;

  use super::*;

  #[repr(C, align(16))]
  pub(crate) struct Region(pub [u8; 1024]);

  impl Region {
    pub(crate) fn new() -> Box<Self> {
      Box::new(Region([0; 1024]))
    }

    /// Lays out back-to-back blocks with the given payload sizes.
    pub(crate) fn carve(
      &mut self,
      sizes: &[usize],
    ) -> Vec<BlockHandle> {
      let base = NonNull::new(self.0.as_mut_ptr()).unwrap();
      let mut offset = 0;
      let mut blocks = Vec::new();

      for &size in sizes {
        let block = unsafe { BlockHandle::create(base.add(offset), size) };
        offset += HEADER_SIZE + size;
        blocks.push(block);
      }

      assert!(offset <= self.0.len());
      blocks
    }
  }

  #[test]
  fn test_insert_pushes_at_head() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 32, 32]);
    let mut list = FreeList::new();

    assert!(list.is_empty());

    unsafe {
      list.insert(blocks[0]);
      list.insert(blocks[2]);
      list.insert(blocks[1]);
    }

    let order: Vec<_> = list.iter().collect();
    assert_eq!(order, vec![blocks[1], blocks[2], blocks[0]]);
    assert_eq!(list.len(), 3);
    assert_eq!(list.free_bytes(), 96);
  }

  #[test]
  fn test_remove() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 32, 32, 32]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[0]);
      list.insert(blocks[1]);
      list.insert(blocks[2]);
    }

    // Middle, head, tail, then a stranger.
    assert!(list.remove(blocks[1]));
    assert_eq!(list.iter().collect::<Vec<_>>(), vec![blocks[2], blocks[0]]);

    assert!(list.remove(blocks[2]));
    assert_eq!(list.head(), Some(blocks[0]));

    assert!(!list.remove(blocks[3]));
    assert_eq!(list.len(), 1);

    assert!(list.remove(blocks[0]));
    assert!(list.is_empty());
  }

  #[test]
  fn test_remove_advances_cursor() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 32, 32]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[0]);
      list.insert(blocks[1]);
    }
    list.set_cursor(Some(blocks[1]));

    list.remove(blocks[1]);
    assert_eq!(list.cursor(), Some(blocks[0]));

    list.remove(blocks[0]);
    assert_eq!(list.cursor(), None);
  }

  #[test]
  fn test_neighbors() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 48, 64]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[0]);
      list.insert(blocks[2]);
    }

    assert_eq!(list.find_prev_neighbor(blocks[1]), Some(blocks[0]));
    assert_eq!(list.find_next_neighbor(blocks[1]), Some(blocks[2]));
    assert_eq!(list.find_prev_neighbor(blocks[0]), None);
    assert_eq!(list.find_next_neighbor(blocks[2]), None);

    // Not adjacent to each other.
    assert_eq!(list.find_next_neighbor(blocks[0]), None);
  }

  #[test]
  fn test_split() {
    let mut region = Region::new();
    let blocks = region.carve(&[256]);
    let block = blocks[0];
    let mut list = FreeList::new();

    let remainder = unsafe { list.split(block, 64) }.unwrap();

    assert_eq!(block.size(), 64);
    assert_eq!(remainder.addr(), block.end());
    assert_eq!(remainder.size(), 256 - 64 - HEADER_SIZE);
    assert!(remainder.is_valid());
    assert_eq!(list.head(), Some(remainder));
  }

  #[test]
  fn test_split_refuses_tiny_remainder() {
    let mut region = Region::new();
    let blocks = region.carve(&[64 + HEADER_SIZE + MIN_PAYLOAD - 16]);
    let mut list = FreeList::new();

    assert_eq!(unsafe { list.split(blocks[0], 64) }, None);
    assert_eq!(blocks[0].size(), 64 + HEADER_SIZE + MIN_PAYLOAD - 16);
    assert!(list.is_empty());

    // Exactly enough room.
    let blocks = region.carve(&[64 + HEADER_SIZE + MIN_PAYLOAD]);
    let remainder = unsafe { list.split(blocks[0], 64) }.unwrap();
    assert_eq!(remainder.size(), MIN_PAYLOAD);
  }

  #[test]
  fn test_coalesce_both_sides() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 48, 64, 16]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[3]);
      list.insert(blocks[0]);
      list.insert(blocks[2]);
      list.insert(blocks[1]);

      let survivor = list.coalesce(blocks[1]);

      assert_eq!(survivor, blocks[0]);
      assert_eq!(survivor.size(), 32 + 48 + 64 + 2 * HEADER_SIZE);
      assert_eq!(survivor.end(), blocks[3].addr());
    }

    assert!(blocks[0].is_valid());
    assert!(blocks[1].is_released());
    assert!(blocks[2].is_released());
    assert!(blocks[3].is_valid());

    // Block 3 is adjacent to the survivor but was not part of this merge.
    assert_eq!(list.iter().collect::<Vec<_>>(), vec![blocks[0], blocks[3]]);
  }

  #[test]
  fn test_coalesce_next_only() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 48, 64]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[2]);
      list.insert(blocks[1]);

      let survivor = list.coalesce(blocks[1]);

      assert_eq!(survivor, blocks[1]);
      assert_eq!(survivor.size(), 48 + 64 + HEADER_SIZE);
    }

    assert!(blocks[1].is_valid());
    assert!(blocks[2].is_released());

    assert_eq!(list.iter().collect::<Vec<_>>(), vec![blocks[1]]);
  }

  #[test]
  fn test_coalesce_without_neighbors() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 48, 64]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[0]);
      list.insert(blocks[2]);

      let survivor = list.coalesce(blocks[2]);
      assert_eq!(survivor, blocks[2]);
      assert_eq!(survivor.size(), 64);
    }

    assert_eq!(list.len(), 2);
  }

  #[test]
  fn test_coalesce_advances_cursor() {
    let mut region = Region::new();
    let blocks = region.carve(&[32, 48, 64, 16, 32]);
    let mut list = FreeList::new();

    unsafe {
      list.insert(blocks[4]);
      list.insert(blocks[0]);
      list.insert(blocks[2]);
      list.insert(blocks[1]);
    }
    // List order: 1, 2, 0, 4. The cursor sits on the block about to be absorbed.
    list.set_cursor(Some(blocks[1]));

    let survivor = unsafe { list.coalesce(blocks[1]) };
    assert_eq!(survivor, blocks[0]);

    let cursor = list.cursor().unwrap();
    assert!(list.contains(cursor));
    assert_ne!(cursor, blocks[1]);
    assert_ne!(cursor, blocks[2]);

    // Absorbing the cursor's block through the next side moves it as well.
    let mut list = FreeList::new();
    let blocks = region.carve(&[32, 48, 16, 32]);
    unsafe {
      list.insert(blocks[3]);
      list.insert(blocks[1]);
      list.insert(blocks[0]);
    }
    // List order: 0, 1, 3.
    list.set_cursor(Some(blocks[1]));

    let survivor = unsafe { list.coalesce(blocks[0]) };
    assert_eq!(survivor, blocks[0]);
    assert_eq!(list.cursor(), Some(blocks[3]));
    assert!(list.contains(blocks[3]));
  }
}

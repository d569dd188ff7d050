//! Next-fit placement.
//!
//! The search resumes where the previous one stopped instead of at the head,
//! so runs of similar requests do not rescan the blocks they just walked past.

use crate::{block::BlockHandle, free_list::FreeList, logging::trace};

impl FreeList {
  /// Takes the first member with at least `size` payload bytes, starting at
  /// the cursor and wrapping around once.
  ///
  /// The chosen block leaves the list, is split when the tail is worth
  /// keeping, and is re-stamped. The cursor moves to the split remainder, or
  /// else to the chosen block's successor.
  ///
  /// `size` must already be rounded to the alignment.
  pub fn find_fit(
    &mut self,
    size: usize,
  ) -> Option<BlockHandle> {
    let start = self.cursor().or(self.head())?;
    let mut current = start;

    loop {
      if current.size() >= size {
        return Some(self.take(current, size));
      }

      current = current.next().or(self.head())?;

      if current == start {
        trace!("next fit: no member holds {size} bytes");
        return None;
      }
    }
  }

  fn take(
    &mut self,
    block: BlockHandle,
    size: usize,
  ) -> BlockHandle {
    let successor = block.next();
    self.remove(block);

    // SAFETY: `block` was a member, so it is free and now owned by us.
    let remainder = unsafe { self.split(block, size) };

    self.set_cursor(remainder.or(successor).or(self.head()));
    block.stamp();

    trace!(
      "next fit: granted {:?} ({} bytes), cursor = {:?}",
      block,
      block.size(),
      self.cursor()
    );

    block
  }
}

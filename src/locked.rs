use std::{
  alloc::{GlobalAlloc, Layout},
  ops::{Deref, DerefMut},
  ptr::{self, NonNull},
  sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
  align::ALIGNMENT,
  allocator::Allocator,
  arena::HeapGrower,
  logging::Silence,
};

/// An [`Allocator`] behind a mutex, usable from several threads and as a
/// `#[global_allocator]`.
///
/// Requests aligned beyond [`ALIGNMENT`] are refused with a null pointer.
///
/// Nothing is logged while the lock is held, fatal faults included (they
/// still reach stderr). An installed logger that allocates would otherwise
/// call back into this mutex from the thread that owns it.
///
/// ```rust,ignore
/// use nfalloc::{Allocator, Locked};
///
/// #[global_allocator]
/// static GLOBAL: Locked<nfalloc::Sbrk> = Locked::new(Allocator::new());
/// ```
pub struct Locked<G> {
  inner: Mutex<Allocator<G>>,
}

impl<G: HeapGrower> Locked<G> {
  pub const fn new(allocator: Allocator<G>) -> Self {
    Self {
      inner: Mutex::new(allocator),
    }
  }

  /// Exclusive access to the wrapped allocator.
  ///
  /// A panic while the lock was held does not poison it: allocator state is
  /// only mutated by code that cannot unwind halfway.
  pub fn lock(&self) -> LockedGuard<'_, G> {
    let silence = Silence::enter();
    LockedGuard {
      guard: self.inner.lock().unwrap_or_else(PoisonError::into_inner),
      _silence: silence,
    }
  }
}

/// The held lock of a [`Locked`]. Allocator logging on this thread stays
/// muted until it is dropped.
pub struct LockedGuard<'a, G> {
  guard: MutexGuard<'a, Allocator<G>>,
  _silence: Silence,
}

impl<G> Deref for LockedGuard<'_, G> {
  type Target = Allocator<G>;

  fn deref(&self) -> &Self::Target {
    &self.guard
  }
}

impl<G> DerefMut for LockedGuard<'_, G> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.guard
  }
}

unsafe impl<G: HeapGrower + Send> GlobalAlloc for Locked<G> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.lock().allocate(layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.lock().allocate_zeroed(1, layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.lock().deallocate(ptr) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    match unsafe { self.lock().reallocate(ptr, new_size) } {
      Ok(Some(ptr)) => ptr.as_ptr(),
      Ok(None) | Err(_) => ptr::null_mut(),
    }
  }
}

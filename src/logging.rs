//! `log` macros that stay silent while a thread is inside [`Locked`](crate::Locked).
//!
//! A logger may allocate. When `Locked` is the global allocator that
//! allocation would come back into the mutex the thread already holds, so
//! everything logged under the lock is dropped instead.

use std::cell::Cell;

thread_local! {
  static SILENCED: Cell<bool> = const { Cell::new(false) };
}

pub(crate) fn enabled() -> bool {
  !SILENCED.get()
}

/// Silences this thread's allocator logging until dropped.
pub(crate) struct Silence {
  previous: bool,
}

impl Silence {
  pub(crate) fn enter() -> Self {
    Self {
      previous: SILENCED.replace(true),
    }
  }
}

impl Drop for Silence {
  fn drop(&mut self) {
    SILENCED.set(self.previous);
  }
}

macro_rules! trace {
  ($($arg:tt)+) => {
    if $crate::logging::enabled() {
      ::log::trace!($($arg)+)
    }
  };
}

macro_rules! debug {
  ($($arg:tt)+) => {
    if $crate::logging::enabled() {
      ::log::debug!($($arg)+)
    }
  };
}

macro_rules! warn_ {
  ($($arg:tt)+) => {
    if $crate::logging::enabled() {
      ::log::warn!($($arg)+)
    }
  };
}

macro_rules! error {
  ($($arg:tt)+) => {
    if $crate::logging::enabled() {
      ::log::error!($($arg)+)
    }
  };
}

pub(crate) use {debug, error, trace, warn_ as warn};

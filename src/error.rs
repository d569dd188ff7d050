/// Recoverable allocation failures, returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
  #[error("out of memory: the arena could not grow by {requested} bytes")]
  OutOfMemory { requested: usize },
  #[error("size overflow: {count} elements of {elem_size} bytes")]
  Overflow { count: usize, elem_size: usize },
}

/// Heap invariant violations.
///
/// Never returned: once a header or the free list cannot be trusted, every
/// further mutation may clobber unrelated blocks, so the process is aborted
/// through [`HeapFault::abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeapFault {
  #[error("memory corruption detected at {addr:#x}: header magic is {found:#010x}")]
  Corruption { addr: usize, found: u32 },
  #[error("double free detected at {addr:#x}")]
  DoubleFree { addr: usize },
}

impl HeapFault {
  /// Reports the fault and terminates the process.
  #[cold]
  pub fn abort(self) -> ! {
    crate::logging::error!("{self}");
    eprintln!("{self}");
    std::process::abort()
  }
}

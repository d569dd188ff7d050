/// Boundary every header and payload handed out by the allocator sits on.
///
/// Must be a power of two.
pub const ALIGNMENT: usize = 16;

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// Not overflow-checked; use [`checked_align`] where the input is caller-controlled.
///
/// # Examples
///
/// ```rust
/// use nfalloc::align;
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(1), 16);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(17), 32);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    (($value) + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Rounds `value` up to [`ALIGNMENT`], or `None` if that would overflow.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(v) => Some(v & !(ALIGNMENT - 1)),
    None => None,
  }
}

/// Number of bytes needed to lift `addr` to the next [`ALIGNMENT`] boundary.
pub const fn padding_for(addr: usize) -> usize {
  match addr & (ALIGNMENT - 1) {
    0 => 0,
    rem => ALIGNMENT - rem,
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

use std::os::raw::c_void;
use std::ptr::NonNull;

/// Opaque value handle handed to native code.
pub type napi_value = *mut c_void;

/// A non-null engine value reference.
///
/// Every backend represents its values as a pointer-sized token. Crossing
/// the C boundary is a plain bit copy in both directions.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawValue(NonNull<c_void>);

static_assertions::assert_eq_size!(RawValue, napi_value);
static_assertions::assert_eq_size!(Option<RawValue>, napi_value);

impl RawValue {
  #[inline]
  pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
    NonNull::new(ptr).map(Self)
  }

  /// Wraps a backend token. Tokens are never zero.
  #[inline]
  pub fn from_token(token: usize) -> Self {
    debug_assert!(token != 0);
    Self(NonNull::new(token as *mut c_void).unwrap_or(NonNull::dangling()))
  }

  #[inline]
  pub fn from_napi(value: napi_value) -> Option<Self> {
    Self::from_ptr(value)
  }

  #[inline]
  pub fn into_napi(self) -> napi_value {
    self.0.as_ptr()
  }

  #[inline]
  pub fn as_ptr(self) -> *mut c_void {
    self.0.as_ptr()
  }

  #[inline]
  pub fn token(self) -> usize {
    self.0.as_ptr() as usize
  }
}

impl From<RawValue> for napi_value {
  fn from(value: RawValue) -> Self {
    value.into_napi()
  }
}

/// Encodes a table id as an opaque, non-null handle.
#[inline]
pub(crate) fn id_to_handle(id: usize) -> *mut c_void {
  (id + 1) as *mut c_void
}

/// Decodes a handle produced by [`id_to_handle`].
#[inline]
pub(crate) fn handle_to_id(handle: *mut c_void) -> Option<usize> {
  (handle as usize).checked_sub(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn null_is_not_a_value() {
    assert!(RawValue::from_napi(std::ptr::null_mut()).is_none());
  }

  #[test]
  fn handles_are_bit_copies() {
    let value = RawValue::from_token(0x40);
    assert_eq!(value.into_napi() as usize, 0x40);
    assert_eq!(RawValue::from_napi(value.into_napi()), Some(value));
  }

  #[test]
  fn id_handles() {
    assert!(!id_to_handle(0).is_null());
    assert_eq!(handle_to_id(id_to_handle(0)), Some(0));
    assert_eq!(handle_to_id(id_to_handle(41)), Some(41));
    assert_eq!(handle_to_id(std::ptr::null_mut()), None);
  }
}

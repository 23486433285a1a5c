// Copyright 2018-2026 the Deno authors. MIT license.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::Error;
use crate::NAPI_AUTO_LENGTH;

/// Reads `len` bytes of UTF-8 (or up to the NUL when `len` is
/// `NAPI_AUTO_LENGTH`) and returns the text as UTF-16 code units. Invalid
/// sequences are replaced.
///
/// # Safety
///
/// `ptr` must be valid for `len` bytes, or NUL-terminated.
pub unsafe fn utf8_to_units(
  ptr: *const c_char,
  len: usize,
) -> Result<Vec<u16>, Error> {
  let bytes = unsafe { read_bytes(ptr, len)? };
  Ok(String::from_utf8_lossy(bytes).encode_utf16().collect())
}

/// # Safety
///
/// `ptr` must be valid for `len` bytes, or NUL-terminated.
pub unsafe fn latin1_to_units(
  ptr: *const c_char,
  len: usize,
) -> Result<Vec<u16>, Error> {
  let bytes = unsafe { read_bytes(ptr, len)? };
  Ok(bytes.iter().map(|byte| *byte as u16).collect())
}

/// # Safety
///
/// `ptr` must be valid for `len` code units, or NUL-terminated.
pub unsafe fn utf16_to_units(
  ptr: *const u16,
  len: usize,
) -> Result<Vec<u16>, Error> {
  if len == 0 {
    return Ok(Vec::new());
  }
  if ptr.is_null() {
    return Err(Error::InvalidArg);
  }
  let len = if len == NAPI_AUTO_LENGTH {
    let mut end = 0;
    // SAFETY: the caller guarantees NUL termination.
    while unsafe { *ptr.add(end) } != 0 {
      end += 1;
    }
    end
  } else {
    if len > i32::MAX as usize {
      return Err(Error::InvalidArg);
    }
    len
  };
  // SAFETY: bounds established above.
  Ok(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
}

unsafe fn read_bytes<'a>(
  ptr: *const c_char,
  len: usize,
) -> Result<&'a [u8], Error> {
  if len == 0 {
    return Ok(&[]);
  }
  if ptr.is_null() {
    return Err(Error::InvalidArg);
  }
  if len == NAPI_AUTO_LENGTH {
    // SAFETY: the caller guarantees NUL termination.
    return Ok(unsafe { CStr::from_ptr(ptr) }.to_bytes());
  }
  if len > i32::MAX as usize {
    return Err(Error::InvalidArg);
  }
  // SAFETY: the caller guarantees `len` readable bytes.
  Ok(unsafe { std::slice::from_raw_parts(ptr as *const u8, len) })
}

/// Reads a UTF-8 name such as a property or class name.
///
/// # Safety
///
/// Same as [`utf8_to_units`].
pub unsafe fn read_name(
  ptr: *const c_char,
  len: usize,
) -> Result<String, Error> {
  let bytes = unsafe { read_bytes(ptr, len)? };
  Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// The longest prefix of `text` that fits in `capacity` bytes without
/// splitting a code point.
pub fn utf8_prefix(text: &str, capacity: usize) -> &str {
  if text.len() <= capacity {
    return text;
  }
  let mut end = capacity;
  while !text.is_char_boundary(end) {
    end -= 1;
  }
  &text[..end]
}

/// The longest prefix of `units` that fits in `capacity` units without
/// splitting a surrogate pair.
pub fn utf16_prefix(units: &[u16], capacity: usize) -> &[u16] {
  if units.len() <= capacity {
    return units;
  }
  let mut end = capacity;
  if end > 0 && (0xD800..0xDC00).contains(&units[end - 1]) {
    end -= 1;
  }
  &units[..end]
}

/// ECMAScript ToInt32.
pub fn to_int32(value: f64) -> i32 {
  to_uint32(value) as i32
}

/// ECMAScript ToUint32.
pub fn to_uint32(value: f64) -> u32 {
  if !value.is_finite() {
    return 0;
  }
  let truncated = value.trunc();
  let modulo = truncated.rem_euclid(4294967296.0);
  modulo as u32
}

/// Saturating conversion; non-finite values are 0.
pub fn to_int64(value: f64) -> i64 {
  if !value.is_finite() {
    return 0;
  }
  value as i64
}

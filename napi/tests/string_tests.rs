// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::os::raw::c_char;
use std::ptr;

use napi_shim::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn utf8_two_phase_round_trip(text in "\\PC{0,32}") {
    let mut env = common::env();
    let napi = env.as_napi();
    let read = unsafe {
      let value = common::string(napi, &text);
      common::read_string(napi, value)
    };
    prop_assert_eq!(read, text);
  }

  #[test]
  fn utf8_truncation_never_splits_a_code_point(
    text in "\\PC{1,32}",
    fraction in 0.0f64..1.0,
  ) {
    let mut env = common::env();
    let napi = env.as_napi();
    // Any capacity from one byte up to the full length.
    let bufsize = 1 + ((text.len() as f64) * fraction) as usize;
    let mut buf = vec![0xffu8; bufsize];
    let mut copied = usize::MAX;
    unsafe {
      let value = common::string(napi, &text);
      assert_napi_ok!(napi_get_value_string_utf8(
        napi,
        value,
        buf.as_mut_ptr() as *mut c_char,
        bufsize,
        &mut copied,
      ));
    }
    prop_assert!(copied < bufsize);
    prop_assert_eq!(buf[copied], 0);
    let prefix = std::str::from_utf8(&buf[..copied]);
    prop_assert!(prefix.is_ok());
    prop_assert!(text.starts_with(prefix.unwrap_or_default()));
  }
}

#[test]
fn length_query_excludes_the_terminator() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let value = common::string(napi, "h\u{e9}llo");
    let mut len = 0;
    assert_napi_ok!(napi_get_value_string_utf8(
      napi,
      value,
      ptr::null_mut(),
      0,
      &mut len,
    ));
    assert_eq!(len, 6);
  }
}

#[test]
fn auto_length_reads_to_the_terminator() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_create_string_utf8(
      napi,
      c"native".as_ptr(),
      NAPI_AUTO_LENGTH,
      &mut value,
    ));
    assert_eq!(common::read_string(napi, value), "native");
  }
}

#[test]
fn utf16_keeps_surrogate_pairs_whole() {
  let mut env = common::env();
  let napi = env.as_napi();
  let units: Vec<u16> = "a\u{1f600}b".encode_utf16().collect();
  assert_eq!(units.len(), 4);
  unsafe {
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_create_string_utf16(
      napi,
      units.as_ptr(),
      units.len(),
      &mut value,
    ));

    let mut len = 0;
    assert_napi_ok!(napi_get_value_string_utf16(
      napi,
      value,
      ptr::null_mut(),
      0,
      &mut len,
    ));
    assert_eq!(len, 4);

    let mut buf = [0xffffu16; 3];
    let mut copied = 0;
    assert_napi_ok!(napi_get_value_string_utf16(
      napi,
      value,
      buf.as_mut_ptr(),
      buf.len(),
      &mut copied,
    ));
    assert_eq!(copied, 1);
    assert_eq!(&buf[..2], &[0x61, 0]);

    let mut buf = [0u16; 5];
    assert_napi_ok!(napi_get_value_string_utf16(
      napi,
      value,
      buf.as_mut_ptr(),
      buf.len(),
      &mut copied,
    ));
    assert_eq!(copied, 4);
    assert_eq!(&buf[..4], units.as_slice());
  }
}

#[test]
fn latin1_round_trip() {
  let mut env = common::env();
  let napi = env.as_napi();
  let bytes = [b'c', b'a', b'f', 0xe9];
  unsafe {
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_create_string_latin1(
      napi,
      bytes.as_ptr() as *const c_char,
      bytes.len(),
      &mut value,
    ));
    assert_eq!(common::read_string(napi, value), "caf\u{e9}");

    let mut buf = [0u8; 8];
    let mut copied = 0;
    assert_napi_ok!(napi_get_value_string_latin1(
      napi,
      value,
      buf.as_mut_ptr() as *mut c_char,
      buf.len(),
      &mut copied,
    ));
    assert_eq!(copied, 4);
    assert_eq!(&buf[..5], &[b'c', b'a', b'f', 0xe9, 0]);
  }
}

#[test]
fn non_strings_are_rejected() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let value = common::number(napi, 1.0);
    let mut len = 0;
    assert_eq!(
      napi_get_value_string_utf8(napi, value, ptr::null_mut(), 0, &mut len),
      napi_string_expected
    );
    assert_eq!(common::last_error(napi).error_code, napi_string_expected);
  }
}

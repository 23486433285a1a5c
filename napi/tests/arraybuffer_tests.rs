// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use napi_shim::*;
use pretty_assertions::assert_eq;

static BUFFERS_FREED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn free_buffer(
  _env: napi_env,
  data: *mut c_void,
  hint: *mut c_void,
) {
  assert!(hint.is_null());
  drop(unsafe { Box::from_raw(data as *mut [u8; 16]) });
  BUFFERS_FREED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn external_buffer_is_freed_once() {
  let mut env = common::env();
  let napi = env.as_napi();
  let bytes = Box::into_raw(Box::new([7u8; 16]));
  unsafe {
    let mut buffer = ptr::null_mut();
    assert_napi_ok!(napi_create_external_arraybuffer(
      napi,
      bytes as *mut c_void,
      16,
      Some(free_buffer),
      ptr::null_mut(),
      &mut buffer,
    ));
    let mut data = ptr::null_mut();
    let mut len = 0;
    assert_napi_ok!(napi_get_arraybuffer_info(
      napi,
      buffer,
      &mut data,
      &mut len,
    ));
    assert_eq!(data, bytes as *mut c_void);
    assert_eq!(len, 16);
    assert_eq!(*(data as *const u8).add(15), 7);
  }
  env.engine().collect_garbage();
  assert_eq!(BUFFERS_FREED.load(Ordering::SeqCst), 1);
  env.engine().collect_garbage();
  drop(env);
  assert_eq!(BUFFERS_FREED.load(Ordering::SeqCst), 1);
}

#[test]
fn typed_array_views_share_the_buffer() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut backing = ptr::null_mut();
    let mut buffer = ptr::null_mut();
    assert_napi_ok!(napi_create_arraybuffer(
      napi,
      16,
      &mut backing,
      &mut buffer,
    ));
    let mut array = ptr::null_mut();
    assert_napi_ok!(napi_create_typedarray(
      napi,
      napi_int32_array,
      2,
      buffer,
      4,
      &mut array,
    ));
    let mut is_typed_array = false;
    assert_napi_ok!(napi_is_typedarray(napi, array, &mut is_typed_array));
    assert!(is_typed_array);

    let mut ty = napi_uint8_array;
    let mut length = 0;
    let mut data = ptr::null_mut();
    let mut view_buffer = ptr::null_mut();
    let mut byte_offset = 0;
    assert_napi_ok!(napi_get_typedarray_info(
      napi,
      array,
      &mut ty,
      &mut length,
      &mut data,
      &mut view_buffer,
      &mut byte_offset,
    ));
    assert_eq!(ty, napi_int32_array);
    assert_eq!(length, 2);
    assert_eq!(byte_offset, 4);
    assert_eq!(data, (backing as *mut u8).add(4) as *mut c_void);
    let mut same = false;
    assert_napi_ok!(napi_strict_equals(napi, view_buffer, buffer, &mut same));
    assert!(same);

    *(data as *mut i32) = -9;
    let mut element = ptr::null_mut();
    assert_napi_ok!(napi_get_element(napi, array, 0, &mut element));
    let mut value = 0;
    assert_napi_ok!(napi_get_value_int32(napi, element, &mut value));
    assert_eq!(value, -9);
  }
}

#[test]
fn misaligned_typed_array_throws_range_error() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut buffer = ptr::null_mut();
    assert_napi_ok!(napi_create_arraybuffer(
      napi,
      16,
      ptr::null_mut(),
      &mut buffer,
    ));
    let mut array = ptr::null_mut();
    assert_eq!(
      napi_create_typedarray(
        napi,
        napi_float64_array,
        1,
        buffer,
        3,
        &mut array,
      ),
      napi_pending_exception
    );
    let mut error = ptr::null_mut();
    assert_napi_ok!(napi_get_and_clear_last_exception(napi, &mut error));
    let name = common::get_named(napi, error, "name");
    assert_eq!(common::read_string(napi, name), "RangeError");

    assert_eq!(
      napi_create_typedarray(napi, napi_uint8_array, 17, buffer, 0, &mut array),
      napi_pending_exception
    );
    assert!(common::is_exception_pending(napi));
  }
}

#[test]
fn data_view_info() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut backing = ptr::null_mut();
    let mut buffer = ptr::null_mut();
    assert_napi_ok!(napi_create_arraybuffer(
      napi,
      8,
      &mut backing,
      &mut buffer,
    ));
    let mut view = ptr::null_mut();
    assert_napi_ok!(napi_create_dataview(napi, 4, buffer, 2, &mut view));
    let mut is_data_view = false;
    assert_napi_ok!(napi_is_dataview(napi, view, &mut is_data_view));
    assert!(is_data_view);

    let mut byte_length = 0;
    let mut data = ptr::null_mut();
    let mut byte_offset = 0;
    assert_napi_ok!(napi_get_dataview_info(
      napi,
      view,
      &mut byte_length,
      &mut data,
      ptr::null_mut(),
      &mut byte_offset,
    ));
    assert_eq!(byte_length, 4);
    assert_eq!(byte_offset, 2);
    assert_eq!(data, (backing as *mut u8).add(2) as *mut c_void);

    assert_eq!(
      napi_create_dataview(napi, 8, buffer, 2, &mut view),
      napi_pending_exception
    );
    let mut error = ptr::null_mut();
    assert_napi_ok!(napi_get_and_clear_last_exception(napi, &mut error));
  }
}

#[test]
fn views_require_an_array_buffer() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let object = common::object(napi);
    let mut result = ptr::null_mut();
    assert_eq!(
      napi_create_typedarray(napi, napi_uint8_array, 0, object, 0, &mut result),
      napi_invalid_arg
    );
    assert_eq!(
      napi_create_dataview(napi, 0, object, 0, &mut result),
      napi_invalid_arg
    );
    let mut is_buffer = true;
    assert_napi_ok!(napi_is_arraybuffer(napi, object, &mut is_buffer));
    assert!(!is_buffer);
  }
}

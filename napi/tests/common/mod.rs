// Copyright 2018-2026 the Deno authors. MIT license.

#![allow(dead_code)]
#![allow(clippy::undocumented_unsafe_blocks)]

use std::ffi::CString;
use std::ptr;

use napi_shim::engine::local::EngineStats;
use napi_shim::engine::local::LocalEngine;
use napi_shim::*;

macro_rules! assert_napi_ok {
  ($call: expr) => {{
    #[allow(unused_unsafe)]
    let status = unsafe { $call };
    assert_eq!(status, napi_shim::napi_ok);
  }};
}

macro_rules! get_callback_info {
  ($env: expr, $callback_info: expr, $size: literal) => {{
    let mut args = [std::ptr::null_mut(); $size];
    let mut argc = $size;
    let mut this = std::ptr::null_mut();
    assert_napi_ok!(napi_shim::napi_get_cb_info(
      $env,
      $callback_info,
      &mut argc,
      args.as_mut_ptr(),
      &mut this,
      std::ptr::null_mut(),
    ));
    (args, argc, this)
  }};
}

macro_rules! new_property {
  ($name: expr, $value: expr) => {
    napi_shim::napi_property_descriptor {
      utf8name: $name.as_ptr(),
      name: std::ptr::null_mut(),
      method: Some($value),
      getter: None,
      setter: None,
      value: std::ptr::null_mut(),
      attributes: napi_shim::napi_default_method,
      data: std::ptr::null_mut(),
    }
  };
}

pub fn env() -> Box<Env> {
  env_with(EnvOptions::new())
}

pub fn env_with(options: EnvOptions) -> Box<Env> {
  Env::new(Box::new(LocalEngine::new()), options)
    .expect("environment bootstrap")
}

pub fn local(env: &Env) -> &LocalEngine {
  env
    .engine()
    .as_any()
    .downcast_ref::<LocalEngine>()
    .expect("local engine")
}

pub fn stats(env: &Env) -> EngineStats {
  local(env).stats()
}

pub unsafe fn string(env: napi_env, text: &str) -> napi_value {
  let mut value = ptr::null_mut();
  assert_napi_ok!(napi_create_string_utf8(
    env,
    text.as_ptr() as *const c_char,
    text.len(),
    &mut value,
  ));
  value
}

/// Reads a string the way addons do: length first, then the buffer.
pub unsafe fn read_string(env: napi_env, value: napi_value) -> String {
  let mut len = 0;
  assert_napi_ok!(napi_get_value_string_utf8(
    env,
    value,
    ptr::null_mut(),
    0,
    &mut len,
  ));
  let mut buf = vec![0u8; len + 1];
  let mut copied = 0;
  assert_napi_ok!(napi_get_value_string_utf8(
    env,
    value,
    buf.as_mut_ptr() as *mut c_char,
    buf.len(),
    &mut copied,
  ));
  buf.truncate(copied);
  String::from_utf8(buf).expect("utf-8")
}

pub unsafe fn number(env: napi_env, value: f64) -> napi_value {
  let mut result = ptr::null_mut();
  assert_napi_ok!(napi_create_double(env, value, &mut result));
  result
}

pub unsafe fn read_number(env: napi_env, value: napi_value) -> f64 {
  let mut result = 0.0;
  assert_napi_ok!(napi_get_value_double(env, value, &mut result));
  result
}

pub unsafe fn object(env: napi_env) -> napi_value {
  let mut result = ptr::null_mut();
  assert_napi_ok!(napi_create_object(env, &mut result));
  result
}

pub unsafe fn global(env: napi_env) -> napi_value {
  let mut result = ptr::null_mut();
  assert_napi_ok!(napi_get_global(env, &mut result));
  result
}

pub unsafe fn get_named(
  env: napi_env,
  object: napi_value,
  name: &str,
) -> napi_value {
  let name = CString::new(name).unwrap();
  let mut result = ptr::null_mut();
  assert_napi_ok!(napi_get_named_property(
    env,
    object,
    name.as_ptr(),
    &mut result,
  ));
  result
}

pub unsafe fn set_named(
  env: napi_env,
  object: napi_value,
  name: &str,
  value: napi_value,
) {
  let name = CString::new(name).unwrap();
  assert_napi_ok!(napi_set_named_property(env, object, name.as_ptr(), value));
}

pub unsafe fn call(
  env: napi_env,
  this: napi_value,
  function: napi_value,
  args: &[napi_value],
) -> (napi_status, napi_value) {
  let mut result = ptr::null_mut();
  let status = unsafe {
    napi_call_function(
      env,
      this,
      function,
      args.len(),
      args.as_ptr(),
      &mut result,
    )
  };
  (status, result)
}

pub unsafe fn run_script(
  env: napi_env,
  source: &str,
) -> (napi_status, napi_value) {
  let script = unsafe { string(env, source) };
  let mut result = ptr::null_mut();
  let status = unsafe { napi_run_script(env, script, &mut result) };
  (status, result)
}

pub unsafe fn typeof_value(
  env: napi_env,
  value: napi_value,
) -> napi_valuetype {
  let mut result = napi_undefined;
  assert_napi_ok!(napi_typeof(env, value, &mut result));
  result
}

pub unsafe fn is_exception_pending(env: napi_env) -> bool {
  let mut pending = false;
  assert_napi_ok!(napi_is_exception_pending(env, &mut pending));
  pending
}

/// Takes the pending exception and returns its `message`.
pub unsafe fn take_exception_message(env: napi_env) -> String {
  let mut error = ptr::null_mut();
  assert_napi_ok!(napi_get_and_clear_last_exception(env, &mut error));
  let message = unsafe { get_named(env, error, "message") };
  unsafe { read_string(env, message) }
}

pub unsafe fn last_error(env: napi_env) -> napi_extended_error_info {
  let mut info = ptr::null();
  let status = unsafe { napi_get_last_error_info(env, &mut info) };
  assert_eq!(status, napi_ok);
  unsafe { *info }
}

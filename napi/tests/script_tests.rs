// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::ffi::CStr;
use std::ptr;

use napi_shim::*;
use pretty_assertions::assert_eq;

#[test]
fn evaluates_expressions() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let (status, value) = common::run_script(napi, "1 + 2");
    assert_eq!(status, napi_ok);
    assert_eq!(common::typeof_value(napi, value), napi_number);
    assert_eq!(common::read_number(napi, value), 3.0);

    let (status, value) = common::run_script(napi, "'n' + 'api'");
    assert_eq!(status, napi_ok);
    assert_eq!(common::read_string(napi, value), "napi");
  }
}

#[test]
fn thrown_errors_stay_pending() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let (status, _) = common::run_script(napi, "throw new Error('x')");
    assert_eq!(status, napi_pending_exception);
    assert!(common::is_exception_pending(napi));

    // Entry points that run script refuse to start while one is pending.
    let (status, _) = common::run_script(napi, "1");
    assert_eq!(status, napi_pending_exception);

    assert_eq!(common::take_exception_message(napi), "x");
    assert!(!common::is_exception_pending(napi));

    let mut nothing = ptr::null_mut();
    assert_napi_ok!(napi_get_and_clear_last_exception(napi, &mut nothing));
    assert_eq!(common::typeof_value(napi, nothing), napi_undefined);
  }
}

#[test]
fn scripts_must_be_strings() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let script = common::number(napi, 1.0);
    let mut result = ptr::null_mut();
    assert_eq!(
      napi_run_script(napi, script, &mut result),
      napi_string_expected
    );
  }
}

unsafe extern "C" fn throw_coded(
  env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  assert_napi_ok!(napi_throw_type_error(
    env,
    c"ERR_BAD".as_ptr(),
    c"bad thing".as_ptr(),
  ));
  ptr::null_mut()
}

#[test]
fn native_throws_propagate() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut function = ptr::null_mut();
    assert_napi_ok!(napi_create_function(
      napi,
      c"thrower".as_ptr(),
      NAPI_AUTO_LENGTH,
      Some(throw_coded),
      ptr::null_mut(),
      &mut function,
    ));
    let undefined = {
      let mut value = ptr::null_mut();
      assert_napi_ok!(napi_get_undefined(napi, &mut value));
      value
    };
    let (status, _) = common::call(napi, undefined, function, &[]);
    assert_eq!(status, napi_pending_exception);

    // A second call is rejected up front.
    let (status, _) = common::call(napi, undefined, function, &[]);
    assert_eq!(status, napi_pending_exception);

    let mut error = ptr::null_mut();
    assert_napi_ok!(napi_get_and_clear_last_exception(napi, &mut error));
    let code = common::get_named(napi, error, "code");
    assert_eq!(common::read_string(napi, code), "ERR_BAD");
    let name = common::get_named(napi, error, "name");
    assert_eq!(common::read_string(napi, name), "TypeError [ERR_BAD]");
    let message = common::get_named(napi, error, "message");
    assert_eq!(common::read_string(napi, message), "bad thing");
  }
}

#[test]
fn native_functions_are_callable_from_script() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut function = ptr::null_mut();
    assert_napi_ok!(napi_create_function(
      napi,
      c"thrower".as_ptr(),
      NAPI_AUTO_LENGTH,
      Some(throw_coded),
      ptr::null_mut(),
      &mut function,
    ));
    common::set_named(napi, common::global(napi), "thrower", function);
    let (status, _) = common::run_script(napi, "thrower()");
    assert_eq!(status, napi_pending_exception);
    assert_eq!(common::take_exception_message(napi), "bad thing");
  }
}

#[test]
fn last_error_is_stable_until_the_next_call() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let value = common::string(napi, "not a number");
    let mut number = 0.0;
    assert_eq!(
      napi_get_value_double(napi, value, &mut number),
      napi_number_expected
    );
    let first = common::last_error(napi);
    let second = common::last_error(napi);
    assert_eq!(first, second);
    assert_eq!(first.error_code, napi_number_expected);
    assert!(!first.error_message.is_null());
    assert_eq!(
      CStr::from_ptr(first.error_message).to_str().unwrap(),
      "A number was expected"
    );

    common::number(napi, 1.0);
    let cleared = common::last_error(napi);
    assert_eq!(cleared.error_code, napi_ok);
    assert!(cleared.error_message.is_null());
  }
}

#[test]
fn null_arguments_are_invalid() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    assert_eq!(napi_create_object(napi, ptr::null_mut()), napi_invalid_arg);
    assert_eq!(common::last_error(napi).error_code, napi_invalid_arg);
    let mut value = ptr::null_mut();
    assert_eq!(
      napi_create_object(ptr::null_mut(), &mut value),
      napi_invalid_arg
    );
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::ptr;

use napi_shim::*;
use pretty_assertions::assert_eq;

#[test]
fn number_conversions() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let big = common::number(napi, 4294967297.5);
    let mut int32 = 0;
    assert_napi_ok!(napi_get_value_int32(napi, big, &mut int32));
    assert_eq!(int32, 1);

    let negative = common::number(napi, -1.0);
    let mut uint32 = 0;
    assert_napi_ok!(napi_get_value_uint32(napi, negative, &mut uint32));
    assert_eq!(uint32, u32::MAX);

    let nan = common::number(napi, f64::NAN);
    let mut int64 = 7;
    assert_napi_ok!(napi_get_value_int64(napi, nan, &mut int64));
    assert_eq!(int64, 0);

    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_create_int64(napi, -(1 << 40), &mut value));
    assert_napi_ok!(napi_get_value_int64(napi, value, &mut int64));
    assert_eq!(int64, -(1 << 40));

    let mut flag = false;
    assert_eq!(
      napi_get_value_bool(napi, value, &mut flag),
      napi_boolean_expected
    );
  }
}

#[test]
fn coercions() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut result = ptr::null_mut();
    assert_napi_ok!(napi_coerce_to_string(
      napi,
      common::number(napi, 1.5),
      &mut result,
    ));
    assert_eq!(common::read_string(napi, result), "1.5");

    assert_napi_ok!(napi_coerce_to_number(
      napi,
      common::string(napi, "12"),
      &mut result,
    ));
    assert_eq!(common::read_number(napi, result), 12.0);

    assert_napi_ok!(napi_coerce_to_bool(
      napi,
      common::string(napi, ""),
      &mut result,
    ));
    let mut flag = true;
    assert_napi_ok!(napi_get_value_bool(napi, result, &mut flag));
    assert!(!flag);

    assert_napi_ok!(napi_coerce_to_object(
      napi,
      common::string(napi, "boxed"),
      &mut result,
    ));
    assert_eq!(common::typeof_value(napi, result), napi_object);
  }
}

#[test]
fn arrays_start_null_filled() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut array = ptr::null_mut();
    assert_napi_ok!(napi_create_array_with_length(napi, 3, &mut array));
    let mut is_array = false;
    assert_napi_ok!(napi_is_array(napi, array, &mut is_array));
    assert!(is_array);
    let mut length = 0;
    assert_napi_ok!(napi_get_array_length(napi, array, &mut length));
    assert_eq!(length, 3);

    let mut element = ptr::null_mut();
    assert_napi_ok!(napi_get_element(napi, array, 1, &mut element));
    assert_eq!(common::typeof_value(napi, element), napi_null);

    let two = common::number(napi, 2.0);
    assert_napi_ok!(napi_set_element(napi, array, 4, two));
    assert_napi_ok!(napi_get_array_length(napi, array, &mut length));
    assert_eq!(length, 5);

    let mut deleted = false;
    assert_napi_ok!(napi_delete_element(napi, array, 4, &mut deleted));
    assert!(deleted);
    assert_napi_ok!(napi_get_element(napi, array, 4, &mut element));
    assert_eq!(common::typeof_value(napi, element), napi_undefined);
    let mut has = true;
    assert_napi_ok!(napi_has_element(napi, array, 10, &mut has));
    assert!(!has);

    let object = common::object(napi);
    assert_eq!(
      napi_get_array_length(napi, object, &mut length),
      napi_array_expected
    );
  }
}

#[test]
fn properties_and_keys() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let object = common::object(napi);
    common::set_named(napi, object, "a", common::number(napi, 1.0));
    common::set_named(napi, object, "b", common::number(napi, 2.0));

    let fixed = [napi_property_descriptor {
      utf8name: c"fixed".as_ptr(),
      name: ptr::null_mut(),
      method: None,
      getter: None,
      setter: None,
      value: common::number(napi, 9.0),
      attributes: napi_default,
      data: ptr::null_mut(),
    }];
    assert_napi_ok!(napi_define_properties(napi, object, 1, fixed.as_ptr()));

    let mut names = ptr::null_mut();
    assert_napi_ok!(napi_get_property_names(napi, object, &mut names));
    let mut length = 0;
    assert_napi_ok!(napi_get_array_length(napi, names, &mut length));
    assert_eq!(length, 2);
    let mut first = ptr::null_mut();
    assert_napi_ok!(napi_get_element(napi, names, 0, &mut first));
    assert_eq!(common::read_string(napi, first), "a");

    let key = common::string(napi, "fixed");
    let mut own = false;
    assert_napi_ok!(napi_has_own_property(napi, object, key, &mut own));
    assert!(own);
    let value = common::get_named(napi, object, "fixed");
    assert_eq!(common::read_number(napi, value), 9.0);

    let key = common::string(napi, "a");
    let mut deleted = false;
    assert_napi_ok!(napi_delete_property(napi, object, key, &mut deleted));
    assert!(deleted);
    let mut has = true;
    assert_napi_ok!(napi_has_property(napi, object, key, &mut has));
    assert!(!has);

    let number = common::number(napi, 1.0);
    assert_eq!(
      napi_has_own_property(napi, object, number, &mut own),
      napi_name_expected
    );
  }
}

#[test]
fn type_checks() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_get_null(napi, &mut value));
    assert_eq!(common::typeof_value(napi, value), napi_null);
    assert_napi_ok!(napi_get_boolean(napi, true, &mut value));
    assert_eq!(common::typeof_value(napi, value), napi_boolean);

    let description = common::string(napi, "tag");
    assert_napi_ok!(napi_create_symbol(napi, description, &mut value));
    assert_eq!(common::typeof_value(napi, value), napi_symbol);

    let message = common::string(napi, "oops");
    let mut error = ptr::null_mut();
    assert_napi_ok!(napi_create_range_error(
      napi,
      ptr::null_mut(),
      message,
      &mut error,
    ));
    let mut is_error = false;
    assert_napi_ok!(napi_is_error(napi, error, &mut is_error));
    assert!(is_error);

    let object = common::object(napi);
    let mut prototype = ptr::null_mut();
    assert_napi_ok!(napi_get_prototype(napi, object, &mut prototype));
    let (_, object_prototype) =
      common::run_script(napi, "Object.prototype");
    let mut same = false;
    assert_napi_ok!(napi_strict_equals(
      napi,
      prototype,
      object_prototype,
      &mut same,
    ));
    assert!(same);
  }
}

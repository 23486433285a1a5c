// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;

use napi_shim::*;
use pretty_assertions::assert_eq;

struct Point {
  x: f64,
  y: f64,
}

unsafe extern "C" fn drop_point(
  _env: napi_env,
  data: *mut c_void,
  _hint: *mut c_void,
) {
  drop(unsafe { Box::from_raw(data as *mut Point) });
}

unsafe fn point<'a>(env: napi_env, this: napi_value) -> &'a mut Point {
  let mut data = ptr::null_mut();
  assert_napi_ok!(napi_unwrap(env, this, &mut data));
  unsafe { &mut *(data as *mut Point) }
}

unsafe extern "C" fn point_new(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let (args, argc, this) = get_callback_info!(env, info, 2);
  assert_eq!(argc, 2);
  let point = Box::new(Point {
    x: unsafe { common::read_number(env, args[0]) },
    y: unsafe { common::read_number(env, args[1]) },
  });
  assert_napi_ok!(napi_wrap(
    env,
    this,
    Box::into_raw(point) as *mut c_void,
    Some(drop_point),
    ptr::null_mut(),
    ptr::null_mut(),
  ));
  this
}

unsafe extern "C" fn point_length(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let (_, _, this) = get_callback_info!(env, info, 0);
  let point = unsafe { point(env, this) };
  unsafe { common::number(env, point.x.hypot(point.y)) }
}

unsafe extern "C" fn point_get_x(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let (_, _, this) = get_callback_info!(env, info, 0);
  let point = unsafe { point(env, this) };
  unsafe { common::number(env, point.x) }
}

unsafe extern "C" fn point_set_x(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let (args, argc, this) = get_callback_info!(env, info, 1);
  assert_eq!(argc, 1);
  let x = unsafe { common::read_number(env, args[0]) };
  unsafe { point(env, this) }.x = x;
  ptr::null_mut()
}

unsafe extern "C" fn point_origin(
  env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  unsafe { common::number(env, 0.0) }
}

fn accessor(
  name: &'static std::ffi::CStr,
  getter: napi_callback,
  setter: napi_callback,
) -> napi_property_descriptor {
  napi_property_descriptor {
    utf8name: name.as_ptr(),
    name: ptr::null_mut(),
    method: None,
    getter,
    setter,
    value: ptr::null_mut(),
    attributes: napi_default_jsproperty,
    data: ptr::null_mut(),
  }
}

unsafe fn define_point(env: napi_env) -> napi_value {
  let mut origin = new_property!(c"origin", point_origin);
  origin.attributes |= napi_static;
  let properties = [
    new_property!(c"length", point_length),
    accessor(c"x", Some(point_get_x), Some(point_set_x)),
    origin,
  ];
  let mut constructor = ptr::null_mut();
  assert_napi_ok!(napi_define_class(
    env,
    c"Point".as_ptr(),
    NAPI_AUTO_LENGTH,
    Some(point_new),
    ptr::null_mut(),
    properties.len(),
    properties.as_ptr(),
    &mut constructor,
  ));
  constructor
}

unsafe fn new_point(
  env: napi_env,
  constructor: napi_value,
  x: f64,
  y: f64,
) -> napi_value {
  let args = unsafe { [common::number(env, x), common::number(env, y)] };
  let mut instance = ptr::null_mut();
  assert_napi_ok!(napi_new_instance(
    env,
    constructor,
    args.len(),
    args.as_ptr(),
    &mut instance,
  ));
  instance
}

#[test]
fn point_methods_and_accessors() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let constructor = define_point(napi);
    let instance = new_point(napi, constructor, 3.0, 4.0);

    let length = common::get_named(napi, instance, "length");
    let (status, result) = common::call(napi, instance, length, &[]);
    assert_eq!(status, napi_ok);
    assert_eq!(common::read_number(napi, result), 5.0);

    common::set_named(napi, instance, "x", common::number(napi, 10.0));
    let x = common::get_named(napi, instance, "x");
    assert_eq!(common::read_number(napi, x), 10.0);

    let mut is_instance = false;
    assert_napi_ok!(napi_instanceof(
      napi,
      instance,
      constructor,
      &mut is_instance,
    ));
    assert!(is_instance);

    let origin = common::get_named(napi, constructor, "origin");
    let (status, result) = common::call(napi, constructor, origin, &[]);
    assert_eq!(status, napi_ok);
    assert_eq!(common::read_number(napi, result), 0.0);
  }
}

#[test]
fn classes_are_usable_from_script() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    define_point(napi);
    let (status, _) = common::run_script(napi, "var p = new Point(6, 8)");
    assert_eq!(status, napi_ok);
    let (status, length) = common::run_script(napi, "p.length()");
    assert_eq!(status, napi_ok);
    assert_eq!(common::read_number(napi, length), 10.0);

    let (status, _) = common::run_script(napi, "Point(1, 2)");
    assert_eq!(status, napi_pending_exception);
    assert!(common::is_exception_pending(napi));
    let mut error = ptr::null_mut();
    assert_napi_ok!(napi_get_and_clear_last_exception(napi, &mut error));
    let mut is_error = false;
    assert_napi_ok!(napi_is_error(napi, error, &mut is_error));
    assert!(is_error);
  }
}

#[test]
fn class_globals_can_be_disabled() {
  let mut env =
    common::env_with(EnvOptions::new().install_class_globals(false));
  let napi = env.as_napi();
  unsafe {
    define_point(napi);
    let global = common::global(napi);
    let mut has = true;
    assert_napi_ok!(napi_has_named_property(
      napi,
      global,
      c"Point".as_ptr(),
      &mut has,
    ));
    assert!(!has);
  }
}

#[test]
fn methods_check_their_receiver() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let constructor = define_point(napi);
    let instance = new_point(napi, constructor, 1.0, 1.0);
    let length = common::get_named(napi, instance, "length");
    let stranger = common::object(napi);
    let (status, _) = common::call(napi, stranger, length, &[]);
    assert_eq!(status, napi_pending_exception);
    assert_eq!(
      common::take_exception_message(napi),
      "function table not found"
    );
  }
}

unsafe extern "C" fn reading_new(
  _env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  ptr::null_mut()
}

unsafe extern "C" fn reading_get(
  env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  unsafe { common::number(env, 21.0) }
}

unsafe extern "C" fn reading_set(
  _env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  ptr::null_mut()
}

#[test]
fn one_sided_accessors_fail_on_the_missing_side() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let properties = [
      accessor(c"value", Some(reading_get), None),
      accessor(c"sink", None, Some(reading_set)),
    ];
    let mut constructor = ptr::null_mut();
    assert_napi_ok!(napi_define_class(
      napi,
      c"Reading".as_ptr(),
      NAPI_AUTO_LENGTH,
      Some(reading_new),
      ptr::null_mut(),
      properties.len(),
      properties.as_ptr(),
      &mut constructor,
    ));
    let mut instance = ptr::null_mut();
    assert_napi_ok!(napi_new_instance(
      napi,
      constructor,
      0,
      ptr::null(),
      &mut instance,
    ));

    let value = common::get_named(napi, instance, "value");
    assert_eq!(common::read_number(napi, value), 21.0);
    let one = common::number(napi, 1.0);
    assert_eq!(
      napi_set_named_property(napi, instance, c"value".as_ptr(), one),
      napi_pending_exception
    );
    assert_eq!(
      common::take_exception_message(napi),
      "no setter registered for property 'value'"
    );

    common::set_named(napi, instance, "sink", one);
    let mut result = ptr::null_mut();
    assert_eq!(
      napi_get_named_property(napi, instance, c"sink".as_ptr(), &mut result),
      napi_pending_exception
    );
    assert_eq!(
      common::take_exception_message(napi),
      "no getter registered for property 'sink'"
    );
  }
}

unsafe extern "C" fn numbered(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let mut data = ptr::null_mut();
  assert_napi_ok!(napi_get_cb_info(
    env,
    info,
    ptr::null_mut(),
    ptr::null_mut(),
    ptr::null_mut(),
    &mut data,
  ));
  unsafe { common::number(env, data as usize as f64) }
}

unsafe fn define_numbered(
  env: napi_env,
  names: &[CString],
) -> (napi_status, napi_value) {
  let properties: Vec<napi_property_descriptor> = names
    .iter()
    .enumerate()
    .map(|(index, name)| {
      let mut property = new_property!(name, numbered);
      property.data = index as *mut c_void;
      property
    })
    .collect();
  let mut constructor = ptr::null_mut();
  let status = unsafe {
    napi_define_class(
      env,
      c"Numbered".as_ptr(),
      NAPI_AUTO_LENGTH,
      Some(reading_new),
      ptr::null_mut(),
      properties.len(),
      properties.as_ptr(),
      &mut constructor,
    )
  };
  (status, constructor)
}

#[test]
fn method_ceiling_boundary() {
  const MAX: usize = 70;
  let mut env = common::env_with(EnvOptions::new().max_class_methods(MAX));
  let napi = env.as_napi();
  let names: Vec<CString> = (0..=MAX)
    .map(|index| CString::new(format!("m{index}")).unwrap())
    .collect();
  unsafe {
    let (status, _) = define_numbered(napi, &names);
    assert_eq!(status, napi_invalid_arg);
    assert_eq!(common::last_error(napi).error_code, napi_invalid_arg);

    let (status, constructor) = define_numbered(napi, &names[..MAX]);
    assert_eq!(status, napi_ok);
    let mut instance = ptr::null_mut();
    assert_napi_ok!(napi_new_instance(
      napi,
      constructor,
      0,
      ptr::null(),
      &mut instance,
    ));
    for (index, name) in names[..MAX].iter().enumerate() {
      let method = common::get_named(napi, instance, name.to_str().unwrap());
      let (status, result) = common::call(napi, instance, method, &[]);
      assert_eq!(status, napi_ok);
      assert_eq!(common::read_number(napi, result), index as f64);
    }
  }
}

#[test]
fn null_constructor_callback_throws() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut constructor = ptr::null_mut();
    assert_napi_ok!(napi_define_class(
      napi,
      c"Hollow".as_ptr(),
      NAPI_AUTO_LENGTH,
      None,
      ptr::null_mut(),
      0,
      ptr::null(),
      &mut constructor,
    ));
    let mut instance = ptr::null_mut();
    assert_eq!(
      napi_new_instance(napi, constructor, 0, ptr::null(), &mut instance),
      napi_pending_exception
    );
    assert_eq!(
      common::take_exception_message(napi),
      "constructor callback is null"
    );
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use napi_shim::*;
use pretty_assertions::assert_eq;

static CLEANUP_ORDER: Mutex<Vec<usize>> = Mutex::new(Vec::new());

unsafe extern "C" fn record_cleanup(arg: *mut c_void) {
  CLEANUP_ORDER.lock().unwrap().push(arg as usize);
}

#[test]
fn cleanup_hooks_run_in_reverse() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    for arg in 1..=3usize {
      assert_napi_ok!(napi_add_env_cleanup_hook(
        napi,
        Some(record_cleanup),
        arg as *mut c_void,
      ));
    }
    assert_eq!(
      napi_add_env_cleanup_hook(napi, Some(record_cleanup), 1 as *mut c_void),
      napi_invalid_arg
    );
    assert_eq!(
      napi_remove_env_cleanup_hook(
        napi,
        Some(record_cleanup),
        9 as *mut c_void,
      ),
      napi_invalid_arg
    );
    assert_napi_ok!(napi_remove_env_cleanup_hook(
      napi,
      Some(record_cleanup),
      2 as *mut c_void,
    ));
  }
  assert!(CLEANUP_ORDER.lock().unwrap().is_empty());
  drop(env);
  assert_eq!(*CLEANUP_ORDER.lock().unwrap(), vec![3, 1]);
}

static INSTANCE_FINALIZED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn finalize_instance(
  _env: napi_env,
  data: *mut c_void,
  hint: *mut c_void,
) {
  assert_eq!(hint as usize, 0x2);
  drop(unsafe { Box::from_raw(data as *mut String) });
  INSTANCE_FINALIZED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn instance_data_is_finalized_on_teardown() {
  let mut env = common::env();
  let napi = env.as_napi();
  let data = Box::into_raw(Box::new(String::from("addon state")));
  unsafe {
    let mut current = 1 as *mut c_void;
    assert_napi_ok!(napi_get_instance_data(napi, &mut current));
    assert!(current.is_null());

    assert_napi_ok!(napi_set_instance_data(
      napi,
      data as *mut c_void,
      Some(finalize_instance),
      0x2 as *mut c_void,
    ));
    assert_napi_ok!(napi_get_instance_data(napi, &mut current));
    assert_eq!(current, data as *mut c_void);
    assert_eq!(*(current as *const String), "addon state");
  }
  assert_eq!(INSTANCE_FINALIZED.load(Ordering::SeqCst), 0);
  drop(env);
  assert_eq!(INSTANCE_FINALIZED.load(Ordering::SeqCst), 1);
}

#[test]
fn module_filename_and_version() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut filename = 1 as *const c_char;
    assert_napi_ok!(node_api_get_module_file_name(napi, &mut filename));
    assert!(filename.is_null());

    let mut version = 0;
    assert_napi_ok!(napi_get_version(napi, &mut version));
    assert_eq!(version, NAPI_VERSION);
  }

  let config = EnvConfig::from_json(
    r#"{ "moduleFilename": "file:///opt/addon.node" }"#,
  )
  .unwrap();
  let mut env = common::env_with(EnvOptions::new().config(config));
  let napi = env.as_napi();
  unsafe {
    let mut filename = ptr::null();
    assert_napi_ok!(node_api_get_module_file_name(napi, &mut filename));
    assert_eq!(
      CStr::from_ptr(filename).to_str().unwrap(),
      "file:///opt/addon.node"
    );
  }
}

#[test]
fn handle_scopes_nest() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let mut outer = ptr::null_mut();
    assert_napi_ok!(napi_open_handle_scope(napi, &mut outer));
    let mut inner = ptr::null_mut();
    assert_napi_ok!(napi_open_escapable_handle_scope(napi, &mut inner));

    assert_eq!(
      napi_close_handle_scope(napi, outer),
      napi_handle_scope_mismatch
    );

    let value = common::number(napi, 3.0);
    let mut escaped = ptr::null_mut();
    assert_napi_ok!(napi_escape_handle(napi, inner, value, &mut escaped));
    assert_eq!(common::read_number(napi, escaped), 3.0);
    assert_eq!(
      napi_escape_handle(napi, inner, value, &mut escaped),
      napi_escape_called_twice
    );

    assert_napi_ok!(napi_close_escapable_handle_scope(napi, inner));
    assert_napi_ok!(napi_close_handle_scope(napi, outer));
  }
}

#[test]
fn class_limit_from_config() {
  let config = EnvConfig::from_json(
    r#"{ "maxClassMethods": 0, "installClassGlobals": false }"#,
  )
  .unwrap();
  assert_eq!(config.max_class_methods, Some(0));
  let env = common::env_with(EnvOptions::new().config(config.clone()));
  assert_eq!(env.config(), &config);
}

// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use napi_shim::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn protects_once_per_zero_crossing() {
  let mut env = common::env();
  let napi = env.as_napi();
  let before = common::stats(&env);
  unsafe {
    let object = common::object(napi);
    let mut reference = ptr::null_mut();
    assert_napi_ok!(napi_create_reference(napi, object, 0, &mut reference));
    let mut count = 0;
    for expected in 1..=4 {
      assert_napi_ok!(napi_reference_ref(napi, reference, &mut count));
      assert_eq!(count, expected);
    }
    for expected in (0..4).rev() {
      assert_napi_ok!(napi_reference_unref(napi, reference, &mut count));
      assert_eq!(count, expected);
    }
    assert_napi_ok!(napi_delete_reference(napi, reference));
  }
  let after = common::stats(&env);
  assert_eq!(after.protects - before.protects, 1);
  assert_eq!(after.unprotects - before.unprotects, 1);
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(32))]

  #[test]
  fn unref_to_zero_releases_exactly_once(initial in 1u32..24) {
    let mut env = common::env();
    let napi = env.as_napi();
    let before = common::stats(&env);
    let mut reference = ptr::null_mut();
    unsafe {
      let object = common::object(napi);
      assert_napi_ok!(
        napi_create_reference(napi, object, initial, &mut reference)
      );
      let mut count = u32::MAX;
      for _ in 0..initial {
        assert_napi_ok!(napi_reference_unref(napi, reference, &mut count));
      }
      prop_assert_eq!(count, 0);
    }
    let after = common::stats(&env);
    prop_assert_eq!(after.protects - before.protects, 1);
    prop_assert_eq!(after.unprotects - before.unprotects, 1);
  }
}

#[test]
fn unref_at_zero_is_a_generic_failure() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let object = common::object(napi);
    let mut reference = ptr::null_mut();
    assert_napi_ok!(napi_create_reference(napi, object, 1, &mut reference));
    assert_napi_ok!(napi_reference_unref(napi, reference, ptr::null_mut()));
    assert_eq!(
      napi_reference_unref(napi, reference, ptr::null_mut()),
      napi_generic_failure
    );
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_get_reference_value(napi, reference, &mut value));
    assert!(value.is_null());
  }
}

#[test]
fn deleted_references_are_rejected() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let object = common::object(napi);
    let mut reference = ptr::null_mut();
    assert_napi_ok!(napi_create_reference(napi, object, 2, &mut reference));
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_get_reference_value(napi, reference, &mut value));
    assert_eq!(value, object);
    assert_napi_ok!(napi_delete_reference(napi, reference));
    assert_eq!(napi_delete_reference(napi, reference), napi_invalid_arg);
    assert_eq!(
      napi_reference_ref(napi, reference, ptr::null_mut()),
      napi_invalid_arg
    );
  }
}

static WRAP_FINALIZED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn count_wrap_finalize(
  _env: napi_env,
  data: *mut c_void,
  _hint: *mut c_void,
) {
  drop(unsafe { Box::from_raw(data as *mut u64) });
  WRAP_FINALIZED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn wrap_unwrap_and_finalize() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let object = common::object(napi);
    let data = Box::into_raw(Box::new(7u64)) as *mut c_void;
    assert_napi_ok!(napi_wrap(
      napi,
      object,
      data,
      Some(count_wrap_finalize),
      ptr::null_mut(),
      ptr::null_mut(),
    ));
    assert_eq!(
      napi_wrap(
        napi,
        object,
        data,
        None,
        ptr::null_mut(),
        ptr::null_mut(),
      ),
      napi_invalid_arg
    );
    let mut unwrapped = ptr::null_mut();
    assert_napi_ok!(napi_unwrap(napi, object, &mut unwrapped));
    assert_eq!(unwrapped, data);
    assert_eq!(*(unwrapped as *const u64), 7);
  }
  env.engine().collect_garbage();
  assert_eq!(WRAP_FINALIZED.load(Ordering::SeqCst), 1);
  assert_eq!(common::stats(&env).finalizers_run, 1);
}

static REMOVED_FINALIZED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn count_removed_finalize(
  _env: napi_env,
  _data: *mut c_void,
  _hint: *mut c_void,
) {
  REMOVED_FINALIZED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn remove_wrap_disarms_the_finalizer() {
  let mut env = common::env();
  let napi = env.as_napi();
  let mut data = 11u32;
  let data_ptr = &mut data as *mut u32 as *mut c_void;
  unsafe {
    let object = common::object(napi);
    assert_napi_ok!(napi_wrap(
      napi,
      object,
      data_ptr,
      Some(count_removed_finalize),
      ptr::null_mut(),
      ptr::null_mut(),
    ));
    let mut removed = ptr::null_mut();
    assert_napi_ok!(napi_remove_wrap(napi, object, &mut removed));
    assert_eq!(removed, data_ptr);
    let mut unwrapped = ptr::null_mut();
    assert_eq!(napi_unwrap(napi, object, &mut unwrapped), napi_invalid_arg);
  }
  env.engine().collect_garbage();
  assert_eq!(REMOVED_FINALIZED.load(Ordering::SeqCst), 0);
}

static EXTERNAL_FINALIZED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn count_external_finalize(
  _env: napi_env,
  _data: *mut c_void,
  hint: *mut c_void,
) {
  assert_eq!(hint as usize, 0x5);
  EXTERNAL_FINALIZED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn externals_keep_their_pointer() {
  let mut env = common::env();
  let napi = env.as_napi();
  let marker = 0xfeed_usize as *mut c_void;
  unsafe {
    let mut external = ptr::null_mut();
    assert_napi_ok!(napi_create_external(
      napi,
      marker,
      Some(count_external_finalize),
      0x5 as *mut c_void,
      &mut external,
    ));
    assert_eq!(common::typeof_value(napi, external), napi_external);
    let mut data = ptr::null_mut();
    assert_napi_ok!(napi_get_value_external(napi, external, &mut data));
    assert_eq!(data, marker);
  }
  drop(env);
  assert_eq!(EXTERNAL_FINALIZED.load(Ordering::SeqCst), 1);
}

#[test]
fn strong_references_survive_collection() {
  let mut env = common::env();
  let napi = env.as_napi();
  let mut reference = ptr::null_mut();
  unsafe {
    let object = common::object(napi);
    common::set_named(napi, object, "kept", common::number(napi, 1.5));
    assert_napi_ok!(napi_create_reference(napi, object, 1, &mut reference));
  }
  env.engine().collect_garbage();
  unsafe {
    let mut value = ptr::null_mut();
    assert_napi_ok!(napi_get_reference_value(napi, reference, &mut value));
    let kept = common::get_named(napi, value, "kept");
    assert_eq!(common::read_number(napi, kept), 1.5);
  }
}

#[test]
fn weak_reference_does_not_revive_a_reused_slot() {
  let mut env = common::env();
  let napi = env.as_napi();
  let mut reference = ptr::null_mut();
  let mut wrap_reference = ptr::null_mut();
  unsafe {
    let object = common::object(napi);
    common::set_named(napi, object, "tag", common::string(napi, "A"));
    assert_napi_ok!(napi_create_reference(napi, object, 0, &mut reference));

    let wrapped = common::object(napi);
    assert_napi_ok!(napi_wrap(
      napi,
      wrapped,
      ptr::null_mut(),
      None,
      ptr::null_mut(),
      &mut wrap_reference,
    ));
  }
  env.engine().collect_garbage();
  let before = common::stats(&env);
  unsafe {
    for index in 0..8 {
      let filler = common::object(napi);
      let index = common::number(napi, index as f64);
      common::set_named(napi, filler, "index", index);
      common::string(napi, "filler");
    }
    for weak in [reference, wrap_reference] {
      let mut count = 0;
      assert_napi_ok!(napi_reference_ref(napi, weak, &mut count));
      assert_eq!(count, 1);
      let mut value = ptr::null_mut();
      assert_napi_ok!(napi_get_reference_value(napi, weak, &mut value));
      assert!(value.is_null());
      assert_napi_ok!(napi_reference_unref(napi, weak, &mut count));
      assert_eq!(count, 0);
      assert_napi_ok!(napi_delete_reference(napi, weak));
    }
  }
  let after = common::stats(&env);
  assert_eq!(after.protects, before.protects);
  assert_eq!(after.unprotects, before.unprotects);
}

// Copyright 2018-2026 the Deno authors. MIT license.

#[macro_use]
mod common;

use std::ptr;
use std::sync::Arc;
use std::sync::Mutex;

use napi_shim::engine::local::PromiseStatus;
use napi_shim::*;
use pretty_assertions::assert_eq;

unsafe fn create_promise(env: napi_env) -> (napi_deferred, napi_value) {
  let mut deferred = ptr::null_mut();
  let mut promise = ptr::null_mut();
  assert_napi_ok!(napi_create_promise(env, &mut deferred, &mut promise));
  (deferred, promise)
}

fn status(env: &Env, promise: napi_value) -> PromiseStatus {
  let promise = RawValue::from_napi(promise).unwrap();
  common::local(env).promise_state(promise).unwrap()
}

#[test]
fn deferred_settles_once() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let (deferred, promise) = create_promise(napi);
    let mut is_promise = false;
    assert_napi_ok!(napi_is_promise(napi, promise, &mut is_promise));
    assert!(is_promise);
    assert_eq!(status(&env, promise), PromiseStatus::Pending);

    let answer = common::number(napi, 42.0);
    assert_napi_ok!(napi_resolve_deferred(napi, deferred, answer));
    match status(&env, promise) {
      PromiseStatus::Fulfilled(value) => {
        assert_eq!(common::read_number(napi, value.into_napi()), 42.0);
      }
      other => panic!("unexpected promise state {other:?}"),
    }

    let error = common::string(napi, "late");
    assert_eq!(
      napi_reject_deferred(napi, deferred, error),
      napi_invalid_arg
    );
  }
}

#[test]
fn rejection_reaches_the_promise() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let (deferred, promise) = create_promise(napi);
    let reason = common::string(napi, "nope");
    assert_napi_ok!(napi_reject_deferred(napi, deferred, reason));
    match status(&env, promise) {
      PromiseStatus::Rejected(value) => {
        assert_eq!(common::read_string(napi, value.into_napi()), "nope");
      }
      other => panic!("unexpected promise state {other:?}"),
    }

    let object = common::object(napi);
    let mut is_promise = true;
    assert_napi_ok!(napi_is_promise(napi, object, &mut is_promise));
    assert!(!is_promise);
  }
}

static QUEUED_ORDER: Mutex<Vec<(&str, f64)>> = Mutex::new(Vec::new());

unsafe extern "C" fn queued_first(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let (args, _, _) = get_callback_info!(env, info, 1);
  let value = unsafe { common::read_number(env, args[0]) };
  QUEUED_ORDER.lock().unwrap().push(("first", value));
  ptr::null_mut()
}

unsafe extern "C" fn queued_second(
  env: napi_env,
  info: napi_callback_info,
) -> napi_value {
  let (args, _, _) = get_callback_info!(env, info, 1);
  let value = unsafe { common::read_number(env, args[0]) };
  QUEUED_ORDER.lock().unwrap().push(("second", value));
  ptr::null_mut()
}

unsafe fn install_function(env: napi_env, name: &str, cb: napi_callback) {
  let mut function = ptr::null_mut();
  assert_napi_ok!(napi_create_function(
    env,
    name.as_ptr() as *const c_char,
    name.len(),
    cb,
    ptr::null_mut(),
    &mut function,
  ));
  unsafe { common::set_named(env, common::global(env), name, function) };
}

/// Registers two reactions on a global `p` and returns its deferred.
unsafe fn chain_two(
  env: napi_env,
  first: napi_callback,
  second: napi_callback,
) -> napi_deferred {
  unsafe {
    let (deferred, promise) = create_promise(env);
    common::set_named(env, common::global(env), "p", promise);
    install_function(env, "first", first);
    install_function(env, "second", second);
    assert_eq!(common::run_script(env, "p.then(first)").0, napi_ok);
    assert_eq!(common::run_script(env, "p.then(second)").0, napi_ok);
    deferred
  }
}

#[test]
fn queued_continuations_run_in_order() {
  let mut env = common::env();
  let napi = env.as_napi();
  unsafe {
    let deferred =
      chain_two(napi, Some(queued_first), Some(queued_second));
    assert_napi_ok!(napi_resolve_deferred(
      napi,
      deferred,
      common::number(napi, 7.0),
    ));
  }
  assert!(QUEUED_ORDER.lock().unwrap().is_empty());
  assert_eq!(env.run_pending_continuations(), 2);
  assert_eq!(
    *QUEUED_ORDER.lock().unwrap(),
    vec![("first", 7.0), ("second", 7.0)]
  );
  assert_eq!(env.run_pending_continuations(), 0);
}

static DISPATCHED_ORDER: Mutex<Vec<&str>> = Mutex::new(Vec::new());

unsafe extern "C" fn dispatched_first(
  _env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  DISPATCHED_ORDER.lock().unwrap().push("first");
  ptr::null_mut()
}

unsafe extern "C" fn dispatched_second(
  _env: napi_env,
  _info: napi_callback_info,
) -> napi_value {
  DISPATCHED_ORDER.lock().unwrap().push("second");
  ptr::null_mut()
}

#[test]
fn dispatcher_receives_continuations_in_order() {
  let inbox: Arc<Mutex<Vec<PendingContinuation>>> = Arc::default();
  let sink = inbox.clone();
  let options = EnvOptions::new().script_thread_dispatcher(Arc::new(
    move |pending| sink.lock().unwrap().push(pending),
  ));
  let mut env = common::env_with(options);
  let napi = env.as_napi();
  let before = common::stats(&env);
  unsafe {
    let deferred =
      chain_two(napi, Some(dispatched_first), Some(dispatched_second));
    assert_napi_ok!(napi_resolve_deferred(
      napi,
      deferred,
      common::number(napi, 1.0),
    ));
  }
  let pending: Vec<PendingContinuation> =
    inbox.lock().unwrap().drain(..).collect();
  assert_eq!(pending.len(), 2);
  assert!(DISPATCHED_ORDER.lock().unwrap().is_empty());
  for continuation in pending {
    unsafe { continuation.run() }.unwrap();
  }
  assert_eq!(*DISPATCHED_ORDER.lock().unwrap(), vec!["first", "second"]);
  // Nothing went through the internal queue.
  assert_eq!(env.run_pending_continuations(), 0);

  let after = common::stats(&env);
  assert_eq!(
    after.protects - before.protects,
    after.unprotects - before.unprotects,
    "every dispatched task is released after it runs"
  );
}

// Copyright 2018-2026 the Deno authors. MIT license.

use std::os::raw::c_void;

use crate::Env;
use crate::Error;
use crate::engine::ErrorKind;
use crate::engine::Invocation;
use crate::engine::NativeFunction;
use crate::napi_value;
use crate::value::RawValue;

/// What `napi_get_cb_info` and `napi_get_new_target` read from. Lives on
/// the trampoline's stack for the duration of one callback.
#[repr(C)]
#[derive(Debug)]
pub struct CallbackInfo {
  pub env: *mut Env,
  pub this: napi_value,
  pub args: *const napi_value,
  pub argc: usize,
  pub new_target: napi_value,
  pub data: *mut c_void,
}

pub(crate) type Callback = unsafe extern "C" fn(
  env: *mut Env,
  info: crate::napi_callback_info,
) -> napi_value;

pub(crate) struct FunctionRecord {
  env: *mut Env,
  cb: Callback,
  data: *mut c_void,
}

/// Calls `cb` the way N-API callbacks expect to be called.
///
/// # Safety
///
/// `env` must be the live environment `cb` was registered with.
pub(crate) unsafe fn invoke_callback(
  env: *mut Env,
  cb: Callback,
  data: *mut c_void,
  this: RawValue,
  args: &[RawValue],
  new_target: Option<RawValue>,
) -> Option<RawValue> {
  let mut info = CallbackInfo {
    env,
    this: this.into_napi(),
    // `RawValue` is a transparent wrapper over `napi_value`.
    args: args.as_ptr() as *const napi_value,
    argc: args.len(),
    new_target: new_target.map_or(std::ptr::null_mut(), RawValue::into_napi),
    data,
  };
  let info_ptr = &mut info as *mut CallbackInfo as crate::napi_callback_info;
  // SAFETY: upheld by the caller.
  let result = unsafe { cb(env, info_ptr) };
  RawValue::from_napi(result)
}

unsafe fn call_native_function(
  data: *mut c_void,
  invocation: &Invocation,
) -> Option<RawValue> {
  // SAFETY: `data` is the boxed record registered in `create_function`.
  let record = unsafe { &*(data as *const FunctionRecord) };
  unsafe {
    invoke_callback(
      record.env,
      record.cb,
      record.data,
      invocation.this,
      invocation.args,
      invocation.new_target,
    )
  }
}

/// Registers `cb` with the environment and returns the engine-side entry
/// that calls it. The registration lives as long as the environment.
pub(crate) fn register(
  env: &mut Env,
  cb: Callback,
  data: *mut c_void,
) -> NativeFunction {
  let record = Box::new(FunctionRecord {
    env: env as *mut Env,
    cb,
    data,
  });
  let function = NativeFunction {
    entry: call_native_function,
    data: &*record as *const FunctionRecord as *mut c_void,
  };
  env.functions.push(record);
  function
}

/// Creates a JavaScript function that calls `cb`.
pub(crate) fn create_function(
  env: &mut Env,
  name: &str,
  cb: Callback,
  data: *mut c_void,
) -> Result<RawValue, Error> {
  let function = register(env, cb, data);
  Ok(env.engine().create_function(name, function)?)
}

/// Throws a plain `Error` describing a failed dispatch. Used where there is
/// no status to return to native code.
pub(crate) fn throw_diagnostic(env: &Env, message: &str) {
  log::debug!("napi dispatch failed: {message}");
  let engine = env.engine();
  let units: Vec<u16> = message.encode_utf16().collect();
  let error = engine
    .create_string(&units)
    .and_then(|message| engine.create_error(ErrorKind::Error, message));
  match error {
    Ok(error) => engine.throw(error),
    Err(err) => log::warn!("unable to throw \"{message}\": {err}"),
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::EnvOptions;
  use crate::engine::Engine;
  use crate::engine::local::LocalEngine;

  unsafe extern "C" fn second_argument(
    _env: *mut Env,
    info: crate::napi_callback_info,
  ) -> napi_value {
    let info = unsafe { &*(info as *const CallbackInfo) };
    assert!(info.new_target.is_null());
    assert_eq!(info.data as usize, 7);
    if info.argc < 2 {
      return std::ptr::null_mut();
    }
    unsafe { *info.args.add(1) }
  }

  #[test]
  fn trampoline_forwards_arguments() {
    let mut env = Env::new(Box::new(LocalEngine::new()), EnvOptions::new())
      .unwrap();
    let function =
      create_function(&mut env, "second", second_argument, 7 as *mut c_void)
        .unwrap();
    let engine = env.engine();
    let one = engine.create_number(1.0).unwrap();
    let two = engine.create_number(2.0).unwrap();
    let result = engine
      .call_function(function, engine.undefined(), &[one, two])
      .unwrap();
    assert_eq!(engine.number_value(result).unwrap(), 2.0);
    let result = engine
      .call_function(function, engine.undefined(), &[one])
      .unwrap();
    assert_eq!(engine.type_of(result), crate::engine::ValueKind::Undefined);
  }

  #[test]
  fn diagnostics_become_pending_errors() {
    let env = Env::new(Box::new(LocalEngine::new()), EnvOptions::new())
      .unwrap();
    throw_diagnostic(&env, "function table not found");
    let engine = env.engine();
    let error = engine.take_exception().unwrap();
    assert!(engine.is_error(error));
    let message: Vec<u16> = "message".encode_utf16().collect();
    let key = engine.create_string(&message).unwrap();
    let message = engine.get_property(error, key).unwrap();
    assert_eq!(
      String::from_utf16(&engine.string_value(message).unwrap()).unwrap(),
      "function table not found"
    );
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

use crate::env::CleanupHook;
use crate::env::InstanceData;
use crate::*;

/// Hooks run in reverse registration order when the environment is torn
/// down. Registering the same hook and argument twice is an error.
#[napi_sym::napi_sym]
fn napi_add_env_cleanup_hook(
  env: *mut Env,
  hook: napi_cleanup_hook,
  data: *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let hook = hook.ok_or(Error::InvalidArg)?;
  if env.cleanup_hooks.iter().any(|entry| entry.matches(hook, data)) {
    return Err(Error::InvalidArg);
  }
  env.cleanup_hooks.push(CleanupHook { hook, arg: data });
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_remove_env_cleanup_hook(
  env: *mut Env,
  hook: napi_cleanup_hook,
  data: *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let hook = hook.ok_or(Error::InvalidArg)?;
  let index = env
    .cleanup_hooks
    .iter()
    .rposition(|entry| entry.matches(hook, data))
    .ok_or(Error::InvalidArg)?;
  env.cleanup_hooks.remove(index);
  Ok(())
}

/// Replaces any previous instance data without finalizing it.
#[napi_sym::napi_sym]
fn napi_set_instance_data(
  env: *mut Env,
  data: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  env.instance_data = Some(InstanceData {
    data,
    finalize_cb,
    finalize_hint,
  });
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_instance_data(env: *mut Env, data: *mut *mut c_void) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(data);
  *data = env
    .instance_data
    .as_ref()
    .map_or(ptr::null_mut(), |instance| instance.data);
  Ok(())
}

/// Null when the host did not configure a module filename.
#[napi_sym::napi_sym]
fn node_api_get_module_file_name(
  env: *mut Env,
  result: *mut *const c_char,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.module_filename().map_or(ptr::null(), CStr::as_ptr);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_version(env: *mut Env, result: *mut u32) -> Result {
  let _env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = NAPI_VERSION;
  Ok(())
}

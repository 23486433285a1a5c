// Copyright 2018-2026 the Deno authors. MIT license.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::undocumented_unsafe_blocks)]

//! Node-API over embeddable JavaScript engines.
//!
//! The `napi_*` symbols exported by this crate implement the engine-neutral
//! N-API C surface on top of any backend implementing [`engine::Engine`]. A
//! host creates an [`Env`] around an engine and hands the resulting
//! `napi_env` to native addon code.

// Expose common stuff for ease of use.
// `use napi_shim::*`
pub use std::ffi::CStr;
pub use std::os::raw::c_char;
pub use std::os::raw::c_void;
pub use std::ptr;
pub use value::RawValue;
pub use value::napi_value;

pub mod class;
pub mod engine;
pub mod env;
pub mod function;
pub mod js_native_api;
pub mod node_api;
pub mod reference;
pub mod util;
mod value;

pub use env::Env;
pub use env::EnvConfig;
pub use env::EnvOptions;
pub use env::PendingContinuation;
pub use env::ScriptThreadDispatcher;
pub use js_native_api::*;
pub use node_api::*;

pub type napi_status = i32;
pub type napi_env = *mut Env;
pub type napi_callback_info = *mut c_void;
pub type napi_deferred = *mut c_void;
pub type napi_ref = *mut c_void;
pub type napi_handle_scope = *mut c_void;
pub type napi_escapable_handle_scope = *mut c_void;

pub const napi_ok: napi_status = 0;
pub const napi_invalid_arg: napi_status = 1;
pub const napi_object_expected: napi_status = 2;
pub const napi_string_expected: napi_status = 3;
pub const napi_name_expected: napi_status = 4;
pub const napi_function_expected: napi_status = 5;
pub const napi_number_expected: napi_status = 6;
pub const napi_boolean_expected: napi_status = 7;
pub const napi_array_expected: napi_status = 8;
pub const napi_generic_failure: napi_status = 9;
pub const napi_pending_exception: napi_status = 10;
pub const napi_cancelled: napi_status = 11;
pub const napi_escape_called_twice: napi_status = 12;
pub const napi_handle_scope_mismatch: napi_status = 13;
pub const napi_callback_scope_mismatch: napi_status = 14;
pub const napi_queue_full: napi_status = 15;
pub const napi_closing: napi_status = 16;
pub const napi_bigint_expected: napi_status = 17;
pub const napi_date_expected: napi_status = 18;
pub const napi_arraybuffer_expected: napi_status = 19;
pub const napi_detachable_arraybuffer_expected: napi_status = 20;
pub const napi_would_deadlock: napi_status = 21;

pub const NAPI_AUTO_LENGTH: usize = usize::MAX;
pub const NAPI_VERSION: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  #[error("Invalid argument")]
  InvalidArg,
  #[error("An object was expected")]
  ObjectExpected,
  #[error("A string was expected")]
  StringExpected,
  #[error("A string or symbol was expected")]
  NameExpected,
  #[error("A function was expected")]
  FunctionExpected,
  #[error("A number was expected")]
  NumberExpected,
  #[error("A boolean was expected")]
  BooleanExpected,
  #[error("An array was expected")]
  ArrayExpected,
  #[error("Unknown failure")]
  GenericFailure,
  #[error("An exception is pending")]
  PendingException,
  #[error("The async work item was cancelled")]
  Cancelled,
  #[error("napi_escape_handle already called on scope")]
  EscapeCalledTwice,
  #[error("Invalid handle scope usage")]
  HandleScopeMismatch,
  #[error("Invalid callback scope usage")]
  CallbackScopeMismatch,
  #[error("Thread-safe function queue is full")]
  QueueFull,
  #[error("Thread-safe function handle is closing")]
  Closing,
  #[error("A bigint was expected")]
  BigIntExpected,
  #[error("A date was expected")]
  DateExpected,
  #[error("An arraybuffer was expected")]
  ArrayBufferExpected,
  #[error("A detachable arraybuffer was expected")]
  DetachableArraybufferExpected,
  #[error("Main thread would deadlock")]
  WouldDeadlock,
}

impl TryFrom<napi_status> for Error {
  type Error = napi_status;

  fn try_from(status: napi_status) -> std::result::Result<Self, napi_status> {
    let error = match status {
      napi_invalid_arg => Error::InvalidArg,
      napi_object_expected => Error::ObjectExpected,
      napi_string_expected => Error::StringExpected,
      napi_name_expected => Error::NameExpected,
      napi_function_expected => Error::FunctionExpected,
      napi_number_expected => Error::NumberExpected,
      napi_boolean_expected => Error::BooleanExpected,
      napi_array_expected => Error::ArrayExpected,
      napi_generic_failure => Error::GenericFailure,
      napi_pending_exception => Error::PendingException,
      napi_cancelled => Error::Cancelled,
      napi_escape_called_twice => Error::EscapeCalledTwice,
      napi_handle_scope_mismatch => Error::HandleScopeMismatch,
      napi_callback_scope_mismatch => Error::CallbackScopeMismatch,
      napi_queue_full => Error::QueueFull,
      napi_closing => Error::Closing,
      napi_bigint_expected => Error::BigIntExpected,
      napi_date_expected => Error::DateExpected,
      napi_arraybuffer_expected => Error::ArrayBufferExpected,
      napi_detachable_arraybuffer_expected => {
        Error::DetachableArraybufferExpected
      }
      napi_would_deadlock => Error::WouldDeadlock,
      _ => return Err(status),
    };
    Ok(error)
  }
}

pub type Result = std::result::Result<(), Error>;

impl From<Error> for napi_status {
  fn from(error: Error) -> Self {
    match error {
      Error::InvalidArg => napi_invalid_arg,
      Error::ObjectExpected => napi_object_expected,
      Error::StringExpected => napi_string_expected,
      Error::NameExpected => napi_name_expected,
      Error::FunctionExpected => napi_function_expected,
      Error::NumberExpected => napi_number_expected,
      Error::BooleanExpected => napi_boolean_expected,
      Error::ArrayExpected => napi_array_expected,
      Error::GenericFailure => napi_generic_failure,
      Error::PendingException => napi_pending_exception,
      Error::Cancelled => napi_cancelled,
      Error::EscapeCalledTwice => napi_escape_called_twice,
      Error::HandleScopeMismatch => napi_handle_scope_mismatch,
      Error::CallbackScopeMismatch => napi_callback_scope_mismatch,
      Error::QueueFull => napi_queue_full,
      Error::Closing => napi_closing,
      Error::BigIntExpected => napi_bigint_expected,
      Error::DateExpected => napi_date_expected,
      Error::ArrayBufferExpected => napi_arraybuffer_expected,
      Error::DetachableArraybufferExpected => {
        napi_detachable_arraybuffer_expected
      }
      Error::WouldDeadlock => napi_would_deadlock,
    }
  }
}

/// Messages reported by `napi_get_last_error_info`, indexed by status.
pub(crate) static ERROR_MESSAGES: [Option<&CStr>; 22] = [
  None,
  Some(c"Invalid argument"),
  Some(c"An object was expected"),
  Some(c"A string was expected"),
  Some(c"A string or symbol was expected"),
  Some(c"A function was expected"),
  Some(c"A number was expected"),
  Some(c"A boolean was expected"),
  Some(c"An array was expected"),
  Some(c"Unknown failure"),
  Some(c"An exception is pending"),
  Some(c"The async work item was cancelled"),
  Some(c"napi_escape_handle already called on scope"),
  Some(c"Invalid handle scope usage"),
  Some(c"Invalid callback scope usage"),
  Some(c"Thread-safe function queue is full"),
  Some(c"Thread-safe function handle is closing"),
  Some(c"A bigint was expected"),
  Some(c"A date was expected"),
  Some(c"An arraybuffer was expected"),
  Some(c"A detachable arraybuffer was expected"),
  Some(c"Main thread would deadlock"),
];

pub type napi_valuetype = i32;

pub const napi_undefined: napi_valuetype = 0;
pub const napi_null: napi_valuetype = 1;
pub const napi_boolean: napi_valuetype = 2;
pub const napi_number: napi_valuetype = 3;
pub const napi_string: napi_valuetype = 4;
pub const napi_symbol: napi_valuetype = 5;
pub const napi_object: napi_valuetype = 6;
pub const napi_function: napi_valuetype = 7;
pub const napi_external: napi_valuetype = 8;
pub const napi_bigint: napi_valuetype = 9;

pub type napi_typedarray_type = i32;

pub const napi_int8_array: napi_typedarray_type = 0;
pub const napi_uint8_array: napi_typedarray_type = 1;
pub const napi_uint8_clamped_array: napi_typedarray_type = 2;
pub const napi_int16_array: napi_typedarray_type = 3;
pub const napi_uint16_array: napi_typedarray_type = 4;
pub const napi_int32_array: napi_typedarray_type = 5;
pub const napi_uint32_array: napi_typedarray_type = 6;
pub const napi_float32_array: napi_typedarray_type = 7;
pub const napi_float64_array: napi_typedarray_type = 8;
pub const napi_bigint64_array: napi_typedarray_type = 9;
pub const napi_biguint64_array: napi_typedarray_type = 10;

pub type napi_callback = Option<
  unsafe extern "C" fn(env: napi_env, info: napi_callback_info) -> napi_value,
>;

pub type napi_finalize = Option<
  unsafe extern "C" fn(
    env: napi_env,
    data: *mut c_void,
    finalize_hint: *mut c_void,
  ),
>;

pub type napi_cleanup_hook = Option<unsafe extern "C" fn(arg: *mut c_void)>;

pub type napi_property_attributes = i32;

pub const napi_default: napi_property_attributes = 0;
pub const napi_writable: napi_property_attributes = 1 << 0;
pub const napi_enumerable: napi_property_attributes = 1 << 1;
pub const napi_configurable: napi_property_attributes = 1 << 2;
pub const napi_static: napi_property_attributes = 1 << 10;
pub const napi_default_method: napi_property_attributes =
  napi_writable | napi_configurable;
pub const napi_default_jsproperty: napi_property_attributes =
  napi_enumerable | napi_configurable | napi_writable;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct napi_property_descriptor {
  pub utf8name: *const c_char,
  pub name: napi_value,
  pub method: napi_callback,
  pub getter: napi_callback,
  pub setter: napi_callback,
  pub value: napi_value,
  pub attributes: napi_property_attributes,
  pub data: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct napi_extended_error_info {
  pub error_message: *const c_char,
  pub engine_reserved: *mut c_void,
  pub engine_error_code: u32,
  pub error_code: napi_status,
}

impl Default for napi_extended_error_info {
  fn default() -> Self {
    Self {
      error_message: ptr::null(),
      engine_reserved: ptr::null_mut(),
      engine_error_code: 0,
      error_code: napi_ok,
    }
  }
}

// Macro to check napi arguments.
// If nullptr, return Err(Error::InvalidArg).
#[macro_export]
macro_rules! check_arg {
  ($ptr: expr) => {
    if $ptr.is_null() {
      return Err($crate::Error::InvalidArg);
    }
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_through_error() {
    for status in napi_invalid_arg..=napi_would_deadlock {
      let error = Error::try_from(status).unwrap();
      assert_eq!(napi_status::from(error), status);
    }
    assert_eq!(Error::try_from(napi_ok), Err(napi_ok));
    assert_eq!(Error::try_from(99), Err(99));
  }

  #[test]
  fn message_table_matches_display() {
    for status in napi_invalid_arg..=napi_would_deadlock {
      let error = Error::try_from(status).unwrap();
      let message = ERROR_MESSAGES[status as usize].unwrap();
      assert_eq!(message.to_str().unwrap(), error.to_string());
    }
    assert!(ERROR_MESSAGES[napi_ok as usize].is_none());
  }
}

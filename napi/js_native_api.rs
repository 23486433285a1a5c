// Copyright 2018-2026 the Deno authors. MIT license.

#![allow(non_upper_case_globals)]

use crate::class;
use crate::engine::Engine;
use crate::engine::ErrorKind;
use crate::engine::Finalizer;
use crate::engine::PropertyAttributes;
use crate::engine::PropertyDefinition;
use crate::engine::PropertyValue;
use crate::engine::TypedArrayKind;
use crate::engine::ValueKind;
use crate::function;
use crate::function::CallbackInfo;
use crate::reference;
use crate::util;
use crate::value::handle_to_id;
use crate::value::id_to_handle;
use crate::*;

macro_rules! check_arg_option {
  ($opt: expr) => {
    if $opt.is_none() {
      return Err(Error::InvalidArg);
    }
  };
}

type Fallible<T> = std::result::Result<T, Error>;

fn raw(value: napi_value) -> Fallible<RawValue> {
  RawValue::from_napi(value).ok_or(Error::InvalidArg)
}

fn object_arg(engine: &dyn Engine, value: napi_value) -> Fallible<RawValue> {
  let value = raw(value)?;
  if !engine.type_of(value).is_object() {
    return Err(Error::ObjectExpected);
  }
  Ok(value)
}

/// Property keys must be strings or symbols.
fn key_arg(engine: &dyn Engine, key: napi_value) -> Fallible<RawValue> {
  let key = raw(key)?;
  if !engine.type_of(key).is_property_key() {
    return Err(Error::InvalidArg);
  }
  Ok(key)
}

fn string_arg(engine: &dyn Engine, value: napi_value) -> Fallible<RawValue> {
  let value = raw(value)?;
  if engine.type_of(value) != ValueKind::String {
    return Err(Error::StringExpected);
  }
  Ok(value)
}

fn function_arg(engine: &dyn Engine, value: napi_value) -> Fallible<RawValue> {
  let value = raw(value)?;
  if engine.type_of(value) != ValueKind::Function {
    return Err(Error::FunctionExpected);
  }
  Ok(value)
}

pub(crate) fn js_string(engine: &dyn Engine, text: &str) -> Fallible<RawValue> {
  let units: Vec<u16> = text.encode_utf16().collect();
  Ok(engine.create_string(&units)?)
}

unsafe fn named_key(
  engine: &dyn Engine,
  utf8name: *const c_char,
) -> Fallible<RawValue> {
  check_arg!(utf8name);
  let units = unsafe { util::utf8_to_units(utf8name, NAPI_AUTO_LENGTH)? };
  Ok(engine.create_string(&units)?)
}

unsafe fn arguments(
  argc: usize,
  argv: *const napi_value,
) -> Fallible<Vec<RawValue>> {
  if argc == 0 {
    return Ok(Vec::new());
  }
  check_arg!(argv);
  // SAFETY: the caller passes `argc` values.
  unsafe { std::slice::from_raw_parts(argv, argc) }
    .iter()
    .map(|value| raw(*value))
    .collect()
}

fn number_arg(engine: &dyn Engine, value: napi_value) -> Fallible<f64> {
  let value = raw(value)?;
  if engine.type_of(value) != ValueKind::Number {
    return Err(Error::NumberExpected);
  }
  Ok(engine.number_value(value)?)
}

fn value_type(kind: ValueKind) -> napi_valuetype {
  match kind {
    ValueKind::Undefined => napi_undefined,
    ValueKind::Null => napi_null,
    ValueKind::Boolean => napi_boolean,
    ValueKind::Number => napi_number,
    ValueKind::String => napi_string,
    ValueKind::Symbol => napi_symbol,
    ValueKind::Object => napi_object,
    ValueKind::Function => napi_function,
    ValueKind::External => napi_external,
  }
}

fn typed_array_kind(ty: napi_typedarray_type) -> Fallible<TypedArrayKind> {
  Ok(match ty {
    napi_int8_array => TypedArrayKind::Int8,
    napi_uint8_array => TypedArrayKind::Uint8,
    napi_uint8_clamped_array => TypedArrayKind::Uint8Clamped,
    napi_int16_array => TypedArrayKind::Int16,
    napi_uint16_array => TypedArrayKind::Uint16,
    napi_int32_array => TypedArrayKind::Int32,
    napi_uint32_array => TypedArrayKind::Uint32,
    napi_float32_array => TypedArrayKind::Float32,
    napi_float64_array => TypedArrayKind::Float64,
    _ => return Err(Error::InvalidArg),
  })
}

fn typed_array_type(kind: TypedArrayKind) -> napi_typedarray_type {
  match kind {
    TypedArrayKind::Int8 => napi_int8_array,
    TypedArrayKind::Uint8 => napi_uint8_array,
    TypedArrayKind::Uint8Clamped => napi_uint8_clamped_array,
    TypedArrayKind::Int16 => napi_int16_array,
    TypedArrayKind::Uint16 => napi_uint16_array,
    TypedArrayKind::Int32 => napi_int32_array,
    TypedArrayKind::Uint32 => napi_uint32_array,
    TypedArrayKind::Float32 => napi_float32_array,
    TypedArrayKind::Float64 => napi_float64_array,
  }
}

#[napi_sym::napi_sym]
fn napi_get_undefined(env: *mut Env, result: *mut napi_value) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().undefined().into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_null(env: *mut Env, result: *mut napi_value) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().null().into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_global(env: *mut Env, result: *mut napi_value) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().global().into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_boolean(
  env: *mut Env,
  value: bool,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().boolean(value).into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_object(env: *mut Env, result: *mut napi_value) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().create_object()?.into_napi();
  Ok(())
}

/// Returns napi_value that represents a new JavaScript Array.
#[napi_sym::napi_sym]
fn napi_create_array(env: *mut Env, result: *mut napi_value) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().create_array(0)?.into_napi();
  Ok(())
}

/// Elements start out as `null`.
#[napi_sym::napi_sym]
fn napi_create_array_with_length(
  env: *mut Env,
  length: usize,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let length = u32::try_from(length).map_err(|_| Error::InvalidArg)?;
  *result = env.engine().create_array(length)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_double(
  env: *mut Env,
  value: f64,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().create_number(value)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_int32(
  env: *mut Env,
  value: i32,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().create_number(value as f64)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_uint32(
  env: *mut Env,
  value: u32,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().create_number(value as f64)?.into_napi();
  Ok(())
}

/// Values beyond 2^53 lose precision.
#[napi_sym::napi_sym]
fn napi_create_int64(
  env: *mut Env,
  value: i64,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().create_number(value as f64)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_string_latin1(
  env: *mut Env,
  string: *const c_char,
  length: usize,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let units = util::latin1_to_units(string, length)?;
  *result = env.engine().create_string(&units)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_string_utf8(
  env: *mut Env,
  string: *const c_char,
  length: usize,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let units = util::utf8_to_units(string, length)?;
  *result = env.engine().create_string(&units)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_string_utf16(
  env: *mut Env,
  string: *const u16,
  length: usize,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let units = util::utf16_to_units(string, length)?;
  *result = env.engine().create_string(&units)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_symbol(
  env: *mut Env,
  description: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let description = match RawValue::from_napi(description) {
    Some(_) => Some(string_arg(engine, description)?),
    None => None,
  };
  *result = engine.create_symbol(description)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_function(
  env: *mut Env,
  name: *const c_char,
  length: usize,
  cb: napi_callback,
  cb_info: *mut c_void,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let cb = cb.ok_or(Error::InvalidArg)?;
  let name = if name.is_null() {
    String::new()
  } else {
    util::read_name(name, length)?
  };
  *result = function::create_function(env, &name, cb, cb_info)?.into_napi();
  Ok(())
}

fn set_error_code(
  engine: &dyn Engine,
  error: RawValue,
  code: RawValue,
) -> Fallible<()> {
  engine.set_property(error, js_string(engine, "code")?, code)?;
  let name_key = js_string(engine, "name")?;
  let name = engine.get_property(error, name_key)?;
  let name = engine.string_value(engine.coerce_to_string(name)?)?;
  let code = engine.string_value(code)?;
  let label = format!(
    "{} [{}]",
    String::from_utf16_lossy(&name),
    String::from_utf16_lossy(&code)
  );
  engine.set_property(error, name_key, js_string(engine, &label)?)?;
  Ok(())
}

fn new_error(
  engine: &dyn Engine,
  kind: ErrorKind,
  code: napi_value,
  msg: napi_value,
) -> Fallible<RawValue> {
  let msg = string_arg(engine, msg)?;
  let code = match RawValue::from_napi(code) {
    Some(_) => Some(string_arg(engine, code)?),
    None => None,
  };
  let error = engine.create_error(kind, msg)?;
  if let Some(code) = code {
    set_error_code(engine, error, code)?;
  }
  Ok(error)
}

#[napi_sym::napi_sym]
fn napi_create_error(
  env: *mut Env,
  code: napi_value,
  msg: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = new_error(env.engine(), ErrorKind::Error, code, msg)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_type_error(
  env: *mut Env,
  code: napi_value,
  msg: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result =
    new_error(env.engine(), ErrorKind::TypeError, code, msg)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_range_error(
  env: *mut Env,
  code: napi_value,
  msg: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result =
    new_error(env.engine(), ErrorKind::RangeError, code, msg)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_external(
  env: *mut Env,
  data: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let external = env.engine().create_external(data)?;
  reference::attach_finalizer(env, external, data, finalize_cb, finalize_hint)?;
  *result = external.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_value_external(
  env: *mut Env,
  value: napi_value,
  result: *mut *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let value = raw(value)?;
  if engine.type_of(value) != ValueKind::External {
    return Err(Error::InvalidArg);
  }
  *result = engine.external_value(value)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_arraybuffer(
  env: *mut Env,
  byte_length: usize,
  data: *mut *mut c_void,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let (buffer, backing) = env.engine().create_array_buffer(byte_length)?;
  if !data.is_null() {
    *data = backing as *mut c_void;
  }
  *result = buffer.into_napi();
  Ok(())
}

/// `finalize_cb` runs exactly once, when the engine frees the buffer.
#[napi_sym::napi_sym]
fn napi_create_external_arraybuffer(
  env: *mut Env,
  external_data: *mut c_void,
  byte_length: usize,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  if external_data.is_null() && byte_length > 0 {
    return Err(Error::InvalidArg);
  }
  let env_ptr: *mut Env = &mut *env;
  let finalizer = finalize_cb.map(|finalize_cb| {
    Box::new(move || {
      // SAFETY: finalizers run before the environment is freed.
      unsafe { finalize_cb(env_ptr, external_data, finalize_hint) };
    }) as Finalizer
  });
  let buffer = env.engine().create_external_array_buffer(
    external_data as *mut u8,
    byte_length,
    finalizer,
  )?;
  *result = buffer.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_arraybuffer_info(
  env: *mut Env,
  arraybuffer: napi_value,
  data: *mut *mut c_void,
  byte_length: *mut usize,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let buffer = raw(arraybuffer)?;
  if !engine.is_array_buffer(buffer) {
    return Err(Error::InvalidArg);
  }
  let (backing, length) = engine.array_buffer_info(buffer)?;
  if !data.is_null() {
    *data = backing as *mut c_void;
  }
  if !byte_length.is_null() {
    *byte_length = length;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_is_arraybuffer(
  env: *mut Env,
  value: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().is_array_buffer(raw(value)?);
  Ok(())
}

/// A misaligned or out-of-bounds view throws a `RangeError`.
#[napi_sym::napi_sym]
fn napi_create_typedarray(
  env: *mut Env,
  ty: napi_typedarray_type,
  length: usize,
  arraybuffer: napi_value,
  byte_offset: usize,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let kind = typed_array_kind(ty)?;
  let buffer = raw(arraybuffer)?;
  if !engine.is_array_buffer(buffer) {
    return Err(Error::InvalidArg);
  }
  *result = engine
    .create_typed_array(kind, length, buffer, byte_offset)?
    .into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_typedarray_info(
  env: *mut Env,
  typedarray: napi_value,
  ty: *mut napi_typedarray_type,
  length: *mut usize,
  data: *mut *mut c_void,
  arraybuffer: *mut napi_value,
  byte_offset: *mut usize,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let value = raw(typedarray)?;
  if !engine.is_typed_array(value) {
    return Err(Error::InvalidArg);
  }
  let info = engine.typed_array_info(value)?;
  if !ty.is_null() {
    *ty = typed_array_type(info.kind);
  }
  if !length.is_null() {
    *length = info.length;
  }
  if !data.is_null() {
    *data = info.data as *mut c_void;
  }
  if !arraybuffer.is_null() {
    *arraybuffer = info.buffer.into_napi();
  }
  if !byte_offset.is_null() {
    *byte_offset = info.byte_offset;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_is_typedarray(
  env: *mut Env,
  value: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().is_typed_array(raw(value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_dataview(
  env: *mut Env,
  byte_length: usize,
  arraybuffer: napi_value,
  byte_offset: usize,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let buffer = raw(arraybuffer)?;
  if !engine.is_array_buffer(buffer) {
    return Err(Error::InvalidArg);
  }
  *result = engine
    .create_data_view(byte_length, buffer, byte_offset)?
    .into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_dataview_info(
  env: *mut Env,
  dataview: napi_value,
  byte_length: *mut usize,
  data: *mut *mut c_void,
  arraybuffer: *mut napi_value,
  byte_offset: *mut usize,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let value = raw(dataview)?;
  if !engine.is_data_view(value) {
    return Err(Error::InvalidArg);
  }
  let info = engine.data_view_info(value)?;
  if !byte_length.is_null() {
    *byte_length = info.byte_length;
  }
  if !data.is_null() {
    *data = info.data as *mut c_void;
  }
  if !arraybuffer.is_null() {
    *arraybuffer = info.buffer.into_napi();
  }
  if !byte_offset.is_null() {
    *byte_offset = info.byte_offset;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_is_dataview(
  env: *mut Env,
  value: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().is_data_view(raw(value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_value_double(
  env: *mut Env,
  value: napi_value,
  result: *mut f64,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = number_arg(env.engine(), value)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_value_int32(
  env: *mut Env,
  value: napi_value,
  result: *mut i32,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = util::to_int32(number_arg(env.engine(), value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_value_uint32(
  env: *mut Env,
  value: napi_value,
  result: *mut u32,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = util::to_uint32(number_arg(env.engine(), value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_value_int64(
  env: *mut Env,
  value: napi_value,
  result: *mut i64,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = util::to_int64(number_arg(env.engine(), value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_value_bool(
  env: *mut Env,
  value: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let value = raw(value)?;
  if engine.type_of(value) != ValueKind::Boolean {
    return Err(Error::BooleanExpected);
  }
  *result = engine.bool_value(value)?;
  Ok(())
}

/// With a null `buf`, reports the length in bytes. Otherwise copies a
/// NUL-terminated prefix that fits in `bufsize`.
#[napi_sym::napi_sym]
fn napi_get_value_string_latin1(
  env: *mut Env,
  value: napi_value,
  buf: *mut c_char,
  bufsize: usize,
  result: *mut usize,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let units = engine.string_value(string_arg(engine, value)?)?;
  if buf.is_null() {
    check_arg!(result);
    *result = units.len();
    return Ok(());
  }
  let copied = units.len().min(bufsize.saturating_sub(1));
  if bufsize > 0 {
    for (index, unit) in units[..copied].iter().enumerate() {
      *buf.add(index) = *unit as u8 as c_char;
    }
    *buf.add(copied) = 0;
  }
  if !result.is_null() {
    *result = copied;
  }
  Ok(())
}

/// Same protocol as the latin1 variant. Truncation never splits a code
/// point.
#[napi_sym::napi_sym]
fn napi_get_value_string_utf8(
  env: *mut Env,
  value: napi_value,
  buf: *mut c_char,
  bufsize: usize,
  result: *mut usize,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let units = engine.string_value(string_arg(engine, value)?)?;
  let text = String::from_utf16_lossy(&units);
  if buf.is_null() {
    check_arg!(result);
    *result = text.len();
    return Ok(());
  }
  let mut copied = 0;
  if bufsize > 0 {
    let prefix = util::utf8_prefix(&text, bufsize - 1);
    std::ptr::copy_nonoverlapping(
      prefix.as_ptr(),
      buf as *mut u8,
      prefix.len(),
    );
    *buf.add(prefix.len()) = 0;
    copied = prefix.len();
  }
  if !result.is_null() {
    *result = copied;
  }
  Ok(())
}

/// Lengths are in code units. Truncation never splits a surrogate pair.
#[napi_sym::napi_sym]
fn napi_get_value_string_utf16(
  env: *mut Env,
  value: napi_value,
  buf: *mut u16,
  bufsize: usize,
  result: *mut usize,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let units = engine.string_value(string_arg(engine, value)?)?;
  if buf.is_null() {
    check_arg!(result);
    *result = units.len();
    return Ok(());
  }
  let mut copied = 0;
  if bufsize > 0 {
    let prefix = util::utf16_prefix(&units, bufsize - 1);
    std::ptr::copy_nonoverlapping(prefix.as_ptr(), buf, prefix.len());
    *buf.add(prefix.len()) = 0;
    copied = prefix.len();
  }
  if !result.is_null() {
    *result = copied;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_typeof(
  env: *mut Env,
  value: napi_value,
  result: *mut napi_valuetype,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = value_type(env.engine().type_of(raw(value)?));
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_is_array(
  env: *mut Env,
  value: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().is_array(raw(value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_is_error(
  env: *mut Env,
  value: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().is_error(raw(value)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_strict_equals(
  env: *mut Env,
  lhs: napi_value,
  rhs: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().strict_equals(raw(lhs)?, raw(rhs)?);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_instanceof(
  env: *mut Env,
  object: napi_value,
  constructor: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = raw(object)?;
  let constructor = function_arg(engine, constructor)?;
  *result = engine.instance_of(object, constructor)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_prototype(
  env: *mut Env,
  object: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  *result = engine.get_prototype(object)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_array_length(
  env: *mut Env,
  value: napi_value,
  result: *mut u32,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let value = raw(value)?;
  if !engine.is_array(value) {
    return Err(Error::ArrayExpected);
  }
  *result = engine.array_length(value)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_coerce_to_bool(
  env: *mut Env,
  value: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().coerce_to_bool(raw(value)?)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_coerce_to_number(
  env: *mut Env,
  value: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().coerce_to_number(raw(value)?)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_coerce_to_object(
  env: *mut Env,
  value: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().coerce_to_object(raw(value)?)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_coerce_to_string(
  env: *mut Env,
  value: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().coerce_to_string(raw(value)?)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_set_property(
  env: *mut Env,
  object: napi_value,
  key: napi_value,
  value: napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = key_arg(engine, key)?;
  engine.set_property(object, key, raw(value)?)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_property(
  env: *mut Env,
  object: napi_value,
  key: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = key_arg(engine, key)?;
  *result = engine.get_property(object, key)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_has_property(
  env: *mut Env,
  object: napi_value,
  key: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = key_arg(engine, key)?;
  *result = engine.has_property(object, key)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_delete_property(
  env: *mut Env,
  object: napi_value,
  key: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = key_arg(engine, key)?;
  let deleted = engine.delete_property(object, key)?;
  if !result.is_null() {
    *result = deleted;
  }
  Ok(())
}

/// Calls the `Object.prototype.hasOwnProperty` cached at bootstrap.
#[napi_sym::napi_sym]
fn napi_has_own_property(
  env: *mut Env,
  object: napi_value,
  key: napi_value,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = raw(key)?;
  if !engine.type_of(key).is_property_key() {
    return Err(Error::NameExpected);
  }
  let found = engine.call_function(env.has_own_property, object, &[key])?;
  *result = engine.bool_value(found)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_set_named_property(
  env: *mut Env,
  object: napi_value,
  utf8name: *const c_char,
  value: napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let value = raw(value)?;
  let key = named_key(engine, utf8name)?;
  engine.set_property(object, key, value)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_named_property(
  env: *mut Env,
  object: napi_value,
  utf8name: *const c_char,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = named_key(engine, utf8name)?;
  *result = engine.get_property(object, key)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_has_named_property(
  env: *mut Env,
  object: napi_value,
  utf8name: *const c_char,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let key = named_key(engine, utf8name)?;
  *result = engine.has_property(object, key)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_property_names(
  env: *mut Env,
  object: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  *result = engine.own_property_names(object)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_set_element(
  env: *mut Env,
  object: napi_value,
  index: u32,
  value: napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  engine.set_element(object, index, raw(value)?)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_get_element(
  env: *mut Env,
  object: napi_value,
  index: u32,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  *result = engine.get_element(object, index)?.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_has_element(
  env: *mut Env,
  object: napi_value,
  index: u32,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  *result = engine.has_element(object, index)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_delete_element(
  env: *mut Env,
  object: napi_value,
  index: u32,
  result: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let object = object_arg(engine, object)?;
  let deleted = engine.delete_element(object, index)?;
  if !result.is_null() {
    *result = deleted;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_define_properties(
  env: *mut Env,
  object: napi_value,
  property_count: usize,
  properties: *const napi_property_descriptor,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let object = object_arg(env.engine(), object)?;
  if property_count == 0 {
    return Ok(());
  }
  check_arg!(properties);
  let properties = std::slice::from_raw_parts(properties, property_count);

  for property in properties {
    let (key, name) = class::descriptor_key(env.engine(), property)?;
    let value = if let Some(method) = property.method {
      let function = function::create_function(
        env,
        &name.to_string(),
        method,
        property.data,
      )?;
      PropertyValue::Data(function)
    } else if property.getter.is_some() || property.setter.is_some() {
      let getter = property
        .getter
        .map(|getter| function::register(env, getter, property.data));
      let setter = property
        .setter
        .map(|setter| function::register(env, setter, property.data));
      PropertyValue::Accessor { getter, setter }
    } else {
      PropertyValue::Data(raw(property.value)?)
    };
    env.engine().define_property(
      object,
      &PropertyDefinition {
        key,
        value,
        attributes: PropertyAttributes::from_napi(property.attributes),
      },
    )?;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_call_function(
  env: *mut Env,
  recv: napi_value,
  func: napi_value,
  argc: usize,
  argv: *const napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  env.check_no_pending_exception()?;
  let engine = env.engine();
  let recv = raw(recv)?;
  let func = function_arg(engine, func)?;
  let args = arguments(argc, argv)?;
  let value = engine.call_function(func, recv, &args)?;
  if !result.is_null() {
    *result = value.into_napi();
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_new_instance(
  env: *mut Env,
  constructor: napi_value,
  argc: usize,
  argv: *const napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  env.check_no_pending_exception()?;
  let engine = env.engine();
  let constructor = function_arg(engine, constructor)?;
  let args = arguments(argc, argv)?;
  *result = engine.construct(constructor, &args)?.into_napi();
  Ok(())
}

/// Missing requested arguments are filled with `undefined`.
#[napi_sym::napi_sym]
fn napi_get_cb_info(
  env: *mut Env,
  cbinfo: napi_callback_info,
  argc: *mut usize,
  argv: *mut napi_value,
  this_arg: *mut napi_value,
  cb_data: *mut *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(cbinfo);
  let cbinfo: &CallbackInfo = &*(cbinfo as *const CallbackInfo);

  if !argv.is_null() {
    check_arg!(argc);
    let undefined = env.engine().undefined().into_napi();
    let requested = std::slice::from_raw_parts_mut(argv, *argc);
    for (index, slot) in requested.iter_mut().enumerate() {
      *slot = if index < cbinfo.argc {
        *cbinfo.args.add(index)
      } else {
        undefined
      };
    }
  }
  if !argc.is_null() {
    *argc = cbinfo.argc;
  }
  if !this_arg.is_null() {
    *this_arg = cbinfo.this;
  }
  if !cb_data.is_null() {
    *cb_data = cbinfo.data;
  }
  Ok(())
}

/// Null outside construct calls.
#[napi_sym::napi_sym]
fn napi_get_new_target(
  env: *mut Env,
  cbinfo: napi_callback_info,
  result: *mut napi_value,
) -> Result {
  let _env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(cbinfo);
  check_arg!(result);
  let cbinfo: &CallbackInfo = &*(cbinfo as *const CallbackInfo);
  *result = cbinfo.new_target;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_define_class(
  env: *mut Env,
  utf8name: *const c_char,
  length: usize,
  constructor: napi_callback,
  callback_data: *mut c_void,
  property_count: usize,
  properties: *const napi_property_descriptor,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  check_arg!(utf8name);
  let name = util::read_name(utf8name, length)?;
  let descriptors = if property_count == 0 {
    &[][..]
  } else {
    check_arg!(properties);
    std::slice::from_raw_parts(properties, property_count)
  };
  let class =
    class::define_class(env, name, constructor, callback_data, descriptors)?;
  *result = class.into_napi();
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_create_reference(
  env: *mut Env,
  value: napi_value,
  initial_refcount: u32,
  result: *mut napi_ref,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let value = raw(value)?;
  *result = env.create_reference(value, initial_refcount);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_delete_reference(env: *mut Env, nref: napi_ref) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(nref);
  env.delete_reference(nref)
}

#[napi_sym::napi_sym]
fn napi_reference_ref(
  env: *mut Env,
  nref: napi_ref,
  result: *mut u32,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(nref);
  let count = env.ref_reference(nref)?;
  if !result.is_null() {
    *result = count;
  }
  Ok(())
}

/// Unref of a zero count fails with `napi_generic_failure`.
#[napi_sym::napi_sym]
fn napi_reference_unref(
  env: *mut Env,
  nref: napi_ref,
  result: *mut u32,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(nref);
  let count = env.unref_reference(nref)?;
  if !result.is_null() {
    *result = count;
  }
  Ok(())
}

/// Null once the count has dropped to zero.
#[napi_sym::napi_sym]
fn napi_get_reference_value(
  env: *mut Env,
  nref: napi_ref,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(nref);
  check_arg!(result);
  *result = env
    .reference(nref)?
    .value()
    .map_or(std::ptr::null_mut(), RawValue::into_napi);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_wrap(
  env: *mut Env,
  js_object: napi_value,
  native_object: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
  result: *mut napi_ref,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let object = raw(js_object)?;
  reference::wrap(env, object, native_object, finalize_cb, finalize_hint)?;
  if !result.is_null() {
    *result = env.create_reference(object, 0);
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_unwrap(
  env: *mut Env,
  js_object: napi_value,
  result: *mut *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = reference::unwrap(env, raw(js_object)?)?;
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_remove_wrap(
  env: *mut Env,
  js_object: napi_value,
  result: *mut *mut c_void,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let data = reference::remove_wrap(env, raw(js_object)?)?;
  if !result.is_null() {
    *result = data;
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_add_finalizer(
  env: *mut Env,
  js_object: napi_value,
  finalize_data: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
  result: *mut napi_ref,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg_option!(finalize_cb);
  let object = object_arg(env.engine(), js_object)?;
  reference::attach_finalizer(
    env,
    object,
    finalize_data,
    finalize_cb,
    finalize_hint,
  )?;
  if !result.is_null() {
    *result = env.create_reference(object, 0);
  }
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_throw(env: *mut Env, error: napi_value) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  env.engine().throw(raw(error)?);
  Ok(())
}

unsafe fn throw_with_code(
  env: &Env,
  kind: ErrorKind,
  code: *const c_char,
  msg: *const c_char,
) -> Result {
  check_arg!(msg);
  let engine = env.engine();
  let msg = unsafe { util::utf8_to_units(msg, NAPI_AUTO_LENGTH)? };
  let error = engine.create_error(kind, engine.create_string(&msg)?)?;
  if !code.is_null() {
    let code = unsafe { util::utf8_to_units(code, NAPI_AUTO_LENGTH)? };
    set_error_code(engine, error, engine.create_string(&code)?)?;
  }
  engine.throw(error);
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_throw_error(
  env: *mut Env,
  code: *const c_char,
  msg: *const c_char,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  throw_with_code(env, ErrorKind::Error, code, msg)
}

#[napi_sym::napi_sym]
fn napi_throw_type_error(
  env: *mut Env,
  code: *const c_char,
  msg: *const c_char,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  throw_with_code(env, ErrorKind::TypeError, code, msg)
}

#[napi_sym::napi_sym]
fn napi_throw_range_error(
  env: *mut Env,
  code: *const c_char,
  msg: *const c_char,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  throw_with_code(env, ErrorKind::RangeError, code, msg)
}

#[napi_sym::napi_sym]
fn napi_is_exception_pending(env: *mut Env, result: *mut bool) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = env.engine().has_exception();
  Ok(())
}

/// `undefined` when nothing is pending.
#[napi_sym::napi_sym]
fn napi_get_and_clear_last_exception(
  env: *mut Env,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let engine = env.engine();
  *result = engine
    .take_exception()
    .unwrap_or_else(|| engine.undefined())
    .into_napi();
  Ok(())
}

/// Reads the last-error record without clearing it, so repeated queries
/// agree.
#[allow(clippy::not_unsafe_ptr_arg_deref)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn napi_get_last_error_info(
  env: *mut Env,
  result: *mut *const napi_extended_error_info,
) -> napi_status {
  // SAFETY: env is null or a live environment.
  let Some(env) = (unsafe { env.as_mut() }) else {
    return napi_invalid_arg;
  };
  if result.is_null() {
    return napi_invalid_arg;
  }
  let status = env.last_error.error_code;
  env.last_error.error_message = usize::try_from(status)
    .ok()
    .and_then(|index| ERROR_MESSAGES.get(index).copied().flatten())
    .map_or(std::ptr::null(), CStr::as_ptr);
  // SAFETY: checked above.
  unsafe { *result = &env.last_error };
  napi_ok
}

/// The deferred keeps its resolving functions in a container object held
/// by a strong reference until it settles.
#[napi_sym::napi_sym]
fn napi_create_promise(
  env: *mut Env,
  deferred: *mut napi_deferred,
  promise: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(deferred);
  check_arg!(promise);
  let engine = env.engine();
  let capability = engine.create_promise()?;
  let container = engine.create_object()?;
  engine.set_property(
    container,
    js_string(engine, "resolve")?,
    capability.resolve,
  )?;
  engine.set_property(
    container,
    js_string(engine, "reject")?,
    capability.reject,
  )?;
  let reference = env.create_reference(container, 1);
  let reference_id = handle_to_id(reference).ok_or(Error::GenericFailure)?;
  let id = env.next_id();
  env.deferreds.insert(id, reference_id);
  *deferred = id_to_handle(id);
  *promise = capability.promise.into_napi();
  Ok(())
}

/// Settles at most once: the deferred is gone afterwards.
fn settle(
  env: &mut Env,
  deferred: napi_deferred,
  value: napi_value,
  side: &str,
) -> Result {
  let value = raw(value)?;
  let reference_id = handle_to_id(deferred)
    .and_then(|id| env.deferreds.remove(&id))
    .ok_or(Error::InvalidArg)?;
  let reference = env
    .references
    .remove(&reference_id)
    .ok_or(Error::InvalidArg)?;
  let engine = env.engine();
  let settled = match reference.value() {
    Some(container) => js_string(engine, side)
      .and_then(|key| Ok(engine.get_property(container, key)?))
      .and_then(|function| {
        Ok(engine.call_function(function, engine.undefined(), &[value])?)
      }),
    None => Err(Error::GenericFailure),
  };
  reference.release(engine);
  settled.map(|_| ())
}

#[napi_sym::napi_sym]
fn napi_resolve_deferred(
  env: *mut Env,
  deferred: napi_deferred,
  result: napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(deferred);
  settle(env, deferred, result, "resolve")
}

#[napi_sym::napi_sym]
fn napi_reject_deferred(
  env: *mut Env,
  deferred: napi_deferred,
  result: napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(deferred);
  settle(env, deferred, result, "reject")
}

/// `instanceof` against the global `Promise`.
#[napi_sym::napi_sym]
fn napi_is_promise(
  env: *mut Env,
  value: napi_value,
  is_promise: *mut bool,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(is_promise);
  let engine = env.engine();
  let value = raw(value)?;
  let promise = engine
    .get_property(engine.global(), js_string(engine, "Promise")?)?;
  *is_promise = engine.type_of(value).is_object()
    && engine.type_of(promise) == ValueKind::Function
    && engine.instance_of(value, promise)?;
  Ok(())
}

/// A thrown script leaves its exception pending.
#[napi_sym::napi_sym]
fn napi_run_script(
  env: *mut Env,
  script: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  env.check_no_pending_exception()?;
  let engine = env.engine();
  let script = string_arg(engine, script)?;
  let source = engine.string_value(script)?;
  match engine.run_script(&source, None) {
    Ok(value) => {
      *result = value.into_napi();
      Ok(())
    }
    Err(err) => {
      log::debug!("script failed: {err}");
      Err(err.into())
    }
  }
}

#[napi_sym::napi_sym]
fn napi_open_handle_scope(
  env: *mut Env,
  result: *mut napi_handle_scope,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = id_to_handle(env.open_scope(false));
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_close_handle_scope(env: *mut Env, scope: napi_handle_scope) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let id = handle_to_id(scope).ok_or(Error::InvalidArg)?;
  env.close_scope(id, false)
}

#[napi_sym::napi_sym]
fn napi_open_escapable_handle_scope(
  env: *mut Env,
  result: *mut napi_escapable_handle_scope,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  *result = id_to_handle(env.open_scope(true));
  Ok(())
}

#[napi_sym::napi_sym]
fn napi_close_escapable_handle_scope(
  env: *mut Env,
  scope: napi_escapable_handle_scope,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  let id = handle_to_id(scope).ok_or(Error::InvalidArg)?;
  env.close_scope(id, true)
}

#[napi_sym::napi_sym]
fn napi_escape_handle(
  env: *mut Env,
  scope: napi_escapable_handle_scope,
  escapee: napi_value,
  result: *mut napi_value,
) -> Result {
  let env: &mut Env = env.as_mut().ok_or(Error::InvalidArg)?;
  check_arg!(result);
  let escapee = raw(escapee)?;
  let id = handle_to_id(scope).ok_or(Error::InvalidArg)?;
  env.escape(id)?;
  *result = escapee.into_napi();
  Ok(())
}

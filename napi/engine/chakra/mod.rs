// Copyright 2018-2026 the Deno authors. MIT license.

//! ChakraCore backend over the JSRT API.
//!
//! The runtime's exception state is drained into the backend's own pending
//! slot as soon as a call reports it, and re-raised when control returns
//! to script. Per-object private slots and finalizers live in an external
//! holder object stored under a private symbol.

pub mod sys;

use std::any::Any;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashSet;
use std::os::raw::c_uint;
use std::os::raw::c_ushort;
use std::os::raw::c_void;
use std::ptr;
use std::rc::Rc;

use sys::*;

use crate::Error;
use crate::engine::ClassTemplate;
use crate::engine::ContinuationHook;
use crate::engine::DataViewInfo;
use crate::engine::Engine;
use crate::engine::EngineError;
use crate::engine::EngineResult;
use crate::engine::ErrorKind;
use crate::engine::Finalizer;
use crate::engine::Invocation;
use crate::engine::NativeFunction;
use crate::engine::PrivateSlot;
use crate::engine::PromiseCapability;
use crate::engine::PropertyAttributes;
use crate::engine::PropertyDefinition;
use crate::engine::PropertyValue;
use crate::engine::TypedArrayInfo;
use crate::engine::TypedArrayKind;
use crate::engine::ValueKind;
use crate::value::RawValue;

/// Maps a JSRT failure onto the closest `napi_status`.
pub fn status_for(code: JsErrorCode) -> Error {
  match code {
    JsErrorInvalidArgument | JsErrorNullArgument => Error::InvalidArg,
    JsErrorArgumentNotObject => Error::ObjectExpected,
    JsErrorPropertyNotString => Error::StringExpected,
    JsErrorPropertyNotSymbol => Error::NameExpected,
    JsErrorInExceptionState | JsErrorScriptException => {
      Error::PendingException
    }
    _ => Error::GenericFailure,
  }
}

fn to_raw(value: JsValueRef) -> EngineResult<RawValue> {
  RawValue::from_ptr(value).ok_or(EngineError::new(Error::GenericFailure))
}

fn to_js(value: RawValue) -> JsValueRef {
  value.as_ptr()
}

struct Shared {
  exception: Cell<Option<RawValue>>,
  error_code: Cell<i32>,
  holders: RefCell<HashSet<usize>>,
  slots: RefCell<HashSet<usize>>,
}

impl Shared {
  fn set_exception(&self, exception: JsValueRef) {
    // SAFETY: references are counted by the runtime.
    unsafe { JsAddRef(exception, ptr::null_mut()) };
    if let Some(previous) = self.exception.replace(to_raw(exception).ok()) {
      unsafe { JsRelease(to_js(previous), ptr::null_mut()) };
    }
  }

  fn take_exception(&self) -> Option<RawValue> {
    let exception = self.exception.take()?;
    // SAFETY: counted in `set_exception`.
    unsafe { JsRelease(to_js(exception), ptr::null_mut()) };
    Some(exception)
  }
}

enum SlotKind {
  Function,
  Class { name: String },
}

struct FunctionSlot {
  shared: Rc<Shared>,
  native: NativeFunction,
  kind: SlotKind,
}

struct Holder {
  owner: JsValueRef,
  class: *mut c_void,
  wrap: *mut c_void,
  finalizers: Vec<Finalizer>,
  shared: Rc<Shared>,
}

unsafe fn release_holder(holder: *mut Holder) {
  // SAFETY: every holder is boxed and released once.
  let mut holder = unsafe { Box::from_raw(holder) };
  let key = &*holder as *const Holder as usize;
  holder.shared.holders.borrow_mut().remove(&key);
  for finalize in holder.finalizers.drain(..) {
    finalize();
  }
}

unsafe extern "C" fn finalize_holder(data: *mut c_void) {
  if !data.is_null() {
    unsafe { release_holder(data as *mut Holder) };
  }
}

unsafe extern "C" fn free_slot(_reference: JsRef, state: *mut c_void) {
  // SAFETY: installed together with the boxed slot.
  let slot = unsafe { Box::from_raw(state as *mut FunctionSlot) };
  slot.shared.slots.borrow_mut().remove(&(state as usize));
}

unsafe extern "C" fn run_continuation(task: JsValueRef, state: *mut c_void) {
  // SAFETY: `state` points at the engine's boxed hook.
  let hook = unsafe { &*(state as *const ContinuationHook) };
  if let Ok(task) = to_raw(task) {
    hook(task);
  }
}

unsafe fn undefined_value() -> JsValueRef {
  let mut value = ptr::null_mut();
  unsafe { JsGetUndefinedValue(&mut value) };
  value
}

unsafe fn utf16(text: &str) -> JsValueRef {
  let units: Vec<u16> = text.encode_utf16().collect();
  let mut value = ptr::null_mut();
  unsafe { JsCreateStringUtf16(units.as_ptr(), units.len(), &mut value) };
  value
}

unsafe extern "C" fn native_trampoline(
  callee: JsValueRef,
  is_construct_call: bool,
  arguments: *mut JsValueRef,
  argument_count: c_ushort,
  state: *mut c_void,
) -> JsValueRef {
  // SAFETY: every native function is created with its slot as state.
  let slot = unsafe { &*(state as *const FunctionSlot) };
  let all: &[RawValue] = if argument_count == 0 || arguments.is_null() {
    &[]
  } else {
    // SAFETY: `RawValue` is a transparent non-null pointer and the
    // runtime never passes invalid references as arguments.
    unsafe {
      std::slice::from_raw_parts(
        arguments as *const RawValue,
        argument_count as usize,
      )
    }
  };
  let undefined = unsafe { undefined_value() };
  if let SlotKind::Class { name } = &slot.kind {
    if !is_construct_call {
      let message =
        format!("Class constructor {name} cannot be invoked without 'new'");
      let mut error = ptr::null_mut();
      unsafe {
        JsCreateTypeError(utf16(&message), &mut error);
        JsSetException(error);
      }
      return ptr::null_mut();
    }
  }
  let (Ok(callee), Ok(fallback)) = (to_raw(callee), to_raw(undefined)) else {
    return undefined;
  };
  let (this, args) = match all.split_first() {
    Some((this, args)) => (*this, args),
    None => (fallback, &[][..]),
  };
  let invocation = Invocation {
    callee,
    this,
    args,
    new_target: is_construct_call.then_some(callee),
  };
  // SAFETY: entries are registered together with the data they expect.
  let result = unsafe { (slot.native.entry)(slot.native.data, &invocation) };
  if let Some(pending) = slot.shared.take_exception() {
    unsafe { JsSetException(to_js(pending)) };
    return ptr::null_mut();
  }
  match (&slot.kind, result) {
    (SlotKind::Class { .. }, _) => to_js(this),
    (SlotKind::Function, Some(value)) => to_js(value),
    (SlotKind::Function, None) => undefined,
  }
}

pub struct ChakraEngine {
  runtime: JsRuntimeHandle,
  shared: Rc<Shared>,
  undefined: RawValue,
  null: RawValue,
  true_value: RawValue,
  false_value: RawValue,
  private_key: RawValue,
  source_context: Cell<JsSourceContext>,
  continuation: RefCell<Option<Box<ContinuationHook>>>,
}

impl ChakraEngine {
  /// Creates a runtime with one context and makes it current on this
  /// thread.
  pub fn new() -> EngineResult<Self> {
    let mut runtime = ptr::null_mut();
    let mut context = ptr::null_mut();
    // SAFETY: out-parameters are written on success.
    unsafe {
      raw_check(JsCreateRuntime(JsRuntimeAttributeNone, None, &mut runtime))?;
      raw_check(JsCreateContext(runtime, &mut context))?;
      raw_check(JsSetCurrentContext(context))?;
    }
    let singleton = |get: unsafe extern "C" fn(*mut JsValueRef) -> JsErrorCode| {
      let mut value = ptr::null_mut();
      // SAFETY: the context is current.
      unsafe { raw_check(get(&mut value))? };
      to_raw(value)
    };
    let undefined = singleton(JsGetUndefinedValue)?;
    let null = singleton(JsGetNullValue)?;
    let true_value = singleton(JsGetTrueValue)?;
    let false_value = singleton(JsGetFalseValue)?;
    let mut private_key = ptr::null_mut();
    unsafe {
      raw_check(JsCreateSymbol(utf16("napi.private"), &mut private_key))?;
      JsAddRef(private_key, ptr::null_mut());
    }
    Ok(Self {
      runtime,
      shared: Rc::new(Shared {
        exception: Cell::new(None),
        error_code: Cell::new(0),
        holders: RefCell::new(HashSet::new()),
        slots: RefCell::new(HashSet::new()),
      }),
      undefined,
      null,
      true_value,
      false_value,
      private_key: to_raw(private_key)?,
      source_context: Cell::new(0),
      continuation: RefCell::new(None),
    })
  }

  /// Records a failed call. Script exceptions move into the pending slot.
  fn check(&self, code: JsErrorCode) -> EngineResult<()> {
    if code == JsNoError {
      return Ok(());
    }
    self.shared.error_code.set(code as i32);
    if matches!(
      code,
      JsErrorScriptException | JsErrorScriptCompile | JsErrorInExceptionState
    ) {
      let mut exception = ptr::null_mut();
      // SAFETY: clears the runtime's exception state.
      unsafe { JsGetAndClearException(&mut exception) };
      if !exception.is_null() {
        self.shared.set_exception(exception);
      }
      return Err(EngineError::with_code(
        Error::PendingException,
        code as i32,
      ));
    }
    log::debug!("ChakraCore call failed with {code:#x}");
    Err(EngineError::with_code(status_for(code), code as i32))
  }

  fn produce(
    &self,
    call: impl FnOnce(*mut JsValueRef) -> JsErrorCode,
  ) -> EngineResult<RawValue> {
    let mut value = ptr::null_mut();
    self.check(call(&mut value))?;
    to_raw(value)
  }

  fn flag(
    &self,
    call: impl FnOnce(*mut bool) -> JsErrorCode,
  ) -> EngineResult<bool> {
    let mut value = false;
    self.check(call(&mut value))?;
    Ok(value)
  }

  fn value_type(&self, value: RawValue) -> JsValueType {
    let mut ty = JsUndefined;
    unsafe { JsGetValueType(to_js(value), &mut ty) };
    ty
  }

  fn text(&self, text: &str) -> EngineResult<RawValue> {
    let units: Vec<u16> = text.encode_utf16().collect();
    self.create_string(&units)
  }

  fn named(&self, object: RawValue, name: &str) -> EngineResult<RawValue> {
    let key = self.text(name)?;
    self.get_property(object, key)
  }

  fn set_named(
    &self,
    object: RawValue,
    name: &str,
    value: RawValue,
  ) -> EngineResult<()> {
    let key = self.text(name)?;
    self.set_property(object, key, value)
  }

  fn expect_object(&self, value: RawValue) -> EngineResult<RawValue> {
    if self.type_of(value).is_object() {
      Ok(value)
    } else {
      Err(EngineError::new(Error::ObjectExpected))
    }
  }

  fn make_function(
    &self,
    name: &str,
    native: NativeFunction,
    kind: SlotKind,
  ) -> EngineResult<RawValue> {
    let name = self.text(name)?;
    let slot = Box::into_raw(Box::new(FunctionSlot {
      shared: self.shared.clone(),
      native,
      kind,
    }));
    let function = self.produce(|out| unsafe {
      JsCreateNamedFunction(
        to_js(name),
        Some(native_trampoline),
        slot as *mut c_void,
        out,
      )
    });
    let function = match function {
      Ok(function) => function,
      Err(err) => {
        // SAFETY: the runtime never saw the slot.
        drop(unsafe { Box::from_raw(slot) });
        return Err(err);
      }
    };
    self.shared.slots.borrow_mut().insert(slot as usize);
    self.check(unsafe {
      JsSetObjectBeforeCollectCallback(
        to_js(function),
        slot as *mut c_void,
        Some(free_slot),
      )
    })?;
    Ok(function)
  }

  fn new_holder(&self, owner: JsValueRef) -> *mut Holder {
    let holder = Box::into_raw(Box::new(Holder {
      owner,
      class: ptr::null_mut(),
      wrap: ptr::null_mut(),
      finalizers: Vec::new(),
      shared: self.shared.clone(),
    }));
    self.shared.holders.borrow_mut().insert(holder as usize);
    holder
  }

  /// The holder owned by `object` itself, not one inherited through its
  /// prototype chain.
  fn holder(&self, object: RawValue, create: bool) -> EngineResult<*mut Holder> {
    let object = self.expect_object(object)?;
    let owns = self.flag(|out| unsafe {
      JsObjectHasOwnProperty(to_js(object), to_js(self.private_key), out)
    })?;
    if owns {
      let existing = self.get_property(object, self.private_key)?;
      let mut data = ptr::null_mut();
      self.check(unsafe { JsGetExternalData(to_js(existing), &mut data) })?;
      let holder = data as *mut Holder;
      if !holder.is_null() && unsafe { (*holder).owner } == to_js(object) {
        return Ok(holder);
      }
    }
    if !create {
      return Ok(ptr::null_mut());
    }
    let holder = self.new_holder(to_js(object));
    let holder_object = self.produce(|out| unsafe {
      JsCreateExternalObject(holder as *mut c_void, Some(finalize_holder), out)
    });
    let holder_object = match holder_object {
      Ok(holder_object) => holder_object,
      Err(err) => {
        unsafe { release_holder(holder) };
        return Err(err);
      }
    };
    self.define_property(
      object,
      &PropertyDefinition {
        key: self.private_key,
        value: PropertyValue::Data(holder_object),
        attributes: PropertyAttributes {
          writable: false,
          enumerable: false,
          configurable: false,
        },
      },
    )?;
    Ok(holder)
  }

  fn typed_array_details(
    &self,
    value: RawValue,
  ) -> EngineResult<(JsTypedArrayType, JsValueRef, c_uint, c_uint)> {
    let mut ty = JsArrayTypeInt8;
    let mut buffer = ptr::null_mut();
    let mut byte_offset = 0;
    let mut byte_length = 0;
    self.check(unsafe {
      JsGetTypedArrayInfo(
        to_js(value),
        &mut ty,
        &mut buffer,
        &mut byte_offset,
        &mut byte_length,
      )
    })?;
    Ok((ty, buffer, byte_offset, byte_length))
  }

  fn index_value(&self, index: u32) -> EngineResult<RawValue> {
    self.create_number(index as f64)
  }
}

fn raw_check(code: JsErrorCode) -> EngineResult<()> {
  if code == JsNoError {
    Ok(())
  } else {
    Err(EngineError::with_code(status_for(code), code as i32))
  }
}

fn checked_u32(value: usize) -> EngineResult<c_uint> {
  c_uint::try_from(value).map_err(|_| EngineError::new(Error::InvalidArg))
}

impl Drop for ChakraEngine {
  fn drop(&mut self) {
    self.shared.take_exception();
    // SAFETY: the runtime is idle and owned by this engine.
    unsafe {
      JsRelease(to_js(self.private_key), ptr::null_mut());
      JsSetCurrentContext(ptr::null_mut());
      JsDisposeRuntime(self.runtime);
    }
    let slots: Vec<usize> = self.shared.slots.borrow_mut().drain().collect();
    for slot in slots {
      // SAFETY: slots whose functions were never collected are still boxed.
      drop(unsafe { Box::from_raw(slot as *mut FunctionSlot) });
    }
  }
}

fn typed_array_kind(ty: JsTypedArrayType) -> Option<TypedArrayKind> {
  Some(match ty {
    JsArrayTypeInt8 => TypedArrayKind::Int8,
    JsArrayTypeUint8 => TypedArrayKind::Uint8,
    JsArrayTypeUint8Clamped => TypedArrayKind::Uint8Clamped,
    JsArrayTypeInt16 => TypedArrayKind::Int16,
    JsArrayTypeUint16 => TypedArrayKind::Uint16,
    JsArrayTypeInt32 => TypedArrayKind::Int32,
    JsArrayTypeUint32 => TypedArrayKind::Uint32,
    JsArrayTypeFloat32 => TypedArrayKind::Float32,
    JsArrayTypeFloat64 => TypedArrayKind::Float64,
    _ => return None,
  })
}

fn typed_array_type(kind: TypedArrayKind) -> JsTypedArrayType {
  match kind {
    TypedArrayKind::Int8 => JsArrayTypeInt8,
    TypedArrayKind::Uint8 => JsArrayTypeUint8,
    TypedArrayKind::Uint8Clamped => JsArrayTypeUint8Clamped,
    TypedArrayKind::Int16 => JsArrayTypeInt16,
    TypedArrayKind::Uint16 => JsArrayTypeUint16,
    TypedArrayKind::Int32 => JsArrayTypeInt32,
    TypedArrayKind::Uint32 => JsArrayTypeUint32,
    TypedArrayKind::Float32 => JsArrayTypeFloat32,
    TypedArrayKind::Float64 => JsArrayTypeFloat64,
  }
}

impl Engine for ChakraEngine {
  fn name(&self) -> &'static str {
    "chakracore"
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn global(&self) -> RawValue {
    self
      .produce(|out| unsafe { JsGetGlobalObject(out) })
      .unwrap_or(self.undefined)
  }

  fn undefined(&self) -> RawValue {
    self.undefined
  }

  fn null(&self) -> RawValue {
    self.null
  }

  fn boolean(&self, value: bool) -> RawValue {
    if value { self.true_value } else { self.false_value }
  }

  fn create_number(&self, value: f64) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsDoubleToNumber(value, out) })
  }

  fn create_string(&self, units: &[u16]) -> EngineResult<RawValue> {
    self.produce(|out| unsafe {
      JsCreateStringUtf16(units.as_ptr(), units.len(), out)
    })
  }

  fn create_symbol(
    &self,
    description: Option<RawValue>,
  ) -> EngineResult<RawValue> {
    let description = description.map_or(ptr::null_mut(), to_js);
    self.produce(|out| unsafe { JsCreateSymbol(description, out) })
  }

  fn create_object(&self) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsCreateObject(out) })
  }

  fn create_array(&self, length: u32) -> EngineResult<RawValue> {
    let array = self.produce(|out| unsafe { JsCreateArray(length, out) })?;
    for index in 0..length {
      self.set_element(array, index, self.null)?;
    }
    Ok(array)
  }

  fn create_error(
    &self,
    kind: ErrorKind,
    message: RawValue,
  ) -> EngineResult<RawValue> {
    let message = to_js(message);
    self.produce(|out| unsafe {
      match kind {
        ErrorKind::Error => JsCreateError(message, out),
        ErrorKind::TypeError => JsCreateTypeError(message, out),
        ErrorKind::RangeError => JsCreateRangeError(message, out),
      }
    })
  }

  fn create_external(&self, data: *mut c_void) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsCreateExternalObject(data, None, out) })
  }

  fn create_function(
    &self,
    name: &str,
    function: NativeFunction,
  ) -> EngineResult<RawValue> {
    self.make_function(name, function, SlotKind::Function)
  }

  fn create_class(&self, template: &ClassTemplate) -> EngineResult<RawValue> {
    let constructor = self.make_function(
      &template.name,
      template.constructor,
      SlotKind::Class {
        name: template.name.clone(),
      },
    )?;
    let prototype = self.create_object()?;
    self.set_named(constructor, "prototype", prototype)?;
    self.define_property(
      prototype,
      &PropertyDefinition {
        key: self.text("constructor")?,
        value: PropertyValue::Data(constructor),
        attributes: PropertyAttributes::HIDDEN,
      },
    )?;
    Ok(constructor)
  }

  fn create_promise(&self) -> EngineResult<PromiseCapability> {
    let mut promise = ptr::null_mut();
    let mut resolve = ptr::null_mut();
    let mut reject = ptr::null_mut();
    self.check(unsafe {
      JsCreatePromise(&mut promise, &mut resolve, &mut reject)
    })?;
    Ok(PromiseCapability {
      promise: to_raw(promise)?,
      resolve: to_raw(resolve)?,
      reject: to_raw(reject)?,
    })
  }

  fn create_array_buffer(
    &self,
    byte_length: usize,
  ) -> EngineResult<(RawValue, *mut u8)> {
    let length = checked_u32(byte_length)?;
    let buffer =
      self.produce(|out| unsafe { JsCreateArrayBuffer(length, out) })?;
    let (data, _) = self.array_buffer_info(buffer)?;
    Ok((buffer, data))
  }

  fn create_external_array_buffer(
    &self,
    data: *mut u8,
    byte_length: usize,
    finalizer: Option<Finalizer>,
  ) -> EngineResult<RawValue> {
    let length = checked_u32(byte_length)?;
    let holder = self.new_holder(ptr::null_mut());
    if let Some(finalizer) = finalizer {
      unsafe { (*holder).finalizers.push(finalizer) };
    }
    let buffer = self.produce(|out| unsafe {
      JsCreateExternalArrayBuffer(
        data as *mut c_void,
        length,
        Some(finalize_holder),
        holder as *mut c_void,
        out,
      )
    });
    if buffer.is_err() {
      unsafe { release_holder(holder) };
    }
    buffer
  }

  fn create_typed_array(
    &self,
    kind: TypedArrayKind,
    length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue> {
    let length = checked_u32(length)?;
    let byte_offset = checked_u32(byte_offset)?;
    self.produce(|out| unsafe {
      JsCreateTypedArray(
        typed_array_type(kind),
        to_js(buffer),
        byte_offset,
        length,
        out,
      )
    })
  }

  fn create_data_view(
    &self,
    byte_length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue> {
    let byte_length = checked_u32(byte_length)?;
    let byte_offset = checked_u32(byte_offset)?;
    self.produce(|out| unsafe {
      JsCreateDataView(to_js(buffer), byte_offset, byte_length, out)
    })
  }

  fn type_of(&self, value: RawValue) -> ValueKind {
    match self.value_type(value) {
      JsUndefined => ValueKind::Undefined,
      JsNull => ValueKind::Null,
      JsBoolean => ValueKind::Boolean,
      JsNumber => ValueKind::Number,
      JsString => ValueKind::String,
      JsSymbol => ValueKind::Symbol,
      JsFunction => ValueKind::Function,
      _ => {
        let mut external = false;
        unsafe { JsHasExternalData(to_js(value), &mut external) };
        if external {
          ValueKind::External
        } else {
          ValueKind::Object
        }
      }
    }
  }

  fn is_array(&self, value: RawValue) -> bool {
    self.value_type(value) == JsArray
  }

  fn is_error(&self, value: RawValue) -> bool {
    self.value_type(value) == JsError
  }

  fn is_array_buffer(&self, value: RawValue) -> bool {
    self.value_type(value) == JsArrayBuffer
  }

  fn is_typed_array(&self, value: RawValue) -> bool {
    self.value_type(value) == JsTypedArray
  }

  fn is_data_view(&self, value: RawValue) -> bool {
    self.value_type(value) == JsDataView
  }

  fn strict_equals(&self, a: RawValue, b: RawValue) -> bool {
    let mut equal = false;
    unsafe { JsStrictEquals(to_js(a), to_js(b), &mut equal) };
    equal
  }

  fn instance_of(
    &self,
    object: RawValue,
    constructor: RawValue,
  ) -> EngineResult<bool> {
    if self.type_of(constructor) != ValueKind::Function {
      return Err(EngineError::new(Error::FunctionExpected));
    }
    self.flag(|out| unsafe {
      JsInstanceOf(to_js(object), to_js(constructor), out)
    })
  }

  fn number_value(&self, value: RawValue) -> EngineResult<f64> {
    if self.value_type(value) != JsNumber {
      return Err(EngineError::new(Error::NumberExpected));
    }
    let mut number = 0.0;
    self.check(unsafe { JsNumberToDouble(to_js(value), &mut number) })?;
    Ok(number)
  }

  fn bool_value(&self, value: RawValue) -> EngineResult<bool> {
    if self.value_type(value) != JsBoolean {
      return Err(EngineError::new(Error::BooleanExpected));
    }
    self.flag(|out| unsafe { JsBooleanToBool(to_js(value), out) })
  }

  fn string_value(&self, value: RawValue) -> EngineResult<Vec<u16>> {
    if self.value_type(value) != JsString {
      return Err(EngineError::new(Error::StringExpected));
    }
    let mut length = 0;
    self.check(unsafe { JsGetStringLength(to_js(value), &mut length) })?;
    let mut units = vec![0u16; length.max(0) as usize];
    let mut written = 0;
    self.check(unsafe {
      JsCopyStringUtf16(
        to_js(value),
        0,
        length,
        units.as_mut_ptr(),
        &mut written,
      )
    })?;
    units.truncate(written);
    Ok(units)
  }

  fn external_value(&self, value: RawValue) -> EngineResult<*mut c_void> {
    if self.type_of(value) != ValueKind::External {
      return Err(EngineError::new(Error::InvalidArg));
    }
    let mut data = ptr::null_mut();
    self.check(unsafe { JsGetExternalData(to_js(value), &mut data) })?;
    Ok(data)
  }

  fn coerce_to_bool(&self, value: RawValue) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsConvertValueToBoolean(to_js(value), out) })
  }

  fn coerce_to_number(&self, value: RawValue) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsConvertValueToNumber(to_js(value), out) })
  }

  fn coerce_to_object(&self, value: RawValue) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsConvertValueToObject(to_js(value), out) })
  }

  fn coerce_to_string(&self, value: RawValue) -> EngineResult<RawValue> {
    self.produce(|out| unsafe { JsConvertValueToString(to_js(value), out) })
  }

  fn get_prototype(&self, object: RawValue) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    self.produce(|out| unsafe { JsGetPrototype(to_js(object), out) })
  }

  fn get_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    self.produce(|out| unsafe {
      JsObjectGetProperty(to_js(object), to_js(key), out)
    })
  }

  fn set_property(
    &self,
    object: RawValue,
    key: RawValue,
    value: RawValue,
  ) -> EngineResult<()> {
    let object = self.expect_object(object)?;
    self.check(unsafe {
      JsObjectSetProperty(to_js(object), to_js(key), to_js(value), true)
    })
  }

  fn has_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool> {
    let object = self.expect_object(object)?;
    self.flag(|out| unsafe {
      JsObjectHasProperty(to_js(object), to_js(key), out)
    })
  }

  fn delete_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool> {
    let object = self.expect_object(object)?;
    let result = self.produce(|out| unsafe {
      JsObjectDeleteProperty(to_js(object), to_js(key), false, out)
    })?;
    self.bool_value(result)
  }

  fn define_property(
    &self,
    object: RawValue,
    definition: &PropertyDefinition,
  ) -> EngineResult<()> {
    let object = self.expect_object(object)?;
    let descriptor = self.create_object()?;
    let attributes = definition.attributes;
    self.set_named(
      descriptor,
      "enumerable",
      self.boolean(attributes.enumerable),
    )?;
    self.set_named(
      descriptor,
      "configurable",
      self.boolean(attributes.configurable),
    )?;
    match definition.value {
      PropertyValue::Data(value) => {
        self.set_named(descriptor, "value", value)?;
        self.set_named(
          descriptor,
          "writable",
          self.boolean(attributes.writable),
        )?;
      }
      PropertyValue::Accessor { getter, setter } => {
        if let Some(getter) = getter {
          let getter = self.create_function("get", getter)?;
          self.set_named(descriptor, "get", getter)?;
        }
        if let Some(setter) = setter {
          let setter = self.create_function("set", setter)?;
          self.set_named(descriptor, "set", setter)?;
        }
      }
    }
    let defined = self.flag(|out| unsafe {
      JsObjectDefineProperty(
        to_js(object),
        to_js(definition.key),
        to_js(descriptor),
        out,
      )
    })?;
    if defined {
      Ok(())
    } else {
      Err(EngineError::new(Error::GenericFailure))
    }
  }

  fn own_property_names(&self, object: RawValue) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    let constructor = self.named(self.global(), "Object")?;
    let keys = self.named(constructor, "keys")?;
    self.call_function(keys, constructor, &[object])
  }

  fn get_element(
    &self,
    object: RawValue,
    index: u32,
  ) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    let index = self.index_value(index)?;
    self.produce(|out| unsafe {
      JsGetIndexedProperty(to_js(object), to_js(index), out)
    })
  }

  fn set_element(
    &self,
    object: RawValue,
    index: u32,
    value: RawValue,
  ) -> EngineResult<()> {
    let object = self.expect_object(object)?;
    let index = self.index_value(index)?;
    self.check(unsafe {
      JsSetIndexedProperty(to_js(object), to_js(index), to_js(value))
    })
  }

  fn has_element(&self, object: RawValue, index: u32) -> EngineResult<bool> {
    let object = self.expect_object(object)?;
    let index = self.index_value(index)?;
    self.flag(|out| unsafe {
      JsHasIndexedProperty(to_js(object), to_js(index), out)
    })
  }

  fn delete_element(
    &self,
    object: RawValue,
    index: u32,
  ) -> EngineResult<bool> {
    let object = self.expect_object(object)?;
    let index = self.index_value(index)?;
    self.check(unsafe {
      JsDeleteIndexedProperty(to_js(object), to_js(index))
    })?;
    Ok(true)
  }

  fn array_length(&self, array: RawValue) -> EngineResult<u32> {
    let length = self.named(array, "length")?;
    Ok(crate::util::to_uint32(self.number_value(length)?))
  }

  fn call_function(
    &self,
    function: RawValue,
    this: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue> {
    if self.type_of(function) != ValueKind::Function {
      return Err(EngineError::new(Error::FunctionExpected));
    }
    let mut arguments: Vec<JsValueRef> = Vec::with_capacity(args.len() + 1);
    arguments.push(to_js(this));
    arguments.extend(args.iter().copied().map(to_js));
    let count = c_ushort::try_from(arguments.len())
      .map_err(|_| EngineError::new(Error::InvalidArg))?;
    self.produce(|out| unsafe {
      JsCallFunction(to_js(function), arguments.as_mut_ptr(), count, out)
    })
  }

  fn construct(
    &self,
    constructor: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue> {
    if self.type_of(constructor) != ValueKind::Function {
      return Err(EngineError::new(Error::FunctionExpected));
    }
    let mut arguments: Vec<JsValueRef> = Vec::with_capacity(args.len() + 1);
    arguments.push(to_js(self.undefined));
    arguments.extend(args.iter().copied().map(to_js));
    let count = c_ushort::try_from(arguments.len())
      .map_err(|_| EngineError::new(Error::InvalidArg))?;
    self.produce(|out| unsafe {
      JsConstructObject(to_js(constructor), arguments.as_mut_ptr(), count, out)
    })
  }

  fn array_buffer_info(
    &self,
    value: RawValue,
  ) -> EngineResult<(*mut u8, usize)> {
    if !self.is_array_buffer(value) {
      return Err(EngineError::new(Error::InvalidArg));
    }
    let mut data = ptr::null_mut();
    let mut length = 0;
    self.check(unsafe {
      JsGetArrayBufferStorage(to_js(value), &mut data, &mut length)
    })?;
    Ok((data, length as usize))
  }

  fn typed_array_info(&self, value: RawValue) -> EngineResult<TypedArrayInfo> {
    if !self.is_typed_array(value) {
      return Err(EngineError::new(Error::InvalidArg));
    }
    let (ty, buffer, byte_offset, byte_length) =
      self.typed_array_details(value)?;
    let kind =
      typed_array_kind(ty).ok_or(EngineError::new(Error::InvalidArg))?;
    let mut data = ptr::null_mut();
    let mut storage_length = 0;
    let mut storage_type = ty;
    let mut element_size = 0;
    // The storage pointer already includes the view's byte offset.
    self.check(unsafe {
      JsGetTypedArrayStorage(
        to_js(value),
        &mut data,
        &mut storage_length,
        &mut storage_type,
        &mut element_size,
      )
    })?;
    Ok(TypedArrayInfo {
      kind,
      length: byte_length as usize / kind.element_size(),
      data,
      buffer: to_raw(buffer)?,
      byte_offset: byte_offset as usize,
    })
  }

  fn data_view_info(&self, value: RawValue) -> EngineResult<DataViewInfo> {
    if !self.is_data_view(value) {
      return Err(EngineError::new(Error::InvalidArg));
    }
    let mut data = ptr::null_mut();
    let mut byte_length = 0;
    self.check(unsafe {
      JsGetDataViewStorage(to_js(value), &mut data, &mut byte_length)
    })?;
    let buffer = self.named(value, "buffer")?;
    let byte_offset = self.named(value, "byteOffset")?;
    Ok(DataViewInfo {
      byte_length: byte_length as usize,
      data,
      buffer,
      byte_offset: self.number_value(byte_offset)? as usize,
    })
  }

  fn set_private(
    &self,
    object: RawValue,
    slot: PrivateSlot,
    data: *mut c_void,
  ) -> EngineResult<()> {
    let holder = self.holder(object, true)?;
    // SAFETY: holders stay alive as long as their owner.
    let holder = unsafe { &mut *holder };
    match slot {
      PrivateSlot::Class => holder.class = data,
      PrivateSlot::Wrap => holder.wrap = data,
    }
    Ok(())
  }

  fn get_private(
    &self,
    object: RawValue,
    slot: PrivateSlot,
  ) -> EngineResult<*mut c_void> {
    let holder = self.holder(object, false)?;
    if holder.is_null() {
      return Ok(ptr::null_mut());
    }
    // SAFETY: as in `set_private`.
    let holder = unsafe { &*holder };
    Ok(match slot {
      PrivateSlot::Class => holder.class,
      PrivateSlot::Wrap => holder.wrap,
    })
  }

  fn add_finalizer(
    &self,
    object: RawValue,
    finalizer: Finalizer,
  ) -> EngineResult<()> {
    let holder = self.holder(object, true)?;
    // SAFETY: as in `set_private`.
    unsafe { (*holder).finalizers.push(finalizer) };
    Ok(())
  }

  fn protect(&self, value: RawValue) {
    unsafe { JsAddRef(to_js(value), ptr::null_mut()) };
  }

  fn unprotect(&self, value: RawValue) {
    unsafe { JsRelease(to_js(value), ptr::null_mut()) };
  }

  fn throw(&self, error: RawValue) {
    self.shared.set_exception(to_js(error));
  }

  fn has_exception(&self) -> bool {
    self.shared.exception.get().is_some()
  }

  fn take_exception(&self) -> Option<RawValue> {
    self.shared.take_exception()
  }

  fn run_script(
    &self,
    source: &[u16],
    source_url: Option<&str>,
  ) -> EngineResult<RawValue> {
    let script = self.create_string(source)?;
    let url = self.text(source_url.unwrap_or(""))?;
    let context = self.source_context.get();
    self.source_context.set(context + 1);
    self.produce(|out| unsafe {
      JsRun(
        to_js(script),
        context,
        to_js(url),
        JsParseScriptAttributeNone,
        out,
      )
    })
  }

  fn set_promise_continuation(&self, hook: ContinuationHook) -> bool {
    let hook = Box::new(hook);
    let state = &*hook as *const ContinuationHook as *mut c_void;
    let code = unsafe {
      JsSetPromiseContinuationCallback(Some(run_continuation), state)
    };
    if code != JsNoError {
      log::warn!("unable to install promise continuation hook: {code:#x}");
      return false;
    }
    *self.continuation.borrow_mut() = Some(hook);
    true
  }

  fn collect_garbage(&self) {
    unsafe { JsCollectGarbage(self.runtime) };
  }

  fn finalize_all(&self) {
    let holders: Vec<usize> =
      self.shared.holders.borrow().iter().copied().collect();
    for holder in holders {
      // SAFETY: registered holders are alive until released.
      let finalizers =
        std::mem::take(unsafe { &mut (*(holder as *mut Holder)).finalizers });
      for finalize in finalizers {
        finalize();
      }
    }
  }

  fn take_error_code(&self) -> i32 {
    self.shared.error_code.replace(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_codes_map_to_statuses() {
    assert_eq!(status_for(JsErrorInvalidArgument), Error::InvalidArg);
    assert_eq!(status_for(JsErrorNullArgument), Error::InvalidArg);
    assert_eq!(status_for(JsErrorArgumentNotObject), Error::ObjectExpected);
    assert_eq!(status_for(JsErrorPropertyNotString), Error::StringExpected);
    assert_eq!(status_for(JsErrorPropertyNotSymbol), Error::NameExpected);
    assert_eq!(status_for(JsErrorScriptException), Error::PendingException);
    assert_eq!(status_for(JsErrorOutOfMemory), Error::GenericFailure);
  }
}

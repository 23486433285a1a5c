// Copyright 2018-2026 the Deno authors. MIT license.

//! JavaScriptCore backend over the public C API.
//!
//! Native functions are objects of a private JS class whose private data is
//! a boxed [`FunctionSlot`]. Per-object private slots and finalizers live
//! in a holder object stored under a private symbol, since ordinary objects
//! carry no private data in the C API.

pub mod sys;

use std::any::Any;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashSet;
use std::os::raw::c_void;
use std::ptr;
use std::rc::Rc;

use sys::*;

use crate::Error;
use crate::engine::ClassTemplate;
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
use crate::engine::PropertyDefinition;
use crate::engine::PropertyValue;
use crate::engine::TypedArrayInfo;
use crate::engine::TypedArrayKind;
use crate::engine::ValueKind;
use crate::value::RawValue;

fn to_raw(value: JSValueRef) -> EngineResult<RawValue> {
  RawValue::from_ptr(value as *mut c_void)
    .ok_or(EngineError::new(Error::GenericFailure))
}

fn to_js(value: RawValue) -> JSValueRef {
  value.as_ptr() as JSValueRef
}

fn to_object(value: RawValue) -> JSObjectRef {
  value.as_ptr() as JSObjectRef
}

/// Owned `JSStringRef`.
struct JsString(JSStringRef);

impl JsString {
  fn from_units(units: &[u16]) -> Self {
    // SAFETY: the characters are copied.
    Self(unsafe { JSStringCreateWithCharacters(units.as_ptr(), units.len()) })
  }

  fn from_str(text: &str) -> Self {
    let units: Vec<u16> = text.encode_utf16().collect();
    Self::from_units(&units)
  }

  fn to_units(&self) -> Vec<u16> {
    // SAFETY: the pointer is valid while the string is alive.
    unsafe {
      let len = JSStringGetLength(self.0);
      if len == 0 {
        return Vec::new();
      }
      std::slice::from_raw_parts(JSStringGetCharactersPtr(self.0), len).to_vec()
    }
  }
}

impl Drop for JsString {
  fn drop(&mut self) {
    if !self.0.is_null() {
      // SAFETY: created by one of the constructors above.
      unsafe { JSStringRelease(self.0) };
    }
  }
}

/// State shared between the engine and the callbacks JavaScriptCore calls.
struct Shared {
  ctx: JSGlobalContextRef,
  exception: Cell<Option<RawValue>>,
  holders: RefCell<HashSet<usize>>,
}

impl Shared {
  fn set_exception(&self, exception: JSValueRef) {
    // SAFETY: the context outlives every value it produced.
    unsafe { JSValueProtect(self.ctx, exception) };
    if let Some(previous) = self.exception.replace(to_raw(exception).ok()) {
      unsafe { JSValueUnprotect(self.ctx, to_js(previous)) };
    }
  }

  fn take_exception(&self) -> Option<RawValue> {
    let exception = self.exception.take()?;
    // SAFETY: protected in `set_exception`.
    unsafe { JSValueUnprotect(self.ctx, to_js(exception)) };
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

/// Private data and finalizers of one object, or the release hook of one
/// array buffer.
struct Holder {
  owner: JSObjectRef,
  class: *mut c_void,
  wrap: *mut c_void,
  finalizers: Vec<Finalizer>,
  shared: Rc<Shared>,
}

unsafe fn release_holder(holder: *mut Holder) {
  // SAFETY: every holder is boxed and released once.
  let mut holder = unsafe { Box::from_raw(holder) };
  holder.shared.holders.borrow_mut().remove(&(&*holder as *const Holder as usize));
  for finalize in holder.finalizers.drain(..) {
    finalize();
  }
}

unsafe extern "C" fn finalize_holder(object: JSObjectRef) {
  let holder = unsafe { JSObjectGetPrivate(object) } as *mut Holder;
  if !holder.is_null() {
    unsafe { release_holder(holder) };
  }
}

unsafe extern "C" fn deallocate_buffer(_bytes: *mut c_void, context: *mut c_void) {
  if !context.is_null() {
    unsafe { release_holder(context as *mut Holder) };
  }
}

unsafe extern "C" fn finalize_function(object: JSObjectRef) {
  let slot = unsafe { JSObjectGetPrivate(object) } as *mut FunctionSlot;
  if !slot.is_null() {
    drop(unsafe { Box::from_raw(slot) });
  }
}

unsafe fn global_property(ctx: JSContextRef, name: &str) -> JSValueRef {
  let name = JsString::from_str(name);
  unsafe {
    JSObjectGetProperty(
      ctx,
      JSContextGetGlobalObject(ctx),
      name.0,
      ptr::null_mut(),
    )
  }
}

unsafe fn type_error(ctx: JSContextRef, message: &str) -> JSValueRef {
  let message = JsString::from_str(message);
  unsafe {
    let args = [JSValueMakeString(ctx, message.0)];
    let constructor = global_property(ctx, "TypeError") as JSObjectRef;
    JSObjectCallAsConstructor(ctx, constructor, 1, args.as_ptr(), ptr::null_mut())
  }
}

unsafe fn dispatch(
  ctx: JSContextRef,
  slot: &FunctionSlot,
  callee: JSObjectRef,
  this: JSValueRef,
  argument_count: usize,
  arguments: *const JSValueRef,
  new_target: Option<RawValue>,
  exception: *mut JSValueRef,
) -> JSValueRef {
  let (Ok(callee), Ok(this)) = (to_raw(callee), to_raw(this)) else {
    return unsafe { JSValueMakeUndefined(ctx) };
  };
  let args: &[RawValue] = if argument_count == 0 {
    &[]
  } else {
    // SAFETY: `RawValue` is a transparent non-null pointer and
    // JavaScriptCore never passes empty values as arguments.
    unsafe {
      std::slice::from_raw_parts(arguments as *const RawValue, argument_count)
    }
  };
  let invocation = Invocation {
    callee,
    this,
    args,
    new_target,
  };
  // SAFETY: entries are registered together with the data they expect.
  let result = unsafe { (slot.native.entry)(slot.native.data, &invocation) };
  if let Some(pending) = slot.shared.take_exception() {
    if !exception.is_null() {
      unsafe { *exception = to_js(pending) };
    }
    return unsafe { JSValueMakeUndefined(ctx) };
  }
  match result {
    Some(value) => to_js(value),
    None => unsafe { JSValueMakeUndefined(ctx) },
  }
}

unsafe extern "C" fn call_as_function(
  ctx: JSContextRef,
  function: JSObjectRef,
  this_object: JSObjectRef,
  argument_count: usize,
  arguments: *const JSValueRef,
  exception: *mut JSValueRef,
) -> JSValueRef {
  let slot = unsafe { &*(JSObjectGetPrivate(function) as *const FunctionSlot) };
  if let SlotKind::Class { name } = &slot.kind {
    let message = format!("Class constructor {name} cannot be invoked without 'new'");
    unsafe {
      *exception = type_error(ctx, &message);
      return JSValueMakeUndefined(ctx);
    }
  }
  let this = if this_object.is_null() {
    unsafe { JSValueMakeUndefined(ctx) }
  } else {
    this_object as JSValueRef
  };
  unsafe {
    dispatch(
      ctx,
      slot,
      function,
      this,
      argument_count,
      arguments,
      None,
      exception,
    )
  }
}

unsafe extern "C" fn call_as_constructor(
  ctx: JSContextRef,
  constructor: JSObjectRef,
  argument_count: usize,
  arguments: *const JSValueRef,
  exception: *mut JSValueRef,
) -> JSObjectRef {
  let slot =
    unsafe { &*(JSObjectGetPrivate(constructor) as *const FunctionSlot) };
  let prototype_key = JsString::from_str("prototype");
  unsafe {
    let prototype =
      JSObjectGetProperty(ctx, constructor, prototype_key.0, exception);
    if !(*exception).is_null() {
      return ptr::null_mut();
    }
    let instance = JSObjectMake(ctx, ptr::null_mut(), ptr::null_mut());
    if JSValueIsObject(ctx, prototype) {
      JSObjectSetPrototype(ctx, instance, prototype);
    }
    dispatch(
      ctx,
      slot,
      constructor,
      instance as JSValueRef,
      argument_count,
      arguments,
      to_raw(constructor as JSValueRef).ok(),
      exception,
    );
    if !(*exception).is_null() {
      return ptr::null_mut();
    }
    instance
  }
}

unsafe extern "C" fn has_instance(
  ctx: JSContextRef,
  constructor: JSObjectRef,
  possible_instance: JSValueRef,
  exception: *mut JSValueRef,
) -> bool {
  unsafe {
    if !JSValueIsObject(ctx, possible_instance) {
      return false;
    }
    let prototype_key = JsString::from_str("prototype");
    let prototype =
      JSObjectGetProperty(ctx, constructor, prototype_key.0, exception);
    let mut current = JSObjectGetPrototype(ctx, possible_instance as JSObjectRef);
    while JSValueIsObject(ctx, current) {
      if JSValueIsStrictEqual(ctx, current, prototype) {
        return true;
      }
      current = JSObjectGetPrototype(ctx, current as JSObjectRef);
    }
    false
  }
}

struct Classes {
  function: JSClassRef,
  constructor: JSClassRef,
  holder: JSClassRef,
  external: JSClassRef,
}

impl Classes {
  fn create() -> Self {
    let function = JSClassDefinition {
      className: c"NativeFunction".as_ptr(),
      finalize: Some(finalize_function),
      callAsFunction: Some(call_as_function),
      ..JSClassDefinition::EMPTY
    };
    let constructor = JSClassDefinition {
      className: c"NativeClass".as_ptr(),
      finalize: Some(finalize_function),
      callAsFunction: Some(call_as_function),
      callAsConstructor: Some(call_as_constructor),
      hasInstance: Some(has_instance),
      ..JSClassDefinition::EMPTY
    };
    let holder = JSClassDefinition {
      className: c"NativeData".as_ptr(),
      attributes: kJSClassAttributeNoAutomaticPrototype,
      finalize: Some(finalize_holder),
      ..JSClassDefinition::EMPTY
    };
    let external = JSClassDefinition {
      className: c"External".as_ptr(),
      ..JSClassDefinition::EMPTY
    };
    // SAFETY: the definitions are copied.
    unsafe {
      Self {
        function: JSClassCreate(&function),
        constructor: JSClassCreate(&constructor),
        holder: JSClassCreate(&holder),
        external: JSClassCreate(&external),
      }
    }
  }
}

impl Drop for Classes {
  fn drop(&mut self) {
    // SAFETY: objects keep their own class alive.
    unsafe {
      JSClassRelease(self.function);
      JSClassRelease(self.constructor);
      JSClassRelease(self.holder);
      JSClassRelease(self.external);
    }
  }
}

pub struct JscEngine {
  ctx: JSGlobalContextRef,
  shared: Rc<Shared>,
  classes: Classes,
  private_key: JSValueRef,
  function_prototype: JSValueRef,
  define_property: JSObjectRef,
}

impl JscEngine {
  /// Creates an engine with a fresh global context.
  pub fn new() -> Self {
    // SAFETY: a null class requests the default global object.
    let ctx = unsafe { JSGlobalContextCreate(ptr::null_mut()) };
    // SAFETY: the engine owns the new context.
    unsafe { Self::with_context(ctx) }
  }

  /// Wraps a context owned by the host. The engine retains it.
  ///
  /// # Safety
  ///
  /// `ctx` must be a live global context used only from this thread.
  pub unsafe fn from_context(ctx: JSGlobalContextRef) -> Self {
    unsafe { Self::with_context(JSGlobalContextRetain(ctx)) }
  }

  unsafe fn with_context(ctx: JSGlobalContextRef) -> Self {
    let description = JsString::from_str("napi.private");
    unsafe {
      let private_key = JSValueMakeSymbol(ctx, description.0);
      JSValueProtect(ctx, private_key);
      let function = global_property(ctx, "Function") as JSObjectRef;
      let prototype_key = JsString::from_str("prototype");
      let function_prototype =
        JSObjectGetProperty(ctx, function, prototype_key.0, ptr::null_mut());
      JSValueProtect(ctx, function_prototype);
      let object = global_property(ctx, "Object") as JSObjectRef;
      let define_key = JsString::from_str("defineProperty");
      let define_property =
        JSObjectGetProperty(ctx, object, define_key.0, ptr::null_mut())
          as JSObjectRef;
      JSValueProtect(ctx, define_property);
      Self {
        ctx,
        shared: Rc::new(Shared {
          ctx,
          exception: Cell::new(None),
          holders: RefCell::new(HashSet::new()),
        }),
        classes: Classes::create(),
        private_key,
        function_prototype,
        define_property,
      }
    }
  }

  pub fn context(&self) -> JSGlobalContextRef {
    self.ctx
  }

  fn check(&self, exception: JSValueRef) -> EngineResult<()> {
    if exception.is_null() {
      return Ok(());
    }
    self.shared.set_exception(exception);
    Err(EngineError::pending_exception())
  }

  fn value(&self, value: JSValueRef, exception: JSValueRef) -> EngineResult<RawValue> {
    self.check(exception)?;
    to_raw(value)
  }

  fn expect_object(&self, value: RawValue) -> EngineResult<JSObjectRef> {
    if unsafe { JSValueIsObject(self.ctx, to_js(value)) } {
      Ok(to_object(value))
    } else {
      Err(EngineError::new(Error::ObjectExpected))
    }
  }

  fn named(&self, object: RawValue, name: &str) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    let name = JsString::from_str(name);
    let mut exception = ptr::null();
    let value =
      unsafe { JSObjectGetProperty(self.ctx, object, name.0, &mut exception) };
    self.value(value, exception)
  }

  fn set_named(
    &self,
    object: JSObjectRef,
    name: &str,
    value: JSValueRef,
  ) -> EngineResult<()> {
    let name = JsString::from_str(name);
    let mut exception = ptr::null();
    unsafe {
      JSObjectSetProperty(
        self.ctx,
        object,
        name.0,
        value,
        kJSPropertyAttributeNone,
        &mut exception,
      )
    };
    self.check(exception)
  }

  fn construct_global(
    &self,
    name: &str,
    args: &[JSValueRef],
  ) -> EngineResult<RawValue> {
    let constructor = unsafe { global_property(self.ctx, name) } as JSObjectRef;
    let mut exception = ptr::null();
    let value = unsafe {
      JSObjectCallAsConstructor(
        self.ctx,
        constructor,
        args.len(),
        args.as_ptr(),
        &mut exception,
      )
    };
    self.value(value as JSValueRef, exception)
  }

  fn instance_of_global(&self, value: RawValue, name: &str) -> bool {
    unsafe {
      let constructor = global_property(self.ctx, name);
      JSValueIsObject(self.ctx, to_js(value))
        && JSValueIsObject(self.ctx, constructor)
        && JSValueIsInstanceOfConstructor(
          self.ctx,
          to_js(value),
          constructor as JSObjectRef,
          ptr::null_mut(),
        )
    }
  }

  fn make_function(
    &self,
    class: JSClassRef,
    name: &str,
    native: NativeFunction,
    kind: SlotKind,
  ) -> EngineResult<RawValue> {
    let slot = Box::new(FunctionSlot {
      shared: self.shared.clone(),
      native,
      kind,
    });
    let function =
      unsafe { JSObjectMake(self.ctx, class, Box::into_raw(slot) as *mut c_void) };
    unsafe { JSObjectSetPrototype(self.ctx, function, self.function_prototype) };
    let name_key = JsString::from_str("name");
    let name = JsString::from_str(name);
    unsafe {
      JSObjectSetProperty(
        self.ctx,
        function,
        name_key.0,
        JSValueMakeString(self.ctx, name.0),
        kJSPropertyAttributeReadOnly | kJSPropertyAttributeDontEnum,
        ptr::null_mut(),
      )
    };
    to_raw(function as JSValueRef)
  }

  fn new_holder(&self, owner: JSObjectRef) -> *mut Holder {
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
    let mut exception = ptr::null();
    let existing = unsafe {
      JSObjectGetPropertyForKey(self.ctx, object, self.private_key, &mut exception)
    };
    self.check(exception)?;
    if unsafe { JSValueIsObjectOfClass(self.ctx, existing, self.classes.holder) } {
      let holder = unsafe { JSObjectGetPrivate(existing as JSObjectRef) } as *mut Holder;
      if !holder.is_null() && unsafe { (*holder).owner } == object {
        return Ok(holder);
      }
    }
    if !create {
      return Ok(ptr::null_mut());
    }
    let holder = self.new_holder(object);
    let holder_object =
      unsafe { JSObjectMake(self.ctx, self.classes.holder, holder as *mut c_void) };
    unsafe {
      JSObjectSetPropertyForKey(
        self.ctx,
        object,
        self.private_key,
        holder_object as JSValueRef,
        kJSPropertyAttributeReadOnly
          | kJSPropertyAttributeDontEnum
          | kJSPropertyAttributeDontDelete,
        &mut exception,
      )
    };
    self.check(exception)?;
    Ok(holder)
  }

  fn buffer_bytes(&self, buffer: JSObjectRef) -> EngineResult<*mut u8> {
    let mut exception = ptr::null();
    let data = unsafe {
      JSObjectGetArrayBufferBytesPtr(self.ctx, buffer, &mut exception)
    };
    self.check(exception)?;
    Ok(data as *mut u8)
  }

  fn typed_array_type(&self, value: RawValue) -> JSTypedArrayType {
    unsafe { JSValueGetTypedArrayType(self.ctx, to_js(value), ptr::null_mut()) }
  }
}

impl Default for JscEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for JscEngine {
  fn drop(&mut self) {
    // SAFETY: protected in `with_context`.
    unsafe {
      self.shared.take_exception();
      JSValueUnprotect(self.ctx, self.private_key);
      JSValueUnprotect(self.ctx, self.function_prototype);
      JSValueUnprotect(self.ctx, self.define_property as JSValueRef);
      JSGlobalContextRelease(self.ctx);
    }
  }
}

fn typed_array_kind(ty: JSTypedArrayType) -> Option<TypedArrayKind> {
  Some(match ty {
    kJSTypedArrayTypeInt8Array => TypedArrayKind::Int8,
    kJSTypedArrayTypeInt16Array => TypedArrayKind::Int16,
    kJSTypedArrayTypeInt32Array => TypedArrayKind::Int32,
    kJSTypedArrayTypeUint8Array => TypedArrayKind::Uint8,
    kJSTypedArrayTypeUint8ClampedArray => TypedArrayKind::Uint8Clamped,
    kJSTypedArrayTypeUint16Array => TypedArrayKind::Uint16,
    kJSTypedArrayTypeUint32Array => TypedArrayKind::Uint32,
    kJSTypedArrayTypeFloat32Array => TypedArrayKind::Float32,
    kJSTypedArrayTypeFloat64Array => TypedArrayKind::Float64,
    _ => return None,
  })
}

fn typed_array_type(kind: TypedArrayKind) -> JSTypedArrayType {
  match kind {
    TypedArrayKind::Int8 => kJSTypedArrayTypeInt8Array,
    TypedArrayKind::Int16 => kJSTypedArrayTypeInt16Array,
    TypedArrayKind::Int32 => kJSTypedArrayTypeInt32Array,
    TypedArrayKind::Uint8 => kJSTypedArrayTypeUint8Array,
    TypedArrayKind::Uint8Clamped => kJSTypedArrayTypeUint8ClampedArray,
    TypedArrayKind::Uint16 => kJSTypedArrayTypeUint16Array,
    TypedArrayKind::Uint32 => kJSTypedArrayTypeUint32Array,
    TypedArrayKind::Float32 => kJSTypedArrayTypeFloat32Array,
    TypedArrayKind::Float64 => kJSTypedArrayTypeFloat64Array,
  }
}

impl Engine for JscEngine {
  fn name(&self) -> &'static str {
    "javascriptcore"
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn global(&self) -> RawValue {
    let global = unsafe { JSContextGetGlobalObject(self.ctx) };
    RawValue::from_ptr(global as *mut c_void).unwrap_or_else(|| self.undefined())
  }

  fn undefined(&self) -> RawValue {
    let value = unsafe { JSValueMakeUndefined(self.ctx) };
    // Immediates are never the empty value.
    RawValue::from_token(value as usize)
  }

  fn null(&self) -> RawValue {
    RawValue::from_token(unsafe { JSValueMakeNull(self.ctx) } as usize)
  }

  fn boolean(&self, value: bool) -> RawValue {
    RawValue::from_token(unsafe { JSValueMakeBoolean(self.ctx, value) } as usize)
  }

  fn create_number(&self, value: f64) -> EngineResult<RawValue> {
    to_raw(unsafe { JSValueMakeNumber(self.ctx, value) })
  }

  fn create_string(&self, units: &[u16]) -> EngineResult<RawValue> {
    let string = JsString::from_units(units);
    to_raw(unsafe { JSValueMakeString(self.ctx, string.0) })
  }

  fn create_symbol(
    &self,
    description: Option<RawValue>,
  ) -> EngineResult<RawValue> {
    let units = match description {
      Some(description) => self.string_value(description)?,
      None => Vec::new(),
    };
    let description = JsString::from_units(&units);
    to_raw(unsafe { JSValueMakeSymbol(self.ctx, description.0) })
  }

  fn create_object(&self) -> EngineResult<RawValue> {
    let object =
      unsafe { JSObjectMake(self.ctx, ptr::null_mut(), ptr::null_mut()) };
    to_raw(object as JSValueRef)
  }

  fn create_array(&self, length: u32) -> EngineResult<RawValue> {
    let null = unsafe { JSValueMakeNull(self.ctx) };
    let elements = vec![null; length as usize];
    let mut exception = ptr::null();
    let array = unsafe {
      JSObjectMakeArray(self.ctx, elements.len(), elements.as_ptr(), &mut exception)
    };
    self.value(array as JSValueRef, exception)
  }

  fn create_error(
    &self,
    kind: ErrorKind,
    message: RawValue,
  ) -> EngineResult<RawValue> {
    let args = [to_js(message)];
    match kind {
      ErrorKind::Error => {
        let mut exception = ptr::null();
        let error = unsafe {
          JSObjectMakeError(self.ctx, 1, args.as_ptr(), &mut exception)
        };
        self.value(error as JSValueRef, exception)
      }
      ErrorKind::TypeError | ErrorKind::RangeError => {
        self.construct_global(kind.name(), &args)
      }
    }
  }

  fn create_external(&self, data: *mut c_void) -> EngineResult<RawValue> {
    let external = unsafe { JSObjectMake(self.ctx, self.classes.external, data) };
    to_raw(external as JSValueRef)
  }

  fn create_function(
    &self,
    name: &str,
    function: NativeFunction,
  ) -> EngineResult<RawValue> {
    self.make_function(
      self.classes.function,
      name,
      function,
      SlotKind::Function,
    )
  }

  fn create_class(&self, template: &ClassTemplate) -> EngineResult<RawValue> {
    let constructor = self.make_function(
      self.classes.constructor,
      &template.name,
      template.constructor,
      SlotKind::Class {
        name: template.name.clone(),
      },
    )?;
    let prototype = self.create_object()?;
    self.set_named(to_object(constructor), "prototype", to_js(prototype))?;
    self.define_property(
      prototype,
      &PropertyDefinition {
        key: self.create_string(&"constructor".encode_utf16().collect::<Vec<_>>())?,
        value: PropertyValue::Data(constructor),
        attributes: crate::engine::PropertyAttributes::HIDDEN,
      },
    )?;
    Ok(constructor)
  }

  fn create_promise(&self) -> EngineResult<PromiseCapability> {
    let mut resolve = ptr::null_mut();
    let mut reject = ptr::null_mut();
    let mut exception = ptr::null();
    let promise = unsafe {
      JSObjectMakeDeferredPromise(self.ctx, &mut resolve, &mut reject, &mut exception)
    };
    Ok(PromiseCapability {
      promise: self.value(promise as JSValueRef, exception)?,
      resolve: to_raw(resolve as JSValueRef)?,
      reject: to_raw(reject as JSValueRef)?,
    })
  }

  fn create_array_buffer(
    &self,
    byte_length: usize,
  ) -> EngineResult<(RawValue, *mut u8)> {
    let bytes = Box::into_raw(vec![0u8; byte_length].into_boxed_slice());
    let data = bytes as *mut u8;
    let free: Finalizer = Box::new(move || {
      // SAFETY: allocated above and released exactly once.
      drop(unsafe { Box::from_raw(bytes) });
    });
    let buffer =
      self.create_external_array_buffer(data, byte_length, Some(free))?;
    Ok((buffer, data))
  }

  fn create_external_array_buffer(
    &self,
    data: *mut u8,
    byte_length: usize,
    finalizer: Option<Finalizer>,
  ) -> EngineResult<RawValue> {
    let holder = self.new_holder(ptr::null_mut());
    if let Some(finalizer) = finalizer {
      unsafe { (*holder).finalizers.push(finalizer) };
    }
    let mut exception = ptr::null();
    let buffer = unsafe {
      JSObjectMakeArrayBufferWithBytesNoCopy(
        self.ctx,
        data as *mut c_void,
        byte_length,
        Some(deallocate_buffer),
        holder as *mut c_void,
        &mut exception,
      )
    };
    if !exception.is_null() {
      unsafe { release_holder(holder) };
    }
    self.value(buffer as JSValueRef, exception)
  }

  fn create_typed_array(
    &self,
    kind: TypedArrayKind,
    length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue> {
    let mut exception = ptr::null();
    let array = unsafe {
      JSObjectMakeTypedArrayWithArrayBufferAndOffset(
        self.ctx,
        typed_array_type(kind),
        to_object(buffer),
        byte_offset,
        length,
        &mut exception,
      )
    };
    self.value(array as JSValueRef, exception)
  }

  fn create_data_view(
    &self,
    byte_length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue> {
    let offset = self.create_number(byte_offset as f64)?;
    let length = self.create_number(byte_length as f64)?;
    self.construct_global("DataView", &[to_js(buffer), to_js(offset), to_js(length)])
  }

  fn type_of(&self, value: RawValue) -> ValueKind {
    let value = to_js(value);
    match unsafe { JSValueGetType(self.ctx, value) } {
      kJSTypeUndefined => ValueKind::Undefined,
      kJSTypeNull => ValueKind::Null,
      kJSTypeBoolean => ValueKind::Boolean,
      kJSTypeNumber => ValueKind::Number,
      kJSTypeString => ValueKind::String,
      kJSTypeSymbol => ValueKind::Symbol,
      _ => unsafe {
        if JSValueIsObjectOfClass(self.ctx, value, self.classes.external) {
          ValueKind::External
        } else if JSObjectIsFunction(self.ctx, value as JSObjectRef) {
          ValueKind::Function
        } else {
          ValueKind::Object
        }
      },
    }
  }

  fn is_array(&self, value: RawValue) -> bool {
    unsafe { JSValueIsArray(self.ctx, to_js(value)) }
  }

  fn is_error(&self, value: RawValue) -> bool {
    self.instance_of_global(value, "Error")
  }

  fn is_array_buffer(&self, value: RawValue) -> bool {
    self.typed_array_type(value) == kJSTypedArrayTypeArrayBuffer
  }

  fn is_typed_array(&self, value: RawValue) -> bool {
    typed_array_kind(self.typed_array_type(value)).is_some()
  }

  fn is_data_view(&self, value: RawValue) -> bool {
    self.instance_of_global(value, "DataView")
  }

  fn strict_equals(&self, a: RawValue, b: RawValue) -> bool {
    unsafe { JSValueIsStrictEqual(self.ctx, to_js(a), to_js(b)) }
  }

  fn instance_of(
    &self,
    object: RawValue,
    constructor: RawValue,
  ) -> EngineResult<bool> {
    let constructor = self.expect_object(constructor)?;
    let mut exception = ptr::null();
    let result = unsafe {
      JSValueIsInstanceOfConstructor(
        self.ctx,
        to_js(object),
        constructor,
        &mut exception,
      )
    };
    self.check(exception)?;
    Ok(result)
  }

  fn number_value(&self, value: RawValue) -> EngineResult<f64> {
    if self.type_of(value) != ValueKind::Number {
      return Err(EngineError::new(Error::NumberExpected));
    }
    Ok(unsafe { JSValueToNumber(self.ctx, to_js(value), ptr::null_mut()) })
  }

  fn bool_value(&self, value: RawValue) -> EngineResult<bool> {
    if self.type_of(value) != ValueKind::Boolean {
      return Err(EngineError::new(Error::BooleanExpected));
    }
    Ok(unsafe { JSValueToBoolean(self.ctx, to_js(value)) })
  }

  fn string_value(&self, value: RawValue) -> EngineResult<Vec<u16>> {
    if self.type_of(value) != ValueKind::String {
      return Err(EngineError::new(Error::StringExpected));
    }
    let string = JsString(unsafe {
      JSValueToStringCopy(self.ctx, to_js(value), ptr::null_mut())
    });
    Ok(string.to_units())
  }

  fn external_value(&self, value: RawValue) -> EngineResult<*mut c_void> {
    if self.type_of(value) != ValueKind::External {
      return Err(EngineError::new(Error::InvalidArg));
    }
    Ok(unsafe { JSObjectGetPrivate(to_object(value)) })
  }

  fn coerce_to_bool(&self, value: RawValue) -> EngineResult<RawValue> {
    let truthy = unsafe { JSValueToBoolean(self.ctx, to_js(value)) };
    Ok(self.boolean(truthy))
  }

  fn coerce_to_number(&self, value: RawValue) -> EngineResult<RawValue> {
    let mut exception = ptr::null();
    let number =
      unsafe { JSValueToNumber(self.ctx, to_js(value), &mut exception) };
    self.check(exception)?;
    self.create_number(number)
  }

  fn coerce_to_object(&self, value: RawValue) -> EngineResult<RawValue> {
    let mut exception = ptr::null();
    let object =
      unsafe { JSValueToObject(self.ctx, to_js(value), &mut exception) };
    self.value(object as JSValueRef, exception)
  }

  fn coerce_to_string(&self, value: RawValue) -> EngineResult<RawValue> {
    let mut exception = ptr::null();
    let string = JsString(unsafe {
      JSValueToStringCopy(self.ctx, to_js(value), &mut exception)
    });
    self.check(exception)?;
    to_raw(unsafe { JSValueMakeString(self.ctx, string.0) })
  }

  fn get_prototype(&self, object: RawValue) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    to_raw(unsafe { JSObjectGetPrototype(self.ctx, object) })
  }

  fn get_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    let mut exception = ptr::null();
    let value = unsafe {
      JSObjectGetPropertyForKey(self.ctx, object, to_js(key), &mut exception)
    };
    self.value(value, exception)
  }

  fn set_property(
    &self,
    object: RawValue,
    key: RawValue,
    value: RawValue,
  ) -> EngineResult<()> {
    let object = self.expect_object(object)?;
    let mut exception = ptr::null();
    unsafe {
      JSObjectSetPropertyForKey(
        self.ctx,
        object,
        to_js(key),
        to_js(value),
        kJSPropertyAttributeNone,
        &mut exception,
      )
    };
    self.check(exception)
  }

  fn has_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool> {
    let object = self.expect_object(object)?;
    let mut exception = ptr::null();
    let found = unsafe {
      JSObjectHasPropertyForKey(self.ctx, object, to_js(key), &mut exception)
    };
    self.check(exception)?;
    Ok(found)
  }

  fn delete_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool> {
    let object = self.expect_object(object)?;
    let mut exception = ptr::null();
    let deleted = unsafe {
      JSObjectDeletePropertyForKey(self.ctx, object, to_js(key), &mut exception)
    };
    self.check(exception)?;
    Ok(deleted)
  }

  fn define_property(
    &self,
    object: RawValue,
    definition: &PropertyDefinition,
  ) -> EngineResult<()> {
    let target = self.expect_object(object)?;
    let descriptor = to_object(self.create_object()?);
    let attributes = definition.attributes;
    self.set_named(
      descriptor,
      "enumerable",
      to_js(self.boolean(attributes.enumerable)),
    )?;
    self.set_named(
      descriptor,
      "configurable",
      to_js(self.boolean(attributes.configurable)),
    )?;
    match definition.value {
      PropertyValue::Data(value) => {
        self.set_named(descriptor, "value", to_js(value))?;
        self.set_named(
          descriptor,
          "writable",
          to_js(self.boolean(attributes.writable)),
        )?;
      }
      PropertyValue::Accessor { getter, setter } => {
        if let Some(getter) = getter {
          let getter = self.create_function("get", getter)?;
          self.set_named(descriptor, "get", to_js(getter))?;
        }
        if let Some(setter) = setter {
          let setter = self.create_function("set", setter)?;
          self.set_named(descriptor, "set", to_js(setter))?;
        }
      }
    }
    let args = [target as JSValueRef, to_js(definition.key), descriptor as JSValueRef];
    let mut exception = ptr::null();
    unsafe {
      JSObjectCallAsFunction(
        self.ctx,
        self.define_property,
        ptr::null_mut(),
        args.len(),
        args.as_ptr(),
        &mut exception,
      )
    };
    self.check(exception)
  }

  fn own_property_names(&self, object: RawValue) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    let names = unsafe { JSObjectCopyPropertyNames(self.ctx, object) };
    let count = unsafe { JSPropertyNameArrayGetCount(names) };
    let values: Vec<JSValueRef> = (0..count)
      .map(|index| unsafe {
        let name = JSPropertyNameArrayGetNameAtIndex(names, index);
        JSValueMakeString(self.ctx, name)
      })
      .collect();
    unsafe { JSPropertyNameArrayRelease(names) };
    let mut exception = ptr::null();
    let array = unsafe {
      JSObjectMakeArray(self.ctx, values.len(), values.as_ptr(), &mut exception)
    };
    self.value(array as JSValueRef, exception)
  }

  fn get_element(
    &self,
    object: RawValue,
    index: u32,
  ) -> EngineResult<RawValue> {
    let object = self.expect_object(object)?;
    let mut exception = ptr::null();
    let value = unsafe {
      JSObjectGetPropertyAtIndex(self.ctx, object, index, &mut exception)
    };
    self.value(value, exception)
  }

  fn set_element(
    &self,
    object: RawValue,
    index: u32,
    value: RawValue,
  ) -> EngineResult<()> {
    let object = self.expect_object(object)?;
    let mut exception = ptr::null();
    unsafe {
      JSObjectSetPropertyAtIndex(
        self.ctx,
        object,
        index,
        to_js(value),
        &mut exception,
      )
    };
    self.check(exception)
  }

  fn has_element(&self, object: RawValue, index: u32) -> EngineResult<bool> {
    let key = self.create_number(index as f64)?;
    self.has_property(object, key)
  }

  fn delete_element(
    &self,
    object: RawValue,
    index: u32,
  ) -> EngineResult<bool> {
    let key = self.create_number(index as f64)?;
    self.delete_property(object, key)
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
    let this = if unsafe { JSValueIsObject(self.ctx, to_js(this)) } {
      to_object(this)
    } else {
      ptr::null_mut()
    };
    let mut exception = ptr::null();
    let value = unsafe {
      JSObjectCallAsFunction(
        self.ctx,
        to_object(function),
        this,
        args.len(),
        args.as_ptr() as *const JSValueRef,
        &mut exception,
      )
    };
    self.value(value, exception)
  }

  fn construct(
    &self,
    constructor: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue> {
    if self.type_of(constructor) != ValueKind::Function {
      return Err(EngineError::new(Error::FunctionExpected));
    }
    let mut exception = ptr::null();
    let value = unsafe {
      JSObjectCallAsConstructor(
        self.ctx,
        to_object(constructor),
        args.len(),
        args.as_ptr() as *const JSValueRef,
        &mut exception,
      )
    };
    self.value(value as JSValueRef, exception)
  }

  fn array_buffer_info(
    &self,
    value: RawValue,
  ) -> EngineResult<(*mut u8, usize)> {
    if !self.is_array_buffer(value) {
      return Err(EngineError::new(Error::InvalidArg));
    }
    let buffer = to_object(value);
    let data = self.buffer_bytes(buffer)?;
    let mut exception = ptr::null();
    let length = unsafe {
      JSObjectGetArrayBufferByteLength(self.ctx, buffer, &mut exception)
    };
    self.check(exception)?;
    Ok((data, length))
  }

  fn typed_array_info(&self, value: RawValue) -> EngineResult<TypedArrayInfo> {
    let kind = typed_array_kind(self.typed_array_type(value))
      .ok_or(EngineError::new(Error::InvalidArg))?;
    let array = to_object(value);
    let mut exception = ptr::null();
    unsafe {
      let length = JSObjectGetTypedArrayLength(self.ctx, array, &mut exception);
      let byte_offset =
        JSObjectGetTypedArrayByteOffset(self.ctx, array, &mut exception);
      let buffer = JSObjectGetTypedArrayBuffer(self.ctx, array, &mut exception);
      // The bytes pointer is the start of the backing buffer.
      let base = JSObjectGetTypedArrayBytesPtr(self.ctx, array, &mut exception);
      self.check(exception)?;
      Ok(TypedArrayInfo {
        kind,
        length,
        data: (base as *mut u8).wrapping_add(byte_offset),
        buffer: to_raw(buffer as JSValueRef)?,
        byte_offset,
      })
    }
  }

  fn data_view_info(&self, value: RawValue) -> EngineResult<DataViewInfo> {
    if !self.is_data_view(value) {
      return Err(EngineError::new(Error::InvalidArg));
    }
    let byte_length = self.named(value, "byteLength")?;
    let byte_offset = self.named(value, "byteOffset")?;
    let buffer = self.named(value, "buffer")?;
    let byte_offset = self.number_value(byte_offset)? as usize;
    let data = self.buffer_bytes(to_object(buffer))?;
    Ok(DataViewInfo {
      byte_length: self.number_value(byte_length)? as usize,
      data: data.wrapping_add(byte_offset),
      buffer,
      byte_offset,
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
    unsafe { JSValueProtect(self.ctx, to_js(value)) };
  }

  fn unprotect(&self, value: RawValue) {
    unsafe { JSValueUnprotect(self.ctx, to_js(value)) };
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
    let script = JsString::from_units(source);
    let url = source_url.map(JsString::from_str);
    let mut exception = ptr::null();
    let value = unsafe {
      JSEvaluateScript(
        self.ctx,
        script.0,
        ptr::null_mut(),
        url.as_ref().map_or(ptr::null_mut(), |url| url.0),
        1,
        &mut exception,
      )
    };
    self.value(value, exception)
  }

  fn collect_garbage(&self) {
    unsafe { JSGarbageCollect(self.ctx) };
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
}

// Copyright 2018-2026 the Deno authors. MIT license.

//! The subset of the JavaScriptCore C API the backend uses.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]
#![allow(dead_code)]

use std::os::raw::c_char;
use std::os::raw::c_uint;
use std::os::raw::c_void;

#[repr(C)]
pub struct OpaqueJSContext {
  _private: [u8; 0],
}
#[repr(C)]
pub struct OpaqueJSValue {
  _private: [u8; 0],
}
#[repr(C)]
pub struct OpaqueJSString {
  _private: [u8; 0],
}
#[repr(C)]
pub struct OpaqueJSClass {
  _private: [u8; 0],
}
#[repr(C)]
pub struct OpaqueJSPropertyNameArray {
  _private: [u8; 0],
}

pub type JSContextRef = *const OpaqueJSContext;
pub type JSGlobalContextRef = *mut OpaqueJSContext;
pub type JSValueRef = *const OpaqueJSValue;
pub type JSObjectRef = *mut OpaqueJSValue;
pub type JSStringRef = *mut OpaqueJSString;
pub type JSClassRef = *mut OpaqueJSClass;
pub type JSPropertyNameArrayRef = *mut OpaqueJSPropertyNameArray;
pub type JSChar = u16;
pub type JSPropertyAttributes = c_uint;
pub type JSClassAttributes = c_uint;

pub type JSType = c_uint;
pub const kJSTypeUndefined: JSType = 0;
pub const kJSTypeNull: JSType = 1;
pub const kJSTypeBoolean: JSType = 2;
pub const kJSTypeNumber: JSType = 3;
pub const kJSTypeString: JSType = 4;
pub const kJSTypeObject: JSType = 5;
pub const kJSTypeSymbol: JSType = 6;

pub type JSTypedArrayType = c_uint;
pub const kJSTypedArrayTypeInt8Array: JSTypedArrayType = 0;
pub const kJSTypedArrayTypeInt16Array: JSTypedArrayType = 1;
pub const kJSTypedArrayTypeInt32Array: JSTypedArrayType = 2;
pub const kJSTypedArrayTypeUint8Array: JSTypedArrayType = 3;
pub const kJSTypedArrayTypeUint8ClampedArray: JSTypedArrayType = 4;
pub const kJSTypedArrayTypeUint16Array: JSTypedArrayType = 5;
pub const kJSTypedArrayTypeUint32Array: JSTypedArrayType = 6;
pub const kJSTypedArrayTypeFloat32Array: JSTypedArrayType = 7;
pub const kJSTypedArrayTypeFloat64Array: JSTypedArrayType = 8;
pub const kJSTypedArrayTypeArrayBuffer: JSTypedArrayType = 9;
pub const kJSTypedArrayTypeNone: JSTypedArrayType = 10;

pub const kJSPropertyAttributeNone: JSPropertyAttributes = 0;
pub const kJSPropertyAttributeReadOnly: JSPropertyAttributes = 1 << 1;
pub const kJSPropertyAttributeDontEnum: JSPropertyAttributes = 1 << 2;
pub const kJSPropertyAttributeDontDelete: JSPropertyAttributes = 1 << 3;

pub const kJSClassAttributeNone: JSClassAttributes = 0;
pub const kJSClassAttributeNoAutomaticPrototype: JSClassAttributes = 1 << 1;

pub type JSObjectFinalizeCallback =
  Option<unsafe extern "C" fn(object: JSObjectRef)>;
pub type JSObjectCallAsFunctionCallback = Option<
  unsafe extern "C" fn(
    ctx: JSContextRef,
    function: JSObjectRef,
    this_object: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSValueRef,
>;
pub type JSObjectCallAsConstructorCallback = Option<
  unsafe extern "C" fn(
    ctx: JSContextRef,
    constructor: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef,
>;
pub type JSObjectHasInstanceCallback = Option<
  unsafe extern "C" fn(
    ctx: JSContextRef,
    constructor: JSObjectRef,
    possible_instance: JSValueRef,
    exception: *mut JSValueRef,
  ) -> bool,
>;
pub type JSTypedArrayBytesDeallocator =
  Option<unsafe extern "C" fn(bytes: *mut c_void, context: *mut c_void)>;

/// Callbacks the backend never installs are typed as opaque pointers.
pub type UnusedCallback = Option<unsafe extern "C" fn()>;

#[repr(C)]
pub struct JSClassDefinition {
  pub version: i32,
  pub attributes: JSClassAttributes,
  pub className: *const c_char,
  pub parentClass: JSClassRef,
  pub staticValues: *const c_void,
  pub staticFunctions: *const c_void,
  pub initialize: UnusedCallback,
  pub finalize: JSObjectFinalizeCallback,
  pub hasProperty: UnusedCallback,
  pub getProperty: UnusedCallback,
  pub setProperty: UnusedCallback,
  pub deleteProperty: UnusedCallback,
  pub getPropertyNames: UnusedCallback,
  pub callAsFunction: JSObjectCallAsFunctionCallback,
  pub callAsConstructor: JSObjectCallAsConstructorCallback,
  pub hasInstance: JSObjectHasInstanceCallback,
  pub convertToType: UnusedCallback,
}

impl JSClassDefinition {
  pub const EMPTY: Self = Self {
    version: 0,
    attributes: kJSClassAttributeNone,
    className: std::ptr::null(),
    parentClass: std::ptr::null_mut(),
    staticValues: std::ptr::null(),
    staticFunctions: std::ptr::null(),
    initialize: None,
    finalize: None,
    hasProperty: None,
    getProperty: None,
    setProperty: None,
    deleteProperty: None,
    getPropertyNames: None,
    callAsFunction: None,
    callAsConstructor: None,
    hasInstance: None,
    convertToType: None,
  };
}

#[cfg_attr(
  target_vendor = "apple",
  link(name = "JavaScriptCore", kind = "framework")
)]
#[cfg_attr(not(target_vendor = "apple"), link(name = "javascriptcoregtk-4.1"))]
unsafe extern "C" {
  pub fn JSGlobalContextCreate(
    global_object_class: JSClassRef,
  ) -> JSGlobalContextRef;
  pub fn JSGlobalContextRetain(ctx: JSGlobalContextRef) -> JSGlobalContextRef;
  pub fn JSGlobalContextRelease(ctx: JSGlobalContextRef);
  pub fn JSContextGetGlobalObject(ctx: JSContextRef) -> JSObjectRef;
  pub fn JSGarbageCollect(ctx: JSContextRef);

  pub fn JSEvaluateScript(
    ctx: JSContextRef,
    script: JSStringRef,
    this_object: JSObjectRef,
    source_url: JSStringRef,
    starting_line_number: i32,
    exception: *mut JSValueRef,
  ) -> JSValueRef;

  pub fn JSStringCreateWithCharacters(
    chars: *const JSChar,
    num_chars: usize,
  ) -> JSStringRef;
  pub fn JSStringCreateWithUTF8CString(string: *const c_char) -> JSStringRef;
  pub fn JSStringRelease(string: JSStringRef);
  pub fn JSStringGetLength(string: JSStringRef) -> usize;
  pub fn JSStringGetCharactersPtr(string: JSStringRef) -> *const JSChar;

  pub fn JSClassCreate(definition: *const JSClassDefinition) -> JSClassRef;
  pub fn JSClassRelease(js_class: JSClassRef);

  pub fn JSValueGetType(ctx: JSContextRef, value: JSValueRef) -> JSType;
  pub fn JSValueIsObject(ctx: JSContextRef, value: JSValueRef) -> bool;
  pub fn JSValueIsObjectOfClass(
    ctx: JSContextRef,
    value: JSValueRef,
    js_class: JSClassRef,
  ) -> bool;
  pub fn JSValueIsArray(ctx: JSContextRef, value: JSValueRef) -> bool;
  pub fn JSValueIsStrictEqual(
    ctx: JSContextRef,
    a: JSValueRef,
    b: JSValueRef,
  ) -> bool;
  pub fn JSValueIsInstanceOfConstructor(
    ctx: JSContextRef,
    value: JSValueRef,
    constructor: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> bool;
  pub fn JSValueGetTypedArrayType(
    ctx: JSContextRef,
    value: JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSTypedArrayType;

  pub fn JSValueMakeUndefined(ctx: JSContextRef) -> JSValueRef;
  pub fn JSValueMakeNull(ctx: JSContextRef) -> JSValueRef;
  pub fn JSValueMakeBoolean(ctx: JSContextRef, boolean: bool) -> JSValueRef;
  pub fn JSValueMakeNumber(ctx: JSContextRef, number: f64) -> JSValueRef;
  pub fn JSValueMakeString(
    ctx: JSContextRef,
    string: JSStringRef,
  ) -> JSValueRef;
  pub fn JSValueMakeSymbol(
    ctx: JSContextRef,
    description: JSStringRef,
  ) -> JSValueRef;

  pub fn JSValueToBoolean(ctx: JSContextRef, value: JSValueRef) -> bool;
  pub fn JSValueToNumber(
    ctx: JSContextRef,
    value: JSValueRef,
    exception: *mut JSValueRef,
  ) -> f64;
  pub fn JSValueToStringCopy(
    ctx: JSContextRef,
    value: JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSStringRef;
  pub fn JSValueToObject(
    ctx: JSContextRef,
    value: JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;

  pub fn JSValueProtect(ctx: JSContextRef, value: JSValueRef);
  pub fn JSValueUnprotect(ctx: JSContextRef, value: JSValueRef);

  pub fn JSObjectMake(
    ctx: JSContextRef,
    js_class: JSClassRef,
    data: *mut c_void,
  ) -> JSObjectRef;
  pub fn JSObjectMakeArray(
    ctx: JSContextRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;
  pub fn JSObjectMakeError(
    ctx: JSContextRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;
  pub fn JSObjectMakeDeferredPromise(
    ctx: JSContextRef,
    resolve: *mut JSObjectRef,
    reject: *mut JSObjectRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;
  pub fn JSObjectMakeArrayBufferWithBytesNoCopy(
    ctx: JSContextRef,
    bytes: *mut c_void,
    byte_length: usize,
    bytes_deallocator: JSTypedArrayBytesDeallocator,
    deallocator_context: *mut c_void,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;
  pub fn JSObjectMakeTypedArrayWithArrayBufferAndOffset(
    ctx: JSContextRef,
    array_type: JSTypedArrayType,
    buffer: JSObjectRef,
    byte_offset: usize,
    length: usize,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;

  pub fn JSObjectGetArrayBufferBytesPtr(
    ctx: JSContextRef,
    object: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> *mut c_void;
  pub fn JSObjectGetArrayBufferByteLength(
    ctx: JSContextRef,
    object: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> usize;
  pub fn JSObjectGetTypedArrayBytesPtr(
    ctx: JSContextRef,
    object: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> *mut c_void;
  pub fn JSObjectGetTypedArrayLength(
    ctx: JSContextRef,
    object: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> usize;
  pub fn JSObjectGetTypedArrayByteOffset(
    ctx: JSContextRef,
    object: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> usize;
  pub fn JSObjectGetTypedArrayBuffer(
    ctx: JSContextRef,
    object: JSObjectRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;

  pub fn JSObjectGetPrototype(
    ctx: JSContextRef,
    object: JSObjectRef,
  ) -> JSValueRef;
  pub fn JSObjectSetPrototype(
    ctx: JSContextRef,
    object: JSObjectRef,
    value: JSValueRef,
  );
  pub fn JSObjectGetPrivate(object: JSObjectRef) -> *mut c_void;
  pub fn JSObjectSetPrivate(object: JSObjectRef, data: *mut c_void) -> bool;
  pub fn JSObjectIsFunction(ctx: JSContextRef, object: JSObjectRef) -> bool;

  pub fn JSObjectGetProperty(
    ctx: JSContextRef,
    object: JSObjectRef,
    name: JSStringRef,
    exception: *mut JSValueRef,
  ) -> JSValueRef;
  pub fn JSObjectSetProperty(
    ctx: JSContextRef,
    object: JSObjectRef,
    name: JSStringRef,
    value: JSValueRef,
    attributes: JSPropertyAttributes,
    exception: *mut JSValueRef,
  );
  pub fn JSObjectGetPropertyForKey(
    ctx: JSContextRef,
    object: JSObjectRef,
    key: JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSValueRef;
  pub fn JSObjectSetPropertyForKey(
    ctx: JSContextRef,
    object: JSObjectRef,
    key: JSValueRef,
    value: JSValueRef,
    attributes: JSPropertyAttributes,
    exception: *mut JSValueRef,
  );
  pub fn JSObjectHasPropertyForKey(
    ctx: JSContextRef,
    object: JSObjectRef,
    key: JSValueRef,
    exception: *mut JSValueRef,
  ) -> bool;
  pub fn JSObjectDeletePropertyForKey(
    ctx: JSContextRef,
    object: JSObjectRef,
    key: JSValueRef,
    exception: *mut JSValueRef,
  ) -> bool;
  pub fn JSObjectGetPropertyAtIndex(
    ctx: JSContextRef,
    object: JSObjectRef,
    index: c_uint,
    exception: *mut JSValueRef,
  ) -> JSValueRef;
  pub fn JSObjectSetPropertyAtIndex(
    ctx: JSContextRef,
    object: JSObjectRef,
    index: c_uint,
    value: JSValueRef,
    exception: *mut JSValueRef,
  );

  pub fn JSObjectCopyPropertyNames(
    ctx: JSContextRef,
    object: JSObjectRef,
  ) -> JSPropertyNameArrayRef;
  pub fn JSPropertyNameArrayGetCount(array: JSPropertyNameArrayRef) -> usize;
  pub fn JSPropertyNameArrayGetNameAtIndex(
    array: JSPropertyNameArrayRef,
    index: usize,
  ) -> JSStringRef;
  pub fn JSPropertyNameArrayRelease(array: JSPropertyNameArrayRef);

  pub fn JSObjectCallAsFunction(
    ctx: JSContextRef,
    object: JSObjectRef,
    this_object: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSValueRef;
  pub fn JSObjectCallAsConstructor(
    ctx: JSContextRef,
    object: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
  ) -> JSObjectRef;
}

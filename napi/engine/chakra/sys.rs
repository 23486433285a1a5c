// Copyright 2018-2026 the Deno authors. MIT license.

//! The subset of the ChakraCore JSRT API the backend uses.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]
#![allow(dead_code)]

use std::os::raw::c_char;
use std::os::raw::c_uint;
use std::os::raw::c_ushort;
use std::os::raw::c_void;

pub type JsRuntimeHandle = *mut c_void;
pub type JsContextRef = *mut c_void;
pub type JsRef = *mut c_void;
pub type JsValueRef = JsRef;
pub type JsPropertyIdRef = JsRef;
pub type JsSourceContext = usize;
pub type ChakraBytePtr = *mut u8;

pub type JsErrorCode = c_uint;
pub const JsNoError: JsErrorCode = 0;
pub const JsErrorInvalidArgument: JsErrorCode = 0x10001;
pub const JsErrorNullArgument: JsErrorCode = 0x10002;
pub const JsErrorNoCurrentContext: JsErrorCode = 0x10003;
pub const JsErrorInExceptionState: JsErrorCode = 0x10004;
pub const JsErrorNotImplemented: JsErrorCode = 0x10005;
pub const JsErrorArgumentNotObject: JsErrorCode = 0x1000C;
pub const JsErrorPropertyNotSymbol: JsErrorCode = 0x10017;
pub const JsErrorPropertyNotString: JsErrorCode = 0x10018;
pub const JsErrorOutOfMemory: JsErrorCode = 0x20001;
pub const JsErrorScriptException: JsErrorCode = 0x30001;
pub const JsErrorScriptCompile: JsErrorCode = 0x30002;
pub const JsErrorScriptTerminated: JsErrorCode = 0x30003;

pub type JsRuntimeAttributes = c_uint;
pub const JsRuntimeAttributeNone: JsRuntimeAttributes = 0;

pub type JsParseScriptAttributes = c_uint;
pub const JsParseScriptAttributeNone: JsParseScriptAttributes = 0;

pub type JsValueType = c_uint;
pub const JsUndefined: JsValueType = 0;
pub const JsNull: JsValueType = 1;
pub const JsNumber: JsValueType = 2;
pub const JsString: JsValueType = 3;
pub const JsBoolean: JsValueType = 4;
pub const JsObject: JsValueType = 5;
pub const JsFunction: JsValueType = 6;
pub const JsError: JsValueType = 7;
pub const JsArray: JsValueType = 8;
pub const JsSymbol: JsValueType = 9;
pub const JsArrayBuffer: JsValueType = 10;
pub const JsTypedArray: JsValueType = 11;
pub const JsDataView: JsValueType = 12;

pub type JsTypedArrayType = c_uint;
pub const JsArrayTypeInt8: JsTypedArrayType = 0;
pub const JsArrayTypeUint8: JsTypedArrayType = 1;
pub const JsArrayTypeUint8Clamped: JsTypedArrayType = 2;
pub const JsArrayTypeInt16: JsTypedArrayType = 3;
pub const JsArrayTypeUint16: JsTypedArrayType = 4;
pub const JsArrayTypeInt32: JsTypedArrayType = 5;
pub const JsArrayTypeUint32: JsTypedArrayType = 6;
pub const JsArrayTypeFloat32: JsTypedArrayType = 7;
pub const JsArrayTypeFloat64: JsTypedArrayType = 8;

pub type JsNativeFunction = Option<
  unsafe extern "C" fn(
    callee: JsValueRef,
    is_construct_call: bool,
    arguments: *mut JsValueRef,
    argument_count: c_ushort,
    callback_state: *mut c_void,
  ) -> JsValueRef,
>;
pub type JsFinalizeCallback = Option<unsafe extern "C" fn(data: *mut c_void)>;
pub type JsObjectBeforeCollectCallback =
  Option<unsafe extern "C" fn(reference: JsRef, callback_state: *mut c_void)>;
pub type JsPromiseContinuationCallback =
  Option<unsafe extern "C" fn(task: JsValueRef, callback_state: *mut c_void)>;
pub type JsThreadServiceCallback = Option<unsafe extern "C" fn()>;

#[link(name = "ChakraCore")]
unsafe extern "C" {
  pub fn JsCreateRuntime(
    attributes: JsRuntimeAttributes,
    thread_service: JsThreadServiceCallback,
    runtime: *mut JsRuntimeHandle,
  ) -> JsErrorCode;
  pub fn JsDisposeRuntime(runtime: JsRuntimeHandle) -> JsErrorCode;
  pub fn JsCollectGarbage(runtime: JsRuntimeHandle) -> JsErrorCode;
  pub fn JsCreateContext(
    runtime: JsRuntimeHandle,
    context: *mut JsContextRef,
  ) -> JsErrorCode;
  pub fn JsSetCurrentContext(context: JsContextRef) -> JsErrorCode;

  pub fn JsAddRef(reference: JsRef, count: *mut c_uint) -> JsErrorCode;
  pub fn JsRelease(reference: JsRef, count: *mut c_uint) -> JsErrorCode;
  pub fn JsSetObjectBeforeCollectCallback(
    reference: JsRef,
    callback_state: *mut c_void,
    callback: JsObjectBeforeCollectCallback,
  ) -> JsErrorCode;

  pub fn JsGetGlobalObject(global: *mut JsValueRef) -> JsErrorCode;
  pub fn JsGetUndefinedValue(value: *mut JsValueRef) -> JsErrorCode;
  pub fn JsGetNullValue(value: *mut JsValueRef) -> JsErrorCode;
  pub fn JsGetTrueValue(value: *mut JsValueRef) -> JsErrorCode;
  pub fn JsGetFalseValue(value: *mut JsValueRef) -> JsErrorCode;
  pub fn JsBooleanToBool(value: JsValueRef, result: *mut bool) -> JsErrorCode;
  pub fn JsDoubleToNumber(value: f64, result: *mut JsValueRef) -> JsErrorCode;
  pub fn JsNumberToDouble(value: JsValueRef, result: *mut f64) -> JsErrorCode;

  pub fn JsCreateStringUtf16(
    content: *const u16,
    length: usize,
    value: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCopyStringUtf16(
    value: JsValueRef,
    start: i32,
    length: i32,
    buffer: *mut u16,
    written: *mut usize,
  ) -> JsErrorCode;
  pub fn JsGetStringLength(value: JsValueRef, length: *mut i32) -> JsErrorCode;
  pub fn JsCreatePropertyId(
    name: *const c_char,
    length: usize,
    property_id: *mut JsPropertyIdRef,
  ) -> JsErrorCode;
  pub fn JsCreateSymbol(
    description: JsValueRef,
    result: *mut JsValueRef,
  ) -> JsErrorCode;

  pub fn JsCreateObject(object: *mut JsValueRef) -> JsErrorCode;
  pub fn JsCreateExternalObject(
    data: *mut c_void,
    finalize_callback: JsFinalizeCallback,
    object: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsHasExternalData(object: JsValueRef, value: *mut bool) -> JsErrorCode;
  pub fn JsGetExternalData(
    object: JsValueRef,
    data: *mut *mut c_void,
  ) -> JsErrorCode;
  pub fn JsCreateArray(length: c_uint, result: *mut JsValueRef) -> JsErrorCode;
  pub fn JsCreateError(
    message: JsValueRef,
    error: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateTypeError(
    message: JsValueRef,
    error: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateRangeError(
    message: JsValueRef,
    error: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateNamedFunction(
    name: JsValueRef,
    native_function: JsNativeFunction,
    callback_state: *mut c_void,
    function: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreatePromise(
    promise: *mut JsValueRef,
    resolve: *mut JsValueRef,
    reject: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateArrayBuffer(
    byte_length: c_uint,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateExternalArrayBuffer(
    data: *mut c_void,
    byte_length: c_uint,
    finalize_callback: JsFinalizeCallback,
    callback_state: *mut c_void,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateTypedArray(
    array_type: JsTypedArrayType,
    base_array: JsValueRef,
    byte_offset: c_uint,
    element_length: c_uint,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsCreateDataView(
    array_buffer: JsValueRef,
    byte_offset: c_uint,
    byte_length: c_uint,
    result: *mut JsValueRef,
  ) -> JsErrorCode;

  pub fn JsGetValueType(value: JsValueRef, ty: *mut JsValueType)
  -> JsErrorCode;
  pub fn JsStrictEquals(
    a: JsValueRef,
    b: JsValueRef,
    result: *mut bool,
  ) -> JsErrorCode;
  pub fn JsInstanceOf(
    object: JsValueRef,
    constructor: JsValueRef,
    result: *mut bool,
  ) -> JsErrorCode;
  pub fn JsConvertValueToBoolean(
    value: JsValueRef,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsConvertValueToNumber(
    value: JsValueRef,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsConvertValueToObject(
    value: JsValueRef,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsConvertValueToString(
    value: JsValueRef,
    result: *mut JsValueRef,
  ) -> JsErrorCode;

  pub fn JsGetPrototype(
    object: JsValueRef,
    prototype: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsGetProperty(
    object: JsValueRef,
    property_id: JsPropertyIdRef,
    value: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsObjectGetProperty(
    object: JsValueRef,
    key: JsValueRef,
    value: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsObjectSetProperty(
    object: JsValueRef,
    key: JsValueRef,
    value: JsValueRef,
    use_strict_rules: bool,
  ) -> JsErrorCode;
  pub fn JsObjectHasProperty(
    object: JsValueRef,
    key: JsValueRef,
    has_property: *mut bool,
  ) -> JsErrorCode;
  pub fn JsObjectHasOwnProperty(
    object: JsValueRef,
    key: JsValueRef,
    has_own_property: *mut bool,
  ) -> JsErrorCode;
  pub fn JsObjectDeleteProperty(
    object: JsValueRef,
    key: JsValueRef,
    use_strict_rules: bool,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsObjectDefineProperty(
    object: JsValueRef,
    key: JsValueRef,
    descriptor: JsValueRef,
    result: *mut bool,
  ) -> JsErrorCode;
  pub fn JsGetIndexedProperty(
    object: JsValueRef,
    index: JsValueRef,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsSetIndexedProperty(
    object: JsValueRef,
    index: JsValueRef,
    value: JsValueRef,
  ) -> JsErrorCode;
  pub fn JsHasIndexedProperty(
    object: JsValueRef,
    index: JsValueRef,
    result: *mut bool,
  ) -> JsErrorCode;
  pub fn JsDeleteIndexedProperty(
    object: JsValueRef,
    index: JsValueRef,
  ) -> JsErrorCode;

  pub fn JsCallFunction(
    function: JsValueRef,
    arguments: *mut JsValueRef,
    argument_count: c_ushort,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsConstructObject(
    function: JsValueRef,
    arguments: *mut JsValueRef,
    argument_count: c_ushort,
    result: *mut JsValueRef,
  ) -> JsErrorCode;

  pub fn JsGetArrayBufferStorage(
    array_buffer: JsValueRef,
    buffer: *mut ChakraBytePtr,
    buffer_length: *mut c_uint,
  ) -> JsErrorCode;
  pub fn JsGetTypedArrayInfo(
    typed_array: JsValueRef,
    array_type: *mut JsTypedArrayType,
    array_buffer: *mut JsValueRef,
    byte_offset: *mut c_uint,
    byte_length: *mut c_uint,
  ) -> JsErrorCode;
  pub fn JsGetTypedArrayStorage(
    typed_array: JsValueRef,
    buffer: *mut ChakraBytePtr,
    buffer_length: *mut c_uint,
    array_type: *mut JsTypedArrayType,
    element_size: *mut i32,
  ) -> JsErrorCode;
  pub fn JsGetDataViewStorage(
    data_view: JsValueRef,
    buffer: *mut ChakraBytePtr,
    buffer_length: *mut c_uint,
  ) -> JsErrorCode;

  pub fn JsSetException(exception: JsValueRef) -> JsErrorCode;
  pub fn JsGetAndClearException(exception: *mut JsValueRef) -> JsErrorCode;

  pub fn JsRun(
    script: JsValueRef,
    source_context: JsSourceContext,
    source_url: JsValueRef,
    parse_attributes: JsParseScriptAttributes,
    result: *mut JsValueRef,
  ) -> JsErrorCode;
  pub fn JsSetPromiseContinuationCallback(
    callback: JsPromiseContinuationCallback,
    callback_state: *mut c_void,
  ) -> JsErrorCode;
}

// Copyright 2018-2026 the Deno authors. MIT license.

//! The capability set every embedded JavaScript engine provides to the shim.
//!
//! The `napi_*` layer only ever talks to an engine through [`Engine`]. Each
//! backend maps these operations onto its native API, so backends cannot
//! drift apart in what they support.

use std::any::Any;
use std::os::raw::c_void;

use crate::Error;
use crate::value::RawValue;

pub mod local;

#[cfg(feature = "chakra")]
pub mod chakra;
#[cfg(feature = "jsc")]
pub mod jsc;

/// A failure reported by a backend, with the engine's own code preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{status} (engine code {code:#x})")]
pub struct EngineError {
  pub status: Error,
  pub code: i32,
}

impl EngineError {
  pub const fn new(status: Error) -> Self {
    Self { status, code: 0 }
  }

  pub const fn with_code(status: Error, code: i32) -> Self {
    Self { status, code }
  }

  pub const fn pending_exception() -> Self {
    Self::new(Error::PendingException)
  }
}

impl From<Error> for EngineError {
  fn from(status: Error) -> Self {
    Self::new(status)
  }
}

impl From<EngineError> for Error {
  fn from(error: EngineError) -> Self {
    error.status
  }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
  Undefined,
  Null,
  Boolean,
  Number,
  String,
  Symbol,
  Object,
  Function,
  External,
}

impl ValueKind {
  pub fn is_object(self) -> bool {
    matches!(self, ValueKind::Object | ValueKind::Function)
  }

  pub fn is_property_key(self) -> bool {
    matches!(self, ValueKind::String | ValueKind::Symbol)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
  Int8,
  Uint8,
  Uint8Clamped,
  Int16,
  Uint16,
  Int32,
  Uint32,
  Float32,
  Float64,
}

impl TypedArrayKind {
  pub fn element_size(self) -> usize {
    match self {
      TypedArrayKind::Int8
      | TypedArrayKind::Uint8
      | TypedArrayKind::Uint8Clamped => 1,
      TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
      TypedArrayKind::Int32
      | TypedArrayKind::Uint32
      | TypedArrayKind::Float32 => 4,
      TypedArrayKind::Float64 => 8,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      TypedArrayKind::Int8 => "Int8Array",
      TypedArrayKind::Uint8 => "Uint8Array",
      TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
      TypedArrayKind::Int16 => "Int16Array",
      TypedArrayKind::Uint16 => "Uint16Array",
      TypedArrayKind::Int32 => "Int32Array",
      TypedArrayKind::Uint32 => "Uint32Array",
      TypedArrayKind::Float32 => "Float32Array",
      TypedArrayKind::Float64 => "Float64Array",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedArrayInfo {
  pub kind: TypedArrayKind,
  pub length: usize,
  /// Start of the view, already offset into the backing store.
  pub data: *mut u8,
  pub buffer: RawValue,
  pub byte_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataViewInfo {
  pub byte_length: usize,
  pub data: *mut u8,
  pub buffer: RawValue,
  pub byte_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Error,
  TypeError,
  RangeError,
}

impl ErrorKind {
  pub fn name(self) -> &'static str {
    match self {
      ErrorKind::Error => "Error",
      ErrorKind::TypeError => "TypeError",
      ErrorKind::RangeError => "RangeError",
    }
  }
}

/// Per-object native pointer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivateSlot {
  /// The class registration an instance was constructed from.
  Class,
  /// Data attached with `napi_wrap`.
  Wrap,
}

/// Runs once, when the engine frees the object it was attached to.
pub type Finalizer = Box<dyn FnOnce()>;

/// One call into native code, as seen from the engine.
#[derive(Debug)]
pub struct Invocation<'a> {
  pub callee: RawValue,
  pub this: RawValue,
  pub args: &'a [RawValue],
  /// Set on construct calls only.
  pub new_target: Option<RawValue>,
}

/// Fixed entry point shared by every native function of one kind. Returning
/// `None` yields `undefined`. An exception thrown through the engine while
/// the entry runs propagates to the script caller.
pub type NativeEntry =
  unsafe fn(data: *mut c_void, invocation: &Invocation) -> Option<RawValue>;

#[derive(Debug, Clone, Copy)]
pub struct NativeFunction {
  pub entry: NativeEntry,
  pub data: *mut c_void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAttributes {
  pub writable: bool,
  pub enumerable: bool,
  pub configurable: bool,
}

impl PropertyAttributes {
  pub const ALL: Self = Self {
    writable: true,
    enumerable: true,
    configurable: true,
  };

  pub const HIDDEN: Self = Self {
    writable: true,
    enumerable: false,
    configurable: true,
  };

  pub fn from_napi(attributes: crate::napi_property_attributes) -> Self {
    Self {
      writable: attributes & crate::napi_writable != 0,
      enumerable: attributes & crate::napi_enumerable != 0,
      configurable: attributes & crate::napi_configurable != 0,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub enum PropertyValue {
  Data(RawValue),
  Accessor {
    getter: Option<NativeFunction>,
    setter: Option<NativeFunction>,
  },
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyDefinition {
  /// A string or symbol.
  pub key: RawValue,
  pub value: PropertyValue,
  pub attributes: PropertyAttributes,
}

#[derive(Debug, Clone)]
pub struct ClassTemplate {
  pub name: String,
  pub constructor: NativeFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromiseCapability {
  pub promise: RawValue,
  pub resolve: RawValue,
  pub reject: RawValue,
}

/// Receives each promise job the engine wants scheduled. The job is a
/// callable taking no arguments.
pub type ContinuationHook = Box<dyn Fn(RawValue)>;

pub trait Engine {
  fn name(&self) -> &'static str;

  fn as_any(&self) -> &dyn Any;

  fn global(&self) -> RawValue;
  fn undefined(&self) -> RawValue;
  fn null(&self) -> RawValue;
  fn boolean(&self, value: bool) -> RawValue;

  fn create_number(&self, value: f64) -> EngineResult<RawValue>;
  /// Creates a string from UTF-16 code units.
  fn create_string(&self, units: &[u16]) -> EngineResult<RawValue>;
  fn create_symbol(
    &self,
    description: Option<RawValue>,
  ) -> EngineResult<RawValue>;
  fn create_object(&self) -> EngineResult<RawValue>;
  /// Creates an array of `length` elements, each `null`.
  fn create_array(&self, length: u32) -> EngineResult<RawValue>;
  fn create_error(
    &self,
    kind: ErrorKind,
    message: RawValue,
  ) -> EngineResult<RawValue>;
  fn create_external(&self, data: *mut c_void) -> EngineResult<RawValue>;
  fn create_function(
    &self,
    name: &str,
    function: NativeFunction,
  ) -> EngineResult<RawValue>;
  /// Creates a constructor with an empty `prototype` object. Construct
  /// calls allocate the instance and pass it as `this`; the entry's return
  /// value is ignored.
  fn create_class(&self, template: &ClassTemplate) -> EngineResult<RawValue>;
  fn create_promise(&self) -> EngineResult<PromiseCapability>;
  fn create_array_buffer(
    &self,
    byte_length: usize,
  ) -> EngineResult<(RawValue, *mut u8)>;
  /// Wraps memory owned by the caller. `finalizer` runs exactly once when
  /// the engine frees the buffer object.
  fn create_external_array_buffer(
    &self,
    data: *mut u8,
    byte_length: usize,
    finalizer: Option<Finalizer>,
  ) -> EngineResult<RawValue>;
  fn create_typed_array(
    &self,
    kind: TypedArrayKind,
    length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue>;
  fn create_data_view(
    &self,
    byte_length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue>;

  fn type_of(&self, value: RawValue) -> ValueKind;
  fn is_array(&self, value: RawValue) -> bool;
  fn is_error(&self, value: RawValue) -> bool;
  fn is_array_buffer(&self, value: RawValue) -> bool;
  fn is_typed_array(&self, value: RawValue) -> bool;
  fn is_data_view(&self, value: RawValue) -> bool;
  fn strict_equals(&self, a: RawValue, b: RawValue) -> bool;
  fn instance_of(
    &self,
    object: RawValue,
    constructor: RawValue,
  ) -> EngineResult<bool>;

  fn number_value(&self, value: RawValue) -> EngineResult<f64>;
  fn bool_value(&self, value: RawValue) -> EngineResult<bool>;
  fn string_value(&self, value: RawValue) -> EngineResult<Vec<u16>>;
  fn external_value(&self, value: RawValue) -> EngineResult<*mut c_void>;

  fn coerce_to_bool(&self, value: RawValue) -> EngineResult<RawValue>;
  fn coerce_to_number(&self, value: RawValue) -> EngineResult<RawValue>;
  fn coerce_to_object(&self, value: RawValue) -> EngineResult<RawValue>;
  fn coerce_to_string(&self, value: RawValue) -> EngineResult<RawValue>;

  fn get_prototype(&self, object: RawValue) -> EngineResult<RawValue>;
  fn get_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<RawValue>;
  fn set_property(
    &self,
    object: RawValue,
    key: RawValue,
    value: RawValue,
  ) -> EngineResult<()>;
  fn has_property(&self, object: RawValue, key: RawValue)
  -> EngineResult<bool>;
  fn delete_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool>;
  fn define_property(
    &self,
    object: RawValue,
    definition: &PropertyDefinition,
  ) -> EngineResult<()>;
  /// Enumerable own string keys, as an array.
  fn own_property_names(&self, object: RawValue) -> EngineResult<RawValue>;
  fn get_element(&self, object: RawValue, index: u32)
  -> EngineResult<RawValue>;
  fn set_element(
    &self,
    object: RawValue,
    index: u32,
    value: RawValue,
  ) -> EngineResult<()>;
  fn has_element(&self, object: RawValue, index: u32) -> EngineResult<bool>;
  fn delete_element(&self, object: RawValue, index: u32)
  -> EngineResult<bool>;
  fn array_length(&self, array: RawValue) -> EngineResult<u32>;

  fn call_function(
    &self,
    function: RawValue,
    this: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue>;
  fn construct(
    &self,
    constructor: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue>;

  fn array_buffer_info(&self, value: RawValue)
  -> EngineResult<(*mut u8, usize)>;
  fn typed_array_info(&self, value: RawValue) -> EngineResult<TypedArrayInfo>;
  fn data_view_info(&self, value: RawValue) -> EngineResult<DataViewInfo>;

  fn set_private(
    &self,
    object: RawValue,
    slot: PrivateSlot,
    data: *mut c_void,
  ) -> EngineResult<()>;
  /// Null when the slot was never set.
  fn get_private(
    &self,
    object: RawValue,
    slot: PrivateSlot,
  ) -> EngineResult<*mut c_void>;
  fn add_finalizer(
    &self,
    object: RawValue,
    finalizer: Finalizer,
  ) -> EngineResult<()>;

  /// Keeps `value` alive until a matching [`Engine::unprotect`].
  fn protect(&self, value: RawValue);
  fn unprotect(&self, value: RawValue);

  fn throw(&self, error: RawValue);
  fn has_exception(&self) -> bool;
  fn take_exception(&self) -> Option<RawValue>;

  fn run_script(
    &self,
    source: &[u16],
    source_url: Option<&str>,
  ) -> EngineResult<RawValue>;

  /// Routes promise jobs through `hook` instead of the engine's own queue.
  /// Returns false when the engine cannot hand jobs out.
  fn set_promise_continuation(&self, _hook: ContinuationHook) -> bool {
    false
  }

  fn collect_garbage(&self) {}

  /// Runs every outstanding finalizer ahead of teardown.
  fn finalize_all(&self) {}

  /// The native code behind the most recent failure, reset on read.
  fn take_error_code(&self) -> i32 {
    0
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

//! An in-process engine with its own object model.
//!
//! `LocalEngine` keeps every value in a slot heap owned by the engine. Values
//! stay valid until a collection runs; collections only happen when
//! [`Engine::collect_garbage`] is called, and protected values, the global
//! object and queued jobs are always roots. Scripts are evaluated by a small
//! expression-level interpreter (see `script.rs`).

use std::any::Any;
use std::cell::Ref;
use std::cell::RefCell;
use std::cell::RefMut;
use std::os::raw::c_void;
use std::rc::Rc;

mod builtins;
mod heap;
mod script;

pub use heap::EngineStats;

use self::heap::Backing;
use self::heap::Behavior;
use self::heap::ErrorClass;
use self::heap::Heap;
use self::heap::HeapValue;
use self::heap::ObjectKind;
use self::heap::OwnedBuffer;
use self::heap::Property;
use self::heap::PropertyKey;
use self::heap::PromiseState;
use self::heap::Slot;
use self::heap::TypedView;
use self::heap::to_raw;
use self::heap::to_slot;
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
use crate::util::to_int32;
use crate::util::to_uint32;
use crate::value::RawValue;

/// Settlement of a promise, for hosts that drive the job queue themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseStatus {
  Pending,
  Fulfilled(RawValue),
  Rejected(RawValue),
}

pub struct LocalEngine {
  heap: RefCell<Heap>,
  continuation: RefCell<Option<Rc<dyn Fn(RawValue)>>>,
}

enum Found {
  Slot(Slot),
  Number(f64),
  Unit(u16),
  Getter(Option<Slot>),
  Nullish(&'static str),
  Missing,
}

enum SetAction {
  Done,
  Ignore,
  CallSetter(Slot),
  Nullish(&'static str),
}

impl Default for LocalEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl LocalEngine {
  pub fn new() -> Self {
    let engine = Self {
      heap: RefCell::new(Heap::new()),
      continuation: RefCell::new(None),
    };
    builtins::install_realm(&mut engine.heap_mut());
    engine
  }

  pub fn stats(&self) -> EngineStats {
    self.heap().stats
  }

  pub fn live_objects(&self) -> usize {
    self.heap().live_objects()
  }

  /// Runs queued promise jobs until the queue is empty. Jobs handed to a
  /// continuation hook never enter this queue.
  pub fn run_microtasks(&self) -> usize {
    let mut ran = 0;
    loop {
      let job = self.heap_mut().jobs.pop_front();
      let Some(job) = job else {
        return ran;
      };
      self.run_job(job);
      ran += 1;
    }
  }

  pub fn promise_state(&self, promise: RawValue) -> Option<PromiseStatus> {
    let heap = self.heap();
    match &heap.object(to_slot(promise))?.kind {
      ObjectKind::Promise(PromiseState::Pending(_)) => {
        Some(PromiseStatus::Pending)
      }
      ObjectKind::Promise(PromiseState::Fulfilled(value)) => {
        Some(PromiseStatus::Fulfilled(to_raw(*value)))
      }
      ObjectKind::Promise(PromiseState::Rejected(value)) => {
        Some(PromiseStatus::Rejected(to_raw(*value)))
      }
      _ => None,
    }
  }

  pub(crate) fn heap(&self) -> Ref<'_, Heap> {
    self.heap.borrow()
  }

  pub(crate) fn heap_mut(&self) -> RefMut<'_, Heap> {
    self.heap.borrow_mut()
  }

  pub(crate) fn alloc(&self, value: HeapValue) -> RawValue {
    to_raw(self.heap_mut().alloc(value))
  }

  pub(crate) fn alloc_str(&self, text: &str) -> RawValue {
    let units: Vec<u16> = text.encode_utf16().collect();
    self.alloc(HeapValue::String(units.into()))
  }

  pub(crate) fn alloc_object(&self, proto: Slot, kind: ObjectKind) -> Slot {
    self.heap_mut().alloc_object(Some(proto), kind)
  }

  pub(crate) fn make_error(&self, class: ErrorClass, message: &str) -> Slot {
    let message = to_slot(self.alloc_str(message));
    let mut heap = self.heap_mut();
    let proto = heap.realm.error_prototypes[class.index()];
    let error = heap.alloc_object(Some(proto), ObjectKind::Error);
    builtins::define_data(
      &mut heap,
      error,
      PropertyKey::named("message"),
      message,
      PropertyAttributes::HIDDEN,
    );
    error
  }

  /// Raises a fresh error of `class` and reports it as pending.
  pub(crate) fn throw_error(
    &self,
    class: ErrorClass,
    message: &str,
  ) -> EngineError {
    let error = self.make_error(class, message);
    self.heap_mut().exception = Some(error);
    EngineError::pending_exception()
  }

  fn value_kind(heap: &Heap, slot: Slot) -> Option<ValueKind> {
    Some(match heap.value(slot)? {
      HeapValue::Undefined => ValueKind::Undefined,
      HeapValue::Null => ValueKind::Null,
      HeapValue::Boolean(_) => ValueKind::Boolean,
      HeapValue::Number(_) => ValueKind::Number,
      HeapValue::String(_) => ValueKind::String,
      HeapValue::Symbol(_) => ValueKind::Symbol,
      HeapValue::Object(object) => match object.kind {
        ObjectKind::Function(_) => ValueKind::Function,
        ObjectKind::External(_) => ValueKind::External,
        _ => ValueKind::Object,
      },
    })
  }

  fn is_object(&self, value: RawValue) -> bool {
    self.heap().object(to_slot(value)).is_some()
  }

  fn expect_object(&self, value: RawValue) -> EngineResult<Slot> {
    let slot = to_slot(value);
    match self.heap().object(slot) {
      Some(_) => Ok(slot),
      None => Err(EngineError::new(Error::ObjectExpected)),
    }
  }

  pub(crate) fn to_boolean(&self, value: RawValue) -> bool {
    match self.heap().value(to_slot(value)) {
      None | Some(HeapValue::Undefined | HeapValue::Null) => false,
      Some(HeapValue::Boolean(value)) => *value,
      Some(HeapValue::Number(number)) => *number != 0.0 && !number.is_nan(),
      Some(HeapValue::String(units)) => !units.is_empty(),
      Some(HeapValue::Symbol(_) | HeapValue::Object(_)) => true,
    }
  }

  pub(crate) fn to_number(&self, value: RawValue) -> EngineResult<f64> {
    enum Plan {
      Number(f64),
      Unbox(Slot),
      Symbol,
    }
    let plan = {
      let heap = self.heap();
      match heap.value(to_slot(value)) {
        None => return Err(EngineError::new(Error::InvalidArg)),
        Some(HeapValue::Undefined) => Plan::Number(f64::NAN),
        Some(HeapValue::Null) => Plan::Number(0.0),
        Some(HeapValue::Boolean(value)) => Plan::Number(*value as u8 as f64),
        Some(HeapValue::Number(number)) => Plan::Number(*number),
        Some(HeapValue::String(units)) => {
          Plan::Number(string_to_number(&String::from_utf16_lossy(units)))
        }
        Some(HeapValue::Symbol(_)) => Plan::Symbol,
        Some(HeapValue::Object(object)) => match object.kind {
          ObjectKind::Boxed(inner) => Plan::Unbox(inner),
          _ => Plan::Number(f64::NAN),
        },
      }
    };
    match plan {
      Plan::Number(number) => Ok(number),
      Plan::Unbox(inner) => self.to_number(to_raw(inner)),
      Plan::Symbol => Err(self.throw_error(
        ErrorClass::TypeError,
        "Cannot convert a Symbol value to a number",
      )),
    }
  }

  pub(crate) fn to_string_units(
    &self,
    value: RawValue,
  ) -> EngineResult<Rc<[u16]>> {
    enum Plan {
      Done(Rc<[u16]>),
      Text(String),
      Error,
      Array(Vec<Slot>),
      Function,
      Unbox(Slot),
      Symbol,
    }
    let plan = {
      let heap = self.heap();
      match heap.value(to_slot(value)) {
        None => return Err(EngineError::new(Error::InvalidArg)),
        Some(HeapValue::Undefined) => Plan::Text("undefined".into()),
        Some(HeapValue::Null) => Plan::Text("null".into()),
        Some(HeapValue::Boolean(value)) => Plan::Text(value.to_string()),
        Some(HeapValue::Number(number)) => {
          Plan::Text(number_to_string(*number))
        }
        Some(HeapValue::String(units)) => Plan::Done(units.clone()),
        Some(HeapValue::Symbol(_)) => Plan::Symbol,
        Some(HeapValue::Object(object)) => match &object.kind {
          ObjectKind::Error => Plan::Error,
          ObjectKind::Array(elements) => Plan::Array(elements.clone()),
          ObjectKind::Function(_) => Plan::Function,
          ObjectKind::Boxed(inner) => Plan::Unbox(*inner),
          _ => Plan::Text("[object Object]".into()),
        },
      }
    };
    let text = match plan {
      Plan::Done(units) => return Ok(units),
      Plan::Text(text) => text,
      Plan::Symbol => {
        return Err(self.throw_error(
          ErrorClass::TypeError,
          "Cannot convert a Symbol value to a string",
        ));
      }
      Plan::Unbox(inner) => return self.to_string_units(to_raw(inner)),
      Plan::Error => {
        let name = self.get(value, &PropertyKey::named("name"))?;
        let message = self.get(value, &PropertyKey::named("message"))?;
        let name = String::from_utf16_lossy(&self.to_string_units(name)?);
        let message =
          String::from_utf16_lossy(&self.to_string_units(message)?);
        if message.is_empty() {
          name
        } else {
          format!("{name}: {message}")
        }
      }
      Plan::Array(elements) => {
        let mut parts = Vec::with_capacity(elements.len());
        for element in elements {
          let element = to_raw(element);
          match self.type_of(element) {
            ValueKind::Undefined | ValueKind::Null => parts.push(String::new()),
            _ => parts
              .push(String::from_utf16_lossy(&self.to_string_units(element)?)),
          }
        }
        parts.join(",")
      }
      Plan::Function => {
        let name = self.get(value, &PropertyKey::named("name"))?;
        let name = match self.heap().string(to_slot(name)) {
          Some(units) => String::from_utf16_lossy(&units),
          None => String::new(),
        };
        format!("function {name}() {{ [native code] }}")
      }
    };
    Ok(text.encode_utf16().collect::<Vec<_>>().into())
  }

  pub(crate) fn to_property_key(
    &self,
    value: RawValue,
  ) -> EngineResult<PropertyKey> {
    let slot = to_slot(value);
    let key = match self.heap().value(slot) {
      Some(HeapValue::String(units)) => Some(PropertyKey::String(units.clone())),
      Some(HeapValue::Symbol(_)) => Some(PropertyKey::Symbol(slot)),
      _ => None,
    };
    match key {
      Some(key) => Ok(key),
      None => Ok(PropertyKey::String(self.to_string_units(value)?)),
    }
  }

  fn key_display(&self, key: &PropertyKey) -> String {
    match key {
      PropertyKey::String(units) => String::from_utf16_lossy(units),
      PropertyKey::Symbol(slot) => match self.heap().value(*slot) {
        Some(HeapValue::Symbol(Some(description))) => {
          format!("Symbol({})", String::from_utf16_lossy(description))
        }
        _ => "Symbol()".into(),
      },
    }
  }

  fn find(heap: &Heap, start: Slot, key: &PropertyKey) -> Found {
    let mut current = Some(start);
    while let Some(slot) = current {
      let Some(object) = heap.object(slot) else {
        break;
      };
      if let Some(found) = Self::exotic_get(heap, &object.kind, key) {
        return found;
      }
      if let Some(property) = object.properties.get(key) {
        return match property {
          Property::Data { value, .. } => Found::Slot(*value),
          Property::Accessor { getter, .. } => Found::Getter(*getter),
        };
      }
      current = object.proto;
    }
    Found::Missing
  }

  fn exotic_get(
    heap: &Heap,
    kind: &ObjectKind,
    key: &PropertyKey,
  ) -> Option<Found> {
    match kind {
      ObjectKind::Array(elements) => {
        if key.is("length") {
          return Some(Found::Number(elements.len() as f64));
        }
        let index = key.array_index()? as usize;
        elements.get(index).map(|slot| Found::Slot(*slot))
      }
      ObjectKind::TypedArray(view) => {
        if key.is("length") {
          return Some(Found::Number(view.length as f64));
        }
        let index = key.array_index()? as usize;
        if index >= view.length {
          return Some(Found::Slot(heap::UNDEFINED));
        }
        let data = Self::view_data(heap, view)?;
        // SAFETY: index < length and views are bounds-checked on creation.
        let value = unsafe {
          read_element(view.kind, data.add(index * view.kind.element_size()))
        };
        Some(Found::Number(value))
      }
      ObjectKind::ArrayBuffer(backing) if key.is("byteLength") => {
        Some(Found::Number(backing.len() as f64))
      }
      _ => None,
    }
  }

  fn view_data(heap: &Heap, view: &TypedView) -> Option<*mut u8> {
    match &heap.object(view.buffer)?.kind {
      // SAFETY: creation checked byte_offset against the buffer length.
      ObjectKind::ArrayBuffer(backing) => {
        Some(unsafe { backing.data().add(view.byte_offset) })
      }
      _ => None,
    }
  }

  pub(crate) fn get(
    &self,
    object: RawValue,
    key: &PropertyKey,
  ) -> EngineResult<RawValue> {
    let found = {
      let heap = self.heap();
      let slot = to_slot(object);
      match heap.value(slot) {
        None => return Err(EngineError::new(Error::InvalidArg)),
        Some(HeapValue::Undefined) => Found::Nullish("undefined"),
        Some(HeapValue::Null) => Found::Nullish("null"),
        Some(HeapValue::Object(_)) => Self::find(&heap, slot, key),
        Some(HeapValue::String(units)) => {
          if key.is("length") {
            Found::Number(units.len() as f64)
          } else if let Some(unit) =
            key.array_index().and_then(|index| units.get(index as usize))
          {
            Found::Unit(*unit)
          } else {
            Self::find(&heap, heap.realm.object_prototype, key)
          }
        }
        Some(_) => Self::find(&heap, heap.realm.object_prototype, key),
      }
    };
    match found {
      Found::Slot(slot) => Ok(to_raw(slot)),
      Found::Number(number) => Ok(self.alloc(HeapValue::Number(number))),
      Found::Unit(unit) => Ok(self.alloc(HeapValue::String(Rc::from([unit])))),
      Found::Getter(Some(getter)) => self.call(to_raw(getter), object, &[]),
      Found::Getter(None) | Found::Missing => Ok(self.undefined()),
      Found::Nullish(what) => Err(self.throw_error(
        ErrorClass::TypeError,
        &format!(
          "Cannot read properties of {what} (reading '{}')",
          self.key_display(key)
        ),
      )),
    }
  }

  pub(crate) fn set(
    &self,
    object: RawValue,
    key: &PropertyKey,
    value: RawValue,
  ) -> EngineResult<()> {
    let number = match self.type_of(value) {
      ValueKind::Number => self.to_number(value).unwrap_or(f64::NAN),
      _ => f64::NAN,
    };
    let action = {
      let mut heap = self.heap_mut();
      let slot = to_slot(object);
      match heap.value(slot) {
        None => return Err(EngineError::new(Error::InvalidArg)),
        Some(HeapValue::Undefined) => SetAction::Nullish("undefined"),
        Some(HeapValue::Null) => SetAction::Nullish("null"),
        Some(HeapValue::Object(_)) => {
          Self::plan_set(&mut heap, slot, key, to_slot(value), number)
        }
        Some(_) => SetAction::Ignore,
      }
    };
    match action {
      SetAction::Done | SetAction::Ignore => Ok(()),
      SetAction::CallSetter(setter) => {
        self.call(to_raw(setter), object, &[value]).map(|_| ())
      }
      SetAction::Nullish(what) => Err(self.throw_error(
        ErrorClass::TypeError,
        &format!(
          "Cannot set properties of {what} (setting '{}')",
          self.key_display(key)
        ),
      )),
    }
  }

  fn plan_set(
    heap: &mut Heap,
    slot: Slot,
    key: &PropertyKey,
    value: Slot,
    number: f64,
  ) -> SetAction {
    let mut view = None;
    if let Some(object) = heap.object_mut(slot) {
      match &mut object.kind {
        ObjectKind::Array(elements) => {
          if key.is("length") {
            if number.is_finite() && number >= 0.0 {
              elements.resize(number as usize, heap::UNDEFINED);
            }
            return SetAction::Done;
          }
          if let Some(index) = key.array_index() {
            let index = index as usize;
            if index >= elements.len() {
              elements.resize(index + 1, heap::UNDEFINED);
            }
            elements[index] = value;
            return SetAction::Done;
          }
        }
        ObjectKind::TypedArray(typed) => {
          if let Some(index) = key.array_index() {
            view = Some((*typed, index as usize));
          }
        }
        _ => {}
      }
    }
    if let Some((view, index)) = view {
      if index < view.length {
        if let Some(data) = Self::view_data(heap, &view) {
          // SAFETY: index < length and views are bounds-checked on creation.
          unsafe {
            write_element(
              view.kind,
              data.add(index * view.kind.element_size()),
              number,
            )
          };
        }
      }
      return SetAction::Done;
    }

    let mut current = Some(slot);
    while let Some(holder) = current {
      let Some(object) = heap.object(holder) else {
        break;
      };
      match object.properties.get(key) {
        Some(Property::Data { attributes, .. }) => {
          if !attributes.writable {
            return SetAction::Ignore;
          }
          if holder == slot {
            if let Some(Property::Data { value: stored, .. }) = heap
              .object_mut(slot)
              .and_then(|object| object.properties.get_mut(key))
            {
              *stored = value;
            }
            return SetAction::Done;
          }
          break;
        }
        Some(Property::Accessor { setter, .. }) => {
          return match setter {
            Some(setter) => SetAction::CallSetter(*setter),
            None => SetAction::Ignore,
          };
        }
        None => current = object.proto,
      }
    }
    builtins::define_data(heap, slot, key.clone(), value, PropertyAttributes::ALL);
    SetAction::Done
  }

  pub(crate) fn has(
    &self,
    object: RawValue,
    key: &PropertyKey,
  ) -> EngineResult<bool> {
    let slot = self.expect_object(object)?;
    let heap = self.heap();
    Ok(!matches!(Self::find(&heap, slot, key), Found::Missing))
  }

  pub(crate) fn has_own(&self, object: RawValue, key: &PropertyKey) -> bool {
    let heap = self.heap();
    let Some(object) = heap.object(to_slot(object)) else {
      return false;
    };
    if let Some(found) = Self::exotic_get(&heap, &object.kind, key) {
      return !matches!(found, Found::Slot(heap::UNDEFINED))
        || matches!(object.kind, ObjectKind::Array(_));
    }
    object.properties.contains_key(key)
  }

  fn delete(&self, object: RawValue, key: &PropertyKey) -> EngineResult<bool> {
    let slot = self.expect_object(object)?;
    let mut heap = self.heap_mut();
    let Some(object) = heap.object_mut(slot) else {
      return Err(EngineError::new(Error::ObjectExpected));
    };
    match &mut object.kind {
      ObjectKind::Array(elements) => {
        if key.is("length") {
          return Ok(false);
        }
        if let Some(index) = key.array_index() {
          if let Some(element) = elements.get_mut(index as usize) {
            *element = heap::UNDEFINED;
          }
          return Ok(true);
        }
      }
      ObjectKind::TypedArray(view) => {
        if key.is("length") {
          return Ok(false);
        }
        if let Some(index) = key.array_index() {
          return Ok(index as usize >= view.length);
        }
      }
      _ => {}
    }
    match object.properties.get(key) {
      Some(property) if !property.attributes().configurable => Ok(false),
      Some(_) => {
        object.properties.shift_remove(key);
        Ok(true)
      }
      None => Ok(true),
    }
  }

  fn element_key(index: u32) -> PropertyKey {
    PropertyKey::named(&index.to_string())
  }

  fn behavior(&self, function: RawValue) -> Option<Behavior> {
    match &self.heap().object(to_slot(function))?.kind {
      ObjectKind::Function(behavior) => Some(behavior.clone()),
      _ => None,
    }
  }

  fn invoke(
    &self,
    native: NativeFunction,
    callee: RawValue,
    this: RawValue,
    args: &[RawValue],
    new_target: Option<RawValue>,
  ) -> EngineResult<RawValue> {
    let invocation = Invocation {
      callee,
      this,
      args,
      new_target,
    };
    // SAFETY: entries are registered together with the data they expect.
    let result = unsafe { (native.entry)(native.data, &invocation) };
    if self.has_exception() {
      return Err(EngineError::pending_exception());
    }
    Ok(result.unwrap_or_else(|| self.undefined()))
  }

  pub(crate) fn call(
    &self,
    function: RawValue,
    this: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue> {
    match self.behavior(function) {
      Some(Behavior::Native(native)) => {
        self.invoke(native, function, this, args, None)
      }
      Some(Behavior::Class(_)) => Err(self.throw_error(
        ErrorClass::TypeError,
        "Class constructor cannot be invoked without 'new'",
      )),
      Some(Behavior::Builtin(builtin)) => {
        self.call_builtin(builtin, this, args, None)
      }
      None => Err(
        self.throw_error(ErrorClass::TypeError, "value is not a function"),
      ),
    }
  }

  fn prototype_of_constructor(&self, constructor: RawValue) -> EngineResult<Slot> {
    let prototype = self.get(constructor, &PropertyKey::named("prototype"))?;
    if self.is_object(prototype) {
      Ok(to_slot(prototype))
    } else {
      Ok(self.heap().realm.object_prototype)
    }
  }

  pub(crate) fn construct_value(
    &self,
    constructor: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue> {
    match self.behavior(constructor) {
      Some(Behavior::Class(native)) => {
        let proto = self.prototype_of_constructor(constructor)?;
        let instance = to_raw(self.alloc_object(proto, ObjectKind::Ordinary));
        self.invoke(native, constructor, instance, args, Some(constructor))?;
        Ok(instance)
      }
      Some(Behavior::Native(native)) => {
        let proto = self.prototype_of_constructor(constructor)?;
        let instance = to_raw(self.alloc_object(proto, ObjectKind::Ordinary));
        let result =
          self.invoke(native, constructor, instance, args, Some(constructor))?;
        Ok(if self.is_object(result) { result } else { instance })
      }
      Some(Behavior::Builtin(builtin)) => {
        self.call_builtin(builtin, self.undefined(), args, Some(constructor))
      }
      None => Err(
        self.throw_error(ErrorClass::TypeError, "value is not a constructor"),
      ),
    }
  }

  fn new_function(&self, name: &str, behavior: Behavior) -> RawValue {
    let name = to_slot(self.alloc_str(name));
    let mut heap = self.heap_mut();
    to_raw(builtins::alloc_function(&mut heap, name, behavior))
  }

  fn array_from(&self, slots: Vec<Slot>) -> RawValue {
    let mut heap = self.heap_mut();
    let proto = heap.realm.array_prototype;
    to_raw(heap.alloc_object(Some(proto), ObjectKind::Array(slots)))
  }

  fn buffer_len(&self, buffer: Slot) -> EngineResult<usize> {
    match self.heap().object(buffer).map(|object| &object.kind) {
      Some(ObjectKind::ArrayBuffer(backing)) => Ok(backing.len()),
      _ => Err(EngineError::new(Error::InvalidArg)),
    }
  }

  fn run_finalizers(&self, finalizers: Vec<Finalizer>) {
    if finalizers.is_empty() {
      return;
    }
    self.heap_mut().stats.finalizers_run += finalizers.len();
    for finalize in finalizers {
      finalize();
    }
  }
}

impl Drop for LocalEngine {
  fn drop(&mut self) {
    let finalizers = self.heap.get_mut().drain_finalizers();
    for finalize in finalizers {
      finalize();
    }
  }
}

impl Engine for LocalEngine {
  fn name(&self) -> &'static str {
    "local"
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn global(&self) -> RawValue {
    to_raw(self.heap().realm.global)
  }

  fn undefined(&self) -> RawValue {
    to_raw(heap::UNDEFINED)
  }

  fn null(&self) -> RawValue {
    to_raw(heap::NULL)
  }

  fn boolean(&self, value: bool) -> RawValue {
    to_raw(if value { heap::TRUE } else { heap::FALSE })
  }

  fn create_number(&self, value: f64) -> EngineResult<RawValue> {
    Ok(self.alloc(HeapValue::Number(value)))
  }

  fn create_string(&self, units: &[u16]) -> EngineResult<RawValue> {
    Ok(self.alloc(HeapValue::String(units.into())))
  }

  fn create_symbol(
    &self,
    description: Option<RawValue>,
  ) -> EngineResult<RawValue> {
    let description = match description {
      Some(description) => Some(
        self
          .heap()
          .string(to_slot(description))
          .ok_or(EngineError::new(Error::StringExpected))?,
      ),
      None => None,
    };
    Ok(self.alloc(HeapValue::Symbol(description)))
  }

  fn create_object(&self) -> EngineResult<RawValue> {
    let proto = self.heap().realm.object_prototype;
    Ok(to_raw(self.alloc_object(proto, ObjectKind::Ordinary)))
  }

  fn create_array(&self, length: u32) -> EngineResult<RawValue> {
    Ok(self.array_from(vec![heap::NULL; length as usize]))
  }

  fn create_error(
    &self,
    kind: ErrorKind,
    message: RawValue,
  ) -> EngineResult<RawValue> {
    let message = self
      .heap()
      .string(to_slot(message))
      .ok_or(EngineError::new(Error::StringExpected))?;
    let class = match kind {
      ErrorKind::Error => ErrorClass::Error,
      ErrorKind::TypeError => ErrorClass::TypeError,
      ErrorKind::RangeError => ErrorClass::RangeError,
    };
    Ok(to_raw(
      self.make_error(class, &String::from_utf16_lossy(&message)),
    ))
  }

  fn create_external(&self, data: *mut c_void) -> EngineResult<RawValue> {
    let proto = self.heap().realm.object_prototype;
    Ok(to_raw(self.alloc_object(proto, ObjectKind::External(data))))
  }

  fn create_function(
    &self,
    name: &str,
    function: NativeFunction,
  ) -> EngineResult<RawValue> {
    Ok(self.new_function(name, Behavior::Native(function)))
  }

  fn create_class(&self, template: &ClassTemplate) -> EngineResult<RawValue> {
    let constructor =
      self.new_function(&template.name, Behavior::Class(template.constructor));
    let mut heap = self.heap_mut();
    let object_prototype = heap.realm.object_prototype;
    let prototype =
      heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
    builtins::link_constructor(&mut heap, to_slot(constructor), prototype);
    Ok(constructor)
  }

  fn create_promise(&self) -> EngineResult<PromiseCapability> {
    let promise = self.new_promise();
    let (resolve, reject) = self.resolving_functions(promise);
    Ok(PromiseCapability {
      promise: to_raw(promise),
      resolve,
      reject,
    })
  }

  fn create_array_buffer(
    &self,
    byte_length: usize,
  ) -> EngineResult<(RawValue, *mut u8)> {
    let backing = Backing::Owned(OwnedBuffer::zeroed(byte_length));
    let data = backing.data();
    let proto = self.heap().realm.array_buffer_prototype;
    let buffer = self.alloc_object(proto, ObjectKind::ArrayBuffer(backing));
    Ok((to_raw(buffer), data))
  }

  fn create_external_array_buffer(
    &self,
    data: *mut u8,
    byte_length: usize,
    finalizer: Option<Finalizer>,
  ) -> EngineResult<RawValue> {
    let backing = Backing::External {
      data,
      len: byte_length,
    };
    let proto = self.heap().realm.array_buffer_prototype;
    let buffer = self.alloc_object(proto, ObjectKind::ArrayBuffer(backing));
    if let Some(finalizer) = finalizer {
      if let Some(object) = self.heap_mut().object_mut(buffer) {
        object.finalizers.push(finalizer);
      }
    }
    Ok(to_raw(buffer))
  }

  fn create_typed_array(
    &self,
    kind: TypedArrayKind,
    length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue> {
    let buffer_len = self.buffer_len(to_slot(buffer))?;
    let size = kind.element_size();
    if byte_offset % size != 0 {
      return Err(self.throw_error(
        ErrorClass::RangeError,
        &format!(
          "start offset of {} should be a multiple of {size}",
          kind.name()
        ),
      ));
    }
    let fits = length
      .checked_mul(size)
      .and_then(|bytes| bytes.checked_add(byte_offset))
      .is_some_and(|end| end <= buffer_len);
    if !fits {
      return Err(
        self.throw_error(ErrorClass::RangeError, "Invalid typed array length"),
      );
    }
    let view = TypedView {
      kind,
      buffer: to_slot(buffer),
      byte_offset,
      length,
    };
    let proto = self.heap().realm.typed_array_prototype;
    Ok(to_raw(self.alloc_object(proto, ObjectKind::TypedArray(view))))
  }

  fn create_data_view(
    &self,
    byte_length: usize,
    buffer: RawValue,
    byte_offset: usize,
  ) -> EngineResult<RawValue> {
    let buffer_len = self.buffer_len(to_slot(buffer))?;
    let fits = byte_offset
      .checked_add(byte_length)
      .is_some_and(|end| end <= buffer_len);
    if !fits {
      return Err(self.throw_error(
        ErrorClass::RangeError,
        "byte_offset + byte_length should be less than or equal to the size in bytes of the array passed in",
      ));
    }
    let proto = self.heap().realm.data_view_prototype;
    let view = ObjectKind::DataView {
      buffer: to_slot(buffer),
      byte_offset,
      byte_length,
    };
    Ok(to_raw(self.alloc_object(proto, view)))
  }

  fn type_of(&self, value: RawValue) -> ValueKind {
    Self::value_kind(&self.heap(), to_slot(value))
      .unwrap_or(ValueKind::Undefined)
  }

  fn is_array(&self, value: RawValue) -> bool {
    matches!(
      self.heap().object(to_slot(value)).map(|o| &o.kind),
      Some(ObjectKind::Array(_))
    )
  }

  fn is_error(&self, value: RawValue) -> bool {
    matches!(
      self.heap().object(to_slot(value)).map(|o| &o.kind),
      Some(ObjectKind::Error)
    )
  }

  fn is_array_buffer(&self, value: RawValue) -> bool {
    matches!(
      self.heap().object(to_slot(value)).map(|o| &o.kind),
      Some(ObjectKind::ArrayBuffer(_))
    )
  }

  fn is_typed_array(&self, value: RawValue) -> bool {
    matches!(
      self.heap().object(to_slot(value)).map(|o| &o.kind),
      Some(ObjectKind::TypedArray(_))
    )
  }

  fn is_data_view(&self, value: RawValue) -> bool {
    matches!(
      self.heap().object(to_slot(value)).map(|o| &o.kind),
      Some(ObjectKind::DataView { .. })
    )
  }

  fn strict_equals(&self, a: RawValue, b: RawValue) -> bool {
    let heap = self.heap();
    match (heap.value(to_slot(a)), heap.value(to_slot(b))) {
      (Some(HeapValue::Number(a)), Some(HeapValue::Number(b))) => a == b,
      (Some(HeapValue::String(a)), Some(HeapValue::String(b))) => a == b,
      (Some(HeapValue::Boolean(a)), Some(HeapValue::Boolean(b))) => a == b,
      (Some(HeapValue::Undefined), Some(HeapValue::Undefined))
      | (Some(HeapValue::Null), Some(HeapValue::Null)) => true,
      (Some(_), Some(_)) => to_slot(a) == to_slot(b),
      _ => false,
    }
  }

  fn instance_of(
    &self,
    object: RawValue,
    constructor: RawValue,
  ) -> EngineResult<bool> {
    if self.type_of(constructor) != ValueKind::Function {
      return Err(self.throw_error(
        ErrorClass::TypeError,
        "Right-hand side of 'instanceof' is not callable",
      ));
    }
    let prototype = self.get(constructor, &PropertyKey::named("prototype"))?;
    if !self.is_object(prototype) {
      return Err(self.throw_error(
        ErrorClass::TypeError,
        "Function has non-object prototype in instanceof check",
      ));
    }
    let target = to_slot(prototype);
    let heap = self.heap();
    let mut current = heap.object(to_slot(object)).and_then(|o| o.proto);
    while let Some(slot) = current {
      if slot == target {
        return Ok(true);
      }
      current = heap.object(slot).and_then(|o| o.proto);
    }
    Ok(false)
  }

  fn number_value(&self, value: RawValue) -> EngineResult<f64> {
    match self.heap().value(to_slot(value)) {
      Some(HeapValue::Number(number)) => Ok(*number),
      _ => Err(EngineError::new(Error::NumberExpected)),
    }
  }

  fn bool_value(&self, value: RawValue) -> EngineResult<bool> {
    match self.heap().value(to_slot(value)) {
      Some(HeapValue::Boolean(value)) => Ok(*value),
      _ => Err(EngineError::new(Error::BooleanExpected)),
    }
  }

  fn string_value(&self, value: RawValue) -> EngineResult<Vec<u16>> {
    match self.heap().value(to_slot(value)) {
      Some(HeapValue::String(units)) => Ok(units.to_vec()),
      _ => Err(EngineError::new(Error::StringExpected)),
    }
  }

  fn external_value(&self, value: RawValue) -> EngineResult<*mut c_void> {
    match self.heap().object(to_slot(value)).map(|o| &o.kind) {
      Some(ObjectKind::External(data)) => Ok(*data),
      _ => Err(EngineError::new(Error::InvalidArg)),
    }
  }

  fn coerce_to_bool(&self, value: RawValue) -> EngineResult<RawValue> {
    Ok(self.boolean(self.to_boolean(value)))
  }

  fn coerce_to_number(&self, value: RawValue) -> EngineResult<RawValue> {
    let number = self.to_number(value)?;
    self.create_number(number)
  }

  fn coerce_to_object(&self, value: RawValue) -> EngineResult<RawValue> {
    match self.type_of(value) {
      ValueKind::Undefined | ValueKind::Null => Err(self.throw_error(
        ErrorClass::TypeError,
        "Cannot convert undefined or null to object",
      )),
      ValueKind::Object | ValueKind::Function | ValueKind::External => {
        Ok(value)
      }
      _ => {
        let proto = self.heap().realm.object_prototype;
        Ok(to_raw(
          self.alloc_object(proto, ObjectKind::Boxed(to_slot(value))),
        ))
      }
    }
  }

  fn coerce_to_string(&self, value: RawValue) -> EngineResult<RawValue> {
    let units = self.to_string_units(value)?;
    Ok(self.alloc(HeapValue::String(units)))
  }

  fn get_prototype(&self, object: RawValue) -> EngineResult<RawValue> {
    let slot = self.expect_object(object)?;
    let proto = self.heap().object(slot).and_then(|o| o.proto);
    Ok(to_raw(proto.unwrap_or(heap::NULL)))
  }

  fn get_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<RawValue> {
    let key = self.to_property_key(key)?;
    self.get(object, &key)
  }

  fn set_property(
    &self,
    object: RawValue,
    key: RawValue,
    value: RawValue,
  ) -> EngineResult<()> {
    let key = self.to_property_key(key)?;
    self.set(object, &key, value)
  }

  fn has_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool> {
    let key = self.to_property_key(key)?;
    self.has(object, &key)
  }

  fn delete_property(
    &self,
    object: RawValue,
    key: RawValue,
  ) -> EngineResult<bool> {
    let key = self.to_property_key(key)?;
    self.delete(object, &key)
  }

  fn define_property(
    &self,
    object: RawValue,
    definition: &PropertyDefinition,
  ) -> EngineResult<()> {
    let slot = self.expect_object(object)?;
    let key = self.to_property_key(definition.key)?;
    let property = match definition.value {
      PropertyValue::Data(value) => Property::Data {
        value: to_slot(value),
        attributes: definition.attributes,
      },
      PropertyValue::Accessor { getter, setter } => {
        let name = self.key_display(&key);
        let getter = getter.map(|getter| {
          to_slot(self.new_function(&name, Behavior::Native(getter)))
        });
        let setter = setter.map(|setter| {
          to_slot(self.new_function(&name, Behavior::Native(setter)))
        });
        Property::Accessor {
          getter,
          setter,
          attributes: definition.attributes,
        }
      }
    };
    let mut heap = self.heap_mut();
    let object = heap
      .object_mut(slot)
      .ok_or(EngineError::new(Error::ObjectExpected))?;
    object.properties.insert(key, property);
    Ok(())
  }

  fn own_property_names(&self, object: RawValue) -> EngineResult<RawValue> {
    let slot = self.expect_object(object)?;
    let names: Vec<String> = {
      let heap = self.heap();
      let object = heap
        .object(slot)
        .ok_or(EngineError::new(Error::ObjectExpected))?;
      let indices = match &object.kind {
        ObjectKind::Array(elements) => elements.len(),
        ObjectKind::TypedArray(view) => view.length,
        _ => 0,
      };
      (0..indices)
        .map(|index| index.to_string())
        .chain(object.properties.iter().filter_map(|(key, property)| {
          match key {
            PropertyKey::String(units) if property.attributes().enumerable => {
              Some(String::from_utf16_lossy(units))
            }
            _ => None,
          }
        }))
        .collect()
    };
    let slots = names
      .iter()
      .map(|name| to_slot(self.alloc_str(name)))
      .collect();
    Ok(self.array_from(slots))
  }

  fn get_element(
    &self,
    object: RawValue,
    index: u32,
  ) -> EngineResult<RawValue> {
    self.expect_object(object)?;
    self.get(object, &Self::element_key(index))
  }

  fn set_element(
    &self,
    object: RawValue,
    index: u32,
    value: RawValue,
  ) -> EngineResult<()> {
    self.expect_object(object)?;
    self.set(object, &Self::element_key(index), value)
  }

  fn has_element(&self, object: RawValue, index: u32) -> EngineResult<bool> {
    self.has(object, &Self::element_key(index))
  }

  fn delete_element(
    &self,
    object: RawValue,
    index: u32,
  ) -> EngineResult<bool> {
    self.delete(object, &Self::element_key(index))
  }

  fn array_length(&self, array: RawValue) -> EngineResult<u32> {
    match self.heap().object(to_slot(array)).map(|o| &o.kind) {
      Some(ObjectKind::Array(elements)) => Ok(elements.len() as u32),
      _ => Err(EngineError::new(Error::ArrayExpected)),
    }
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
    self.call(function, this, args)
  }

  fn construct(
    &self,
    constructor: RawValue,
    args: &[RawValue],
  ) -> EngineResult<RawValue> {
    if self.type_of(constructor) != ValueKind::Function {
      return Err(EngineError::new(Error::FunctionExpected));
    }
    self.construct_value(constructor, args)
  }

  fn array_buffer_info(
    &self,
    value: RawValue,
  ) -> EngineResult<(*mut u8, usize)> {
    match self.heap().object(to_slot(value)).map(|o| &o.kind) {
      Some(ObjectKind::ArrayBuffer(backing)) => {
        Ok((backing.data(), backing.len()))
      }
      _ => Err(EngineError::new(Error::InvalidArg)),
    }
  }

  fn typed_array_info(&self, value: RawValue) -> EngineResult<TypedArrayInfo> {
    let heap = self.heap();
    let Some(ObjectKind::TypedArray(view)) =
      heap.object(to_slot(value)).map(|o| &o.kind)
    else {
      return Err(EngineError::new(Error::InvalidArg));
    };
    let data = Self::view_data(&heap, view)
      .ok_or(EngineError::new(Error::GenericFailure))?;
    Ok(TypedArrayInfo {
      kind: view.kind,
      length: view.length,
      data,
      buffer: to_raw(view.buffer),
      byte_offset: view.byte_offset,
    })
  }

  fn data_view_info(&self, value: RawValue) -> EngineResult<DataViewInfo> {
    let heap = self.heap();
    let Some(ObjectKind::DataView {
      buffer,
      byte_offset,
      byte_length,
    }) = heap.object(to_slot(value)).map(|o| &o.kind)
    else {
      return Err(EngineError::new(Error::InvalidArg));
    };
    let data = match heap.object(*buffer).map(|o| &o.kind) {
      // SAFETY: creation checked the view against the buffer length.
      Some(ObjectKind::ArrayBuffer(backing)) => unsafe {
        backing.data().add(*byte_offset)
      },
      _ => return Err(EngineError::new(Error::GenericFailure)),
    };
    Ok(DataViewInfo {
      byte_length: *byte_length,
      data,
      buffer: to_raw(*buffer),
      byte_offset: *byte_offset,
    })
  }

  fn set_private(
    &self,
    object: RawValue,
    slot: PrivateSlot,
    data: *mut c_void,
  ) -> EngineResult<()> {
    let mut heap = self.heap_mut();
    let object = heap
      .object_mut(to_slot(object))
      .ok_or(EngineError::new(Error::ObjectExpected))?;
    match slot {
      PrivateSlot::Class => object.class_data = data,
      PrivateSlot::Wrap => object.wrap_data = data,
    }
    Ok(())
  }

  fn get_private(
    &self,
    object: RawValue,
    slot: PrivateSlot,
  ) -> EngineResult<*mut c_void> {
    let heap = self.heap();
    let object = heap
      .object(to_slot(object))
      .ok_or(EngineError::new(Error::ObjectExpected))?;
    Ok(match slot {
      PrivateSlot::Class => object.class_data,
      PrivateSlot::Wrap => object.wrap_data,
    })
  }

  fn add_finalizer(
    &self,
    object: RawValue,
    finalizer: Finalizer,
  ) -> EngineResult<()> {
    let mut heap = self.heap_mut();
    let object = heap
      .object_mut(to_slot(object))
      .ok_or(EngineError::new(Error::ObjectExpected))?;
    object.finalizers.push(finalizer);
    Ok(())
  }

  fn protect(&self, value: RawValue) {
    let mut heap = self.heap_mut();
    *heap.protected.entry(to_slot(value)).or_insert(0) += 1;
    heap.stats.protects += 1;
  }

  fn unprotect(&self, value: RawValue) {
    let mut heap = self.heap_mut();
    let slot = to_slot(value);
    match heap.protected.get_mut(&slot) {
      Some(count) if *count > 1 => *count -= 1,
      Some(_) => {
        heap.protected.remove(&slot);
      }
      None => {
        log::warn!("unprotect of a value that is not protected");
        return;
      }
    }
    heap.stats.unprotects += 1;
  }

  fn throw(&self, error: RawValue) {
    self.heap_mut().exception = Some(to_slot(error));
  }

  fn has_exception(&self) -> bool {
    self.heap().exception.is_some()
  }

  fn take_exception(&self) -> Option<RawValue> {
    self.heap_mut().exception.take().map(to_raw)
  }

  fn run_script(
    &self,
    source: &[u16],
    source_url: Option<&str>,
  ) -> EngineResult<RawValue> {
    log::debug!("evaluating script {}", source_url.unwrap_or("<anonymous>"));
    script::evaluate(self, &String::from_utf16_lossy(source))
  }

  fn set_promise_continuation(&self, hook: ContinuationHook) -> bool {
    *self.continuation.borrow_mut() = Some(Rc::from(hook));
    true
  }

  fn collect_garbage(&self) {
    let finalizers = self.heap_mut().collect();
    self.run_finalizers(finalizers);
  }

  fn finalize_all(&self) {
    let finalizers = self.heap_mut().drain_finalizers();
    self.run_finalizers(finalizers);
  }
}

/// Formats a number the way `Number.prototype.toString` does for the
/// common cases.
pub(crate) fn number_to_string(number: f64) -> String {
  if number.is_nan() {
    return "NaN".into();
  }
  if number.is_infinite() {
    return if number > 0.0 { "Infinity" } else { "-Infinity" }.into();
  }
  if number == 0.0 {
    return "0".into();
  }
  let magnitude = number.abs();
  if !(1e-6..1e21).contains(&magnitude) {
    let text = format!("{number:e}");
    return match text.split_once('e') {
      Some((mantissa, exponent)) if !exponent.starts_with('-') => {
        format!("{mantissa}e+{exponent}")
      }
      _ => text,
    };
  }
  format!("{number}")
}

pub(crate) fn string_to_number(text: &str) -> f64 {
  let text = text.trim();
  if text.is_empty() {
    return 0.0;
  }
  match text {
    "Infinity" | "+Infinity" => return f64::INFINITY,
    "-Infinity" => return f64::NEG_INFINITY,
    _ => {}
  }
  if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
  {
    return u64::from_str_radix(hex, 16)
      .map(|value| value as f64)
      .unwrap_or(f64::NAN);
  }
  let valid = text
    .chars()
    .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
  if !valid {
    return f64::NAN;
  }
  text.parse().unwrap_or(f64::NAN)
}

unsafe fn read_element(kind: TypedArrayKind, ptr: *const u8) -> f64 {
  // SAFETY: the caller guarantees `ptr` addresses a whole element.
  unsafe {
    match kind {
      TypedArrayKind::Int8 => ptr.cast::<i8>().read() as f64,
      TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => ptr.read() as f64,
      TypedArrayKind::Int16 => ptr.cast::<i16>().read_unaligned() as f64,
      TypedArrayKind::Uint16 => ptr.cast::<u16>().read_unaligned() as f64,
      TypedArrayKind::Int32 => ptr.cast::<i32>().read_unaligned() as f64,
      TypedArrayKind::Uint32 => ptr.cast::<u32>().read_unaligned() as f64,
      TypedArrayKind::Float32 => ptr.cast::<f32>().read_unaligned() as f64,
      TypedArrayKind::Float64 => ptr.cast::<f64>().read_unaligned(),
    }
  }
}

unsafe fn write_element(kind: TypedArrayKind, ptr: *mut u8, value: f64) {
  // SAFETY: the caller guarantees `ptr` addresses a whole element.
  unsafe {
    match kind {
      TypedArrayKind::Int8 => ptr.cast::<i8>().write(to_int32(value) as i8),
      TypedArrayKind::Uint8 => ptr.write(to_uint32(value) as u8),
      TypedArrayKind::Uint8Clamped => {
        let clamped = if value.is_nan() {
          0.0
        } else {
          value.clamp(0.0, 255.0).round_ties_even()
        };
        ptr.write(clamped as u8)
      }
      TypedArrayKind::Int16 => {
        ptr.cast::<i16>().write_unaligned(to_int32(value) as i16)
      }
      TypedArrayKind::Uint16 => {
        ptr.cast::<u16>().write_unaligned(to_uint32(value) as u16)
      }
      TypedArrayKind::Int32 => {
        ptr.cast::<i32>().write_unaligned(to_int32(value))
      }
      TypedArrayKind::Uint32 => {
        ptr.cast::<u32>().write_unaligned(to_uint32(value))
      }
      TypedArrayKind::Float32 => {
        ptr.cast::<f32>().write_unaligned(value as f32)
      }
      TypedArrayKind::Float64 => ptr.cast::<f64>().write_unaligned(value),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn string(engine: &LocalEngine, text: &str) -> RawValue {
    engine.alloc_str(text)
  }

  fn text(engine: &LocalEngine, value: RawValue) -> String {
    String::from_utf16_lossy(&engine.string_value(value).unwrap())
  }

  #[test]
  fn number_formatting() {
    assert_eq!(number_to_string(3.0), "3");
    assert_eq!(number_to_string(-0.0), "0");
    assert_eq!(number_to_string(0.5), "0.5");
    assert_eq!(number_to_string(1e21), "1e+21");
    assert_eq!(number_to_string(1e-7), "1e-7");
    assert_eq!(number_to_string(f64::NAN), "NaN");
    assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
  }

  #[test]
  fn number_parsing() {
    assert_eq!(string_to_number(" 42 "), 42.0);
    assert_eq!(string_to_number(""), 0.0);
    assert_eq!(string_to_number("0x10"), 16.0);
    assert!(string_to_number("inf").is_nan());
    assert!(string_to_number("4px").is_nan());
  }

  #[test]
  fn properties_follow_the_prototype_chain() {
    let engine = LocalEngine::new();
    let parent = engine.create_object().unwrap();
    let key = string(&engine, "shared");
    let value = engine.create_number(7.0).unwrap();
    engine.set_property(parent, key, value).unwrap();

    let child = engine.construct(
      engine.get_property(engine.global(), string(&engine, "Object")).unwrap(),
      &[],
    );
    let child = child.unwrap();
    engine.heap_mut().object_mut(to_slot(child)).unwrap().proto =
      Some(to_slot(parent));

    let read = engine.get_property(child, key).unwrap();
    assert_eq!(engine.number_value(read).unwrap(), 7.0);
    assert!(engine.has_property(child, key).unwrap());
    assert!(!engine.has_own(child, &engine.to_property_key(key).unwrap()));
  }

  #[test]
  fn arrays_are_null_filled_and_grow() {
    let engine = LocalEngine::new();
    let array = engine.create_array(2).unwrap();
    assert_eq!(engine.array_length(array).unwrap(), 2);
    assert_eq!(engine.type_of(engine.get_element(array, 0).unwrap()), ValueKind::Null);
    let five = engine.create_number(5.0).unwrap();
    engine.set_element(array, 4, five).unwrap();
    assert_eq!(engine.array_length(array).unwrap(), 5);
    assert_eq!(
      engine.type_of(engine.get_element(array, 3).unwrap()),
      ValueKind::Undefined
    );
  }

  #[test]
  fn typed_arrays_share_their_buffer() {
    let engine = LocalEngine::new();
    let (buffer, data) = engine.create_array_buffer(8).unwrap();
    let view = engine
      .create_typed_array(TypedArrayKind::Uint16, 2, buffer, 4)
      .unwrap();
    let value = engine.create_number(65537.0).unwrap();
    engine.set_element(view, 1, value).unwrap();
    // SAFETY: the buffer is 8 bytes long.
    let bytes = unsafe { std::slice::from_raw_parts(data, 8) };
    assert_eq!(u16::from_ne_bytes([bytes[6], bytes[7]]), 1);

    let info = engine.typed_array_info(view).unwrap();
    assert_eq!(info.byte_offset, 4);
    assert_eq!(info.data, unsafe { data.add(4) });

    let misaligned =
      engine.create_typed_array(TypedArrayKind::Int32, 1, buffer, 2);
    assert_eq!(misaligned, Err(EngineError::pending_exception()));
    let error = engine.take_exception().unwrap();
    let message = engine.get(error, &PropertyKey::named("message")).unwrap();
    assert_eq!(
      text(&engine, message),
      "start offset of Int32Array should be a multiple of 4"
    );
  }

  #[test]
  fn symbol_keys_show_their_description() {
    let engine = LocalEngine::new();
    let tag = engine.create_symbol(Some(string(&engine, "tag"))).unwrap();
    let key = engine.to_property_key(tag).unwrap();
    assert_eq!(
      engine.get(engine.null(), &key),
      Err(EngineError::pending_exception())
    );
    let error = engine.take_exception().unwrap();
    let message = engine.get(error, &PropertyKey::named("message")).unwrap();
    assert_eq!(
      text(&engine, message),
      "Cannot read properties of null (reading 'Symbol(tag)')"
    );
  }

  #[test]
  fn protect_keeps_values_alive() {
    let engine = LocalEngine::new();
    let object = engine.create_object().unwrap();
    engine.protect(object);
    engine.collect_garbage();
    assert!(engine.heap().is_live(to_slot(object)));
    engine.unprotect(object);
    engine.collect_garbage();
    assert!(!engine.heap().is_live(to_slot(object)));
    assert_eq!(engine.stats().protects, 1);
    assert_eq!(engine.stats().unprotects, 1);
  }

  #[test]
  fn errors_stringify_with_their_name() {
    let engine = LocalEngine::new();
    let message = string(&engine, "bad input");
    let error = engine.create_error(ErrorKind::RangeError, message).unwrap();
    assert!(engine.is_error(error));
    let rendered = engine.coerce_to_string(error).unwrap();
    assert_eq!(text(&engine, rendered), "RangeError: bad input");
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

use std::cell::Cell;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::os::raw::c_void;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::engine::Finalizer;
use crate::engine::NativeFunction;
use crate::engine::PropertyAttributes;
use crate::engine::TypedArrayKind;
use crate::value::RawValue;

pub(crate) type Slot = usize;

pub(crate) const UNDEFINED: Slot = 0;
pub(crate) const NULL: Slot = 1;
pub(crate) const TRUE: Slot = 2;
pub(crate) const FALSE: Slot = 3;
const PERMANENT: usize = 4;

#[inline]
pub(crate) fn to_raw(slot: Slot) -> RawValue {
  RawValue::from_token((slot + 1) << 3)
}

#[inline]
pub(crate) fn to_slot(value: RawValue) -> Slot {
  (value.token() >> 3).wrapping_sub(1)
}

pub(crate) enum HeapValue {
  Undefined,
  Null,
  Boolean(bool),
  Number(f64),
  String(Rc<[u16]>),
  Symbol(Option<Rc<[u16]>>),
  Object(Box<Object>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PropertyKey {
  String(Rc<[u16]>),
  Symbol(Slot),
}

impl PropertyKey {
  pub fn named(name: &str) -> Self {
    PropertyKey::String(name.encode_utf16().collect::<Vec<_>>().into())
  }

  /// The canonical array index this key spells, if any.
  pub fn array_index(&self) -> Option<u32> {
    let PropertyKey::String(units) = self else {
      return None;
    };
    if units.is_empty() || units.len() > 10 {
      return None;
    }
    if units.len() > 1 && units[0] == b'0' as u16 {
      return None;
    }
    let mut index: u64 = 0;
    for unit in units.iter() {
      let digit = (*unit as u32).checked_sub(b'0' as u32)?;
      if digit > 9 {
        return None;
      }
      index = index * 10 + digit as u64;
    }
    (index < u32::MAX as u64).then_some(index as u32)
  }

  pub fn is(&self, name: &str) -> bool {
    match self {
      PropertyKey::String(units) => units.iter().copied().eq(name.encode_utf16()),
      PropertyKey::Symbol(_) => false,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Property {
  Data {
    value: Slot,
    attributes: PropertyAttributes,
  },
  Accessor {
    getter: Option<Slot>,
    setter: Option<Slot>,
    attributes: PropertyAttributes,
  },
}

impl Property {
  pub fn attributes(&self) -> PropertyAttributes {
    match self {
      Property::Data { attributes, .. }
      | Property::Accessor { attributes, .. } => *attributes,
    }
  }
}

pub(crate) struct Object {
  pub proto: Option<Slot>,
  pub properties: IndexMap<PropertyKey, Property>,
  pub kind: ObjectKind,
  pub class_data: *mut c_void,
  pub wrap_data: *mut c_void,
  pub finalizers: Vec<Finalizer>,
}

impl Object {
  pub fn new(proto: Option<Slot>, kind: ObjectKind) -> Self {
    Self {
      proto,
      properties: IndexMap::new(),
      kind,
      class_data: std::ptr::null_mut(),
      wrap_data: std::ptr::null_mut(),
      finalizers: Vec::new(),
    }
  }
}

pub(crate) enum ObjectKind {
  Ordinary,
  Array(Vec<Slot>),
  Error,
  Function(Behavior),
  ArrayBuffer(Backing),
  TypedArray(TypedView),
  DataView {
    buffer: Slot,
    byte_offset: usize,
    byte_length: usize,
  },
  Promise(PromiseState),
  External(*mut c_void),
  /// A primitive coerced to an object.
  Boxed(Slot),
}

#[derive(Clone)]
pub(crate) enum Behavior {
  Native(NativeFunction),
  Class(NativeFunction),
  Builtin(Builtin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
  Error,
  TypeError,
  RangeError,
  ReferenceError,
  SyntaxError,
}

impl ErrorClass {
  pub const ALL: [ErrorClass; 5] = [
    ErrorClass::Error,
    ErrorClass::TypeError,
    ErrorClass::RangeError,
    ErrorClass::ReferenceError,
    ErrorClass::SyntaxError,
  ];

  pub fn name(self) -> &'static str {
    match self {
      ErrorClass::Error => "Error",
      ErrorClass::TypeError => "TypeError",
      ErrorClass::RangeError => "RangeError",
      ErrorClass::ReferenceError => "ReferenceError",
      ErrorClass::SyntaxError => "SyntaxError",
    }
  }

  pub fn index(self) -> usize {
    self as usize
  }
}

#[derive(Clone)]
pub(crate) enum Builtin {
  ObjectConstructor,
  HasOwnProperty,
  ErrorConstructor(ErrorClass),
  PromiseConstructor,
  PromiseThen,
  Resolving {
    promise: Slot,
    reject: bool,
    settled: Rc<Cell<bool>>,
  },
  Job(Job),
}

pub(crate) struct OwnedBuffer(*mut [u8]);

impl OwnedBuffer {
  pub fn zeroed(len: usize) -> Self {
    Self(Box::into_raw(vec![0u8; len].into_boxed_slice()))
  }
}

impl Drop for OwnedBuffer {
  fn drop(&mut self) {
    // SAFETY: the pointer came from `Box::into_raw` and is dropped once.
    drop(unsafe { Box::from_raw(self.0) });
  }
}

pub(crate) enum Backing {
  Owned(OwnedBuffer),
  External { data: *mut u8, len: usize },
}

impl Backing {
  pub fn data(&self) -> *mut u8 {
    match self {
      Backing::Owned(buffer) => buffer.0 as *mut u8,
      Backing::External { data, .. } => *data,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Backing::Owned(buffer) => buffer.0.len(),
      Backing::External { len, .. } => *len,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TypedView {
  pub kind: TypedArrayKind,
  pub buffer: Slot,
  pub byte_offset: usize,
  pub length: usize,
}

pub(crate) enum PromiseState {
  Pending(Vec<Reaction>),
  Fulfilled(Slot),
  Rejected(Slot),
}

/// Handlers waiting on a promise. With no handler the outcome is passed
/// through to `derived` unchanged.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reaction {
  pub on_fulfilled: Option<Slot>,
  pub on_rejected: Option<Slot>,
  pub derived: Option<Slot>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Job {
  pub handler: Option<Slot>,
  pub argument: Slot,
  pub derived: Option<Slot>,
  pub rejected: bool,
}

impl Job {
  fn slots(&self, out: &mut Vec<Slot>) {
    out.extend(self.handler);
    out.push(self.argument);
    out.extend(self.derived);
  }
}

/// Well-known objects of the single realm.
#[derive(Debug, Default)]
pub(crate) struct Realm {
  pub global: Slot,
  pub object_prototype: Slot,
  pub function_prototype: Slot,
  pub array_prototype: Slot,
  pub error_prototypes: [Slot; 5],
  pub promise_prototype: Slot,
  pub array_buffer_prototype: Slot,
  pub typed_array_prototype: Slot,
  pub data_view_prototype: Slot,
}

impl Realm {
  fn slots(&self, out: &mut Vec<Slot>) {
    out.extend([
      self.global,
      self.object_prototype,
      self.function_prototype,
      self.array_prototype,
      self.promise_prototype,
      self.array_buffer_prototype,
      self.typed_array_prototype,
      self.data_view_prototype,
    ]);
    out.extend(self.error_prototypes);
  }
}

/// Counters exposed for inspection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
  pub protects: usize,
  pub unprotects: usize,
  pub finalizers_run: usize,
  pub collected: usize,
}

pub(crate) struct Heap {
  cells: Vec<Option<HeapValue>>,
  free: Vec<Slot>,
  pub protected: HashMap<Slot, usize>,
  pub realm: Realm,
  pub exception: Option<Slot>,
  pub jobs: VecDeque<Job>,
  pub stats: EngineStats,
}

impl Heap {
  pub fn new() -> Self {
    Self {
      cells: vec![
        Some(HeapValue::Undefined),
        Some(HeapValue::Null),
        Some(HeapValue::Boolean(true)),
        Some(HeapValue::Boolean(false)),
      ],
      free: Vec::new(),
      protected: HashMap::new(),
      realm: Realm::default(),
      exception: None,
      jobs: VecDeque::new(),
      stats: EngineStats::default(),
    }
  }

  pub fn alloc(&mut self, value: HeapValue) -> Slot {
    match value {
      HeapValue::Undefined => return UNDEFINED,
      HeapValue::Null => return NULL,
      HeapValue::Boolean(true) => return TRUE,
      HeapValue::Boolean(false) => return FALSE,
      _ => {}
    }
    match self.free.pop() {
      Some(slot) => {
        self.cells[slot] = Some(value);
        slot
      }
      None => {
        self.cells.push(Some(value));
        self.cells.len() - 1
      }
    }
  }

  pub fn alloc_object(&mut self, proto: Option<Slot>, kind: ObjectKind) -> Slot {
    self.alloc(HeapValue::Object(Box::new(Object::new(proto, kind))))
  }

  pub fn value(&self, slot: Slot) -> Option<&HeapValue> {
    self.cells.get(slot).and_then(Option::as_ref)
  }

  pub fn object(&self, slot: Slot) -> Option<&Object> {
    match self.value(slot) {
      Some(HeapValue::Object(object)) => Some(object),
      _ => None,
    }
  }

  pub fn object_mut(&mut self, slot: Slot) -> Option<&mut Object> {
    match self.cells.get_mut(slot).and_then(Option::as_mut) {
      Some(HeapValue::Object(object)) => Some(object),
      _ => None,
    }
  }

  pub fn string(&self, slot: Slot) -> Option<Rc<[u16]>> {
    match self.value(slot) {
      Some(HeapValue::String(units)) => Some(units.clone()),
      _ => None,
    }
  }

  #[cfg(test)]
  pub fn is_live(&self, slot: Slot) -> bool {
    self.value(slot).is_some()
  }

  pub fn live_objects(&self) -> usize {
    self
      .cells
      .iter()
      .filter(|cell| matches!(cell, Some(HeapValue::Object(_))))
      .count()
  }

  /// Mark and sweep. Returns the finalizers of every freed object; the
  /// caller runs them once no borrow of the heap is held.
  pub fn collect(&mut self) -> Vec<Finalizer> {
    let mut marked = vec![false; self.cells.len()];
    let mut stack = Vec::new();
    stack.extend(0..PERMANENT);
    self.realm.slots(&mut stack);
    stack.extend(self.protected.keys().copied());
    stack.extend(self.exception);
    for job in &self.jobs {
      job.slots(&mut stack);
    }

    while let Some(slot) = stack.pop() {
      if slot >= marked.len() || marked[slot] {
        continue;
      }
      marked[slot] = true;
      if let Some(HeapValue::Object(object)) = self.value(slot) {
        trace(object, &mut stack);
      }
    }

    let mut finalizers = Vec::new();
    for (slot, is_marked) in marked.iter().enumerate().skip(PERMANENT) {
      if *is_marked || self.cells[slot].is_none() {
        continue;
      }
      if let Some(HeapValue::Object(mut object)) = self.cells[slot].take() {
        finalizers.append(&mut object.finalizers);
      }
      self.free.push(slot);
      self.stats.collected += 1;
    }
    finalizers
  }

  /// Detaches every pending finalizer from the live objects.
  pub fn drain_finalizers(&mut self) -> Vec<Finalizer> {
    let mut finalizers = Vec::new();
    for cell in self.cells.iter_mut() {
      if let Some(HeapValue::Object(object)) = cell {
        finalizers.append(&mut object.finalizers);
      }
    }
    finalizers
  }
}

fn trace(object: &Object, out: &mut Vec<Slot>) {
  out.extend(object.proto);
  for (key, property) in &object.properties {
    if let PropertyKey::Symbol(symbol) = key {
      out.push(*symbol);
    }
    match property {
      Property::Data { value, .. } => out.push(*value),
      Property::Accessor { getter, setter, .. } => {
        out.extend(*getter);
        out.extend(*setter);
      }
    }
  }
  match &object.kind {
    ObjectKind::Array(elements) => out.extend(elements.iter().copied()),
    ObjectKind::TypedArray(view) => out.push(view.buffer),
    ObjectKind::DataView { buffer, .. } => out.push(*buffer),
    ObjectKind::Boxed(value) => out.push(*value),
    ObjectKind::Promise(state) => match state {
      PromiseState::Pending(reactions) => {
        for reaction in reactions {
          out.extend(reaction.on_fulfilled);
          out.extend(reaction.on_rejected);
          out.extend(reaction.derived);
        }
      }
      PromiseState::Fulfilled(value) | PromiseState::Rejected(value) => {
        out.push(*value)
      }
    },
    ObjectKind::Function(Behavior::Builtin(builtin)) => match builtin {
      Builtin::Resolving { promise, .. } => out.push(*promise),
      Builtin::Job(job) => job.slots(out),
      _ => {}
    },
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn array_index_keys() {
    assert_eq!(PropertyKey::named("0").array_index(), Some(0));
    assert_eq!(PropertyKey::named("42").array_index(), Some(42));
    assert_eq!(PropertyKey::named("042").array_index(), None);
    assert_eq!(PropertyKey::named("-1").array_index(), None);
    assert_eq!(PropertyKey::named("4294967295").array_index(), None);
    assert_eq!(PropertyKey::named("x").array_index(), None);
  }

  #[test]
  fn unreachable_objects_are_swept() {
    let mut heap = Heap::new();
    let root = heap.alloc_object(None, ObjectKind::Ordinary);
    let child = heap.alloc_object(None, ObjectKind::Ordinary);
    let orphan = heap.alloc_object(None, ObjectKind::Ordinary);
    heap.realm.global = root;
    heap.object_mut(root).unwrap().properties.insert(
      PropertyKey::named("child"),
      Property::Data {
        value: child,
        attributes: PropertyAttributes::ALL,
      },
    );

    let finalized = Rc::new(Cell::new(0));
    let counter = finalized.clone();
    heap
      .object_mut(orphan)
      .unwrap()
      .finalizers
      .push(Box::new(move || counter.set(counter.get() + 1)));

    let finalizers = heap.collect();
    assert_eq!(finalizers.len(), 1);
    finalizers.into_iter().for_each(|finalize| finalize());
    assert_eq!(finalized.get(), 1);
    assert!(heap.is_live(child));
    assert!(!heap.is_live(orphan));
    assert!(heap.collect().is_empty());
  }

  #[test]
  fn freed_slots_are_reused() {
    let mut heap = Heap::new();
    let first = heap.alloc(HeapValue::Number(1.0));
    heap.collect();
    let second = heap.alloc(HeapValue::Number(2.0));
    assert_eq!(first, second);
  }
}

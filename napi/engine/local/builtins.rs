// Copyright 2018-2026 the Deno authors. MIT license.

use std::cell::Cell;
use std::rc::Rc;

use super::LocalEngine;
use super::heap::Behavior;
use super::heap::Builtin;
use super::heap::ErrorClass;
use super::heap::Heap;
use super::heap::HeapValue;
use super::heap::Job;
use super::heap::ObjectKind;
use super::heap::PromiseState;
use super::heap::Property;
use super::heap::PropertyKey;
use super::heap::Reaction;
use super::heap::Slot;
use super::heap::to_raw;
use super::heap::to_slot;
use crate::engine::Engine;
use crate::engine::EngineResult;
use crate::engine::PropertyAttributes;
use crate::engine::ValueKind;
use crate::value::RawValue;

const FROZEN: PropertyAttributes = PropertyAttributes {
  writable: false,
  enumerable: false,
  configurable: false,
};

const READ_ONLY: PropertyAttributes = PropertyAttributes {
  writable: false,
  enumerable: false,
  configurable: true,
};

pub(super) fn define_data(
  heap: &mut Heap,
  object: Slot,
  key: PropertyKey,
  value: Slot,
  attributes: PropertyAttributes,
) {
  if let Some(object) = heap.object_mut(object) {
    object
      .properties
      .insert(key, Property::Data { value, attributes });
  }
}

fn alloc_string(heap: &mut Heap, text: &str) -> Slot {
  let units: Vec<u16> = text.encode_utf16().collect();
  heap.alloc(HeapValue::String(units.into()))
}

pub(super) fn alloc_function(
  heap: &mut Heap,
  name: Slot,
  behavior: Behavior,
) -> Slot {
  let proto = heap.realm.function_prototype;
  let function = heap.alloc_object(Some(proto), ObjectKind::Function(behavior));
  define_data(heap, function, PropertyKey::named("name"), name, READ_ONLY);
  function
}

fn alloc_builtin(heap: &mut Heap, name: &str, builtin: Builtin) -> Slot {
  let name = alloc_string(heap, name);
  alloc_function(heap, name, Behavior::Builtin(builtin))
}

pub(super) fn link_constructor(
  heap: &mut Heap,
  constructor: Slot,
  prototype: Slot,
) {
  define_data(
    heap,
    constructor,
    PropertyKey::named("prototype"),
    prototype,
    FROZEN,
  );
  define_data(
    heap,
    prototype,
    PropertyKey::named("constructor"),
    constructor,
    PropertyAttributes::HIDDEN,
  );
}

fn install_global(heap: &mut Heap, name: &str, value: Slot) {
  let global = heap.realm.global;
  define_data(
    heap,
    global,
    PropertyKey::named(name),
    value,
    PropertyAttributes::HIDDEN,
  );
}

pub(super) fn install_realm(heap: &mut Heap) {
  let object_prototype = heap.alloc_object(None, ObjectKind::Ordinary);
  heap.realm.object_prototype = object_prototype;
  heap.realm.function_prototype =
    heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
  heap.realm.array_prototype =
    heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
  heap.realm.array_buffer_prototype =
    heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
  heap.realm.typed_array_prototype =
    heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
  heap.realm.data_view_prototype =
    heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);

  let global = heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
  heap.realm.global = global;
  install_global(heap, "globalThis", global);
  let nan = heap.alloc(HeapValue::Number(f64::NAN));
  let infinity = heap.alloc(HeapValue::Number(f64::INFINITY));
  define_data(heap, global, PropertyKey::named("NaN"), nan, FROZEN);
  define_data(heap, global, PropertyKey::named("Infinity"), infinity, FROZEN);

  let object = alloc_builtin(heap, "Object", Builtin::ObjectConstructor);
  link_constructor(heap, object, object_prototype);
  install_global(heap, "Object", object);
  let has_own = alloc_builtin(heap, "hasOwnProperty", Builtin::HasOwnProperty);
  define_data(
    heap,
    object_prototype,
    PropertyKey::named("hasOwnProperty"),
    has_own,
    PropertyAttributes::HIDDEN,
  );

  for class in ErrorClass::ALL {
    let parent = match class {
      ErrorClass::Error => object_prototype,
      _ => heap.realm.error_prototypes[ErrorClass::Error.index()],
    };
    let prototype = heap.alloc_object(Some(parent), ObjectKind::Ordinary);
    heap.realm.error_prototypes[class.index()] = prototype;
    let name = alloc_string(heap, class.name());
    let message = alloc_string(heap, "");
    let hidden = PropertyAttributes::HIDDEN;
    define_data(heap, prototype, PropertyKey::named("name"), name, hidden);
    define_data(heap, prototype, PropertyKey::named("message"), message, hidden);
    let constructor =
      alloc_builtin(heap, class.name(), Builtin::ErrorConstructor(class));
    link_constructor(heap, constructor, prototype);
    install_global(heap, class.name(), constructor);
  }

  let promise_prototype =
    heap.alloc_object(Some(object_prototype), ObjectKind::Ordinary);
  heap.realm.promise_prototype = promise_prototype;
  let then = alloc_builtin(heap, "then", Builtin::PromiseThen);
  define_data(
    heap,
    promise_prototype,
    PropertyKey::named("then"),
    then,
    PropertyAttributes::HIDDEN,
  );
  let promise = alloc_builtin(heap, "Promise", Builtin::PromiseConstructor);
  link_constructor(heap, promise, promise_prototype);
  install_global(heap, "Promise", promise);
}

impl LocalEngine {
  pub(super) fn call_builtin(
    &self,
    builtin: Builtin,
    this: RawValue,
    args: &[RawValue],
    new_target: Option<RawValue>,
  ) -> EngineResult<RawValue> {
    let arg = |index: usize| {
      args.get(index).copied().unwrap_or_else(|| self.undefined())
    };
    match builtin {
      Builtin::ObjectConstructor => match self.type_of(arg(0)) {
        ValueKind::Undefined | ValueKind::Null => self.create_object(),
        _ => self.coerce_to_object(arg(0)),
      },
      Builtin::HasOwnProperty => {
        let key = self.to_property_key(arg(0))?;
        Ok(self.boolean(self.has_own(this, &key)))
      }
      Builtin::ErrorConstructor(class) => {
        let message = match self.type_of(arg(0)) {
          ValueKind::Undefined => String::new(),
          _ => String::from_utf16_lossy(&self.to_string_units(arg(0))?),
        };
        Ok(to_raw(self.make_error(class, &message)))
      }
      Builtin::PromiseConstructor => {
        if new_target.is_none() {
          return Err(self.throw_error(
            ErrorClass::TypeError,
            "Promise constructor cannot be invoked without 'new'",
          ));
        }
        let executor = arg(0);
        if self.type_of(executor) != ValueKind::Function {
          return Err(self.throw_error(
            ErrorClass::TypeError,
            "Promise resolver is not a function",
          ));
        }
        let promise = self.new_promise();
        let (resolve, reject) = self.resolving_functions(promise);
        if self
          .call(executor, self.undefined(), &[resolve, reject])
          .is_err()
        {
          let reason = self.take_exception().unwrap_or_else(|| self.undefined());
          self.call(reject, self.undefined(), &[reason])?;
        }
        Ok(to_raw(promise))
      }
      Builtin::PromiseThen => {
        let is_promise = matches!(
          self.heap().object(to_slot(this)).map(|o| &o.kind),
          Some(ObjectKind::Promise(_))
        );
        if !is_promise {
          return Err(self.throw_error(
            ErrorClass::TypeError,
            "Promise.prototype.then called on incompatible receiver",
          ));
        }
        let callable = |value: RawValue| {
          (self.type_of(value) == ValueKind::Function).then(|| to_slot(value))
        };
        let derived = self.new_promise();
        self.perform_then(
          to_slot(this),
          Reaction {
            on_fulfilled: callable(arg(0)),
            on_rejected: callable(arg(1)),
            derived: Some(derived),
          },
        );
        Ok(to_raw(derived))
      }
      Builtin::Resolving {
        promise,
        reject,
        settled,
      } => {
        if !settled.replace(true) {
          let value = to_slot(arg(0));
          if reject {
            self.settle(promise, value, true);
          } else {
            self.resolve_promise(promise, value);
          }
        }
        Ok(self.undefined())
      }
      Builtin::Job(job) => {
        self.run_job(job);
        Ok(self.undefined())
      }
    }
  }

  pub(super) fn new_promise(&self) -> Slot {
    let mut heap = self.heap_mut();
    let proto = heap.realm.promise_prototype;
    heap.alloc_object(
      Some(proto),
      ObjectKind::Promise(PromiseState::Pending(Vec::new())),
    )
  }

  pub(super) fn resolving_functions(
    &self,
    promise: Slot,
  ) -> (RawValue, RawValue) {
    let settled = Rc::new(Cell::new(false));
    let resolve = self.new_function(
      "",
      Behavior::Builtin(Builtin::Resolving {
        promise,
        reject: false,
        settled: settled.clone(),
      }),
    );
    let reject = self.new_function(
      "",
      Behavior::Builtin(Builtin::Resolving {
        promise,
        reject: true,
        settled,
      }),
    );
    (resolve, reject)
  }

  fn settle(&self, promise: Slot, value: Slot, rejected: bool) {
    let reactions = {
      let mut heap = self.heap_mut();
      let Some(object) = heap.object_mut(promise) else {
        return;
      };
      let ObjectKind::Promise(state) = &mut object.kind else {
        return;
      };
      let PromiseState::Pending(reactions) = state else {
        return;
      };
      let reactions = std::mem::take(reactions);
      *state = if rejected {
        PromiseState::Rejected(value)
      } else {
        PromiseState::Fulfilled(value)
      };
      reactions
    };
    for reaction in reactions {
      self.enqueue_job(Job {
        handler: if rejected {
          reaction.on_rejected
        } else {
          reaction.on_fulfilled
        },
        argument: value,
        derived: reaction.derived,
        rejected,
      });
    }
  }

  fn resolve_promise(&self, promise: Slot, value: Slot) {
    if promise == value {
      let error = self
        .make_error(ErrorClass::TypeError, "Chaining cycle detected for promise");
      self.settle(promise, error, true);
      return;
    }
    let adopts = matches!(
      self.heap().object(value).map(|o| &o.kind),
      Some(ObjectKind::Promise(_))
    );
    if adopts {
      self.perform_then(
        value,
        Reaction {
          on_fulfilled: None,
          on_rejected: None,
          derived: Some(promise),
        },
      );
    } else {
      self.settle(promise, value, false);
    }
  }

  fn perform_then(&self, promise: Slot, reaction: Reaction) {
    let job = {
      let mut heap = self.heap_mut();
      let Some(ObjectKind::Promise(state)) =
        heap.object_mut(promise).map(|o| &mut o.kind)
      else {
        return;
      };
      match state {
        PromiseState::Pending(reactions) => {
          reactions.push(reaction);
          None
        }
        PromiseState::Fulfilled(value) => Some(Job {
          handler: reaction.on_fulfilled,
          argument: *value,
          derived: reaction.derived,
          rejected: false,
        }),
        PromiseState::Rejected(value) => Some(Job {
          handler: reaction.on_rejected,
          argument: *value,
          derived: reaction.derived,
          rejected: true,
        }),
      }
    };
    if let Some(job) = job {
      self.enqueue_job(job);
    }
  }

  fn enqueue_job(&self, job: Job) {
    let hook = self.continuation.borrow().clone();
    match hook {
      Some(hook) => {
        let task = {
          let mut heap = self.heap_mut();
          let proto = heap.realm.function_prototype;
          heap.alloc_object(
            Some(proto),
            ObjectKind::Function(Behavior::Builtin(Builtin::Job(job))),
          )
        };
        hook(to_raw(task));
      }
      None => self.heap_mut().jobs.push_back(job),
    }
  }

  pub(super) fn run_job(&self, job: Job) {
    let argument = to_raw(job.argument);
    let outcome = match job.handler {
      Some(handler) => {
        match self.call(to_raw(handler), self.undefined(), &[argument]) {
          Ok(value) => Ok(value),
          Err(_) => {
            Err(self.take_exception().unwrap_or_else(|| self.undefined()))
          }
        }
      }
      None if job.rejected => Err(argument),
      None => Ok(argument),
    };
    let Some(derived) = job.derived else {
      if outcome.is_err() {
        log::debug!("promise job failed without a derived promise");
      }
      return;
    };
    match outcome {
      Ok(value) => self.resolve_promise(derived, to_slot(value)),
      Err(reason) => self.settle(derived, to_slot(reason), true),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::super::PromiseStatus;
  use super::*;

  #[test]
  fn resolving_twice_keeps_the_first_outcome() {
    let engine = LocalEngine::new();
    let capability = engine.create_promise().unwrap();
    let one = engine.create_number(1.0).unwrap();
    let two = engine.create_number(2.0).unwrap();
    let undefined = engine.undefined();
    engine.call(capability.resolve, undefined, &[one]).unwrap();
    engine.call(capability.reject, undefined, &[two]).unwrap();
    assert_eq!(
      engine.promise_state(capability.promise),
      Some(PromiseStatus::Fulfilled(one))
    );
  }

  #[test]
  fn then_reactions_run_as_jobs() {
    let engine = LocalEngine::new();
    let capability = engine.create_promise().unwrap();
    let then = engine
      .get(capability.promise, &PropertyKey::named("then"))
      .unwrap();
    let derived = engine.call(then, capability.promise, &[]).unwrap();
    let value = engine.create_number(42.0).unwrap();
    engine
      .call(capability.resolve, engine.undefined(), &[value])
      .unwrap();
    assert_eq!(engine.promise_state(derived), Some(PromiseStatus::Pending));
    assert_eq!(engine.run_microtasks(), 1);
    assert_eq!(
      engine.promise_state(derived),
      Some(PromiseStatus::Fulfilled(value))
    );
  }

  #[test]
  fn builtin_globals_exist() {
    let engine = LocalEngine::new();
    for name in ["Object", "Error", "TypeError", "RangeError", "Promise"] {
      let key = PropertyKey::named(name);
      assert!(engine.has(engine.global(), &key).unwrap(), "{name}");
    }
  }
}

// Copyright 2018-2026 the Deno authors. MIT license.

use std::cell::Cell;
use std::os::raw::c_void;
use std::rc::Rc;

use crate::Env;
use crate::Error;
use crate::engine::Engine;
use crate::engine::PrivateSlot;
use crate::napi_finalize;
use crate::napi_ref;
use crate::value::RawValue;
use crate::value::handle_to_id;
use crate::value::id_to_handle;

/// A counted reference. The value is protected from collection exactly
/// while the count is above zero. While weak, the referent is watched by a
/// finalizer so a reused engine slot is never handed back.
#[derive(Debug)]
pub struct Reference {
  value: RawValue,
  count: u32,
  collected: Rc<Cell<bool>>,
  tracked: bool,
}

impl Reference {
  pub fn new(engine: &dyn Engine, value: RawValue, initial: u32) -> Self {
    let collected = Rc::new(Cell::new(false));
    let flag = collected.clone();
    let tracked = engine.type_of(value).is_object()
      && engine
        .add_finalizer(value, Box::new(move || flag.set(true)))
        .is_ok();
    let mut reference = Self {
      value,
      count: initial,
      collected,
      tracked,
    };
    if initial > 0 {
      engine.protect(value);
    } else {
      reference.weaken();
    }
    reference
  }

  pub fn count(&self) -> u32 {
    self.count
  }

  pub fn is_collected(&self) -> bool {
    self.collected.get()
  }

  /// Primitives carry no finalizer and are lost once the count hits zero.
  fn weaken(&mut self) {
    if !self.tracked {
      self.collected.set(true);
    }
  }

  pub fn increment(&mut self, engine: &dyn Engine) -> u32 {
    if self.count == 0 && !self.is_collected() {
      engine.protect(self.value);
    }
    self.count += 1;
    self.count
  }

  pub fn decrement(&mut self, engine: &dyn Engine) -> Result<u32, Error> {
    if self.count == 0 {
      return Err(Error::GenericFailure);
    }
    self.count -= 1;
    if self.count == 0 && !self.is_collected() {
      engine.unprotect(self.value);
      self.weaken();
    }
    Ok(self.count)
  }

  /// The referenced value, or `None` while weak or once collected.
  pub fn value(&self) -> Option<RawValue> {
    (self.count > 0 && !self.is_collected()).then_some(self.value)
  }

  pub fn release(self, engine: &dyn Engine) {
    if self.count > 0 && !self.is_collected() {
      engine.unprotect(self.value);
    }
  }
}

impl Env {
  pub(crate) fn create_reference(
    &mut self,
    value: RawValue,
    initial: u32,
  ) -> napi_ref {
    let reference = Reference::new(self.engine(), value, initial);
    let id = self.next_id();
    self.references.insert(id, reference);
    id_to_handle(id)
  }

  pub(crate) fn reference(
    &self,
    handle: napi_ref,
  ) -> Result<&Reference, Error> {
    handle_to_id(handle)
      .and_then(|id| self.references.get(&id))
      .ok_or(Error::InvalidArg)
  }

  pub(crate) fn delete_reference(
    &mut self,
    handle: napi_ref,
  ) -> Result<(), Error> {
    let reference = handle_to_id(handle)
      .and_then(|id| self.references.remove(&id))
      .ok_or(Error::InvalidArg)?;
    reference.release(self.engine());
    Ok(())
  }

  pub(crate) fn ref_reference(
    &mut self,
    handle: napi_ref,
  ) -> Result<u32, Error> {
    let id = handle_to_id(handle).ok_or(Error::InvalidArg)?;
    let reference = self.references.get_mut(&id).ok_or(Error::InvalidArg)?;
    Ok(reference.increment(&**self.engine))
  }

  pub(crate) fn unref_reference(
    &mut self,
    handle: napi_ref,
  ) -> Result<u32, Error> {
    let id = handle_to_id(handle).ok_or(Error::InvalidArg)?;
    let reference = self.references.get_mut(&id).ok_or(Error::InvalidArg)?;
    reference.decrement(&**self.engine)
  }
}

/// Native data attached to an object with `napi_wrap`.
pub(crate) struct WrapRecord {
  pub data: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
  armed: Cell<bool>,
}

/// Runs `finalize_cb` once when `object` is collected.
pub(crate) fn attach_finalizer(
  env: &Env,
  object: RawValue,
  data: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
) -> Result<(), Error> {
  let Some(finalize_cb) = finalize_cb else {
    return Ok(());
  };
  let env_ptr = env as *const Env as *mut Env;
  env.engine().add_finalizer(
    object,
    Box::new(move || {
      // SAFETY: finalizers run before the environment is freed.
      unsafe { finalize_cb(env_ptr, data, finalize_hint) };
    }),
  )?;
  Ok(())
}

pub(crate) fn wrap(
  env: &Env,
  object: RawValue,
  data: *mut c_void,
  finalize_cb: napi_finalize,
  finalize_hint: *mut c_void,
) -> Result<(), Error> {
  let engine = env.engine();
  if !engine.type_of(object).is_object() {
    return Err(Error::ObjectExpected);
  }
  if !engine.get_private(object, PrivateSlot::Wrap)?.is_null() {
    return Err(Error::InvalidArg);
  }
  let record = Rc::new(WrapRecord {
    data,
    finalize_cb,
    finalize_hint,
    armed: Cell::new(true),
  });
  engine.set_private(
    object,
    PrivateSlot::Wrap,
    Rc::as_ptr(&record) as *mut c_void,
  )?;
  let env_ptr = env as *const Env as *mut Env;
  engine.add_finalizer(
    object,
    Box::new(move || {
      if !record.armed.get() {
        return;
      }
      if let Some(finalize_cb) = record.finalize_cb {
        // SAFETY: finalizers run before the environment is freed.
        unsafe { finalize_cb(env_ptr, record.data, record.finalize_hint) };
      }
    }),
  )?;
  Ok(())
}

fn wrap_record(
  env: &Env,
  object: RawValue,
) -> Result<*const WrapRecord, Error> {
  let engine = env.engine();
  if !engine.type_of(object).is_object() {
    return Err(Error::ObjectExpected);
  }
  let record = engine.get_private(object, PrivateSlot::Wrap)?;
  if record.is_null() {
    return Err(Error::InvalidArg);
  }
  Ok(record as *const WrapRecord)
}

pub(crate) fn unwrap(
  env: &Env,
  object: RawValue,
) -> Result<*mut c_void, Error> {
  let record = wrap_record(env, object)?;
  // SAFETY: the finalizer closure keeps the record alive with the object.
  Ok(unsafe { (*record).data })
}

/// Detaches the native data. Its finalizer will not run.
pub(crate) fn remove_wrap(
  env: &Env,
  object: RawValue,
) -> Result<*mut c_void, Error> {
  let record = wrap_record(env, object)?;
  // SAFETY: as in `unwrap`.
  let data = unsafe {
    (*record).armed.set(false);
    (*record).data
  };
  env
    .engine()
    .set_private(object, PrivateSlot::Wrap, std::ptr::null_mut())?;
  Ok(data)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::engine::local::LocalEngine;

  #[test]
  fn protection_follows_the_count() {
    let engine = LocalEngine::new();
    let object = engine.create_object().unwrap();

    let mut reference = Reference::new(&engine, object, 0);
    assert_eq!(reference.value(), None);
    assert_eq!(engine.stats().protects, 0);

    assert_eq!(reference.increment(&engine), 1);
    assert_eq!(reference.increment(&engine), 2);
    assert_eq!(engine.stats().protects, 1);
    assert_eq!(reference.value(), Some(object));

    assert_eq!(reference.decrement(&engine), Ok(1));
    assert_eq!(reference.decrement(&engine), Ok(0));
    assert_eq!(engine.stats().unprotects, 1);
    assert_eq!(reference.decrement(&engine), Err(Error::GenericFailure));

    reference.release(&engine);
    assert_eq!(engine.stats().unprotects, 1);
  }

  #[test]
  fn collected_referent_is_not_revived() {
    let engine = LocalEngine::new();
    let object = engine.create_object().unwrap();
    let mut reference = Reference::new(&engine, object, 0);
    engine.collect_garbage();
    assert!(reference.is_collected());
    for _ in 0..8 {
      engine.create_object().unwrap();
    }

    assert_eq!(reference.increment(&engine), 1);
    assert_eq!(reference.value(), None);
    assert_eq!(engine.stats().protects, 0);
    assert_eq!(reference.decrement(&engine), Ok(0));
    assert_eq!(engine.stats().unprotects, 0);
  }

  #[test]
  fn weak_primitives_are_dropped() {
    let engine = LocalEngine::new();
    let number = engine.create_number(1.5).unwrap();
    let mut reference = Reference::new(&engine, number, 1);
    assert_eq!(reference.value(), Some(number));
    assert_eq!(reference.decrement(&engine), Ok(0));
    assert!(reference.is_collected());
    assert_eq!(reference.increment(&engine), 1);
    assert_eq!(reference.value(), None);
    assert_eq!(engine.stats().protects, 1);
  }

  #[test]
  fn strong_reference_survives_collection() {
    let engine = LocalEngine::new();
    let object = engine.create_object().unwrap();
    let reference = Reference::new(&engine, object, 1);
    engine.collect_garbage();
    assert_eq!(engine.type_of(object), crate::engine::ValueKind::Object);
    reference.release(&engine);
    assert_eq!(engine.stats().unprotects, 1);
  }
}

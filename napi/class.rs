// Copyright 2018-2026 the Deno authors. MIT license.

//! Class synthesis.
//!
//! A class definition produces one [`ClassRecord`] owned by the
//! environment. The engine sees four fixed entry points (construct, method,
//! getter, setter) and the function data slot tells each call which record
//! and which entry it belongs to.

use std::collections::HashMap;
use std::os::raw::c_void;

use crate::Env;
use crate::Error;
use crate::engine::ClassTemplate;
use crate::engine::Engine;
use crate::engine::Invocation;
use crate::engine::NativeFunction;
use crate::engine::PrivateSlot;
use crate::engine::PropertyAttributes;
use crate::engine::PropertyDefinition;
use crate::engine::PropertyValue;
use crate::engine::ValueKind;
use crate::function::Callback;
use crate::function::invoke_callback;
use crate::function::throw_diagnostic;
use crate::napi_property_descriptor;
use crate::napi_static;
use crate::util;
use crate::value::RawValue;

/// How a property was named by its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PropertyName {
  Text(String),
  Symbol(RawValue),
}

impl std::fmt::Display for PropertyName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PropertyName::Text(name) => f.write_str(name),
      PropertyName::Symbol(_) => f.write_str("[symbol]"),
    }
  }
}

/// Resolves the key of a descriptor: `utf8name` wins over `name`.
///
/// # Safety
///
/// `utf8name` is null or NUL-terminated.
pub(crate) unsafe fn descriptor_key(
  engine: &dyn Engine,
  descriptor: &napi_property_descriptor,
) -> Result<(RawValue, PropertyName), Error> {
  if !descriptor.utf8name.is_null() {
    let name = unsafe {
      util::read_name(descriptor.utf8name, crate::NAPI_AUTO_LENGTH)?
    };
    let units: Vec<u16> = name.encode_utf16().collect();
    let key = engine.create_string(&units)?;
    return Ok((key, PropertyName::Text(name)));
  }
  let key = RawValue::from_napi(descriptor.name).ok_or(Error::NameExpected)?;
  match engine.type_of(key) {
    ValueKind::String => {
      let name = String::from_utf16_lossy(&engine.string_value(key)?);
      Ok((key, PropertyName::Text(name)))
    }
    ValueKind::Symbol => Ok((key, PropertyName::Symbol(key))),
    _ => Err(Error::NameExpected),
  }
}

struct MethodEntry {
  cb: Callback,
  data: *mut c_void,
}

struct AccessorEntry {
  getter: Option<Callback>,
  setter: Option<Callback>,
  data: *mut c_void,
}

enum BindingKind {
  Construct,
  Method(usize),
  Getter(PropertyName),
  Setter(PropertyName),
}

/// The data slot of one synthesized function.
struct Binding {
  env: *mut Env,
  class: *const ClassRecord,
  is_static: bool,
  kind: BindingKind,
}

/// Everything registered for one class.
pub(crate) struct ClassRecord {
  env: *mut Env,
  name: String,
  constructor: Option<Callback>,
  data: *mut c_void,
  methods: Vec<MethodEntry>,
  accessors: HashMap<(bool, PropertyName), AccessorEntry>,
  bindings: Vec<Box<Binding>>,
}

impl ClassRecord {
  fn env(&self) -> &Env {
    // SAFETY: records are owned by the environment they point to.
    unsafe { &*self.env }
  }

  /// Whether `this` was constructed from this class.
  fn owns(&self, this: RawValue) -> bool {
    let engine = self.env().engine();
    if !engine.type_of(this).is_object() {
      return false;
    }
    matches!(
      engine.get_private(this, PrivateSlot::Class),
      Ok(tag) if tag as *const ClassRecord == self as *const ClassRecord
    )
  }
}

unsafe fn construct_instance(
  data: *mut c_void,
  invocation: &Invocation,
) -> Option<RawValue> {
  // SAFETY: the constructor's data slot holds its binding.
  let binding = unsafe { &*(data as *const Binding) };
  let Some(record) = (unsafe { binding.class.as_ref() }) else {
    // SAFETY: bindings are owned by the environment they point to.
    throw_diagnostic(unsafe { &*binding.env }, "constructor not found");
    return None;
  };
  let env = record.env();
  let Some(new_target) = invocation.new_target else {
    throw_diagnostic(
      env,
      &format!("class constructor {} must be called with new", record.name),
    );
    return None;
  };
  let Some(constructor) = record.constructor else {
    throw_diagnostic(env, "constructor callback is null");
    return None;
  };
  if let Err(err) = env.engine().set_private(
    invocation.this,
    PrivateSlot::Class,
    record as *const ClassRecord as *mut c_void,
  ) {
    throw_diagnostic(
      env,
      &format!("unable to construct {}: {err}", record.name),
    );
    return None;
  }
  // The callback populates `this` in place. Its return value is ignored.
  unsafe {
    invoke_callback(
      record.env,
      constructor,
      record.data,
      invocation.this,
      invocation.args,
      Some(new_target),
    );
  }
  None
}

/// Resolves the binding behind `data` and checks the receiver.
unsafe fn bound<'a>(
  data: *mut c_void,
  invocation: &Invocation,
) -> Option<(&'a ClassRecord, &'a Binding)> {
  // SAFETY: bindings are boxed inside the record that owns them.
  let binding = unsafe { &*(data as *const Binding) };
  let record = unsafe { &*binding.class };
  if !binding.is_static && !record.owns(invocation.this) {
    throw_diagnostic(record.env(), "function table not found");
    return None;
  }
  Some((record, binding))
}

unsafe fn call_method(
  data: *mut c_void,
  invocation: &Invocation,
) -> Option<RawValue> {
  let (record, binding) = unsafe { bound(data, invocation)? };
  let BindingKind::Method(index) = binding.kind else {
    return None;
  };
  let method = &record.methods[index];
  unsafe {
    invoke_callback(
      record.env,
      method.cb,
      method.data,
      invocation.this,
      invocation.args,
      None,
    )
  }
}

unsafe fn get_property(
  data: *mut c_void,
  invocation: &Invocation,
) -> Option<RawValue> {
  let (record, binding) = unsafe { bound(data, invocation)? };
  let BindingKind::Getter(name) = &binding.kind else {
    return None;
  };
  let Some(entry) = record.accessors.get(&(binding.is_static, name.clone()))
  else {
    throw_diagnostic(record.env(), "property not found in function table");
    return None;
  };
  let Some(getter) = entry.getter else {
    throw_diagnostic(
      record.env(),
      &format!("no getter registered for property '{name}'"),
    );
    return None;
  };
  unsafe {
    invoke_callback(
      record.env,
      getter,
      entry.data,
      invocation.this,
      &[],
      None,
    )
  }
}

unsafe fn set_property(
  data: *mut c_void,
  invocation: &Invocation,
) -> Option<RawValue> {
  let (record, binding) = unsafe { bound(data, invocation)? };
  let BindingKind::Setter(name) = &binding.kind else {
    return None;
  };
  let Some(entry) = record.accessors.get(&(binding.is_static, name.clone()))
  else {
    throw_diagnostic(record.env(), "property not found in function table");
    return None;
  };
  let Some(setter) = entry.setter else {
    throw_diagnostic(
      record.env(),
      &format!("no setter registered for property '{name}'"),
    );
    return None;
  };
  let value = invocation
    .args
    .first()
    .copied()
    .unwrap_or_else(|| record.env().engine().undefined());
  unsafe {
    invoke_callback(
      record.env,
      setter,
      entry.data,
      invocation.this,
      &[value],
      None,
    );
  }
  None
}

impl ClassRecord {
  fn bind(&mut self, is_static: bool, kind: BindingKind) -> *mut c_void {
    let binding = Box::new(Binding {
      env: self.env,
      class: &*self as *const ClassRecord,
      is_static,
      kind,
    });
    let data = &*binding as *const Binding as *mut c_void;
    self.bindings.push(binding);
    data
  }
}

/// Synthesizes a class from `descriptors` and returns its constructor.
///
/// # Safety
///
/// Descriptor names are null or NUL-terminated.
pub(crate) unsafe fn define_class(
  env: &mut Env,
  name: String,
  constructor: Option<Callback>,
  data: *mut c_void,
  descriptors: &[napi_property_descriptor],
) -> Result<RawValue, Error> {
  let method_count = descriptors
    .iter()
    .filter(|descriptor| descriptor.method.is_some())
    .count();
  if let Some(max) = env.config().max_class_methods {
    if method_count > max {
      log::warn!(
        "rejecting class {name}: {method_count} methods exceed the limit of {max}"
      );
      return Err(Error::InvalidArg);
    }
  }

  let mut record = Box::new(ClassRecord {
    env: env as *mut Env,
    name,
    constructor,
    data,
    methods: Vec::with_capacity(method_count),
    accessors: HashMap::new(),
    bindings: Vec::new(),
  });
  let result = unsafe { populate(env, &mut record, descriptors) };
  if result.is_ok() {
    log::debug!(
      "defined class {} ({} methods, {} accessors)",
      record.name,
      record.methods.len(),
      record.accessors.len()
    );
  }
  // Engine functions may already point into the record, so it stays
  // registered even when the definition failed halfway.
  env.classes.push(record);
  result
}

unsafe fn populate(
  env: &Env,
  record: &mut ClassRecord,
  descriptors: &[napi_property_descriptor],
) -> Result<RawValue, Error> {
  let engine = env.engine();
  let data = record.bind(true, BindingKind::Construct);
  let constructor = engine.create_class(&ClassTemplate {
    name: record.name.clone(),
    constructor: NativeFunction {
      entry: construct_instance,
      data,
    },
  })?;
  let prototype_key: Vec<u16> = "prototype".encode_utf16().collect();
  let prototype =
    engine.get_property(constructor, engine.create_string(&prototype_key)?)?;

  for descriptor in descriptors {
    let (key, name) = unsafe { descriptor_key(engine, descriptor)? };
    let is_static = descriptor.attributes & napi_static != 0;
    let target = if is_static { constructor } else { prototype };
    let attributes = PropertyAttributes::from_napi(descriptor.attributes);

    let value = if let Some(cb) = descriptor.method {
      let index = record.methods.len();
      record.methods.push(MethodEntry {
        cb,
        data: descriptor.data,
      });
      let data = record.bind(is_static, BindingKind::Method(index));
      let function = engine.create_function(
        &name.to_string(),
        NativeFunction {
          entry: call_method,
          data,
        },
      )?;
      PropertyValue::Data(function)
    } else if descriptor.getter.is_some() || descriptor.setter.is_some() {
      record.accessors.insert(
        (is_static, name.clone()),
        AccessorEntry {
          getter: descriptor.getter,
          setter: descriptor.setter,
          data: descriptor.data,
        },
      );
      let getter = record.bind(is_static, BindingKind::Getter(name.clone()));
      let setter = record.bind(is_static, BindingKind::Setter(name));
      PropertyValue::Accessor {
        getter: Some(NativeFunction {
          entry: get_property,
          data: getter,
        }),
        setter: Some(NativeFunction {
          entry: set_property,
          data: setter,
        }),
      }
    } else {
      let value =
        RawValue::from_napi(descriptor.value).ok_or(Error::InvalidArg)?;
      PropertyValue::Data(value)
    };

    engine.define_property(
      target,
      &PropertyDefinition {
        key,
        value,
        attributes,
      },
    )?;
  }

  if env.config().install_class_globals {
    let name: Vec<u16> = record.name.encode_utf16().collect();
    engine.set_property(
      engine.global(),
      engine.create_string(&name)?,
      constructor,
    )?;
  }
  Ok(constructor)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::EnvOptions;
  use crate::engine::local::LocalEngine;

  fn descriptor(name: &'static std::ffi::CStr) -> napi_property_descriptor {
    napi_property_descriptor {
      utf8name: name.as_ptr(),
      name: std::ptr::null_mut(),
      method: None,
      getter: None,
      setter: None,
      value: std::ptr::null_mut(),
      attributes: crate::napi_default,
      data: std::ptr::null_mut(),
    }
  }

  unsafe extern "C" fn noop(
    _env: *mut Env,
    _info: crate::napi_callback_info,
  ) -> crate::napi_value {
    std::ptr::null_mut()
  }

  #[test]
  fn method_ceiling_is_checked_first() {
    let mut env = Env::new(
      Box::new(LocalEngine::new()),
      EnvOptions::new().max_class_methods(1),
    )
    .unwrap();
    let mut first = descriptor(c"first");
    first.method = Some(noop);
    let mut second = descriptor(c"second");
    second.method = Some(noop);

    let rejected = unsafe {
      define_class(
        &mut env,
        "TooBig".into(),
        Some(noop),
        std::ptr::null_mut(),
        &[first, second],
      )
    };
    assert_eq!(rejected, Err(Error::InvalidArg));
    assert!(env.classes.is_empty());

    let accepted = unsafe {
      define_class(
        &mut env,
        "Small".into(),
        Some(noop),
        std::ptr::null_mut(),
        &[first],
      )
    };
    assert!(accepted.is_ok());
    assert_eq!(env.classes.len(), 1);
  }

  #[test]
  fn construct_without_record_throws() {
    let mut env = Env::new(Box::new(LocalEngine::new()), EnvOptions::new())
      .unwrap();
    let binding = Binding {
      env: &mut *env as *mut Env,
      class: std::ptr::null(),
      is_static: true,
      kind: BindingKind::Construct,
    };
    let engine = env.engine();
    let this = engine.create_object().unwrap();
    let invocation = Invocation {
      callee: this,
      this,
      args: &[],
      new_target: Some(this),
    };
    let data = &binding as *const Binding as *mut c_void;
    assert_eq!(unsafe { construct_instance(data, &invocation) }, None);

    let error = engine.take_exception().unwrap();
    let message: Vec<u16> = "message".encode_utf16().collect();
    let key = engine.create_string(&message).unwrap();
    let message = engine.get_property(error, key).unwrap();
    assert_eq!(
      String::from_utf16(&engine.string_value(message).unwrap()).unwrap(),
      "constructor not found"
    );
  }

  #[test]
  fn missing_key_is_name_expected() {
    let engine = LocalEngine::new();
    let mut nameless = descriptor(c"unused");
    nameless.utf8name = std::ptr::null();
    let number = engine.create_number(1.0).unwrap();
    assert_eq!(
      unsafe { descriptor_key(&engine, &nameless) },
      Err(Error::NameExpected)
    );
    nameless.name = number.into_napi();
    assert_eq!(
      unsafe { descriptor_key(&engine, &nameless) },
      Err(Error::NameExpected)
    );
  }
}

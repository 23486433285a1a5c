// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::HashMap;
use std::ffi::CStr;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::os::raw::c_void;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::StreamExt;
use futures::channel::mpsc;
use serde::Deserialize;

use crate::Error;
use crate::class::ClassRecord;
use crate::engine::Engine;
use crate::engine::EngineError;
use crate::function::FunctionRecord;
use crate::napi_extended_error_info;
use crate::napi_finalize;
use crate::napi_ok;
use crate::napi_status;
use crate::reference::Reference;
use crate::value::RawValue;

/// Forwards a promise continuation to the thread that owns the
/// environment. The receiver must eventually call
/// [`PendingContinuation::run`] on that thread.
pub type ScriptThreadDispatcher =
  Arc<dyn Fn(PendingContinuation) + Send + Sync>;

/// Tunables of an environment, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EnvConfig {
  /// Largest number of methods a single `napi_define_class` call may
  /// declare. Unlimited when unset.
  pub max_class_methods: Option<usize>,
  /// Whether defined classes are also installed on the global object.
  pub install_class_globals: bool,
  /// Reported by `node_api_get_module_file_name`.
  pub module_filename: Option<String>,
}

impl Default for EnvConfig {
  fn default() -> Self {
    Self {
      max_class_methods: None,
      install_class_globals: true,
      module_filename: None,
    }
  }
}

impl EnvConfig {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

#[derive(Clone, Default)]
pub struct EnvOptions {
  config: EnvConfig,
  dispatcher: Option<ScriptThreadDispatcher>,
}

impl std::fmt::Debug for EnvOptions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EnvOptions")
      .field("config", &self.config)
      .field("dispatcher", &self.dispatcher.is_some())
      .finish()
  }
}

impl EnvOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn config(mut self, config: EnvConfig) -> Self {
    self.config = config;
    self
  }

  pub fn max_class_methods(mut self, max: usize) -> Self {
    self.config.max_class_methods = Some(max);
    self
  }

  pub fn install_class_globals(mut self, install: bool) -> Self {
    self.config.install_class_globals = install;
    self
  }

  pub fn module_filename(mut self, filename: impl Into<String>) -> Self {
    self.config.module_filename = Some(filename.into());
    self
  }

  pub fn script_thread_dispatcher(
    mut self,
    dispatcher: ScriptThreadDispatcher,
  ) -> Self {
    self.dispatcher = Some(dispatcher);
    self
  }
}

/// A promise job captured on whatever thread the engine scheduled it from.
/// The task is protected until it has run.
pub struct PendingContinuation {
  env: *mut Env,
  task: RawValue,
}

// SAFETY: the task is only touched again by `run`, which must happen on the
// script thread.
unsafe impl Send for PendingContinuation {}

impl std::fmt::Debug for PendingContinuation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PendingContinuation")
      .field("task", &self.task)
      .finish()
  }
}

impl PendingContinuation {
  /// Runs the job and releases it.
  ///
  /// # Safety
  ///
  /// Must be called on the script thread while the environment that
  /// produced this continuation is alive.
  pub unsafe fn run(self) -> Result<(), Error> {
    // SAFETY: upheld by the caller.
    let env = unsafe { &mut *self.env };
    self.run_on(env)
  }

  fn run_on(self, env: &mut Env) -> Result<(), Error> {
    let engine = env.engine();
    let result = engine.call_function(self.task, engine.undefined(), &[]);
    engine.unprotect(self.task);
    result.map(|_| ()).map_err(Error::from)
  }
}

pub(crate) struct CleanupHook {
  pub hook: unsafe extern "C" fn(arg: *mut c_void),
  pub arg: *mut c_void,
}

impl CleanupHook {
  pub fn matches(
    &self,
    hook: unsafe extern "C" fn(arg: *mut c_void),
    arg: *mut c_void,
  ) -> bool {
    std::ptr::fn_addr_eq(self.hook, hook) && self.arg == arg
  }
}

pub(crate) struct InstanceData {
  pub data: *mut c_void,
  pub finalize_cb: napi_finalize,
  pub finalize_hint: *mut c_void,
}

struct HandleScope {
  id: usize,
  escapable: bool,
  escaped: bool,
}

/// One N-API environment: the engine context plus everything the shim
/// tracks on its behalf.
pub struct Env {
  pub(crate) engine: ManuallyDrop<Box<dyn Engine>>,
  config: EnvConfig,
  pub last_error: napi_extended_error_info,
  pub(crate) has_own_property: RawValue,
  pub(crate) references: HashMap<usize, Reference>,
  pub(crate) deferreds: HashMap<usize, usize>,
  next_id: usize,
  pub(crate) functions: Vec<Box<FunctionRecord>>,
  pub(crate) classes: Vec<Box<ClassRecord>>,
  pub(crate) instance_data: Option<InstanceData>,
  pub(crate) cleanup_hooks: Vec<CleanupHook>,
  scopes: Vec<HandleScope>,
  module_filename: Option<CString>,
  dispatcher: Option<ScriptThreadDispatcher>,
  continuation_sender: mpsc::UnboundedSender<PendingContinuation>,
  continuation_receiver: mpsc::UnboundedReceiver<PendingContinuation>,
}

impl Env {
  /// Bootstraps an environment over `engine`. Either every bootstrap step
  /// succeeds or no environment is produced.
  pub fn new(
    engine: Box<dyn Engine>,
    options: EnvOptions,
  ) -> Result<Box<Env>, EngineError> {
    let EnvOptions { config, dispatcher } = options;
    let module_filename = config
      .module_filename
      .as_deref()
      .map(CString::new)
      .transpose()
      .map_err(|_| EngineError::new(Error::InvalidArg))?;
    let has_own_property = lookup_has_own_property(&*engine)?;
    engine.protect(has_own_property);

    let (continuation_sender, continuation_receiver) =
      mpsc::unbounded::<PendingContinuation>();
    let mut env = Box::new(Env {
      engine: ManuallyDrop::new(engine),
      config,
      last_error: napi_extended_error_info::default(),
      has_own_property,
      references: HashMap::new(),
      deferreds: HashMap::new(),
      next_id: 0,
      functions: Vec::new(),
      classes: Vec::new(),
      instance_data: None,
      cleanup_hooks: Vec::new(),
      scopes: Vec::new(),
      module_filename,
      dispatcher,
      continuation_sender,
      continuation_receiver,
    });

    let env_ptr: *mut Env = &mut *env;
    let handed_off = env.engine.set_promise_continuation(Box::new(
      move |task| {
        // SAFETY: the hook is owned by the engine, which the environment
        // drops before it is freed.
        unsafe { schedule_continuation(env_ptr, task) }
      },
    ));
    log::debug!(
      "created napi environment on the {} engine (continuations {})",
      env.engine.name(),
      if handed_off { "handed off" } else { "engine managed" }
    );
    Ok(env)
  }

  pub fn engine(&self) -> &dyn Engine {
    &**self.engine
  }

  pub fn config(&self) -> &EnvConfig {
    &self.config
  }

  /// The handle native code receives.
  pub fn as_napi(&mut self) -> *mut Env {
    self
  }

  pub fn module_filename(&self) -> Option<&CStr> {
    self.module_filename.as_deref()
  }

  pub(crate) fn next_id(&mut self) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  pub(crate) fn check_no_pending_exception(&self) -> Result<(), Error> {
    if self.engine.has_exception() {
      return Err(Error::PendingException);
    }
    Ok(())
  }

  /// Runs continuations queued by the engine, in the order they were
  /// scheduled, until none are left.
  pub fn run_pending_continuations(&mut self) -> usize {
    let waker = futures::task::noop_waker_ref();
    let mut cx = Context::from_waker(waker);
    let mut ran = 0;
    while let Poll::Ready(Some(pending)) =
      self.continuation_receiver.poll_next_unpin(&mut cx)
    {
      if let Err(err) = pending.run_on(self) {
        log::warn!("promise continuation failed: {err}");
      }
      ran += 1;
    }
    ran
  }

  pub(crate) fn open_scope(&mut self, escapable: bool) -> usize {
    let id = self.next_id();
    self.scopes.push(HandleScope {
      id,
      escapable,
      escaped: false,
    });
    id
  }

  pub(crate) fn close_scope(
    &mut self,
    id: usize,
    escapable: bool,
  ) -> Result<(), Error> {
    match self.scopes.last() {
      Some(scope) if scope.id == id && scope.escapable == escapable => {
        self.scopes.pop();
        Ok(())
      }
      _ => Err(Error::HandleScopeMismatch),
    }
  }

  pub(crate) fn escape(&mut self, id: usize) -> Result<(), Error> {
    let scope = self
      .scopes
      .iter_mut()
      .find(|scope| scope.id == id && scope.escapable)
      .ok_or(Error::InvalidArg)?;
    if scope.escaped {
      return Err(Error::EscapeCalledTwice);
    }
    scope.escaped = true;
    Ok(())
  }
}

fn lookup_has_own_property(
  engine: &dyn Engine,
) -> Result<RawValue, EngineError> {
  let name = |text: &str| {
    let units: Vec<u16> = text.encode_utf16().collect();
    engine.create_string(&units)
  };
  let object = engine.get_property(engine.global(), name("Object")?)?;
  let prototype = engine.get_property(object, name("prototype")?)?;
  engine.get_property(prototype, name("hasOwnProperty")?)
}

unsafe fn schedule_continuation(env_ptr: *mut Env, task: RawValue) {
  // SAFETY: see the hook installed in `Env::new`.
  let env = unsafe { &*env_ptr };
  env.engine.protect(task);
  let pending = PendingContinuation { env: env_ptr, task };
  log::debug!(
    "handing off promise continuation ({})",
    if env.dispatcher.is_some() { "dispatcher" } else { "queued" }
  );
  match &env.dispatcher {
    Some(dispatcher) => dispatcher(pending),
    None => {
      if let Err(err) = env.continuation_sender.unbounded_send(pending) {
        log::warn!("dropping promise continuation: {err}");
        env.engine.unprotect(task);
      }
    }
  }
}

impl Drop for Env {
  fn drop(&mut self) {
    log::debug!(
      "tearing down napi environment on the {} engine",
      self.engine.name()
    );

    // Hooks run in LIFO order. A hook may remove hooks registered before it.
    while let Some(hook) = self.cleanup_hooks.pop() {
      // SAFETY: registered through napi_add_env_cleanup_hook.
      unsafe { (hook.hook)(hook.arg) };
    }

    self.engine.finalize_all();

    if let Some(instance) = self.instance_data.take() {
      if let Some(finalize_cb) = instance.finalize_cb {
        // SAFETY: registered through napi_set_instance_data.
        unsafe {
          finalize_cb(self, instance.data, instance.finalize_hint);
        }
      }
    }

    for (_, reference) in self.references.drain() {
      reference.release(&**self.engine);
    }
    self.deferreds.clear();
    self.engine.unprotect(self.has_own_property);
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    while let Poll::Ready(Some(pending)) =
      self.continuation_receiver.poll_next_unpin(&mut cx)
    {
      self.engine.unprotect(pending.task);
    }

    // SAFETY: dropped exactly once, before the registrations its functions
    // point into.
    unsafe { ManuallyDrop::drop(&mut self.engine) };
  }
}

/// Resets the last-error record at the start of an entry point.
///
/// # Safety
///
/// `env` is null or points to a live environment.
pub(crate) unsafe fn clear_last_error(env: *mut Env) {
  // SAFETY: upheld by the caller.
  if let Some(env) = unsafe { env.as_mut() } {
    env.last_error = napi_extended_error_info::default();
    env.engine.take_error_code();
  }
}

/// Records the status an entry point is about to return.
///
/// # Safety
///
/// `env` is null or points to a live environment.
pub(crate) unsafe fn set_last_status(
  env: *mut Env,
  status: napi_status,
) -> napi_status {
  // SAFETY: upheld by the caller.
  if let Some(env) = unsafe { env.as_mut() } {
    env.last_error.error_code = status;
    env.last_error.engine_error_code = if status == napi_ok {
      0
    } else {
      env.engine.take_error_code() as u32
    };
  }
  status
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::engine::local::LocalEngine;

  fn local_env(options: EnvOptions) -> Box<Env> {
    Env::new(Box::new(LocalEngine::new()), options).unwrap()
  }

  #[test]
  fn config_from_json() {
    let config = EnvConfig::from_json(
      r#"{ "maxClassMethods": 70, "moduleFilename": "file:///addon.node" }"#,
    )
    .unwrap();
    assert_eq!(
      config,
      EnvConfig {
        max_class_methods: Some(70),
        install_class_globals: true,
        module_filename: Some("file:///addon.node".into()),
      }
    );
    assert_eq!(EnvConfig::from_json("{}").unwrap(), EnvConfig::default());
    assert!(EnvConfig::from_json(r#"{ "maxMethods": 1 }"#).is_err());
  }

  #[test]
  fn bootstrap_protects_has_own_property() {
    let env = local_env(EnvOptions::new());
    let engine = env.engine();
    let local = engine.as_any().downcast_ref::<LocalEngine>().unwrap();
    assert_eq!(local.stats().protects, 1);
    assert_eq!(
      engine.type_of(env.has_own_property),
      crate::engine::ValueKind::Function
    );
  }

  #[test]
  fn scopes_close_in_order() {
    let mut env = local_env(EnvOptions::new());
    let outer = env.open_scope(false);
    let inner = env.open_scope(true);
    assert_eq!(env.close_scope(outer, false), Err(Error::HandleScopeMismatch));
    assert_eq!(env.escape(inner), Ok(()));
    assert_eq!(env.escape(inner), Err(Error::EscapeCalledTwice));
    assert_eq!(env.close_scope(inner, false), Err(Error::HandleScopeMismatch));
    assert_eq!(env.close_scope(inner, true), Ok(()));
    assert_eq!(env.close_scope(outer, false), Ok(()));
  }

  #[test]
  fn last_status_is_recorded() {
    let mut env = local_env(EnvOptions::new());
    let raw = env.as_napi();
    unsafe {
      set_last_status(raw, crate::napi_string_expected);
      assert_eq!((*raw).last_error.error_code, crate::napi_string_expected);
      clear_last_error(raw);
      assert_eq!((*raw).last_error, napi_extended_error_info::default());
    }
  }
}

use crate::error::EmbedError;
use crate::handle::Template;
use crate::handle::Value;
use crate::isolate::IsolateState;
use crate::scope::Scope;
use crate::template::TemplateData;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::Context;
use boa_engine::JsResult;
use boa_engine::JsString;
use boa_engine::JsValue;
use boa_engine::NativeFunction;
use std::any::Any;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

/// A host function callable from script.
///
/// Receives the call's scope, the [`CallbackInfo`] describing the call, the argument count and the
/// closure data registered with the function.
///
/// # Scoping
///
/// Every invocation runs in a fresh handle scope opened by the bridge; values created by the
/// callback are released when it returns, except the one passed to
/// [`CallbackInfo::set_return_value`].
pub type NativeFn = for<'s> fn(
  &mut Scope<'s>,
  info: &CallbackInfo,
  argc: usize,
  data: &dyn Any,
) -> Result<(), EmbedError>;

type ClosureFn = dyn for<'s> Fn(&mut Scope<'s>, &CallbackInfo) -> Result<(), EmbedError>;

pub(crate) enum Callback {
  Native { func: NativeFn, data: Box<dyn Any> },
  Closure(Box<ClosureFn>),
}

/// A registered host function together with its closure data.
///
/// Owned by the engine function objects (and function templates) that wrap it. The callback and
/// its data are dropped when the last owner goes away or when the isolate is disposed, whichever
/// comes first; the engine may keep the emptied bundle until it collects the function object.
pub(crate) struct Bundle {
  pub(crate) name: String,
  callback: RefCell<Option<Callback>>,
}

impl Bundle {
  fn new(name: &str, callback: Callback) -> Rc<Self> {
    Rc::new(Self {
      name: name.to_string(),
      callback: RefCell::new(Some(callback)),
    })
  }

  fn native(name: &str, func: NativeFn, data: Box<dyn Any>) -> Rc<Self> {
    Self::new(name, Callback::Native { func, data })
  }

  fn closure(name: &str, closure: Box<ClosureFn>) -> Rc<Self> {
    Self::new(name, Callback::Closure(closure))
  }

  fn invoke(&self, scope: &mut Scope<'_>, info: &CallbackInfo) -> Result<(), EmbedError> {
    // Shared borrow: re-entrant calls of the same function are fine.
    let callback = self.callback.borrow();
    match callback.as_ref() {
      Some(Callback::Native { func, data }) => func(scope, info, info.len(), data.as_ref()),
      Some(Callback::Closure(closure)) => closure(scope, info),
      None => Err(EmbedError::IsolateDisposed),
    }
  }

  fn revoke(&self) {
    // Revocation only happens at disposal, when no callback is running.
    if let Ok(mut callback) = self.callback.try_borrow_mut() {
      callback.take();
    }
  }
}

/// Weak index of every bundle created in an isolate.
#[derive(Default)]
pub(crate) struct FunctionRegistry {
  bundles: Vec<Weak<Bundle>>,
}

impl FunctionRegistry {
  fn register(&mut self, bundle: &Rc<Bundle>) {
    self.bundles.retain(|weak| weak.strong_count() > 0);
    self.bundles.push(Rc::downgrade(bundle));
  }

  /// Number of bundles still owned by a function object or template.
  pub(crate) fn live(&self) -> usize {
    self
      .bundles
      .iter()
      .filter(|weak| weak.strong_count() > 0)
      .count()
  }

  /// Drops the callback and closure data of every bundle, including those the engine still holds.
  pub(crate) fn revoke_all(&mut self) {
    for bundle in self.bundles.drain(..).filter_map(|weak| weak.upgrade()) {
      bundle.revoke();
    }
  }
}

/// A view of one script-to-host call.
///
/// `this` and the arguments are valid for the duration of the callback.
#[derive(Debug)]
pub struct CallbackInfo {
  this: Value,
  args: Vec<Value>,
  return_value: Cell<Option<Value>>,
}

impl CallbackInfo {
  /// Number of arguments the script passed.
  pub fn len(&self) -> usize {
    self.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.args.is_empty()
  }

  pub fn this(&self) -> Value {
    self.this
  }

  /// The argument at `index`, if the script passed one.
  pub fn arg(&self, index: usize) -> Option<Value> {
    self.args.get(index).copied()
  }

  pub fn args(&self) -> &[Value] {
    &self.args
  }

  /// The first `count` arguments. Asking for more than were passed is an error.
  pub fn get_args(&self, count: usize) -> Result<&[Value], EmbedError> {
    self
      .args
      .get(..count)
      .ok_or(EmbedError::ArgumentOutOfRange {
        requested: count,
        available: self.args.len(),
      })
  }

  /// Sets the value the script sees as the call's result. Without this, the call yields
  /// `undefined`.
  pub fn set_return_value(&self, value: Value) {
    self.return_value.set(Some(value));
  }
}

fn dispatch(
  state: &Weak<RefCell<IsolateState>>,
  bundle: &Bundle,
  this: &JsValue,
  args: &[JsValue],
  engine: &mut Context,
) -> Result<JsValue, EmbedError> {
  let state = state.upgrade().ok_or(EmbedError::IsolateDisposed)?;
  tracing::trace!(function = %bundle.name, argc = args.len(), "dispatching host function");
  let mut scope = Scope::enter(engine, state);
  let info = CallbackInfo {
    this: scope.push(this.clone())?,
    args: args
      .iter()
      .map(|arg| scope.push(arg.clone()))
      .collect::<Result<_, _>>()?,
    return_value: Cell::new(None),
  };
  bundle.invoke(&mut scope, &info)?;
  match info.return_value.get() {
    Some(value) => scope.resolve(value),
    None => Ok(JsValue::undefined()),
  }
}

/// Wraps `bundle` in a script-callable function object of the current realm.
pub(crate) fn build_function(
  engine: &mut Context,
  state: Weak<RefCell<IsolateState>>,
  bundle: Rc<Bundle>,
) -> JsValue {
  let name = JsString::from(bundle.name.as_str());
  // SAFETY: the closure captures no garbage-collected values. It holds a weak pointer to the host
  // state and the bundle, whose callback data is host-owned and unreachable from script.
  let native = unsafe {
    NativeFunction::from_closure(move |this, args, engine| -> JsResult<JsValue> {
      dispatch(&state, &bundle, this, args, engine).map_err(EmbedError::into_js_error)
    })
  };
  FunctionObjectBuilder::new(engine.realm(), native)
    .name(name)
    .length(0)
    .constructor(false)
    .build()
    .into()
}

/// Callback bridge.
impl<'i> Scope<'i> {
  pub(crate) fn require_context(&self) -> Result<(), EmbedError> {
    match self.state().entered {
      Some(_) => Ok(()),
      None => Err(EmbedError::NoContext),
    }
  }

  fn wrap_bundle(&mut self, bundle: Rc<Bundle>) -> Result<Value, EmbedError> {
    self.require_context()?;
    self.state_mut().functions.register(&bundle);
    let function = build_function(self.engine, Rc::downgrade(&self.state), bundle);
    self.push(function)
  }

  fn template_bundle(&mut self, bundle: Rc<Bundle>) -> Result<Template, EmbedError> {
    let mut state = self.state_mut();
    state.functions.register(&bundle);
    let id = state.templates.insert(TemplateData::Function { bundle })?;
    Ok(Template(id))
  }

  /// Creates a script function that dispatches to `func` with `data` as its closure data.
  ///
  /// Requires an entered context; use [`Scope::create_function_template`] before one exists.
  pub fn create_function(
    &mut self,
    name: &str,
    func: NativeFn,
    data: Box<dyn Any>,
  ) -> Result<Value, EmbedError> {
    self.wrap_bundle(Bundle::native(name, func, data))
  }

  /// Like [`Scope::create_function`], with a Rust closure carrying its own state.
  pub fn create_closure<F>(&mut self, name: &str, closure: F) -> Result<Value, EmbedError>
  where
    F: for<'s> Fn(&mut Scope<'s>, &CallbackInfo) -> Result<(), EmbedError> + 'static,
  {
    self.wrap_bundle(Bundle::closure(name, Box::new(closure)))
  }

  /// Creates a function template: a blueprint for a host function that can be bound on an
  /// object template before any context exists.
  pub fn create_function_template(
    &mut self,
    name: &str,
    func: NativeFn,
    data: Box<dyn Any>,
  ) -> Result<Template, EmbedError> {
    self.template_bundle(Bundle::native(name, func, data))
  }

  pub fn create_closure_template<F>(&mut self, name: &str, closure: F) -> Result<Template, EmbedError>
  where
    F: for<'s> Fn(&mut Scope<'s>, &CallbackInfo) -> Result<(), EmbedError> + 'static,
  {
    self.template_bundle(Bundle::closure(name, Box::new(closure)))
  }

  /// Instantiates a function template in the entered context.
  pub fn get_function(&mut self, template: Template) -> Result<Value, EmbedError> {
    self.require_context()?;
    let bundle = self.function_bundle(template)?;
    let function = build_function(self.engine, Rc::downgrade(&self.state), bundle);
    self.push(function)
  }

  pub(crate) fn function_bundle(&self, template: Template) -> Result<Rc<Bundle>, EmbedError> {
    match self.state().templates.get(template.0) {
      Some(TemplateData::Function { bundle }) => Ok(bundle.clone()),
      _ => Err(EmbedError::InvalidTemplate),
    }
  }

  /// Number of host functions whose bundle is still alive.
  pub fn live_functions(&self) -> usize {
    self.state().functions.live()
  }

  /// Calls `func` with an `undefined` receiver in the entered context.
  ///
  /// The call runs in a nested handle scope; only the result is added to this scope, so repeated
  /// calls grow it by one value each. An exception escaping the call is handled according to the
  /// isolate's [`ExceptionPolicy`](crate::ExceptionPolicy).
  pub fn call_function(&mut self, func: Value, args: &[Value]) -> Result<Value, EmbedError> {
    self.call_with(func, JsValue::undefined(), args)
  }

  /// Calls `func` with `this` as its receiver. See [`Scope::call_function`].
  pub fn call_method(
    &mut self,
    func: Value,
    this: Value,
    args: &[Value],
  ) -> Result<Value, EmbedError> {
    let this = self.resolve(this)?;
    self.call_with(func, this, args)
  }

  fn call_with(&mut self, func: Value, this: JsValue, args: &[Value]) -> Result<Value, EmbedError> {
    self.require_context()?;
    let callee = match self.resolve(func)? {
      JsValue::Object(object) if object.is_callable() => object,
      _ => return Err(EmbedError::NotCallable),
    };
    let args = self.resolve_all(args)?;
    tracing::trace!(argc = args.len(), depth = self.depth(), "calling into script");
    let result = {
      let mut inner = self.reborrow();
      callee.call(&this, &args, inner.engine)
    };
    let value = match result {
      Ok(value) => value,
      Err(err) => self.script_exception("<call>", err)?,
    };
    self.push(value)
  }

  /// Calls the value `object[key]` as a method of `object`.
  pub fn invoke(&mut self, object: Value, key: &str, args: &[Value]) -> Result<Value, EmbedError> {
    let method = self.get_property(object, key)?;
    self.call_method(method, object, args)
  }
}

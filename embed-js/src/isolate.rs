use crate::arena::HandleStack;
use crate::arena::SlotTable;
use crate::context::ContextRecord;
use crate::error::EmbedError;
use crate::function::FunctionRegistry;
use crate::handle::ContextId;
use crate::handle::Template;
use crate::scope::Scope;
use crate::template::TemplateData;
use boa_engine::Context;
use boa_engine::JsValue;
use serde::Deserialize;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// What happens when an exception escapes a script run or a host-initiated call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionPolicy {
  /// Surface the exception as [`EmbedError::Script`].
  #[default]
  Report,
  /// Swallow the exception and produce `undefined` in place of the result.
  Substitute,
}

/// Construction-time isolate parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolateParams {
  pub exception_policy: ExceptionPolicy,
  /// Retain the most recent uncaught exception for [`Scope::take_last_exception`].
  pub capture_uncaught_exceptions: bool,
  pub loop_iteration_limit: Option<u64>,
  pub recursion_limit: Option<usize>,
  pub stack_size_limit: Option<usize>,
}

impl Default for IsolateParams {
  fn default() -> Self {
    Self {
      exception_policy: ExceptionPolicy::Report,
      capture_uncaught_exceptions: true,
      loop_iteration_limit: None,
      recursion_limit: None,
      stack_size_limit: None,
    }
  }
}

impl IsolateParams {
  pub fn with_exception_policy(mut self, policy: ExceptionPolicy) -> Self {
    self.exception_policy = policy;
    self
  }

  pub fn with_capture_uncaught_exceptions(mut self, capture: bool) -> Self {
    self.capture_uncaught_exceptions = capture;
    self
  }

  pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
    self.loop_iteration_limit = Some(limit);
    self
  }

  pub fn with_recursion_limit(mut self, limit: usize) -> Self {
    self.recursion_limit = Some(limit);
    self
  }

  pub fn with_stack_size_limit(mut self, limit: usize) -> Self {
    self.stack_size_limit = Some(limit);
    self
  }
}

/// Host-side bookkeeping for one isolate.
///
/// This is shared (weakly) with every host function created in the isolate so the trampoline can
/// reach the handle tables while the engine is mid-call. Borrows of the cell are always released
/// before control passes back into the engine.
pub(crate) struct IsolateState {
  pub(crate) params: IsolateParams,
  pub(crate) handles: HandleStack,
  pub(crate) references: SlotTable<JsValue>,
  pub(crate) templates: SlotTable<TemplateData>,
  pub(crate) contexts: SlotTable<ContextRecord>,
  pub(crate) entered: Option<ContextId>,
  pub(crate) functions: FunctionRegistry,
  /// Blueprint filled by [`Scope::set_global`] while no context is entered.
  pub(crate) default_global: Option<Template>,
  pub(crate) last_exception: Option<JsValue>,
}

impl IsolateState {
  fn new(params: IsolateParams) -> Self {
    Self {
      params,
      handles: HandleStack::default(),
      references: SlotTable::default(),
      templates: SlotTable::default(),
      contexts: SlotTable::default(),
      entered: None,
      functions: FunctionRegistry::default(),
      default_global: None,
      last_exception: None,
    }
  }

  fn dispose(&mut self) {
    self.handles.clear();
    self.references.clear();
    self.templates.clear();
    self.contexts.clear();
    self.entered = None;
    self.default_global = None;
    self.last_exception = None;
  }
}

pub(crate) type SharedState = Rc<RefCell<IsolateState>>;

/// An isolated engine heap plus the handle tables that expose it to the host.
///
/// Isolates are created by [`Instance::start_isolate`](crate::Instance::start_isolate) and are
/// bound to the thread that created them.
pub(crate) struct Isolate {
  state: SharedState,
  engine: Context,
}

impl Isolate {
  pub(crate) fn new(params: IsolateParams) -> Result<Self, EmbedError> {
    let mut engine = Context::default();
    let limits = engine.runtime_limits_mut();
    if let Some(limit) = params.loop_iteration_limit {
      limits.set_loop_iteration_limit(limit);
    }
    if let Some(limit) = params.recursion_limit {
      limits.set_recursion_limit(limit);
    }
    if let Some(limit) = params.stack_size_limit {
      limits.set_stack_size_limit(limit);
    }
    tracing::debug!(?params, "creating isolate");
    Ok(Self {
      state: Rc::new(RefCell::new(IsolateState::new(params))),
      engine,
    })
  }

  /// Opens the outermost handle scope of this isolate.
  pub(crate) fn handle_scope(&mut self) -> Scope<'_> {
    Scope::enter(&mut self.engine, self.state.clone())
  }
}

impl Drop for Isolate {
  fn drop(&mut self) {
    let mut functions = {
      let mut state = self.state.borrow_mut();
      tracing::debug!(
        references = state.references.len(),
        functions = state.functions.live(),
        contexts = state.contexts.len(),
        "disposing isolate"
      );
      let functions = std::mem::take(&mut state.functions);
      state.dispose();
      functions
    };
    // Function objects may outlive the isolate in the engine heap; their closure data must not.
    functions.revoke_all();
  }
}

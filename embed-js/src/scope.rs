use crate::arena::ScopeMark;
use crate::error::EmbedError;
use crate::handle::Value;
use crate::isolate::IsolateState;
use crate::isolate::SharedState;
use boa_engine::Context;
use boa_engine::JsValue;
use std::cell::Ref;
use std::cell::RefMut;

/// A handle scope: the region in which [`Value`] handles stay valid.
///
/// Every operation of the embedding layer goes through a `Scope`, which carries the isolate
/// explicitly instead of relying on a "current isolate". Scopes nest strictly: a child created by
/// [`Scope::reborrow`] mutably borrows its parent, so the parent cannot be used (or dropped) until
/// the child is gone. Dropping a scope releases every value created in it.
pub struct Scope<'i> {
  pub(crate) engine: &'i mut Context,
  pub(crate) state: SharedState,
  mark: ScopeMark,
}

impl<'i> Scope<'i> {
  pub(crate) fn enter(engine: &'i mut Context, state: SharedState) -> Self {
    let mark = state.borrow_mut().handles.open_scope();
    Self {
      engine,
      state,
      mark,
    }
  }

  /// Opens a nested scope.
  ///
  /// Values created through the returned scope are released when it is dropped; values of this
  /// scope remain usable from the child.
  pub fn reborrow(&mut self) -> Scope<'_> {
    Scope::enter(&mut *self.engine, self.state.clone())
  }

  /// Nesting depth of this scope, starting at `0` for the isolate's outermost scope.
  pub fn depth(&self) -> usize {
    self.mark.depth()
  }

  /// Number of live value handles across this scope and all enclosing scopes.
  pub fn live_handles(&self) -> usize {
    self.state().handles.len()
  }

  pub(crate) fn state(&self) -> Ref<'_, IsolateState> {
    self.state.borrow()
  }

  pub(crate) fn state_mut(&self) -> RefMut<'_, IsolateState> {
    self.state.borrow_mut()
  }

  /// Records `value` in the innermost open scope.
  pub(crate) fn push(&mut self, value: JsValue) -> Result<Value, EmbedError> {
    let id = self.state_mut().handles.push(value)?;
    Ok(Value(id))
  }

  /// Looks up the engine value behind `value`.
  pub(crate) fn resolve(&self, value: Value) -> Result<JsValue, EmbedError> {
    self.state().handles.get(value.0).cloned()
  }

  pub(crate) fn resolve_all(&self, values: &[Value]) -> Result<Vec<JsValue>, EmbedError> {
    let state = self.state();
    values
      .iter()
      .map(|value| state.handles.get(value.0).cloned())
      .collect()
  }
}

impl Drop for Scope<'_> {
  fn drop(&mut self) {
    self.state.borrow_mut().handles.close_scope(self.mark);
  }
}

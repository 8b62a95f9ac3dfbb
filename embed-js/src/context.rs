use crate::error::engine_error;
use crate::error::EmbedError;
use crate::handle::ContextId;
use crate::handle::Template;
use crate::handle::Value;
use crate::scope::Scope;
use boa_engine::realm::Realm;
use std::ops::Deref;
use std::ops::DerefMut;

pub(crate) struct ContextRecord {
  pub(crate) realm: Realm,
}

/// Context lifecycle.
impl<'i> Scope<'i> {
  /// Creates a context whose global object is pre-populated from `template`, or from the
  /// isolate's default global template when `None`.
  pub fn create_context(&mut self, template: Option<Template>) -> Result<ContextId, EmbedError> {
    let seed = template.or(self.state().default_global);
    let realm = self.engine.create_realm().map_err(engine_error)?;
    if let Some(seed) = seed {
      let previous = self.engine.enter_realm(realm.clone());
      let global = self.engine.global_object();
      let populated = self.populate(&global, seed);
      self.engine.enter_realm(previous);
      populated?;
    }
    let id = self
      .state_mut()
      .contexts
      .insert(ContextRecord { realm })?;
    tracing::debug!(context = ?id, seeded = seed.is_some(), "created context");
    Ok(ContextId(id))
  }

  /// Enters `context`. Scripts run and functions are created in it until the returned guard is
  /// dropped.
  pub fn enter_context(&mut self, context: ContextId) -> Result<ContextScope<'_, 'i>, EmbedError> {
    let realm = {
      let state = self.state();
      if state.entered.is_some() {
        return Err(EmbedError::ContextAlreadyEntered);
      }
      state
        .contexts
        .get(context.0)
        .map(|record| record.realm.clone())
        .ok_or(EmbedError::InvalidContext)?
    };
    let previous = self.engine.enter_realm(realm);
    self.state_mut().entered = Some(context);
    tracing::debug!(?context, "entered context");
    Ok(ContextScope {
      scope: self,
      previous: Some(previous),
    })
  }

  /// The context currently entered, if any.
  pub fn entered_context(&self) -> Option<ContextId> {
    self.state().entered
  }

  /// The global object of the entered context.
  pub fn global(&mut self) -> Result<Value, EmbedError> {
    self.require_context()?;
    let global = self.engine.global_object();
    self.push(global.into())
  }

  pub(crate) fn discard_context(&mut self, context: ContextId) {
    self.state_mut().contexts.remove(context.0);
  }
}

/// An entered context. Dereferences to the enclosing [`Scope`]; dropping it exits the context.
pub struct ContextScope<'s, 'i> {
  scope: &'s mut Scope<'i>,
  previous: Option<Realm>,
}

impl<'i> Deref for ContextScope<'_, 'i> {
  type Target = Scope<'i>;

  fn deref(&self) -> &Self::Target {
    self.scope
  }
}

impl<'i> DerefMut for ContextScope<'_, 'i> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.scope
  }
}

impl Drop for ContextScope<'_, '_> {
  fn drop(&mut self) {
    if let Some(previous) = self.previous.take() {
      self.scope.engine.enter_realm(previous);
    }
    let exited = self.scope.state_mut().entered.take();
    tracing::debug!(context = ?exited, "exited context");
  }
}

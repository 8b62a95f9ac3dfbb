use crate::error::EmbedError;
use crate::error::ScriptError;
use crate::error::ScriptErrorKind;
use crate::handle::Template;
use crate::handle::Value;
use crate::isolate::ExceptionPolicy;
use crate::scope::Scope;
use boa_engine::error::JsNativeErrorKind;
use boa_engine::JsError;
use boa_engine::JsValue;
use boa_engine::Script;
use boa_engine::Source;

const DEFAULT_SOURCE_NAME: &str = "<script>";

fn is_catchable(err: &JsError) -> bool {
  !matches!(
    err.as_native(),
    Some(native) if matches!(native.kind, JsNativeErrorKind::RuntimeLimit)
  )
}

/// Script execution.
impl<'i> Scope<'i> {
  /// Compiles and runs `source`.
  ///
  /// With a `seed` template, a fresh context is created from it and entered for the duration of
  /// the run; no other context may be entered at that point. Without one, the script runs in the
  /// entered context.
  pub fn run_script(&mut self, seed: Option<Template>, source: &str) -> Result<Value, EmbedError> {
    self.run_script_named(DEFAULT_SOURCE_NAME, seed, source)
  }

  /// Like [`Scope::run_script`], reporting errors against `source_name`.
  pub fn run_script_named(
    &mut self,
    source_name: &str,
    seed: Option<Template>,
    source: &str,
  ) -> Result<Value, EmbedError> {
    let _span = tracing::debug_span!("run_script", source_name, bytes = source.len()).entered();
    let Some(seed) = seed else {
      self.require_context()?;
      return self.evaluate(source_name, source);
    };
    if self.state().entered.is_some() {
      return Err(EmbedError::ContextAlreadyEntered);
    }
    let context = self.create_context(Some(seed))?;
    let result = match self.enter_context(context) {
      Ok(mut entered) => entered.evaluate(source_name, source),
      Err(err) => Err(err),
    };
    self.discard_context(context);
    result
  }

  /// Runs `source` with the substitution semantics of the classic embedding API: `None` when the
  /// source does not compile, `undefined` when it throws.
  pub fn run_script_compat(
    &mut self,
    seed: Option<Template>,
    source: &str,
  ) -> Result<Option<Value>, EmbedError> {
    let previous = std::mem::replace(
      &mut self.state_mut().params.exception_policy,
      ExceptionPolicy::Substitute,
    );
    let result = self.run_script(seed, source);
    self.state_mut().params.exception_policy = previous;
    match result {
      Ok(value) => Ok(Some(value)),
      Err(EmbedError::Script(ScriptError {
        kind: ScriptErrorKind::Compile,
        ..
      })) => Ok(None),
      Err(err) => Err(err),
    }
  }

  fn evaluate(&mut self, source_name: &str, source: &str) -> Result<Value, EmbedError> {
    let script = Script::parse(Source::from_bytes(source), None, self.engine)
      .map_err(|err| ScriptError::compile(source_name, err.to_string()))?;
    let value = match script.evaluate(self.engine) {
      Ok(value) => value,
      Err(err) => self.script_exception(source_name, err)?,
    };
    self.push(value)
  }

  /// Applies the isolate's exception policy to an exception that escaped into the host.
  pub(crate) fn script_exception(
    &mut self,
    source_name: &str,
    err: JsError,
  ) -> Result<JsValue, EmbedError> {
    let message = match err.try_native(self.engine) {
      Ok(native) => native.to_string(),
      Err(_) => err.to_string(),
    };
    let (policy, capture) = {
      let state = self.state();
      (
        state.params.exception_policy,
        state.params.capture_uncaught_exceptions,
      )
    };
    if capture && is_catchable(&err) {
      let thrown = err.to_opaque(self.engine);
      self.state_mut().last_exception = Some(thrown);
    }
    tracing::debug!(source_name, %message, ?policy, "uncaught exception");
    match policy {
      ExceptionPolicy::Report => Err(ScriptError::runtime(source_name, message).into()),
      ExceptionPolicy::Substitute => Ok(JsValue::undefined()),
    }
  }

  /// Takes the value thrown by the most recent uncaught exception.
  ///
  /// Only recorded when [`IsolateParams::capture_uncaught_exceptions`](crate::IsolateParams) is
  /// set.
  pub fn take_last_exception(&mut self) -> Result<Option<Value>, EmbedError> {
    let thrown = self.state_mut().last_exception.take();
    thrown.map(|value| self.push(value)).transpose()
  }
}

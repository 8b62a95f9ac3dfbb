use crate::value::ValueKind;
use boa_engine::JsError;
use boa_engine::JsNativeError;
use std::fmt;
use std::fmt::Display;

/// Errors produced at the embedding boundary.
///
/// Misuse that the underlying engine would treat as undefined behaviour (stale handles, calling
/// non-functions, reading missing arguments, ...) is reported through a dedicated variant instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbedError {
  /// Another [`Instance`](crate::Instance) is still alive in this process.
  #[error("the engine runtime is already initialized")]
  AlreadyInitialized,

  /// An isolate is already running on this instance; isolates do not nest.
  #[error("an isolate is already active")]
  IsolateAlreadyActive,

  /// A value was created while no handle scope was open.
  #[error("no handle scope is open")]
  NoHandleScope,

  /// A value handle was used after the scope that created it was closed, or the handle word was
  /// never issued by this isolate.
  #[error("value handle used outside the scope that created it")]
  StaleHandle,

  #[error("invalid or disposed template handle")]
  InvalidTemplate,

  #[error("invalid or released reference")]
  InvalidReference,

  #[error("invalid context handle")]
  InvalidContext,

  /// The operation needs an entered context.
  #[error("no context is entered")]
  NoContext,

  /// Only one context may be entered per isolate at a time.
  #[error("a context is already entered on this isolate")]
  ContextAlreadyEntered,

  #[error("value is not callable")]
  NotCallable,

  #[error("value is not a string")]
  NotAString,

  #[error("value is not a number")]
  NotANumber,

  #[error("value is not an object")]
  NotAnObject,

  /// A callback asked for more arguments than the script passed.
  #[error("requested {requested} arguments but the call received {available}")]
  ArgumentOutOfRange { requested: usize, available: usize },

  /// Templates outlive scopes, so they can only hold primitives and other templates.
  #[error("a {0} value cannot be bound on a template")]
  NotTemplateCompatible(ValueKind),

  /// An object template is reachable from its own bindings.
  #[error("object template contains itself")]
  TemplateCycle,

  #[error("typed buffer of {byte_length} bytes is not a multiple of the {element_size}-byte element size")]
  InvalidBufferLength {
    byte_length: usize,
    element_size: usize,
  },

  /// A host function was invoked after its isolate was disposed.
  #[error("isolate has been disposed")]
  IsolateDisposed,

  /// The 32-bit slot index space of a handle table is exhausted.
  #[error("handle table exhausted")]
  OutOfHandles,

  #[error(transparent)]
  Script(#[from] ScriptError),

  /// A failure reported by host code.
  #[error("{0}")]
  Host(String),
}

impl EmbedError {
  /// Convenience constructor for host callback failures.
  pub fn host(message: impl Into<String>) -> Self {
    EmbedError::Host(message.into())
  }

  /// Converts the error into an exception that can be thrown back into script.
  pub(crate) fn into_js_error(self) -> JsError {
    JsNativeError::error().with_message(self.to_string()).into()
  }
}

/// Where in the script source a failure occurred (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourcePosition {
  pub line: u32,
  pub column: u32,
}

impl Display for SourcePosition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

/// The stage at which a script failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptErrorKind {
  /// The source could not be parsed or compiled.
  Compile,
  /// An exception escaped the script.
  Runtime,
}

impl Display for ScriptErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScriptErrorKind::Compile => f.write_str("compile error"),
      ScriptErrorKind::Runtime => f.write_str("uncaught exception"),
    }
  }
}

/// A compile or runtime failure together with its diagnostic payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptError {
  pub kind: ScriptErrorKind,
  pub message: String,
  pub position: Option<SourcePosition>,
  pub source_name: String,
}

impl ScriptError {
  pub(crate) fn compile(source_name: &str, message: String) -> Self {
    let position = trailing_position(&message);
    Self {
      kind: ScriptErrorKind::Compile,
      message,
      position,
      source_name: source_name.to_string(),
    }
  }

  pub(crate) fn runtime(source_name: &str, message: String) -> Self {
    Self {
      kind: ScriptErrorKind::Runtime,
      message,
      position: None,
      source_name: source_name.to_string(),
    }
  }
}

impl Display for ScriptError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.position {
      Some(position) => write!(
        f,
        "{}:{position}: {}: {}",
        self.source_name, self.kind, self.message
      ),
      None => write!(f, "{}: {}: {}", self.source_name, self.kind, self.message),
    }
  }
}

impl std::error::Error for ScriptError {}

/// Wraps an engine failure that happened outside script evaluation (e.g. while defining a
/// property) as a runtime script error.
pub(crate) fn engine_error(err: JsError) -> EmbedError {
  EmbedError::Script(ScriptError::runtime("<host>", err.to_string()))
}

/// Extracts the `at line N, col M` suffix the engine appends to syntax errors.
fn trailing_position(message: &str) -> Option<SourcePosition> {
  let (_, rest) = message.rsplit_once("at line ")?;
  let (line, rest) = rest.split_once(',')?;
  let column = rest.trim_start().strip_prefix("col")?.trim_start();
  let digits = column
    .find(|c: char| !c.is_ascii_digit())
    .map_or(column, |end| &column[..end]);
  Some(SourcePosition {
    line: line.trim().parse().ok()?,
    column: digits.parse().ok()?,
  })
}

use crate::error::EmbedError;
use crate::isolate::Isolate;
use crate::isolate::IsolateParams;
use crate::scope::Scope;
use parking_lot::Mutex;
use std::cell::Cell;
use std::path::Path;
use std::path::PathBuf;

// Set while an `Instance` is alive.
static LIVE: Mutex<bool> = parking_lot::const_mutex(false);

/// Options for bootstrapping the engine runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceOptions {
  /// Location of the host's engine resources (the directory holding the executable, by
  /// convention).
  pub resource_path: PathBuf,
}

impl InstanceOptions {
  pub fn new(resource_path: impl Into<PathBuf>) -> Self {
    Self {
      resource_path: resource_path.into(),
    }
  }

  pub fn with_resource_path(mut self, resource_path: impl Into<PathBuf>) -> Self {
    self.resource_path = resource_path.into();
    self
  }
}

/// The process-wide engine runtime.
///
/// At most one `Instance` is alive at a time, and it runs at most one isolate at a time. Dropping
/// it (or calling [`Instance::shutdown`]) releases the runtime so a later
/// [`Instance::initialize`] succeeds again.
#[derive(Debug)]
pub struct Instance {
  options: InstanceOptions,
  // Not `Sync`: the running isolate is bound to this thread.
  isolate_active: Cell<bool>,
}

/// Clears the active-isolate flag when the isolate ends, including by unwinding.
struct ActiveIsolate<'a>(&'a Cell<bool>);

impl Drop for ActiveIsolate<'_> {
  fn drop(&mut self) {
    self.0.set(false);
  }
}

impl Instance {
  pub fn initialize(resource_path: impl Into<PathBuf>) -> Result<Self, EmbedError> {
    Self::with_options(InstanceOptions::new(resource_path))
  }

  pub fn with_options(options: InstanceOptions) -> Result<Self, EmbedError> {
    let mut live = LIVE.lock();
    if *live {
      return Err(EmbedError::AlreadyInitialized);
    }
    *live = true;
    tracing::info!(resource_path = %options.resource_path.display(), "engine runtime initialized");
    Ok(Self {
      options,
      isolate_active: Cell::new(false),
    })
  }

  pub fn resource_path(&self) -> &Path {
    &self.options.resource_path
  }

  /// Creates an isolate, runs `start` inside its outermost handle scope and disposes the isolate.
  ///
  /// Disposal happens whether or not `start` succeeds. Everything created inside the isolate
  /// (values, references, templates, contexts) is invalid afterwards. Starting an isolate from
  /// inside `start` fails with [`EmbedError::IsolateAlreadyActive`].
  pub fn start_isolate<T, F>(&self, params: IsolateParams, start: F) -> Result<T, EmbedError>
  where
    F: for<'i> FnOnce(&mut Scope<'i>) -> Result<T, EmbedError>,
  {
    if self.isolate_active.replace(true) {
      return Err(EmbedError::IsolateAlreadyActive);
    }
    let _active = ActiveIsolate(&self.isolate_active);
    let _span = tracing::debug_span!("isolate").entered();
    let mut isolate = Isolate::new(params)?;
    let result = {
      let mut scope = isolate.handle_scope();
      start(&mut scope)
    };
    drop(isolate);
    result
  }

  /// Shuts the runtime down. Consuming the instance makes a second shutdown impossible.
  pub fn shutdown(self) {
    tracing::info!(resource_path = %self.options.resource_path.display(), "engine runtime shut down");
  }
}

impl Drop for Instance {
  fn drop(&mut self) {
    *LIVE.lock() = false;
  }
}

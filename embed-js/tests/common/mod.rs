#![allow(dead_code)]

use embed_js::EmbedError;
use embed_js::Instance;
use embed_js::IsolateParams;
use embed_js::Scope;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

// Only one `Instance` may be alive per process, and tests run on parallel threads.
static INSTANCE_LOCK: Mutex<()> = parking_lot::const_mutex(());

pub fn lock_instance() -> MutexGuard<'static, ()> {
  INSTANCE_LOCK.lock()
}

pub fn with_instance<T>(
  f: impl FnOnce(&Instance) -> Result<T, EmbedError>,
) -> Result<T, EmbedError> {
  let _guard = lock_instance();
  let instance = Instance::initialize(env!("CARGO_MANIFEST_DIR"))?;
  let result = f(&instance);
  instance.shutdown();
  result
}

pub fn with_isolate<T>(
  params: IsolateParams,
  f: impl for<'i> FnOnce(&mut Scope<'i>) -> Result<T, EmbedError>,
) -> Result<T, EmbedError> {
  with_instance(|instance| instance.start_isolate(params, f))
}

/// Runs `f` with a fresh context entered.
pub fn with_context<T>(
  f: impl for<'i> FnOnce(&mut Scope<'i>) -> Result<T, EmbedError>,
) -> Result<T, EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let context = scope.create_context(None)?;
    let mut entered = scope.enter_context(context)?;
    f(&mut entered)
  })
}

pub fn eval_string(scope: &mut Scope<'_>, source: &str) -> Result<String, EmbedError> {
  let value = scope.run_script(None, source)?;
  scope.get_string(value)
}

pub fn eval_number(scope: &mut Scope<'_>, source: &str) -> Result<f64, EmbedError> {
  let value = scope.run_script(None, source)?;
  scope.get_number(value)
}

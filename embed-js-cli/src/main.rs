use clap::Parser;
use embed_js::CallbackInfo;
use embed_js::EmbedError;
use embed_js::ExceptionPolicy;
use embed_js::Instance;
use embed_js::IsolateParams;
use embed_js::Reference;
use embed_js::Scope;
use std::any::Any;
use std::cell::Cell;
use std::fs;
use std::io::stdout;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "embed-js", version, about = "Run a script in an embedded JavaScript isolate")]
struct Cli {
  /// Script to run.
  script: PathBuf,

  /// JSON file with isolate parameters.
  #[arg(long, value_name = "FILE")]
  params: Option<PathBuf>,

  /// Substitute `undefined` for uncaught exceptions instead of failing.
  #[arg(long)]
  substitute_exceptions: bool,

  /// Call the callback passed to `scheduleTicks` this many times after the script finishes.
  #[arg(long, value_name = "N", default_value_t = 0)]
  ticks: u32,

  /// Print the script's completion value.
  #[arg(long)]
  print_result: bool,

  /// Enable tracing output to stderr (filtered by `RUST_LOG`).
  #[arg(long)]
  trace: bool,
}

fn install_subscriber(trace: bool) {
  if !trace {
    return;
  }

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
  fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn load_params(cli: &Cli) -> Result<IsolateParams, String> {
  let params = match &cli.params {
    Some(path) => {
      let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
      serde_json::from_str(&text)
        .map_err(|err| format!("invalid isolate parameters in {}: {err}", path.display()))?
    }
    None => IsolateParams::default(),
  };
  Ok(if cli.substitute_exceptions {
    params.with_exception_policy(ExceptionPolicy::Substitute)
  } else {
    params
  })
}

// Longer string arguments are cut at the last whole character.
const PRINT_BUFFER_LEN: usize = 4096;

/// `println(...args)`: writes the arguments space separated. Strings are copied out as UTF-8;
/// other values go through the script string conversion.
fn println(
  scope: &mut Scope<'_>,
  info: &CallbackInfo,
  argc: usize,
  _data: &dyn Any,
) -> Result<(), EmbedError> {
  let mut buf = [0u8; PRINT_BUFFER_LEN];
  let mut line = Vec::new();
  for (i, arg) in info.get_args(argc)?.iter().enumerate() {
    if i > 0 {
      line.push(b' ');
    }
    match scope.get_utf8(*arg, &mut buf) {
      Ok(written) => {
        let text = &buf[..written];
        line.extend_from_slice(text.strip_suffix(b"\0").unwrap_or(text));
      }
      Err(EmbedError::NotAString) => {
        line.extend_from_slice(scope.to_string_lossy(*arg)?.as_bytes());
      }
      Err(err) => return Err(err),
    }
  }
  line.push(b'\n');
  stdout()
    .lock()
    .write_all(&line)
    .map_err(|err| EmbedError::host(format!("failed to write output: {err}")))
}

fn execute(
  scope: &mut Scope<'_>,
  cli: &Cli,
  source_name: &str,
  source: &str,
) -> Result<(), EmbedError> {
  // Bound before the context exists, so they seed its global object.
  let println = scope.create_function_template("println", println, Box::new(()))?;
  scope.set_global("println", println)?;
  let version = scope.create_string(embed_js::VERSION)?;
  scope.set_global("version", version)?;

  let context = scope.create_context(None)?;
  let mut scope = scope.enter_context(context)?;

  let scheduled: Rc<Cell<Option<Reference>>> = Rc::default();
  let slot = scheduled.clone();
  let schedule = scope.create_closure("scheduleTicks", move |scope, info| {
    let callback = info.get_args(1)?[0];
    if !scope.is_callable(callback)? {
      return Err(EmbedError::NotCallable);
    }
    let reference = scope.create_ref(callback)?;
    if let Some(previous) = slot.replace(Some(reference)) {
      scope.release_ref(previous)?;
    }
    Ok(())
  })?;
  scope.set_global("scheduleTicks", schedule)?;

  let result = scope.run_script_named(source_name, None, source)?;
  if cli.print_result {
    let text = scope.to_string_lossy(result)?;
    println!("{text}");
  }

  let Some(callback) = scheduled.take() else {
    return Ok(());
  };
  for tick in 0..cli.ticks {
    let mut tick_scope = scope.reborrow();
    let function = tick_scope.get_ref_value(callback)?;
    let index = tick_scope.create_uint32(tick)?;
    tick_scope.call_function(function, &[index])?;
  }
  scope.release_ref(callback)
}

fn run(cli: &Cli) -> Result<(), String> {
  let source = fs::read_to_string(&cli.script)
    .map_err(|err| format!("failed to read {}: {err}", cli.script.display()))?;
  let params = load_params(cli)?;

  let resource_path = std::env::current_exe()
    .ok()
    .and_then(|exe| exe.parent().map(Path::to_path_buf))
    .unwrap_or_default();
  let instance = Instance::initialize(resource_path).map_err(|err| format!("error: {err}"))?;
  let source_name = cli.script.display().to_string();
  let result = instance.start_isolate(params, |scope| execute(scope, cli, &source_name, &source));
  instance.shutdown();

  match result {
    Ok(()) => Ok(()),
    Err(EmbedError::Script(err)) => Err(err.to_string()),
    Err(err) => Err(format!("error: {err}")),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  install_subscriber(cli.trace);

  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(message) => {
      eprintln!("{message}");
      ExitCode::FAILURE
    }
  }
}

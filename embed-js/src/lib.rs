//! A handle-based layer for embedding a JavaScript engine in a host program.
//!
//! The host bootstraps the process-wide runtime once ([`Instance`]), then runs work inside
//! isolates. Every operation goes through a [`Scope`] passed explicitly to the host's code; there
//! is no ambient "current isolate".
//!
//! # Handles
//!
//! Engine values cross into the host as pointer-sized opaque handles:
//! - [`Value`]: bound to the handle scope that created it. Scopes nest strictly (see
//!   [`Scope::reborrow`]); when a scope is dropped, every value it created becomes stale and any
//!   further use is reported as [`EmbedError::StaleHandle`].
//! - [`Reference`]: a persistent handle with its lifetime decoupled from scopes, used to retain a
//!   script value (typically a callback) across host event-loop iterations.
//! - [`Template`]: a pre-context blueprint for the global object or for host functions.
//! - [`ContextId`]: an execution context with its own global object.
//!
//! Each handle is a `{ index, generation }` pair. Every slot fill takes a fresh process-wide
//! generation, so stale, forged or foreign-isolate handles are detected rather than aliased.
//!
//! # Host functions
//!
//! Host functions are registered with [`Scope::create_function`] (or as templates before a
//! context exists) and receive a [`CallbackInfo`] for each call from script. Host code calls back
//! into script with [`Scope::call_function`], which runs in its own nested scope.
//!
//! # Errors
//!
//! Compile failures and uncaught exceptions surface as [`ScriptError`] with a diagnostic payload.
//! [`ExceptionPolicy::Substitute`] and [`Scope::run_script_compat`] keep the classic behaviour of
//! substituting `undefined` for thrown exceptions.

mod arena;
mod context;
mod error;
mod function;
mod handle;
mod instance;
mod isolate;
mod reference;
mod scope;
mod script;
mod template;
mod value;

pub use crate::context::ContextScope;
pub use crate::error::EmbedError;
pub use crate::error::ScriptError;
pub use crate::error::ScriptErrorKind;
pub use crate::error::SourcePosition;
pub use crate::function::CallbackInfo;
pub use crate::function::NativeFn;
pub use crate::handle::ContextId;
pub use crate::handle::Reference;
pub use crate::handle::SlotId;
pub use crate::handle::Template;
pub use crate::handle::Value;
pub use crate::instance::Instance;
pub use crate::instance::InstanceOptions;
pub use crate::isolate::ExceptionPolicy;
pub use crate::isolate::IsolateParams;
pub use crate::scope::Scope;
pub use crate::template::Binding;
pub use crate::template::BindingTarget;
pub use crate::value::ValueKind;

/// Version of this crate, as exposed to scripts by hosts that choose to.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

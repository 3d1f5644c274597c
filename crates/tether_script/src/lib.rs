//! Tether Script Bridge
//!
//! Projects host classes, a global namespace and late-bound interfaces into
//! an embedded QuickJS runtime, and hands script values back to the host.
//!
//! ## Architecture
//!
//! - **Registry:** class descriptors declared up front, frozen when templates compile
//! - **Kit:** a small script-side interception layer (prototypes, proxies, binding map)
//! - **Dispatch:** one host callback per event kind; each access becomes a short-lived event
//! - **Values:** `ScriptValue` with lazily cached object/array/record/function views
//!
//! Everything runs on the thread that drives the engine. A [`Scope`] is only
//! valid inside [`Engine::with`] or a dispatch callback.

mod array;
mod bridge;
mod callbacks;
mod coerce;
mod compile;
mod console;
mod descriptor;
mod dispatch;
mod engine;
mod error;
mod event;
mod function;
mod handle;
mod kit;
mod launch;
mod record;
mod registry;
mod scope;
mod settings;
mod value;

pub use array::ValueArray;
pub use callbacks::EventKind;
pub use descriptor::{ClassDescriptor, EnumConstant, MethodDescriptor, PropertyDescriptor, TemplateId};
pub use engine::Engine;
pub use error::BridgeError;
pub use event::{CallTarget, GetterEvent, MethodEvent, SetterEvent};
pub use function::ScriptFunction;
pub use handle::{Binding, CapabilityHandle, ClassHandle, InstanceBinding, InstanceHandle, MethodHandle};
pub use launch::LaunchArgs;
pub use record::Record;
pub use scope::Scope;
pub use settings::{EngineSettings, RuntimeLimits};
pub use value::{ScriptObject, ScriptValue};

pub use rquickjs;

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The script ran to completion.
pub const STATUS_OK: i32 = 0;
/// The script could not be read or the templates could not be compiled.
pub const STATUS_LOAD_FAILURE: i32 = 1;
/// An exception escaped the script.
pub const STATUS_EXCEPTION: i32 = 1000;

//! Add-in FFI - native side of the add-in bridge
//!
//! Lets a scripting runtime drive a native add-in component through its proxy
//! library as if it were a runtime object.
//!
//! - [`variant`] - the ABI's tagged union and argument blocks
//! - [`proxy`] / [`loader`] - the seventeen proxy exports and how to load them
//! - [`callback`] - per-component trampoline slots plus out-callback receivers
//! - [`Component`] - one native object, implementing [`addin_sdk::RuntimeObject`]
//!
//! Reflection and invocation live in private modules and are reached through
//! [`Component`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use addin_ffi::{Component, ModuleHandle, ProxyOptions, ProxyTable};
//! use addin_sdk::{RuntimeObject, Value};
//!
//! let proxy = Arc::new(ProxyTable::load(&ProxyOptions::from_env()?)?);
//! let component = Component::create(proxy, unsafe { ModuleHandle::from_raw(module) }, "Calculator")?;
//! component.on_status_text(|text| println!("status: {text}"));
//!
//! let add = component.find_method("Add")?;
//! let sum = component.call_as_function(add, &mut [Some(Value::from(2)), None])?;
//! ```

pub mod callback;
pub mod component;
pub mod config;
mod invoke;
pub mod loader;
pub mod proxy;
mod reflect;
pub mod variant;
pub mod wide;

pub use callback::{severity_from_code, CallbackSlot, Received, CALLBACK_SLOTS};
pub use component::{Component, ComponentHandle};
pub use config::{ConfigError, ProxyOptions};
pub use loader::{Library, LoadError};
pub use proxy::{ModuleHandle, ProxyFunctions, ProxyTable};
pub use variant::{Variant, VariantBlock};

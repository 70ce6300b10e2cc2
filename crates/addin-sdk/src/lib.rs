//! Add-in SDK - host-facing surface of the native add-in bridge
//!
//! This crate holds everything a scripting runtime needs to talk to a native
//! add-in component without touching FFI:
//!
//! - [`Value`] - the runtime value model marshaled across the boundary
//! - [`BridgeError`] - the error taxonomy shared by every bridge operation
//! - [`MethodInfo`] / [`PropertyInfo`] - descriptors built from native reflection
//! - [`Notifications`] - subscriber registries for error, event and status text
//! - [`RuntimeObject`] - the object-capability trait a component implements
//! - [`DescriptorCache`] - optional host-side cache of descriptors by ordinal
//!
//! # Example
//!
//! ```ignore
//! use addin_sdk::{RuntimeObject, Value};
//!
//! fn bump(object: &dyn RuntimeObject) -> addin_sdk::BridgeResult<Value> {
//!     let add = object.find_method("Add")?;
//!     let mut args = vec![Some(Value::from(1)), None];
//!     object.call_as_function(add, &mut args)
//! }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod context;
pub mod error;
pub mod handler;
pub mod types;
pub mod value;

pub use cache::DescriptorCache;
pub use context::RuntimeObject;
pub use error::{BridgeError, BridgeResult};
pub use handler::{
    ComponentEvent, ErrorHandler, ErrorNotice, EventHandler, Notifications, StatusHandler,
};
pub use types::{MethodInfo, ParameterInfo, PropertyInfo, Severity, TypeRef};
pub use value::{ObjectRef, Value, ValueKind};

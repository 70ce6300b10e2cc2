//! RuntimeObject trait - object-capability surface of a component
//!
//! The scripting runtime programs against this trait; the add-in bridge
//! provides the implementation. Members are addressed by ordinal after a
//! single name lookup, mirroring how the native side dispatches.
//!
//! # Arguments
//!
//! Call arguments are `Option<Value>` slots. `None` means the caller left the
//! position unset and the native default should be used. After the call,
//! every slot holds the value the native side left there, so output
//! parameters come back in place.

use crate::error::BridgeResult;
use crate::types::{MethodInfo, PropertyInfo};
use crate::value::Value;

/// Object-capability surface exposed to the host runtime.
///
/// # Thread Safety
///
/// Implementations are `Send + Sync` so the host can store them in shared
/// values. Whether concurrent calls are allowed is decided by the native
/// side and is the host's responsibility.
pub trait RuntimeObject: Send + Sync {
    /// Type name shown in diagnostics
    fn type_name(&self) -> &str;

    // ========================================================================
    // Properties
    // ========================================================================

    /// Number of properties
    fn property_count(&self) -> BridgeResult<usize>;

    /// Resolve a property name to its ordinal
    fn find_property(&self, name: &str) -> BridgeResult<usize>;

    /// Property name by ordinal
    fn property_name(&self, ordinal: usize) -> BridgeResult<String>;

    /// Check if the property can be read
    fn is_property_readable(&self, ordinal: usize) -> BridgeResult<bool>;

    /// Check if the property can be written
    fn is_property_writable(&self, ordinal: usize) -> BridgeResult<bool>;

    /// Build a property descriptor
    fn property_info(&self, ordinal: usize) -> BridgeResult<PropertyInfo>;

    /// Read a property
    fn get_property(&self, ordinal: usize) -> BridgeResult<Value>;

    /// Write a property
    fn set_property(&self, ordinal: usize, value: &Value) -> BridgeResult<()>;

    // ========================================================================
    // Methods
    // ========================================================================

    /// Number of methods
    fn method_count(&self) -> BridgeResult<usize>;

    /// Resolve a method name to its ordinal
    fn find_method(&self, name: &str) -> BridgeResult<usize>;

    /// Build a method descriptor
    fn method_info(&self, ordinal: usize) -> BridgeResult<MethodInfo>;

    /// Call a method, discarding any result
    fn call_as_procedure(&self, ordinal: usize, args: &mut [Option<Value>]) -> BridgeResult<()>;

    /// Call a method and return its result
    fn call_as_function(&self, ordinal: usize, args: &mut [Option<Value>]) -> BridgeResult<Value>;

    // ========================================================================
    // Capabilities
    // ========================================================================

    /// Object supports indexed access (`obj[i]`)
    fn is_indexed(&self) -> bool {
        false
    }

    /// Method signatures may change between calls
    fn dynamic_method_signatures(&self) -> bool {
        false
    }
}

//! Error types for the add-in bridge

use crate::value::ValueKind;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Native side reported no property with this name
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Native side reported no method with this name
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Value kind has no native variant representation
    #[error("Value of kind {0} cannot be passed to a native component")]
    UnsupportedValueKind(ValueKind),

    /// Native side produced a variant tag the codec cannot decode
    #[error("Unsupported variant type: {0:#06x}")]
    UnsupportedVariantType(u16),

    /// String or blob longer than the native element count can express
    #[error("Value too large for a native variant: {0} elements")]
    ValueTooLarge(usize),

    /// Ordinal does not fit the native ordinal type
    #[error("Ordinal out of range: {0}")]
    OrdinalOutOfRange(usize),

    /// Native creation entry point returned no object
    #[error("Failed to create component: {0}")]
    CreationFailed(String),

    /// Every callback slot is held by a live component
    #[error("No free callback slot: all {0} are in use")]
    CallbackSlotsExhausted(usize),

    /// Component was disposed; no further calls are issued
    #[error("Component has been disposed")]
    Disposed,

    /// Proxy library could not be loaded
    #[error("Load error: {0}")]
    Load(String),
}

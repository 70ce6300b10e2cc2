//! Descriptor types built from native reflection
//!
//! Add-ins are untyped: the only facts native reflection can report are
//! names, parameter counts, whether a parameter has a default, whether a
//! method returns a value, and whether a property is readable or writable.
//! Descriptors are plain values; the host decides whether to cache them.

use std::fmt;

// ============================================================================
// TypeRef
// ============================================================================

/// Type reference carried by descriptors.
///
/// The native side cannot describe its types, so a method that returns
/// something returns the generic runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Any runtime value
    Any,
}

// ============================================================================
// ParameterInfo
// ============================================================================

/// Descriptor of one method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterInfo {
    /// Zero-based position in the argument list
    pub position: usize,
    /// Native side supplies a default when the argument is omitted
    pub has_default: bool,
}

impl ParameterInfo {
    /// Create a parameter descriptor with no default
    pub fn new(position: usize) -> Self {
        Self {
            position,
            has_default: false,
        }
    }

    /// Mark the parameter as having a native default
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

// ============================================================================
// MethodInfo
// ============================================================================

/// Descriptor of a native method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Primary name (name slot 0)
    pub name: String,
    /// Alias (name slot 1), often the localized name
    pub alias: String,
    /// Ordinal used for every call
    pub ordinal: usize,
    /// Parameters in ordinal order
    pub parameters: Vec<ParameterInfo>,
    /// Return type, absent for procedures
    pub return_type: Option<TypeRef>,
    /// Callable from scripts
    pub is_public: bool,
}

impl MethodInfo {
    /// Create a public procedure descriptor with no parameters
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            alias: String::new(),
            ordinal,
            parameters: Vec::new(),
            return_type: None,
            is_public: true,
        }
    }

    /// Set the alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Set the return type
    pub fn with_return(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Append parameters
    pub fn with_parameters(mut self, params: impl IntoIterator<Item = ParameterInfo>) -> Self {
        self.parameters.extend(params);
        self
    }

    /// Check if the method produces a value
    pub fn has_return_value(&self) -> bool {
        self.return_type.is_some()
    }

    /// Number of parameters
    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }

    /// Number of parameters the caller must supply (no native default)
    pub fn required_param_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.has_default).count()
    }
}

// ============================================================================
// PropertyInfo
// ============================================================================

/// Descriptor of a native property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Property name
    pub name: String,
    /// Dispatch id used for every subsequent get/set
    pub ordinal: usize,
    /// Property can be read
    pub readable: bool,
    /// Property can be written
    pub writable: bool,
}

impl PropertyInfo {
    /// Create a property descriptor
    pub fn new(name: impl Into<String>, ordinal: usize, readable: bool, writable: bool) -> Self {
        Self {
            name: name.into(),
            ordinal,
            readable,
            writable,
        }
    }

    /// Dispatch id for get/set calls
    #[inline]
    pub fn dispatch_id(&self) -> usize {
        self.ordinal
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Normalized severity of a native error or status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// No status
    None,
    /// Ordinary message
    Ordinary,
    /// Needs attention
    Attention,
    /// Important
    Important,
    /// Very important
    VeryImportant,
    /// Informational
    Information,
}

impl Severity {
    /// Severity name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Ordinary => "ordinary",
            Severity::Attention => "attention",
            Severity::Important => "important",
            Severity::VeryImportant => "very-important",
            Severity::Information => "information",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

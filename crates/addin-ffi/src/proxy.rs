//! Native proxy boundary
//!
//! The proxy library exports seventeen free functions that operate on an
//! opaque object pointer. [`ProxyTable`] holds them, either resolved from a
//! shared library (see [`crate::loader`]) or assembled directly from function
//! pointers, and wraps each one in a thin unsafe method that converts names
//! to UTF-16 and ordinals to the native `i32`.
//!
//! Calls that deliver a payload (names, property values, default values,
//! function results) take an out-callback; [`crate::callback`] provides the
//! receivers.

use std::ffi::c_void;
use std::sync::Arc;

use addin_sdk::{BridgeError, BridgeResult};
use tracing::trace;

use crate::loader::Library;
use crate::variant::Variant;
use crate::wide::{to_wide, WChar};

/// Opaque native object pointer
pub type ObjectPtr = *mut c_void;

// ============================================================================
// Callback signatures
// ============================================================================

/// `(code, source, description, scode)`
pub type ErrorCallback = unsafe extern "system" fn(u16, *const WChar, *const WChar, i32);

/// `(source, message, data)`
pub type EventCallback = unsafe extern "system" fn(*const WChar, *const WChar, *const WChar);

/// `(status)`
pub type StatusCallback = unsafe extern "system" fn(*const WChar);

/// Out-callback delivering a name
pub type StringReceiver = unsafe extern "system" fn(*const WChar);

/// Out-callback delivering a variant owned by the native side
pub type VariantReceiver = unsafe extern "system" fn(*const Variant);

// ============================================================================
// Function signatures
// ============================================================================

pub type GetClassObjectFn = unsafe extern "system" fn(
    *mut c_void,
    *const WChar,
    ErrorCallback,
    EventCallback,
    StatusCallback,
) -> ObjectPtr;
/// Destruction may unwind so a failing destroy can be contained.
pub type DestroyObjectFn = unsafe extern "system-unwind" fn(ObjectPtr);
pub type CountFn = unsafe extern "system" fn(ObjectPtr) -> i32;
pub type FindFn = unsafe extern "system" fn(ObjectPtr, *const WChar) -> i32;
pub type FlagFn = unsafe extern "system" fn(ObjectPtr, i32) -> bool;
pub type NameFn = unsafe extern "system" fn(ObjectPtr, i32, i32, StringReceiver);
pub type GetPropValFn = unsafe extern "system" fn(ObjectPtr, i32, VariantReceiver);
pub type SetPropValFn = unsafe extern "system" fn(ObjectPtr, i32, *mut Variant);
pub type ParamCountFn = unsafe extern "system" fn(ObjectPtr, i32) -> i32;
pub type ParamDefaultFn = unsafe extern "system" fn(ObjectPtr, i32, i32, VariantReceiver);
pub type CallAsProcFn = unsafe extern "system" fn(ObjectPtr, i32, *mut Variant);
pub type CallAsFuncFn = unsafe extern "system" fn(ObjectPtr, i32, *mut Variant, VariantReceiver) -> bool;

/// The proxy's exported functions.
#[derive(Clone, Copy)]
pub struct ProxyFunctions {
    pub get_class_object: GetClassObjectFn,
    pub destroy_object: DestroyObjectFn,
    pub get_n_props: CountFn,
    pub find_prop: FindFn,
    pub is_prop_readable: FlagFn,
    pub is_prop_writable: FlagFn,
    pub get_prop_name: NameFn,
    pub get_prop_val: GetPropValFn,
    pub set_prop_val: SetPropValFn,
    pub get_n_methods: CountFn,
    pub find_method: FindFn,
    pub get_method_name: NameFn,
    pub get_n_params: ParamCountFn,
    pub get_param_def_value: ParamDefaultFn,
    pub has_ret_val: FlagFn,
    pub call_as_proc: CallAsProcFn,
    pub call_as_func: CallAsFuncFn,
}

impl std::fmt::Debug for ProxyFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFunctions").finish_non_exhaustive()
    }
}

/// Module handle handed to the creation entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHandle(*mut c_void);

impl ModuleHandle {
    /// Wrap a resolved module handle.
    ///
    /// # Safety
    /// The pointer must be what the proxy's creation entry point expects and
    /// must stay valid while components created from it are alive.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// Raw handle
    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

// ============================================================================
// ProxyTable
// ============================================================================

/// Function table plus the library that backs it.
pub struct ProxyTable {
    functions: ProxyFunctions,
    trace_calls: bool,
    /// Keeps resolved function pointers valid
    library: Option<Arc<Library>>,
}

macro_rules! traced {
    ($self:ident, $name:literal, $ordinal:expr) => {
        if $self.trace_calls {
            trace!(call = $name, ordinal = $ordinal, "proxy call");
        }
    };
    ($self:ident, $name:literal) => {
        if $self.trace_calls {
            trace!(call = $name, "proxy call");
        }
    };
}

impl ProxyTable {
    /// Build a table from function pointers already in hand
    pub fn from_functions(functions: ProxyFunctions) -> Self {
        Self {
            functions,
            trace_calls: false,
            library: None,
        }
    }

    pub(crate) fn with_library(functions: ProxyFunctions, library: Arc<Library>) -> Self {
        Self {
            functions,
            trace_calls: false,
            library: Some(library),
        }
    }

    /// Emit a `trace!` event per boundary call
    pub fn with_tracing(mut self, trace_calls: bool) -> Self {
        self.trace_calls = trace_calls;
        self
    }

    /// Check if boundary calls are traced
    pub fn trace_calls(&self) -> bool {
        self.trace_calls
    }

    /// Path of the backing library, if any
    pub fn library_path(&self) -> Option<&str> {
        self.library.as_deref().map(Library::path)
    }

    // All wrappers below require `object` to be a live handle created by this
    // table's `get_class_object`.

    pub(crate) unsafe fn get_class_object(
        &self,
        module: ModuleHandle,
        name: &str,
        error: ErrorCallback,
        event: EventCallback,
        status: StatusCallback,
    ) -> ObjectPtr {
        traced!(self, "GetClassObject");
        let wide = to_wide(name);
        (self.functions.get_class_object)(module.as_ptr(), wide.as_ptr(), error, event, status)
    }

    pub(crate) unsafe fn destroy_object(&self, object: ObjectPtr) {
        traced!(self, "DestroyObject");
        (self.functions.destroy_object)(object)
    }

    pub(crate) unsafe fn get_n_props(&self, object: ObjectPtr) -> i32 {
        traced!(self, "GetNProps");
        (self.functions.get_n_props)(object)
    }

    pub(crate) unsafe fn find_prop(&self, object: ObjectPtr, name: &str) -> i32 {
        traced!(self, "FindProp");
        let wide = to_wide(name);
        (self.functions.find_prop)(object, wide.as_ptr())
    }

    pub(crate) unsafe fn is_prop_readable(&self, object: ObjectPtr, ordinal: i32) -> bool {
        traced!(self, "IsPropReadable", ordinal);
        (self.functions.is_prop_readable)(object, ordinal)
    }

    pub(crate) unsafe fn is_prop_writable(&self, object: ObjectPtr, ordinal: i32) -> bool {
        traced!(self, "IsPropWritable", ordinal);
        (self.functions.is_prop_writable)(object, ordinal)
    }

    pub(crate) unsafe fn get_prop_name(
        &self,
        object: ObjectPtr,
        ordinal: i32,
        slot: i32,
        receiver: StringReceiver,
    ) {
        traced!(self, "GetPropName", ordinal);
        (self.functions.get_prop_name)(object, ordinal, slot, receiver)
    }

    pub(crate) unsafe fn get_prop_val(&self, object: ObjectPtr, ordinal: i32, receiver: VariantReceiver) {
        traced!(self, "GetPropVal", ordinal);
        (self.functions.get_prop_val)(object, ordinal, receiver)
    }

    pub(crate) unsafe fn set_prop_val(&self, object: ObjectPtr, ordinal: i32, value: *mut Variant) {
        traced!(self, "SetPropVal", ordinal);
        (self.functions.set_prop_val)(object, ordinal, value)
    }

    pub(crate) unsafe fn get_n_methods(&self, object: ObjectPtr) -> i32 {
        traced!(self, "GetNMethods");
        (self.functions.get_n_methods)(object)
    }

    pub(crate) unsafe fn find_method(&self, object: ObjectPtr, name: &str) -> i32 {
        traced!(self, "FindMethod");
        let wide = to_wide(name);
        (self.functions.find_method)(object, wide.as_ptr())
    }

    pub(crate) unsafe fn get_method_name(
        &self,
        object: ObjectPtr,
        ordinal: i32,
        slot: i32,
        receiver: StringReceiver,
    ) {
        traced!(self, "GetMethodName", ordinal);
        (self.functions.get_method_name)(object, ordinal, slot, receiver)
    }

    pub(crate) unsafe fn get_n_params(&self, object: ObjectPtr, ordinal: i32) -> i32 {
        traced!(self, "GetNParams", ordinal);
        (self.functions.get_n_params)(object, ordinal)
    }

    pub(crate) unsafe fn get_param_def_value(
        &self,
        object: ObjectPtr,
        ordinal: i32,
        param: i32,
        receiver: VariantReceiver,
    ) {
        traced!(self, "GetParamDefValue", ordinal);
        (self.functions.get_param_def_value)(object, ordinal, param, receiver)
    }

    pub(crate) unsafe fn has_ret_val(&self, object: ObjectPtr, ordinal: i32) -> bool {
        traced!(self, "HasRetVal", ordinal);
        (self.functions.has_ret_val)(object, ordinal)
    }

    pub(crate) unsafe fn call_as_proc(&self, object: ObjectPtr, ordinal: i32, args: *mut Variant) {
        traced!(self, "CallAsProc", ordinal);
        (self.functions.call_as_proc)(object, ordinal, args)
    }

    pub(crate) unsafe fn call_as_func(
        &self,
        object: ObjectPtr,
        ordinal: i32,
        args: *mut Variant,
        receiver: VariantReceiver,
    ) -> bool {
        traced!(self, "CallAsFunc", ordinal);
        (self.functions.call_as_func)(object, ordinal, args, receiver)
    }
}

impl std::fmt::Debug for ProxyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyTable")
            .field("library", &self.library_path())
            .field("trace_calls", &self.trace_calls)
            .finish()
    }
}

// ============================================================================
// BoundObject
// ============================================================================

/// A live native object together with the table that drives it.
/// Reflection and invocation are implemented on this type.
pub(crate) struct BoundObject<'a> {
    pub(crate) proxy: &'a ProxyTable,
    pub(crate) object: ObjectPtr,
}

/// Convert a host ordinal to the native `i32`
pub(crate) fn native_ordinal(ordinal: usize) -> BridgeResult<i32> {
    i32::try_from(ordinal).map_err(|_| BridgeError::OrdinalOutOfRange(ordinal))
}

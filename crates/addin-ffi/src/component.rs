//! Component adapter
//!
//! [`Component`] ties one native object to the host: it owns the handle and
//! the callback slot its notifications arrive through, and exposes the
//! property and method surface through [`RuntimeObject`].
//!
//! # Lifecycle
//!
//! ```text
//! create ──> live ──dispose()/Drop──> disposed (terminal)
//! ```
//!
//! The native destroy entry point runs exactly once, and never while a call
//! on the object is still running: disposing during a call (from a
//! subscriber, or from another thread) marks the component disposed and the
//! last call to return destroys the object. After disposal every new
//! operation fails with [`BridgeError::Disposed`] and nothing crosses the
//! boundary.

use std::ffi::c_void;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::Arc;

use addin_sdk::{
    BridgeError, BridgeResult, ComponentEvent, ErrorNotice, MethodInfo, Notifications,
    PropertyInfo, RuntimeObject, Value,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::callback::{panic_message, CallbackSlot};
use crate::proxy::{BoundObject, ModuleHandle, ProxyTable};

// ============================================================================
// ComponentHandle
// ============================================================================

/// Owning reference to a live native object. Move-only; consumed by
/// [`ComponentHandle::destroy`].
#[derive(Debug)]
pub struct ComponentHandle {
    object: NonNull<c_void>,
}

// The handle is an opaque token; thread affinity of the object it names is
// the native side's rule, not enforced here.
unsafe impl Send for ComponentHandle {}
unsafe impl Sync for ComponentHandle {}

impl ComponentHandle {
    /// Take ownership of a raw object pointer. Null yields `None`.
    ///
    /// # Safety
    /// `object` must come from the creation entry point of the table it will
    /// be destroyed with, and must not be owned elsewhere.
    pub unsafe fn from_raw(object: *mut c_void) -> Option<Self> {
        NonNull::new(object).map(|object| Self { object })
    }

    /// Raw object pointer
    pub fn as_ptr(&self) -> *mut c_void {
        self.object.as_ptr()
    }

    /// Call the native destroy entry point, consuming the handle
    pub fn destroy(self, proxy: &ProxyTable) {
        unsafe { proxy.destroy_object(self.object.as_ptr()) }
    }
}

// ============================================================================
// Component
// ============================================================================

/// The native object and the slot its trampolines route through. Released
/// together, slot last.
struct Live {
    handle: ComponentHandle,
    slot: CallbackSlot,
}

struct Lifecycle {
    live: Option<Live>,
    disposed: bool,
    /// Native calls currently running on the object
    in_flight: usize,
}

/// A native add-in object exposed as a runtime object.
pub struct Component {
    name: String,
    proxy: Arc<ProxyTable>,
    state: Mutex<Lifecycle>,
    notifications: Arc<Notifications>,
}

/// A call in progress on the live object. Destruction waits until every
/// `Call` is dropped.
struct Call<'a> {
    component: &'a Component,
    bound: BoundObject<'a>,
}

impl<'a> Deref for Call<'a> {
    type Target = BoundObject<'a>;

    fn deref(&self) -> &Self::Target {
        &self.bound
    }
}

impl Drop for Call<'_> {
    fn drop(&mut self) {
        let live = {
            let mut state = self.component.state.lock();
            state.in_flight -= 1;
            if state.disposed && state.in_flight == 0 {
                state.live.take()
            } else {
                None
            }
        };
        if let Some(live) = live {
            self.component.destroy(live);
        }
    }
}

impl Component {
    /// Create the named object from a resolved module.
    ///
    /// Claims a callback slot first; fails with `CallbackSlotsExhausted` if
    /// none is free. Notifications raised during construction reach the new
    /// component's channels, which have no subscribers yet.
    pub fn create(proxy: Arc<ProxyTable>, module: ModuleHandle, name: &str) -> BridgeResult<Self> {
        let notifications = Arc::new(Notifications::new());
        let slot = CallbackSlot::claim(&notifications)?;
        let object = unsafe {
            proxy.get_class_object(module, name, slot.error(), slot.event(), slot.status())
        };
        let handle = unsafe { ComponentHandle::from_raw(object) }
            .ok_or_else(|| BridgeError::CreationFailed(name.to_string()))?;

        debug!(component = %name, slot = slot.index(), "created add-in component");
        Ok(Self {
            name: name.to_string(),
            proxy,
            state: Mutex::new(Lifecycle {
                live: Some(Live { handle, slot }),
                disposed: false,
                in_flight: 0,
            }),
            notifications,
        })
    }

    /// Class name the component was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a call on the live object, or fail with `Disposed`.
    ///
    /// The lock is held only to count the call, so subscribers may call back
    /// into the component while a native call is in flight.
    fn enter(&self) -> BridgeResult<Call<'_>> {
        let object = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(BridgeError::Disposed);
            }
            let object = state
                .live
                .as_ref()
                .map(|live| live.handle.as_ptr())
                .ok_or(BridgeError::Disposed)?;
            state.in_flight += 1;
            object
        };
        Ok(Call {
            component: self,
            bound: BoundObject {
                proxy: &self.proxy,
                object,
            },
        })
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe to error notices
    pub fn on_error(&self, handler: impl Fn(&ErrorNotice) + Send + Sync + 'static) {
        self.notifications.subscribe_error(handler);
    }

    /// Subscribe to external events
    pub fn on_event(&self, handler: impl Fn(&ComponentEvent) + Send + Sync + 'static) {
        self.notifications.subscribe_event(handler);
    }

    /// Subscribe to status text
    pub fn on_status_text(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.notifications.subscribe_status(handler);
    }

    /// Notification channels of this component
    pub fn notifications(&self) -> &Arc<Notifications> {
        &self.notifications
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Dispose the component. Later calls do nothing.
    ///
    /// The native object is destroyed now, or by the last in-flight call when
    /// it returns. A panic raised by the destroy entry point is logged and
    /// swallowed.
    pub fn dispose(&self) {
        let live = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            if state.in_flight > 0 {
                debug!(
                    component = %self.name,
                    in_flight = state.in_flight,
                    "destroy deferred until native calls return"
                );
                return;
            }
            state.live.take()
        };
        if let Some(live) = live {
            self.destroy(live);
        }
    }

    /// Check if the component has been disposed
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    fn destroy(&self, live: Live) {
        let Live { handle, slot } = live;
        let proxy = &self.proxy;
        match panic::catch_unwind(AssertUnwindSafe(|| handle.destroy(proxy))) {
            Ok(()) => debug!(component = %self.name, "disposed add-in component"),
            Err(payload) => warn!(
                component = %self.name,
                panic = panic_message(payload.as_ref()),
                "native destroy failed"
            ),
        }
        drop(slot);
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .field("notifications", &self.notifications)
            .finish()
    }
}

// ============================================================================
// RuntimeObject
// ============================================================================

impl RuntimeObject for Component {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn property_count(&self) -> BridgeResult<usize> {
        Ok(self.enter()?.property_count())
    }

    fn find_property(&self, name: &str) -> BridgeResult<usize> {
        self.enter()?.find_property(name)
    }

    fn property_name(&self, ordinal: usize) -> BridgeResult<String> {
        self.enter()?.property_name(ordinal)
    }

    fn is_property_readable(&self, ordinal: usize) -> BridgeResult<bool> {
        self.enter()?.is_property_readable(ordinal)
    }

    fn is_property_writable(&self, ordinal: usize) -> BridgeResult<bool> {
        self.enter()?.is_property_writable(ordinal)
    }

    fn property_info(&self, ordinal: usize) -> BridgeResult<PropertyInfo> {
        self.enter()?.property_info(ordinal)
    }

    fn get_property(&self, ordinal: usize) -> BridgeResult<Value> {
        self.enter()?.get_property(ordinal)
    }

    fn set_property(&self, ordinal: usize, value: &Value) -> BridgeResult<()> {
        self.enter()?.set_property(ordinal, value)
    }

    fn method_count(&self) -> BridgeResult<usize> {
        Ok(self.enter()?.method_count())
    }

    fn find_method(&self, name: &str) -> BridgeResult<usize> {
        self.enter()?.find_method(name)
    }

    fn method_info(&self, ordinal: usize) -> BridgeResult<MethodInfo> {
        self.enter()?.method_info(ordinal)
    }

    fn call_as_procedure(&self, ordinal: usize, args: &mut [Option<Value>]) -> BridgeResult<()> {
        self.enter()?.call_as_procedure(ordinal, args)
    }

    fn call_as_function(&self, ordinal: usize, args: &mut [Option<Value>]) -> BridgeResult<Value> {
        self.enter()?.call_as_function(ordinal, args)
    }
}

//! Callback bridge
//!
//! Native callbacks carry no user-data pointer, so components are told apart
//! by the function pointers they register:
//!
//! - **Notifications** (error, event, status) go through a [`CallbackSlot`].
//!   Its trampolines are monomorphized over the slot index and look the
//!   owning component's channels up in a static table, so they arrive from
//!   any thread, during a call or between calls.
//! - **Out-callbacks** (names, values) land in a thread-local slot read back
//!   by [`receive_string`] / [`receive_value`] once the query returns.
//!
//! Trampolines never unwind into native code: decoding happens before any
//! subscriber runs and subscriber panics are caught and logged.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use addin_sdk::{
    BridgeError, BridgeResult, ComponentEvent, ErrorNotice, Notifications, Severity, Value,
};
use parking_lot::{const_mutex, Mutex};
use tracing::warn;

use crate::proxy::{ErrorCallback, EventCallback, StatusCallback, StringReceiver, VariantReceiver};
use crate::variant::Variant;
use crate::wide::{from_wide_ptr, WChar};

// Native message codes (ADDIN_E_*)
pub const ADDIN_E_NONE: u16 = 1000;
pub const ADDIN_E_ORDINARY: u16 = 1001;
pub const ADDIN_E_ATTENTION: u16 = 1002;
pub const ADDIN_E_IMPORTANT: u16 = 1003;
pub const ADDIN_E_VERY_IMPORTANT: u16 = 1004;
pub const ADDIN_E_INFO: u16 = 1005;
pub const ADDIN_E_FAIL: u16 = 1006;
pub const ADDIN_E_MSGBOX_ATTENTION: u16 = 1007;
pub const ADDIN_E_MSGBOX_INFO: u16 = 1008;
pub const ADDIN_E_MSGBOX_FAIL: u16 = 1009;

/// Normalize a native message code. Unknown codes are `Ordinary`.
pub fn severity_from_code(code: u16) -> Severity {
    match code {
        ADDIN_E_NONE => Severity::None,
        ADDIN_E_ORDINARY => Severity::Ordinary,
        ADDIN_E_ATTENTION => Severity::Attention,
        ADDIN_E_IMPORTANT => Severity::Important,
        ADDIN_E_VERY_IMPORTANT => Severity::VeryImportant,
        ADDIN_E_INFO => Severity::Information,
        ADDIN_E_FAIL => Severity::VeryImportant,
        ADDIN_E_MSGBOX_ATTENTION | ADDIN_E_MSGBOX_INFO | ADDIN_E_MSGBOX_FAIL => Severity::Attention,
        _ => Severity::Ordinary,
    }
}

thread_local! {
    static STRING_SLOT: RefCell<Option<String>> = const { RefCell::new(None) };
    static VALUE_SLOT: RefCell<Option<Received>> = const { RefCell::new(None) };
}

// ============================================================================
// Slots
// ============================================================================

/// Number of components that can hold callbacks at the same time
pub const CALLBACK_SLOTS: usize = 128;

type Channels = Mutex<Option<Weak<Notifications>>>;

#[allow(clippy::declare_interior_mutable_const)]
const FREE: Channels = const_mutex(None);

static CHANNELS: [Channels; CALLBACK_SLOTS] = [FREE; CALLBACK_SLOTS];

/// One entry of the trampoline pool, bound to a component's channels until
/// dropped.
#[derive(Debug)]
pub struct CallbackSlot {
    index: usize,
}

impl CallbackSlot {
    /// Bind the first free slot to `notifications`.
    ///
    /// Fails with `CallbackSlotsExhausted` when every slot is held.
    pub fn claim(notifications: &Arc<Notifications>) -> BridgeResult<Self> {
        for (index, channels) in CHANNELS.iter().enumerate() {
            let mut channels = channels.lock();
            if channels.is_none() {
                *channels = Some(Arc::downgrade(notifications));
                return Ok(Self { index });
            }
        }
        Err(BridgeError::CallbackSlotsExhausted(CALLBACK_SLOTS))
    }

    /// Position in the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// Error trampoline of this slot
    pub fn error(&self) -> ErrorCallback {
        ERROR_TRAMPOLINES[self.index]
    }

    /// Event trampoline of this slot
    pub fn event(&self) -> EventCallback {
        EVENT_TRAMPOLINES[self.index]
    }

    /// Status trampoline of this slot
    pub fn status(&self) -> StatusCallback {
        STATUS_TRAMPOLINES[self.index]
    }
}

impl Drop for CallbackSlot {
    fn drop(&mut self) {
        *CHANNELS[self.index].lock() = None;
    }
}

/// Channels bound to `slot`. The lock is released before returning so
/// subscribers may claim or release slots.
fn channels(slot: usize) -> Option<Arc<Notifications>> {
    CHANNELS[slot].lock().as_ref().and_then(Weak::upgrade)
}

// ============================================================================
// Trampolines
// ============================================================================

unsafe extern "system" fn error_trampoline<const SLOT: usize>(
    code: u16,
    source: *const WChar,
    description: *const WChar,
    scode: i32,
) {
    let notice = ErrorNotice {
        severity: severity_from_code(code),
        code: scode,
        source: from_wide_ptr(source),
        description: from_wide_ptr(description),
    };
    contain("error", || match channels(SLOT) {
        Some(channels) => {
            channels.raise_error(&notice);
        }
        None => warn!(callback = "error", slot = SLOT, code, "native callback on a released slot"),
    });
}

unsafe extern "system" fn event_trampoline<const SLOT: usize>(
    source: *const WChar,
    message: *const WChar,
    data: *const WChar,
) {
    let event = ComponentEvent {
        source: from_wide_ptr(source),
        message: from_wide_ptr(message),
        data: from_wide_ptr(data),
    };
    contain("event", || match channels(SLOT) {
        Some(channels) => {
            channels.raise_event(&event);
        }
        None => warn!(callback = "event", slot = SLOT, "native callback on a released slot"),
    });
}

unsafe extern "system" fn status_trampoline<const SLOT: usize>(status: *const WChar) {
    let status = from_wide_ptr(status);
    contain("status", || match channels(SLOT) {
        Some(channels) => {
            channels.raise_status(&status);
        }
        None => warn!(callback = "status", slot = SLOT, "native callback on a released slot"),
    });
}

macro_rules! trampoline_tables {
    ($($slot:literal)*) => {
        const ERROR_TRAMPOLINES: [ErrorCallback; CALLBACK_SLOTS] = [$(error_trampoline::<$slot>),*];
        const EVENT_TRAMPOLINES: [EventCallback; CALLBACK_SLOTS] = [$(event_trampoline::<$slot>),*];
        const STATUS_TRAMPOLINES: [StatusCallback; CALLBACK_SLOTS] = [$(status_trampoline::<$slot>),*];
    };
}

trampoline_tables!(
      0   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15
     16  17  18  19  20  21  22  23  24  25  26  27  28  29  30  31
     32  33  34  35  36  37  38  39  40  41  42  43  44  45  46  47
     48  49  50  51  52  53  54  55  56  57  58  59  60  61  62  63
     64  65  66  67  68  69  70  71  72  73  74  75  76  77  78  79
     80  81  82  83  84  85  86  87  88  89  90  91  92  93  94  95
     96  97  98  99 100 101 102 103 104 105 106 107 108 109 110 111
    112 113 114 115 116 117 118 119 120 121 122 123 124 125 126 127
);

fn contain(callback: &'static str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        warn!(callback, panic = panic_message(payload.as_ref()), "panic contained at native callback");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// Receivers
// ============================================================================

/// Variant delivered through an out-callback
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    /// Decoded payload
    pub value: BridgeResult<Value>,
    /// The native variant was `VTYPE_EMPTY`
    pub empty: bool,
}

unsafe extern "system" fn string_receiver(text: *const WChar) {
    let text = from_wide_ptr(text);
    STRING_SLOT.with(|slot| *slot.borrow_mut() = Some(text));
}

unsafe extern "system" fn variant_receiver(variant: *const Variant) {
    // The variant belongs to the native side: decode now, never release.
    let received = match variant.as_ref() {
        Some(variant) => Received {
            value: variant.decode(),
            empty: variant.is_empty(),
        },
        None => Received {
            value: Ok(Value::Undefined),
            empty: true,
        },
    };
    VALUE_SLOT.with(|slot| *slot.borrow_mut() = Some(received));
}

/// Run a query that delivers a string. Returns `None` if nothing was
/// delivered.
pub fn receive_string(query: impl FnOnce(StringReceiver)) -> Option<String> {
    let outer = STRING_SLOT.with(|slot| slot.borrow_mut().take());
    query(string_receiver);
    STRING_SLOT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), outer))
}

/// Run a query that delivers a variant. Returns `None` if nothing was
/// delivered.
pub fn receive_value(query: impl FnOnce(VariantReceiver)) -> Option<Received> {
    let outer = VALUE_SLOT.with(|slot| slot.borrow_mut().take());
    query(variant_receiver);
    VALUE_SLOT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), outer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wide::to_wide;
    use std::ptr;

    // Tests that claim slots share one pool.
    static POOL: Mutex<()> = const_mutex(());

    fn collect_status(channels: &Notifications, tag: &'static str, seen: &Arc<Mutex<Vec<String>>>) {
        let seen = seen.clone();
        channels.subscribe_status(move |text| seen.lock().push(format!("{tag}:{text}")));
    }

    #[test]
    fn test_severity_table() {
        let expected = [
            Severity::None,
            Severity::Ordinary,
            Severity::Attention,
            Severity::Important,
            Severity::VeryImportant,
            Severity::Information,
            Severity::VeryImportant,
            Severity::Attention,
            Severity::Attention,
            Severity::Attention,
        ];
        for (code, severity) in (1000u16..=1009).zip(expected) {
            assert_eq!(severity_from_code(code), severity, "code {code}");
        }
        assert_eq!(severity_from_code(9999), Severity::Ordinary);
        assert_eq!(severity_from_code(999), Severity::Ordinary);
        assert_eq!(severity_from_code(0), Severity::Ordinary);
    }

    // ===== Slots =====

    #[test]
    fn test_each_slot_routes_to_its_own_channels() {
        let _pool = POOL.lock();
        let first = Arc::new(Notifications::new());
        let second = Arc::new(Notifications::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        collect_status(&first, "first", &seen);
        collect_status(&second, "second", &seen);

        let first_slot = CallbackSlot::claim(&first).unwrap();
        let second_slot = CallbackSlot::claim(&second).unwrap();
        assert_ne!(first_slot.index(), second_slot.index());

        let status = to_wide("busy");
        unsafe {
            (second_slot.status())(status.as_ptr());
            (first_slot.status())(status.as_ptr());
        }
        assert_eq!(*seen.lock(), vec!["second:busy", "first:busy"]);
    }

    #[test]
    fn test_callbacks_arrive_from_any_thread() {
        let _pool = POOL.lock();
        let channels = Arc::new(Notifications::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        channels.subscribe_event(move |event| sink.lock().push(event.message.clone()));

        let slot = CallbackSlot::claim(&channels).unwrap();
        let event = slot.event();
        let host = to_wide("host");
        unsafe { event(ptr::null(), host.as_ptr(), ptr::null()) };

        std::thread::spawn(move || {
            let worker = to_wide("worker");
            unsafe { event(ptr::null(), worker.as_ptr(), ptr::null()) };
        })
        .join()
        .unwrap();

        assert_eq!(*events.lock(), vec!["host", "worker"]);
    }

    #[test]
    fn test_released_slot_drops_callbacks() {
        let _pool = POOL.lock();
        let channels = Arc::new(Notifications::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        collect_status(&channels, "late", &seen);

        let slot = CallbackSlot::claim(&channels).unwrap();
        let (error, event, status) = (slot.error(), slot.event(), slot.status());
        drop(slot);

        let text = to_wide("lost");
        unsafe {
            status(text.as_ptr());
            event(text.as_ptr(), ptr::null(), ptr::null());
            error(ADDIN_E_FAIL, ptr::null(), ptr::null(), 0);
        }
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_slot_does_not_keep_channels_alive() {
        let _pool = POOL.lock();
        let channels = Arc::new(Notifications::new());
        let slot = CallbackSlot::claim(&channels).unwrap();
        drop(channels);

        let text = to_wide("orphan");
        unsafe { (slot.status())(text.as_ptr()) };
    }

    #[test]
    fn test_exhausted_pool_refuses_claims() {
        let _pool = POOL.lock();
        let channels = Arc::new(Notifications::new());
        let mut held = Vec::new();
        let err = loop {
            match CallbackSlot::claim(&channels) {
                Ok(slot) => held.push(slot),
                Err(err) => break err,
            }
        };
        assert_eq!(err, BridgeError::CallbackSlotsExhausted(CALLBACK_SLOTS));
        assert_eq!(held.len(), CALLBACK_SLOTS);

        let freed = held.pop().unwrap().index();
        assert_eq!(CallbackSlot::claim(&channels).unwrap().index(), freed);
    }

    // ===== Trampolines =====

    #[test]
    fn test_error_trampoline_decodes_notice() {
        let _pool = POOL.lock();
        let channels = Arc::new(Notifications::new());
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        channels.subscribe_error(move |notice| *sink.lock() = Some(notice.clone()));

        let slot = CallbackSlot::claim(&channels).unwrap();
        let source = to_wide("Calculator");
        unsafe { (slot.error())(ADDIN_E_INFO, source.as_ptr(), ptr::null(), -5) };

        assert_eq!(
            seen.lock().clone(),
            Some(ErrorNotice {
                severity: Severity::Information,
                code: -5,
                source: "Calculator".to_string(),
                description: String::new(),
            })
        );
    }

    #[test]
    fn test_panicking_subscriber_is_contained() {
        let _pool = POOL.lock();
        let channels = Arc::new(Notifications::new());
        let reached = Arc::new(Mutex::new(false));
        channels.subscribe_event(|_| panic!("subscriber failed"));
        let flag = reached.clone();
        channels.subscribe_status(move |_| *flag.lock() = true);

        let slot = CallbackSlot::claim(&channels).unwrap();
        let text = to_wide("x");
        unsafe {
            (slot.event())(text.as_ptr(), text.as_ptr(), text.as_ptr());
            (slot.status())(text.as_ptr());
        }
        assert!(*reached.lock());
    }

    // ===== Receivers =====

    #[test]
    fn test_receive_string() {
        let name = to_wide("Version");
        let got = receive_string(|rx| unsafe { rx(name.as_ptr()) });
        assert_eq!(got.as_deref(), Some("Version"));
        assert_eq!(receive_string(|_| {}), None);
    }

    #[test]
    fn test_receivers_are_reentrant() {
        let outer_name = to_wide("outer");
        let inner_name = to_wide("inner");
        let got = receive_string(|rx| {
            unsafe { rx(outer_name.as_ptr()) };
            let nested = receive_string(|rx| unsafe { rx(inner_name.as_ptr()) });
            assert_eq!(nested.as_deref(), Some("inner"));
        });
        assert_eq!(got.as_deref(), Some("outer"));
    }

    #[test]
    fn test_receive_value() {
        let variant = Variant::encode(&Value::from(12)).unwrap();
        let got = receive_value(|rx| unsafe { rx(&variant) }).unwrap();
        assert_eq!(got.value, Ok(Value::Number(12.0)));
        assert!(!got.empty);

        let empty = Variant::empty();
        let got = receive_value(|rx| unsafe { rx(&empty) }).unwrap();
        assert!(got.empty);

        let got = receive_value(|rx| unsafe { rx(ptr::null()) }).unwrap();
        assert_eq!(got.value, Ok(Value::Undefined));
        assert!(got.empty);
    }

    #[test]
    fn test_by_ref_wrapper_is_not_empty() {
        let wrapper = Variant::by_ref(Variant::empty());
        let got = receive_value(|rx| unsafe { rx(&wrapper) }).unwrap();
        assert_eq!(got.value, Ok(Value::Undefined));
        assert!(!got.empty);
    }
}

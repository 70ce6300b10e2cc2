//! Mock add-in proxy
//!
//! The seventeen proxy exports written as `extern "system"` functions over a
//! boxed `MockObject` behind the handle. The object models a small
//! calculator:
//!
//! | ordinal | property | access |
//! |---|---|---|
//! | 0 | Version / Версия | read |
//! | 1 | Counter / Счетчик | read, write |
//! | 2 | Label / Метка | read, write |
//!
//! | ordinal | method | params | returns | behaviour |
//! |---|---|---|---|---|
//! | 0 | Reset | 0 | no | counter = 0, status "reset" |
//! | 1 | Add | 2 (b = 10) | yes | a + b |
//! | 2 | Swap | 2 | no | swaps its arguments in place |
//! | 3 | Fail | 0 | yes | delivers 99, reports failure |
//! | 4 | Notify | 3 | no | raises an event from its arguments |
//! | 5 | Raise | 1 | no | raises an error with the given code |
//! | 6 | Describe | 1 | yes | variant tag of its argument |
//! | 7 | Log | 2 (level = "info") | no | records its arguments |
//! | 8 | Wrap | 1 | no | replaces its argument with a by-reference `<arg>` |

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use addin_ffi::callback::ADDIN_E_FAIL;
use addin_ffi::proxy::{
    ErrorCallback, EventCallback, ObjectPtr, ProxyFunctions, StatusCallback, StringReceiver,
    VariantReceiver,
};
use addin_ffi::wide::{from_wide_ptr, to_wide, WChar};
use addin_ffi::{Component, ModuleHandle, ProxyTable, Variant};
use addin_sdk::Value;
use parking_lot::Mutex;

pub const CLASS_NAME: &str = "Calculator";

const PROPERTIES: [(&str, &str, bool); 3] = [
    ("Version", "Версия", false),
    ("Counter", "Счетчик", true),
    ("Label", "Метка", true),
];

/// `(name, alias, params, returns)`
const METHODS: [(&str, &str, i32, bool); 9] = [
    ("Reset", "Сбросить", 0, false),
    ("Add", "Сложить", 2, true),
    ("Swap", "Поменять", 2, false),
    ("Fail", "Сбой", 0, true),
    ("Notify", "Оповестить", 3, false),
    ("Raise", "ВызватьОшибку", 1, false),
    ("Describe", "Описать", 1, true),
    ("Log", "Журнал", 2, false),
    ("Wrap", "Обернуть", 1, false),
];

pub const RESET: usize = 0;
pub const ADD: usize = 1;
pub const SWAP: usize = 2;
pub const FAIL: usize = 3;
pub const NOTIFY: usize = 4;
pub const RAISE: usize = 5;
pub const DESCRIBE: usize = 6;
pub const LOG: usize = 7;
pub const WRAP: usize = 8;

/// What the mock saw
#[derive(Debug, Default)]
pub struct Journal {
    pub created: usize,
    pub destroyed: usize,
    /// `(method, param)` for every default-value query
    pub default_queries: Vec<(i32, i32)>,
    /// Method names in call order
    pub calls: Vec<String>,
    /// Arguments of the last call, as the native side decoded them
    pub last_args: Vec<Value>,
    /// Callbacks handed to each created object, in creation order
    pub callbacks: Vec<(ErrorCallback, EventCallback, StatusCallback)>,
}

/// Passed as the module handle
pub struct MockModule {
    pub journal: Arc<Mutex<Journal>>,
    pub panic_on_destroy: bool,
}

struct MockObject {
    journal: Arc<Mutex<Journal>>,
    panic_on_destroy: bool,
    counter: Cell<f64>,
    label: RefCell<String>,
    error: ErrorCallback,
    event: EventCallback,
    status: StatusCallback,
}

impl MockObject {
    fn fire_status(&self, text: &str) {
        let text = to_wide(text);
        unsafe { (self.status)(text.as_ptr()) };
    }
}

unsafe fn object<'a>(ptr: ObjectPtr) -> &'a MockObject {
    &*(ptr as *const MockObject)
}

fn deliver(rx: VariantReceiver, value: &Value) {
    let variant = Variant::encode(value).unwrap();
    unsafe { rx(&variant) };
}

fn deliver_name(rx: StringReceiver, name: &str) {
    let wide = to_wide(name);
    unsafe { rx(wide.as_ptr()) };
}

fn lookup(name: *const WChar, table: impl Iterator<Item = (&'static str, &'static str)>) -> i32 {
    let name = unsafe { from_wide_ptr(name) }.to_lowercase();
    table
        .enumerate()
        .find(|(_, (en, alias))| en.to_lowercase() == name || alias.to_lowercase() == name)
        .map_or(-1, |(i, _)| i as i32)
}

unsafe fn slots<'a>(args: *mut Variant, count: i32) -> &'a mut [Variant] {
    if args.is_null() || count <= 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(args, count as usize)
    }
}

// ============================================================================
// Exports
// ============================================================================

unsafe extern "system" fn get_class_object(
    module: *mut c_void,
    name: *const WChar,
    error: ErrorCallback,
    event: EventCallback,
    status: StatusCallback,
) -> ObjectPtr {
    let module = &*(module as *const MockModule);
    if from_wide_ptr(name) != CLASS_NAME {
        return ptr::null_mut();
    }
    {
        let mut journal = module.journal.lock();
        journal.created += 1;
        journal.callbacks.push((error, event, status));
    }
    let object = MockObject {
        journal: module.journal.clone(),
        panic_on_destroy: module.panic_on_destroy,
        counter: Cell::new(0.0),
        label: RefCell::new(String::new()),
        error,
        event,
        status,
    };
    object.fire_status("loading");
    Box::into_raw(Box::new(object)).cast()
}

unsafe extern "system-unwind" fn destroy_object(ptr: ObjectPtr) {
    let object = Box::from_raw(ptr as *mut MockObject);
    object.journal.lock().destroyed += 1;
    if object.panic_on_destroy {
        panic!("native destroy failed");
    }
}

unsafe extern "system" fn get_n_props(_: ObjectPtr) -> i32 {
    PROPERTIES.len() as i32
}

unsafe extern "system" fn find_prop(_: ObjectPtr, name: *const WChar) -> i32 {
    lookup(name, PROPERTIES.iter().map(|(en, alias, _)| (*en, *alias)))
}

unsafe extern "system" fn is_prop_readable(_: ObjectPtr, ordinal: i32) -> bool {
    (0..PROPERTIES.len() as i32).contains(&ordinal)
}

unsafe extern "system" fn is_prop_writable(_: ObjectPtr, ordinal: i32) -> bool {
    PROPERTIES.get(ordinal as usize).is_some_and(|(_, _, writable)| *writable)
}

unsafe extern "system" fn get_prop_name(_: ObjectPtr, ordinal: i32, slot: i32, rx: StringReceiver) {
    if let Some((en, alias, _)) = PROPERTIES.get(ordinal as usize) {
        deliver_name(rx, if slot == 0 { en } else { alias });
    }
}

unsafe extern "system" fn get_prop_val(ptr: ObjectPtr, ordinal: i32, rx: VariantReceiver) {
    let object = object(ptr);
    match ordinal {
        0 => deliver(rx, &Value::from("1.0")),
        1 => deliver(rx, &Value::Number(object.counter.get())),
        2 => {
            let label = object.label.borrow().clone();
            deliver(rx, &Value::String(label));
        }
        _ => {}
    }
}

unsafe extern "system" fn set_prop_val(ptr: ObjectPtr, ordinal: i32, value: *mut Variant) {
    let object = object(ptr);
    let value = (*value).decode().unwrap_or(Value::Undefined);
    match ordinal {
        1 => object.counter.set(value.as_number().unwrap_or(0.0)),
        2 => *object.label.borrow_mut() = value.as_str().unwrap_or_default().to_string(),
        _ => {}
    }
}

unsafe extern "system" fn get_n_methods(_: ObjectPtr) -> i32 {
    METHODS.len() as i32
}

unsafe extern "system" fn find_method(_: ObjectPtr, name: *const WChar) -> i32 {
    lookup(name, METHODS.iter().map(|(en, alias, _, _)| (*en, *alias)))
}

unsafe extern "system" fn get_method_name(_: ObjectPtr, ordinal: i32, slot: i32, rx: StringReceiver) {
    if let Some((en, alias, _, _)) = METHODS.get(ordinal as usize) {
        deliver_name(rx, if slot == 0 { en } else { alias });
    }
}

unsafe extern "system" fn get_n_params(_: ObjectPtr, ordinal: i32) -> i32 {
    METHODS.get(ordinal as usize).map_or(0, |(_, _, params, _)| *params)
}

unsafe extern "system" fn get_param_def_value(
    ptr: ObjectPtr,
    ordinal: i32,
    param: i32,
    rx: VariantReceiver,
) {
    object(ptr).journal.lock().default_queries.push((ordinal, param));
    match (ordinal as usize, param) {
        (ADD, 1) => deliver(rx, &Value::from(10)),
        (LOG, 1) => deliver(rx, &Value::from("info")),
        // Explicitly empty: no default
        (ADD, 0) => deliver(rx, &Value::Undefined),
        _ => {}
    }
}

unsafe extern "system" fn has_ret_val(_: ObjectPtr, ordinal: i32) -> bool {
    METHODS.get(ordinal as usize).is_some_and(|(_, _, _, returns)| *returns)
}

unsafe extern "system" fn call_as_proc(ptr: ObjectPtr, ordinal: i32, args: *mut Variant) {
    invoke(object(ptr), ordinal, args);
}

unsafe extern "system" fn call_as_func(
    ptr: ObjectPtr,
    ordinal: i32,
    args: *mut Variant,
    rx: VariantReceiver,
) -> bool {
    let (ok, result) = invoke(object(ptr), ordinal, args);
    if let Some(result) = result {
        deliver(rx, &result);
    }
    ok
}

unsafe fn invoke(object: &MockObject, ordinal: i32, args: *mut Variant) -> (bool, Option<Value>) {
    let Some((name, _, params, _)) = METHODS.get(ordinal as usize) else {
        return (false, None);
    };
    let slots = slots(args, *params);
    let decoded: Vec<Value> = slots
        .iter()
        .map(|slot| slot.decode().unwrap_or(Value::Undefined))
        .collect();
    {
        let mut journal = object.journal.lock();
        journal.calls.push(name.to_string());
        journal.last_args = decoded.clone();
    }

    match ordinal as usize {
        RESET => {
            object.counter.set(0.0);
            object.fire_status("reset");
            (true, None)
        }
        ADD => match (decoded[0].as_number(), decoded[1].as_number()) {
            (Some(a), Some(b)) => (true, Some(Value::Number(a + b))),
            _ => (false, None),
        },
        SWAP => {
            slots.swap(0, 1);
            (true, None)
        }
        FAIL => (false, Some(Value::from(99))),
        NOTIFY => {
            let text: Vec<Vec<WChar>> = decoded
                .iter()
                .map(|v| to_wide(v.as_str().unwrap_or_default()))
                .collect();
            (object.event)(text[0].as_ptr(), text[1].as_ptr(), text[2].as_ptr());
            (true, None)
        }
        RAISE => {
            let code = decoded[0].as_number().unwrap_or(0.0) as u16;
            let source = to_wide(CLASS_NAME);
            let description = to_wide("raised on request");
            (object.error)(code, source.as_ptr(), description.as_ptr(), 42);
            (true, None)
        }
        DESCRIBE => (true, Some(Value::Number(slots[0].vt() as f64))),
        LOG => (true, None),
        WRAP => {
            let text = format!("<{}>", decoded[0].as_str().unwrap_or_default());
            let target = Variant::encode(&Value::String(text)).unwrap();
            // Dropping the caller's variant releases it
            slots[0] = Variant::by_ref(target);
            (true, None)
        }
        _ => {
            let description = to_wide("unknown method");
            (object.error)(ADDIN_E_FAIL, ptr::null(), description.as_ptr(), 0);
            (false, None)
        }
    }
}

/// The mock's function table
pub fn mock_functions() -> ProxyFunctions {
    ProxyFunctions {
        get_class_object,
        destroy_object,
        get_n_props,
        find_prop,
        is_prop_readable,
        is_prop_writable,
        get_prop_name,
        get_prop_val,
        set_prop_val,
        get_n_methods,
        find_method,
        get_method_name,
        get_n_params,
        get_param_def_value,
        has_ret_val,
        call_as_proc,
        call_as_func,
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// Mock module plus a table driving it
pub struct Fixture {
    module: Box<MockModule>,
    pub journal: Arc<Mutex<Journal>>,
    pub proxy: Arc<ProxyTable>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Destroy entry point panics
    pub fn panicking() -> Self {
        Self::build(true)
    }

    fn build(panic_on_destroy: bool) -> Self {
        let journal = Arc::new(Mutex::new(Journal::default()));
        Self {
            module: Box::new(MockModule {
                journal: journal.clone(),
                panic_on_destroy,
            }),
            journal,
            proxy: Arc::new(ProxyTable::from_functions(mock_functions()).with_tracing(true)),
        }
    }

    pub fn module(&self) -> ModuleHandle {
        let raw = &*self.module as *const MockModule as *mut c_void;
        unsafe { ModuleHandle::from_raw(raw) }
    }

    /// Callbacks the `index`-th created object received
    pub fn callbacks(&self, index: usize) -> (ErrorCallback, EventCallback, StatusCallback) {
        self.journal.lock().callbacks[index]
    }

    pub fn create(&self) -> Component {
        Component::create(self.proxy.clone(), self.module(), CLASS_NAME).unwrap()
    }
}

//! Variant - the tagged union of the add-in ABI
//!
//! A [`Variant`] is bit-compatible with the native `tVariant`: a 40-byte value
//! union, an element count and a 16-bit type tag, 48 bytes in total on 64-bit
//! targets.
//!
//! ```text
//! offset  0  value union   i32 | bool | f64 | tm | (wchar*, len) | (char*, len) | Variant*
//! offset 40  cbElements    u32
//! offset 44  vt            u16   (VTYPE_* tag, optionally | VTYPE_BYREF)
//! ```
//!
//! # Memory
//!
//! Strings, blobs and by-reference targets live on the C heap so the native
//! side can free or replace them with the same allocator. A variant that owns
//! heap memory must be released exactly once; [`Variant::release`] resets the
//! variant to empty, which makes a repeated release a no-op. Dropping a
//! `Variant` releases it.
//!
//! Variants delivered by the native side through out-callbacks stay owned by
//! the native side: they are decoded in place and never released here.
//!
//! # Lossy conversions
//!
//! - 64-bit integers beyond ±2^53 lose precision when widened to `f64`
//! - dates carry whole seconds; sub-second parts are dropped on encode
//! - a `tm` that names no calendar date decodes to `Undefined`

use std::alloc::{handle_alloc_error, Layout};
use std::mem::size_of;
use std::ptr;

use addin_sdk::{BridgeError, BridgeResult, Value};
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::wide::{self, WChar};

// Type tags (TYPEVAR)
pub const VTYPE_EMPTY: u16 = 0;
pub const VTYPE_NULL: u16 = 1;
pub const VTYPE_I2: u16 = 2;
pub const VTYPE_I4: u16 = 3;
pub const VTYPE_R4: u16 = 4;
pub const VTYPE_R8: u16 = 5;
pub const VTYPE_DATE: u16 = 6;
pub const VTYPE_TM: u16 = 7;
pub const VTYPE_PSTR: u16 = 8;
pub const VTYPE_ERROR: u16 = 10;
pub const VTYPE_BOOL: u16 = 11;
pub const VTYPE_VARIANT: u16 = 12;
pub const VTYPE_I1: u16 = 13;
pub const VTYPE_UI1: u16 = 14;
pub const VTYPE_UI2: u16 = 15;
pub const VTYPE_UI4: u16 = 16;
pub const VTYPE_I8: u16 = 17;
pub const VTYPE_UI8: u16 = 18;
pub const VTYPE_INT: u16 = 19;
pub const VTYPE_UINT: u16 = 20;
pub const VTYPE_HRESULT: u16 = 21;
pub const VTYPE_PWSTR: u16 = 22;
pub const VTYPE_BLOB: u16 = 23;
pub const VTYPE_BYREF: u16 = 0x4000;
pub const VTYPE_TYPEMASK: u16 = 0x0fff;

/// Broken-down calendar time (`struct tm`, nine `int` fields).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeTm {
    pub tm_sec: i32,
    pub tm_min: i32,
    pub tm_hour: i32,
    pub tm_mday: i32,
    /// Months since January, 0-11
    pub tm_mon: i32,
    /// Years since 1900
    pub tm_year: i32,
    /// Days since Sunday, 0-6
    pub tm_wday: i32,
    /// Days since January 1st, 0-365
    pub tm_yday: i32,
    pub tm_isdst: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct WideStr {
    ptr: *mut WChar,
    len: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct ByteStr {
    ptr: *mut u8,
    len: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
union VariantData {
    i8_val: i8,
    i16_val: i16,
    i32_val: i32,
    i64_val: i64,
    u8_val: u8,
    u16_val: u16,
    u32_val: u32,
    u64_val: u64,
    f32_val: f32,
    f64_val: f64,
    tm_val: NativeTm,
    wstr: WideStr,
    bstr: ByteStr,
    var_ptr: *mut Variant,
    raw: [u64; 5],
}

const ZERO_DATA: VariantData = VariantData { raw: [0; 5] };

/// Native tagged union.
#[repr(C)]
pub struct Variant {
    data: VariantData,
    elements: u32,
    vt: u16,
}

impl Variant {
    /// An empty variant (`VTYPE_EMPTY`)
    pub const fn empty() -> Self {
        Self::tagged(VTYPE_EMPTY, ZERO_DATA)
    }

    const fn tagged(vt: u16, data: VariantData) -> Self {
        Variant {
            data,
            elements: 0,
            vt,
        }
    }

    /// Raw type tag
    #[inline]
    pub fn vt(&self) -> u16 {
        self.vt
    }

    /// Check if the variant holds no value.
    ///
    /// Only `VTYPE_EMPTY` is empty; `VTYPE_NULL` is a real value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vt == VTYPE_EMPTY
    }

    /// Check if the variant is a by-reference wrapper
    #[inline]
    pub fn is_by_ref(&self) -> bool {
        self.vt & VTYPE_BYREF != 0
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode a runtime value.
    ///
    /// Fails with `UnsupportedValueKind` for kinds the ABI cannot carry, or
    /// `ValueTooLarge` for text and blobs past the native element count;
    /// nothing is allocated in either case.
    pub fn encode(value: &Value) -> BridgeResult<Self> {
        let mut data = ZERO_DATA;
        let vt = match value {
            Value::Undefined => VTYPE_EMPTY,
            Value::Null => VTYPE_NULL,
            Value::Boolean(b) => {
                data.u8_val = *b as u8;
                VTYPE_BOOL
            }
            Value::Number(n) => {
                if is_i32(*n) {
                    data.i32_val = *n as i32;
                    VTYPE_I4
                } else {
                    data.f64_val = *n;
                    VTYPE_R8
                }
            }
            Value::Date(d) => {
                data.tm_val = tm_from_date(d);
                VTYPE_TM
            }
            Value::String(s) => {
                let (ptr, len) = wide::alloc_wide(s)?;
                data.wstr = WideStr { ptr, len };
                VTYPE_PWSTR
            }
            Value::Binary(bytes) => {
                let len = wide::element_count(bytes.len())?;
                data.bstr = ByteStr {
                    ptr: wide::alloc_copy(bytes),
                    len,
                };
                VTYPE_BLOB
            }
            Value::Type(_) | Value::Object(_) => {
                return Err(BridgeError::UnsupportedValueKind(value.kind()));
            }
        };
        Ok(Self::tagged(vt, data))
    }

    /// Replace the contents with an encoded value, releasing what was there.
    ///
    /// On failure the variant is left unchanged.
    pub fn assign(&mut self, value: &Value) -> BridgeResult<()> {
        *self = Self::encode(value)?;
        Ok(())
    }

    /// Wrap a variant by reference (`VTYPE_BYREF | VTYPE_VARIANT`).
    ///
    /// The target moves to the C heap and is released with the wrapper.
    pub fn by_ref(target: Variant) -> Self {
        let layout = Layout::new::<Variant>();
        unsafe {
            let raw = libc::malloc(size_of::<Variant>()) as *mut Variant;
            if raw.is_null() {
                handle_alloc_error(layout);
            }
            ptr::write(raw, target);
            let mut data = ZERO_DATA;
            data.var_ptr = raw;
            Self::tagged(VTYPE_BYREF | VTYPE_VARIANT, data)
        }
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Decode into a runtime value. The variant is left untouched.
    pub fn decode(&self) -> BridgeResult<Value> {
        let vt = self.vt;
        if self.is_by_ref() {
            if vt & VTYPE_TYPEMASK != VTYPE_VARIANT {
                return Err(BridgeError::UnsupportedVariantType(vt));
            }
            let target = unsafe { self.data.var_ptr };
            if target.is_null() {
                return Ok(Value::Undefined);
            }
            return unsafe { (*target).decode() };
        }

        let value = unsafe {
            match vt {
                VTYPE_EMPTY => Value::Undefined,
                VTYPE_NULL => Value::Null,
                VTYPE_BOOL => Value::Boolean(self.data.u8_val != 0),
                VTYPE_I1 => Value::Number(self.data.i8_val as f64),
                VTYPE_I2 => Value::Number(self.data.i16_val as f64),
                VTYPE_I4 | VTYPE_INT | VTYPE_ERROR | VTYPE_HRESULT => {
                    Value::Number(self.data.i32_val as f64)
                }
                VTYPE_I8 => Value::Number(self.data.i64_val as f64),
                VTYPE_UI1 => Value::Number(self.data.u8_val as f64),
                VTYPE_UI2 => Value::Number(self.data.u16_val as f64),
                VTYPE_UI4 | VTYPE_UINT => Value::Number(self.data.u32_val as f64),
                VTYPE_UI8 => Value::Number(self.data.u64_val as f64),
                VTYPE_R4 => Value::Number(self.data.f32_val as f64),
                VTYPE_R8 => Value::Number(self.data.f64_val),
                VTYPE_TM => date_from_tm(&self.data.tm_val).map_or(Value::Undefined, Value::Date),
                VTYPE_DATE => date_from_ole(self.data.f64_val).map_or(Value::Undefined, Value::Date),
                VTYPE_PWSTR => {
                    let s = self.data.wstr;
                    Value::String(wide::from_wide_parts(s.ptr, s.len as usize))
                }
                VTYPE_PSTR => Value::String(String::from_utf8_lossy(self.bytes()).into_owned()),
                VTYPE_BLOB => Value::Binary(self.bytes().to_vec()),
                other => return Err(BridgeError::UnsupportedVariantType(other)),
            }
        };
        Ok(value)
    }

    /// # Safety
    /// The variant must be `VTYPE_PSTR` or `VTYPE_BLOB`.
    unsafe fn bytes(&self) -> &[u8] {
        let b = self.data.bstr;
        if b.ptr.is_null() || b.len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(b.ptr, b.len as usize)
        }
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Free any heap memory the variant owns and reset it to empty.
    pub fn release(&mut self) {
        let vt = self.vt;
        unsafe {
            if self.is_by_ref() {
                // Only variant targets have a known owner.
                let target = self.data.var_ptr;
                if vt & VTYPE_TYPEMASK == VTYPE_VARIANT && !target.is_null() {
                    ptr::drop_in_place(target);
                    libc::free(target.cast());
                }
            } else {
                match vt {
                    VTYPE_PWSTR => free_raw(self.data.wstr.ptr),
                    VTYPE_PSTR | VTYPE_BLOB => free_raw(self.data.bstr.ptr),
                    _ => {}
                }
            }
        }
        self.data = ZERO_DATA;
        self.elements = 0;
        self.vt = VTYPE_EMPTY;
    }
}

unsafe fn free_raw<T>(ptr: *mut T) {
    if !ptr.is_null() {
        libc::free(ptr.cast());
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variant")
            .field("vt", &format_args!("{:#06x}", self.vt))
            .field("elements", &self.elements)
            .finish()
    }
}

fn is_i32(n: f64) -> bool {
    n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64
}

fn tm_from_date(d: &NaiveDateTime) -> NativeTm {
    NativeTm {
        tm_sec: d.second() as i32,
        tm_min: d.minute() as i32,
        tm_hour: d.hour() as i32,
        tm_mday: d.day() as i32,
        tm_mon: d.month0() as i32,
        tm_year: d.year() - 1900,
        tm_wday: d.weekday().num_days_from_sunday() as i32,
        tm_yday: d.ordinal0() as i32,
        tm_isdst: 0,
    }
}

fn date_from_tm(tm: &NativeTm) -> Option<NaiveDateTime> {
    let year = tm.tm_year.checked_add(1900)?;
    let month = u32::try_from(tm.tm_mon.checked_add(1)?).ok()?;
    let day = u32::try_from(tm.tm_mday).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(
        u32::try_from(tm.tm_hour).ok()?,
        u32::try_from(tm.tm_min).ok()?,
        u32::try_from(tm.tm_sec).ok()?,
    )
}

/// OLE automation date: days since 1899-12-30, fraction is time of day.
fn date_from_ole(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = TimeDelta::try_seconds((days * 86_400.0).round() as i64)?;
    epoch.checked_add_signed(seconds)
}

// ============================================================================
// VariantBlock
// ============================================================================

/// Contiguous argument block of `len` variants on the C heap.
///
/// Slots start empty. Dropping the block releases every slot and frees the
/// memory, whatever happened in between.
pub struct VariantBlock {
    ptr: *mut Variant,
    len: usize,
}

impl VariantBlock {
    /// Allocate a zeroed block. No memory is allocated for `len == 0`.
    pub fn new(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: ptr::null_mut(),
                len: 0,
            };
        }
        let raw = unsafe { libc::calloc(len, size_of::<Variant>()) } as *mut Variant;
        if raw.is_null() {
            handle_alloc_error(Layout::array::<Variant>(len).unwrap_or(Layout::new::<Variant>()));
        }
        Self { ptr: raw, len }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the block has no slots
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer handed to the native side (null for an empty block)
    pub fn as_mut_ptr(&mut self) -> *mut Variant {
        self.ptr
    }

    /// View the slots
    pub fn slots(&self) -> &[Variant] {
        if self.ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// View the slots mutably
    pub fn slots_mut(&mut self) -> &mut [Variant] {
        if self.ptr.is_null() {
            &mut []
        } else {
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }

    /// Encode values into the slots in ordinal order.
    ///
    /// Stops at the first value that cannot be encoded; slots populated so far
    /// stay owned by the block and are released with it.
    pub fn fill(&mut self, values: &[Value]) -> BridgeResult<()> {
        for (slot, value) in self.slots_mut().iter_mut().zip(values) {
            slot.assign(value)?;
        }
        Ok(())
    }

    /// Decode every slot back into the caller's arguments.
    ///
    /// Every slot is attempted; the first decode failure is returned.
    pub fn read_back(&self, args: &mut [Option<Value>]) -> BridgeResult<()> {
        let mut first_error = None;
        for (slot, arg) in self.slots().iter().zip(args.iter_mut()) {
            match slot.decode() {
                Ok(value) => *arg = Some(value),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Release every slot
    pub fn release_all(&mut self) {
        for slot in self.slots_mut() {
            slot.release();
        }
    }
}

impl Drop for VariantBlock {
    fn drop(&mut self) {
        self.release_all();
        if !self.ptr.is_null() {
            unsafe { libc::free(self.ptr.cast()) };
        }
    }
}

impl std::fmt::Debug for VariantBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantBlock")
            .field("len", &self.len)
            .finish()
    }
}

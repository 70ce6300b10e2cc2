//! UTF-16 strings at the native boundary
//!
//! The add-in ABI passes text as NUL-terminated UTF-16 (`WCHAR_T`), on every
//! platform. Strings owned by variants live on the C heap.

use std::alloc::{handle_alloc_error, Layout};
use std::ptr;

use addin_sdk::{BridgeError, BridgeResult};

/// Native wide character
pub type WChar = u16;

/// Encode a string as NUL-terminated UTF-16
pub fn to_wide(s: &str) -> Vec<WChar> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode a NUL-terminated UTF-16 string. A null pointer decodes as empty.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated UTF-16 sequence.
pub unsafe fn from_wide_ptr(ptr: *const WChar) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    from_wide_parts(ptr, len)
}

/// Decode `len` UTF-16 units. A null pointer decodes as empty.
///
/// # Safety
/// `ptr` must be null or valid for reads of `len` units.
pub unsafe fn from_wide_parts(ptr: *const WChar, len: usize) -> String {
    if ptr.is_null() || len == 0 {
        return String::new();
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}

/// Copy a string to the C heap as NUL-terminated UTF-16.
///
/// Returns the pointer and the length in units, terminator excluded. The
/// memory must be released with `libc::free`. Fails with `ValueTooLarge`,
/// allocating nothing, if the length does not fit the native count.
pub fn alloc_wide(s: &str) -> BridgeResult<(*mut WChar, u32)> {
    let units = to_wide(s);
    let len = element_count(units.len() - 1)?;
    Ok((alloc_copy(&units), len))
}

/// Native element count for `len` units
pub(crate) fn element_count(len: usize) -> BridgeResult<u32> {
    u32::try_from(len).map_err(|_| BridgeError::ValueTooLarge(len))
}

/// Copy a slice to the C heap. Empty slices yield a null pointer.
pub(crate) fn alloc_copy<T: Copy>(items: &[T]) -> *mut T {
    if items.is_empty() {
        return ptr::null_mut();
    }
    let size = std::mem::size_of_val(items);
    unsafe {
        let raw = libc::malloc(size) as *mut T;
        if raw.is_null() {
            handle_alloc_error(Layout::for_value(items));
        }
        ptr::copy_nonoverlapping(items.as_ptr(), raw, items.len());
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wide_is_terminated() {
        assert_eq!(to_wide("ab"), vec![b'a' as u16, b'b' as u16, 0]);
        assert_eq!(to_wide(""), vec![0]);
    }

    #[test]
    fn test_from_wide_ptr() {
        let wide = to_wide("Привет, мир");
        assert_eq!(unsafe { from_wide_ptr(wide.as_ptr()) }, "Привет, мир");
        assert_eq!(unsafe { from_wide_ptr(ptr::null()) }, "");
    }

    #[test]
    fn test_from_wide_parts_stops_at_len() {
        let wide = to_wide("abcdef");
        assert_eq!(unsafe { from_wide_parts(wide.as_ptr(), 3) }, "abc");
        assert_eq!(unsafe { from_wide_parts(ptr::null(), 3) }, "");
    }

    #[test]
    fn test_alloc_wide_roundtrip() {
        let (ptr, len) = alloc_wide("add-in").unwrap();
        assert_eq!(len, 6);
        unsafe {
            assert_eq!(*ptr.add(6), 0);
            assert_eq!(from_wide_parts(ptr, len as usize), "add-in");
            libc::free(ptr.cast());
        }
    }

    #[test]
    fn test_surrogate_pairs_survive() {
        let text = "emoji 😀";
        let (ptr, len) = alloc_wide(text).unwrap();
        assert_eq!(len as usize, text.encode_utf16().count());
        unsafe {
            assert_eq!(from_wide_ptr(ptr), text);
            libc::free(ptr.cast());
        }
    }

    #[test]
    fn test_element_count_limit() {
        assert_eq!(element_count(0).unwrap(), 0);
        assert_eq!(element_count(u32::MAX as usize).unwrap(), u32::MAX);

        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            element_count(u32::MAX as usize + 1).unwrap_err(),
            BridgeError::ValueTooLarge(u32::MAX as usize + 1)
        );
    }
}

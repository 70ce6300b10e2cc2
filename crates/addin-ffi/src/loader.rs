//! Proxy library loading
//!
//! Cross-platform loading of the proxy shared library (.so, .dylib, .dll) and
//! resolution of its seventeen exported functions into a [`ProxyTable`].

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use addin_sdk::BridgeError;
use thiserror::Error;
use tracing::debug;

use crate::config::ProxyOptions;
use crate::proxy::{ProxyFunctions, ProxyTable};

/// Default proxy library file name for this platform
#[cfg(windows)]
pub const DEFAULT_LIBRARY: &str = "addin_proxy.dll";
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY: &str = "libaddin_proxy.dylib";
#[cfg(all(unix, not(target_os = "macos")))]
pub const DEFAULT_LIBRARY: &str = "libaddin_proxy.so";

/// Errors raised while loading the proxy
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the platform's reason
        path: String,
    },

    /// Exported function missing from the library
    #[error("symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name
        symbol: String,
        /// Library path
        library: String,
    },

    /// Path is not valid UTF-8
    #[error("invalid UTF-8 in path: {0}")]
    InvalidPath(String),

    /// Platform-specific error
    #[error("platform error: {0}")]
    Platform(String),
}

impl From<LoadError> for BridgeError {
    fn from(err: LoadError) -> Self {
        BridgeError::Load(err.to_string())
    }
}

// ============================================================================
// Library
// ============================================================================

/// Loaded shared library, unloaded on drop
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Load a shared library.
    ///
    /// - **Linux / macOS**: `dlopen(RTLD_NOW | RTLD_LOCAL)`
    /// - **Windows**: `LoadLibraryW`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;
        debug!(library = path_str, "loaded proxy library");

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Resolve an exported symbol.
    ///
    /// # Safety
    /// `T` must be a function pointer type matching the export, and the
    /// library must outlive every copy of the returned pointer.
    pub unsafe fn get<T: Copy>(&self, symbol: &str) -> Result<T, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

impl ProxyTable {
    /// Load the proxy named by `options`, or the platform default
    pub fn load(options: &ProxyOptions) -> Result<Self, LoadError> {
        let library = match &options.library {
            Some(path) => Library::open(path)?,
            None => Library::open(DEFAULT_LIBRARY)?,
        };
        Ok(Self::from_library(Arc::new(library))?.with_tracing(options.trace_calls))
    }

    /// Resolve every proxy export from an open library.
    ///
    /// The table keeps the library loaded.
    pub fn from_library(library: Arc<Library>) -> Result<Self, LoadError> {
        let functions = unsafe {
            ProxyFunctions {
                get_class_object: library.get("GetClassObject")?,
                destroy_object: library.get("DestroyObject")?,
                get_n_props: library.get("GetNProps")?,
                find_prop: library.get("FindProp")?,
                is_prop_readable: library.get("IsPropReadable")?,
                is_prop_writable: library.get("IsPropWritable")?,
                get_prop_name: library.get("GetPropName")?,
                get_prop_val: library.get("GetPropVal")?,
                set_prop_val: library.get("SetPropVal")?,
                get_n_methods: library.get("GetNMethods")?,
                find_method: library.get("FindMethod")?,
                get_method_name: library.get("GetMethodName")?,
                get_n_params: library.get("GetNParams")?,
                get_param_def_value: library.get("GetParamDefValue")?,
                has_ret_val: library.get("HasRetVal")?,
                call_as_proc: library.get("CallAsProc")?,
                call_as_func: library.get("CallAsFunc")?,
            }
        };
        debug!(library = library.path(), "resolved proxy exports");
        Ok(Self::with_library(functions, library))
    }
}

// Platform-specific implementations

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path =
            CString::new(path).map_err(|e| LoadError::Platform(format!("invalid path: {}", e)))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, unsafe { last_dl_error() }),
            });
        }

        Ok(UnixLibrary { handle })
    }

    unsafe fn symbol<T: Copy>(&self, name: &str, lib_path: &str) -> Result<T, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::Platform(format!("invalid symbol name: {}", e)))?;

        // Clear stale errors
        libc::dlerror();
        let symbol = libc::dlsym(self.handle, c_name.as_ptr());

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, last_dl_error()),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(unix)]
unsafe fn last_dl_error() -> String {
    let err_ptr = libc::dlerror();
    if err_ptr.is_null() {
        "unknown error".to_string()
    } else {
        std::ffi::CStr::from_ptr(err_ptr).to_string_lossy().into_owned()
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let wide = crate::wide::to_wide(path);
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    unsafe fn symbol<T: Copy>(&self, name: &str, lib_path: &str) -> Result<T, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::Platform(format!("invalid symbol name: {}", e)))?;

        let symbol = GetProcAddress(self.handle, c_name.as_ptr());

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, GetLastError()),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(module: *mut std::ffi::c_void, procname: *const i8) -> *mut std::ffi::c_void;
    fn FreeLibrary(module: *mut std::ffi::c_void) -> i32;
    fn GetLastError() -> u32;
}

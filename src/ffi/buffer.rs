// src/ffi/buffer.rs
// =============================================================================
// ENGINE RESPONSE BUFFERS
// =============================================================================
// Every engine entry point that produces data hands back a heap-allocated,
// NUL-terminated UTF-8 string that the caller owns and must give back to the
// engine's matching `*_free` function exactly once.
//
// `EngineBuffer` takes that ownership at the moment the pointer crosses the
// boundary and releases it in `Drop`, so success paths, error paths, early
// returns and panics all free the buffer once and only once.
// -----------------------------------------------------------------------------

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr::NonNull;
use std::str::Utf8Error;

/// Engine-side deallocator for a returned string
pub type ReleaseFn = unsafe extern "C" fn(*mut c_char);

/// Owned engine response buffer, released exactly once on drop
pub struct EngineBuffer {
    ptr: NonNull<c_char>,
    release: ReleaseFn,
}

// The buffer is a plain heap allocation; moving it across threads is fine as
// long as it is released once, which `Drop` guarantees.
unsafe impl Send for EngineBuffer {}

impl EngineBuffer {
    /// Take ownership of a string returned by the engine.
    ///
    /// Returns `None` for a null pointer (nothing to release).
    ///
    /// # Safety
    /// `ptr` must be null or a NUL-terminated string that has not been freed
    /// yet and that `release` is the correct deallocator for.
    pub unsafe fn from_raw(ptr: *mut c_char, release: ReleaseFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, release })
    }

    /// Allocate a buffer on the Rust side, for bridges that run in-process.
    ///
    /// Returns `None` if `body` contains an interior NUL byte.
    pub fn from_string(body: String) -> Option<Self> {
        let c_string = CString::new(body).ok()?;
        // SAFETY: pointer comes straight from `CString::into_raw` and is
        // paired with the matching `CString::from_raw` deallocator.
        unsafe { Self::from_raw(c_string.into_raw(), release_rust_string) }
    }

    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        // SAFETY: `ptr` is non-null and NUL-terminated per `from_raw` contract,
        // and stays alive until `self` is dropped.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }.to_str()
    }
}

impl Drop for EngineBuffer {
    fn drop(&mut self) {
        // SAFETY: ownership was transferred to us exactly once in `from_raw`.
        unsafe { (self.release)(self.ptr.as_ptr()) }
    }
}

impl std::fmt::Debug for EngineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuffer").field("ptr", &self.ptr).finish()
    }
}

/// Deallocator for buffers created with [`EngineBuffer::from_string`]
pub unsafe extern "C" fn release_rust_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

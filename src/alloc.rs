//! Allocator / fatal-error facade.
//!
//! Thin wrappers around the host allocator and the process abort path.
//! Every other module in this crate depends only on these two operations;
//! nothing in the runtime ever calls `std::alloc` directly outside this file.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment used for every allocation made through this facade.
///
/// Strict enough for any primitive payload the compiler can emit
/// (covers `i64`/`f64`/pointers on every supported target).
pub const MAX_ALIGN: usize = 16;

/// Allocate `size` bytes, zeroed, aligned to [`MAX_ALIGN`].
///
/// Aborts via [`fatal`] if the allocation cannot be satisfied — callers
/// never have to check for a null pointer.
pub fn raw_alloc(size: usize) -> NonNull<u8> {
    // A zero-sized request still needs a valid, uniquely-addressable
    // pointer (e.g. a unit-like Any payload); round up so Layout stays valid.
    let layout = match Layout::from_size_align(size.max(1), MAX_ALIGN) {
        Ok(layout) => layout,
        Err(_) => fatal(&format!("invalid allocation layout for size {size}")),
    };

    // SAFETY: layout has non-zero size by construction above.
    let ptr = unsafe { alloc_zeroed(layout) };
    match NonNull::new(ptr) {
        Some(ptr) => ptr,
        None => fatal(&format!("out of memory allocating {size} bytes")),
    }
}

/// Free memory previously returned by [`raw_alloc`].
///
/// `size` must be the same value passed to the matching `raw_alloc` call.
///
/// # Safety
/// `ptr` must have come from `raw_alloc(size)` and must not be used again
/// after this call.
pub unsafe fn raw_dealloc(ptr: NonNull<u8>, size: usize) {
    let layout = Layout::from_size_align_unchecked(size.max(1), MAX_ALIGN);
    dealloc(ptr.as_ptr(), layout);
}

/// Print `msg` to the diagnostic sink and terminate the process.
///
/// Never returns. Every precondition violation this runtime detects —
/// retain-count overflow, release below zero, out-of-bounds field access,
/// a cast between mismatched types — funnels through this function.
///
/// Under `#[cfg(test)]` this panics instead of aborting, so that test
/// code can assert fatal conditions with `#[should_panic]` without
/// killing the test process outright; production builds always abort.
pub fn fatal(msg: &str) -> ! {
    eprintln!("fatal error: {msg}");
    eprintln!("{}", std::backtrace::Backtrace::force_capture());

    #[cfg(test)]
    {
        panic!("fatal error: {msg}");
    }

    #[cfg(not(test))]
    {
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_aligned() {
        let ptr = raw_alloc(64);
        assert_eq!(ptr.as_ptr() as usize % MAX_ALIGN, 0);
        let slice = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(slice.iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_size_alloc_returns_valid_pointer() {
        let ptr = raw_alloc(0);
        assert_eq!(ptr.as_ptr() as usize % MAX_ALIGN, 0);
    }
}

//! RefCount Engine — allocation, retain, release, and uniqueness queries
//! for indirectly-stored ("reference") values.
//!
//! A [`RefCountBox`] is a header prefixed to a caller-sized payload in a
//! single allocation. The pointer handed to generated code is always the
//! payload address; the header sits at `payload_ptr - size_of::<RefCountBox>()`.
//! No other addressing convention exists — there is no side table mapping
//! payload pointers to boxes.

use std::alloc::Layout;
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::alloc::fatal;
use crate::safety::{report_violation, SafetyViolation};

/// Deinitializer invoked exactly once, on the release that drops a box's
/// retain count from 1 to 0. Receives the payload pointer, not the header.
pub type Deinitializer = unsafe extern "C" fn(payload: *mut u8);

/// Hidden header prepended to every indirectly-allocated value.
///
/// `deinit` and `retain_count` are read and written only while `lock` is
/// held; `lock` itself guards nothing but those two fields plus the moment
/// of deallocation.
pub struct RefCountBox {
    retain_count: u32,
    deinit: Option<Deinitializer>,
    lock: Mutex<()>,
    /// Total size of the header+payload allocation, recorded so `dealloc`
    /// can free with the exact layout `allocate_indirect` used.
    alloc_size: usize,
}

fn layout_for(payload_size: usize) -> (Layout, usize) {
    let header_layout = Layout::new::<RefCountBox>();
    let payload_layout = Layout::from_size_align(payload_size.max(1), header_layout.align())
        .unwrap_or_else(|_| fatal(&format!("invalid payload layout for size {payload_size}")));
    let (combined, payload_offset) = header_layout
        .extend(payload_layout)
        .unwrap_or_else(|_| fatal("refcount box layout overflowed"));
    (combined.pad_to_align(), payload_offset)
}

/// Allocates `sizeof(RefCountBox) + size` bytes and constructs the header
/// in place with `retain_count == 0` and the supplied deinitializer.
///
/// Returns the payload pointer. The caller owns the first retain — a
/// freshly allocated box is not yet live.
pub fn allocate_indirect(size: usize, deinit: Option<Deinitializer>) -> NonNull<u8> {
    let (layout, payload_offset) = layout_for(size);
    let base = crate::alloc::raw_alloc(layout.size());

    // SAFETY: `base` points to a fresh allocation at least
    // `layout.size()` bytes, correctly aligned for `RefCountBox`.
    unsafe {
        base.cast::<RefCountBox>().as_ptr().write(RefCountBox {
            retain_count: 0,
            deinit,
            lock: Mutex::new(()),
            alloc_size: layout.size(),
        });
    }

    log::debug!("allocate_indirect: size={size} payload_offset={payload_offset}");

    // SAFETY: `payload_offset` was computed by `Layout::extend` over the
    // same header layout, so it stays within the allocation.
    unsafe { NonNull::new_unchecked(base.as_ptr().add(payload_offset)) }
}

/// Recovers the owning box for a non-null payload pointer.
///
/// # Safety
/// `payload` must be a pointer previously returned by [`allocate_indirect`]
/// (directly, or via [`retain`]/[`release`] passing it through), and must
/// not have been released to zero.
unsafe fn box_of(payload: NonNull<u8>) -> *mut RefCountBox {
    let header_size = std::mem::size_of::<RefCountBox>();
    payload.as_ptr().sub(header_size) as *mut RefCountBox
}

/// Retains `payload`, returning the same pointer.
///
/// A null pointer is a no-op that returns null — generated code may call
/// this unconditionally on possibly-nil references.
///
/// # Safety
/// `payload`, if non-null, must be a live pointer from [`allocate_indirect`].
pub unsafe fn retain(payload: *mut u8) -> *mut u8 {
    let Some(payload) = NonNull::new(payload) else {
        return std::ptr::null_mut();
    };
    let b = &mut *box_of(payload);
    let _guard = b.lock.lock();
    if b.retain_count == u32::MAX {
        report_violation(
            SafetyViolation::Overflow,
            "refcount::retain",
            "retain count overflow",
        );
        fatal("retain count overflow");
    }
    b.retain_count += 1;
    log::debug!("retain: payload={:?} retain_count={}", payload, b.retain_count);
    payload.as_ptr()
}

/// Releases `payload`, returning the same pointer.
///
/// A null pointer is a no-op that returns null. If this release drops the
/// count to zero, the deinitializer (if any) runs with the box's mutex
/// already unlocked — a deinitializer may itself release further
/// references, including children stored in the same payload, and must
/// not observe this box locked against itself.
///
/// # Safety
/// `payload`, if non-null, must be a live pointer from [`allocate_indirect`]
/// whose retain count is at least 1.
pub unsafe fn release(payload: *mut u8) -> *mut u8 {
    let Some(payload) = NonNull::new(payload) else {
        return std::ptr::null_mut();
    };
    let b = &mut *box_of(payload);

    let should_dealloc = {
        let _guard = b.lock.lock();
        if b.retain_count == 0 {
            report_violation(
                SafetyViolation::ReleaseBelowZero,
                "refcount::release",
                "attempting to release object with retain count 0",
            );
            fatal("attempting to release object with retain count 0");
        }
        b.retain_count -= 1;
        log::debug!("release: payload={:?} retain_count={}", payload, b.retain_count);
        b.retain_count == 0
        // guard drops here, unlocking before deinit runs
    };

    if should_dealloc {
        dealloc(payload, b);
    }

    payload.as_ptr()
}

/// Runs the deinitializer (if any) and frees the header+payload allocation.
///
/// Must only be called once the box's retain count has reached zero and
/// its mutex has already been released.
unsafe fn dealloc(payload: NonNull<u8>, b: &mut RefCountBox) {
    if b.retain_count > 0 {
        // Internal bug: release() only calls dealloc() once the count is
        // already zero, and nothing else can retain a box at zero count.
        fatal("object deallocated with retain count > 0");
    }

    if let Some(deinit) = b.deinit {
        deinit(payload.as_ptr());
    }

    let header_size = std::mem::size_of::<RefCountBox>();
    let alloc_size = b.alloc_size;
    let base = NonNull::new_unchecked(payload.as_ptr().sub(header_size));
    crate::alloc::raw_dealloc(base, alloc_size);
}

/// Reports whether `payload`'s retain count is exactly 1.
///
/// A null pointer is vacuously unique (returns `true`).
///
/// # Safety
/// `payload`, if non-null, must be a live pointer from [`allocate_indirect`].
pub unsafe fn is_uniquely_referenced(payload: *const u8) -> bool {
    let Some(payload) = NonNull::new(payload as *mut u8) else {
        return true;
    };
    let b = &*box_of(payload);
    let _guard = b.lock.lock();
    b.retain_count == 1
}

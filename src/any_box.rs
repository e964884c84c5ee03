//! Any Box Engine — a heap-allocated, self-describing value container
//! built on top of the [`TypeMetadata`] model.
//!
//! An [`AnyBox`] pairs a `TypeMetadata` pointer with an inline payload of
//! that type's declared size. Generated code obtains raw pointers into
//! the payload and writes through them; this module never inspects the
//! bytes except to memcpy or compare them against zero.

use std::ptr::NonNull;

use crate::alloc::fatal;
use crate::metadata::TypeMetadata;
use crate::safety::{report_violation, SafetyViolation};

/// Heap record pairing a type descriptor with its payload.
///
/// `AnyBox` values are never freed by this engine — the current contract
/// treats `Any` as arena-lifetime. Generated code holds raw pointers to
/// these, never an owning handle.
#[repr(C)]
pub struct AnyBox {
    type_metadata: *const TypeMetadata,
}

impl AnyBox {
    /// Byte address of the payload, immediately following the header.
    fn value_ptr_raw(&self) -> *mut u8 {
        let header_size = std::mem::size_of::<AnyBox>();
        (self as *const AnyBox as *mut u8).wrapping_add(header_size)
    }
}

/// Allocates `sizeof(AnyBox) + type_meta.size_in_bits` bytes and sets the
/// header's type descriptor. The payload is left uninitialized; callers
/// must write through [`value_ptr`] before reading it back.
///
/// # Safety
/// `type_meta` must point to a valid, live `TypeMetadata`.
pub unsafe fn allocate_any(type_meta: *const TypeMetadata) -> NonNull<AnyBox> {
    let size_in_bits = (*type_meta).size_in_bits as usize;
    let full_size = std::mem::size_of::<AnyBox>() + size_in_bits;
    let base = crate::alloc::raw_alloc(full_size);
    let any = base.cast::<AnyBox>();
    any.as_ptr().write(AnyBox { type_metadata: type_meta });
    log::debug!("allocate_any: type={:?} size_in_bits={size_in_bits}", (*type_meta).name);
    any
}

/// Returns the payload address of `any`. No type checking is performed.
///
/// # Safety
/// `any` must point to a valid `AnyBox`.
pub unsafe fn value_ptr(any: *const AnyBox) -> *mut u8 {
    (*any).value_ptr_raw()
}

/// Returns the `TypeMetadata` stored in `any`'s header.
///
/// # Safety
/// `any` must point to a valid `AnyBox`.
pub unsafe fn type_metadata(any: *const AnyBox) -> *const TypeMetadata {
    (*any).type_metadata
}

/// Copies `any` according to its declared type's value/reference semantics.
///
/// Reference-typed Any values are returned unchanged — `copy_any` does not
/// retain the referenced object, so the two handles observably alias the
/// same payload and mutation through either is visible through the other.
/// Value-typed Any values are deep-copied: a new `AnyBox` of the same type
/// is allocated and `size_in_bits` bytes are memcpy'd into it.
///
/// # Safety
/// `any` must point to a valid, fully-initialized `AnyBox`.
pub unsafe fn copy_any(any: *mut AnyBox) -> *mut AnyBox {
    let meta = &*(*any).type_metadata;
    if meta.is_reference_type {
        return any;
    }
    let new_any = allocate_any(meta).as_ptr();
    std::ptr::copy_nonoverlapping(value_ptr(any), value_ptr(new_any), meta.size_in_bits as usize);
    new_any
}

/// Returns a pointer to field `index` inside `any`'s payload.
///
/// If the declared type is a reference type, the payload is first
/// dereferenced once (it holds a pointer to a `RefCountBox` payload) and
/// that pointer must be non-null; otherwise the offset is added directly
/// to the payload address.
///
/// # Safety
/// `any` must point to a valid `AnyBox`; `index` is bounds-checked against
/// the declaring type's field count and fatals otherwise.
pub unsafe fn field_value_ptr(any: *const AnyBox, index: u64) -> *mut u8 {
    let meta = &*(*any).type_metadata;
    let field = meta.field(index);

    let mut base = value_ptr(any);
    if meta.is_reference_type {
        let deref = *(base as *const *mut u8);
        if deref.is_null() {
            report_violation(
                SafetyViolation::NullReferencePayload,
                "any_box::field_value_ptr",
                "dereferenced a reference-typed Any whose stored pointer is null",
            );
            fatal("dereferenced a reference-typed Any whose stored pointer is null");
        }
        base = deref;
    }
    base.add(field.offset)
}

/// Allocates a new `AnyBox` whose type is field `index`'s type and copies
/// that field's bytes out of `any`'s payload. Always an independent Any,
/// even for reference-typed fields — the pointer is copied, not the
/// pointee.
///
/// # Safety
/// `any` must point to a valid `AnyBox`; `index` is bounds-checked.
pub unsafe fn extract_field(any: *const AnyBox, index: u64) -> *mut AnyBox {
    let meta = &*(*any).type_metadata;
    let field = meta.field(index);
    let field_type = &*field.type_metadata;

    let new_any = allocate_any(field.type_metadata).as_ptr();
    let src = field_value_ptr(any, index);
    std::ptr::copy_nonoverlapping(src, value_ptr(new_any), field_type.size_in_bits as usize);
    new_any
}

/// Type-checks `new_value` against field `index`'s declared type (fatal on
/// mismatch, naming both types), then overwrites the field with
/// `new_value`'s payload bytes.
///
/// # Safety
/// `any` and `new_value` must point to valid `AnyBox`es; `index` is
/// bounds-checked.
pub unsafe fn update_field(any: *mut AnyBox, index: u64, new_value: *const AnyBox) {
    let meta = &*(*any).type_metadata;
    let field = meta.field(index);
    let new_type = (*new_value).type_metadata;

    if field.type_metadata != new_type {
        report_cast_error(field.type_metadata, new_type);
    }

    let dest = field_value_ptr(any, index);
    let src = value_ptr(new_value);
    let size = (*new_type).size_in_bits as usize;
    std::ptr::copy_nonoverlapping(src, dest, size);
}

/// Pointer equality between `any`'s declared type and `type_meta`.
///
/// # Safety
/// `any` must point to a valid `AnyBox`.
pub unsafe fn check_type(any: *const AnyBox, type_meta: *const TypeMetadata) -> bool {
    (*any).type_metadata == type_meta
}

/// Returns `value_ptr(any)` if `check_type` holds; otherwise fatals with a
/// message naming both type names.
///
/// # Safety
/// `any` and `type_meta` must be valid.
pub unsafe fn checked_cast(any: *const AnyBox, type_meta: *const TypeMetadata) -> *mut u8 {
    if !check_type(any, type_meta) {
        report_cast_error((*any).type_metadata, type_meta);
    }
    value_ptr(any)
}

/// Nil test, preserving the literal documented contract: a pointer-typed
/// Any (`pointer_level > 0`) is never nil regardless of payload; a
/// non-pointer Any is nil iff the first machine word of its payload is
/// the zero bit pattern.
///
/// # Safety
/// `any` must point to a valid, initialized `AnyBox`.
pub unsafe fn is_nil(any: *const AnyBox) -> bool {
    let meta = &*(*any).type_metadata;
    if meta.pointer_level > 0 {
        return false;
    }
    let word_ptr = value_ptr(any) as *const usize;
    *word_ptr == 0
}

/// Formats `"checked cast failed: cannot convert <from> to <to>"` and
/// fatals. Shared by [`checked_cast`] and [`update_field`].
///
/// # Safety
/// `from`/`to` must be valid `TypeMetadata` pointers.
unsafe fn report_cast_error(from: *const TypeMetadata, to: *const TypeMetadata) -> ! {
    let from_name = (*from).name_str();
    let to_name = (*to).name_str();
    let msg = format!("checked cast failed: cannot convert {from_name} to {to_name}");
    report_violation(SafetyViolation::TypeMismatch, "any_box::report_cast_error", &msg);
    fatal(&msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldMetadata;
    use std::ffi::CString;
    use std::os::raw::c_char;

    fn leak_name(s: &str) -> *const c_char {
        CString::new(s).unwrap().into_raw()
    }

    fn int32_type() -> &'static TypeMetadata {
        Box::leak(Box::new(TypeMetadata {
            name: leak_name("Int32"),
            fields: std::ptr::null(),
            is_reference_type: false,
            size_in_bits: 4,
            field_count: 0,
            pointer_level: 0,
        }))
    }

    fn int64_type() -> &'static TypeMetadata {
        Box::leak(Box::new(TypeMetadata {
            name: leak_name("Int64"),
            fields: std::ptr::null(),
            is_reference_type: false,
            size_in_bits: 8,
            field_count: 0,
            pointer_level: 0,
        }))
    }

    fn pointer_type() -> &'static TypeMetadata {
        Box::leak(Box::new(TypeMetadata {
            name: leak_name("*Int32"),
            fields: std::ptr::null(),
            is_reference_type: false,
            size_in_bits: 8,
            field_count: 0,
            pointer_level: 1,
        }))
    }

    fn pair_type() -> &'static TypeMetadata {
        let int_meta = int32_type();
        let fields: &'static [FieldMetadata] = Box::leak(Box::new([
            FieldMetadata { name: leak_name("a"), type_metadata: int_meta, offset: 0 },
            FieldMetadata { name: leak_name("b"), type_metadata: int_meta, offset: 4 },
        ]));
        Box::leak(Box::new(TypeMetadata {
            name: leak_name("Pair"),
            fields: fields.as_ptr(),
            is_reference_type: false,
            size_in_bits: 8,
            field_count: 2,
            pointer_level: 0,
        }))
    }

    unsafe fn write_i32(any: *mut AnyBox, v: i32) {
        (value_ptr(any) as *mut i32).write(v);
    }

    unsafe fn read_i32(any: *const AnyBox) -> i32 {
        (value_ptr(any) as *const i32).read()
    }

    #[test]
    fn value_type_copy_is_independent() {
        unsafe {
            let t = int32_type();
            let a = allocate_any(t).as_ptr();
            write_i32(a, 42);
            let b = copy_any(a);
            write_i32(a, 99);
            assert_eq!(read_i32(b), 42);
        }
    }

    #[test]
    fn reference_type_copy_aliases() {
        unsafe {
            let mut t = *pointer_type();
            t.is_reference_type = true;
            let t: &'static TypeMetadata = Box::leak(Box::new(t));
            let a = allocate_any(t).as_ptr();
            let b = copy_any(a);
            assert_eq!(a as usize, b as usize);
        }
    }

    #[test]
    fn field_round_trip_via_extract() {
        unsafe {
            let pair = pair_type();
            let a = allocate_any(pair).as_ptr();
            (field_value_ptr(a, 0) as *mut i32).write(7);
            (field_value_ptr(a, 1) as *mut i32).write(11);
            let extracted = extract_field(a, 1);
            assert_eq!(read_i32(extracted), 11);
        }
    }

    #[test]
    fn update_field_round_trips() {
        unsafe {
            let pair = pair_type();
            let a = allocate_any(pair).as_ptr();
            let new_val = allocate_any(int32_type()).as_ptr();
            write_i32(new_val, 99);
            update_field(a, 0, new_val);
            let extracted = extract_field(a, 0);
            assert_eq!(read_i32(extracted), 99);
        }
    }

    #[test]
    #[should_panic]
    fn update_field_type_mismatch_fatals() {
        unsafe {
            let pair = pair_type();
            let a = allocate_any(pair).as_ptr();
            let wrong = allocate_any(int64_type()).as_ptr();
            update_field(a, 0, wrong);
        }
    }

    #[test]
    fn checked_cast_identity_on_matching_type() {
        unsafe {
            let t = int32_type();
            let a = allocate_any(t).as_ptr();
            assert_eq!(checked_cast(a, t), value_ptr(a));
        }
    }

    #[test]
    #[should_panic]
    fn checked_cast_mismatch_fatals() {
        unsafe {
            let a = allocate_any(int32_type()).as_ptr();
            checked_cast(a, int64_type());
        }
    }

    #[test]
    fn bounds_check_on_field_access() {
        unsafe {
            let pair = pair_type();
            let a = allocate_any(pair).as_ptr();
            assert!(field_value_ptr(a, 0) != std::ptr::null_mut());
            assert!(field_value_ptr(a, 1) != std::ptr::null_mut());
        }
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_field_access_fatals() {
        unsafe {
            let pair = pair_type();
            let a = allocate_any(pair).as_ptr();
            let _ = field_value_ptr(a, 2);
        }
    }

    #[test]
    fn nil_test_on_pointer_type_is_always_false() {
        unsafe {
            let t = pointer_type();
            let a = allocate_any(t).as_ptr();
            assert!(!is_nil(a));
        }
    }

    #[test]
    fn nil_test_on_non_pointer_type_reads_payload() {
        unsafe {
            let t = int32_type();
            let a = allocate_any(t).as_ptr();
            assert!(is_nil(a));
            write_i32(a, 1);
            assert!(!is_nil(a));
        }
    }

    #[test]
    #[should_panic]
    fn null_reference_payload_fatals_on_field_access() {
        unsafe {
            let mut t = *pointer_type();
            t.is_reference_type = true;
            t.field_count = 1;
            let field: &'static [FieldMetadata] = Box::leak(Box::new([FieldMetadata {
                name: leak_name("x"),
                type_metadata: int32_type(),
                offset: 0,
            }]));
            t.fields = field.as_ptr();
            let t: &'static TypeMetadata = Box::leak(Box::new(t));
            let a = allocate_any(t).as_ptr();
            // payload left as null pointer by allocate_any's zeroing
            let _ = field_value_ptr(a, 0);
        }
    }
}

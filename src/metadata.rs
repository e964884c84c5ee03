//! Metadata Model — read-only descriptors of types and fields emitted by
//! the compiler.
//!
//! `TypeMetadata` and `FieldMetadata` are owned by the binary as static
//! data; this module never allocates, frees, or mutates them. The only
//! non-trivial operation is field lookup by index, which is bounds-checked
//! against `field_count` and fatals with a descriptive message otherwise.
//!
//! Layout is bit-exact and ABI-fixed: the compiler and this crate must
//! agree on field order, since generated code constructs these records
//! directly.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::alloc::fatal;
use crate::safety::{report_violation, SafetyViolation};

/// Read-only field descriptor, emitted once per field by the compiler.
///
/// Field order is part of the ABI: `name`, `type_metadata`, `offset`.
#[repr(C)]
#[derive(Debug)]
pub struct FieldMetadata {
    /// Null-terminated field name, as spelled in source.
    pub name: *const c_char,
    /// Pointer to the field's own `TypeMetadata`.
    pub type_metadata: *const TypeMetadata,
    /// Byte offset of the field from the start of the containing value.
    pub offset: usize,
}

/// Read-only type descriptor, emitted once per distinct type by the
/// compiler.
///
/// Field order is part of the ABI: `name`, `fields`, `is_reference_type`,
/// `size_in_bits`, `field_count`, `pointer_level`.
///
/// `size_in_bits` is misnamed: every consumer in this crate (pointer
/// arithmetic, `memcpy` length) treats it as a byte count. The field keeps
/// its ABI name for compiler agreement; see the doc comment on the field
/// itself.
///
/// Identity is pointer identity — the compiler emits exactly one
/// `TypeMetadata` per distinct type, so `check_type`/`checked_cast`
/// compare `TypeMetadata` pointers directly rather than names.
#[repr(C)]
#[derive(Debug)]
pub struct TypeMetadata {
    /// Null-terminated type name, as spelled in source.
    pub name: *const c_char,
    /// Contiguous array of `field_count` `FieldMetadata` records.
    pub fields: *const FieldMetadata,
    /// True iff values of this type are stored indirectly (as a pointer
    /// to a `RefCountBox` payload).
    pub is_reference_type: bool,
    /// Byte size of the payload, despite the name.
    pub size_in_bits: u64,
    /// Number of entries in `fields`. Zero for primitive/opaque types.
    pub field_count: u64,
    /// Number of pointer indirections; 0 for non-pointer types.
    pub pointer_level: u32,
}

impl TypeMetadata {
    /// The type's source-spelled name.
    ///
    /// # Safety
    /// `self.name` must be a valid null-terminated string, as guaranteed
    /// by the compiler's emission contract.
    pub unsafe fn name_str(&self) -> &str {
        CStr::from_ptr(self.name).to_str().unwrap_or("<invalid utf8>")
    }

    /// Field `index`, or a fatal error if `index >= self.field_count`.
    ///
    /// # Safety
    /// `self.fields` must point to `self.field_count` valid
    /// `FieldMetadata` records.
    pub unsafe fn field(&self, index: u64) -> &FieldMetadata {
        if index >= self.field_count {
            let name = self.name_str();
            let details = format!(
                "field index {index} out of bounds for type {name} with {} fields",
                self.field_count
            );
            report_violation(SafetyViolation::FieldIndexOutOfBounds, "TypeMetadata::field", &details);
            fatal(&details);
        }
        &*self.fields.add(index as usize)
    }
}

impl FieldMetadata {
    /// The field's source-spelled name.
    ///
    /// # Safety
    /// `self.name` must be a valid null-terminated string.
    pub unsafe fn name_str(&self) -> &str {
        CStr::from_ptr(self.name).to_str().unwrap_or("<invalid utf8>")
    }
}

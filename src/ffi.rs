//! C-ABI surface consumed by generated code.
//!
//! Every function here is a thin argument/return marshalling wrapper
//! around the safe(r) inner implementations in [`crate::refcount`],
//! [`crate::metadata`], and [`crate::any_box`]. Names and signatures in
//! this file are part of the binary interface and must not be renamed,
//! reordered, or have their ABI changed.

use std::os::raw::c_char;

use crate::any_box::{self, AnyBox};
use crate::metadata::{FieldMetadata, TypeMetadata};
use crate::refcount::{self, Deinitializer};

// --- ARC surface ---------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn allocate_indirect_type(
    size: usize,
    deinit: Option<Deinitializer>,
) -> *mut u8 {
    refcount::allocate_indirect(size, deinit).as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn retain(instance: *mut u8) -> *mut u8 {
    refcount::retain(instance)
}

#[no_mangle]
pub unsafe extern "C" fn release(instance: *mut u8) -> *mut u8 {
    refcount::release(instance)
}

#[no_mangle]
pub unsafe extern "C" fn is_unique(instance: *const u8) -> u8 {
    refcount::is_uniquely_referenced(instance) as u8
}

// --- Metadata accessors ---------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn type_metadata_name(type_meta: *const TypeMetadata) -> *const c_char {
    (*type_meta).name
}

#[no_mangle]
pub unsafe extern "C" fn type_metadata_size_in_bits(type_meta: *const TypeMetadata) -> u64 {
    (*type_meta).size_in_bits
}

#[no_mangle]
pub unsafe extern "C" fn type_metadata_field_count(type_meta: *const TypeMetadata) -> u64 {
    (*type_meta).field_count
}

#[no_mangle]
pub unsafe extern "C" fn type_metadata_is_reference_type(type_meta: *const TypeMetadata) -> u8 {
    (*type_meta).is_reference_type as u8
}

#[no_mangle]
pub unsafe extern "C" fn type_metadata_pointer_level(type_meta: *const TypeMetadata) -> u32 {
    (*type_meta).pointer_level
}

#[no_mangle]
pub unsafe extern "C" fn type_metadata_field(
    type_meta: *const TypeMetadata,
    index: u64,
) -> *const FieldMetadata {
    (*type_meta).field(index) as *const FieldMetadata
}

#[no_mangle]
pub unsafe extern "C" fn field_metadata_name(field: *const FieldMetadata) -> *const c_char {
    (*field).name
}

#[no_mangle]
pub unsafe extern "C" fn field_metadata_type(field: *const FieldMetadata) -> *const TypeMetadata {
    (*field).type_metadata
}

#[no_mangle]
pub unsafe extern "C" fn field_metadata_offset(field: *const FieldMetadata) -> usize {
    (*field).offset
}

// --- Any surface -----------------------------------------------------------

/// `Any` crosses the ABI as a one-pointer-sized handle to an [`AnyBox`].
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AnyHandle(pub *mut AnyBox);

#[no_mangle]
pub unsafe extern "C" fn allocate_any(type_meta: *const TypeMetadata) -> AnyHandle {
    AnyHandle(any_box::allocate_any(type_meta).as_ptr())
}

#[no_mangle]
pub unsafe extern "C" fn copy_any(any: AnyHandle) -> AnyHandle {
    AnyHandle(any_box::copy_any(any.0))
}

#[no_mangle]
pub unsafe extern "C" fn get_any_value_ptr(any: AnyHandle) -> *mut u8 {
    any_box::value_ptr(any.0)
}

#[no_mangle]
pub unsafe extern "C" fn get_any_field_value_ptr(any: AnyHandle, index: u64) -> *mut u8 {
    any_box::field_value_ptr(any.0, index)
}

#[no_mangle]
pub unsafe extern "C" fn extract_any_field(any: AnyHandle, index: u64) -> AnyHandle {
    AnyHandle(any_box::extract_field(any.0, index))
}

#[no_mangle]
pub unsafe extern "C" fn update_any(any: AnyHandle, index: u64, new_value: AnyHandle) {
    any_box::update_field(any.0, index, new_value.0)
}

#[no_mangle]
pub unsafe extern "C" fn get_any_type_metadata(any: AnyHandle) -> *const TypeMetadata {
    any_box::type_metadata(any.0)
}

#[no_mangle]
pub unsafe extern "C" fn check_types(any: AnyHandle, type_meta: *const TypeMetadata) -> u8 {
    any_box::check_type(any.0, type_meta) as u8
}

#[no_mangle]
pub unsafe extern "C" fn checked_cast(any: AnyHandle, type_meta: *const TypeMetadata) -> *mut u8 {
    any_box::checked_cast(any.0, type_meta)
}

#[no_mangle]
pub unsafe extern "C" fn any_is_nil(any: AnyHandle) -> u8 {
    any_box::is_nil(any.0) as u8
}

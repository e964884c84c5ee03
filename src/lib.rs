//! Runtime support library for a statically-typed, ahead-of-time compiled
//! language.
//!
//! Linked into every compiled program, this crate provides the two
//! services generated code cannot express directly:
//!
//! - Thread-safe, overflow-checked automatic reference counting for
//!   indirectly-stored ("reference") values ([`refcount`]).
//! - A reflective boxed-value subsystem ("Any") backed by compiler-emitted
//!   type metadata, with value-vs-reference copy semantics, field
//!   offsetting, pointer-identity type checks, and nil detection
//!   ([`metadata`], [`any_box`]).
//!
//! Both engines share a single allocator/fatal-error facade ([`alloc`])
//! and report contract violations through [`safety`] before aborting. The
//! C-ABI surface consumed by generated code lives in [`ffi`].

// Every exported function takes raw pointers handed in by generated code;
// the safety contract is between the compiler (which emits valid
// arguments) and this crate, not something `unsafe fn` on every signature
// would add clarity to.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

pub mod alloc;
pub mod any_box;
pub mod ffi;
pub mod metadata;
pub mod refcount;
pub mod safety;

pub use any_box::AnyBox;
pub use ffi::AnyHandle;
pub use metadata::{FieldMetadata, TypeMetadata};
pub use refcount::{Deinitializer, RefCountBox};

/// Enables the `panic-on-safety-violation` feature's eager-panic path in
/// [`safety::report_violation`] in addition to its always-on counting and
/// diagnostic printing.
#[cfg(feature = "runtime-safety-checks")]
pub const SAFETY_CHECKS_ENABLED: bool = true;
#[cfg(not(feature = "runtime-safety-checks"))]
pub const SAFETY_CHECKS_ENABLED: bool = false;

#[cfg(debug_assertions)]
pub const DEBUG_MODE: bool = true;
#[cfg(not(debug_assertions))]
pub const DEBUG_MODE: bool = false;

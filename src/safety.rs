//! Safety violation tracking and reporting.
//!
//! Every fatal condition this runtime detects is reported here before the
//! process aborts, giving debug builds a running count of contract
//! violations observed during a process's lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for safety violations
static SAFETY_VIOLATION_COUNT: AtomicU64 = AtomicU64::new(0);

/// Taxonomy of fatal conditions this runtime can detect.
#[derive(Debug, Clone, Copy)]
pub enum SafetyViolation {
    /// Retain count would overflow `u32::MAX`.
    Overflow,
    /// Release of a box whose retain count is already 0.
    ReleaseBelowZero,
    /// Field index out of range for the declaring type.
    FieldIndexOutOfBounds,
    /// Type metadata mismatch on `update_field`/`checked_cast`.
    TypeMismatch,
    /// A reference-typed Any's stored pointer was null where non-null
    /// was required.
    NullReferencePayload,
}

/// Report a safety violation with context
///
/// This function logs the violation and increments a global counter.
/// In debug builds or with `panic-on-safety-violation` feature, it will panic.
pub fn report_violation(violation: SafetyViolation, function: &str, details: &str) {
    let count = SAFETY_VIOLATION_COUNT.fetch_add(1, Ordering::SeqCst);

    eprintln!("\n═══════════════════════════════════════════════════════════════");
    eprintln!(
        "[SAFETY VIOLATION #{:04}] {:?} in {}",
        count + 1,
        violation,
        function
    );
    eprintln!("Details: {}", details);
    eprintln!("═══════════════════════════════════════════════════════════════\n");

    #[cfg(feature = "panic-on-safety-violation")]
    {
        panic!(
            "Safety violation detected: {:?} in {} - {}",
            violation, function, details
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_violation_increments_global_counter() {
        let before = SAFETY_VIOLATION_COUNT.load(Ordering::SeqCst);
        report_violation(SafetyViolation::Overflow, "test", "synthetic violation");
        let after = SAFETY_VIOLATION_COUNT.load(Ordering::SeqCst);
        assert_eq!(after, before + 1);
    }
}

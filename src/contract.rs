//! Contract checks for programmer errors.
//!
//! The runtime itself is infallible; every failure mode is a misuse of the API
//! by the caller. Violations terminate with a panic naming the broken
//! contract. Checks that are too expensive for release builds (duplicate-add
//! scans, allocator address validation) go through [`assert_audit`] and only
//! exist with debug assertions enabled.

/// Checks a precondition. Always compiled in.
macro_rules! pre {
    ($cond:expr, $($msg:tt)+) => {
        assert!($cond, $($msg)+)
    };
}

/// Checks a postcondition. Always compiled in.
macro_rules! post {
    ($cond:expr, $($msg:tt)+) => {
        assert!($cond, $($msg)+)
    };
}

/// Checks an expensive invariant in audit (debug-assertion) builds only.
macro_rules! assert_audit {
    ($cond:expr, $($msg:tt)+) => {
        debug_assert!($cond, $($msg)+)
    };
}

pub(crate) use {assert_audit, post, pre};

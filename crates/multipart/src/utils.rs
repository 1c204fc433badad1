//! Utility macros shared by the multipart crate.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// Used by the construction-time validators so that a bad boundary or header
/// is reported from `build()` rather than discovered mid-stream.
///
/// # Example
///
/// ```ignore
/// ensure!(!name.contains('"'), MultipartError::invalid_field_name(name, "contains a quote"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

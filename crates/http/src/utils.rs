//! Internal helper macros.

/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but for validation that fails with an error instead of a panic:
///
/// ```ignore
/// ensure!(len <= max_header_bytes, ParseError::too_large_header(len, max_header_bytes));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

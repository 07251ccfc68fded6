//! Object key validation.
//!
//! Keys are `/`-separated and relative to the store root. They must not climb
//! above the root (no `..` traversal past the first segment) and must not
//! contain null bytes.

use crate::error::{ErrorKind, Result};

fn segments(raw: &str) -> Result<Vec<&str>> {
    if raw.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
    }
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
                }
            },
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// Validates and normalizes an object key.
///
/// ```
/// use pkgrepo_storage::validate_key;
/// assert_eq!(validate_key("/live//1.10/./ubuntu/").unwrap(), "live/1.10/ubuntu");
/// assert_eq!(validate_key("a/../b").unwrap(), "b");
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate(raw: &str) -> Result<String> {
    let segments = segments(raw)?;
    if segments.is_empty() {
        exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
    }
    Ok(segments.join("/"))
}

/// Validates a listing prefix.
///
/// Unlike keys, the empty prefix (the whole store) is allowed, and a trailing
/// `/` is kept so that `a/` never matches `ab/...`.
pub fn validate_prefix(raw: &str) -> Result<String> {
    let segments = segments(raw)?;
    if segments.is_empty() {
        return Ok(String::new());
    }
    let mut prefix = segments.join("/");
    if raw.ends_with('/') {
        prefix.push('/');
    }
    Ok(prefix)
}

//! Naming rules for buckets and object keys.
//!
//! Bucket names are validated only when a bucket is created; lookups and
//! deletes accept any name already present in the registry.

use crate::services::{registry::ObjectRegistry, table::TEMP_PREFIX};
use thiserror::Error;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Prefix under which a blob is parked while it is being replaced or deleted.
pub const TRASH_PREFIX: &str = ".trash-";

/// Why a bucket name was rejected. Rules are checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("must be between 3 and 63 characters long")]
    Length,
    #[error(
        "may only contain lowercase letters, digits, dots and hyphens, and must start and end with a letter or digit"
    )]
    Charset,
    #[error("must not be formatted like an IP address")]
    IpAddress,
    #[error("must not contain `..` or `--`")]
    RepeatedSeparator,
}

/// Check `name` against the bucket naming rules; the first failing rule wins.
pub fn validate_bucket_name(name: &str) -> Result<(), ValidationError> {
    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::Length);
    }

    let bytes = name.as_bytes();
    let allowed = |b: &u8| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-');
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !bytes.iter().all(allowed)
        || !bytes.first().is_some_and(alnum)
        || !bytes.last().is_some_and(alnum)
    {
        return Err(ValidationError::Charset);
    }

    if is_ipv4_like(name) {
        return Err(ValidationError::IpAddress);
    }

    if name.contains("..") || name.contains("--") {
        return Err(ValidationError::RepeatedSeparator);
    }

    Ok(())
}

/// Four dot-separated groups of digits. Group values are not range checked.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// Basic key validation so a key always maps to a file inside its bucket
/// directory and never collides with the registry or scratch files.
pub fn validate_object_key(key: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("object key cannot be empty");
    }
    if key.len() > MAX_OBJECT_KEY_LEN {
        return Err("object key is longer than 1024 bytes");
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err("object key contains control characters or backslashes");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err("object key contains an empty, `.` or `..` path segment");
    }
    if key == ObjectRegistry::FILE_NAME
        || key.starts_with(TEMP_PREFIX)
        || key.starts_with(TRASH_PREFIX)
    {
        return Err("object key uses a reserved name");
    }
    Ok(())
}

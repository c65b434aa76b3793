//! Represents an object (file) stored in a bucket.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Metadata row for a single object within a bucket.
///
/// The payload itself lives in a sibling file named by the key; this struct
/// only carries what the object registry persists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Object {
    /// Object key, unique within its bucket.
    #[serde(rename = "ObjectKey")]
    pub key: String,

    /// Size in bytes, as counted while the payload was written.
    #[serde(rename = "Size")]
    pub size_bytes: u64,

    /// Content type supplied on upload, if any.
    #[serde(rename = "ContentType")]
    pub content_type: Option<String>,

    #[serde(rename = "LastModified", with = "super::timestamp")]
    pub last_modified: NaiveDateTime,
}

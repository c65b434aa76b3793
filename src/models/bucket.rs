//! Represents a logical bucket, a top-level container for objects.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory lifecycle status of a bucket.
///
/// `MarkedForDeletion` only reports that the bucket's object registry became
/// empty; it never gates reads, writes or deletion.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketStatus {
    Active,
    MarkedForDeletion,
}

impl BucketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketStatus::Active => "Active",
            BucketStatus::MarkedForDeletion => "MarkedForDeletion",
        }
    }
}

impl fmt::Display for BucketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the bucket registry.
///
/// The name is the row key and maps 1:1 to a directory under the storage root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name, validated once at creation time.
    #[serde(rename = "Name")]
    pub name: String,

    /// When this bucket was created.
    #[serde(rename = "CreationTime", with = "super::timestamp")]
    pub created_at: NaiveDateTime,

    /// Last time the bucket or one of its objects changed.
    #[serde(rename = "LastModifiedTime", with = "super::timestamp")]
    pub last_modified: NaiveDateTime,

    #[serde(rename = "Status")]
    pub status: BucketStatus,
}

impl Bucket {
    /// A freshly created bucket: active, with both timestamps set to `at`.
    pub fn new(name: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            created_at: at,
            last_modified: at,
            status: BucketStatus::Active,
        }
    }
}

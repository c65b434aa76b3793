//! Core data models for the S3-style object storage service.
//!
//! These entities are the rows of the two registry tables. They serialize
//! through `serde` into the CSV table files and into the XML responses.

pub mod bucket;
pub mod object;

use chrono::{Local, NaiveDateTime, SubsecRound};

/// Format used for every persisted and rendered timestamp (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Current local time, truncated to whole seconds so that an in-memory value
/// equals the one read back from a table.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Render a timestamp with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Serde adapter for `YYYY/MM/DD hh:mm:ss` timestamps.
pub mod timestamp {
    use super::{TIMESTAMP_FORMAT, format_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map_err(|err| D::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_uses_slash_separated_layout() {
        let value = NaiveDateTime::parse_from_str("2024/03/07 09:05:01", TIMESTAMP_FORMAT).unwrap();
        assert_eq!(format_timestamp(&value), "2024/03/07 09:05:01");
    }

    #[test]
    fn now_has_no_subsecond_component() {
        let value = now();
        assert_eq!(value, value.trunc_subsecs(0));
    }
}

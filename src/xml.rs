//! XML response bodies.
//!
//! Documents are produced with `quick_xml`'s serde serializer, indented by
//! three spaces and prefixed with the XML declaration.

use crate::models::{bucket::Bucket, format_timestamp, object::Object};
use serde::Serialize;
use thiserror::Error;

pub const CONTENT_TYPE: &str = "application/xml";

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const FALLBACK_ERROR: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "\n<Error><StatusCode>InternalServerError</StatusCode>",
    "<Message>failed to render error response</Message></Error>\n"
);

#[derive(Debug, Error)]
#[error("xml serialization failed: {0}")]
pub struct XmlError(String);

#[derive(Serialize)]
#[serde(rename = "ListAllMyBucketsResult")]
struct ListAllMyBucketsResult<'a> {
    #[serde(rename = "Buckets")]
    buckets: BucketList<'a>,
}

#[derive(Serialize)]
struct BucketList<'a> {
    #[serde(rename = "Bucket")]
    entries: Vec<BucketEntry<'a>>,
}

/// Field order is part of the response contract.
#[derive(Serialize)]
struct BucketEntry<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "DateOfCreation")]
    date_of_creation: String,
    #[serde(rename = "LastModifiedTime")]
    last_modified_time: String,
    #[serde(rename = "Status")]
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename = "ListBucketResult")]
struct ListBucketResult<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "KeyCount")]
    key_count: usize,
    #[serde(rename = "Contents")]
    contents: Vec<ObjectEntry<'a>>,
}

#[derive(Serialize)]
struct ObjectEntry<'a> {
    #[serde(rename = "Key")]
    key: &'a str,
    #[serde(rename = "LastModified")]
    last_modified: String,
    #[serde(rename = "Size")]
    size: u64,
    #[serde(rename = "ContentType", skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename = "CreateBucketResult")]
struct CreateBucketResult<'a> {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Name")]
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename = "Error")]
struct ErrorResponse<'a> {
    #[serde(rename = "StatusCode")]
    status_code: &'a str,
    #[serde(rename = "Message")]
    message: &'a str,
}

fn render<T: Serialize>(value: &T) -> Result<String, XmlError> {
    let mut body = String::with_capacity(256);
    body.push_str(DECLARATION);
    body.push('\n');

    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 3);
    value
        .serialize(serializer)
        .map_err(|err| XmlError(err.to_string()))?;

    body.push('\n');
    Ok(body)
}

/// `<ListAllMyBucketsResult>` with one `<Bucket>` per registry row, in order.
pub fn list_buckets_document(buckets: &[Bucket]) -> Result<String, XmlError> {
    render(&ListAllMyBucketsResult {
        buckets: BucketList {
            entries: buckets
                .iter()
                .map(|bucket| BucketEntry {
                    name: &bucket.name,
                    date_of_creation: format_timestamp(&bucket.created_at),
                    last_modified_time: format_timestamp(&bucket.last_modified),
                    status: bucket.status.as_str(),
                })
                .collect(),
        },
    })
}

pub fn list_objects_document(bucket: &str, objects: &[Object]) -> Result<String, XmlError> {
    render(&ListBucketResult {
        name: bucket,
        key_count: objects.len(),
        contents: objects
            .iter()
            .map(|object| ObjectEntry {
                key: &object.key,
                last_modified: format_timestamp(&object.last_modified),
                size: object.size_bytes,
                content_type: object.content_type.as_deref(),
            })
            .collect(),
    })
}

pub fn create_bucket_document(bucket: &str) -> Result<String, XmlError> {
    render(&CreateBucketResult {
        location: format!("/{bucket}"),
        name: bucket,
    })
}

/// `<Error>` envelope. Falls back to a fixed document if rendering fails.
pub fn error_document(code: &str, message: &str) -> String {
    render(&ErrorResponse {
        status_code: code,
        message,
    })
    .unwrap_or_else(|_| FALLBACK_ERROR.to_string())
}

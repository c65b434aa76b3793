//! Request-path parsing.
//!
//! Every S3-style request path is parsed once into a [`RequestTarget`]
//! before any service is called:
//!
//! - `/`                 -> `Root`
//! - `/{bucket}` or `/{bucket}/` -> `Bucket`
//! - `/{bucket}/{*key}`  -> `Object` (the key may contain `/`)
//!
//! Both segments are percent-decoded.

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use percent_encoding::percent_decode_str;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    Root,
    Bucket(String),
    Object { bucket: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("request path must start with `/`")]
    NotAbsolute,
    #[error("request path has an empty bucket segment")]
    EmptyBucket,
    #[error("`{0}` cannot be used as a bucket reference")]
    BadBucket(String),
    #[error("request path is not valid percent-encoded UTF-8")]
    Encoding,
}

impl RequestTarget {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let rest = path.strip_prefix('/').ok_or(PathError::NotAbsolute)?;
        if rest.is_empty() {
            return Ok(RequestTarget::Root);
        }

        let (raw_bucket, raw_key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };
        if raw_bucket.is_empty() {
            return Err(PathError::EmptyBucket);
        }

        let bucket = decode(raw_bucket)?;
        if bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
            return Err(PathError::BadBucket(bucket));
        }

        if raw_key.is_empty() {
            Ok(RequestTarget::Bucket(bucket))
        } else {
            Ok(RequestTarget::Object {
                bucket,
                key: decode(raw_key)?,
            })
        }
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestTarget::Root => f.write_str("/"),
            RequestTarget::Bucket(bucket) => write!(f, "/{bucket}"),
            RequestTarget::Object { bucket, key } => write!(f, "/{bucket}/{key}"),
        }
    }
}

fn decode(raw: &str) -> Result<String, PathError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| PathError::Encoding)
}

impl<S: Send + Sync> FromRequestParts<S> for RequestTarget {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestTarget::parse(parts.uri.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_bucket_and_object_shapes() {
        assert_eq!(RequestTarget::parse("/"), Ok(RequestTarget::Root));
        assert_eq!(
            RequestTarget::parse("/photos"),
            Ok(RequestTarget::Bucket("photos".into()))
        );
        assert_eq!(
            RequestTarget::parse("/photos/"),
            Ok(RequestTarget::Bucket("photos".into()))
        );
        assert_eq!(
            RequestTarget::parse("/photos/2025/img.jpg"),
            Ok(RequestTarget::Object {
                bucket: "photos".into(),
                key: "2025/img.jpg".into()
            })
        );
    }

    #[test]
    fn segments_are_percent_decoded() {
        assert_eq!(
            RequestTarget::parse("/docs/my%20file.txt"),
            Ok(RequestTarget::Object {
                bucket: "docs".into(),
                key: "my file.txt".into()
            })
        );
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        assert_eq!(RequestTarget::parse(""), Err(PathError::NotAbsolute));
        assert_eq!(RequestTarget::parse("//key"), Err(PathError::EmptyBucket));
        assert_eq!(
            RequestTarget::parse("/../x"),
            Err(PathError::BadBucket("..".into()))
        );
        assert_eq!(
            RequestTarget::parse("/a%2Fb"),
            Err(PathError::BadBucket("a/b".into()))
        );
        assert_eq!(RequestTarget::parse("/b/%FF"), Err(PathError::Encoding));
    }

    #[test]
    fn display_round_trips_shape() {
        let target = RequestTarget::parse("/b/k").unwrap();
        assert_eq!(target.to_string(), "/b/k");
    }
}

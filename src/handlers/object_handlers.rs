//! HTTP handlers for object operations.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! concerns to `ObjectService`.

use super::{empty_response, xml_response};
use crate::{
    errors::AppError, models::object::Object, services::storage_service::StorageService, xml,
};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::{Local, TimeZone, Utc};
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// PUT `/{bucket}/{*key}` -> upload an object.
pub async fn put_object(
    service: &StorageService,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other));

    let output = service
        .objects
        .put_object(bucket, key, content_type, stream)
        .await?;

    let mut response = empty_response(StatusCode::OK);
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", output.etag)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// GET `/{bucket}/{*key}` -> download an object as a streaming response.
pub async fn get_object(
    service: &StorageService,
    bucket: &str,
    key: &str,
) -> Result<Response, AppError> {
    let (meta, file) = service.objects.get_object(bucket, key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// HEAD `/{bucket}/{*key}` -> same headers as GET but no body.
pub async fn head_object(
    service: &StorageService,
    bucket: &str,
    key: &str,
) -> Result<Response, AppError> {
    let meta = service.objects.head_object(bucket, key).await?;
    let mut response = empty_response(StatusCode::OK);
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/{bucket}/{*key}`
pub async fn delete_object(
    service: &StorageService,
    bucket: &str,
    key: &str,
) -> Result<Response, AppError> {
    service.objects.delete_object(bucket, key).await?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}

/// GET `/{bucket}` -> list the bucket's objects.
pub async fn list_objects(service: &StorageService, bucket: &str) -> Result<Response, AppError> {
    let objects = service.objects.list_objects(bucket).await?;
    xml_response(StatusCode::OK, xml::list_objects_document(bucket, &objects))
}

fn set_object_headers(headers: &mut HeaderMap, meta: &Object) {
    let content_type = meta.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));

    // Stored times are local; HTTP dates are GMT.
    if let Some(local) = Local.from_local_datetime(&meta.last_modified).earliest() {
        let http_date = local
            .with_timezone(&Utc)
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        if let Ok(value) = HeaderValue::from_str(&http_date) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}

//! Bucket-level handlers: list, create and delete buckets.

use super::{empty_response, xml_response};
use crate::{errors::AppError, services::storage_service::StorageService, xml};
use axum::{http::StatusCode, response::Response};

/// GET `/` -> every bucket, in creation order.
pub async fn list_buckets(service: &StorageService) -> Result<Response, AppError> {
    let buckets = service.buckets.list_buckets().await?;
    xml_response(StatusCode::OK, xml::list_buckets_document(&buckets))
}

/// PUT `/{bucket}` -> create bucket.
pub async fn create_bucket(service: &StorageService, bucket: &str) -> Result<Response, AppError> {
    service.buckets.create_bucket(bucket).await?;
    xml_response(StatusCode::OK, xml::create_bucket_document(bucket))
}

/// DELETE `/{bucket}` -> delete an empty bucket.
pub async fn delete_bucket(service: &StorageService, bucket: &str) -> Result<Response, AppError> {
    service.buckets.delete_bucket(bucket).await?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}

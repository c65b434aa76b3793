//! Defines routes for all S3-like bucket and object operations.
//!
//! ## Structure
//! - **Service-level endpoints**
//!   - `GET    /`                 -> list buckets
//!
//! - **Bucket-level endpoints**
//!   - `PUT    /{bucket}`         -> create bucket
//!   - `GET    /{bucket}`         -> list objects
//!   - `DELETE /{bucket}`         -> delete bucket
//!
//! - **Object-level endpoints**
//!   - `PUT    /{bucket}/{*key}`  -> upload object
//!   - `GET    /{bucket}/{*key}`  -> download object
//!   - `HEAD   /{bucket}/{*key}`  -> retrieve metadata only
//!   - `DELETE /{bucket}/{*key}`  -> delete object
//!
//! S3 paths are not matched by axum patterns: they all reach [`dispatch`],
//! which parses the path into a [`RequestTarget`] and picks the handler by
//! method and shape.

use crate::{
    errors::AppError,
    handlers::{
        bucket_handlers::{create_bucket, delete_bucket, list_buckets},
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, get_object, head_object, list_objects, put_object},
    },
    routes::path::RequestTarget,
    services::storage_service::StorageService,
};
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method},
    response::Response,
    routing::get,
};

/// Build and return the router for all S3-compatible routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
/// The health endpoints live under `_`-prefixed paths, which no bucket name can
/// take, so every bucket keeps its full set of operations.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/_healthz", get(healthz).fallback(dispatch))
        .route("/_readyz", get(readyz).fallback(dispatch))
        .fallback(dispatch)
}

async fn dispatch(
    State(service): State<StorageService>,
    method: Method,
    target: RequestTarget,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    match (method, target) {
        (Method::GET, RequestTarget::Root) => list_buckets(&service).await,
        (Method::PUT, RequestTarget::Bucket(bucket)) => create_bucket(&service, &bucket).await,
        (Method::GET, RequestTarget::Bucket(bucket)) => list_objects(&service, &bucket).await,
        (Method::DELETE, RequestTarget::Bucket(bucket)) => delete_bucket(&service, &bucket).await,
        (Method::PUT, RequestTarget::Object { bucket, key }) => {
            put_object(&service, &bucket, &key, &headers, body).await
        }
        (Method::GET, RequestTarget::Object { bucket, key }) => {
            get_object(&service, &bucket, &key).await
        }
        (Method::HEAD, RequestTarget::Object { bucket, key }) => {
            head_object(&service, &bucket, &key).await
        }
        (Method::DELETE, RequestTarget::Object { bucket, key }) => {
            delete_object(&service, &bucket, &key).await
        }
        (method, target) => Err(AppError::method_not_allowed(format!(
            "{method} is not supported on {target}"
        ))),
    }
}

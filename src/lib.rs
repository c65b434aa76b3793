//! Simple Storage Service: an S3-style object store on local disk.
//!
//! Bucket and object metadata live in CSV registries next to the payloads
//! they describe; see [`services`] for the consistency rules.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod xml;

use axum::Router;
use services::storage_service::StorageService;

/// The complete application router, ready to serve.
pub fn app(storage: StorageService) -> Router {
    routes::routes::routes().with_state(storage)
}

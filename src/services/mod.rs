//! Metadata registries, payload storage and the services built on them.

pub mod blob_store;
pub mod bucket_service;
pub mod lifecycle;
pub mod object_service;
pub mod registry;
pub mod storage_service;
pub mod table;
pub mod validation;

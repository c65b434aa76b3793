//! src/services/storage_service.rs
//!
//! StorageService: the shared state handed to every handler. It opens the
//! storage root once, initializes the bucket registry and wires the bucket
//! and object services to the same registry and lock map.

use crate::{
    errors::{StoreError, StoreResult},
    services::{
        bucket_service::BucketService, object_service::ObjectService, registry::BucketRegistry,
        table::TableLocks,
    },
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Clone, Debug)]
pub struct StorageService {
    pub buckets: BucketService,
    pub objects: ObjectService,
    /// Storage root; holds the bucket registry and one directory per bucket.
    base_path: PathBuf,
}

impl StorageService {
    /// Create the storage root if needed and make sure the bucket registry
    /// exists with its header.
    pub async fn open(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|err| {
            StoreError::storage(
                format!("creating storage root `{}`", base_path.display()),
                err,
            )
        })?;

        let locks = TableLocks::new();
        let registry = BucketRegistry::new(&base_path, &locks);
        registry.init().await?;
        info!("storage root ready at {}", base_path.display());

        Ok(Self {
            buckets: BucketService::new(base_path.clone(), registry.clone(), locks.clone()),
            objects: ObjectService::new(base_path.clone(), registry, locks),
            base_path,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

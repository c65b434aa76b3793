//! BucketService: create, list and delete buckets.
//!
//! A bucket is a registry row plus a directory under the storage root. Both
//! are created and removed together; when the second step fails the first is
//! undone, and anything that cannot be undone is reported as an orphan.

use crate::{
    errors::{StoreError, StoreResult},
    models::bucket::Bucket,
    services::{
        registry::{BucketRegistry, ObjectRegistry},
        table::TableLocks,
        validation::validate_bucket_name,
    },
};
use std::{io::ErrorKind, path::PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Clone, Debug)]
pub struct BucketService {
    base_path: PathBuf,
    registry: BucketRegistry,
    locks: TableLocks,
}

impl BucketService {
    pub fn new(base_path: impl Into<PathBuf>, registry: BucketRegistry, locks: TableLocks) -> Self {
        Self {
            base_path: base_path.into(),
            registry,
            locks,
        }
    }

    fn bucket_root(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    /// Validate, check uniqueness, create the directory, then register it.
    ///
    /// The registry lock is held from the uniqueness check to the append, so
    /// concurrent creates never interleave.
    pub async fn create_bucket(&self, name: &str) -> StoreResult<Bucket> {
        validate_bucket_name(name).map_err(|reason| {
            warn!("rejected bucket name {:?}: {}", name, reason);
            StoreError::InvalidName {
                name: name.to_string(),
                reason,
            }
        })?;

        let mut registry = self.registry.write().await;
        if registry.exists(name).await? {
            return Err(StoreError::Conflict(format!(
                "bucket `{name}` already exists"
            )));
        }

        let bucket_root = self.bucket_root(name);
        fs::create_dir(&bucket_root)
            .await
            .map_err(|err| StoreError::storage(format!("creating directory for bucket `{name}`"), err))?;

        match registry.create(name).await {
            Ok(bucket) => {
                info!("created bucket {}", name);
                Ok(bucket)
            }
            Err(err) => match fs::remove_dir_all(&bucket_root).await {
                Ok(()) => Err(StoreError::storage(
                    format!("registering bucket `{name}`"),
                    err,
                )),
                Err(cleanup) => {
                    error!(
                        "orphan directory {} left behind: {}",
                        bucket_root.display(),
                        cleanup
                    );
                    Err(StoreError::Storage(format!(
                        "registering bucket `{name}` failed ({err}); orphan directory `{}` could not be removed: {cleanup}",
                        bucket_root.display()
                    )))
                }
            },
        }
    }

    /// Every registered bucket, in creation order.
    pub async fn list_buckets(&self) -> StoreResult<Vec<Bucket>> {
        Ok(self.registry.list().await?)
    }

    pub async fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.registry.exists(name).await?)
    }

    /// Remove an empty bucket: its directory first, then its registry row.
    ///
    /// Takes the bucket's object-registry lock before the bucket-registry
    /// lock, the same order the object service uses.
    pub async fn delete_bucket(&self, name: &str) -> StoreResult<()> {
        let mut objects = ObjectRegistry::for_bucket(&self.base_path, name, &self.locks)
            .write()
            .await;
        let mut registry = self.registry.write().await;

        if !registry.exists(name).await? {
            return Err(StoreError::bucket_not_found(name));
        }
        if !objects.is_empty().await? {
            return Err(StoreError::Conflict(format!(
                "bucket `{name}` is not empty"
            )));
        }

        let bucket_root = self.bucket_root(name);
        match fs::remove_dir_all(&bucket_root).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "bucket directory {} was already missing",
                    bucket_root.display()
                );
            }
            Err(err) => {
                return Err(StoreError::storage(
                    format!("removing directory of bucket `{name}`"),
                    err,
                ));
            }
        }

        if let Err(err) = registry.delete(name).await {
            error!(
                "bucket directory {} removed but its registry row remains: {}",
                bucket_root.display(),
                err
            );
            return Err(StoreError::Storage(format!(
                "bucket `{name}` directory was removed but its registry row could not be deleted: {err}"
            )));
        }

        info!("deleted bucket {}", name);
        Ok(())
    }
}

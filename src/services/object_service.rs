//! ObjectService: put, get, head, list and delete objects.
//!
//! Every call takes the bucket's object-registry lock first (exclusive for
//! writes, shared for reads) and only then consults the bucket registry, so
//! a concurrent bucket delete cannot slip between the existence check and
//! the object change.

use crate::{
    errors::{StoreError, StoreResult},
    models::{self, object::Object},
    services::{
        blob_store::ObjectBlobStore,
        lifecycle::{LifecycleController, LifecycleEvent},
        registry::{BucketRegistry, ObjectRegistry},
        table::TableLocks,
        validation::validate_object_key,
    },
};
use bytes::Bytes;
use futures::Stream;
use std::{io, path::PathBuf};
use tokio::fs::File;
use tracing::{debug, error, warn};

#[derive(Clone, Debug)]
pub struct ObjectService {
    base_path: PathBuf,
    buckets: BucketRegistry,
    blobs: ObjectBlobStore,
    lifecycle: LifecycleController,
    locks: TableLocks,
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct PutObjectOutput {
    pub object: Object,
    /// Hex MD5 of the stored payload.
    pub etag: String,
}

impl ObjectService {
    pub fn new(base_path: impl Into<PathBuf>, buckets: BucketRegistry, locks: TableLocks) -> Self {
        let base_path = base_path.into();
        Self {
            blobs: ObjectBlobStore::new(base_path.clone()),
            lifecycle: LifecycleController::new(buckets.clone()),
            base_path,
            buckets,
            locks,
        }
    }

    fn objects(&self, bucket: &str) -> ObjectRegistry {
        ObjectRegistry::for_bucket(&self.base_path, bucket, &self.locks)
    }

    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.buckets.exists(bucket).await? {
            Ok(())
        } else {
            Err(StoreError::bucket_not_found(bucket))
        }
    }

    /// Stream an object into `bucket` under `key`, replacing any previous one.
    ///
    /// The size is counted from the bytes written. Blob and row are swapped
    /// together: if the row cannot be written the previous blob is restored.
    pub async fn put_object<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StoreResult<PutObjectOutput>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let mut objects = self.objects(bucket).write().await;
        self.ensure_bucket(bucket).await?;
        validate_object_key(key).map_err(|reason| StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })?;
        if let Some(existing) = objects.path_collision(key).await? {
            return Err(StoreError::Conflict(format!(
                "object key `{key}` overlaps existing key `{existing}`"
            )));
        }

        let staged = self
            .blobs
            .stage(bucket, stream)
            .await
            .map_err(|err| StoreError::storage(format!("writing object `{key}`"), err))?;
        let committed = self
            .blobs
            .commit(staged, bucket, key)
            .await
            .map_err(|err| StoreError::storage(format!("storing object `{key}`"), err))?;

        let object = Object {
            key: key.to_string(),
            size_bytes: committed.size_bytes,
            content_type: content_type.filter(|value| !value.is_empty()),
            last_modified: models::now(),
        };
        let etag = committed.etag.clone();

        if let Err(err) = objects.upsert(object.clone()).await {
            return Err(match committed.rollback().await {
                Ok(()) => StoreError::storage(format!("registering object `{key}`"), err),
                Err(rollback) => {
                    error!(
                        "object {}/{} payload no longer matches its registry row: {}",
                        bucket, key, rollback
                    );
                    StoreError::Storage(format!(
                        "registering object `{key}` failed ({err}); its previous payload could not be restored: {rollback}"
                    ))
                }
            });
        }

        if let Err(err) = committed.finalize().await {
            warn!(
                "failed to discard replaced payload of {}/{}: {}",
                bucket, key, err
            );
        }

        self.lifecycle
            .apply(bucket, LifecycleEvent::ObjectWritten)
            .await
            .map_err(|err| {
                error!(
                    "object {}/{} stored but bucket status was not updated: {}",
                    bucket, key, err
                );
                StoreError::storage(
                    format!("object `{key}` stored but bucket `{bucket}` status was not updated"),
                    err,
                )
            })?;

        debug!(
            "stored object {}/{} ({} bytes)",
            bucket, key, object.size_bytes
        );
        Ok(PutObjectOutput { object, etag })
    }

    /// Stored metadata plus an open handle on the payload.
    ///
    /// The handle is opened under the registry lock, so it keeps reading the
    /// payload that matches the returned row even if the key is replaced
    /// while the body streams.
    pub async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<(Object, File)> {
        let objects = self.objects(bucket).read().await;
        self.ensure_bucket(bucket).await?;
        let object = objects
            .get(key)
            .await?
            .ok_or_else(|| StoreError::object_not_found(bucket, key))?;

        let file = self.blobs.open(bucket, key).await.map_err(|err| {
            error!("object {}/{} is registered but unreadable: {}", bucket, key, err);
            StoreError::storage(
                format!("object `{key}` is registered but its payload cannot be opened"),
                err,
            )
        })?;
        Ok((object, file))
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Object> {
        let objects = self.objects(bucket).read().await;
        self.ensure_bucket(bucket).await?;
        objects
            .get(key)
            .await?
            .ok_or_else(|| StoreError::object_not_found(bucket, key))
    }

    /// All object rows of `bucket`, in insertion order.
    pub async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<Object>> {
        let objects = self.objects(bucket).read().await;
        self.ensure_bucket(bucket).await?;
        Ok(objects.list().await?)
    }

    /// Remove the payload, then the row.
    ///
    /// The payload is moved aside before the row is touched. If moving it
    /// fails, nothing changed; if the row cannot be removed, the payload is
    /// moved back.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut objects = self.objects(bucket).write().await;
        self.ensure_bucket(bucket).await?;
        if objects.get(key).await?.is_none() {
            return Err(StoreError::object_not_found(bucket, key));
        }

        let stashed = self
            .blobs
            .stash(bucket, key)
            .await
            .map_err(|err| StoreError::storage(format!("removing payload of object `{key}`"), err))?;
        if stashed.is_none() {
            warn!("object {}/{} had no payload; removing its row", bucket, key);
        }

        let remaining = match objects.delete(key).await {
            Ok(remaining) => remaining,
            Err(err) => {
                let restored = match stashed {
                    Some(stashed) => stashed.restore().await,
                    None => Ok(()),
                };
                return Err(match restored {
                    Ok(()) => StoreError::storage(format!("unregistering object `{key}`"), err),
                    Err(restore) => {
                        error!(
                            "object {}/{} row remains but its payload is gone: {}",
                            bucket, key, restore
                        );
                        StoreError::Storage(format!(
                            "unregistering object `{key}` failed ({err}); its payload could not be restored: {restore}"
                        ))
                    }
                });
            }
        };

        if let Some(stashed) = stashed {
            if let Err(err) = stashed.discard().await {
                warn!("failed to discard payload of {}/{}: {}", bucket, key, err);
            }
        }

        self.lifecycle
            .apply(bucket, LifecycleEvent::ObjectRemoved { remaining })
            .await
            .map_err(|err| {
                error!(
                    "object {}/{} deleted ({} remaining) but bucket status was not updated: {}",
                    bucket, key, remaining, err
                );
                StoreError::storage(
                    format!("object `{key}` deleted but bucket `{bucket}` status was not updated"),
                    err,
                )
            })?;

        debug!("deleted object {}/{} ({} remaining)", bucket, key, remaining);
        Ok(())
    }
}

//! Fixed-schema registries built on [`Table`].
//!
//! - `BucketRegistry`: one table at the storage root, one row per bucket in
//!   creation order.
//! - `ObjectRegistry`: one table per bucket directory, one row per object.
//!   The file is created lazily by the first object write and disappears
//!   with the bucket directory.

use crate::{
    models::{
        self,
        bucket::{Bucket, BucketStatus},
        object::Object,
    },
    services::table::{Table, TableLocks, TableReader, TableResult, TableRow, TableWriter},
};
use chrono::NaiveDateTime;
use std::path::Path;

impl TableRow for Bucket {
    const HEADER: &'static [&'static str] = &["Name", "CreationTime", "LastModifiedTime", "Status"];

    fn key(&self) -> &str {
        &self.name
    }
}

impl TableRow for Object {
    const HEADER: &'static [&'static str] = &["ObjectKey", "Size", "ContentType", "LastModified"];

    fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Clone, Debug)]
pub struct BucketRegistry {
    table: Table<Bucket>,
}

impl BucketRegistry {
    /// Lives beside the bucket directories. The leading dot keeps it out of
    /// the bucket namespace: no valid bucket name starts with `.`.
    pub const FILE_NAME: &'static str = ".buckets.csv";

    pub fn new(root: &Path, locks: &TableLocks) -> Self {
        Self {
            table: Table::open(root.join(Self::FILE_NAME), locks),
        }
    }

    /// Write the header if the registry file does not exist yet.
    pub async fn init(&self) -> TableResult<()> {
        self.table.write().await.ensure().await
    }

    pub async fn list(&self) -> TableResult<Vec<Bucket>> {
        self.table.load().await
    }

    pub async fn get(&self, name: &str) -> TableResult<Option<Bucket>> {
        self.table.read().await.get(name).await
    }

    pub async fn exists(&self, name: &str) -> TableResult<bool> {
        Ok(self.get(name).await?.is_some())
    }

    pub async fn create(&self, name: &str) -> TableResult<Bucket> {
        self.write().await.create(name).await
    }

    pub async fn mark_status(&self, name: &str, status: BucketStatus) -> TableResult<bool> {
        self.write().await.mark_status(name, status, models::now()).await
    }

    pub async fn delete(&self, name: &str) -> TableResult<bool> {
        self.write().await.delete(name).await
    }

    /// Exclusive access to the registry for multi-step updates.
    pub async fn write(&self) -> BucketRegistryWriter {
        BucketRegistryWriter {
            inner: self.table.write().await,
        }
    }
}

pub struct BucketRegistryWriter {
    inner: TableWriter<Bucket>,
}

impl BucketRegistryWriter {
    pub async fn get(&mut self, name: &str) -> TableResult<Option<Bucket>> {
        self.inner.get(name).await
    }

    pub async fn exists(&mut self, name: &str) -> TableResult<bool> {
        Ok(self.get(name).await?.is_some())
    }

    /// Append an active row. Callers check [`exists`](Self::exists) first.
    pub async fn create(&mut self, name: &str) -> TableResult<Bucket> {
        let bucket = Bucket::new(name, models::now());
        self.inner.append(bucket.clone()).await?;
        Ok(bucket)
    }

    /// Set the status and stamp the modification time.
    /// Returns `false` if the bucket has no row.
    pub async fn mark_status(
        &mut self,
        name: &str,
        status: BucketStatus,
        at: NaiveDateTime,
    ) -> TableResult<bool> {
        let Some(mut bucket) = self.get(name).await? else {
            return Ok(false);
        };
        bucket.status = status;
        bucket.last_modified = at;
        self.inner.replace(name, bucket).await
    }

    pub async fn delete(&mut self, name: &str) -> TableResult<bool> {
        Ok(self.inner.remove(name).await?.is_some())
    }
}

#[derive(Clone, Debug)]
pub struct ObjectRegistry {
    table: Table<Object>,
}

impl ObjectRegistry {
    pub const FILE_NAME: &'static str = "objects.csv";

    pub fn for_bucket(root: &Path, bucket: &str, locks: &TableLocks) -> Self {
        Self {
            table: Table::open(root.join(bucket).join(Self::FILE_NAME), locks),
        }
    }

    pub async fn list(&self) -> TableResult<Vec<Object>> {
        self.table.load().await
    }

    pub async fn exists(&self, key: &str) -> TableResult<bool> {
        Ok(self.table.read().await.get(key).await?.is_some())
    }

    pub async fn is_empty(&self) -> TableResult<bool> {
        Ok(self.list().await?.is_empty())
    }

    pub async fn read(&self) -> ObjectRegistryReader {
        ObjectRegistryReader {
            inner: self.table.read().await,
        }
    }

    pub async fn write(&self) -> ObjectRegistryWriter {
        ObjectRegistryWriter {
            inner: self.table.write().await,
        }
    }
}

pub struct ObjectRegistryReader {
    inner: TableReader<Object>,
}

impl ObjectRegistryReader {
    pub async fn get(&self, key: &str) -> TableResult<Option<Object>> {
        self.inner.get(key).await
    }

    pub async fn list(&self) -> TableResult<Vec<Object>> {
        self.inner.rows().await
    }
}

pub struct ObjectRegistryWriter {
    inner: TableWriter<Object>,
}

impl ObjectRegistryWriter {
    pub async fn get(&mut self, key: &str) -> TableResult<Option<Object>> {
        self.inner.get(key).await
    }

    pub async fn len(&mut self) -> TableResult<usize> {
        Ok(self.inner.rows().await?.len())
    }

    pub async fn is_empty(&mut self) -> TableResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// A stored key that would need `key` to be both a file and a directory:
    /// `a` blocks `a/b` and the other way round.
    pub async fn path_collision(&mut self, key: &str) -> TableResult<Option<String>> {
        let collides = |stored: &str| {
            let nested = |outer: &str, inner: &str| {
                inner
                    .strip_prefix(outer)
                    .is_some_and(|rest| rest.starts_with('/'))
            };
            nested(stored, key) || nested(key, stored)
        };
        Ok(self
            .inner
            .rows()
            .await?
            .iter()
            .find(|object| collides(&object.key))
            .map(|object| object.key.clone()))
    }

    /// Insert the row, or replace the one stored under the same key.
    pub async fn upsert(&mut self, object: Object) -> TableResult<()> {
        self.inner.upsert(object).await
    }

    /// Remove the row and return how many rows remain.
    pub async fn delete(&mut self, key: &str) -> TableResult<usize> {
        self.inner.remove(key).await?;
        self.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn object(key: &str, size: u64) -> Object {
        Object {
            key: key.into(),
            size_bytes: size,
            content_type: Some("text/plain".into()),
            last_modified: models::now(),
        }
    }

    #[tokio::test]
    async fn bucket_registry_keeps_creation_order() {
        let dir = TempDir::new().unwrap();
        let registry = BucketRegistry::new(dir.path(), &TableLocks::new());
        registry.init().await.unwrap();
        for name in ["zeta", "alpha", "mid"] {
            registry.create(name).await.unwrap();
        }
        let names: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn bucket_registry_file_has_four_column_header() {
        let dir = TempDir::new().unwrap();
        let registry = BucketRegistry::new(dir.path(), &TableLocks::new());
        registry.init().await.unwrap();
        registry.create("photos").await.unwrap();
        let content = std::fs::read_to_string(dir.path().join(BucketRegistry::FILE_NAME)).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Name,CreationTime,LastModifiedTime,Status"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("photos,"));
        assert!(row.ends_with(",Active"));
    }

    #[tokio::test]
    async fn mark_status_round_trips_through_the_file() {
        let dir = TempDir::new().unwrap();
        let registry = BucketRegistry::new(dir.path(), &TableLocks::new());
        registry.create("photos").await.unwrap();
        assert!(
            registry
                .mark_status("photos", BucketStatus::MarkedForDeletion)
                .await
                .unwrap()
        );
        assert!(
            !registry
                .mark_status("missing", BucketStatus::Active)
                .await
                .unwrap()
        );
        let bucket = registry.get("photos").await.unwrap().unwrap();
        assert_eq!(bucket.status, BucketStatus::MarkedForDeletion);
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_row() {
        let dir = TempDir::new().unwrap();
        let registry = BucketRegistry::new(dir.path(), &TableLocks::new());
        registry.create("one").await.unwrap();
        registry.create("two").await.unwrap();
        assert!(registry.delete("one").await.unwrap());
        assert!(!registry.delete("one").await.unwrap());
        assert!(!registry.exists("one").await.unwrap());
        assert!(registry.exists("two").await.unwrap());
    }

    #[tokio::test]
    async fn object_registry_is_lazy_and_counts_remaining_rows() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("photos")).unwrap();
        let registry = ObjectRegistry::for_bucket(dir.path(), "photos", &TableLocks::new());
        let table_path = dir.path().join("photos").join(ObjectRegistry::FILE_NAME);

        assert!(registry.is_empty().await.unwrap());
        assert!(!table_path.exists());

        let mut writer = registry.write().await;
        writer.upsert(object("a.txt", 1)).await.unwrap();
        writer.upsert(object("b.txt", 2)).await.unwrap();
        writer.upsert(object("a.txt", 10)).await.unwrap();
        assert_eq!(writer.len().await.unwrap(), 2);
        assert_eq!(writer.delete("b.txt").await.unwrap(), 1);
        assert_eq!(writer.delete("a.txt").await.unwrap(), 0);
        drop(writer);

        assert!(table_path.exists());
        assert!(registry.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn object_without_content_type_round_trips() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let registry = ObjectRegistry::for_bucket(dir.path(), "b", &TableLocks::new());
        let mut row = object("raw", 3);
        row.content_type = None;
        registry.write().await.upsert(row.clone()).await.unwrap();
        assert_eq!(registry.read().await.get("raw").await.unwrap(), Some(row));
    }
}

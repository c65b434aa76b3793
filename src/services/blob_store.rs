//! ObjectBlobStore: object payloads on local disk.
//!
//! A blob lives at `base_path/{bucket}/{key}`, next to the bucket's object
//! registry. Writes stream into a temp file in the bucket directory and are
//! renamed into place; the blob being replaced or deleted is first parked
//! under a trash name so the caller can restore it if the matching registry
//! update fails.

use crate::services::{table::TEMP_PREFIX, validation::TRASH_PREFIX};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ObjectBlobStore {
    /// Storage root; each bucket is a directory beneath it.
    base_path: PathBuf,
}

/// A fully written payload that is not visible under its key yet.
#[derive(Debug)]
pub struct StagedBlob {
    tmp_path: PathBuf,
    /// Bytes actually written.
    pub size_bytes: u64,
    /// Hex MD5 of the payload.
    pub etag: String,
}

/// A payload renamed into place. Until [`finalize`](Self::finalize) the
/// previous payload (if any) is still kept aside for [`rollback`](Self::rollback).
#[derive(Debug)]
pub struct CommittedBlob {
    path: PathBuf,
    backup: Option<PathBuf>,
    pub size_bytes: u64,
    pub etag: String,
}

/// A payload moved out of its key ahead of a delete.
#[derive(Debug)]
pub struct StashedBlob {
    original: PathBuf,
    trash: PathBuf,
    bucket_root: PathBuf,
}

impl ObjectBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Physical directory of a bucket. Does not check for existence.
    pub fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Physical path of an object payload. Parent directories may not exist.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.bucket_root(bucket);
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    /// Stream `stream` into a temp file inside the bucket directory.
    ///
    /// Size and MD5 are computed from the bytes written. The temp file is
    /// removed if the stream or the disk fails.
    pub async fn stage<S>(&self, bucket: &str, stream: S) -> io::Result<StagedBlob>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let tmp_path = self
            .bucket_root(bucket)
            .join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        let written: io::Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                size_bytes += chunk.len() as u64;
                digest.consume(&chunk);
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        Ok(StagedBlob {
            tmp_path,
            size_bytes,
            etag: format!("{:x}", digest.compute()),
        })
    }

    /// Move a staged payload under `key`, parking any previous payload.
    pub async fn commit(
        &self,
        staged: StagedBlob,
        bucket: &str,
        key: &str,
    ) -> io::Result<CommittedBlob> {
        let StagedBlob {
            tmp_path,
            size_bytes,
            etag,
        } = staged;
        let path = self.object_path(bucket, key);

        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        }

        let backup = match self.park(bucket, &path).await {
            Ok(backup) => backup,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, &path).await;
            }
            return Err(err);
        }

        Ok(CommittedBlob {
            path,
            backup,
            size_bytes,
            etag,
        })
    }

    pub async fn open(&self, bucket: &str, key: &str) -> io::Result<File> {
        File::open(self.object_path(bucket, key)).await
    }

    /// Move the payload under `key` aside. `None` if there is no payload.
    pub async fn stash(&self, bucket: &str, key: &str) -> io::Result<Option<StashedBlob>> {
        let original = self.object_path(bucket, key);
        Ok(self
            .park(bucket, &original)
            .await?
            .map(|trash| StashedBlob {
                original,
                trash,
                bucket_root: self.bucket_root(bucket),
            }))
    }

    async fn park(&self, bucket: &str, path: &Path) -> io::Result<Option<PathBuf>> {
        let trash = self
            .bucket_root(bucket)
            .join(format!("{TRASH_PREFIX}{}", Uuid::new_v4()));
        match fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(io::Error::new(
                    ErrorKind::IsADirectory,
                    format!("{} is a directory", path.display()),
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        }
        match fs::rename(path, &trash).await {
            Ok(()) => Ok(Some(trash)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl CommittedBlob {
    /// Drop the previous payload; the new one stays.
    pub async fn finalize(self) -> io::Result<()> {
        if let Some(backup) = &self.backup {
            fs::remove_file(backup).await?;
        }
        Ok(())
    }

    /// Put the previous payload back, or remove the new one if there was none.
    pub async fn rollback(self) -> io::Result<()> {
        match &self.backup {
            Some(backup) => fs::rename(backup, &self.path).await,
            None => fs::remove_file(&self.path).await,
        }
    }
}

impl StashedBlob {
    pub async fn restore(self) -> io::Result<()> {
        fs::rename(&self.trash, &self.original).await
    }

    /// Delete the parked payload and prune directories left empty by it.
    pub async fn discard(self) -> io::Result<()> {
        fs::remove_file(&self.trash).await?;
        if let Some(parent) = self.original.parent() {
            prune_empty_dirs(parent, &self.bucket_root).await;
        }
        Ok(())
    }
}

/// Remove empty directories from `start` up to, but not including, `stop`.
///
/// Stops at the first directory that is not empty, missing, or that fails
/// to be removed.
async fn prune_empty_dirs(start: &Path, stop: &Path) {
    let mut current = start.to_path_buf();
    while current.starts_with(stop) && current != stop {
        match fs::remove_dir(&current).await {
            Ok(()) => match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            },
            Err(err) if err.kind() == ErrorKind::NotFound => break,
            Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
            Err(err) => {
                debug!("failed to prune directory {}: {}", current.display(), err);
                break;
            }
        }
    }
}

//! Durable row store backing both registries.
//!
//! A table is a CSV file: one header row followed by keyed data rows, where
//! field 0 of every row is its key. Every mutation reads the full file,
//! modifies it in memory and rewrites it through a temp file plus an atomic
//! rename, so a reader always sees a complete table.
//!
//! Each table path owns one `RwLock` taken from a shared [`TableLocks`] map:
//! [`Table::read`] holds the shared half, [`Table::write`] the exclusive half
//! for as long as the returned guard lives.

use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fmt,
    io::{self, ErrorKind},
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock},
};
use tracing::debug;
use uuid::Uuid;

/// Prefix of the scratch files written next to a table during a rewrite.
pub const TEMP_PREFIX: &str = ".tmp-";

/// A row type that can live in a [`Table`].
pub trait TableRow: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Column names, in field order. Field 0 is the key column.
    const HEADER: &'static [&'static str];

    fn key(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("table `{}`: malformed content: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("table `{}`: unexpected header `{found}`", path.display())]
    Header { path: PathBuf, found: String },
}

pub type TableResult<T> = Result<T, TableError>;

/// Lock map shared by every table opened from the same storage root.
///
/// A path keeps its entry only while some [`Table`] or guard for it is alive,
/// so the map holds the tables in use and nothing else.
#[derive(Clone, Default)]
pub struct TableLocks {
    inner: Arc<DashMap<PathBuf, LockSlot>>,
    #[cfg(test)]
    faults: Arc<DashMap<PathBuf, WriteFault>>,
}

/// The shared lock of one path and how many [`LockEntry`] values point at it.
type LockSlot = (Arc<RwLock<()>>, usize);

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of table paths currently holding a lock entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Register interest in `path`, creating its lock on first use.
    fn acquire(&self, path: &Path) -> LockEntry {
        let mut slot = self
            .inner
            .entry(path.to_path_buf())
            .or_insert_with(|| (Arc::default(), 0));
        slot.1 += 1;
        let lock = slot.0.clone();
        drop(slot);
        LockEntry {
            path: path.to_path_buf(),
            locks: self.clone(),
            lock,
        }
    }

    /// Counterpart of [`acquire`](Self::acquire); the last release removes the entry.
    fn release(&self, path: &Path) {
        if let Entry::Occupied(mut slot) = self.inner.entry(path.to_path_buf()) {
            slot.get_mut().1 -= 1;
            if slot.get().1 == 0 {
                slot.remove();
            }
        }
    }
}

impl fmt::Debug for TableLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLocks")
            .field("tables", &self.inner.len())
            .finish()
    }
}

#[cfg(test)]
type WriteFault = Arc<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

#[cfg(test)]
impl TableLocks {
    /// Run `fault` before every rewrite of `path`; an error aborts the rewrite
    /// exactly like a failed disk write would.
    pub(crate) fn inject_write_fault<F>(&self, path: impl Into<PathBuf>, fault: F)
    where
        F: Fn(&Path) -> io::Result<()> + Send + Sync + 'static,
    {
        self.faults.insert(path.into(), Arc::new(fault));
    }

    pub(crate) fn clear_write_fault(&self, path: &Path) {
        self.faults.remove(path);
    }

    fn write_fault(&self, path: &Path) -> io::Result<()> {
        let fault = self.faults.get(path).map(|fault| fault.value().clone());
        match fault {
            Some(fault) => fault(path),
            None => Ok(()),
        }
    }
}

/// One registration of a path in [`TableLocks`], released on drop.
struct LockEntry {
    path: PathBuf,
    locks: TableLocks,
    lock: Arc<RwLock<()>>,
}

impl Drop for LockEntry {
    fn drop(&mut self) {
        self.locks.release(&self.path);
    }
}

/// Handle to one table file.
pub struct Table<R> {
    path: PathBuf,
    entry: Arc<LockEntry>,
    _row: PhantomData<fn() -> R>,
}

impl<R> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            entry: self.entry.clone(),
            _row: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("path", &self.path).finish()
    }
}

impl<R: TableRow> Table<R> {
    pub fn open(path: impl Into<PathBuf>, locks: &TableLocks) -> Self {
        let path = path.into();
        let entry = Arc::new(locks.acquire(&path));
        Self {
            path,
            entry,
            _row: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every data row. A table file that does not exist yet has no rows.
    pub async fn load(&self) -> TableResult<Vec<R>> {
        self.read().await.rows().await
    }

    /// Shared access for multi-step reads.
    pub async fn read(&self) -> TableReader<R> {
        TableReader {
            path: self.path.clone(),
            _guard: self.entry.lock.clone().read_owned().await,
            _entry: self.entry.clone(),
            _row: PhantomData,
        }
    }

    /// Exclusive access; every mutation goes through the returned guard.
    pub async fn write(&self) -> TableWriter<R> {
        TableWriter {
            path: self.path.clone(),
            rows: None,
            _guard: self.entry.lock.clone().write_owned().await,
            _entry: self.entry.clone(),
        }
    }

    pub async fn append(&self, row: R) -> TableResult<()> {
        self.write().await.append(row).await
    }

    pub async fn replace(&self, key: &str, row: R) -> TableResult<bool> {
        self.write().await.replace(key, row).await
    }

    pub async fn remove(&self, key: &str) -> TableResult<Option<R>> {
        self.write().await.remove(key).await
    }
}

/// Shared guard over a table; released on drop.
///
/// The guard field is declared before the entry so the lock is released
/// before its map entry can go away.
pub struct TableReader<R> {
    path: PathBuf,
    _guard: OwnedRwLockReadGuard<()>,
    _entry: Arc<LockEntry>,
    _row: PhantomData<fn() -> R>,
}

impl<R: TableRow> TableReader<R> {
    pub async fn rows(&self) -> TableResult<Vec<R>> {
        read_rows(&self.path).await
    }

    pub async fn get(&self, key: &str) -> TableResult<Option<R>> {
        Ok(self.rows().await?.into_iter().find(|row| row.key() == key))
    }
}

/// Exclusive guard over a table; released on drop, including error paths.
///
/// While the guard is held nobody else can change the file, so the rows are
/// read once and kept in memory for the rest of the critical section.
pub struct TableWriter<R> {
    path: PathBuf,
    rows: Option<Vec<R>>,
    _guard: OwnedRwLockWriteGuard<()>,
    _entry: Arc<LockEntry>,
}

impl<R: TableRow> TableWriter<R> {
    pub async fn rows(&mut self) -> TableResult<&[R]> {
        Ok(self.cached().await?.as_slice())
    }

    pub async fn get(&mut self, key: &str) -> TableResult<Option<R>> {
        Ok(self.rows().await?.iter().find(|row| row.key() == key).cloned())
    }

    /// Write the header alone if the file does not exist yet.
    pub async fn ensure(&mut self) -> TableResult<()> {
        match fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => self.commit(Vec::new()).await,
            Err(source) => Err(TableError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Add a row at the end. Uniqueness is the caller's concern.
    pub async fn append(&mut self, row: R) -> TableResult<()> {
        let mut rows = self.cached().await?.clone();
        rows.push(row);
        self.commit(rows).await
    }

    /// Replace the row stored under `key`, keeping its position.
    /// Returns `false` (and writes nothing) if the key is absent.
    pub async fn replace(&mut self, key: &str, row: R) -> TableResult<bool> {
        let mut rows = self.cached().await?.clone();
        let Some(slot) = rows.iter_mut().find(|existing| existing.key() == key) else {
            return Ok(false);
        };
        *slot = row;
        self.commit(rows).await?;
        Ok(true)
    }

    /// Replace the row with the same key, or append it.
    pub async fn upsert(&mut self, row: R) -> TableResult<()> {
        let key = row.key().to_string();
        if !self.replace(&key, row.clone()).await? {
            self.append(row).await?;
        }
        Ok(())
    }

    /// Remove the row stored under `key`. Absent keys are a no-op.
    pub async fn remove(&mut self, key: &str) -> TableResult<Option<R>> {
        let mut rows = self.cached().await?.clone();
        let Some(pos) = rows.iter().position(|row| row.key() == key) else {
            return Ok(None);
        };
        let removed = rows.remove(pos);
        self.commit(rows).await?;
        Ok(Some(removed))
    }

    /// Replace the whole content with `rows`.
    pub async fn write_all(&mut self, rows: Vec<R>) -> TableResult<()> {
        self.commit(rows).await
    }

    async fn cached(&mut self) -> TableResult<&Vec<R>> {
        if self.rows.is_none() {
            self.rows = Some(read_rows(&self.path).await?);
        }
        Ok(self.rows.get_or_insert_with(Vec::new))
    }

    async fn commit(&mut self, rows: Vec<R>) -> TableResult<()> {
        // Drop the cache first so a failed rewrite is re-read on next access.
        self.rows = None;
        #[cfg(test)]
        self._entry
            .locks
            .write_fault(&self.path)
            .map_err(|source| TableError::Io {
                path: self.path.clone(),
                source,
            })?;
        write_rows(&self.path, &rows).await?;
        self.rows = Some(rows);
        Ok(())
    }
}

async fn read_rows<R: TableRow>(path: &Path) -> TableResult<Vec<R>> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(TableError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_rows(path, &raw)
}

fn parse_rows<R: TableRow>(path: &Path, raw: &[u8]) -> TableResult<Vec<R>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(raw);
    let header = reader.headers().map_err(csv_err)?;
    if !header.iter().eq(R::HEADER.iter().copied()) {
        return Err(TableError::Header {
            path: path.to_path_buf(),
            found: header.iter().collect::<Vec<_>>().join(","),
        });
    }

    reader
        .deserialize::<R>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)
}

fn encode_rows<R: TableRow>(path: &Path, rows: &[R]) -> TableResult<Vec<u8>> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(R::HEADER).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.into_inner().map_err(|err| TableError::Io {
        path: path.to_path_buf(),
        source: err.into_error(),
    })
}

/// Rewrite the full table via a sibling temp file and an atomic rename.
async fn write_rows<R: TableRow>(path: &Path, rows: &[R]) -> TableResult<()> {
    let encoded = encode_rows(path, rows)?;
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = parent.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));

    let written = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(&encoded).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(io_err(err));
    }

    debug!("rewrote table {} ({} rows)", path.display(), rows.len());
    Ok(())
}

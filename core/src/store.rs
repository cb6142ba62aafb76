use crate::codec::{decode_id, id_key};
use crate::error::{IndexError, Result};
use parking_lot::Mutex;
use sled::IVec;
use std::fs;
use std::path::{Path, PathBuf};

const ENTRIES_TREE: &str = "entries";
const SEQUENCE_TREE: &str = "sequence";
const LEASE_KEY: &[u8] = b"lease";

/// Number of ids reserved from durable storage per allocator refill.
pub const ID_BLOCK_SIZE: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub cache_capacity: u64,
    pub flush_every_ms: Option<u64>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { cache_capacity: 16 * 1024 * 1024, flush_every_ms: Some(500) }
    }
}

#[derive(Debug)]
struct IdBlock {
    next: u64,
    end: u64,
}

/// One durable ordered key-value database living in its own directory.
///
/// Reads see a consistent view per call, writes to a single key are
/// linearized through compare-and-swap. Nothing spans keys.
pub struct KvStore {
    path: PathBuf,
    db: sled::Db,
    entries: sled::Tree,
    sequence: sled::Tree,
    ids: Mutex<IdBlock>,
}

impl KvStore {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |e: &dyn std::fmt::Display| {
            IndexError::StoreUnavailable(format!("{}: {e}", path.display()))
        };
        fs::create_dir_all(&path).map_err(|e| unavailable(&e))?;
        let db = sled::Config::default()
            .path(&path)
            .cache_capacity(options.cache_capacity)
            .flush_every_ms(options.flush_every_ms)
            .open()
            .map_err(|e| unavailable(&e))?;
        let entries = db.open_tree(ENTRIES_TREE).map_err(|e| unavailable(&e))?;
        let sequence = db.open_tree(SEQUENCE_TREE).map_err(|e| unavailable(&e))?;
        tracing::debug!(path = %path.display(), keys = entries.len(), "opened store");
        Ok(Self { path, db, entries, sequence, ids: Mutex::new(IdBlock { next: 0, end: 0 }) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key)?.map(|v| v.to_vec()))
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.contains_key(key)?)
    }

    pub fn set(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.entries.insert(key, value)?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.remove(key)?;
        Ok(())
    }

    /// Conditional put: stores `value` only if `key` is absent.
    /// Returns `None` when this call won, otherwise the value already stored.
    pub fn insert_if_absent(&self, key: &[u8], value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let proposed = IVec::from(value);
        loop {
            match self.entries.compare_and_swap(key, None::<&[u8]>, Some(proposed.clone()))? {
                Ok(()) => return Ok(None),
                Err(conflict) => {
                    if let Some(current) = conflict.current {
                        return Ok(Some(current.to_vec()));
                    }
                }
            }
        }
    }

    /// Read-modify-write of one key. `f` sees the current value and returns
    /// the replacement (`None` deletes). Retried until no writer interleaves.
    pub fn update<F>(&self, key: &[u8], f: F) -> Result<Option<Vec<u8>>>
    where
        F: FnMut(Option<&[u8]>) -> Result<Option<Vec<u8>>>,
    {
        Ok(cas_update(&self.entries, key, f)?.map(|v| v.to_vec()))
    }

    /// Lazily walks every entry in key order. Each call starts a new scan.
    pub fn scan_all(&self) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {
        self.entries
            .iter()
            .map(|item| item.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(IndexError::from))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocates the next id. Blocks of [`ID_BLOCK_SIZE`] are leased from the
    /// `sequence` tree and the lease is flushed before any id is handed out,
    /// so ids survive restarts unused rather than reused.
    pub fn next_id(&self) -> Result<u64> {
        let mut block = self.ids.lock();
        if block.next >= block.end {
            let end = self.lease_block()?;
            block.next = end - ID_BLOCK_SIZE;
            block.end = end;
        }
        let id = block.next;
        block.next += 1;
        Ok(id)
    }

    fn lease_block(&self) -> Result<u64> {
        let lease = cas_update(&self.sequence, LEASE_KEY, |current| {
            let start = current.map(decode_id).transpose()?.unwrap_or(0);
            Ok(Some(id_key(start + ID_BLOCK_SIZE).to_vec()))
        })?;
        self.sequence.flush()?;
        let end = match lease {
            Some(bytes) => decode_id(&bytes)?,
            None => return Err(IndexError::malformed("lease", "sequence lease vanished")),
        };
        tracing::debug!(path = %self.path.display(), end, "leased id block");
        Ok(end)
    }

    /// Copies every tree, sequence lease included, into a fresh store at
    /// `destination`.
    pub fn snapshot<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        let destination = destination.as_ref();
        if destination.exists() && fs::read_dir(destination)?.next().is_some() {
            return Err(IndexError::StoreUnavailable(format!(
                "snapshot destination {} is not empty",
                destination.display()
            )));
        }
        fs::create_dir_all(destination)?;
        self.db.flush()?;
        let target = sled::Config::default().path(destination).open()?;
        target.import(self.db.export());
        target.flush()?;
        tracing::info!(from = %self.path.display(), to = %destination.display(), "store snapshot written");
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::debug!(path = %self.path.display(), "closed store");
        Ok(())
    }
}

fn cas_update<F>(tree: &sled::Tree, key: &[u8], mut f: F) -> Result<Option<IVec>>
where
    F: FnMut(Option<&[u8]>) -> Result<Option<Vec<u8>>>,
{
    loop {
        let current = tree.get(key)?;
        let next = f(current.as_deref())?.map(IVec::from);
        if tree.compare_and_swap(key, current.as_ref(), next.clone())?.is_ok() {
            return Ok(next);
        }
    }
}

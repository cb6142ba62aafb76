use crate::codec::{decode_id, decode_string, id_key};
use crate::error::{IndexError, Result};
use crate::store::{KvStore, StoreOptions};
use std::path::Path;

/// `key -> id` table. Owns the id allocator of its namespace.
pub struct MappingIndex {
    store: KvStore,
}

impl MappingIndex {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        Ok(Self { store: KvStore::open(path, options)? })
    }

    /// Returns the id stored for `key`, allocating one if absent.
    ///
    /// Concurrent callers racing on an unseen key each allocate, but only
    /// one conditional put lands; the others adopt the stored id. The losing
    /// allocation is simply never used.
    pub fn get_or_create(&self, key: &str) -> Result<u64> {
        self.resolve(key).map(|(id, _)| id)
    }

    /// Like [`Self::get_or_create`], also telling whether `key` was already
    /// stored when the call began (`true`) or went through allocation.
    pub fn resolve(&self, key: &str) -> Result<(u64, bool)> {
        if let Some(raw) = self.store.get(key.as_bytes())? {
            return Ok((decode_id(&raw)?, true));
        }
        let candidate = self.store.next_id()?;
        match self.store.insert_if_absent(key.as_bytes(), id_key(candidate).to_vec())? {
            None => Ok((candidate, false)),
            Some(winner) => Ok((decode_id(&winner)?, false)),
        }
    }

    pub fn lookup(&self, key: &str) -> Result<u64> {
        match self.store.get(key.as_bytes())? {
            Some(raw) => decode_id(&raw),
            None => Err(IndexError::NotFound(key.to_string())),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.delete(key.as_bytes())
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(String, u64)>> {
        self.store.scan_all().map(|item| {
            let (k, v) = item?;
            Ok((decode_string(&k, &k)?, decode_id(&v)?))
        })
    }

    pub fn ids(&self) -> Result<Vec<u64>> {
        self.entries().map(|e| e.map(|(_, id)| id)).collect()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

/// `id -> key` mirror of a [`MappingIndex`].
pub struct ReverseMappingIndex {
    store: KvStore,
}

impl ReverseMappingIndex {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        Ok(Self { store: KvStore::open(path, options)? })
    }

    pub fn insert(&self, id: u64, key: &str) -> Result<()> {
        self.store.set(&id_key(id), key.as_bytes().to_vec())
    }

    pub fn lookup(&self, id: u64) -> Result<String> {
        let k = id_key(id);
        match self.store.get(&k)? {
            Some(raw) => decode_string(&k, &raw),
            None => Err(IndexError::NotFound(format!("id {id}"))),
        }
    }

    pub fn remove(&self, id: u64) -> Result<()> {
        self.store.delete(&id_key(id))
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(u64, String)>> {
        self.store.scan_all().map(|item| {
            let (k, v) = item?;
            Ok((decode_id(&k)?, decode_string(&k, &v)?))
        })
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

/// Forward and reverse tables kept in step: every id handed out by
/// [`IdMapping::get_or_create`] has its reverse entry written before return.
pub struct IdMapping {
    pub forward: MappingIndex,
    pub reverse: ReverseMappingIndex,
}

impl IdMapping {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(forward: P, reverse: Q, options: &StoreOptions) -> Result<Self> {
        Ok(Self {
            forward: MappingIndex::open(forward, options)?,
            reverse: ReverseMappingIndex::open(reverse, options)?,
        })
    }

    /// Hits cost one read. A call that allocated, or lost the race to
    /// allocate, writes the reverse entry itself so it exists on return.
    pub fn get_or_create(&self, key: &str) -> Result<u64> {
        let (id, existed) = self.forward.resolve(key)?;
        if !existed {
            self.reverse.insert(id, key)?;
        }
        Ok(id)
    }

    pub fn id_of(&self, key: &str) -> Result<u64> {
        self.forward.lookup(key)
    }

    pub fn key_of(&self, id: u64) -> Result<String> {
        self.reverse.lookup(id)
    }

    /// Drops both directions. The id is retired, a rediscovered key gets a new one.
    pub fn remove(&self, key: &str) -> Result<()> {
        match self.forward.lookup(key) {
            Ok(id) => {
                self.forward.remove(key)?;
                self.reverse.remove(id)
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn flush(&self) -> Result<()> {
        self.forward.store().flush()?;
        self.reverse.store().flush()
    }

    pub fn close(self) -> Result<()> {
        self.forward.close()?;
        self.reverse.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn mapping(dir: &Path) -> IdMapping {
        IdMapping::open(dir.join("fwd"), dir.join("rev"), &StoreOptions::default()).unwrap()
    }

    #[test]
    fn get_or_create_is_stable_and_reversible() {
        let dir = tempdir().unwrap();
        let ids = mapping(dir.path());
        let a = ids.get_or_create("https://example.com/a").unwrap();
        let b = ids.get_or_create("https://example.com/b").unwrap();
        assert_ne!(a, b);
        assert_eq!(ids.get_or_create("https://example.com/a").unwrap(), a);
        assert_eq!(ids.key_of(a).unwrap(), "https://example.com/a");
        assert_eq!(ids.id_of("https://example.com/b").unwrap(), b);
    }

    #[test]
    fn missing_keys_are_not_found() {
        let dir = tempdir().unwrap();
        let ids = mapping(dir.path());
        assert!(ids.id_of("nope").unwrap_err().is_not_found());
        assert!(ids.key_of(42).unwrap_err().is_not_found());
    }

    #[test]
    fn racing_callers_agree_on_one_id() {
        let dir = tempdir().unwrap();
        let ids = Arc::new(mapping(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || {
                    (0..50).map(|i| ids.get_or_create(&format!("term{i}")).unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        let distinct: HashSet<u64> = results[0].iter().copied().collect();
        assert_eq!(distinct.len(), 50);
        for (i, id) in results[0].iter().enumerate() {
            assert_eq!(ids.key_of(*id).unwrap(), format!("term{i}"));
        }
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn hits_leave_the_reverse_table_alone() {
        let dir = tempdir().unwrap();
        let ids = mapping(dir.path());
        let id = ids.get_or_create("harbour").unwrap();
        assert_eq!(ids.forward.resolve("harbour").unwrap(), (id, true));
        ids.reverse.remove(id).unwrap();
        assert_eq!(ids.get_or_create("harbour").unwrap(), id);
        assert!(ids.key_of(id).unwrap_err().is_not_found());
        assert_eq!(ids.reverse.store().len(), 0);
    }

    #[test]
    fn removed_key_gets_a_fresh_id() {
        let dir = tempdir().unwrap();
        let ids = mapping(dir.path());
        let old = ids.get_or_create("page").unwrap();
        ids.remove("page").unwrap();
        assert!(ids.key_of(old).unwrap_err().is_not_found());
        let new = ids.get_or_create("page").unwrap();
        assert_ne!(old, new);
    }
}

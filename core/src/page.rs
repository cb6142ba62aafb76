use crate::codec::{decode, decode_id, encode, id_key};
use crate::error::{IndexError, Result};
use crate::store::{KvStore, StoreOptions};
use crate::{DocId, PageRecord};
use std::path::Path;

/// `document id -> PageRecord`.
pub struct PageMetadataIndex {
    store: KvStore,
}

impl PageMetadataIndex {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        Ok(Self { store: KvStore::open(path, options)? })
    }

    pub fn upsert(&self, doc_id: DocId, record: &PageRecord) -> Result<()> {
        self.store.set(&id_key(doc_id), encode(record)?)
    }

    /// Stores a stub for `doc_id` unless a record already exists.
    /// Returns true when the stub was written.
    pub fn register_placeholder(&self, doc_id: DocId, url: &str) -> Result<bool> {
        let stub = encode(&PageRecord::placeholder(url))?;
        Ok(self.store.insert_if_absent(&id_key(doc_id), stub)?.is_none())
    }

    pub fn get(&self, doc_id: DocId) -> Result<PageRecord> {
        let key = id_key(doc_id);
        match self.store.get(&key)? {
            Some(raw) => decode(&key, &raw),
            None => Err(IndexError::NotFound(format!("page {doc_id}"))),
        }
    }

    pub fn get_or_default(&self, doc_id: DocId) -> Result<PageRecord> {
        match self.get(doc_id) {
            Err(e) if e.is_not_found() => Ok(PageRecord::placeholder(String::new())),
            other => other,
        }
    }

    pub fn remove(&self, doc_id: DocId) -> Result<()> {
        self.store.delete(&id_key(doc_id))
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(DocId, PageRecord)>> {
        self.store.scan_all().map(|item| {
            let (k, v) = item?;
            Ok((decode_id(&k)?, decode(&k, &v)?))
        })
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

/// `document id -> body term count`, the length normalization used at ranking time.
pub struct DocumentLengthIndex {
    store: KvStore,
}

impl DocumentLengthIndex {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        Ok(Self { store: KvStore::open(path, options)? })
    }

    pub fn set(&self, doc_id: DocId, length: u64) -> Result<()> {
        self.store.set(&id_key(doc_id), id_key(length).to_vec())
    }

    pub fn get(&self, doc_id: DocId) -> Result<u64> {
        match self.store.get(&id_key(doc_id))? {
            Some(raw) => decode_id(&raw),
            None => Err(IndexError::NotFound(format!("length of {doc_id}"))),
        }
    }

    pub fn remove(&self, doc_id: DocId) -> Result<()> {
        self.store.delete(&id_key(doc_id))
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(DocId, u64)>> {
        self.store.scan_all().map(|item| {
            let (k, v) = item?;
            Ok((decode_id(&k)?, decode_id(&v)?))
        })
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

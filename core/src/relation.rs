use crate::codec::{decode, decode_id, encode, id_key};
use crate::error::Result;
use crate::store::{KvStore, StoreOptions};
use crate::{DocId, TermFrequency};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::Path;

/// Element of a forward list, deduplicated by [`Related::related_id`].
pub trait Related: Serialize + DeserializeOwned + Clone {
    fn related_id(&self) -> u64;
}

impl Related for u64 {
    fn related_id(&self) -> u64 {
        *self
    }
}

impl Related for TermFrequency {
    fn related_id(&self) -> u64 {
        self.term_id
    }
}

/// Forward index: `document id -> ordered list of related items`.
///
/// Used for parent->children and child->parents links (`T = u64`) and for
/// document->term frequencies (`T = TermFrequency`).
pub struct RelationIndex<T: Related> {
    store: KvStore,
    _item: PhantomData<fn() -> T>,
}

impl<T: Related> RelationIndex<T> {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        Ok(Self { store: KvStore::open(path, options)?, _item: PhantomData })
    }

    /// Replaces the list. Later duplicates of an id are dropped.
    pub fn set_related_list(&self, doc_id: DocId, items: &[T]) -> Result<()> {
        let mut seen = HashSet::new();
        let unique: Vec<T> = items.iter().filter(|i| seen.insert(i.related_id())).cloned().collect();
        self.store.set(&id_key(doc_id), encode(&unique)?)
    }

    /// Unions `items` into the stored list, keeping existing order.
    pub fn append_related(&self, doc_id: DocId, items: &[T]) -> Result<()> {
        let key = id_key(doc_id);
        self.store.update(&key, |current| {
            let mut list: Vec<T> = match current {
                Some(raw) => decode(&key, raw)?,
                None => Vec::new(),
            };
            let mut seen: HashSet<u64> = list.iter().map(Related::related_id).collect();
            list.extend(items.iter().filter(|i| seen.insert(i.related_id())).cloned());
            encode(&list).map(Some)
        })?;
        Ok(())
    }

    pub fn get_related_list(&self, doc_id: DocId) -> Result<Vec<T>> {
        let key = id_key(doc_id);
        match self.store.get(&key)? {
            Some(raw) => decode(&key, &raw),
            None => Ok(Vec::new()),
        }
    }

    pub fn contains(&self, doc_id: DocId) -> Result<bool> {
        self.store.contains(&id_key(doc_id))
    }

    pub fn remove(&self, doc_id: DocId) -> Result<()> {
        self.store.delete(&id_key(doc_id))
    }

    /// Drops one related id from a list; the key stays even when emptied.
    pub fn remove_related(&self, doc_id: DocId, related: u64) -> Result<()> {
        let key = id_key(doc_id);
        self.store.update(&key, |current| {
            let Some(raw) = current else { return Ok(None) };
            let mut list: Vec<T> = decode(&key, raw)?;
            list.retain(|i| i.related_id() != related);
            encode(&list).map(Some)
        })?;
        Ok(())
    }

    /// Number of documents with an entry.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn all_keys(&self) -> Result<Vec<DocId>> {
        self.store.scan_all().map(|item| decode_id(&item?.0)).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(DocId, Vec<T>)>> {
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

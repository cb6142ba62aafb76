use crate::codec::{decode, decode_id, encode, id_key};
use crate::error::{IndexError, Result};
use crate::store::{KvStore, StoreOptions};
use crate::{DocId, Posting, TermId};
use std::path::Path;

/// Inverted index: `term id -> postings sorted by document id`.
pub struct PostingIndex {
    store: KvStore,
}

impl PostingIndex {
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> Result<Self> {
        Ok(Self { store: KvStore::open(path, options)? })
    }

    /// Appends `positions` to the entry for (`term_id`, `doc_id`), creating it
    /// if needed. Repeating a call appends the same positions again.
    pub fn upsert(&self, term_id: TermId, doc_id: DocId, positions: &[u64]) -> Result<()> {
        let key = id_key(term_id);
        self.store.update(&key, |current| {
            let mut postings: Vec<Posting> = match current {
                Some(raw) => decode(&key, raw)?,
                None => Vec::new(),
            };
            match postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
                Ok(i) => postings[i].positions.extend_from_slice(positions),
                Err(i) => postings.insert(i, Posting { doc_id, positions: positions.to_vec() }),
            }
            encode(&postings).map(Some)
        })?;
        Ok(())
    }

    pub fn postings(&self, term_id: TermId) -> Result<Vec<Posting>> {
        let key = id_key(term_id);
        match self.store.get(&key)? {
            Some(raw) => decode(&key, &raw),
            None => Err(IndexError::NotFound(format!("postings for term {term_id}"))),
        }
    }

    pub fn document_frequency(&self, term_id: TermId) -> Result<u64> {
        Ok(self.postings(term_id)?.len() as u64)
    }

    pub fn positions(&self, term_id: TermId, doc_id: DocId) -> Result<Vec<u64>> {
        self.postings(term_id)?
            .into_iter()
            .find(|p| p.doc_id == doc_id)
            .map(|p| p.positions)
            .ok_or_else(|| IndexError::NotFound(format!("document {doc_id} under term {term_id}")))
    }

    /// Drops the document's entry; the term key goes with its last entry.
    pub fn remove_document(&self, term_id: TermId, doc_id: DocId) -> Result<()> {
        let key = id_key(term_id);
        self.store.update(&key, |current| {
            let Some(raw) = current else { return Ok(None) };
            let mut postings: Vec<Posting> = decode(&key, raw)?;
            postings.retain(|p| p.doc_id != doc_id);
            if postings.is_empty() {
                Ok(None)
            } else {
                encode(&postings).map(Some)
            }
        })?;
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(TermId, Vec<Posting>)>> {
        self.store.scan_all().map(|item| {
            let (k, v) = item?;
            Ok((decode_id(&k)?, decode(&k, &v)?))
        })
    }

    pub fn term_ids(&self) -> Result<Vec<TermId>> {
        self.store.scan_all().map(|item| decode_id(&item?.0)).collect()
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

use crate::error::Result;
use crate::mapping::IdMapping;
use crate::page::{DocumentLengthIndex, PageMetadataIndex};
use crate::posting::PostingIndex;
use crate::relation::RelationIndex;
use crate::store::{KvStore, StoreOptions};
use crate::{DocId, TermFrequency, TermId};
use std::path::{Path, PathBuf};

/// Directory names of the stores under the index root.
pub mod layout {
    pub const DOCUMENT_IDS: &str = "document_ids";
    pub const REVERSE_DOCUMENT_IDS: &str = "reverse_document_ids";
    pub const TERM_IDS: &str = "term_ids";
    pub const REVERSE_TERM_IDS: &str = "reverse_term_ids";
    pub const TITLE_POSTINGS: &str = "title_postings";
    pub const CONTENT_POSTINGS: &str = "content_postings";
    pub const DOCUMENT_TERMS: &str = "document_terms";
    pub const DOCUMENT_TITLE_TERMS: &str = "document_title_terms";
    pub const PARENT_CHILD: &str = "parent_child";
    pub const CHILD_PARENT: &str = "child_parent";
    pub const PAGE_METADATA: &str = "page_metadata";
    pub const DOCUMENT_LENGTHS: &str = "document_lengths";

    pub const ALL: [&str; 12] = [
        DOCUMENT_IDS,
        REVERSE_DOCUMENT_IDS,
        TERM_IDS,
        REVERSE_TERM_IDS,
        TITLE_POSTINGS,
        CONTENT_POSTINGS,
        DOCUMENT_TERMS,
        DOCUMENT_TITLE_TERMS,
        PARENT_CHILD,
        CHILD_PARENT,
        PAGE_METADATA,
        DOCUMENT_LENGTHS,
    ];
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn store(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Every index the crawler writes and the ranking engine reads, each in its
/// own store directory.
pub struct IndexSet {
    pub root: PathBuf,
    pub documents: IdMapping,
    pub terms: IdMapping,
    pub title_postings: PostingIndex,
    pub content_postings: PostingIndex,
    pub document_terms: RelationIndex<TermFrequency>,
    /// Distinct title term ids per document, so title postings can be
    /// dropped without scanning the title index.
    pub title_terms: RelationIndex<TermId>,
    pub children: RelationIndex<DocId>,
    pub parents: RelationIndex<DocId>,
    pub pages: PageMetadataIndex,
    pub lengths: DocumentLengthIndex,
}

impl IndexSet {
    pub fn open<P: AsRef<Path>>(root: P, options: &StoreOptions) -> Result<Self> {
        use layout::*;
        let paths = IndexPaths::new(root);
        let set = Self {
            documents: IdMapping::open(paths.store(DOCUMENT_IDS), paths.store(REVERSE_DOCUMENT_IDS), options)?,
            terms: IdMapping::open(paths.store(TERM_IDS), paths.store(REVERSE_TERM_IDS), options)?,
            title_postings: PostingIndex::open(paths.store(TITLE_POSTINGS), options)?,
            content_postings: PostingIndex::open(paths.store(CONTENT_POSTINGS), options)?,
            document_terms: RelationIndex::open(paths.store(DOCUMENT_TERMS), options)?,
            title_terms: RelationIndex::open(paths.store(DOCUMENT_TITLE_TERMS), options)?,
            children: RelationIndex::open(paths.store(PARENT_CHILD), options)?,
            parents: RelationIndex::open(paths.store(CHILD_PARENT), options)?,
            pages: PageMetadataIndex::open(paths.store(PAGE_METADATA), options)?,
            lengths: DocumentLengthIndex::open(paths.store(DOCUMENT_LENGTHS), options)?,
            root: paths.root,
        };
        tracing::info!(root = %set.root.display(), documents = set.documents.len(), terms = set.terms.len(), "opened index set");
        Ok(set)
    }

    /// Stores in [`layout::ALL`] order.
    pub fn stores(&self) -> [(&'static str, &KvStore); 12] {
        use layout::*;
        [
            (DOCUMENT_IDS, self.documents.forward.store()),
            (REVERSE_DOCUMENT_IDS, self.documents.reverse.store()),
            (TERM_IDS, self.terms.forward.store()),
            (REVERSE_TERM_IDS, self.terms.reverse.store()),
            (TITLE_POSTINGS, self.title_postings.store()),
            (CONTENT_POSTINGS, self.content_postings.store()),
            (DOCUMENT_TERMS, self.document_terms.store()),
            (DOCUMENT_TITLE_TERMS, self.title_terms.store()),
            (PARENT_CHILD, self.children.store()),
            (CHILD_PARENT, self.parents.store()),
            (PAGE_METADATA, self.pages.store()),
            (DOCUMENT_LENGTHS, self.lengths.store()),
        ]
    }

    pub fn store(&self, name: &str) -> Option<&KvStore> {
        self.stores().into_iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    /// Exports every store into `destination/<store name>`.
    pub fn snapshot<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        let paths = IndexPaths::new(destination);
        for (name, store) in self.stores() {
            store.snapshot(paths.store(name))?;
        }
        Ok(())
    }

    /// Drops the document's postings (title and content), both term lists
    /// and its length. Only the terms the document recorded are touched.
    pub fn clear_text(&self, doc_id: DocId) -> Result<()> {
        for tf in self.document_terms.get_related_list(doc_id)? {
            self.content_postings.remove_document(tf.term_id, doc_id)?;
        }
        for term_id in self.title_terms.get_related_list(doc_id)? {
            self.title_postings.remove_document(term_id, doc_id)?;
        }
        self.document_terms.remove(doc_id)?;
        self.title_terms.remove(doc_id)?;
        self.lengths.remove(doc_id)
    }

    /// Explicit document deletion: text, metadata, links in both directions
    /// and the url mapping. The id itself is retired.
    pub fn remove_document(&self, doc_id: DocId) -> Result<()> {
        self.clear_text(doc_id)?;
        self.pages.remove(doc_id)?;
        for child in self.children.get_related_list(doc_id)? {
            self.parents.remove_related(child, doc_id)?;
        }
        for parent in self.parents.get_related_list(doc_id)? {
            self.children.remove_related(parent, doc_id)?;
        }
        self.children.remove(doc_id)?;
        self.parents.remove(doc_id)?;
        match self.documents.key_of(doc_id) {
            Ok(url) => self.documents.remove(&url)?,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        tracing::info!(doc_id, "removed document");
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        for (_, store) in self.stores() {
            store.flush()?;
        }
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.documents.close()?;
        self.terms.close()?;
        self.title_postings.close()?;
        self.content_postings.close()?;
        self.document_terms.close()?;
        self.title_terms.close()?;
        self.children.close()?;
        self.parents.close()?;
        self.pages.close()?;
        self.lengths.close()?;
        tracing::info!("closed index set");
        Ok(())
    }
}

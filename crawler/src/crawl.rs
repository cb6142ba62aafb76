use crate::config::{CrawlConfig, RevisitPolicy};
use crate::error::CrawlError;
use crate::fetch::{FetchedPage, Fetcher};
use crate::parse::{normalize, parse_page, ParsedPage};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tokio::time::Instant;
use trawl_core::posting::PostingIndex;
use trawl_core::{DocId, IndexSet, PageRecord, TermFrequency, TermId, Tokenizer};
use url::Url;

type Visit = Pin<Box<dyn Future<Output = Result<(), CrawlError>> + Send>>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub pages_indexed: usize,
    pub documents_discovered: usize,
    pub links_recorded: usize,
    pub parent_links: usize,
    pub fetch_failures: usize,
}

/// Per-crawl dedup state, shared by every task of one traversal.
#[derive(Default)]
pub struct VisitLedger {
    /// Shallowest depth each document has been scheduled at.
    fetched: Mutex<HashMap<DocId, usize>>,
    indexed: Mutex<HashSet<DocId>>,
    discovered: Mutex<HashSet<DocId>>,
    pages_indexed: AtomicUsize,
    links_recorded: AtomicUsize,
    fetch_failures: AtomicUsize,
}

impl VisitLedger {
    /// True when `doc_id` has not been scheduled yet, or only deeper than
    /// `depth`. A shallower claim replaces the recorded depth, so a page first
    /// reached along a long path is expanded again from the short one.
    pub fn claim_fetch(&self, doc_id: DocId, depth: usize) -> bool {
        let mut fetched = self.fetched.lock();
        match fetched.get(&doc_id) {
            Some(&claimed) if claimed <= depth => false,
            _ => {
                fetched.insert(doc_id, depth);
                true
            }
        }
    }

    /// True the first time `doc_id`'s text is indexed.
    pub fn claim_index(&self, doc_id: DocId) -> bool {
        self.indexed.lock().insert(doc_id)
    }

    fn discover(&self, doc_id: DocId) {
        self.discovered.lock().insert(doc_id);
    }

    fn report(&self, parent_links: usize) -> CrawlReport {
        CrawlReport {
            pages_indexed: self.pages_indexed.load(Ordering::Relaxed),
            documents_discovered: self.discovered.lock().len(),
            links_recorded: self.links_recorded.load(Ordering::Relaxed),
            parent_links,
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Depth-bounded concurrent traversal that fills every index of an [`IndexSet`].
pub struct Crawler {
    indexes: Arc<IndexSet>,
    tokenizer: Arc<dyn Tokenizer>,
    fetcher: Fetcher,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(indexes: Arc<IndexSet>, tokenizer: Arc<dyn Tokenizer>, config: CrawlConfig) -> Result<Self, CrawlError> {
        config.validate()?;
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { indexes, tokenizer, fetcher, config })
    }

    pub fn indexes(&self) -> &Arc<IndexSet> {
        &self.indexes
    }

    /// Crawls from `seed`, then derives child->parent links once every page
    /// has finished.
    pub async fn crawl(self: Arc<Self>, seed: &str) -> Result<CrawlReport, CrawlError> {
        let seed = Url::parse(seed).map_err(|_| CrawlError::InvalidSeed(seed.to_string()))?;
        if !matches!(seed.scheme(), "http" | "https") {
            return Err(CrawlError::InvalidSeed(seed.to_string()));
        }
        let seed = normalize(&seed);
        let doc_id = self.indexes.documents.get_or_create(seed.as_str())?;
        self.indexes.pages.register_placeholder(doc_id, seed.as_str())?;

        let ledger = Arc::new(VisitLedger::default());
        ledger.discover(doc_id);
        ledger.claim_fetch(doc_id, 0);
        tracing::info!(
            %seed,
            max_depth = self.config.max_depth,
            max_concurrency = self.config.max_concurrency,
            revisit = ?self.config.revisit,
            "crawl started"
        );

        self.clone().visit(ledger.clone(), seed, doc_id, 0).await?;
        let parent_links = link_parents(&self.indexes)?;

        let report = ledger.report(parent_links);
        tracing::info!(?report, "crawl finished");
        Ok(report)
    }

    fn visit(self: Arc<Self>, ledger: Arc<VisitLedger>, url: Url, doc_id: DocId, depth: usize) -> Visit {
        Box::pin(async move {
            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(err @ CrawlError::FetchFailed { .. }) => {
                    ledger.fetch_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(%err, depth, "dropping branch");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            let parsed = parse_page(&page.body, &url);
            if ledger.claim_index(doc_id) {
                self.index_page(doc_id, &url, &page, &parsed)?;
                ledger.pages_indexed.fetch_add(1, Ordering::Relaxed);
            }

            let links = self.follow(&url, parsed.links);
            let children = self.clone().dispatch_links(&ledger, links).await?;

            // every probe has joined; the child list is final for this pass
            let child_ids: Vec<DocId> = children.iter().map(|(id, _)| *id).collect();
            self.indexes.children.append_related(doc_id, &child_ids)?;
            ledger.links_recorded.fetch_add(child_ids.len(), Ordering::Relaxed);
            tracing::debug!(%url, doc_id, depth, children = child_ids.len(), "page done");

            if depth >= self.config.max_depth {
                return Ok(());
            }
            let mut descents = JoinSet::new();
            for (child_id, child_url) in children {
                let claimed = ledger.claim_fetch(child_id, depth + 1);
                if !claimed && self.config.revisit == RevisitPolicy::Skip {
                    continue;
                }
                descents.spawn(self.clone().visit(ledger.clone(), child_url, child_id, depth + 1));
            }
            while let Some(joined) = descents.join_next().await {
                joined??;
            }
            Ok(())
        })
    }

    fn follow(&self, page: &Url, links: Vec<Url>) -> Vec<Url> {
        if !self.config.same_host_only {
            return links;
        }
        links.into_iter().filter(|l| l.host_str() == page.host_str()).collect()
    }

    /// Probes every link concurrently and returns the live ones with their
    /// document ids, in link order.
    async fn dispatch_links(self: Arc<Self>, ledger: &Arc<VisitLedger>, links: Vec<Url>) -> Result<Vec<(DocId, Url)>, CrawlError> {
        let mut probes = JoinSet::new();
        for (order, link) in links.into_iter().enumerate() {
            let crawler = self.clone();
            let ledger = ledger.clone();
            probes.spawn(async move { crawler.probe_link(&ledger, order, link).await });
        }

        let mut live = Vec::new();
        while let Some(joined) = probes.join_next().await {
            if let Some(hit) = joined?? {
                live.push(hit);
            }
        }
        live.sort_by_key(|(order, _, _)| *order);
        Ok(live.into_iter().map(|(_, id, url)| (id, url)).collect())
    }

    async fn probe_link(&self, ledger: &VisitLedger, order: usize, link: Url) -> Result<Option<(usize, DocId, Url)>, CrawlError> {
        match self.fetcher.probe(&link).await {
            Ok(()) => {}
            Err(err @ CrawlError::FetchFailed { .. }) => {
                ledger.fetch_failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%err, "link dropped");
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
        let child = self.indexes.documents.get_or_create(link.as_str())?;
        self.indexes.pages.register_placeholder(child, link.as_str())?;
        ledger.discover(child);
        Ok(Some((order, child, link)))
    }

    fn index_page(&self, doc_id: DocId, url: &Url, page: &FetchedPage, parsed: &ParsedPage) -> Result<(), CrawlError> {
        let idx = &self.indexes;
        if idx.document_terms.contains(doc_id)? {
            // indexed by an earlier crawl
            idx.clear_text(doc_id)?;
        }
        let title_terms = self.tokenizer.tokenize(&parsed.title);
        let body_terms = self.tokenizer.tokenize(&parsed.body);
        let title_ids: Vec<TermId> = self
            .write_postings(&idx.title_postings, doc_id, &title_terms)?
            .into_iter()
            .map(|tf| tf.term_id)
            .collect();
        let frequencies = self.write_postings(&idx.content_postings, doc_id, &body_terms)?;
        idx.title_terms.set_related_list(doc_id, &title_ids)?;
        idx.document_terms.set_related_list(doc_id, &frequencies)?;
        idx.lengths.set(doc_id, body_terms.len() as u64)?;
        idx.pages.upsert(
            doc_id,
            &PageRecord {
                title: parsed.title.clone(),
                url: url.to_string(),
                size_bytes: page.size_bytes,
                last_modified: page.last_modified.unwrap_or_else(OffsetDateTime::now_utc),
            },
        )?;
        tracing::info!(%url, doc_id, terms = body_terms.len(), distinct = frequencies.len(), "indexed page");
        Ok(())
    }

    /// Upserts the positions of each distinct term and returns its frequencies
    /// in first-occurrence order.
    fn write_postings(&self, postings: &PostingIndex, doc_id: DocId, terms: &[String]) -> Result<Vec<TermFrequency>, CrawlError> {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut positions: Vec<(&str, Vec<u64>)> = Vec::new();
        for (pos, term) in terms.iter().enumerate() {
            let slot = *slots.entry(term.as_str()).or_insert_with(|| {
                positions.push((term.as_str(), Vec::new()));
                positions.len() - 1
            });
            positions[slot].1.push(pos as u64);
        }

        let mut frequencies = Vec::with_capacity(positions.len());
        for (term, offsets) in positions {
            let term_id = self.indexes.terms.get_or_create(term)?;
            postings.upsert(term_id, doc_id, &offsets)?;
            frequencies.push(TermFrequency { term_id, frequency: offsets.len() as u64 });
        }
        Ok(frequencies)
    }
}

/// Second phase: read every parent->children list and append each parent to
/// its children's parent lists. Returns the number of edges written.
pub fn link_parents(indexes: &IndexSet) -> trawl_core::Result<usize> {
    let mut parents_of: BTreeMap<DocId, Vec<DocId>> = BTreeMap::new();
    for entry in indexes.children.entries() {
        let (parent, children) = entry?;
        for child in children {
            parents_of.entry(child).or_default().push(parent);
        }
    }
    let mut edges = 0;
    for (child, parents) in &parents_of {
        indexes.parents.append_related(*child, parents)?;
        edges += parents.len();
    }
    tracing::info!(children = parents_of.len(), edges, "parent links written");
    Ok(edges)
}

/// Closes every store once no other task holds `indexes`. Aborted crawl
/// tasks drop their handles asynchronously, so this polls until `patience`
/// runs out; then it only flushes and returns false.
pub async fn close_when_released(mut indexes: Arc<IndexSet>, patience: Duration) -> trawl_core::Result<bool> {
    let deadline = Instant::now() + patience;
    loop {
        match Arc::try_unwrap(indexes) {
            Ok(set) => {
                set.close()?;
                return Ok(true);
            }
            Err(shared) if Instant::now() >= deadline => {
                shared.flush()?;
                tracing::warn!(holders = Arc::strong_count(&shared), "index stores still shared, flushed only");
                return Ok(false);
            }
            Err(shared) => {
                indexes = shared;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

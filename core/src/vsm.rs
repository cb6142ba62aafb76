//! Vector-space ranking over the crawled index.
//!
//! Document weights are `tf / max_tf * idf` with `idf = log2(N / df)`, where
//! `N` is the number of documents with a term list and `df` comes from the
//! content postings. Query weights are `qf * idf`. Scores are cosine
//! similarities divided by the stored document length.

use crate::error::{IndexError, Result};
use crate::indexes::IndexSet;
use crate::tokenizer::Tokenizer;
use crate::{max_frequency, DocId, TermFrequency, TermId};
use std::collections::HashMap;

pub struct VectorSpaceModel<'a> {
    indexes: &'a IndexSet,
    tokenizer: &'a dyn Tokenizer,
}

#[derive(Debug)]
struct QueryTerm {
    term_id: Option<TermId>,
    idf: f64,
    weight: f64,
}

impl<'a> VectorSpaceModel<'a> {
    pub fn new(indexes: &'a IndexSet, tokenizer: &'a dyn Tokenizer) -> Self {
        Self { indexes, tokenizer }
    }

    pub fn corpus_size(&self) -> u64 {
        self.indexes.document_terms.size() as u64
    }

    /// `log2(N / df)`. `TermNotIndexed` when the term has no content postings.
    pub fn inverse_document_frequency(&self, term: &str) -> Result<f64> {
        let term_id = self.term_id(term)?;
        self.idf(term, term_id, self.corpus_size())
    }

    pub fn term_frequency(&self, term: &str, doc_id: DocId) -> Result<u64> {
        let term_id = match self.term_id(term) {
            Ok(id) => id,
            Err(IndexError::TermNotIndexed(_)) => return Ok(0),
            Err(e) => return Err(e),
        };
        let terms = self.indexes.document_terms.get_related_list(doc_id)?;
        Ok(terms.iter().find(|t| t.term_id == term_id).map_or(0, |t| t.frequency))
    }

    pub fn max_term_frequency(&self, doc_id: DocId) -> Result<u64> {
        Ok(max_frequency(&self.indexes.document_terms.get_related_list(doc_id)?))
    }

    pub fn term_weight(&self, term: &str, doc_id: DocId) -> Result<f64> {
        let max_tf = self.max_term_frequency(doc_id)?;
        if max_tf == 0 {
            return Ok(0.0);
        }
        let idf = match self.inverse_document_frequency(term) {
            Ok(idf) => idf,
            Err(IndexError::TermNotIndexed(_)) => return Ok(0.0),
            Err(e) => return Err(e),
        };
        let tf = self.term_frequency(term, doc_id)?;
        Ok(tf as f64 / max_tf as f64 * idf)
    }

    /// Cosine between the query and one document; 0 when either vector is zero.
    pub fn cosine_similarity(&self, query: &str, doc_id: DocId) -> Result<f64> {
        let query = self.query_vector(query)?;
        let terms = self.indexes.document_terms.get_related_list(doc_id)?;
        Ok(cosine(&query, &terms))
    }

    /// Scores every document that has a non-empty term list.
    pub fn compute_scores(&self, query: &str) -> Result<HashMap<DocId, f64>> {
        let query_vector = self.query_vector(query)?;
        let mut scores = HashMap::new();
        for entry in self.indexes.document_terms.entries() {
            let (doc_id, terms) = entry?;
            if terms.is_empty() {
                continue;
            }
            let length = match self.indexes.lengths.get(doc_id) {
                Ok(0) => 1,
                Ok(n) => n,
                Err(e) if e.is_not_found() => 1,
                Err(e) => return Err(e),
            };
            scores.insert(doc_id, cosine(&query_vector, &terms) / length as f64);
        }
        tracing::debug!(query, documents = scores.len(), "computed scores");
        Ok(scores)
    }

    /// Top `k` of [`Self::compute_scores`], best first; ties by document id.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(DocId, f64)>> {
        let mut ranked: Vec<(DocId, f64)> = self.compute_scores(query)?.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        Ok(ranked)
    }

    fn term_id(&self, term: &str) -> Result<TermId> {
        match self.indexes.terms.id_of(term) {
            Err(e) if e.is_not_found() => Err(IndexError::TermNotIndexed(term.to_string())),
            other => other,
        }
    }

    fn idf(&self, term: &str, term_id: TermId, corpus_size: u64) -> Result<f64> {
        let df = match self.indexes.content_postings.document_frequency(term_id) {
            Ok(0) => return Err(IndexError::TermNotIndexed(term.to_string())),
            Ok(df) => df,
            Err(e) if e.is_not_found() => return Err(IndexError::TermNotIndexed(term.to_string())),
            Err(e) => return Err(e),
        };
        if corpus_size == 0 {
            return Ok(0.0);
        }
        Ok((corpus_size as f64 / df as f64).log2())
    }

    fn query_vector(&self, query: &str) -> Result<Vec<QueryTerm>> {
        let mut counts: Vec<(String, u64)> = Vec::new();
        for term in self.tokenizer.tokenize(query) {
            match counts.iter_mut().find(|(t, _)| *t == term) {
                Some((_, n)) => *n += 1,
                None => counts.push((term, 1)),
            }
        }
        let n = self.corpus_size();
        let mut vector = Vec::with_capacity(counts.len());
        for (term, qf) in counts {
            let resolved = self.term_id(&term).and_then(|id| Ok((id, self.idf(&term, id, n)?)));
            let (term_id, idf) = match resolved {
                Ok((id, idf)) => (Some(id), idf),
                Err(IndexError::TermNotIndexed(_)) => (None, 0.0),
                Err(e) => return Err(e),
            };
            vector.push(QueryTerm { term_id, idf, weight: qf as f64 * idf });
        }
        Ok(vector)
    }
}

fn cosine(query: &[QueryTerm], terms: &[TermFrequency]) -> f64 {
    let max_tf = max_frequency(terms);
    let (mut dot, mut doc_norm, mut query_norm) = (0.0, 0.0, 0.0);
    for q in query {
        let tf = q
            .term_id
            .and_then(|id| terms.iter().find(|t| t.term_id == id))
            .map_or(0, |t| t.frequency);
        let d = if max_tf == 0 { 0.0 } else { tf as f64 / max_tf as f64 * q.idf };
        dot += d * q.weight;
        doc_norm += d * d;
        query_norm += q.weight * q.weight;
    }
    if doc_norm == 0.0 || query_norm == 0.0 {
        return 0.0;
    }
    dot / (doc_norm.sqrt() * query_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use tempfile::{tempdir, TempDir};

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }

    struct Corpus {
        _dir: TempDir,
        set: IndexSet,
    }

    impl Corpus {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
            Self { _dir: dir, set }
        }

        fn add(&self, url: &str, body: &str) -> DocId {
            let doc = self.set.documents.get_or_create(url).unwrap();
            let terms = words(body);
            let mut freqs: Vec<TermFrequency> = Vec::new();
            for (pos, term) in terms.iter().enumerate() {
                let id = self.set.terms.get_or_create(term).unwrap();
                self.set.content_postings.upsert(id, doc, &[pos as u64]).unwrap();
                match freqs.iter_mut().find(|f| f.term_id == id) {
                    Some(f) => f.frequency += 1,
                    None => freqs.push(TermFrequency { term_id: id, frequency: 1 }),
                }
            }
            self.set.document_terms.set_related_list(doc, &freqs).unwrap();
            self.set.lengths.set(doc, terms.len() as u64).unwrap();
            doc
        }

        fn model(&self) -> VectorSpaceModel<'_> {
            VectorSpaceModel::new(&self.set, &words)
        }
    }

    #[test]
    fn empty_corpus_scores_nothing() {
        let corpus = Corpus::new();
        assert!(corpus.model().compute_scores("anything at all").unwrap().is_empty());
    }

    #[test]
    fn term_in_every_document_contributes_nothing() {
        let corpus = Corpus::new();
        let p1 = corpus.add("p1", "ocean");
        let p2 = corpus.add("p2", "ocean ocean");
        let vsm = corpus.model();
        assert_eq!(vsm.corpus_size(), 2);
        let term_id = corpus.set.terms.id_of("ocean").unwrap();
        assert_eq!(corpus.set.content_postings.document_frequency(term_id).unwrap(), 2);
        assert_eq!(vsm.inverse_document_frequency("ocean").unwrap(), 0.0);
        assert_eq!(vsm.term_weight("ocean", p2).unwrap(), 0.0);
        let scores = vsm.compute_scores("ocean").unwrap();
        assert_eq!(scores[&p1], 0.0);
        assert_eq!(scores[&p2], 0.0);
    }

    #[test]
    fn only_matching_document_scores_positive_and_highest() {
        let corpus = Corpus::new();
        let crab = corpus.add("a", "rust crab shell");
        let other = corpus.add("b", "tide moon");
        corpus.add("c", "forest tree moss");
        let scores = corpus.model().compute_scores("crab shell").unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores[&crab] > 0.0);
        assert!(scores.iter().all(|(doc, s)| *doc == crab || *s < scores[&crab]));
        assert_eq!(scores[&other], 0.0);
        let top = corpus.model().search("crab shell", 1).unwrap();
        assert_eq!(top[0].0, crab);
    }

    #[test]
    fn self_similarity_is_finite_and_dominates() {
        let corpus = Corpus::new();
        let text = "alpha beta beta gamma";
        let doc = corpus.add("self", text);
        let unrelated = corpus.add("other", "delta epsilon");
        corpus.add("third", "alpha zeta");
        let vsm = corpus.model();
        let own = vsm.cosine_similarity(text, doc).unwrap();
        let foreign = vsm.cosine_similarity(text, unrelated).unwrap();
        assert!(!own.is_nan());
        assert!(own >= foreign);
        assert!(own > 0.9, "own={own}");
    }

    #[test]
    fn document_frequency_matches_positive_term_frequencies() {
        let corpus = Corpus::new();
        let docs = [
            corpus.add("1", "sea salt wind"),
            corpus.add("2", "salt salt rock"),
            corpus.add("3", "wind rock sea sea"),
        ];
        let vsm = corpus.model();
        for term in ["sea", "salt", "wind", "rock"] {
            let id = corpus.set.terms.id_of(term).unwrap();
            let df = corpus.set.content_postings.document_frequency(id).unwrap();
            let with_tf = docs.iter().filter(|d| vsm.term_frequency(term, **d).unwrap() > 0).count();
            assert_eq!(df as usize, with_tf, "term {term}");
        }
    }

    #[test]
    fn unknown_terms_are_not_indexed_and_weigh_zero() {
        let corpus = Corpus::new();
        let doc = corpus.add("1", "lighthouse keeper");
        corpus.add("2", "harbour");
        let vsm = corpus.model();
        assert!(matches!(vsm.inverse_document_frequency("kraken"), Err(IndexError::TermNotIndexed(_))));
        assert_eq!(vsm.term_frequency("kraken", doc).unwrap(), 0);
        assert_eq!(vsm.term_weight("kraken", doc).unwrap(), 0.0);
        assert_eq!(vsm.cosine_similarity("kraken", doc).unwrap(), 0.0);
    }

    #[test]
    fn term_weight_is_normalized_tf_times_idf() {
        let corpus = Corpus::new();
        let doc = corpus.add("1", "wave wave wave reef");
        corpus.add("2", "sand");
        corpus.add("3", "sand dune");
        corpus.add("4", "cliff");
        let vsm = corpus.model();
        assert_eq!(vsm.max_term_frequency(doc).unwrap(), 3);
        let reef = vsm.term_weight("reef", doc).unwrap();
        assert!((reef - (1.0 / 3.0) * 2.0).abs() < 1e-12, "reef={reef}");
        let wave = vsm.term_weight("wave", doc).unwrap();
        assert!((wave - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_term_lists_are_skipped_and_lengths_divide() {
        let corpus = Corpus::new();
        let short = corpus.add("short", "coral");
        let long = corpus.add("long", "coral reef fish fish");
        let empty = corpus.set.documents.get_or_create("empty").unwrap();
        corpus.set.document_terms.set_related_list(empty, &[]).unwrap();
        corpus.add("other", "kelp");

        let vsm = corpus.model();
        let scores = vsm.compute_scores("coral").unwrap();
        assert!(!scores.contains_key(&empty));
        let raw_short = vsm.cosine_similarity("coral", short).unwrap();
        let raw_long = vsm.cosine_similarity("coral", long).unwrap();
        assert!((scores[&short] - raw_short).abs() < 1e-12);
        assert!((scores[&long] - raw_long / 4.0).abs() < 1e-12);
    }
}

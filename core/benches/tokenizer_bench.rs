use criterion::{criterion_group, criterion_main, Criterion};
use trawl_core::tokenizer::tokenize;
use trawl_core::{IndexSet, StoreOptions, TermFrequency, VectorSpaceModel};

const TEXT: &str = "The tide rolls over the reef while gulls circle the harbour. \
    Fishing boats return at dusk, their nets heavy with the day's catch, \
    and the lighthouse keeper logs the weather before the evening storm.";

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tokenize(TEXT)));
}

fn bench_scores(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    for doc in 0..200u64 {
        let id = set.documents.get_or_create(&format!("https://bench/{doc}")).unwrap();
        let terms = tokenize(TEXT);
        let mut freqs: Vec<TermFrequency> = Vec::new();
        for (pos, term) in terms.iter().enumerate().skip((doc % 7) as usize) {
            let term_id = set.terms.get_or_create(term).unwrap();
            set.content_postings.upsert(term_id, id, &[pos as u64]).unwrap();
            match freqs.iter_mut().find(|f| f.term_id == term_id) {
                Some(f) => f.frequency += 1,
                None => freqs.push(TermFrequency { term_id, frequency: 1 }),
            }
        }
        set.document_terms.set_related_list(id, &freqs).unwrap();
        set.lengths.set(id, terms.len() as u64).unwrap();
    }
    let vsm = VectorSpaceModel::new(&set, &tokenize);
    c.bench_function("compute_scores_200_docs", |b| b.iter(|| vsm.compute_scores("storm over the harbour").unwrap()));
}

criterion_group!(benches, bench_tokenize, bench_scores);
criterion_main!(benches);

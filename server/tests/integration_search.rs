use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;
use trawl_core::{DocId, EnglishTokenizer, IndexSet, PageRecord, StoreOptions, TermFrequency, Tokenizer};

/// Writes one page the way the crawler does: postings, term list, length, record.
fn add_page(set: &IndexSet, url: &str, title: &str, body: &str) -> DocId {
    let doc = set.documents.get_or_create(url).unwrap();
    let terms = EnglishTokenizer.tokenize(body);
    let mut frequencies: Vec<TermFrequency> = Vec::new();
    for (pos, term) in terms.iter().enumerate() {
        let term_id = set.terms.get_or_create(term).unwrap();
        set.content_postings.upsert(term_id, doc, &[pos as u64]).unwrap();
        match frequencies.iter_mut().find(|t| t.term_id == term_id) {
            Some(tf) => tf.frequency += 1,
            None => frequencies.push(TermFrequency { term_id, frequency: 1 }),
        }
    }
    set.document_terms.set_related_list(doc, &frequencies).unwrap();
    set.lengths.set(doc, terms.len() as u64).unwrap();
    let mut record = PageRecord::placeholder(url);
    record.title = title.to_string();
    record.size_bytes = body.len() as u64;
    set.pages.upsert(doc, &record).unwrap();
    doc
}

fn build_tiny_index(set: &IndexSet) -> [DocId; 4] {
    let home = add_page(set, "https://site.test/", "Home", "welcome to the harbour");
    let rust = add_page(set, "https://site.test/rust", "Rust", "rust systems programming with rust");
    let learn = add_page(set, "https://site.test/learn", "Learning", "learning rust slowly at the harbour with friends and notes");
    let deep = add_page(set, "https://site.test/deep", "Deep", "keeper notes");
    set.children.set_related_list(home, &[rust, learn]).unwrap();
    set.children.set_related_list(rust, &[learn, deep]).unwrap();
    set.children.set_related_list(deep, &[home]).unwrap();
    set.parents.set_related_list(learn, &[home, rust]).unwrap();
    [home, rust, learn, deep]
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    let [_, rust, learn, _] = build_tiny_index(&set);
    let app = server::router(Arc::new(set));

    let (status, json) = call(app, "/search?q=rust&k=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"].as_u64().unwrap(), rust);
    assert_eq!(arr[0]["title"], "Rust");
    assert_eq!(arr[1]["doc_id"].as_u64().unwrap(), learn);
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn unknown_query_terms_return_no_hits() {
    let dir = tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    build_tiny_index(&set);
    let app = server::router(Arc::new(set));

    let (status, json) = call(app, "/search?q=zebra").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn doc_returns_metadata_and_links() {
    let dir = tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    let [home, rust, learn, _] = build_tiny_index(&set);
    let app = server::router(Arc::new(set));

    let (status, json) = call(app.clone(), &format!("/doc/{learn}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], "https://site.test/learn");
    assert_eq!(json["parents"], serde_json::json!([home, rust]));

    let (status, _) = call(app, "/doc/999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn graph_expands_two_levels_with_index_edges() {
    let dir = tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    let [home, ..] = build_tiny_index(&set);
    let app = server::router(Arc::new(set));

    let (status, json) = call(app.clone(), &format!("/graph/{home}")).await;
    assert_eq!(status, StatusCode::OK);
    let nodes: Vec<&str> = json["nodes"].as_array().unwrap().iter().map(|n| n["id"].as_str().unwrap()).collect();
    assert_eq!(
        nodes,
        vec!["https://site.test/", "https://site.test/rust", "https://site.test/learn", "https://site.test/deep"]
    );
    let links: Vec<(u64, u64)> = json["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| (l["source"].as_u64().unwrap(), l["target"].as_u64().unwrap()))
        .collect();
    // deep -> home sits on the third level and is not expanded
    assert_eq!(links, vec![(0, 1), (0, 2), (1, 2), (1, 3)]);

    let (status, _) = call(app, "/graph/424242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn graph_skips_children_without_url() {
    let dir = tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    let [home, ..] = build_tiny_index(&set);
    set.documents.remove("https://site.test/rust").unwrap();

    let graph = server::neighbourhood(&set, home, 2).unwrap();
    let urls: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(urls, vec!["https://site.test/", "https://site.test/learn"]);
    assert_eq!(graph.links, vec![server::GraphLink { source: 0, target: 1 }]);
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempdir().unwrap();
    let set = IndexSet::open(dir.path(), &StoreOptions::default()).unwrap();
    let app = server::router(Arc::new(set));
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trawl_core::{DocId, EnglishTokenizer, IndexError, IndexSet, StoreOptions, VectorSpaceModel};

/// Levels of children the graph endpoint expands below the requested page.
pub const GRAPH_LEVELS: usize = 2;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: DocId,
    pub title: String,
    pub url: String,
    pub size_bytes: u64,
    pub last_modified: String,
    pub children: Vec<DocId>,
    pub parents: Vec<DocId>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GraphLink {
    pub source: usize,
    pub target: usize,
}

/// Link neighbourhood of one page: node urls, edges as node indices.
#[derive(Debug, Default, Serialize)]
pub struct GraphResponse {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Clone)]
pub struct AppState {
    pub indexes: Arc<IndexSet>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Index(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Index(e) => {
                tracing::warn!(error = %e, "index read failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn build_app<P: AsRef<FsPath>>(index_dir: P) -> Result<Router> {
    let indexes = IndexSet::open(index_dir, &StoreOptions::default())?;
    Ok(router(Arc::new(indexes)))
}

pub fn router(indexes: Arc<IndexSet>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:document_id", get(doc_handler))
        .route("/graph/:document_id", get(graph_handler))
        .with_state(AppState { indexes })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let vsm = VectorSpaceModel::new(&state.indexes, &EnglishTokenizer);
    let scores = vsm.compute_scores(&params.q)?;

    let mut scored: Vec<(DocId, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let total_hits = scored.len();
    let k = params.k.clamp(1, 100);

    let mut results = Vec::with_capacity(k.min(total_hits));
    for (doc_id, score) in scored.into_iter().take(k) {
        let page = state.indexes.pages.get_or_default(doc_id)?;
        results.push(SearchHit { doc_id, score, title: page.title, url: page.url });
    }

    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.q, total_hits, took_s, "search served");
    Ok(Json(SearchResponse { query: params.q, took_s, total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<DocResponse>, ApiError> {
    let idx = &state.indexes;
    let page = match idx.pages.get(doc_id) {
        Err(e) if e.is_not_found() => return Err(ApiError::NotFound(format!("document {doc_id}"))),
        other => other?,
    };
    Ok(Json(DocResponse {
        doc_id,
        last_modified: page.last_modified.format(&Rfc3339).unwrap_or_default(),
        title: page.title,
        url: page.url,
        size_bytes: page.size_bytes,
        children: idx.children.get_related_list(doc_id)?,
        parents: idx.parents.get_related_list(doc_id)?,
    }))
}

pub async fn graph_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<GraphResponse>, ApiError> {
    match neighbourhood(&state.indexes, doc_id, GRAPH_LEVELS) {
        Err(e) if e.is_not_found() => Err(ApiError::NotFound(format!("document {doc_id}"))),
        other => Ok(Json(other?)),
    }
}

/// Breadth-first walk over parent->children links, `levels` deep from `root`.
/// Each url appears once among the nodes; children whose url is gone are skipped.
pub fn neighbourhood(indexes: &IndexSet, root: DocId, levels: usize) -> trawl_core::Result<GraphResponse> {
    let mut graph = GraphResponse::default();
    let mut slots: HashMap<DocId, usize> = HashMap::new();
    graph.nodes.push(GraphNode { id: indexes.documents.key_of(root)? });
    slots.insert(root, 0);

    let mut frontier = vec![root];
    for _ in 0..levels {
        let mut next = Vec::new();
        for parent in frontier {
            let source = slots[&parent];
            for child in indexes.children.get_related_list(parent)? {
                let target = match slots.get(&child) {
                    Some(slot) => *slot,
                    None => {
                        let url = match indexes.documents.key_of(child) {
                            Ok(url) => url,
                            Err(e) if e.is_not_found() => continue,
                            Err(e) => return Err(e),
                        };
                        graph.nodes.push(GraphNode { id: url });
                        slots.insert(child, graph.nodes.len() - 1);
                        next.push(child);
                        graph.nodes.len() - 1
                    }
                };
                graph.links.push(GraphLink { source, target });
            }
        }
        frontier = next;
    }
    Ok(graph)
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pubsearch_core::{Author, DocId, Document, EngineStats, Hit, IndexStats, SearchEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "q")]
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 5 }

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
    pub year: Option<u16>,
    pub authors: Vec<Author>,
    pub journal: String,
    pub citations: u32,
    pub url: String,
    pub doi: String,
}

impl From<Hit<'_>> for SearchHit {
    fn from(hit: Hit<'_>) -> Self {
        let doc = hit.document;
        Self {
            doc_id: hit.doc_id.clone(),
            score: hit.score,
            title: doc.title.clone(),
            year: doc.year,
            authors: doc.authors.clone(),
            journal: doc.journal.clone(),
            citations: doc.citations,
            url: doc.publication_url.clone(),
            doi: doc.doi.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub engine: EngineStats,
    pub index: IndexStats,
}

pub enum ApiError {
    Unavailable,
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "search engine unavailable".to_string()),
            ApiError::NotFound(doc_id) => (StatusCode::NOT_FOUND, format!("document {doc_id} not found")),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// `engine` is `None` when the index could not be loaded at start-up.
#[derive(Clone)]
pub struct AppState {
    pub engine: Option<Arc<SearchEngine>>,
}

impl AppState {
    fn engine(&self) -> Result<&SearchEngine, ApiError> {
        self.engine.as_deref().ok_or(ApiError::Unavailable)
    }
}

/// Loads the index at `index_path` and builds the app. A missing or unreadable index is
/// logged and the app still comes up, answering 503 until restarted with a good index.
pub fn build_app(index_path: &std::path::Path) -> Router {
    let engine = match SearchEngine::load(index_path) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(err) => {
            tracing::error!(index = %index_path.display(), %err, "failed to load index");
            None
        }
    };
    router(engine)
}

pub fn router(engine: Option<Arc<SearchEngine>>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/stats", get(stats_handler))
        .with_state(AppState { engine })
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// CORS_ALLOW_ORIGIN is a comma separated origin list; unset or unparsable means any origin.
fn cors_layer() -> CorsLayer {
    let any = || CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                any()
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => any(),
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let engine = state.engine()?;
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, 100);
    let hits = engine.rank(&params.query);
    let total_hits = hits.len();
    let results = hits.into_iter().take(k).map(SearchHit::from).collect();
    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.query, total_hits, took_s, "search");
    Ok(Json(SearchResponse { query: params.query, took_s, total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<Document>, ApiError> {
    let engine = state.engine()?;
    engine.document(&DocId::from(doc_id.as_str())).cloned().map(Json).ok_or(ApiError::NotFound(doc_id))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let engine = state.engine()?;
    Ok(Json(StatsResponse { engine: engine.statistics(), index: engine.index().stats() }))
}

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use regex::RegexBuilder;
use resumatch_core::{DocumentSource, FileSource, Outcome, Resume, SearchOptions, SearchSession, SessionState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on `k` for one search request.
pub const MAX_RESULTS: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_AFTER: usize = 200;

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    /// Negative values are treated as zero.
    pub k: Option<i64>,
    /// Id of a resume the caller already picked; kept in the results even if it ranks poorly.
    pub selected: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub ready: bool,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub last_modified: i64,
    pub score: f64,
    pub snippet: Option<String>,
    pub pinned: bool,
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub owner: String,
    #[serde(flatten)]
    pub state: SessionState,
    pub documents: usize,
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub id: String,
    pub outcome: Outcome,
}

/// One owner's session behind its own lock.
pub type SharedSession = Arc<RwLock<SearchSession<Resume>>>;

/// Shared server state: the document store and one search session per owner.
///
/// The outer map lock is held only to look up, insert or remove a handle.
/// Searches and mutations lock just the owner's session.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<FileSource>,
    pub sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
    pub options: SearchOptions,
}

impl AppState {
    pub fn new(data_dir: &str, options: SearchOptions) -> Result<Self> {
        let source = FileSource::open(data_dir)?;
        Ok(Self { source: Arc::new(source), sessions: Arc::new(RwLock::new(HashMap::new())), options })
    }

    /// Handle to `owner`'s session, if one is open.
    pub fn session(&self, owner: &str) -> Option<SharedSession> {
        self.sessions.read().get(owner).cloned()
    }

    /// Build a session for every owner in the store and return how many are ready.
    ///
    /// An owner whose fetch fails keeps an unavailable session and is logged.
    pub fn preload(&self) -> Result<usize> {
        let owners = self.source.owners()?;
        let mut ready = 0;
        for owner in &owners {
            let mut session = SearchSession::new(owner.clone(), self.options.clone());
            match session.load(self.source.as_ref()) {
                Ok(_) => ready += 1,
                Err(err) => tracing::warn!(%owner, error = %format!("{err:#}"), "preload left session unavailable"),
            }
            self.sessions.write().insert(owner.clone(), Arc::new(RwLock::new(session)));
        }
        tracing::info!(owners = owners.len(), ready, "preloaded search sessions");
        Ok(ready)
    }
}

fn cors_layer() -> CorsLayer {
    // CORS_ALLOW_ORIGIN is comma-separated; unset or unparsable means any origin
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sessions/:owner", post(open_session).get(session_info).delete(close_session))
        .route("/sessions/:owner/documents", post(add_document))
        .route("/sessions/:owner/documents/:id", axum::routing::delete(remove_document))
        .route("/sessions/:owner/search", get(search_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub fn build_app(data_dir: &str, options: SearchOptions) -> Result<Router> {
    Ok(build_router(AppState::new(data_dir, options)?))
}

fn not_found(owner: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("no session for {owner}"))
}

pub async fn open_session(State(state): State<AppState>, Path(owner): Path<String>) -> Result<Json<SessionInfo>, ApiError> {
    let handle = state
        .sessions
        .write()
        .entry(owner.clone())
        .or_insert_with(|| Arc::new(RwLock::new(SearchSession::new(owner.clone(), state.options.clone()))))
        .clone();
    handle.write().reset();

    let source = state.source.clone();
    let fetch_owner = owner.clone();
    let fetched = tokio::task::spawn_blocking(move || source.fetch_all(&fetch_owner))
        .await
        .unwrap_or_else(|e| Err(anyhow::anyhow!("document fetch task failed: {e}")));

    // closed, or closed and reopened, while the fetch ran
    if !state.session(&owner).is_some_and(|current| Arc::ptr_eq(&current, &handle)) {
        return Err((StatusCode::CONFLICT, format!("session for {owner} closed while loading")));
    }
    let mut session = handle.write();
    match session.finish(fetched) {
        Ok(documents) => Ok(Json(SessionInfo { owner, state: session.state().clone(), documents })),
        Err(err) => Err((StatusCode::SERVICE_UNAVAILABLE, format!("{err:#}"))),
    }
}

pub async fn session_info(State(state): State<AppState>, Path(owner): Path<String>) -> Result<Json<SessionInfo>, ApiError> {
    let handle = state.session(&owner).ok_or_else(|| not_found(&owner))?;
    let session = handle.read();
    Ok(Json(SessionInfo { owner: owner.clone(), state: session.state().clone(), documents: session.len() }))
}

pub async fn close_session(State(state): State<AppState>, Path(owner): Path<String>) -> StatusCode {
    if state.sessions.write().remove(&owner).is_some() {
        tracing::info!(%owner, "closed search session");
    }
    StatusCode::NO_CONTENT
}

pub async fn add_document(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(resume): Json<Resume>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    let handle = state.session(&owner).ok_or_else(|| not_found(&owner))?;
    let id = resume.id.clone();
    let outcome = handle.write().add(resume);
    let status = match outcome {
        Outcome::Inserted => StatusCode::CREATED,
        Outcome::Deferred => StatusCode::ACCEPTED,
        Outcome::Dropped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    Ok((status, Json(MutationResponse { id, outcome })))
}

pub async fn remove_document(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let handle = state.session(&owner).ok_or_else(|| not_found(&owner))?;
    let outcome = handle.write().remove(&id);
    Ok(match outcome {
        Outcome::Deferred => StatusCode::ACCEPTED,
        Outcome::Dropped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::NO_CONTENT,
    })
}

pub async fn search_handler(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let handle = state.session(&owner);
    let session = handle.as_ref().map(|h| h.read());
    let Some(session) = session.filter(|s| s.is_ready()) else {
        return Json(SearchResponse {
            query: params.q,
            took_s: start.elapsed().as_secs_f64(),
            ready: false,
            total_hits: 0,
            results: Vec::new(),
        });
    };

    let k = match params.k {
        Some(k) => usize::try_from(k.max(0)).unwrap_or(0),
        None => session.options().default_limit,
    }
    .min(MAX_RESULTS);

    let hits = session.rank(&params.q);
    let total_hits = hits.len();
    let terms = resumatch_core::Query::parse(&params.q).keywords;
    let mut results: Vec<SearchHit> = hits
        .into_iter()
        .take(k)
        .map(|hit| SearchHit {
            id: hit.document.id.clone(),
            name: hit.document.name.clone(),
            last_modified: hit.document.last_modified,
            score: hit.score,
            snippet: snippet(&hit.document.text_content, &terms),
            pinned: false,
        })
        .collect();

    // the caller's current pick stays visible without being duplicated
    if let Some(selected) = params.selected.as_deref() {
        if !results.iter().any(|r| r.id == selected) {
            if let Some(doc) = session.index().and_then(|index| index.get(selected)) {
                results.push(SearchHit {
                    id: doc.id.clone(),
                    name: doc.name.clone(),
                    last_modified: doc.last_modified,
                    score: 0.0,
                    snippet: snippet(&doc.text_content, &terms),
                    pinned: true,
                });
            }
        }
    }

    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), ready: true, total_hits, results })
}

/// Up to ~300 bytes of `text` around the first query term, with the terms wrapped in `<em>`.
fn snippet(text: &str, terms: &[String]) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let pattern = terms_pattern(terms);
    let window = match pattern.as_ref().and_then(|re| re.find(text)) {
        Some(m) => {
            let mut start = m.start().saturating_sub(SNIPPET_BEFORE);
            while !text.is_char_boundary(start) {
                start -= 1;
            }
            let mut end = (m.start() + SNIPPET_AFTER).min(text.len());
            while !text.is_char_boundary(end) {
                end += 1;
            }
            &text[start..end]
        }
        None => return Some(text.chars().take(SNIPPET_BEFORE + SNIPPET_AFTER).collect()),
    };
    Some(match pattern {
        Some(re) => re.replace_all(window, "<em>$0</em>").into_owned(),
        None => window.to_string(),
    })
}

/// One case-insensitive alternation of the escaped terms, longest first.
fn terms_pattern(terms: &[String]) -> Option<regex::Regex> {
    let mut escaped: Vec<String> = terms.iter().filter(|t| !t.trim().is_empty()).map(|t| regex::escape(t)).collect();
    if escaped.is_empty() {
        return None;
    }
    escaped.sort_by_key(|t| std::cmp::Reverse(t.len()));
    escaped.dedup();
    RegexBuilder::new(&escaped.join("|")).case_insensitive(true).build().ok()
}

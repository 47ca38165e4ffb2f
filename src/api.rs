//! HTTP surface: launches scrape tasks, reports their progress, and
//! serves the search history. Handlers return immediately with a task
//! id; the scrape itself runs on a blocking thread and mirrors its
//! progress into the shared registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db;
use crate::models::{Lead, SearchQuery, SearchRecord, SearchSummary};
use crate::postprocess::{self, LeadFilter};
use crate::progress::ProgressSink;
use crate::scraper::{self, Timing};

pub type TaskMap = Arc<RwLock<HashMap<String, TaskEntry>>>;

pub struct AppState {
    pub pool: PgPool,
    pub tasks: TaskMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

/// Live view of one scrape task, polled by clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskEntry {
    pub status: TaskStatus,
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leads: Option<Vec<Lead>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// History record ids written for this task (one per origin query).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub saved_ids: Vec<i32>,
}

impl TaskEntry {
    fn running() -> Self {
        Self {
            status: TaskStatus::Running,
            percent: 0,
            message: "Queued".to_string(),
            leads: None,
            error: None,
            saved_ids: Vec::new(),
        }
    }
}

/// Pushes run progress into the task registry.
struct RegistrySink {
    tasks: TaskMap,
    task_id: String,
}

impl ProgressSink for RegistrySink {
    fn report(&self, percent: u8, message: &str) {
        if let Ok(mut tasks) = self.tasks.write() {
            if let Some(entry) = tasks.get_mut(&self.task_id) {
                entry.percent = percent;
                entry.message = message.to_string();
            }
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SearchRequest {
    pub keyword: String,
    pub city: String,
    pub country: String,
    /// Clamped to 10–100; defaults to 20.
    pub max_results: Option<usize>,
    /// Deduplicate by (name, address) before returning and saving.
    pub dedupe: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct SearchTriple {
    pub keyword: String,
    pub city: String,
    pub country: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkSearchRequest {
    pub searches: Vec<SearchTriple>,
    pub max_results: Option<usize>,
    pub dedupe: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct RunResponse {
    pub task_id: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Defaults to 20.
    pub limit: Option<i64>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportParams {
    pub has_phone: Option<bool>,
    pub has_website: Option<bool>,
    pub has_email: Option<bool>,
    pub has_whatsapp: Option<bool>,
    pub min_rating: Option<f64>,
    pub dedupe: Option<bool>,
}

fn clamp_max_results(requested: Option<usize>) -> usize {
    requested.unwrap_or(20).clamp(10, 100)
}

fn queries_from(triples: &[SearchTriple]) -> Result<Vec<SearchQuery>, (StatusCode, String)> {
    let queries: Vec<SearchQuery> = triples
        .iter()
        .map(|t| SearchQuery::new(t.keyword.trim(), t.city.trim(), t.country.trim()))
        .collect();
    if queries.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "at least one search is required".into()));
    }
    if queries
        .iter()
        .any(|q| q.keyword.is_empty() || q.city.is_empty() || q.country.is_empty())
    {
        return Err((
            StatusCode::BAD_REQUEST,
            "keyword, city and country are required for every search".into(),
        ));
    }
    Ok(queries)
}

fn register_task(tasks: &TaskMap) -> String {
    let task_id = Uuid::new_v4().to_string();
    tasks
        .write()
        .expect("task registry poisoned")
        .insert(task_id.clone(), TaskEntry::running());
    task_id
}

fn complete_task(tasks: &TaskMap, task_id: &str, leads: Vec<Lead>, saved_ids: Vec<i32>) {
    if let Ok(mut map) = tasks.write() {
        if let Some(entry) = map.get_mut(task_id) {
            entry.status = TaskStatus::Completed;
            entry.percent = 100;
            entry.leads = Some(leads);
            entry.saved_ids = saved_ids;
        }
    }
}

fn fail_task(tasks: &TaskMap, task_id: &str, error: &str) {
    if let Ok(mut map) = tasks.write() {
        if let Some(entry) = map.get_mut(task_id) {
            entry.status = TaskStatus::Failed;
            entry.error = Some(error.to_string());
        }
    }
}

/// Start a single-query scrape.
#[utoipa::path(
    post,
    path = "/searches",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search task started", body = RunResponse),
        (status = 400, description = "Missing keyword, city or country")
    ),
    tag = "searches"
)]
pub async fn start_search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    let query = queries_from(&[SearchTriple {
        keyword: payload.keyword,
        city: payload.city,
        country: payload.country,
    }])?
    .remove(0);
    let max_results = clamp_max_results(payload.max_results);
    let dedupe = payload.dedupe.unwrap_or(false);

    let task_id = register_task(&state.tasks);
    tracing::info!(task_id, query = %query.label(), max_results, "search task started");

    let task_state = state.clone();
    let spawned_id = task_id.clone();
    tokio::spawn(async move {
        run_search_task(task_state, spawned_id, query, max_results, dedupe).await;
    });

    Ok(Json(RunResponse {
        task_id,
        message: "Search started".to_string(),
    }))
}

async fn run_search_task(
    state: Arc<AppState>,
    task_id: String,
    query: SearchQuery,
    max_results: usize,
    dedupe: bool,
) {
    let sink = RegistrySink {
        tasks: state.tasks.clone(),
        task_id: task_id.clone(),
    };
    let scrape_query = query.clone();
    let result = tokio::task::spawn_blocking(move || {
        scraper::scrape_search(&scrape_query, max_results, &Timing::default(), &sink)
    })
    .await;

    match result {
        Ok(Ok(mut leads)) => {
            if dedupe {
                leads = postprocess::dedupe_leads(&leads);
            }
            let saved_ids = match db::save_search(&state.pool, &query, &leads).await {
                Ok(id) => vec![id],
                Err(err) => {
                    tracing::warn!(task_id, error = %err, "failed to persist search, returning leads anyway");
                    Vec::new()
                }
            };
            tracing::info!(task_id, leads = leads.len(), "search task completed");
            complete_task(&state.tasks, &task_id, leads, saved_ids);
        }
        Ok(Err(err)) => {
            tracing::error!(task_id, error = %err, "search task failed");
            fail_task(&state.tasks, &task_id, &err.to_string());
        }
        Err(err) => {
            tracing::error!(task_id, error = %err, "search task panicked");
            fail_task(&state.tasks, &task_id, "internal error");
        }
    }
}

/// Start a bulk scrape over an ordered list of query triples.
#[utoipa::path(
    post,
    path = "/searches/bulk",
    request_body = BulkSearchRequest,
    responses(
        (status = 200, description = "Bulk task started", body = RunResponse),
        (status = 400, description = "Empty or invalid search list")
    ),
    tag = "searches"
)]
pub async fn start_bulk_search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkSearchRequest>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    let queries = queries_from(&payload.searches)?;
    let max_results = clamp_max_results(payload.max_results);
    let dedupe = payload.dedupe.unwrap_or(false);

    let task_id = register_task(&state.tasks);
    tracing::info!(task_id, searches = queries.len(), max_results, "bulk task started");

    let task_state = state.clone();
    let spawned_id = task_id.clone();
    tokio::spawn(async move {
        run_bulk_task(task_state, spawned_id, queries, max_results, dedupe).await;
    });

    Ok(Json(RunResponse {
        task_id,
        message: "Bulk search started".to_string(),
    }))
}

async fn run_bulk_task(
    state: Arc<AppState>,
    task_id: String,
    queries: Vec<SearchQuery>,
    max_results: usize,
    dedupe: bool,
) {
    let sink = RegistrySink {
        tasks: state.tasks.clone(),
        task_id: task_id.clone(),
    };
    let scrape_queries = queries.clone();
    let result = tokio::task::spawn_blocking(move || {
        scraper::scrape_bulk(&scrape_queries, max_results, &Timing::default(), &sink)
    })
    .await;

    let mut leads = match result {
        Ok(leads) => leads,
        Err(err) => {
            tracing::error!(task_id, error = %err, "bulk task panicked");
            fail_task(&state.tasks, &task_id, "internal error");
            return;
        }
    };
    if dedupe {
        leads = postprocess::dedupe_leads(&leads);
    }

    // One history record per origin query, as the dashboard always did.
    let mut saved_ids = Vec::new();
    for query in &queries {
        let label = query.label();
        let group: Vec<Lead> = leads
            .iter()
            .filter(|lead| lead.search_query.as_deref() == Some(label.as_str()))
            .cloned()
            .collect();
        if group.is_empty() {
            continue;
        }
        match db::save_search(&state.pool, query, &group).await {
            Ok(id) => saved_ids.push(id),
            Err(err) => {
                tracing::warn!(task_id, search = %label, error = %err, "failed to persist bulk sub-search");
            }
        }
    }

    tracing::info!(task_id, leads = leads.len(), "bulk task completed");
    complete_task(&state.tasks, &task_id, leads, saved_ids);
}

/// Poll a task's progress and, once completed, its leads.
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id returned at start")),
    responses(
        (status = 200, description = "Task state", body = TaskEntry),
        (status = 404, description = "Unknown task id")
    ),
    tag = "searches"
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskEntry>, StatusCode> {
    state
        .tasks
        .read()
        .ok()
        .and_then(|tasks| tasks.get(&task_id).cloned())
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Recent search history, newest first.
#[utoipa::path(
    get,
    path = "/history",
    params(HistoryParams),
    responses((status = 200, description = "Recent searches", body = [SearchSummary])),
    tag = "history"
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<SearchSummary>> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    match db::list_recent(&state.pool, limit).await {
        Ok(summaries) => Json(summaries),
        Err(err) => {
            tracing::warn!(error = %err, "history listing failed");
            Json(Vec::new())
        }
    }
}

/// Load one stored search with its leads.
#[utoipa::path(
    get,
    path = "/history/{id}",
    params(("id" = i32, Path, description = "History record id")),
    responses(
        (status = 200, description = "Stored search", body = SearchRecord),
        (status = 404, description = "Unknown id")
    ),
    tag = "history"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<SearchRecord>, StatusCode> {
    match db::load_search(&state.pool, id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            tracing::warn!(id, error = %err, "history load failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Delete one stored search.
#[utoipa::path(
    delete,
    path = "/history/{id}",
    params(("id" = i32, Path, description = "History record id")),
    responses((status = 200, description = "Deletion outcome", body = DeleteResponse)),
    tag = "history"
)]
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Json<DeleteResponse> {
    let success = match db::delete_search(&state.pool, id).await {
        Ok(deleted) => deleted,
        Err(err) => {
            tracing::warn!(id, error = %err, "history delete failed");
            false
        }
    };
    Json(DeleteResponse { success })
}

/// Export a stored search as CSV, with optional filters applied.
#[utoipa::path(
    get,
    path = "/history/{id}/export",
    params(("id" = i32, Path, description = "History record id"), ExportParams),
    responses(
        (status = 200, description = "CSV attachment", body = String, content_type = "text/csv"),
        (status = 404, description = "Unknown id")
    ),
    tag = "history"
)]
pub async fn export_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = db::load_search(&state.pool, id)
        .await
        .map_err(|err| {
            tracing::warn!(id, error = %err, "history load failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "history load failed".to_string())
        })?
        .ok_or((StatusCode::NOT_FOUND, "no such search".to_string()))?;

    let mut leads = record.leads;
    if params.dedupe.unwrap_or(false) {
        leads = postprocess::dedupe_leads(&leads);
    }
    let filter = LeadFilter {
        has_phone: params.has_phone,
        has_website: params.has_website,
        has_email: params.has_email,
        has_whatsapp: params.has_whatsapp,
        min_rating: params.min_rating,
    };
    if !filter.is_empty() {
        leads = postprocess::filter_leads(&leads, &filter);
    }

    let csv = postprocess::leads_to_csv(&leads).map_err(|err| {
        tracing::warn!(id, error = %err, "csv rendering failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "csv rendering failed".to_string())
    })?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"search_{id}_leads.csv\""),
        ),
    ];
    Ok((headers, csv))
}

use crate::config::Config;
use crate::memory::{MemoryStore, MemoryType};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Shared state for the admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    pub cfg: Arc<Config>,
    pub store: Arc<MemoryStore>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    group_id: i64,
    #[serde(default, rename = "type")]
    mem_type: String,
    page: Option<usize>,
    page_size: Option<usize>,
}

impl PageParams {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn page_size(&self) -> usize {
        match self.page_size {
            Some(n) if (1..=MAX_PAGE_SIZE).contains(&n) => n,
            _ => DEFAULT_PAGE_SIZE,
        }
    }
}

/// Build the admin router. Split out of `serve` so tests can drive it on an
/// ephemeral listener.
pub fn build_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/stats", get(stats))
        .route("/api/memories", get(list_memories))
        .route("/api/memories/{id}", get(get_memory))
        .route("/api/memories/{id}", delete(delete_memory))
        .route("/api/members", get(list_members))
        .route("/api/members/{user_id}", get(get_member))
        .route("/api/messages", get(list_messages))
        .with_state(state)
}

/// Serve the admin API until the process exits.
pub async fn serve(state: AdminState) -> Result<()> {
    let addr = format!("{}:{}", state.cfg.server.host, state.cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("admin server failed to bind {}", addr))?;
    info!("admin server listening on {}", addr);
    axum::serve(listener, build_router(state))
        .await
        .context("admin server failed")
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "name": "murmur",
        "version": crate::VERSION,
        "time": Utc::now().to_rfc3339(),
    }))
}

async fn status(State(state): State<AdminState>) -> impl IntoResponse {
    let stats = state.store.stats().unwrap_or_default();
    Json(json!({
        "status": "running",
        "persona": state.cfg.persona.name,
        "groups": state.cfg.groups.len(),
        "time": Utc::now().to_rfc3339(),
        "stats": stats,
        "config": {
            "think_interval": state.cfg.agent.think_interval,
            "speak_cooldown": state.cfg.agent.speak_cooldown,
            "observe_window": state.cfg.agent.observe_window,
            "llm_model": state.cfg.llm.model,
        },
    }))
}

async fn stats(State(state): State<AdminState>) -> impl IntoResponse {
    match state.store.stats() {
        Ok(stats) => (StatusCode::OK, Json(json!({ "data": stats }))),
        Err(e) => internal_error(&e),
    }
}

async fn list_memories(
    State(state): State<AdminState>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let mem_type = MemoryType::parse(&params.mem_type);
    match state.store.list_memories(
        params.group_id,
        mem_type,
        params.page(),
        params.page_size(),
    ) {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(json!({
                "data": items,
                "total": total,
                "page": params.page(),
                "page_size": params.page_size(),
            })),
        ),
        Err(e) => internal_error(&e),
    }
}

async fn get_memory(
    State(state): State<AdminState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_memory(id) {
        Ok(Some(memory)) => (StatusCode::OK, Json(json!({ "data": memory }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "memory not found" })),
        ),
        Err(e) => internal_error(&e),
    }
}

async fn delete_memory(
    State(state): State<AdminState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.delete_memory(id) {
        Ok(true) => (StatusCode::OK, Json(json!({ "message": "deleted" }))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "memory not found" })),
        ),
        Err(e) => internal_error(&e),
    }
}

async fn list_members(
    State(state): State<AdminState>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    match state
        .store
        .list_member_profiles(params.page(), params.page_size())
    {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(json!({
                "data": items,
                "total": total,
                "page": params.page(),
                "page_size": params.page_size(),
            })),
        ),
        Err(e) => internal_error(&e),
    }
}

async fn get_member(
    State(state): State<AdminState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_member_profile(user_id) {
        Ok(Some(profile)) => (StatusCode::OK, Json(json!({ "data": profile }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "member not found" })),
        ),
        Err(e) => internal_error(&e),
    }
}

async fn list_messages(
    State(state): State<AdminState>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    match state
        .store
        .list_message_logs(params.group_id, params.page(), params.page_size())
    {
        Ok((items, total)) => (
            StatusCode::OK,
            Json(json!({
                "data": items,
                "total": total,
                "page": params.page(),
                "page_size": params.page_size(),
            })),
        ),
        Err(e) => internal_error(&e),
    }
}

fn internal_error(e: &anyhow::Error) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

//! REST API — webhook intake plus dashboard endpoints.
//!
//! The webhook returns 200 whenever a processing-log entry exists for the
//! message, including blocked and failed outcomes; 5xx is reserved for
//! deliveries that could not be persisted at all, so the provider knows to
//! redeliver exactly those.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::pipeline::processor::EmailProcessor;
use crate::pipeline::types::{DomainLabel, DomainScope, InboundEmail};
use crate::store::traits::{
    Database, EmailIntegration, EntryStatus, LogFilter, DEFAULT_CONFIDENCE_THRESHOLD,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub processor: Arc<EmailProcessor>,
}

/// Build the router.
pub fn routes(db: Arc<dyn Database>, processor: Arc<EmailProcessor>) -> Router {
    let state = AppState { db, processor };

    Router::new()
        .route("/health", get(health))
        .route("/webhook/email", axum::routing::post(receive_email))
        .route("/api/integrations", get(list_integrations).post(create_integration))
        .route(
            "/api/integrations/{id}",
            get(get_integration)
                .put(update_integration)
                .delete(delete_integration),
        )
        .route("/api/processing-log", get(query_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "atelier-inbox"
    }))
}

// ── Webhook ─────────────────────────────────────────────────────────

async fn receive_email(
    State(state): State<AppState>,
    Json(email): Json<InboundEmail>,
) -> impl IntoResponse {
    if email.message_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "message_id is required"})),
        );
    }

    info!(message_id = %email.message_id, to = %email.to, "webhook delivery received");
    match state.processor.process(&email).await {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!(outcome))),
        Err(e) => {
            // No log entry could be persisted; ask the provider to retry.
            error!(error = %e, message_id = %email.message_id, "delivery could not be recorded");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

// ── Integrations ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct IntegrationRequest {
    address: String,
    /// "auto" or a domain label ("quote", "repair", ...).
    scope: String,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    auto_process: Option<bool>,
    #[serde(default)]
    require_confirmation: Option<bool>,
    #[serde(default)]
    confidence_threshold: Option<f32>,
    #[serde(default)]
    notify_address: Option<String>,
}

impl IntegrationRequest {
    fn validate(&self) -> Result<DomainScope, String> {
        if self.address.trim().is_empty() || !self.address.contains('@') {
            return Err(format!("'{}' is not a valid address", self.address));
        }
        if let Some(t) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!("confidence_threshold {t} is outside [0, 1]"));
            }
        }
        let scope = DomainScope::parse(&self.scope);
        if scope == DomainScope::Fixed(DomainLabel::Unknown) {
            return Err(format!("'{}' is not a valid scope", self.scope));
        }
        Ok(scope)
    }

    fn apply(&self, integration: &mut EmailIntegration, scope: DomainScope) {
        integration.address = self.address.clone();
        integration.scope = scope;
        if let Some(active) = self.active {
            integration.active = active;
        }
        if let Some(auto_process) = self.auto_process {
            integration.auto_process = auto_process;
        }
        if let Some(require_confirmation) = self.require_confirmation {
            integration.require_confirmation = require_confirmation;
        }
        integration.confidence_threshold =
            self.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        integration.notify_address = self.notify_address.clone();
    }
}

async fn list_integrations(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.list_integrations().await {
        Ok(integrations) => (StatusCode::OK, Json(serde_json::json!(integrations))),
        Err(e) => internal_error(e),
    }
}

async fn create_integration(
    State(state): State<AppState>,
    Json(body): Json<IntegrationRequest>,
) -> impl IntoResponse {
    let scope = match body.validate() {
        Ok(scope) => scope,
        Err(message) => return bad_request(message),
    };

    let mut integration = EmailIntegration::new(body.address.clone(), scope);
    body.apply(&mut integration, scope);

    match state.db.insert_integration(&integration).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!(integration))),
        Err(crate::error::DatabaseError::Constraint(_)) => {
            bad_request(format!("address '{}' is already configured", body.address))
        }
        Err(e) => internal_error(e),
    }
}

async fn get_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_request("invalid integration id".into());
    };
    match state.db.get_integration(id).await {
        Ok(Some(integration)) => (StatusCode::OK, Json(serde_json::json!(integration))),
        Ok(None) => not_found("integration"),
        Err(e) => internal_error(e),
    }
}

async fn update_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IntegrationRequest>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_request("invalid integration id".into());
    };
    let scope = match body.validate() {
        Ok(scope) => scope,
        Err(message) => return bad_request(message),
    };

    let mut integration = match state.db.get_integration(id).await {
        Ok(Some(integration)) => integration,
        Ok(None) => return not_found("integration"),
        Err(e) => return internal_error(e),
    };
    body.apply(&mut integration, scope);

    match state.db.update_integration(&integration).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!(integration))),
        Err(e) => internal_error(e),
    }
}

async fn delete_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_request("invalid integration id".into());
    };
    match state.db.delete_integration(id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "deleted"}))),
        Err(e) => internal_error(e),
    }
}

// ── Processing log ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct LogQuery {
    status: Option<String>,
    domain: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

async fn query_log(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let filter = LogFilter {
        status: query.status.as_deref().map(EntryStatus::parse),
        domain: query.domain.as_deref().map(DomainLabel::parse),
        since: query.since,
        until: query.until,
        limit: query.limit.unwrap_or(0),
    };

    match state.db.query_log_entries(&filter).await {
        Ok(entries) => (StatusCode::OK, Json(serde_json::json!(entries))),
        Err(e) => internal_error(e),
    }
}

// ── Response helpers ────────────────────────────────────────────────

fn bad_request(message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
}

fn not_found(entity: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("{entity} not found")})),
    )
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
}

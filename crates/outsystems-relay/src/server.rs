/// HTTP surface of the relay.
///
/// - `GET /outsystems_restructure?basic_type=...`: flat OutSystems document
/// - `GET /health`: upstream reachability, always 200
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use lookup_common::upstream::{LookupClient, ProbeOutcome};

use crate::error::AppError;
use crate::model::{FieldValue, ResultDocument};
use crate::resolver::FieldResolver;

/// Shared per-process state. Everything in here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    client: Arc<LookupClient>,
    resolver: Arc<FieldResolver>,
    default_basic_type: Arc<str>,
}

impl AppState {
    pub fn new(
        client: Arc<LookupClient>,
        resolver: Arc<FieldResolver>,
        default_basic_type: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            client,
            resolver,
            default_basic_type: default_basic_type.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/outsystems_restructure", get(restructure))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RestructureParams {
    basic_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub upstream_status: Option<u16>,
    pub upstream_error: Option<String>,
}

impl From<ProbeOutcome> for HealthReport {
    fn from(outcome: ProbeOutcome) -> Self {
        let status = if outcome.is_healthy() {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };
        match outcome {
            ProbeOutcome::Responded(code) => Self {
                status,
                upstream_status: Some(code.as_u16()),
                upstream_error: None,
            },
            ProbeOutcome::Failed(reason) => Self {
                status,
                upstream_status: None,
                upstream_error: Some(reason),
            },
        }
    }
}

#[tracing::instrument(skip_all, fields(basic_type = tracing::field::Empty))]
async fn restructure(
    State(state): State<AppState>,
    Query(params): Query<RestructureParams>,
) -> Result<Json<ResultDocument>, AppError> {
    let basic_type = match params.basic_type {
        Some(value) => value.trim().to_string(),
        None => state.default_basic_type.to_string(),
    };
    if basic_type.is_empty() {
        return Err(AppError::InvalidInput("basic_type must not be empty".to_string()));
    }
    tracing::Span::current().record("basic_type", basic_type.as_str());

    let document = state
        .client
        .fetch(&basic_type)
        .await
        .inspect_err(|e| error!(error = %e, "lookup failed"))?;

    let result = state.resolver.resolve(&document);
    let unmapped = result.values().filter(|v| **v == FieldValue::Unmapped).count();
    let missing = result.values().filter(|v| **v == FieldValue::Missing).count();
    info!(fields = result.len(), unmapped, missing, "restructured lookup document");

    Ok(Json(result))
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let report = HealthReport::from(state.client.probe().await);
    if report.status == HealthStatus::Degraded {
        info!(
            upstream_status = report.upstream_status,
            upstream_error = report.upstream_error.as_deref(),
            "health check degraded"
        );
    }
    Json(report)
}

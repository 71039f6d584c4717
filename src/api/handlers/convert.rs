use axum::{extract::State, Json};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{BatchConversionReport, BatchConversionRequest, ConversionRequest, ConversionResult};
use crate::services::{BatchService, ConversionService};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub converter: ConversionService,
    pub batch: BatchService,
    pub max_script_bytes: usize,
}

impl AppState {
    pub fn new(converter: ConversionService, max_script_bytes: usize) -> Self {
        Self {
            batch: BatchService::new(converter.clone()),
            converter,
            max_script_bytes,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let converter = ConversionService::with_defaults(config.conversion_options()?);
        Ok(Self::new(converter, config.converter.max_script_bytes))
    }
}

/// Convert one script. The result record is returned as-is, failed or not.
pub async fn convert_script(
    State(state): State<AppState>,
    Json(payload): Json<ConversionRequest>,
) -> Result<Json<ConversionResult>, AppError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("convert", %request_id);

    check_script(&payload.sql, state.max_script_bytes)?;

    let converter = state.converter.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        info!("Converting script of {} bytes", payload.sql.len());
        converter.convert(&payload)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))?;

    Ok(Json(result))
}

/// Convert a set of named scripts
pub async fn convert_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchConversionRequest>,
) -> Result<Json<BatchConversionReport>, AppError> {
    let request_id = Uuid::new_v4();
    info!(%request_id, "Converting batch of {} scripts", payload.scripts.len());

    if payload.scripts.is_empty() {
        return Err(AppError::Validation("Batch must contain at least one script".to_string()));
    }

    for script in &payload.scripts {
        if script.sql.len() > state.max_script_bytes {
            return Err(too_large(&script.name, script.sql.len(), state.max_script_bytes));
        }
    }

    let report = state.batch.convert_batch(payload).await?;
    Ok(Json(report))
}

fn check_script(sql: &str, max_bytes: usize) -> Result<(), AppError> {
    if sql.trim().is_empty() {
        return Err(AppError::Validation("SQL script cannot be empty".to_string()));
    }
    if sql.len() > max_bytes {
        return Err(too_large("script", sql.len(), max_bytes));
    }
    Ok(())
}

fn too_large(name: &str, size: usize, max_bytes: usize) -> AppError {
    AppError::PayloadTooLarge(format!("{} is {} bytes; the limit is {} bytes", name, size, max_bytes))
}

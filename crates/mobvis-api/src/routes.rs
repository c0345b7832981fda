use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use mobvis_core::{DmoResponse, ExtractionError, GaitEngine};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::form::{read_form, ExtractionForm};
use crate::state::AppState;

pub async fn dmo_extraction(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DmoResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let path = state.endpoint.path.as_str();

    let mut multipart = multipart
        .map_err(|rejection| ExtractionError::Validation(rejection.body_text()))?;
    let ExtractionForm {
        name,
        description,
        public,
        request,
        upload,
    } = read_form(&mut multipart, state.endpoint.include_public_flag)
        .await
        .inspect_err(|err| warn!(%request_id, path, error = %err, "rejected extraction form"))?;

    info!(
        %request_id,
        path,
        name = %name,
        description = %description,
        public = ?public,
        file_name = ?upload.file_name,
        upload_hash = %upload.digest(),
        bytes = upload.bytes.len(),
        "received extraction request"
    );

    let engine = Arc::clone(&state.engine);
    let options = state.endpoint.shaping_options();
    let outcome = tokio::task::spawn_blocking(move || {
        mobvis_core::extract_dmos(upload.into_reader(), &request, engine.as_ref(), &options)
    })
    .await
    .unwrap_or_else(|err| {
        Err(ExtractionError::Engine(format!(
            "gait engine task failed: {err}"
        )))
    });

    match outcome {
        Ok(response) => {
            info!(
                %request_id,
                path,
                walking_bouts = response.per_wb_parameters.len(),
                strides = response.per_stride_parameters.len(),
                "extraction finished"
            );
            Ok(Json(response))
        }
        Err(err) => {
            warn!(%request_id, path, kind = err.kind(), error = %err, "extraction failed");
            Err(err.into())
        }
    }
}

pub async fn health(State(engine): State<Arc<dyn GaitEngine>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": engine.name(),
    }))
}

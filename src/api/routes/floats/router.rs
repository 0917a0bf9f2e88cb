//! Router for the ocean floats API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::Query;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::floats::{FleetSummary, FloatStatus, get_float, list_floats};

type SharedState = Arc<RwLock<AppState>>;

/// List floats, newest first
async fn floats(
    State(state): State<SharedState>,
    Query(params): Query<public::FloatsQuery>,
) -> Result<Json<public::FloatsResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let status = params.status.as_deref().map(FloatStatus::from);
    let floats = list_floats(&db, status).await?;

    Ok(Json(public::FloatsResponse { floats }))
}

/// Counts of floats per status
async fn summary(
    State(state): State<SharedState>,
) -> Result<Json<public::FloatSummaryResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let floats = list_floats(&db, None).await?;

    Ok(Json(public::FloatSummaryResponse {
        summary: FleetSummary::from_floats(&floats),
    }))
}

/// Get a single float by ID
async fn float(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();

    match get_float(&db, &id).await? {
        Some(float) => Ok(Json(float).into_response()),
        None => Ok((StatusCode::NOT_FOUND, format!("Float {} not found", id)).into_response()),
    }
}

/// Create the floats router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(floats))
        .route("/summary", get(summary))
        .route("/{id}", get(float))
}

//! Real-time cluster prediction service
//!
//! `POST /predict` takes one customer's transaction batch plus a
//! caller-supplied latest date, runs the shared feature engine, standardizes
//! with the training-time scaler, and returns the nearest-centroid cluster.
//! Each request is a self-contained synchronous transformation; the artifacts
//! are loaded once at startup and shared read-only across requests.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ArtifactsConfig;
use crate::data::{parse_datetime, Transaction};
use crate::error::{Error, Result};
use crate::features::{compute_rfmt_features, feature_matrix, FEATURE_COLUMNS};
use crate::model::KMeansModel;
use crate::scaler::StandardScaler;

/// Columns every transaction row in a request must carry
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "customer_id",
    "invoice_no",
    "invoice_date",
    "quantity",
    "unit_price",
];

/// The immutable artifacts a running service predicts with. Loaded once at
/// startup; a load failure prevents the service from starting at all.
#[derive(Debug)]
pub struct Artifacts {
    pub scaler: StandardScaler,
    pub model: KMeansModel,
}

impl Artifacts {
    /// Load scaler and model from the artifacts directory
    pub fn load(artifacts: &ArtifactsConfig) -> Result<Self> {
        Self::load_from(&artifacts.scaler_path(), &artifacts.model_path())
    }

    pub fn load_from(scaler_path: &Path, model_path: &Path) -> Result<Self> {
        let scaler = StandardScaler::load(scaler_path)?;
        let model = KMeansModel::load(model_path)?;
        if scaler.n_features() != model.centroids.ncols() {
            return Err(Error::Artifact(format!(
                "scaler width ({}) does not match model width ({})",
                scaler.n_features(),
                model.centroids.ncols()
            )));
        }
        info!(
            "Loaded artifacts: {} features, {} clusters",
            scaler.n_features(),
            model.n_clusters
        );
        Ok(Artifacts { scaler, model })
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub artifacts: Arc<Artifacts>,
}

impl AppState {
    pub fn new(artifacts: Artifacts) -> Self {
        AppState {
            artifacts: Arc::new(artifacts),
        }
    }
}

/// Prediction request body. Transaction rows stay untyped until the required
/// columns are checked, so a missing column is reported by name instead of as
/// a generic deserialization failure.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub latest_date: Option<String>,
    pub transactions: Option<Vec<Value>>,
}

/// Success payload; field name matches the established wire contract
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(rename = "Predicted Cluster")]
    pub predicted_cluster: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Client and server faults share the 400 path: the caller always
        // gets the triggering message, never a partial result.
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(state)
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /predict
///
/// RECEIVE -> VALIDATE -> TRANSFORM -> PREDICT -> RESPOND, all within this
/// call; any failure short-circuits to the error response.
async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(request) = payload.map_err(|_| {
        Error::invalid_input("No input data provided or invalid JSON format.")
    })?;

    let cluster = predict_batch(&state.artifacts, &request).inspect_err(|e| {
        error!("Error occurred during prediction: {e}");
    })?;

    Ok(Json(PredictResponse {
        predicted_cluster: cluster,
    }))
}

/// Validate and score one customer batch against the loaded artifacts
pub fn predict_batch(artifacts: &Artifacts, request: &PredictRequest) -> Result<usize> {
    let latest_date_str = request
        .latest_date
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_input("Missing 'latest_date' field in input JSON."))?;
    let latest_date = parse_datetime(latest_date_str)?;

    let rows = request
        .transactions
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::invalid_input("Missing 'transactions' data in input JSON."))?;

    let transactions = validate_transactions(rows)?;

    let features = compute_rfmt_features(&transactions, latest_date)?;
    if features.is_empty() {
        return Err(Error::Computation(
            "no customer features produced from transactions".to_string(),
        ));
    }

    let rfmt: Array2<f64> = feature_matrix(&features);
    debug_assert_eq!(rfmt.ncols(), FEATURE_COLUMNS.len());
    let scaled = artifacts.scaler.transform(&rfmt)?;

    // The batch is one logical customer, so the first row is the prediction
    artifacts.model.predict(scaled.row(0))
}

/// Check every row for the required columns, then deserialize
fn validate_transactions(rows: &[Value]) -> Result<Vec<Transaction>> {
    for row in rows {
        let obj = row
            .as_object()
            .ok_or_else(|| Error::invalid_input("Transaction rows must be JSON objects."))?;
        for col in REQUIRED_COLUMNS {
            if !obj.contains_key(col) {
                return Err(Error::invalid_input(format!(
                    "Missing required column: {col}"
                )));
            }
        }
    }

    rows.iter()
        .map(|row| {
            serde_json::from_value::<Transaction>(row.clone())
                .map_err(|e| Error::invalid_input(format!("Invalid transaction row: {e}")))
        })
        .collect()
}

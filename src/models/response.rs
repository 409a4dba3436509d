use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

/// Uniform body for every endpoint: `{"status":"ok","data":..}` or
/// `{"status":"error","kind":..,"detail":..}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Ok { data: T },
    Error { kind: ErrorKind, detail: String },
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope::Ok { data }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = match self {
            Envelope::Ok { .. } => StatusCode::OK,
            Envelope::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

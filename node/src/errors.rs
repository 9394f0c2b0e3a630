// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ratify_kernel::error::CommitError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Commit(err) => match err {
                CommitError::Validation(_) => StatusCode::BAD_REQUEST,
                CommitError::Durability(_) => StatusCode::INTERNAL_SERVER_ERROR,
                e if e.is_conflict() => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let mut body = json!({
            "ok": false,
            "error": self.to_string()
        });
        if let ApiError::Commit(err) = &self {
            if let Some(state) = err.participant_state() {
                body["state"] = json!(state);
            }
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::InvalidInput("invalid json".to_string())
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::champions::ChampionError;

#[derive(Debug)]
pub enum ApiError {
    /// 400 with the given JSON body as-is
    BadRequest(Value),
    /// Status derived from the error kind, body `{"error": <payload>}`
    Champion(ChampionError),
    /// Single-champion update failure: always 500, body `{"error": <payload>}`
    UpdateFailed(ChampionError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UpdateFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Champion(err) => match err {
                ChampionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ChampionError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::BadRequest(body) => body,
            ApiError::Champion(err) | ApiError::UpdateFailed(err) => {
                if status.is_server_error() {
                    tracing::error!(
                        status = status.as_u16(),
                        code = err.code(),
                        error = ?err,
                        "Server error"
                    );
                }
                json!({ "error": err.payload() })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChampionError> for ApiError {
    fn from(err: ChampionError) -> Self {
        ApiError::Champion(err)
    }
}

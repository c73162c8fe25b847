//! Typed error taxonomy, one enum per boundary. Only `http.rs` converts a
//! `Result::Err` into a user-facing response — everywhere else, the core
//! represents infeasibility in-band (`OptimizationResult.status`), never
//! via a propagated error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} is malformed: {value}")]
    Malformed { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tabular store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("tabular store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to deserialize tabular store response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("no hubs configured for season {season_year}")]
    NoHubsConfigured { season_year: i32 },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            ApiError::BadRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ApiError::Store(_) | ApiError::Planner(_) | ApiError::Config(_) => {
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// A formatted error chain for the `detail` field of an error response.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            detail.push_str(": ");
            detail.push_str(&err.to_string());
            source = err.source();
        }
        detail
    }
}

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod papers;
pub mod policy;
pub mod rooms;
pub mod storage;
pub mod summaries;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRef, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::error;

use crate::{
    auth::Profiles,
    config::Config,
    error::CoreError,
    rooms::{ConnectionManager, Rooms},
    storage::{DiskStorage, DocumentStorage},
    summaries::{HttpSummarizer, Summarizer, TranscriptSummarizer},
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub profiles: Profiles,
    pub rooms: Rooms,
    pub connections: ConnectionManager,
    pub storage: Arc<dyn DocumentStorage>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, db_pool: SqlitePool) -> Self {
        let summarizer: Arc<dyn Summarizer> = match &config.summarizer_url {
            Some(url) => Arc::new(HttpSummarizer::new(url.as_str())),
            None => Arc::new(TranscriptSummarizer),
        };
        let storage: Arc<dyn DocumentStorage> =
            Arc::new(DiskStorage::new(config.upload_dir.clone(), config.upload_url_prefix.as_str()));

        AppState::with_collaborators(config, db_pool, storage, summarizer)
    }

    pub fn with_collaborators(
        config: Config,
        db_pool: SqlitePool,
        storage: Arc<dyn DocumentStorage>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let profiles = Profiles::new(db_pool.clone(), &config.institution_domain);
        let rooms = Rooms::new(db_pool.clone(), storage.clone(), summarizer);
        let connections = ConnectionManager::new(rooms.clone(), Arc::new(profiles.clone()));

        AppState {
            db_pool,
            profiles,
            rooms,
            connections,
            storage,
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);
    let upload_route = state.config.upload_url_prefix.clone();
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/chat-rooms", rooms::router())
        .nest("/api/summaries", summaries::router())
        .nest("/api/papers", papers::router())
        .route("/ws", get(rooms::room_ws))
        .nest_service(&upload_route, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String> {
        Ok(self
            .get(field)
            .ok_or_else(|| anyhow::anyhow!("expected {field} in {self}"))?
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("expected {field} in {self} to be string"))?
            .to_owned())
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body: Value = json!({ "error": message, "code": code });
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = self.0.downcast_ref::<CoreError>() {
            let status = match err {
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::Auth(_) => StatusCode::UNAUTHORIZED,
                CoreError::AccessDenied => StatusCode::FORBIDDEN,
                CoreError::RoomNotFound(_) | CoreError::SummaryMissing(_) => StatusCode::NOT_FOUND,
                CoreError::RoomClosed | CoreError::AlreadyJoined(_) | CoreError::NotJoined => StatusCode::CONFLICT,
                CoreError::Database(_) | CoreError::Io(_) | CoreError::Corrupt(_) => {
                    error!(error = %err, "request failed");
                    return error_body(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "internal error".into());
                }
            };
            return error_body(status, err.code(), err.to_string());
        }

        if let Some(err) = self.0.downcast_ref::<MultipartError>() {
            return error_body(err.status(), "validation_error", err.body_text());
        }

        error!(error = %self.0, backtrace = %self.0.backtrace(), "request failed");
        error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error".into())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(CoreError);
apperr_impl!(MultipartError);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(std::io::Error);
apperr_impl!(axum::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let status = |err: CoreError| AppError::from(err).into_response().status();
        assert_eq!(status(CoreError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status(CoreError::Auth("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(CoreError::AccessDenied), StatusCode::FORBIDDEN);
        assert_eq!(status(CoreError::RoomNotFound(uuid::Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status(CoreError::RoomClosed), StatusCode::CONFLICT);
        assert_eq!(status(CoreError::Corrupt("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn get_str_field_reports_missing() {
        let value = json!({ "content": "ok", "n": 1 });
        assert_eq!(value.get_str_field("content").unwrap(), "ok");
        assert!(value.get_str_field("n").is_err());
        assert!(value.get_str_field("absent").is_err());
    }
}

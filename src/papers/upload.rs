use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    AppResult, AppState,
    auth::Authenticated,
    model::{Draft, Paper},
    storage::{DocumentStorage, read_form},
};

#[derive(Serialize)]
pub(crate) struct PaperResponse {
    paper: Paper,
}

#[debug_handler(state = AppState)]
pub(crate) async fn upload(
    State(db_pool): State<SqlitePool>,
    State(storage): State<Arc<dyn DocumentStorage>>,
    Authenticated(participant): Authenticated,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<PaperResponse>)> {
    let (fields, file) = read_form(multipart, "file").await?;
    let draft = Draft::from_fields(&fields);

    let paper = super::upload_paper(&db_pool, storage.as_ref(), &participant, &draft, file).await?;
    Ok((StatusCode::CREATED, Json(PaperResponse { paper })))
}

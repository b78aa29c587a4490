use axum::{
    Json, debug_handler,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{AppResult, AppState, model::Paper};

#[derive(Deserialize)]
pub(crate) struct PapersQuery {
    /// A number, or `all`.
    semester: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct PapersResponse {
    papers: Vec<Paper>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn papers(
    State(db_pool): State<SqlitePool>,
    Query(PapersQuery { semester }): Query<PapersQuery>,
) -> AppResult<Json<PapersResponse>> {
    let semester = semester.and_then(|s| s.trim().parse::<u8>().ok());
    let papers = super::list_papers(&db_pool, semester).await?;
    Ok(Json(PapersResponse { papers }))
}

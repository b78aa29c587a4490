use axum::{Json, debug_handler, extract::State};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    AppResult, db,
    model::{Room, Summary},
};

use super::markdown_to_html;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummaryItem {
    #[serde(flatten)]
    summary: Summary,
    room_title: String,
    #[serde(flatten)]
    classification: crate::model::Classification,
    content_html: String,
}

impl SummaryItem {
    fn new(summary: Summary, room: Room) -> Self {
        let content_html = markdown_to_html(&summary.content);
        SummaryItem {
            summary,
            room_title: room.title,
            classification: room.classification,
            content_html,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct SummariesResponse {
    summaries: Vec<SummaryItem>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn summaries(State(db_pool): State<SqlitePool>) -> AppResult<Json<SummariesResponse>> {
    let summaries = db::fetch_summaries(&db_pool)
        .await?
        .into_iter()
        .map(|(summary, room)| SummaryItem::new(summary, room))
        .collect();

    Ok(Json(SummariesResponse { summaries }))
}

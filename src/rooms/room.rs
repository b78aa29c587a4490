use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    auth::Authenticated,
    error::CoreError,
    model::{Message, Summary},
};

use super::{Closed, Partitioned, RoomFilter, Rooms, new::RoomResponse, partition};

#[debug_handler(state = AppState)]
pub(crate) async fn rooms(
    State(rooms): State<Rooms>,
    Query(filter): Query<RoomFilter>,
) -> AppResult<Json<Partitioned>> {
    let listing = rooms.list(&filter).await?;
    Ok(Json(partition(listing)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(State(rooms): State<Rooms>, Path(room_id): Path<Uuid>) -> AppResult<Json<RoomResponse>> {
    Ok(Json(RoomResponse {
        room: rooms.room(room_id).await?,
    }))
}

#[derive(Serialize)]
pub(crate) struct MessagesResponse {
    messages: Vec<Message>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    State(rooms): State<Rooms>,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<MessagesResponse>> {
    Ok(Json(MessagesResponse {
        messages: rooms.history(room_id).await?,
    }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn end_room(
    State(rooms): State<Rooms>,
    Authenticated(participant): Authenticated,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Closed>> {
    Ok(Json(rooms.close(&participant, room_id).await?))
}

#[derive(Serialize)]
pub(crate) struct SummaryResponse {
    summary: Summary,
}

#[debug_handler(state = AppState)]
pub(crate) async fn summary(
    State(rooms): State<Rooms>,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<SummaryResponse>> {
    let Some(summary) = rooms.summary(room_id).await? else {
        return Err(CoreError::SummaryMissing(room_id))?;
    };
    Ok(Json(SummaryResponse { summary }))
}

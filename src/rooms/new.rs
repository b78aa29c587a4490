use axum::{
    Json, debug_handler,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::{
    AppResult, AppState,
    auth::Authenticated,
    model::{Draft, Room},
    storage::read_form,
};

use super::Rooms;

#[derive(Serialize)]
pub(crate) struct RoomResponse {
    pub(crate) room: Room,
}

/// Multipart form: classification fields plus the `questionPaper` image.
#[debug_handler(state = AppState)]
pub(crate) async fn new_room(
    State(rooms): State<Rooms>,
    Authenticated(participant): Authenticated,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<RoomResponse>)> {
    let (fields, upload) = read_form(multipart, "questionPaper").await?;
    let draft = Draft::from_fields(&fields);

    let room = rooms.create(&participant, &draft, upload).await?;
    Ok((StatusCode::CREATED, Json(RoomResponse { room })))
}

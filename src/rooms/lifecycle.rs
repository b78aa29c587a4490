use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db,
    error::{CoreError, CoreResult},
    model::{Message, Participant, Room, RoomStatus, Summary, now},
    policy,
};

use super::{Rooms, connection::ServerEvent};

/// Outcome of a successful close. `summary` is `None` when the summarizer
/// failed; the room is ended either way.
#[derive(Debug, Clone, Serialize)]
pub struct Closed {
    pub room: Room,
    pub summary: Option<Summary>,
}

impl Rooms {
    /// Active → Ended. Closing an ended room fails with `RoomClosed` every time.
    pub async fn close(&self, participant: &Participant, room_id: Uuid) -> CoreResult<Closed> {
        let live = self.live(room_id).await?;

        let room = {
            let mut state = live.lock().await;
            policy::authorize_close(participant, state.room.status)?;
            if !state.room.status.is_active() {
                return Err(CoreError::RoomClosed);
            }

            let ended_at = now();
            db::mark_room_ended(&self.db_pool, room_id, ended_at).await?;
            state.room.status = RoomStatus::Ended;
            state.room.ended_at = Some(ended_at);

            let notified = state.broadcast(&ServerEvent::RoomEnded { room_id, ended_at });
            info!(room = %room_id, by = %participant.id, last_seq = state.last_seq, notified, "room ended");
            state.room.clone()
        };

        // Ended in memory, so the log cannot grow past this read.
        let summary = match db::fetch_messages(&self.db_pool, room_id).await {
            Ok(frozen) => self.summarize(&room, &frozen).await,
            Err(e) => {
                warn!(room = %room_id, error = %e, "could not read messages for summary");
                None
            }
        };

        Ok(Closed { room, summary })
    }

    async fn summarize(&self, room: &Room, messages: &[Message]) -> Option<Summary> {
        let content = match self.summarizer.summarize(room, messages).await {
            Ok(content) => content,
            Err(e) => {
                warn!(room = %room.id, error = %e, "summarization failed, room stays ended without summary");
                return None;
            }
        };

        let summary = Summary {
            id: Uuid::now_v7(),
            room_id: room.id,
            content,
            generated_at: now(),
        };
        if let Err(e) = db::insert_summary(&self.db_pool, &summary).await {
            warn!(room = %room.id, error = %e, "could not persist summary");
            return None;
        }

        info!(room = %room.id, messages = messages.len(), "summary generated");
        Some(summary)
    }

    pub async fn summary(&self, room_id: Uuid) -> CoreResult<Option<Summary>> {
        self.room(room_id).await?;
        Ok(db::fetch_summary(&self.db_pool, room_id).await?)
    }
}

//! Per-client persistent channel: authentication at open, membership in at
//! most one room, posting, and typed events back to the client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::Identity,
    error::{CoreError, CoreResult},
    model::{Message, MessageBody, Participant},
};

use super::{Rooms, live::LiveRoom};

/// Everything a connection can be told.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    #[serde(rename = "joined-room", rename_all = "camelCase")]
    Joined { room_id: Uuid, room_title: String },

    #[serde(rename = "new-message")]
    MessageReceived { message: Message },

    #[serde(rename = "room-ended", rename_all = "camelCase")]
    RoomEnded {
        room_id: Uuid,
        #[serde(with = "time::serde::rfc3339")]
        ended_at: OffsetDateTime,
    },

    #[serde(rename = "error")]
    ErrorOccurred { code: &'static str, message: String },
}

impl ServerEvent {
    pub fn error(err: &CoreError) -> Self {
        let message = if err.is_internal() {
            "internal error".to_owned()
        } else {
            err.to_string()
        };
        ServerEvent::ErrorOccurred {
            code: err.code(),
            message,
        }
    }
}

/// What a client sends over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: Uuid },
    LeaveRoom,
    #[serde(rename_all = "camelCase")]
    SendMessage {
        content: String,
        #[serde(default)]
        is_image: bool,
    },
}

pub struct Connection {
    id: Uuid,
    participant: Option<Participant>,
    room: Option<Arc<LiveRoom>>,
    events: UnboundedSender<ServerEvent>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn participant(&self) -> Option<&Participant> {
        self.participant.as_ref()
    }

    pub fn joined_room(&self) -> Option<Uuid> {
        self.room.as_ref().map(|room| room.id)
    }

    /// Queues the error for the client; a failure is never dropped silently.
    pub fn report(&self, err: &CoreError) {
        if err.is_internal() {
            warn!(conn = %self.id, error = %err, "connection operation failed");
        } else {
            debug!(conn = %self.id, code = err.code(), "rejected");
        }
        let _ = self.events.send(ServerEvent::error(err));
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    rooms: Rooms,
    identity: Arc<dyn Identity>,
}

impl ConnectionManager {
    pub fn new(rooms: Rooms, identity: Arc<dyn Identity>) -> Self {
        ConnectionManager { rooms, identity }
    }

    /// Authenticates once. A bad token leaves the connection open but anonymous.
    pub async fn open(&self, token: Option<&str>) -> (Connection, UnboundedReceiver<ServerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let mut conn = Connection {
            id: Uuid::now_v7(),
            participant: None,
            room: None,
            events,
        };

        if let Some(token) = token {
            match self.identity.resolve(token).await {
                Ok(participant) => conn.participant = Some(participant),
                Err(e) => conn.report(&e),
            }
        }

        info!(
            conn = %conn.id,
            participant = ?conn.participant.as_ref().map(|p| p.id),
            "connection opened"
        );
        (conn, rx)
    }

    /// Joining a different room moves the connection out of the current one;
    /// re-joining the current room is an `AlreadyJoined` error. A failed join
    /// leaves the existing membership untouched.
    pub async fn join(&self, conn: &mut Connection, room_id: Uuid) -> CoreResult<()> {
        if conn.participant.is_none() {
            return Err(CoreError::Auth("sign in to join a room".into()));
        }

        let live = self.rooms.live(room_id).await?;
        if conn.joined_room() == Some(room_id) {
            return Err(CoreError::AlreadyJoined(room_id));
        }

        live.subscribe(conn.id, conn.events.clone()).await?;
        if let Some(previous) = conn.room.replace(live) {
            previous.unsubscribe(conn.id).await;
        }
        Ok(())
    }

    pub async fn leave(&self, conn: &mut Connection) {
        if let Some(room) = conn.room.take() {
            room.unsubscribe(conn.id).await;
        }
    }

    pub async fn post(&self, conn: &Connection, body: MessageBody) -> CoreResult<Message> {
        let room = conn.room.as_ref().ok_or(CoreError::NotJoined)?;
        let participant = conn
            .participant
            .as_ref()
            .ok_or_else(|| CoreError::Auth("sign in to post".into()))?;

        self.rooms.append(participant, room.id, body).await
    }

    pub async fn disconnect(&self, mut conn: Connection) {
        self.leave(&mut conn).await;
        info!(conn = %conn.id, "connection closed");
    }

    /// Runs one client command, turning any failure into an error event.
    pub async fn handle(&self, conn: &mut Connection, command: ClientCommand) {
        let result = match command {
            ClientCommand::JoinRoom { room_id } => self.join(conn, room_id).await,
            ClientCommand::LeaveRoom => {
                self.leave(conn).await;
                Ok(())
            }
            ClientCommand::SendMessage { content, is_image } => {
                let body = if is_image {
                    MessageBody::Image(content)
                } else {
                    MessageBody::Text(content)
                };
                self.post(conn, body).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            conn.report(&e);
        }
    }
}

//! In-memory side of a room: the single write lock that serializes appends
//! and the close transition, plus the set of connections joined to it.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, MutexGuard, mpsc::UnboundedSender};
use tracing::debug;
use uuid::Uuid;

use crate::{
    db,
    error::{CoreError, CoreResult},
    model::Room,
};

use super::{Rooms, connection::ServerEvent};

pub(crate) struct LiveRoom {
    pub(crate) id: Uuid,
    state: Mutex<RoomState>,
}

pub(crate) struct RoomState {
    pub(crate) room: Room,
    /// Highest committed sequence position, 0 for an empty room.
    pub(crate) last_seq: i64,
    subscribers: HashMap<Uuid, UnboundedSender<ServerEvent>>,
}

impl RoomState {
    /// Delivers to every joined connection and forgets the ones whose queue is gone.
    pub(crate) fn broadcast(&mut self, event: &ServerEvent) -> usize {
        self.subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        self.subscribers.len()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl LiveRoom {
    fn new(room: Room, last_seq: i64) -> Self {
        LiveRoom {
            id: room.id,
            state: Mutex::new(RoomState {
                room,
                last_seq,
                subscribers: HashMap::new(),
            }),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Adds the connection to the broadcast group. The `Joined` ack goes out
    /// under the lock, so it always precedes any message broadcast to it.
    pub(crate) async fn subscribe(&self, conn_id: Uuid, tx: UnboundedSender<ServerEvent>) -> CoreResult<()> {
        let mut state = self.lock().await;
        if !state.room.status.is_active() {
            return Err(CoreError::RoomClosed);
        }

        let _ = tx.send(ServerEvent::Joined {
            room_id: self.id,
            room_title: state.room.title.clone(),
        });
        state.subscribers.insert(conn_id, tx);
        debug!(room = %self.id, conn = %conn_id, members = state.subscribers.len(), "joined");
        Ok(())
    }

    pub(crate) async fn unsubscribe(&self, conn_id: Uuid) -> bool {
        let mut state = self.lock().await;
        let removed = state.subscribers.remove(&conn_id).is_some();
        if removed {
            debug!(room = %self.id, conn = %conn_id, members = state.subscribers.len(), "left");
        }
        removed
    }
}

impl Rooms {
    /// The live handle for a room, loading it from the store on first use.
    /// Only active rooms are kept in the registry.
    pub(crate) async fn live(&self, room_id: Uuid) -> CoreResult<Arc<LiveRoom>> {
        if let Some(live) = self.live.get(&room_id) {
            return Ok(live.value().clone());
        }

        let room = db::fetch_room(&self.db_pool, room_id)
            .await?
            .ok_or(CoreError::RoomNotFound(room_id))?;
        let last_seq = db::last_seq(&self.db_pool, room_id).await?;

        // Ended rooms accept nothing, so a throwaway handle is enough to
        // answer with `RoomClosed`.
        if !room.status.is_active() {
            return Ok(Arc::new(LiveRoom::new(room, last_seq)));
        }

        // A concurrent loader may have won; everyone must share its handle.
        let live = self
            .live
            .entry(room_id)
            .or_insert_with(|| Arc::new(LiveRoom::new(room, last_seq)))
            .value()
            .clone();
        Ok(live)
    }

    pub(crate) fn register(&self, room: Room) {
        let id = room.id;
        self.live.entry(id).or_insert_with(|| Arc::new(LiveRoom::new(room, 0)));
    }
}

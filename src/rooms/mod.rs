mod connection;
mod directory;
mod lifecycle;
mod live;
mod log;
mod new;
mod room;
mod ws;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use dashmap::DashMap;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppState, storage::DocumentStorage, summaries::Summarizer};

pub use connection::{ClientCommand, Connection, ConnectionManager, ServerEvent};
pub use directory::{Partitioned, RoomFilter, partition};
pub use lifecycle::Closed;
pub use log::{HistoryView, MAX_MESSAGE_LEN, merge};
pub(crate) use ws::room_ws;

use live::LiveRoom;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(room::rooms).post(new::new_room))
        .route("/{id}", get(room::room))
        .route("/{id}/messages", get(room::messages))
        .route("/{id}/end", post(room::end_room))
        .route("/{id}/summary", get(room::summary))
}

/// Room directory, message logs and lifecycle over one record store.
/// Cheap to clone; clones share the live-room registry.
#[derive(Clone)]
pub struct Rooms {
    db_pool: SqlitePool,
    live: Arc<DashMap<Uuid, Arc<LiveRoom>>>,
    storage: Arc<dyn DocumentStorage>,
    summarizer: Arc<dyn Summarizer>,
}

impl Rooms {
    pub fn new(db_pool: SqlitePool, storage: Arc<dyn DocumentStorage>, summarizer: Arc<dyn Summarizer>) -> Self {
        Rooms {
            db_pool,
            live: Arc::new(DashMap::new()),
            storage,
            summarizer,
        }
    }

    /// Connections currently joined to a room that has been loaded.
    pub async fn member_count(&self, room_id: Uuid) -> usize {
        let Some(live) = self.live.get(&room_id).map(|entry| entry.value().clone()) else {
            return 0;
        };
        live.lock().await.subscriber_count()
    }

    /// Rooms currently held in the live registry.
    pub fn loaded_rooms(&self) -> usize {
        self.live.len()
    }
}

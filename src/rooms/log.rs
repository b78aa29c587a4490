use tracing::debug;
use uuid::Uuid;

use crate::{
    db,
    error::{CoreError, CoreResult},
    model::{Message, MessageBody, MessageSender, Participant, now},
    policy,
};

use super::{Rooms, connection::ServerEvent};

pub const MAX_MESSAGE_LEN: usize = 4000;

fn validate_body(body: MessageBody) -> CoreResult<MessageBody> {
    match body {
        MessageBody::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(CoreError::validation("message is empty"));
            }
            if text.chars().count() > MAX_MESSAGE_LEN {
                return Err(CoreError::validation(format!(
                    "message is longer than {MAX_MESSAGE_LEN} characters"
                )));
            }
            Ok(MessageBody::Text(text.to_owned()))
        }
        MessageBody::Image(url) => {
            let url = url.trim();
            if url.is_empty() || url.chars().any(char::is_whitespace) {
                return Err(CoreError::validation("image reference is not a url"));
            }
            Ok(MessageBody::Image(url.to_owned()))
        }
    }
}

impl Rooms {
    /// Appends to the room's log and fans the message out to every joined
    /// connection, the sender's included.
    ///
    /// Runs entirely under the room's write lock: the status check, the
    /// position assignment, the insert and the broadcast cannot interleave
    /// with another append or with the close transition.
    pub async fn append(&self, participant: &Participant, room_id: Uuid, body: MessageBody) -> CoreResult<Message> {
        let live = self.live(room_id).await?;
        let mut state = live.lock().await;

        policy::authorize_post(participant, state.room.status)?;
        let body = validate_body(body)?;

        let message = Message {
            id: Uuid::now_v7(),
            room_id,
            sender: Some(MessageSender {
                id: participant.id,
                name: participant.display_name.clone(),
            }),
            body,
            seq: state.last_seq + 1,
            created_at: now(),
        };
        db::insert_message(&self.db_pool, &message).await?;
        state.last_seq = message.seq;

        let delivered = state.broadcast(&ServerEvent::MessageReceived {
            message: message.clone(),
        });
        debug!(room = %room_id, seq = message.seq, delivered, "message appended");
        Ok(message)
    }

    /// Committed messages in order. Readable by anyone, whatever the status.
    pub async fn history(&self, room_id: Uuid) -> CoreResult<Vec<Message>> {
        self.room(room_id).await?;
        db::fetch_messages(&self.db_pool, room_id).await
    }
}

/// Client-side view of a room: one historical fetch, then live events
/// appended as they arrive.
///
/// Nothing is deduplicated or reordered. Messages broadcast between the
/// historical read and the join ack can be missed.
#[derive(Debug, Default, Clone)]
pub struct HistoryView {
    messages: Vec<Message>,
}

impl HistoryView {
    pub fn new(historical: Vec<Message>) -> Self {
        HistoryView { messages: historical }
    }

    /// Returns whether the event added a message.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::MessageReceived { message } => {
                self.messages.push(message.clone());
                true
            }
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

pub fn merge(historical: Vec<Message>, live: &[ServerEvent]) -> Vec<Message> {
    let mut view = HistoryView::new(historical);
    for event in live {
        view.apply(event);
    }
    view.messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(seq: i64) -> Message {
        Message {
            id: Uuid::now_v7(),
            room_id: Uuid::nil(),
            sender: None,
            body: MessageBody::Text(format!("m{seq}")),
            seq,
            created_at: now(),
        }
    }

    #[test]
    fn blank_bodies_are_rejected() {
        assert!(matches!(
            validate_body(MessageBody::Text("   ".into())),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            validate_body(MessageBody::Image("".into())),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(
            validate_body(MessageBody::Text(" hi ".into())).unwrap(),
            MessageBody::Text("hi".into())
        );
    }

    #[test]
    fn overlong_text_is_rejected() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(validate_body(MessageBody::Text(long)), Err(CoreError::Validation(_))));
    }

    #[test]
    fn merge_appends_live_events_in_arrival_order() {
        let live = vec![
            ServerEvent::Joined {
                room_id: Uuid::nil(),
                room_title: "t".into(),
            },
            ServerEvent::MessageReceived { message: message(3) },
            ServerEvent::MessageReceived { message: message(4) },
        ];

        let merged = merge(vec![message(1), message(2)], &live);
        let seqs: Vec<i64> = merged.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn merge_does_not_deduplicate() {
        let dup = message(2);
        let merged = merge(vec![message(1), dup.clone()], &[ServerEvent::MessageReceived { message: dup }]);
        assert_eq!(merged.len(), 3);
    }
}

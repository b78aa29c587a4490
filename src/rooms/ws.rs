use std::ops::ControlFlow;

use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::{auth::bearer_token, error::CoreError};

use super::{ClientCommand, Connection, ConnectionManager};

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a websocket, so the token may also come in the query.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Query(WsQuery { token }): Query<WsQuery>,
    State(connections): State<ConnectionManager>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = token.or_else(|| bearer_token(&headers).map(str::to_owned));

    ws.on_upgrade(async move |stream| serve(connections, token, stream).await)
}

async fn serve(connections: ConnectionManager, token: Option<String>, stream: WebSocket) {
    let (mut conn, mut events) = connections.open(token.as_deref()).await;
    let (mut sender, mut receiver) = stream.split();

    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(msg)) = incoming else {
                    break;
                };
                if dispatch(&connections, &mut conn, msg).await.is_break() {
                    break;
                }
            }
            _ = &mut forward_task => break,
        }
    }

    connections.disconnect(conn).await;
    forward_task.abort();
}

/// Handles one frame from the client. Breaks when the client closes.
async fn dispatch(connections: &ConnectionManager, conn: &mut Connection, msg: WsMessage) -> ControlFlow<()> {
    match msg {
        WsMessage::Text(text) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
            Ok(command) => connections.handle(conn, command).await,
            Err(e) => conn.report(&CoreError::validation(format!("malformed command: {e}"))),
        },
        WsMessage::Binary(_) => conn.report(&CoreError::validation("commands must be text frames")),
        WsMessage::Close(_) => return ControlFlow::Break(()),
        _ => {}
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        AppState,
        config::Config,
        db,
        model::Draft,
        rooms::ServerEvent,
        storage::{DiskStorage, Upload},
        summaries::TranscriptSummarizer,
    };

    async fn state(dir: &std::path::Path) -> AppState {
        let config = Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "sqlite::memory:".to_owned())).unwrap();
        let pool = db::connect(&config.database_url, 1).await.unwrap();
        AppState::with_collaborators(
            config,
            pool,
            Arc::new(DiskStorage::new(dir, "/uploads")),
            Arc::new(TranscriptSummarizer),
        )
    }

    #[tokio::test]
    async fn malformed_frames_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let (mut conn, mut events) = state.connections.open(None).await;

        let flow = dispatch(&state.connections, &mut conn, WsMessage::Text("{not json".into())).await;
        assert!(flow.is_continue());
        let flow = dispatch(&state.connections, &mut conn, WsMessage::Binary(vec![1, 2].into())).await;
        assert!(flow.is_continue());
        let flow = dispatch(
            &state.connections,
            &mut conn,
            WsMessage::Text(r#"{"event":"send-message","content":"hi"}"#.into()),
        )
        .await;
        assert!(flow.is_continue());

        let codes: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| match event {
                ServerEvent::ErrorOccurred { code, .. } => code,
                other => panic!("expected an error event, got {other:?}"),
            })
            .collect();
        assert_eq!(codes, vec!["validation_error", "validation_error", "not_joined"]);
    }

    #[tokio::test]
    async fn join_command_then_close_frame_releases_membership() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let (token, asha) = state.profiles.signup("Asha", "asha@ietdavv.edu.in").await.unwrap();
        let draft = Draft {
            title: Some("OS midsem".into()),
            subject: Some("OS".into()),
            semester: Some("4".into()),
            year: Some("2023".into()),
            exam_type: Some("midsem".into()),
        };
        let upload = Upload {
            file_name: "q.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1],
        };
        let room = state.rooms.create(&asha, &draft, Some(upload)).await.unwrap();

        let (mut conn, mut events) = state.connections.open(Some(&token)).await;
        let join = format!(r#"{{"event":"join-room","roomId":"{}"}}"#, room.id);
        assert!(dispatch(&state.connections, &mut conn, WsMessage::Text(join.into())).await.is_continue());
        assert!(matches!(events.try_recv(), Ok(ServerEvent::Joined { .. })));
        assert_eq!(state.rooms.member_count(room.id).await, 1);

        assert!(dispatch(&state.connections, &mut conn, WsMessage::Close(None)).await.is_break());
        state.connections.disconnect(conn).await;
        assert_eq!(state.rooms.member_count(room.id).await, 0);
    }
}

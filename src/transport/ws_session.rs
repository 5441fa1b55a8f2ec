use super::outbound::{ConnectionHandle, Outgoing};
use crate::server::{ConnectionSession, GameServer};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;

pub async fn handle_socket(socket: WebSocket, server: Arc<GameServer>, read_timeout: Duration) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut outgoing) = ConnectionHandle::channel();
    let connection_id = connection.id();
    let mut session = ConnectionSession::new(connection);
    tracing::debug!(%connection_id, "websocket opened");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outgoing.recv().await {
            match frame {
                Outgoing::Text(payload) => {
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Outgoing::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        let next = tokio::select! {
            next = tokio::time::timeout(read_timeout, receiver.next()) => next,
            _ = &mut send_task => {
                tracing::debug!(%connection_id, "writer finished, closing session");
                break;
            }
        };
        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(error))) => {
                tracing::debug!(%connection_id, ?error, "websocket read failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(%connection_id, "read deadline exceeded");
                break;
            }
        };
        match message {
            Message::Text(text) => server.handle_text(&mut session, &text).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => server.handle_text(&mut session, text).await,
                Err(_) => tracing::debug!(%connection_id, "ignoring non-utf8 binary frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    server.connection_closed(&session).await;
    drop(session);
    send_task.abort();
    tracing::debug!(%connection_id, "websocket closed");
}

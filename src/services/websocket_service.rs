use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::state::{SharedState, broadcast::SPECTATOR_QUEUE};

/// Stream attempt updates of one competition to a spectator WebSocket.
///
/// Spectators only listen; inbound text frames are ignored.
pub async fn handle_socket(state: SharedState, competition_id: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(SPECTATOR_QUEUE);

    // Dedicated writer task keeps outbound events flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let subscriber_id = state
        .broadcast()
        .subscribe(&competition_id, Arc::new(outbound_tx))
        .await;
    info!(competition_id = %competition_id, subscriber_id = %subscriber_id, "spectator websocket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => {
                info!(competition_id = %competition_id, "spectator closed websocket");
                break;
            }
            Ok(Message::Text(_)) | Ok(Message::Binary(_)) => {}
            // Pongs are answered by the underlying protocol implementation.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(competition_id = %competition_id, error = %err, "websocket error");
                break;
            }
        }
    }

    // The hub holds the last sender clone; the writer ends once it is gone.
    state
        .broadcast()
        .unsubscribe(&competition_id, subscriber_id)
        .await;
    finalize(writer_task).await;
    info!(competition_id = %competition_id, "spectator websocket disconnected");
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>) {
    let _ = writer_task.await;
}

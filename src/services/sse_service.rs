use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::state::{SharedState, broadcast::SPECTATOR_QUEUE};

/// Register an SSE spectator for a competition and stream its attempt updates.
///
/// The subscription is released as soon as the client disconnects.
pub async fn subscribe(
    state: SharedState,
    competition_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (sink_tx, mut sink_rx) = mpsc::channel::<String>(SPECTATOR_QUEUE);
    let subscriber_id = state
        .broadcast()
        .subscribe(&competition_id, Arc::new(sink_tx))
        .await;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                payload = sink_rx.recv() => {
                    let Some(payload) = payload else { break };
                    let event = Event::default().event("try_update").data(payload);
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        state
            .broadcast()
            .unsubscribe(&competition_id, subscriber_id)
            .await;
        info!(competition_id = %competition_id, "spectator SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

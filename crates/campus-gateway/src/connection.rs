use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use campus_types::events::HubPayload;

use crate::hub::Hub;

/// Handle one realtime channel opened at `/users/messages/{user_id}`.
///
/// The user id comes straight from the path and is not authenticated.
pub async fn handle_connection(socket: WebSocket, hub: Hub, raw_user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<HubPayload>();

    // Forward hub payloads -> client as JSON text frames
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let text = match serde_json::to_string(&payload) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode realtime payload: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let Some(id) = hub.connect(&raw_user_id, tx.clone()).await else {
        // Let the writer flush the error payload, then close
        drop(tx);
        let _ = send_task.await;
        return;
    };

    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    trace!("User {} sent {} bytes", id.user_id, text.as_str().len());
                    recv_hub.handle_message(&tx, text.as_str()).await;
                }
                Message::Binary(_) => {
                    warn!("User {} sent a binary frame, ignoring", id.user_id);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(id).await;
}

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use campus_db::models::HistoryRow;
use campus_db::{Database, StoreError};
use campus_types::events::{
    HistoryMessage, HubPayload, INVALID_USER_ID, RECIPIENT_NOT_FOUND, STORE_FAILURE,
    SendMessageCommand,
};

/// Outbound half of one open realtime channel.
pub type Outbound = mpsc::UnboundedSender<HubPayload>;

/// Identifies one registered connection. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub user_id: i64,
    pub conn_id: Uuid,
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid message payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("recipient '{0}' does not exist")]
    RecipientNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl HubError {
    /// Payload reported back to the originating channel.
    pub fn to_payload(&self) -> HubPayload {
        match self {
            Self::InvalidPayload(e) => HubPayload::error(format!("Invalid message payload: {}", e)),
            Self::RecipientNotFound(_) => HubPayload::error(RECIPIENT_NOT_FOUND),
            Self::Store(_) | Self::Task(_) => HubPayload::error(STORE_FAILURE),
        }
    }
}

/// Registry of open realtime channels and the broadcast-on-write coordinator.
///
/// Every successful write re-sends the full history of each connection's
/// user to that connection, for all connections, not only the two parties.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    db: Arc<Database>,

    /// user_id -> (conn_id -> outbound sender)
    connections: RwLock<HashMap<i64, HashMap<Uuid, Outbound>>>,
}

impl Hub {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                db,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a channel for `raw_user_id` and replay its history.
    /// An id that is not an integer gets an error payload and is not registered.
    pub async fn connect(&self, raw_user_id: &str, outbound: Outbound) -> Option<ConnectionId> {
        let Ok(user_id) = raw_user_id.trim().parse::<i64>() else {
            warn!("Rejected realtime channel for invalid user id '{}'", raw_user_id);
            let _ = outbound.send(HubPayload::error(INVALID_USER_ID));
            return None;
        };

        let id = ConnectionId {
            user_id,
            conn_id: Uuid::new_v4(),
        };
        self.inner
            .connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(id.conn_id, outbound.clone());

        info!("Realtime channel opened for user {} ({})", user_id, id.conn_id);

        let payload = match self.history_payload(user_id).await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to load history for user {}: {}", user_id, e);
                e.to_payload()
            }
        };
        let _ = outbound.send(payload);

        Some(id)
    }

    /// Remove one connection. No broadcast follows.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut connections = self.inner.connections.write().await;
        let Some(user_connections) = connections.get_mut(&id.user_id) else {
            return;
        };
        let removed = user_connections.remove(&id.conn_id).is_some();
        if user_connections.is_empty() {
            connections.remove(&id.user_id);
        }
        drop(connections);

        if removed {
            info!("Realtime channel closed for user {} ({})", id.user_id, id.conn_id);
        }
    }

    /// Handle one inbound frame from `outbound`'s client. Failures are
    /// reported to that channel only; the channel stays open.
    pub async fn handle_message(&self, outbound: &Outbound, raw_payload: &str) {
        if let Err(e) = self.process_message(raw_payload).await {
            match &e {
                HubError::InvalidPayload(_) | HubError::RecipientNotFound(_) => {
                    warn!("Rejected realtime message: {}", e)
                }
                HubError::Store(_) | HubError::Task(_) => {
                    error!("Failed to store realtime message: {}", e)
                }
            }
            let _ = outbound.send(e.to_payload());
        }
    }

    async fn process_message(&self, raw_payload: &str) -> Result<(), HubError> {
        let command: SendMessageCommand = serde_json::from_str(raw_payload)?;

        let db = self.inner.db.clone();
        let identifier = command.receiver_identifier.clone();
        let receiver_id = tokio::task::spawn_blocking(move || db.resolve_recipient(&identifier))
            .await??
            .ok_or_else(|| HubError::RecipientNotFound(command.receiver_identifier.clone()))?;

        let db = self.inner.db.clone();
        let message_id = tokio::task::spawn_blocking(move || {
            db.append_message(command.sender_id, receiver_id, &command.message_content)
        })
        .await??;

        debug!("Stored message {} for receiver {}", message_id, receiver_id);

        self.broadcast_histories().await;
        Ok(())
    }

    /// Push a freshly fetched history to every registered connection.
    /// A failure for one connection never stops delivery to the rest;
    /// connections whose channel has closed are pruned afterwards.
    pub async fn broadcast_histories(&self) {
        // Snapshot so no lock is held across store calls or sends
        let mut snapshot: Vec<(ConnectionId, Outbound)> = {
            let connections = self.inner.connections.read().await;
            connections
                .iter()
                .flat_map(|(&user_id, user_connections)| {
                    user_connections.iter().map(move |(&conn_id, tx)| {
                        (ConnectionId { user_id, conn_id }, tx.clone())
                    })
                })
                .collect()
        };
        snapshot.sort_by_key(|(id, _)| (id.user_id, id.conn_id));

        let mut stale = Vec::new();
        for (id, tx) in snapshot {
            if tx.is_closed() {
                stale.push(id);
                continue;
            }

            let payload = match self.history_payload(id.user_id).await {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Broadcast: failed to load history for user {}: {}", id.user_id, e);
                    continue;
                }
            };

            if tx.send(payload).is_err() {
                warn!("Broadcast: channel for user {} ({}) already closed", id.user_id, id.conn_id);
                stale.push(id);
            }
        }

        for id in stale {
            self.disconnect(id).await;
        }
    }

    #[cfg(test)]
    async fn connection_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .await
            .values()
            .map(HashMap::len)
            .sum()
    }

    async fn history_payload(&self, user_id: i64) -> Result<HubPayload, HubError> {
        let db = self.inner.db.clone();
        let rows = tokio::task::spawn_blocking(move || db.fetch_history(user_id)).await??;
        Ok(HubPayload::history(rows.into_iter().map(history_message).collect()))
    }
}

fn history_message(row: HistoryRow) -> HistoryMessage {
    HistoryMessage {
        message_id: row.id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        message_content: row.content,
        sender_name: row.sender_name,
        receiver_name: row.receiver_name,
        is_receiver: row.is_receiver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_db::models::NewUser;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn setup() -> (Hub, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (Hub::new(db.clone()), db)
    }

    fn add_user(db: &Database, username: &str) -> i64 {
        db.create_user(&NewUser {
            username,
            email: "someone@example.com",
            password_hash: "hash",
            first_name: "First",
            last_name: "Last",
            user_type: "student",
            avatar: None,
            olympic_sport: None,
        })
        .unwrap()
    }

    async fn open(hub: &Hub, user_id: i64) -> (ConnectionId, Outbound, UnboundedReceiver<HubPayload>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.connect(&user_id.to_string(), tx.clone()).await.unwrap();
        // Drain the replayed history
        assert!(matches!(rx.try_recv().unwrap(), HubPayload::History { .. }));
        (id, tx, rx)
    }

    fn expect_history(rx: &mut UnboundedReceiver<HubPayload>) -> Vec<HistoryMessage> {
        match rx.try_recv().expect("expected a payload") {
            HubPayload::History { messages } => messages,
            other => panic!("expected history, got {:?}", other),
        }
    }

    fn send_json(sender: i64, receiver: &str, content: &str) -> String {
        serde_json::json!({
            "senderId": sender,
            "receiverIdentifier": receiver,
            "messageContent": content,
        })
        .to_string()
    }

    #[tokio::test]
    async fn invalid_user_id_is_rejected_without_registering() {
        let (hub, _db) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(hub.connect("abc", tx).await.is_none());
        assert_eq!(rx.try_recv().unwrap(), HubPayload::error(INVALID_USER_ID));
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn connect_replays_existing_history() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        db.append_message(alice, bob, "earlier").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.connect(&bob.to_string(), tx).await.unwrap();

        let history = expect_history(&mut rx);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message_content, "earlier");
        assert!(history[0].is_receiver);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_recipient_reports_one_error_and_stores_nothing() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;
        let (_, _, mut bob_rx) = open(&hub, bob).await;

        hub.handle_message(&alice_tx, &send_json(alice, "nobody", "hello?"))
            .await;

        assert_eq!(alice_rx.try_recv().unwrap(), HubPayload::error(RECIPIENT_NOT_FOUND));
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
        assert!(db.fetch_history(alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_resyncs_every_open_connection() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let carol = add_user(&db, "carol");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;
        let (_, _, mut bob_rx) = open(&hub, bob).await;
        let (_, _, mut bob_second_tab) = open(&hub, bob).await;
        let (_, _, mut carol_rx) = open(&hub, carol).await;

        hub.handle_message(&alice_tx, &send_json(alice, "bob", "hi")).await;

        let stored = db.fetch_history(bob).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!((stored[0].sender_id, stored[0].receiver_id), (alice, bob));
        assert_eq!(stored[0].content, "hi");

        let for_alice = expect_history(&mut alice_rx);
        assert_eq!(for_alice.len(), 1);
        assert!(!for_alice[0].is_receiver);

        for rx in [&mut bob_rx, &mut bob_second_tab] {
            let for_bob = expect_history(rx);
            assert_eq!(for_bob.len(), 1);
            assert!(for_bob[0].is_receiver);
            assert_eq!(for_bob[0].sender_name, "alice");
            assert_eq!(for_bob[0].receiver_name, "bob");
        }

        // Unrelated users are re-synced too, with their own (empty) history
        assert!(expect_history(&mut carol_rx).is_empty());
    }

    #[tokio::test]
    async fn recipient_can_be_addressed_by_numeric_id() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;

        let raw = serde_json::json!({
            "senderId": alice,
            "receiverIdentifier": bob,
            "messageContent": "by id",
        })
        .to_string();
        hub.handle_message(&alice_tx, &raw).await;

        let history = expect_history(&mut alice_rx);
        assert_eq!(history[0].receiver_id, bob);
    }

    #[tokio::test]
    async fn closed_channel_is_skipped_and_pruned() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let carol = add_user(&db, "carol");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;
        let (bob_id, _, bob_rx) = open(&hub, bob).await;
        let (_, _, mut carol_rx) = open(&hub, carol).await;

        // Bob's client goes away without a disconnect
        drop(bob_rx);

        hub.handle_message(&alice_tx, &send_json(alice, "bob", "are you there")).await;

        assert_eq!(expect_history(&mut alice_rx).len(), 1);
        assert!(expect_history(&mut carol_rx).is_empty());
        assert_eq!(hub.connection_count().await, 2);

        // The connection loop's own disconnect after a prune is a no-op
        hub.disconnect(bob_id).await;
        assert_eq!(hub.connection_count().await, 2);
    }

    #[tokio::test]
    async fn channel_closing_after_snapshot_is_pruned() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let (_, _, alice_rx) = open(&hub, alice).await;
        let (_, _, mut bob_rx) = open(&hub, bob).await;

        // Hold the store so the broadcast stalls on alice's history fetch
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let holder_db = db.clone();
        let holder = std::thread::spawn(move || {
            holder_db
                .with_conn(|_| {
                    locked_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
                .unwrap();
        });
        locked_rx.recv().unwrap();

        let broadcast = tokio::spawn({
            let hub = hub.clone();
            async move { hub.broadcast_histories().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!broadcast.is_finished());

        // Alice's client goes away while her payload is being prepared
        drop(alice_rx);
        release_tx.send(()).unwrap();
        broadcast.await.unwrap();
        holder.join().unwrap();

        assert!(expect_history(&mut bob_rx).is_empty());
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn sender_id_may_arrive_as_a_string() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;

        let raw = serde_json::json!({
            "senderId": alice.to_string(),
            "receiverIdentifier": "bob",
            "messageContent": "from the browser",
        })
        .to_string();
        hub.handle_message(&alice_tx, &raw).await;

        let history = expect_history(&mut alice_rx);
        assert_eq!(history.len(), 1);
        assert_eq!((history[0].sender_id, history[0].receiver_id), (alice, bob));
    }

    #[tokio::test]
    async fn malformed_payload_keeps_channel_open() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;

        hub.handle_message(&alice_tx, "not json").await;
        match alice_rx.try_recv().unwrap() {
            HubPayload::Error { error } => assert!(error.starts_with("Invalid message payload")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(hub.connection_count().await, 1);

        hub.handle_message(&alice_tx, &send_json(alice, "bob", "retry")).await;
        assert_eq!(expect_history(&mut alice_rx).len(), 1);
        assert_eq!(db.fetch_history(bob).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_reported_to_sender_only() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        let (_, alice_tx, mut alice_rx) = open(&hub, alice).await;

        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE messages")?;
            Ok(())
        })
        .unwrap();

        hub.handle_message(&alice_tx, &send_json(alice, "bob", "lost")).await;
        assert_eq!(alice_rx.try_recv().unwrap(), HubPayload::error(STORE_FAILURE));
        assert!(alice_rx.try_recv().is_err());
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn disconnect_removes_only_that_connection() {
        let (hub, db) = setup();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let (first, alice_tx, _first_rx) = open(&hub, alice).await;
        let (_, _, mut second_rx) = open(&hub, alice).await;
        assert_eq!(hub.connection_count().await, 2);

        hub.disconnect(first).await;
        assert_eq!(hub.connection_count().await, 1);

        hub.handle_message(&alice_tx, &send_json(alice, "bob", "still here")).await;
        assert_eq!(expect_history(&mut second_rx).len(), 1);
        assert_eq!(db.fetch_history(bob).unwrap().len(), 1);
    }
}

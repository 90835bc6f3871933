//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.
//! Each connection owns a [`ConnectionSubscriptions`]; dropping it when the
//! connection ends removes every listener the connection registered.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;
use crate::notify::{HubError, ListenerError, NotificationHub, SubscriptionHandle};
use crate::storage::MetricKind;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts message handling.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Hub subscriptions held by one connection
///
/// Listeners forward change events into the connection's outbound channel.
pub struct ConnectionSubscriptions {
    hub: Arc<NotificationHub>,
    tx: mpsc::UnboundedSender<ServerMessage>,
    handles: Mutex<HashMap<MetricKind, SubscriptionHandle>>,
}

impl ConnectionSubscriptions {
    pub fn new(hub: Arc<NotificationHub>, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            hub,
            tx,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a metric; already-subscribed metrics are left as they are
    pub fn subscribe(&self, metric: MetricKind) -> Result<(), HubError> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.contains_key(&metric) {
            return Ok(());
        }

        let tx = self.tx.clone();
        let handle = self.hub.subscribe(metric, move |value| {
            tx.send(ServerMessage::new_value(metric, value))
                .map_err(|_| ListenerError::Closed)
        })?;
        handles.insert(metric, handle);
        Ok(())
    }

    /// Unsubscribe from a metric; returns false if it was not subscribed
    pub fn unsubscribe(&self, metric: MetricKind) -> bool {
        let handle = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&metric);

        match handle {
            Some(handle) => self.hub.unsubscribe(&handle),
            None => false,
        }
    }

    /// Currently subscribed metrics
    pub fn metrics(&self) -> Vec<MetricKind> {
        let mut metrics: Vec<MetricKind> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        metrics.sort();
        metrics
    }
}

impl Drop for ConnectionSubscriptions {
    fn drop(&mut self) {
        let handles = self.handles.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in handles.drain() {
            self.hub.unsubscribe(&handle);
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<NotificationHub>) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let subscriptions = Arc::new(ConnectionSubscriptions::new(hub, tx.clone()));
    for metric in MetricKind::all() {
        if let Err(e) = subscriptions.subscribe(*metric) {
            tracing::error!(connection_id = %connection_id, error = %e, "Failed to subscribe connection");
            let _ = send_json(
                &mut sender,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connected");

    let _ = tx.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    let conn_id_for_send = connection_id.clone();

    // Task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if send_json(&mut sender, &msg).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let subs_for_recv = Arc::clone(&subscriptions);
    let conn_id_for_recv = connection_id.clone();

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&subs_for_recv, &tx, &conn_id_for_recv, msg) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // Cleanup: the last reference drops here and unsubscribes from the hub
    drop(subscriptions);
    tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
fn handle_ws_message(
    subscriptions: &ConnectionSubscriptions,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    connection_id: &str,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    let _ = tx.send(handle_client_message(subscriptions, connection_id, client_msg));
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                    // Send error but keep connection open
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    });
                }
            }
            true
        }
        Message::Binary(_) => {
            let _ = tx.send(ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            });
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message and build the reply
fn handle_client_message(
    subscriptions: &ConnectionSubscriptions,
    connection_id: &str,
    message: ClientMessage,
) -> ServerMessage {
    match message {
        ClientMessage::Subscribe { metrics } => {
            for metric in &metrics {
                if let Err(e) = subscriptions.subscribe(*metric) {
                    tracing::error!(connection_id = %connection_id, error = %e, "Subscribe error");
                    return ServerMessage::Error {
                        message: e.to_string(),
                    };
                }
            }
            tracing::debug!(connection_id = %connection_id, metrics = ?metrics, "Subscribed to metrics");
            ServerMessage::Subscribed {
                metrics: subscriptions.metrics(),
            }
        }
        ClientMessage::Unsubscribe { metrics } => {
            let removed: Vec<MetricKind> = metrics
                .into_iter()
                .filter(|metric| subscriptions.unsubscribe(*metric))
                .collect();
            tracing::debug!(connection_id = %connection_id, metrics = ?removed, "Unsubscribed from metrics");
            ServerMessage::Unsubscribed { metrics: removed }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::HubConfig;

    fn setup() -> (
        Arc<NotificationHub>,
        ConnectionSubscriptions,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let hub = Arc::new(NotificationHub::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let subs = ConnectionSubscriptions::new(Arc::clone(&hub), tx);
        (hub, subs, rx)
    }

    #[test]
    fn test_subscription_forwards_changes() {
        let (hub, subs, mut rx) = setup();

        subs.subscribe(MetricKind::Temperature).unwrap();
        hub.publish(MetricKind::Temperature, 23.4);
        hub.publish(MetricKind::Humidity, 50.0);

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::NewTemperature { value: 23.4 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribe_is_idempotent_per_connection() {
        let (hub, subs, mut rx) = setup();

        subs.subscribe(MetricKind::Humidity).unwrap();
        subs.subscribe(MetricKind::Humidity).unwrap();
        assert_eq!(hub.listener_count(MetricKind::Humidity), 1);

        hub.publish(MetricKind::Humidity, 47.0);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let (hub, subs, mut rx) = setup();

        subs.subscribe(MetricKind::Temperature).unwrap();
        assert!(subs.unsubscribe(MetricKind::Temperature));
        assert!(!subs.unsubscribe(MetricKind::Temperature));

        hub.publish(MetricKind::Temperature, 20.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_tears_down_listeners() {
        let (hub, subs, _rx) = setup();

        subs.subscribe(MetricKind::Temperature).unwrap();
        subs.subscribe(MetricKind::Humidity).unwrap();
        drop(subs);

        assert_eq!(hub.listener_count(MetricKind::Temperature), 0);
        assert_eq!(hub.listener_count(MetricKind::Humidity), 0);
    }

    #[test]
    fn test_closed_receiver_fails_listener() {
        let (hub, subs, rx) = setup();

        subs.subscribe(MetricKind::Temperature).unwrap();
        drop(rx);

        let report = hub.publish(MetricKind::Temperature, 20.0);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_client_messages() {
        let (_hub, subs, _rx) = setup();

        let reply = handle_client_message(
            &subs,
            "conn",
            ClientMessage::Subscribe {
                metrics: vec![MetricKind::Humidity, MetricKind::Temperature],
            },
        );
        assert_eq!(
            reply,
            ServerMessage::Subscribed {
                metrics: vec![MetricKind::Temperature, MetricKind::Humidity]
            }
        );

        let reply = handle_client_message(
            &subs,
            "conn",
            ClientMessage::Unsubscribe {
                metrics: vec![MetricKind::Humidity, MetricKind::Humidity],
            },
        );
        assert_eq!(
            reply,
            ServerMessage::Unsubscribed {
                metrics: vec![MetricKind::Humidity]
            }
        );

        let reply = handle_client_message(&subs, "conn", ClientMessage::Ping);
        assert_eq!(reply, ServerMessage::Pong);
    }

    #[test]
    fn test_subscribe_over_limit_reports_error() {
        let hub = Arc::new(NotificationHub::new(HubConfig {
            max_listeners_per_metric: 0,
        }));
        let (tx, _rx) = mpsc::unbounded_channel();
        let subs = ConnectionSubscriptions::new(hub, tx);

        let reply = handle_client_message(
            &subs,
            "conn",
            ClientMessage::Subscribe {
                metrics: vec![MetricKind::Temperature],
            },
        );
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn test_socket_lifecycle() {
        use crate::api::build_router;
        use crate::config::Config;
        use crate::poller::ReadingCache;
        use crate::query::QueryService;
        use crate::storage::ReadingStore;
        use std::time::Duration;
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::open(dir.path().join("readings.db")).unwrap();
        let cache = Arc::new(ReadingCache::new());
        let hub = Arc::new(NotificationHub::default());
        let queries = QueryService::new(store, Arc::clone(&cache), 10, 15);
        let state = AppState::new(queries, cache, Arc::clone(&hub), Config::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();

        let next_json = |msg: Option<Result<WsMessage, _>>| -> serde_json::Value {
            match msg.unwrap().unwrap() {
                WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
                other => panic!("unexpected frame: {:?}", other),
            }
        };

        let first = next_json(ws.next().await);
        assert_eq!(first["type"], "connected");
        assert!(first["connectionId"].is_string());

        assert_eq!(hub.listener_count(MetricKind::Temperature), 1);
        assert_eq!(hub.listener_count(MetricKind::Humidity), 1);

        hub.publish(MetricKind::Humidity, 48.5);
        let change = next_json(ws.next().await);
        assert_eq!(change, serde_json::json!({ "type": "new-humidity", "value": 48.5 }));

        ws.close(None).await.unwrap();
        drop(ws);

        let released = tokio::time::timeout(Duration::from_secs(5), async {
            while hub.listener_count(MetricKind::Temperature) > 0
                || hub.listener_count(MetricKind::Humidity) > 0
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "listeners still registered after disconnect");

        server.abort();
    }

    #[test]
    fn test_text_message_handling() {
        let (_hub, subs, mut rx) = setup();
        let (tx, mut replies) = mpsc::unbounded_channel();

        assert!(handle_ws_message(&subs, &tx, "conn", Message::Text(r#"{"type":"ping"}"#.into())));
        assert_eq!(replies.try_recv().unwrap(), ServerMessage::Pong);

        assert!(handle_ws_message(&subs, &tx, "conn", Message::Text("nonsense".into())));
        assert!(matches!(replies.try_recv().unwrap(), ServerMessage::Error { .. }));

        assert!(!handle_ws_message(&subs, &tx, "conn", Message::Close(None)));
        assert!(rx.try_recv().is_err());
    }
}

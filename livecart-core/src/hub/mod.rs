// File: src/hub/mod.rs

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage};
pub use server::{router, serve, AppState};

use std::str::FromStr;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Who receives a session's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastScope {
    /// Only connections subscribed to the session.
    #[default]
    Session,
    /// Every open connection, subscribed or not.
    Global,
}

impl FromStr for BroadcastScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(BroadcastScope::Session),
            "global" => Ok(BroadcastScope::Global),
            other => Err(format!("Unknown broadcast scope: {}", other)),
        }
    }
}

struct ClientHandle {
    tx: UnboundedSender<ServerMessage>,
    session_id: Option<String>,
}

/// Registry of open dashboard connections.
///
/// Each connection owns an unbounded queue drained by its socket writer,
/// so broadcasting never awaits a slow client and events for one
/// connection stay in the order they were broadcast.
pub struct Hub {
    connections: DashMap<Uuid, ClientHandle>,
    scope: BroadcastScope,
}

impl Hub {
    pub fn new(scope: BroadcastScope) -> Self {
        Self {
            connections: DashMap::new(),
            scope,
        }
    }

    pub fn scope(&self) -> BroadcastScope {
        self.scope
    }

    /// Registers a connection and queues its greeting.
    pub fn connect(&self) -> (Uuid, UnboundedReceiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ServerMessage::Connected { connection_id: id });
        self.connections.insert(id, ClientHandle { tx, session_id: None });
        info!(connection_id = %id, "Client connected. Total clients: {}", self.connections.len());
        (id, rx)
    }

    /// Points the connection at `session_id`, replacing any earlier
    /// subscription. Returns `false` for an unknown connection.
    pub fn subscribe(&self, connection_id: Uuid, session_id: &str) -> bool {
        match self.connections.get_mut(&connection_id) {
            Some(mut handle) => {
                handle.session_id = Some(session_id.to_string());
                info!(%connection_id, %session_id, "Client subscribed to session.");
                true
            }
            None => false,
        }
    }

    pub fn disconnect(&self, connection_id: Uuid) {
        if self.connections.remove(&connection_id).is_some() {
            info!(%connection_id, "Client disconnected. Total clients: {}", self.connections.len());
        }
    }

    pub fn subscription(&self, connection_id: Uuid) -> Option<String> {
        self.connections.get(&connection_id).and_then(|h| h.session_id.clone())
    }

    pub fn send_to(&self, connection_id: Uuid, message: ServerMessage) -> bool {
        self.connections
            .get(&connection_id)
            .map(|h| h.tx.send(message).is_ok())
            .unwrap_or(false)
    }

    /// Queues `message` for every connection in scope for `session_id`.
    /// Connections whose writer has gone away are dropped. Returns how many
    /// connections the message was queued for.
    pub fn broadcast(&self, session_id: &str, message: ServerMessage) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            let in_scope = match self.scope {
                BroadcastScope::Global => true,
                BroadcastScope::Session => entry.session_id.as_deref() == Some(session_id),
            };
            if !in_scope {
                continue;
            }
            if entry.tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        // Removal waits until the shard read guards above are released.
        for id in dead {
            debug!(connection_id = %id, "Dropping closed connection.");
            self.connections.remove(&id);
        }

        trace!(%session_id, kind = message.kind(), delivered, "Broadcast.");
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.connections
            .iter()
            .filter(|h| h.session_id.as_deref() == Some(session_id))
            .count()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(BroadcastScope::default())
    }
}

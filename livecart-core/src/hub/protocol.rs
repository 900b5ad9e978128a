// File: src/hub/protocol.rs
//
// Wire envelopes for the dashboard socket. Outbound messages are
// `{"type": ..., "data": ...}`; inbound messages carry their fields next
// to `type`, as relay clients already send them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use livecart_common::models::{Comment, Order, RawComment};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubscribeSession {
        session_id: String,
    },
    /// A relay pushing a comment it collected itself.
    NewComment {
        session_id: String,
        comment: RawComment,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { connection_id: Uuid },
    NewComment(Comment),
    OrderCreated(Order),
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::NewComment(_) => "new_comment",
            ServerMessage::OrderCreated(_) => "order_created",
            ServerMessage::Error { .. } => "error",
        }
    }
}

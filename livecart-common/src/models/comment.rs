// File: livecart-common/src/models/comment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::platform::Platform;

/// A comment as delivered by an adapter or pushed in by a relay client,
/// before keyword detection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawComment {
    pub platform: Platform,
    pub username: String,
    pub user_id: String,
    pub comment_text: String,
    /// Identifier assigned by the source platform, when known.
    #[serde(default)]
    pub comment_id: Option<String>,
    /// Publish time reported by the source platform, when known.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Canonical, platform-agnostic record of one processed comment.
/// Immutable once built; persisted append-only.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub live_session_id: String,
    pub platform: Platform,
    pub username: String,
    pub user_id: String,
    pub comment_text: String,
    pub matched_keyword: Option<String>,
    pub product_code: Option<String>,
    pub source_comment_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Comment {
    /// Builds the canonical record for `raw`. The platform publish time is
    /// preferred over ingestion time when the adapter supplied one.
    pub fn from_raw(
        live_session_id: &str,
        raw: &RawComment,
        matched_keyword: Option<String>,
        product_code: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            live_session_id: live_session_id.to_string(),
            platform: raw.platform,
            username: raw.username.clone(),
            user_id: raw.user_id.clone(),
            comment_text: raw.comment_text.clone(),
            matched_keyword,
            product_code,
            source_comment_id: raw.comment_id.clone(),
            timestamp: raw.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

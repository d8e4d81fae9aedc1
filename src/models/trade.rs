// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Trade journal record stored in the `trades` table.

use super::media::MediaCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-supplied trade columns (symbol, side, prices, notes, ...).
pub type TradeFields = serde_json::Map<String, serde_json::Value>;

/// Server-assigned trade ID.
///
/// The table may use an identity column or a UUID, so both JSON numbers
/// and strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TradeId(String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TradeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for TradeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for TradeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => TradeId(s),
            Raw::Number(n) => TradeId(n.to_string()),
        })
    }
}

/// A trade row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    /// Owning user
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Public URLs of attached images
    #[serde(
        default,
        deserialize_with = "url_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_urls: Option<Vec<String>>,
    /// Public URLs of attached voice notes
    #[serde(
        default,
        deserialize_with = "url_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub voice_urls: Option<Vec<String>>,
    /// Public URLs of attached videos
    #[serde(
        default,
        deserialize_with = "url_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_urls: Option<Vec<String>>,
    /// Remaining caller-defined columns
    #[serde(flatten)]
    pub fields: TradeFields,
}

impl Trade {
    /// URLs attached for a category (empty when the column is unset).
    pub fn media_urls(&self, category: MediaCategory) -> &[String] {
        let urls = match category {
            MediaCategory::Image => &self.image_urls,
            MediaCategory::Voice => &self.voice_urls,
            MediaCategory::Video => &self.video_urls,
        };
        urls.as_deref().unwrap_or_default()
    }

    /// Append a URL to a category's list, creating the list if needed.
    pub fn push_media_url(&mut self, category: MediaCategory, url: impl Into<String>) {
        let urls = match category {
            MediaCategory::Image => &mut self.image_urls,
            MediaCategory::Voice => &mut self.voice_urls,
            MediaCategory::Video => &mut self.video_urls,
        };
        urls.get_or_insert_with(Vec::new).push(url.into());
    }

    /// Copy of this row with `patch` applied column by column.
    pub fn merged(&self, patch: &TradeFields) -> Result<Trade, serde_json::Error> {
        let mut row = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => TradeFields::new(),
        };
        for (column, value) in patch {
            row.insert(column.clone(), value.clone());
        }
        serde_json::from_value(serde_json::Value::Object(row))
    }

    /// Caller-defined column by name.
    pub fn field(&self, column: &str) -> Option<&serde_json::Value> {
        self.fields.get(column)
    }
}

/// Media URL columns hold a text array; anything else reads as unset.
fn url_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

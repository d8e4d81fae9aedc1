// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `trades` table through PostgREST.
//!
//! Filters use PostgREST operators (`id=eq.42`). Writes ask for
//! `return=representation` so the affected rows come back in the response.

use super::{transport, SupabaseClient};
use crate::backend::{tables, TradeTable, APPEND_MEDIA_RPC};
use crate::error::{AppError, Result};
use crate::models::{MediaCategory, Trade, TradeFields, TradeId};
use async_trait::async_trait;
use reqwest::Method;
use uuid::Uuid;

const RETURN_REPRESENTATION: &str = "return=representation";
/// Ask PostgREST for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

fn owned_row_filter(id: &TradeId, owner: Uuid) -> [(&'static str, String); 2] {
    [("id", eq(id)), ("user_id", eq(owner))]
}

impl SupabaseClient {
    fn table_url(&self) -> String {
        self.endpoint(&format!("/rest/v1/{}", tables::TRADES))
    }
}

#[async_trait]
impl TradeTable for SupabaseClient {
    async fn insert_trade(&self, row: TradeFields) -> Result<Trade> {
        let token = self.bearer_token().await?;
        let response = self
            .request(Method::POST, &self.table_url(), &token)
            .header("Prefer", RETURN_REPRESENTATION)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .json(&[row])
            .send()
            .await
            .map_err(transport)?;

        Self::check_response_json(response, AppError::Database).await
    }

    async fn select_trades(&self, owner: Uuid) -> Result<Vec<Trade>> {
        let token = self.bearer_token().await?;
        let response = self
            .request(Method::GET, &self.table_url(), &token)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(owner)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;

        Self::check_response_json(response, AppError::Database).await
    }

    async fn update_trade(
        &self,
        id: &TradeId,
        owner: Uuid,
        patch: TradeFields,
    ) -> Result<Option<Trade>> {
        let token = self.bearer_token().await?;
        let response = self
            .request(Method::PATCH, &self.table_url(), &token)
            .query(&owned_row_filter(id, owner))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Trade> = Self::check_response_json(response, AppError::Database).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_trade(&self, id: &TradeId, owner: Uuid) -> Result<u64> {
        let token = self.bearer_token().await?;
        let response = self
            .request(Method::DELETE, &self.table_url(), &token)
            .query(&owned_row_filter(id, owner))
            .header("Prefer", RETURN_REPRESENTATION)
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<serde_json::Value> =
            Self::check_response_json(response, AppError::Database).await?;
        Ok(rows.len() as u64)
    }

    /// Calls the `append_trade_media` SQL function (see `sql/`), which does
    /// the append in one `UPDATE` statement.
    async fn append_media_url(
        &self,
        id: &TradeId,
        owner: Uuid,
        category: MediaCategory,
        url: &str,
    ) -> Result<Option<Trade>> {
        let token = self.bearer_token().await?;
        let rpc_url = self.endpoint(&format!("/rest/v1/rpc/{}", APPEND_MEDIA_RPC));
        let response = self
            .request(Method::POST, &rpc_url, &token)
            .json(&serde_json::json!({
                "p_trade_id": id.as_str(),
                "p_user_id": owner,
                "p_category": category.as_str(),
                "p_url": url,
            }))
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Trade> = Self::check_response_json(response, AppError::Database).await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_row_filter() {
        let owner = Uuid::parse_str("6f1c2f8e-3f57-4c1c-9f0e-0a4b7b1c2d3e").unwrap();
        let filter = owned_row_filter(&TradeId::from(42u64), owner);
        assert_eq!(filter[0], ("id", "eq.42".to_string()));
        assert_eq!(
            filter[1],
            ("user_id", "eq.6f1c2f8e-3f57-4c1c-9f0e-0a4b7b1c2d3e".to_string())
        );
    }
}

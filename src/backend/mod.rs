// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend provider seam.
//!
//! The provider exposes three APIs, each modelled as a trait:
//! - [`AuthApi`]: sign-up, sign-in, sign-out, current user
//! - [`TradeTable`]: owner-filtered CRUD on the `trades` table
//! - [`MediaStorage`]: object upload, public URLs, removal
//!
//! [`crate::services::SupabaseClient`] speaks the provider's HTTP API;
//! [`memory::MemoryBackend`] simulates it in-process.

pub mod memory;

pub use memory::MemoryBackend;

use crate::error::Result;
use crate::models::{
    AuthResponse, Credentials, MediaCategory, MediaFile, Trade, TradeFields, TradeId, User,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Table names as constants.
pub mod tables {
    pub const TRADES: &str = "trades";
}

/// Remote function appending one URL to a trade's media column.
pub const APPEND_MEDIA_RPC: &str = "append_trade_media";

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse>;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthResponse>;

    /// End the current session. Succeeds when there is none.
    async fn sign_out(&self) -> Result<()>;

    /// Identity behind the current session, `None` when signed out.
    async fn get_user(&self) -> Result<Option<User>>;
}

/// Owner-scoped access to the `trades` table.
///
/// Every filter includes the owner ID; rows owned by someone else never
/// match, so reads come back empty and writes affect zero rows.
#[async_trait]
pub trait TradeTable: Send + Sync {
    /// Insert one row and return it as stored.
    async fn insert_trade(&self, row: TradeFields) -> Result<Trade>;

    /// All rows owned by `owner`, newest first.
    async fn select_trades(&self, owner: Uuid) -> Result<Vec<Trade>>;

    /// Returns the updated row, or `None` when nothing matched.
    async fn update_trade(
        &self,
        id: &TradeId,
        owner: Uuid,
        patch: TradeFields,
    ) -> Result<Option<Trade>>;

    /// Returns the number of rows removed.
    async fn delete_trade(&self, id: &TradeId, owner: Uuid) -> Result<u64>;

    /// Atomically append `url` to the category's URL column.
    ///
    /// Returns the updated row, or `None` when nothing matched.
    async fn append_media_url(
        &self,
        id: &TradeId,
        owner: Uuid,
        category: MediaCategory,
        url: &str,
    ) -> Result<Option<Trade>>;
}

/// Options for a single upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub cache_control_secs: u32,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &MediaFile,
        options: &UploadOptions,
    ) -> Result<()>;

    /// Public URL for an object. Computed locally; no request is made.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Remove objects; returns the paths that were actually deleted.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>>;
}

/// Everything the facade needs from a provider.
pub trait Backend: AuthApi + TradeTable + MediaStorage {}

impl<T: AuthApi + TradeTable + MediaStorage> Backend for T {}

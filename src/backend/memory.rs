// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process provider simulation (offline mode).
//!
//! Mirrors the behavior the facade relies on from the hosted provider:
//! password accounts with a single current session, an owner-filtered
//! `trades` table with server-assigned `id`/`created_at`, and a bucket store
//! whose row-level rule is "first path segment is the caller's user ID".
//! Every trait call counts as one remote call; see [`MemoryBackend::calls`].
//!
//! Table calls filter on the owner passed in and do not consult the current
//! session; storage calls check the session's user. With several journals
//! signed in over one backend, the last sign-in owns the session, so only
//! storage follows "last sign-in wins".
//!
//! Each call yields to the scheduler once before touching any state, so
//! concurrent operations interleave at call boundaries like network calls do.

use super::{AuthApi, MediaStorage, TradeTable, UploadOptions};
use crate::error::{AppError, ProviderError, Result};
use crate::models::{
    AuthResponse, Credentials, MediaCategory, MediaFile, Session, Trade, TradeFields, TradeId,
    User,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

const SESSION_LIFETIME_SECS: i64 = 3600;
const RLS_VIOLATION: &str = "new row violates row-level security policy";

#[derive(Clone)]
struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct TradeRows {
    next_id: u64,
    last_created_at: Option<DateTime<Utc>>,
    rows: Vec<Trade>,
}

/// Stored object in the simulated bucket store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub cache_control: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy)]
enum Api {
    Auth,
    Table,
    Storage,
}

/// In-memory backend.
pub struct MemoryBackend {
    base_url: String,
    auto_confirm: bool,
    accounts: DashMap<String, Account>,
    session: RwLock<Option<Session>>,
    trades: Mutex<TradeRows>,
    objects: DashMap<(String, String), StoredObject>,
    calls: AtomicUsize,
    injected_failure: Mutex<Option<ProviderError>>,
    offline: AtomicBool,
    /// Set by [`MemoryBackend::expire_session`].
    refresh_revoked: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend with e-mail auto-confirmation (sign-up returns a session).
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            auto_confirm: true,
            accounts: DashMap::new(),
            session: RwLock::new(None),
            trades: Mutex::new(TradeRows::default()),
            objects: DashMap::new(),
            calls: AtomicUsize::new(0),
            injected_failure: Mutex::new(None),
            offline: AtomicBool::new(false),
            refresh_revoked: AtomicBool::new(false),
        }
    }

    /// Require e-mail confirmation: sign-up returns a user but no session.
    pub fn with_email_confirmation(mut self) -> Self {
        self.auto_confirm = false;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Number of remote calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call fail with `error`.
    pub fn fail_next_call(&self, error: ProviderError) {
        *lock(&self.injected_failure) = Some(error);
    }

    /// Simulate an unreachable provider: every call fails at the transport.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulate a revoked refresh token: the next call that needs the
    /// session fails with [`AppError::SessionExpired`] and drops it.
    pub fn expire_session(&self) {
        self.refresh_revoked.store(true, Ordering::SeqCst);
    }

    /// Create a confirmed account without going through the API.
    pub fn register_user(&self, email: &str, password: &str) -> User {
        let user = User::new(Uuid::new_v4(), email);
        self.accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Snapshot of every row in the table, regardless of owner.
    pub fn all_trades(&self) -> Vec<Trade> {
        lock(&self.trades).rows.clone()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    async fn begin_call(&self, api: Api) -> Result<()> {
        tokio::task::yield_now().await;
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Transport(
                "error sending request: connection refused".to_string(),
            ));
        }

        match lock(&self.injected_failure).take() {
            Some(err) => Err(match api {
                Api::Auth => AppError::Auth(err),
                Api::Table => AppError::Database(err),
                Api::Storage => AppError::Storage(err),
            }),
            None => Ok(()),
        }
    }

    /// Fail once the refresh token has been revoked, signing out.
    fn check_session(&self) -> Result<()> {
        if !self.refresh_revoked.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if write(&self.session).take().is_none() {
            return Ok(());
        }
        Err(AppError::SessionExpired(
            ProviderError::message("Invalid Refresh Token: Already Used")
                .with_code("refresh_token_already_used"),
        ))
    }

    fn current_user(&self) -> Option<User> {
        read(&self.session).as_ref().map(|s| s.user.clone())
    }

    fn start_session(&self, user: &User) -> Session {
        let now = Utc::now();
        let mut user = user.clone();
        user.last_sign_in_at = Some(now);
        let session = Session {
            access_token: format!("memory-access-{}", Uuid::new_v4()),
            refresh_token: format!("memory-refresh-{}", Uuid::new_v4()),
            token_type: "bearer".to_string(),
            expires_in: SESSION_LIFETIME_SECS,
            expires_at: Some((now + Duration::seconds(SESSION_LIFETIME_SECS)).timestamp()),
            user,
        };
        *write(&self.session) = Some(session.clone());
        session
    }

    /// Storage rule: the first path segment must be the caller's user ID.
    fn check_object_owner(&self, path: &str) -> Result<Uuid> {
        let user = self.current_user().ok_or_else(|| {
            AppError::Storage(ProviderError::message("Invalid JWT").with_code("403"))
        })?;
        let owner = path.split('/').next().unwrap_or_default();
        if owner != user.id.to_string() {
            return Err(AppError::Storage(
                ProviderError::message(RLS_VIOLATION).with_code("403"),
            ));
        }
        Ok(user.id)
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.begin_call(Api::Auth).await?;

        let key = credentials.email.to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(AppError::Auth(
                ProviderError::message("User already registered").with_code("user_already_exists"),
            ));
        }

        let user = self.register_user(&credentials.email, &credentials.password);
        tracing::debug!(user_id = %user.id, "Memory backend: account created");

        if self.auto_confirm {
            Ok(self.start_session(&user).into())
        } else {
            Ok(AuthResponse {
                user: Some(user),
                session: None,
            })
        }
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.begin_call(Api::Auth).await?;

        let account = self
            .accounts
            .get(&credentials.email.to_lowercase())
            .map(|entry| entry.value().clone())
            .filter(|account| account.password == credentials.password)
            .ok_or_else(|| {
                AppError::Auth(
                    ProviderError::message("Invalid login credentials")
                        .with_code("invalid_credentials"),
                )
            })?;

        Ok(self.start_session(&account.user).into())
    }

    async fn sign_out(&self) -> Result<()> {
        self.begin_call(Api::Auth).await?;
        *write(&self.session) = None;
        Ok(())
    }

    async fn get_user(&self) -> Result<Option<User>> {
        self.begin_call(Api::Auth).await?;
        self.check_session()?;
        Ok(self.current_user())
    }
}

#[async_trait]
impl TradeTable for MemoryBackend {
    async fn insert_trade(&self, mut row: TradeFields) -> Result<Trade> {
        self.begin_call(Api::Table).await?;
        self.check_session()?;

        let has_owner = row
            .get("user_id")
            .and_then(|v| v.as_str())
            .is_some_and(|s| Uuid::parse_str(s).is_ok());
        if !has_owner {
            return Err(AppError::Database(ProviderError {
                message: Some(
                    "null value in column \"user_id\" of relation \"trades\" violates not-null constraint"
                        .to_string(),
                ),
                code: Some("23502".to_string()),
                ..Default::default()
            }));
        }

        let mut table = lock(&self.trades);

        // Identity column and strictly increasing timestamps.
        table.next_id += 1;
        let now = Utc::now();
        let created_at = match table.last_created_at {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        table.last_created_at = Some(created_at);

        row.insert("id".to_string(), table.next_id.into());
        row.insert(
            "created_at".to_string(),
            serde_json::to_value(created_at).map_err(anyhow::Error::from)?,
        );

        let trade: Trade = serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
            AppError::Database(ProviderError::message(e.to_string()).with_code("22P02"))
        })?;
        table.rows.push(trade.clone());
        Ok(trade)
    }

    async fn select_trades(&self, owner: Uuid) -> Result<Vec<Trade>> {
        self.begin_call(Api::Table).await?;
        self.check_session()?;

        let mut rows: Vec<Trade> = lock(&self.trades)
            .rows
            .iter()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_trade(
        &self,
        id: &TradeId,
        owner: Uuid,
        patch: TradeFields,
    ) -> Result<Option<Trade>> {
        self.begin_call(Api::Table).await?;
        self.check_session()?;

        let mut table = lock(&self.trades);
        let Some(row) = table
            .rows
            .iter_mut()
            .find(|t| &t.id == id && t.user_id == owner)
        else {
            return Ok(None);
        };

        let updated = row.merged(&patch).map_err(|e| {
            AppError::Database(ProviderError::message(e.to_string()).with_code("22P02"))
        })?;
        if updated.user_id != owner || updated.id != *id {
            return Err(AppError::Database(
                ProviderError::message(format!("{} for table \"trades\"", RLS_VIOLATION))
                    .with_code("42501"),
            ));
        }

        *row = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_trade(&self, id: &TradeId, owner: Uuid) -> Result<u64> {
        self.begin_call(Api::Table).await?;
        self.check_session()?;

        let mut table = lock(&self.trades);
        let before = table.rows.len();
        table.rows.retain(|t| !(&t.id == id && t.user_id == owner));
        Ok((before - table.rows.len()) as u64)
    }

    async fn append_media_url(
        &self,
        id: &TradeId,
        owner: Uuid,
        category: MediaCategory,
        url: &str,
    ) -> Result<Option<Trade>> {
        self.begin_call(Api::Table).await?;
        self.check_session()?;

        let mut table = lock(&self.trades);
        Ok(table
            .rows
            .iter_mut()
            .find(|t| &t.id == id && t.user_id == owner)
            .map(|row| {
                row.push_media_url(category, url);
                row.clone()
            }))
    }
}

#[async_trait]
impl MediaStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &MediaFile,
        options: &UploadOptions,
    ) -> Result<()> {
        self.begin_call(Api::Storage).await?;
        self.check_session()?;
        self.check_object_owner(path)?;

        let key = (bucket.to_string(), path.to_string());
        if !options.upsert && self.objects.contains_key(&key) {
            return Err(AppError::Storage(
                ProviderError::message("The resource already exists").with_code("409"),
            ));
        }

        self.objects.insert(
            key,
            StoredObject {
                content_type: file.content_type.clone(),
                cache_control: format!("max-age={}", options.cache_control_secs),
                bytes: file.bytes.clone(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>> {
        self.begin_call(Api::Storage).await?;
        self.check_session()?;

        let user = self.current_user().ok_or_else(|| {
            AppError::Storage(ProviderError::message("Invalid JWT").with_code("403"))
        })?;
        let prefix = format!("{}/", user.id);

        // Objects the caller cannot see are skipped, not reported.
        Ok(paths
            .iter()
            .filter(|path| path.starts_with(&prefix))
            .filter(|path| {
                self.objects
                    .remove(&(bucket.to_string(), path.to_string()))
                    .is_some()
            })
            .cloned()
            .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

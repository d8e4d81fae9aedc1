// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trade journal facade.
//!
//! The single entry point for callers: authentication, owner-scoped trade
//! CRUD, and media attachments. Every public operation returns an
//! [`Envelope`]; errors are logged here and never escape.

use crate::backend::{Backend, UploadOptions};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    AuthResponse, Credentials, Envelope, MediaCategory, MediaFile, Trade, TradeFields, TradeId,
    UploadedMedia, User,
};
use crate::services::SupabaseClient;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

/// Buffered auth-state changes per subscriber before it starts lagging.
const AUTH_EVENT_CAPACITY: usize = 16;

/// Published whenever the signed-in user changes.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStateChange {
    SignedIn(User),
    SignedOut,
}

/// Storage path for an uploaded media file:
/// `{user_id}/{trade_id}/{category}_{timestamp_millis}.{extension}`.
pub fn media_path(
    user_id: Uuid,
    trade_id: &TradeId,
    category: MediaCategory,
    extension: &str,
    timestamp_millis: i64,
) -> String {
    format!(
        "{}/{}/{}_{}.{}",
        user_id, trade_id, category, timestamp_millis, extension
    )
}

/// Trade journal service.
pub struct TradeJournal {
    backend: Arc<dyn Backend>,
    config: Arc<Config>,
    /// Cached identity of the signed-in user.
    user: RwLock<Option<User>>,
    auth_events: broadcast::Sender<AuthStateChange>,
    /// Last timestamp handed out for a media file name.
    last_upload_millis: AtomicI64,
}

impl TradeJournal {
    /// Create a journal talking to the configured Supabase project.
    pub fn new(config: Config) -> Self {
        let backend = Arc::new(SupabaseClient::new(&config.supabase));
        Self::with_backend(config, backend)
    }

    /// Create a journal from environment configuration.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Config::from_env()?))
    }

    /// Create a journal over any backend implementation.
    pub fn with_backend(config: impl Into<Arc<Config>>, backend: Arc<dyn Backend>) -> Self {
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        let config = config.into();

        tracing::info!(
            url = %config.supabase.url,
            bucket = %config.storage.bucket_name,
            "Trade journal initialized"
        );

        Self {
            backend,
            config,
            user: RwLock::new(None),
            auth_events,
            last_upload_millis: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to sign-in/sign-out notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.auth_events.subscribe()
    }

    // ─── Authentication ──────────────────────────────────────────

    pub async fn sign_up(&self, email: &str, password: &str) -> Envelope<AuthResponse> {
        self.report("Sign up", self.try_sign_up(email, password).await)
    }

    async fn try_sign_up(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let credentials = Credentials::new(email, password);
        credentials
            .validate()
            .map_err(|e| AppError::Validation(validation_message(&e)))?;

        let response = self.backend.sign_up(&credentials).await?;

        // Projects without e-mail confirmation sign the user in immediately.
        match (&response.session, &response.user) {
            (Some(_), Some(user)) => self.signed_in(user.clone()),
            _ => tracing::info!(
                email = %credentials.email,
                "Sign-up pending e-mail confirmation"
            ),
        }

        Ok(response)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Envelope<AuthResponse> {
        self.report("Sign in", self.try_sign_in(email, password).await)
    }

    async fn try_sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let credentials = Credentials::new(email, password);
        if credentials.email.is_empty() || credentials.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let response = self.backend.sign_in_with_password(&credentials).await?;
        if let Some(user) = &response.user {
            self.signed_in(user.clone());
        }
        Ok(response)
    }

    pub async fn sign_out(&self) -> Envelope<()> {
        match self.backend.sign_out().await {
            Ok(()) => {
                self.set_user(None);
                Envelope::done()
            }
            Err(e) => self.report("Sign out", Err(e)),
        }
    }

    /// Fetch the current identity from the provider and cache it.
    ///
    /// Any failure clears the cache and yields `None`. Subscribers see
    /// `SignedIn`/`SignedOut` when this changes who is signed in.
    pub async fn get_current_user(&self) -> Option<User> {
        let user = match self.backend.get_user().await {
            Ok(user) => user,
            Err(e) => {
                log_failure("Get current user", &e);
                None
            }
        };
        self.set_user(user.clone());
        user
    }

    fn signed_in(&self, user: User) {
        tracing::info!(user_id = %user.id, email = ?user.email, "User signed in");
        self.set_user(Some(user));
    }

    /// Replace the cached user, publishing an event when the identity changes.
    fn set_user(&self, user: Option<User>) {
        let previous = std::mem::replace(
            &mut *self.user.write().unwrap_or_else(|e| e.into_inner()),
            user.clone(),
        );

        let event = match (previous, user) {
            (Some(old), Some(new)) if old.id == new.id => None,
            (_, Some(new)) => Some(AuthStateChange::SignedIn(new)),
            (Some(old), None) => {
                tracing::info!(user_id = %old.id, "User signed out");
                Some(AuthStateChange::SignedOut)
            }
            (None, None) => None,
        };
        if let Some(event) = event {
            self.auth_events.send(event).ok();
        }
    }

    /// Cached user, without contacting the provider.
    pub fn get_user(&self) -> Option<User> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Log a failed operation and wrap the result in an envelope.
    ///
    /// An expired session also signs the journal out.
    fn report<T>(&self, operation: &'static str, result: Result<T>) -> Envelope<T> {
        if let Err(e) = &result {
            log_failure(operation, e);
            if matches!(e, AppError::SessionExpired(_)) {
                self.set_user(None);
            }
        }
        result.into()
    }

    fn require_user(&self) -> Result<User> {
        self.get_user().ok_or(AppError::NotAuthenticated)
    }

    // ─── Trades ──────────────────────────────────────────────────

    /// Insert a trade owned by the signed-in user.
    pub async fn create_trade(&self, fields: TradeFields) -> Envelope<Trade> {
        self.report("Create trade", self.try_create_trade(fields).await)
    }

    async fn try_create_trade(&self, mut fields: TradeFields) -> Result<Trade> {
        let user = self.require_user()?;
        fields.insert("user_id".to_string(), user.id.to_string().into());

        let trade = self.backend.insert_trade(fields).await?;
        tracing::info!(user_id = %user.id, trade_id = %trade.id, "Trade created");
        Ok(trade)
    }

    /// The signed-in user's trades, newest first.
    pub async fn get_trades(&self) -> Envelope<Vec<Trade>> {
        self.report("Get trades", self.try_get_trades().await)
    }

    async fn try_get_trades(&self) -> Result<Vec<Trade>> {
        let user = self.require_user()?;
        let trades = self.backend.select_trades(user.id).await?;
        tracing::debug!(user_id = %user.id, count = trades.len(), "Trades fetched");
        Ok(trades)
    }

    /// Update one of the signed-in user's trades.
    ///
    /// A trade that does not exist or belongs to someone else matches no
    /// row: the result is a success carrying `None`.
    pub async fn update_trade(
        &self,
        trade_id: &TradeId,
        patch: TradeFields,
    ) -> Envelope<Option<Trade>> {
        self.report("Update trade", self.try_update_trade(trade_id, patch).await)
    }

    async fn try_update_trade(
        &self,
        trade_id: &TradeId,
        patch: TradeFields,
    ) -> Result<Option<Trade>> {
        let user = self.require_user()?;
        if patch.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        let updated = self.backend.update_trade(trade_id, user.id, patch).await?;
        match &updated {
            Some(_) => tracing::info!(user_id = %user.id, %trade_id, "Trade updated"),
            None => tracing::debug!(user_id = %user.id, %trade_id, "Update matched no trade"),
        }
        Ok(updated)
    }

    /// Delete one of the signed-in user's trades (no-op if not owned).
    pub async fn delete_trade(&self, trade_id: &TradeId) -> Envelope<()> {
        match self.try_delete_trade(trade_id).await {
            Ok(()) => Envelope::done(),
            Err(e) => self.report("Delete trade", Err(e)),
        }
    }

    async fn try_delete_trade(&self, trade_id: &TradeId) -> Result<()> {
        let user = self.require_user()?;
        let deleted = self.backend.delete_trade(trade_id, user.id).await?;
        tracing::info!(user_id = %user.id, %trade_id, deleted, "Trade delete finished");
        Ok(())
    }

    // ─── Media ───────────────────────────────────────────────────

    /// Whether `file`'s declared MIME type is allowed for `category`.
    /// Unknown categories allow nothing.
    pub fn is_valid_file_type(&self, file: &MediaFile, category: &str) -> bool {
        category
            .parse::<MediaCategory>()
            .map(|category| self.config.storage.allows(category, &file.content_type))
            .unwrap_or(false)
    }

    /// Upload a media file for a trade and return its public URL.
    ///
    /// Type and size are checked before anything is sent.
    pub async fn upload_file(
        &self,
        file: &MediaFile,
        trade_id: &TradeId,
        category: MediaCategory,
    ) -> Envelope<UploadedMedia> {
        self.report("Upload file", self.try_upload_file(file, trade_id, category).await)
    }

    async fn try_upload_file(
        &self,
        file: &MediaFile,
        trade_id: &TradeId,
        category: MediaCategory,
    ) -> Result<UploadedMedia> {
        let user = self.require_user()?;
        let storage = &self.config.storage;

        if !storage.allows(category, &file.content_type) {
            return Err(AppError::InvalidFileType(category));
        }
        if file.size() > storage.max_file_size {
            return Err(AppError::FileTooLarge {
                size: file.size(),
                limit: storage.max_file_size,
            });
        }

        let path = media_path(
            user.id,
            trade_id,
            category,
            file.extension(),
            self.next_upload_millis(),
        );
        let options = UploadOptions {
            cache_control_secs: storage.cache_control_secs,
            upsert: false,
        };

        self.backend
            .upload(&storage.bucket_name, &path, file, &options)
            .await?;
        let url = self.backend.public_url(&storage.bucket_name, &path);

        tracing::info!(user_id = %user.id, %trade_id, %category, path = %path, "File uploaded");
        Ok(UploadedMedia { path, url })
    }

    /// Upload a file and append its URL to the trade's `<category>_urls`.
    ///
    /// The append is a single atomic backend operation, so concurrent calls
    /// for the same trade all land. If the trade is not the caller's, the
    /// uploaded object is removed again.
    pub async fn add_media_to_trade(
        &self,
        trade_id: &TradeId,
        file: &MediaFile,
        category: MediaCategory,
    ) -> Envelope<UploadedMedia> {
        self.report(
            "Add media to trade",
            self.try_add_media_to_trade(trade_id, file, category).await,
        )
    }

    async fn try_add_media_to_trade(
        &self,
        trade_id: &TradeId,
        file: &MediaFile,
        category: MediaCategory,
    ) -> Result<UploadedMedia> {
        let user = self.require_user()?;
        let media = self.try_upload_file(file, trade_id, category).await?;

        let appended = self
            .backend
            .append_media_url(trade_id, user.id, category, &media.url)
            .await;

        match appended {
            Ok(Some(trade)) => {
                tracing::info!(
                    %trade_id,
                    field = category.url_field(),
                    count = trade.media_urls(category).len(),
                    "Media attached to trade"
                );
                Ok(media)
            }
            Ok(None) => {
                self.discard_upload(&media.path).await;
                Err(AppError::NotFound(format!("Trade {}", trade_id)))
            }
            Err(e) => {
                self.discard_upload(&media.path).await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of an object nothing refers to.
    async fn discard_upload(&self, path: &str) {
        let bucket = &self.config.storage.bucket_name;
        if let Err(e) = self.backend.remove(bucket, &[path.to_string()]).await {
            tracing::warn!(error = %e, path, "Failed to remove orphaned upload");
        }
    }

    /// Remove an object from the media bucket.
    pub async fn delete_file(&self, path: &str) -> Envelope<()> {
        match self.try_delete_file(path).await {
            Ok(()) => Envelope::done(),
            Err(e) => self.report("Delete file", Err(e)),
        }
    }

    async fn try_delete_file(&self, path: &str) -> Result<()> {
        self.require_user()?;
        let removed = self
            .backend
            .remove(&self.config.storage.bucket_name, &[path.to_string()])
            .await?;
        tracing::info!(path, removed = removed.len(), "File delete finished");
        Ok(())
    }

    /// Millisecond timestamp for a file name, unique within this journal.
    fn next_upload_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_upload_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(if now > last { now } else { last + 1 })
            })
            .unwrap_or(now);
        if now > previous {
            now
        } else {
            previous + 1
        }
    }
}

fn log_failure(operation: &'static str, e: &AppError) {
    match e {
        AppError::NotAuthenticated
        | AppError::Validation(_)
        | AppError::InvalidFileType(_)
        | AppError::FileTooLarge { .. } => {
            tracing::warn!(operation, error = %e, "Operation rejected");
        }
        _ => match e.provider_error() {
            Some(p) => tracing::error!(
                operation,
                error = %e,
                details = ?p.details,
                hint = ?p.hint,
                code = ?p.code,
                "Operation failed"
            ),
            None => tracing::error!(operation, error = %e, "Operation failed"),
        },
    }
}

/// First validation message, in field order.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(_, errs)| errs.iter())
        .next()
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string())
        })
        .unwrap_or_else(|| "Invalid credentials".to_string())
}

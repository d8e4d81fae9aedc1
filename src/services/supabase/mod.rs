// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase API client.
//!
//! Handles:
//! - Auth (GoTrue): sign-up, password sign-in, sign-out, current user
//! - Session storage and access token refresh before expiry
//! - The `trades` table through PostgREST
//! - Object storage for trade media
//!
//! Every request carries the project's anon key as `apikey`, and the
//! session's access token (or the anon key when signed out) as bearer token,
//! so the project's row-level security rules apply to the signed-in user.

mod auth;
mod rest;
mod storage;

use crate::config::SupabaseConfig;
use crate::error::{AppError, ProviderError, Result};
use crate::models::Session;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Margin before token expiration when we proactively refresh (60 seconds).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Session with its resolved expiry.
#[derive(Clone)]
struct StoredSession {
    session: Session,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn new(session: Session) -> Self {
        let expires_at = session.expires_at_or(Utc::now());
        Self {
            session,
            expires_at,
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Supabase API client.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<StoredSession>>>,
    /// Serializes token refreshes so concurrent requests refresh once.
    refresh_lock: Arc<Mutex<()>>,
}

impl SupabaseClient {
    /// Create a client for the configured project.
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.as_ref().map(|s| s.session.clone())
    }

    /// Install a session obtained elsewhere (e.g. persisted from a previous run).
    pub async fn set_session(&self, session: Session) {
        *self.session.write().await = Some(StoredSession::new(session));
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start a request with the project key and the given bearer token.
    fn request(&self, method: reqwest::Method, url: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    /// Bearer token for data and storage calls: the session's access token,
    /// refreshed first if it is about to expire, or the anon key.
    async fn bearer_token(&self) -> Result<String> {
        Ok(self
            .access_token()
            .await?
            .unwrap_or_else(|| self.anon_key.clone()))
    }

    /// Valid access token of the current session, `None` when signed out.
    async fn access_token(&self) -> Result<Option<String>> {
        let now = Utc::now();

        // Fast path: no I/O
        match self.session.read().await.as_ref() {
            None => return Ok(None),
            Some(stored) if stored.is_fresh(now) => {
                return Ok(Some(stored.session.access_token.clone()))
            }
            Some(_) => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let refresh_token = match self.session.read().await.as_ref() {
            None => return Ok(None),
            Some(stored) if stored.is_fresh(now) => {
                return Ok(Some(stored.session.access_token.clone()))
            }
            Some(stored) => stored.session.refresh_token.clone(),
        };

        tracing::info!("Access token expiring, refreshing session");
        let session = match self.refresh_session(&refresh_token).await {
            Ok(session) => session,
            Err(e @ AppError::SessionExpired(_)) => {
                tracing::warn!(error = %e, "Refresh token rejected, clearing session");
                self.clear_session().await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let access_token = session.access_token.clone();
        self.set_session(session).await;

        tracing::info!("Session refreshed");
        Ok(Some(access_token))
    }

    /// Check response status and return the provider's error if not successful.
    async fn check_response(
        response: reqwest::Response,
        kind: fn(ProviderError) -> AppError,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Supabase rate limit hit (429)");
        }

        let err = ProviderError::from_response_body(status.as_u16(), &body);
        tracing::debug!(status = %status, code = ?err.code, "Supabase request failed");
        Err(kind(err))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        response: reqwest::Response,
        kind: fn(ProviderError) -> AppError,
    ) -> Result<T> {
        Self::check_response(response, kind)
            .await?
            .json()
            .await
            .map_err(|e| kind(ProviderError::message(format!("JSON parse error: {}", e))))
    }
}

fn transport(e: reqwest::Error) -> AppError {
    AppError::Transport(e.to_string())
}

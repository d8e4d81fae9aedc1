// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth (GoTrue) endpoints.

use super::{transport, SupabaseClient};
use crate::backend::AuthApi;
use crate::error::{AppError, Result};
use crate::models::{AuthResponse, Credentials, Session, User};
use async_trait::async_trait;
use reqwest::Method;

impl SupabaseClient {
    /// Exchange a refresh token for a new session.
    ///
    /// A 4xx answer means the refresh token is dead and is reported as
    /// [`AppError::SessionExpired`].
    pub(super) async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let url = self.endpoint("/auth/v1/token");
        let response = self
            .request(Method::POST, &url, &self.anon_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        match Self::check_response_json(response, AppError::Auth).await {
            Err(AppError::Auth(e)) if status.is_client_error() => Err(AppError::SessionExpired(e)),
            other => other,
        }
    }
}

#[async_trait]
impl AuthApi for SupabaseClient {
    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let url = self.endpoint("/auth/v1/signup");
        let response = self
            .request(Method::POST, &url, &self.anon_key)
            .json(credentials)
            .send()
            .await
            .map_err(transport)?;

        // With e-mail confirmation enabled the body is the bare user;
        // otherwise it is a full session.
        let body: serde_json::Value = Self::check_response_json(response, AppError::Auth).await?;
        let parse_error = |e: serde_json::Error| {
            AppError::Internal(anyhow::anyhow!("Unexpected sign-up response: {}", e))
        };

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body).map_err(parse_error)?;
            self.set_session(session.clone()).await;
            Ok(session.into())
        } else {
            let user: User = serde_json::from_value(body).map_err(parse_error)?;
            Ok(AuthResponse {
                user: Some(user),
                session: None,
            })
        }
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let url = self.endpoint("/auth/v1/token");
        let response = self
            .request(Method::POST, &url, &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(credentials)
            .send()
            .await
            .map_err(transport)?;

        let session: Session = Self::check_response_json(response, AppError::Auth).await?;
        self.set_session(session.clone()).await;
        Ok(session.into())
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session().await else {
            return Ok(());
        };

        let url = self.endpoint("/auth/v1/logout");
        let response = self
            .request(Method::POST, &url, &session.access_token)
            .send()
            .await
            .map_err(transport)?;

        // Session already gone on the server: still signed out locally.
        let status = response.status().as_u16();
        if !matches!(status, 401 | 403 | 404) {
            Self::check_response(response, AppError::Auth).await?;
        }

        self.clear_session().await;
        Ok(())
    }

    async fn get_user(&self) -> Result<Option<User>> {
        let Some(access_token) = self.access_token().await? else {
            return Ok(None);
        };

        let url = self.endpoint("/auth/v1/user");
        let response = self
            .request(Method::GET, &url, &access_token)
            .send()
            .await
            .map_err(transport)?;

        Self::check_response_json::<User>(response, AppError::Auth)
            .await
            .map(Some)
    }
}

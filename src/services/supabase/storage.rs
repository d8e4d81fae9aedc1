// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Object storage endpoints.

use super::{transport, SupabaseClient};
use crate::backend::{MediaStorage, UploadOptions};
use crate::error::{AppError, Result};
use crate::models::MediaFile;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

/// Percent-encode each segment of an object path, keeping the separators.
fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct RemovedObject {
    name: String,
}

impl SupabaseClient {
    fn object_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!(
            "/storage/v1/object/{}/{}",
            urlencoding::encode(bucket),
            encode_object_path(path)
        ))
    }
}

#[async_trait]
impl MediaStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &MediaFile,
        options: &UploadOptions,
    ) -> Result<()> {
        let token = self.bearer_token().await?;
        let response = self
            .request(Method::POST, &self.object_url(bucket, path), &token)
            .header(reqwest::header::CONTENT_TYPE, &file.content_type)
            .header(
                reqwest::header::CACHE_CONTROL,
                format!("max-age={}", options.cache_control_secs),
            )
            .header("x-upsert", options.upsert.to_string())
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(transport)?;

        Self::check_response(response, AppError::Storage).await?;
        tracing::debug!(bucket, path, size = file.bytes.len(), "Object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!(
            "/storage/v1/object/public/{}/{}",
            urlencoding::encode(bucket),
            encode_object_path(path)
        ))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<Vec<String>> {
        let token = self.bearer_token().await?;
        let url = self.endpoint(&format!("/storage/v1/object/{}", urlencoding::encode(bucket)));
        let response = self
            .request(Method::DELETE, &url, &token)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(transport)?;

        let removed: Vec<RemovedObject> =
            Self::check_response_json(response, AppError::Storage).await?;
        Ok(removed.into_iter().map(|o| o.name).collect())
    }
}

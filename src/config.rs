// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Built once at startup and shared read-only behind an `Arc`.

use crate::models::MediaCategory;
use std::env;
use std::fmt;

/// Default storage bucket for trade media.
pub const DEFAULT_BUCKET: &str = "trade_media";
/// Default upload limit (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
/// Default `Cache-Control` max-age for uploaded objects.
pub const DEFAULT_CACHE_CONTROL_SECS: u32 = 3600;

const DEFAULT_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const DEFAULT_AUDIO_TYPES: &[&str] = &["audio/wav", "audio/mp3", "audio/m4a", "audio/ogg"];
const DEFAULT_VIDEO_TYPES: &[&str] = &["video/mp4", "video/webm", "video/ogg", "video/avi"];

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub supabase: SupabaseConfig,
    pub storage: StorageConfig,
}

/// Connection settings for the Supabase project.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, without trailing slash
    pub url: String,
    /// Public (anon) API key, safe to ship to clients
    pub anon_key: String,
    /// Privileged key. Server-side only; this crate never sends it.
    pub service_role_key: Option<String>,
}

impl Default for SupabaseConfig {
    /// Local development stack (`supabase start`).
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: "test_anon_key".to_string(),
            service_role_key: None,
        }
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Object storage settings and upload validation rules.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket_name: String,
    /// Maximum upload size in bytes
    pub max_file_size: u64,
    pub allowed_image_types: Vec<String>,
    pub allowed_audio_types: Vec<String>,
    pub allowed_video_types: Vec<String>,
    pub cache_control_secs: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket_name: DEFAULT_BUCKET.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_image_types: to_strings(DEFAULT_IMAGE_TYPES),
            allowed_audio_types: to_strings(DEFAULT_AUDIO_TYPES),
            allowed_video_types: to_strings(DEFAULT_VIDEO_TYPES),
            cache_control_secs: DEFAULT_CACHE_CONTROL_SECS,
        }
    }
}

impl StorageConfig {
    /// MIME allow-list for a media category.
    pub fn allowed_types(&self, category: MediaCategory) -> &[String] {
        match category {
            MediaCategory::Image => &self.allowed_image_types,
            MediaCategory::Voice => &self.allowed_audio_types,
            MediaCategory::Video => &self.allowed_video_types,
        }
    }

    pub fn allows(&self, category: MediaCategory, content_type: &str) -> bool {
        self.allowed_types(category)
            .iter()
            .any(|allowed| allowed == content_type)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let url = env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        let url = validate_url(url.trim())?;

        let defaults = StorageConfig::default();

        Ok(Self {
            supabase: SupabaseConfig {
                url,
                anon_key: env::var("SUPABASE_ANON_KEY")
                    .map(|v| v.trim().to_string())
                    .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
                service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            },
            storage: StorageConfig {
                bucket_name: env::var("TRADE_MEDIA_BUCKET")
                    .unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
                max_file_size: parse_var("MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_file_size),
                allowed_image_types: list_var("ALLOWED_IMAGE_TYPES")
                    .unwrap_or(defaults.allowed_image_types),
                allowed_audio_types: list_var("ALLOWED_AUDIO_TYPES")
                    .unwrap_or(defaults.allowed_audio_types),
                allowed_video_types: list_var("ALLOWED_VIDEO_TYPES")
                    .unwrap_or(defaults.allowed_video_types),
                cache_control_secs: parse_var("UPLOAD_CACHE_CONTROL_SECS")?
                    .unwrap_or(defaults.cache_control_secs),
            },
        })
    }
}

fn validate_url(url: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ConfigError::Invalid("SUPABASE_URL", e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(
            "SUPABASE_URL",
            format!("unsupported scheme {}", parsed.scheme()),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(None),
    }
}

/// Comma-separated list; unset or blank means "use the default".
fn list_var(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-wide, so everything that touches
    // them lives in this one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("SUPABASE_URL", "https://example.supabase.co/");
        env::set_var("SUPABASE_ANON_KEY", " anon ");
        env::set_var("MAX_UPLOAD_BYTES", "1024");
        env::set_var("ALLOWED_IMAGE_TYPES", "image/png, image/jpeg,");
        env::remove_var("ALLOWED_VIDEO_TYPES");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.supabase.url, "https://example.supabase.co");
        assert_eq!(config.supabase.anon_key, "anon");
        assert_eq!(config.storage.max_file_size, 1024);
        assert_eq!(
            config.storage.allowed_image_types,
            vec!["image/png".to_string(), "image/jpeg".to_string()]
        );
        assert_eq!(config.storage.allowed_video_types.len(), 4);
        assert_eq!(config.storage.bucket_name, DEFAULT_BUCKET);

        env::set_var("MAX_UPLOAD_BYTES", "fifty");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("MAX_UPLOAD_BYTES", _))
        ));
        env::remove_var("MAX_UPLOAD_BYTES");

        env::set_var("SUPABASE_URL", "ftp://example.com");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("SUPABASE_URL", _))
        ));
    }

    #[test]
    fn test_allow_lists_by_category() {
        let storage = StorageConfig::default();
        assert!(storage.allows(MediaCategory::Image, "image/webp"));
        assert!(storage.allows(MediaCategory::Voice, "audio/m4a"));
        assert!(storage.allows(MediaCategory::Video, "video/avi"));
        assert!(!storage.allows(MediaCategory::Image, "video/mp4"));
        assert!(!storage.allows(MediaCategory::Voice, "audio/mpeg"));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = SupabaseConfig {
            service_role_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("test_anon_key"));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Trade Journal: client for a Supabase-hosted trading journal
//!
//! This crate wraps the project's auth, `trades` table and media bucket
//! behind [`TradeJournal`], which returns a uniform [`Envelope`] from every
//! operation.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, ProviderError};
pub use models::Envelope;
pub use services::{AuthStateChange, TradeJournal};

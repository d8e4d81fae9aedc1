// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod envelope;
pub mod media;
pub mod trade;
pub mod user;

pub use envelope::Envelope;
pub use media::{MediaCategory, MediaFile, UploadedMedia};
pub use trade::{Trade, TradeFields, TradeId};
pub use user::{AuthResponse, Credentials, Session, User};

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use serde_json::json;
use std::sync::Arc;
use trade_journal::backend::MemoryBackend;
use trade_journal::models::{MediaFile, TradeFields, User};
use trade_journal::{Config, TradeJournal};

#[allow(dead_code)]
pub const PASSWORD: &str = "correct-horse-battery";

/// Check if a live Supabase project is configured for tests.
#[allow(dead_code)]
pub fn supabase_available() -> bool {
    std::env::var("SUPABASE_TEST_EMAIL").is_ok() && std::env::var("SUPABASE_TEST_PASSWORD").is_ok()
}

/// Skip test with message if no live project is configured.
#[macro_export]
macro_rules! require_supabase {
    () => {
        if !crate::common::supabase_available() {
            eprintln!("⚠️  Skipping: SUPABASE_TEST_EMAIL / SUPABASE_TEST_PASSWORD not set");
            return;
        }
    };
}

/// Journal over a fresh in-memory backend.
#[allow(dead_code)]
pub fn test_journal() -> (TradeJournal, Arc<MemoryBackend>) {
    test_journal_with(Config::default(), Arc::new(MemoryBackend::new()))
}

#[allow(dead_code)]
pub fn test_journal_with(
    config: Config,
    backend: Arc<MemoryBackend>,
) -> (TradeJournal, Arc<MemoryBackend>) {
    (TradeJournal::with_backend(config, backend.clone()), backend)
}

/// Register `email` on the backend and sign a new journal in as that user.
#[allow(dead_code)]
pub async fn signed_in_journal(backend: &Arc<MemoryBackend>, email: &str) -> (TradeJournal, User) {
    let user = backend.register_user(email, PASSWORD);
    let journal = TradeJournal::with_backend(Config::default(), backend.clone());
    let result = journal.sign_in(email, PASSWORD).await;
    assert!(result.success, "sign in failed: {:?}", result.error);
    (journal, user)
}

#[allow(dead_code)]
pub fn trade_fields(symbol: &str) -> TradeFields {
    let mut fields = TradeFields::new();
    fields.insert("symbol".into(), json!(symbol));
    fields.insert("side".into(), json!("long"));
    fields.insert("entry_price".into(), json!(5432.25));
    fields.insert("quantity".into(), json!(2));
    fields
}

#[allow(dead_code)]
pub fn png(size: usize) -> MediaFile {
    MediaFile::new("chart.png", "image/png", vec![0u8; size])
}

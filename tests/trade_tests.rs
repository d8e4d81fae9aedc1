// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owner-scoped trade CRUD through the journal facade.

use serde_json::json;
use std::sync::Arc;
use trade_journal::backend::MemoryBackend;
use trade_journal::models::{MediaCategory, TradeFields, TradeId};
use trade_journal::ProviderError;

mod common;
use common::{png, signed_in_journal, test_journal, trade_fields};

const NOT_AUTHENTICATED: &str = "User not authenticated";

#[tokio::test]
async fn test_operations_require_authentication() {
    let (journal, backend) = test_journal();
    let trade_id = TradeId::from(1u64);

    let errors = vec![
        journal.create_trade(trade_fields("ES")).await.error,
        journal.get_trades().await.error,
        journal
            .update_trade(&trade_id, trade_fields("NQ"))
            .await
            .error,
        journal.delete_trade(&trade_id).await.error,
        journal
            .upload_file(&png(16), &trade_id, MediaCategory::Image)
            .await
            .error,
        journal
            .add_media_to_trade(&trade_id, &png(16), MediaCategory::Image)
            .await
            .error,
        journal.delete_file("someone/1/image_1.png").await.error,
    ];

    for error in errors {
        assert_eq!(error.as_deref(), Some(NOT_AUTHENTICATED));
    }
    assert_eq!(backend.calls(), 0, "no remote call without a user");
}

#[tokio::test]
async fn test_create_trade_is_owned_by_caller() {
    let backend = Arc::new(MemoryBackend::new());
    let (journal, user) = signed_in_journal(&backend, "owner@example.com").await;

    let mut fields = trade_fields("ES");
    // Attempt to file the trade under someone else.
    fields.insert("user_id".into(), json!(uuid::Uuid::new_v4().to_string()));

    let result = journal.create_trade(fields).await;
    assert!(result.success, "{:?}", result.error);

    let trade = result.data.unwrap();
    assert_eq!(trade.user_id, user.id);
    assert_eq!(trade.field("symbol"), Some(&json!("ES")));
    assert_eq!(trade.field("entry_price"), Some(&json!(5432.25)));
    assert!(trade.image_urls.is_none());
}

#[tokio::test]
async fn test_get_trades_newest_first_and_owned_only() {
    let backend = Arc::new(MemoryBackend::new());
    let (other, _) = signed_in_journal(&backend, "other@example.com").await;
    let (journal, user) = signed_in_journal(&backend, "me@example.com").await;

    for symbol in ["ES", "NQ", "CL"] {
        assert!(journal.create_trade(trade_fields(symbol)).await.success);
    }
    assert!(other.create_trade(trade_fields("GC")).await.success);

    let trades = journal.get_trades().await.data.unwrap();
    let symbols: Vec<_> = trades
        .iter()
        .map(|t| t.field("symbol").and_then(|v| v.as_str()).unwrap())
        .collect();

    assert_eq!(symbols, ["CL", "NQ", "ES"]);
    assert!(trades.iter().all(|t| t.user_id == user.id));
    assert!(trades
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
}

#[tokio::test]
async fn test_update_own_trade() {
    let backend = Arc::new(MemoryBackend::new());
    let (journal, _) = signed_in_journal(&backend, "me@example.com").await;
    let trade = journal.create_trade(trade_fields("ES")).await.data.unwrap();

    let mut patch = TradeFields::new();
    patch.insert("exit_price".into(), json!(5440.0));
    patch.insert("notes".into(), json!("Took profit at resistance"));

    let result = journal.update_trade(&trade.id, patch).await;
    assert!(result.success);

    let updated = result.data.flatten().expect("row was updated");
    assert_eq!(updated.id, trade.id);
    assert_eq!(updated.created_at, trade.created_at);
    assert_eq!(updated.field("exit_price"), Some(&json!(5440.0)));
    assert_eq!(updated.field("symbol"), Some(&json!("ES")));
}

#[tokio::test]
async fn test_update_foreign_trade_is_silent_noop() {
    let backend = Arc::new(MemoryBackend::new());
    let (other, _) = signed_in_journal(&backend, "other@example.com").await;
    let (journal, _) = signed_in_journal(&backend, "me@example.com").await;

    let foreign = other.create_trade(trade_fields("GC")).await.data.unwrap();

    let mut patch = TradeFields::new();
    patch.insert("symbol".into(), json!("HACKED"));

    let result = journal.update_trade(&foreign.id, patch).await;
    assert!(result.success);
    assert_eq!(result.data, Some(None), "zero rows affected");

    let stored = backend.all_trades();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].field("symbol"), Some(&json!("GC")));
}

#[tokio::test]
async fn test_update_with_empty_patch_is_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    let (journal, _) = signed_in_journal(&backend, "me@example.com").await;
    let calls = backend.calls();

    let result = journal
        .update_trade(&TradeId::from(1u64), TradeFields::new())
        .await;
    assert_eq!(result.error.as_deref(), Some("No fields to update"));
    assert_eq!(backend.calls(), calls);
}

#[tokio::test]
async fn test_delete_trade() {
    let backend = Arc::new(MemoryBackend::new());
    let (other, _) = signed_in_journal(&backend, "other@example.com").await;
    let (journal, _) = signed_in_journal(&backend, "me@example.com").await;

    let mine = journal.create_trade(trade_fields("ES")).await.data.unwrap();
    let foreign = other.create_trade(trade_fields("GC")).await.data.unwrap();

    // Someone else's trade: success, nothing removed.
    let result = journal.delete_trade(&foreign.id).await;
    assert!(result.success);
    assert_eq!(backend.all_trades().len(), 2);

    let result = journal.delete_trade(&mine.id).await;
    assert!(result.success);
    let remaining = backend.all_trades();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, foreign.id);

    assert!(journal.get_trades().await.data.unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_error_message_fallback() {
    let backend = Arc::new(MemoryBackend::new());
    let (journal, _) = signed_in_journal(&backend, "me@example.com").await;

    backend.fail_next_call(ProviderError {
        message: None,
        details: Some("Results contain 0 rows".to_string()),
        hint: Some("Check the filter".to_string()),
        code: Some("PGRST116".to_string()),
    });
    let result = journal.get_trades().await;
    assert_eq!(result.error.as_deref(), Some("Results contain 0 rows"));

    backend.fail_next_call(ProviderError {
        hint: Some("Check the filter".to_string()),
        ..Default::default()
    });
    let result = journal.get_trades().await;
    assert_eq!(result.error.as_deref(), Some("Check the filter"));

    backend.fail_next_call(ProviderError::default());
    let result = journal.create_trade(trade_fields("ES")).await;
    assert_eq!(result.error.as_deref(), Some("Unknown error occurred"));

    // Failures are independent; the next call goes through.
    assert!(journal.get_trades().await.success);
}

#[tokio::test]
async fn test_trade_ids_accept_numbers_and_strings() {
    let backend = Arc::new(MemoryBackend::new());
    let (journal, _) = signed_in_journal(&backend, "me@example.com").await;
    let trade = journal.create_trade(trade_fields("ES")).await.data.unwrap();

    let as_text = TradeId::new(trade.id.to_string());
    assert!(journal.delete_trade(&as_text).await.success);
    assert!(backend.all_trades().is_empty());
}

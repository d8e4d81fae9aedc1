// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use serde_json::json;
use trade_journal::error::{AppError, ProviderError};
use trade_journal::models::{Envelope, MediaCategory};

#[test]
fn test_best_message_fallback_order() {
    let full = ProviderError {
        message: Some("message".to_string()),
        details: Some("details".to_string()),
        hint: Some("hint".to_string()),
        code: Some("P0001".to_string()),
    };
    assert_eq!(full.best_message(), "message");

    let no_message = ProviderError {
        message: None,
        ..full.clone()
    };
    assert_eq!(no_message.best_message(), "details");

    let hint_only = ProviderError {
        hint: Some("hint".to_string()),
        ..Default::default()
    };
    assert_eq!(hint_only.best_message(), "hint");

    let blank = ProviderError {
        message: Some("   ".to_string()),
        ..Default::default()
    };
    assert_eq!(blank.best_message(), "Unknown error occurred");
}

#[test]
fn test_validation_error_messages() {
    assert_eq!(AppError::NotAuthenticated.to_string(), "User not authenticated");
    assert_eq!(
        AppError::InvalidFileType(MediaCategory::Image).to_string(),
        "Invalid file type for image"
    );
    assert_eq!(
        AppError::FileTooLarge {
            size: 60 * 1024 * 1024,
            limit: 50 * 1024 * 1024
        }
        .to_string(),
        "File size exceeds limit"
    );
}

#[test]
fn test_provider_error_is_exposed() {
    let err = AppError::Storage(ProviderError::message("Bucket not found").with_code("404"));
    assert_eq!(err.to_string(), "Bucket not found");
    assert_eq!(err.provider_error().and_then(|p| p.code.as_deref()), Some("404"));
    assert!(AppError::NotAuthenticated.provider_error().is_none());
}

#[test]
fn test_envelope_shape() {
    let ok = Envelope::from(Ok::<Vec<u32>, AppError>(vec![1, 2]));
    assert_eq!(
        serde_json::to_value(&ok).unwrap(),
        json!({"success": true, "data": [1, 2]})
    );

    let failed = Envelope::<Vec<u32>>::from(Err(AppError::NotAuthenticated));
    assert_eq!(
        serde_json::to_value(&failed).unwrap(),
        json!({"success": false, "error": "User not authenticated"})
    );
    assert_eq!(failed.into_result(), Err("User not authenticated".to_string()));

    let done = Envelope::done();
    assert_eq!(serde_json::to_value(&done).unwrap(), json!({"success": true}));
    assert_eq!(done.into_result(), Ok(None));
}

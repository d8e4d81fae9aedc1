// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - provider client and the journal facade.

pub mod journal;
pub mod supabase;

pub use journal::{AuthStateChange, TradeJournal};
pub use supabase::SupabaseClient;

//! # colloquy-core
//!
//! Core types, traits, and abstractions for the colloquy assistant backend.
//!
//! This crate provides the domain model (tiers, usage events, scheduled
//! tasks, suggestions, personas), the repository traits implemented by
//! `colloquy-db`, the tier quota table, and shared defaults.

pub mod defaults;
pub mod error;
pub mod intent;
pub mod limits;
pub mod logging;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod tokenizer;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use intent::{IntentKind, IntentParser, ParsedIntent, RegexIntentParser};
pub use limits::{
    billing_period_start, calculate_cost, next_billing_period_start, Limit, TierLimits,
};
pub use models::*;
pub use tokenizer::*;
pub use traits::*;
pub use uuid_utils::new_v7;

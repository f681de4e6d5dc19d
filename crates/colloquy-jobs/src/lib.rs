//! # colloquy-jobs
//!
//! Scheduling and background work for colloquy.
//!
//! This crate provides:
//! - Task scheduling with recurring series expansion
//! - Complete, snooze and cancel transitions with follow-up creation
//! - A periodic sweep that fires due tasks through a [`Notifier`]
//! - Proactive suggestion generation from usage, tasks and activity
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use colloquy_jobs::{LogNotifier, SweepWorker, TaskScheduler, WorkerConfig};
//! use colloquy_db::Database;
//!
//! let db = Database::connect("postgres://...").await?;
//! let scheduler = TaskScheduler::from_database(&db, Arc::new(LogNotifier));
//!
//! let handle = SweepWorker::new(scheduler, WorkerConfig::from_env()).start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod notifier;
pub mod recurrence;
pub mod scheduler;
pub mod suggestions;
pub mod worker;

// Re-export core types
pub use colloquy_core::*;

pub use notifier::LogNotifier;
pub use scheduler::{SweepReport, TaskScheduler};
pub use suggestions::{derive_suggestions, Signals, SuggestionEngine};
pub use worker::{SweepWorker, WorkerConfig, WorkerEvent, WorkerHandle};

//! Shared application state.

use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::RateLimiter;

use colloquy_core::{
    ActivityRepository, EstimatingTokenizer, IntentParser, PersonaRepository, RegexIntentParser,
    ThreadRepository, Tokenizer, UserRepository,
};
use colloquy_db::Database;
use colloquy_inference::{ChatBackend, ModelOptimizer};
use colloquy_jobs::{SuggestionEngine, TaskScheduler};

use crate::auth::SessionVerifier;
use crate::services::UsageTracker;

/// Process-wide request limiter, independent of per-user monthly quotas.
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: TaskScheduler,
    pub suggestions: SuggestionEngine,
    pub usage: UsageTracker,
    pub optimizer: Arc<ModelOptimizer>,
    pub chat: Arc<dyn ChatBackend>,
    pub personas: Arc<dyn PersonaRepository>,
    pub threads: Arc<dyn ThreadRepository>,
    pub activity: Arc<dyn ActivityRepository>,
    pub users: Arc<dyn UserRepository>,
    pub intents: Arc<dyn IntentParser>,
    /// Counts chat tokens for usage metering.
    pub tokenizer: Arc<dyn Tokenizer>,
    pub sessions: SessionVerifier,
    /// Secret for identity webhooks. Webhooks are refused when unset.
    pub webhook_secret: Option<String>,
    /// None when rate limiting is disabled.
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    /// Wire every service to the Postgres repositories in `db`.
    pub fn from_database(
        db: &Database,
        scheduler: TaskScheduler,
        optimizer: Arc<ModelOptimizer>,
        chat: Arc<dyn ChatBackend>,
        sessions: SessionVerifier,
    ) -> Self {
        Self {
            scheduler,
            suggestions: SuggestionEngine::from_database(db),
            usage: UsageTracker::from_database(db),
            optimizer,
            chat,
            personas: Arc::new(db.personas.clone()),
            threads: Arc::new(db.threads.clone()),
            activity: Arc::new(db.activity.clone()),
            users: Arc::new(db.users.clone()),
            intents: Arc::new(RegexIntentParser),
            tokenizer: Arc::new(EstimatingTokenizer),
            sessions,
            webhook_secret: None,
            rate_limiter: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

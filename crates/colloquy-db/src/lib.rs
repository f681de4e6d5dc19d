//! # colloquy-db
//!
//! PostgreSQL database layer for colloquy.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every `colloquy-core` repository trait
//! - Schema migrations (feature `migrations`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use colloquy_db::{Database, NewTask, TaskType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/colloquy").await?;
//!     let tier = db.subscriptions.active_tier("user_123").await?;
//!     println!("tier: {:?}", tier);
//!     Ok(())
//! }
//! ```
pub mod activity;
pub mod personas;
pub mod pool;
pub mod suggestions;
pub mod tasks;
pub mod threads;
pub mod usage;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use colloquy_core::*;

pub use activity::{PgActivityRepository, PgPatternRepository};
pub use personas::PgPersonaRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use suggestions::PgSuggestionRepository;
pub use tasks::PgTaskRepository;
pub use threads::{PgThreadRepository, PgUserRepository};
pub use usage::{PgSubscriptionRepository, PgUsageRepository};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Scheduled tasks.
    pub tasks: PgTaskRepository,
    /// Append-only usage ledger.
    pub usage: PgUsageRepository,
    /// Subscription tier lookup.
    pub subscriptions: PgSubscriptionRepository,
    /// Proactive suggestions.
    pub suggestions: PgSuggestionRepository,
    /// AI personas.
    pub personas: PgPersonaRepository,
    /// User activity log.
    pub activity: PgActivityRepository,
    /// Learned user patterns.
    pub patterns: PgPatternRepository,
    /// Chat threads and messages.
    pub threads: PgThreadRepository,
    /// Users mirrored from the identity provider.
    pub users: PgUserRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            tasks: PgTaskRepository::new(pool.clone()),
            usage: PgUsageRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            suggestions: PgSuggestionRepository::new(pool.clone()),
            personas: PgPersonaRepository::new(pool.clone()),
            activity: PgActivityRepository::new(pool.clone()),
            patterns: PgPatternRepository::new(pool.clone()),
            threads: PgThreadRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

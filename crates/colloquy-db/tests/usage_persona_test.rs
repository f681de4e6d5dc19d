//! Integration tests for usage, subscriptions and personas.
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL database.

use chrono::{Duration, Utc};
use colloquy_db::test_fixtures::{cleanup_owner, connect_test_database, unique_owner};
use colloquy_db::{
    new_v7, NewPersona, PersonaRepository, SubscriptionRepository, Tier, UpdatePersona,
    UsageEvent, UsageKind, UsageRepository,
};

fn event(owner: &str, kind: UsageKind, quantity: i64, cost_cents: i64) -> UsageEvent {
    UsageEvent {
        id: new_v7(),
        owner: owner.to_string(),
        kind,
        resource: "gpt-4o-mini".to_string(),
        quantity,
        metadata: None,
        cost_cents,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_usage_summary_groups_by_kind() {
    let db = connect_test_database().await;
    let owner = unique_owner("usage");

    db.usage.record(&event(&owner, UsageKind::ApiCall, 1, 1)).await.unwrap();
    db.usage.record(&event(&owner, UsageKind::ApiCall, 1, 1)).await.unwrap();
    db.usage
        .record(&event(&owner, UsageKind::TokenUsage, 1500, 3))
        .await
        .unwrap();

    let summary = db
        .usage
        .summarize_since(&owner, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(summary.quantity(UsageKind::ApiCall), 2);
    assert_eq!(summary.quantity(UsageKind::TokenUsage), 1500);
    assert_eq!(summary.total_cost_cents(), 5);

    // Events before the window are excluded
    let future = db
        .usage
        .summarize_since(&owner, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(future.quantity(UsageKind::ApiCall), 0);

    cleanup_owner(&db, &owner).await;
}

#[tokio::test]
async fn test_subscription_tier_lookup() {
    let db = connect_test_database().await;
    let owner = unique_owner("subs");

    assert_eq!(db.subscriptions.active_tier(&owner).await.unwrap(), None);
    db.subscriptions.set_tier(&owner, Tier::Starter).await.unwrap();
    assert_eq!(
        db.subscriptions.active_tier(&owner).await.unwrap(),
        Some(Tier::Starter)
    );
    db.subscriptions
        .set_tier(&owner, Tier::Enterprise)
        .await
        .unwrap();
    assert_eq!(
        db.subscriptions.active_tier(&owner).await.unwrap(),
        Some(Tier::Enterprise)
    );

    cleanup_owner(&db, &owner).await;
}

#[tokio::test]
async fn test_persona_default_moves_between_personas() {
    let db = connect_test_database().await;
    let owner = unique_owner("personas");

    let first = db
        .personas
        .create(
            &owner,
            NewPersona {
                name: "Tutor".into(),
                system_prompt: "Explain patiently.".into(),
                is_default: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second = db
        .personas
        .create(
            &owner,
            NewPersona {
                name: "Editor".into(),
                system_prompt: "Be concise.".into(),
                preferred_model: Some("claude-3-5-haiku".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(db.personas.get_default(&owner).await.unwrap().unwrap().id, first.id);

    let updated = db
        .personas
        .update(
            second.id,
            &owner,
            UpdatePersona {
                is_default: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(updated.is_default);
    assert_eq!(updated.name, "Editor");
    assert_eq!(db.personas.get_default(&owner).await.unwrap().unwrap().id, second.id);

    assert!(db.personas.delete(first.id, &owner).await.unwrap());
    assert!(!db.personas.delete(first.id, &owner).await.unwrap());
    assert_eq!(db.personas.list(&owner).await.unwrap().len(), 1);

    cleanup_owner(&db, &owner).await;
}

//! Integration tests for the scheduled task repository.
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL database.
//! Run migrations first: `sqlx migrate run`

use chrono::{Duration, DurationRound, Utc};
use colloquy_db::test_fixtures::{cleanup_owner, connect_test_database, unique_owner};
use colloquy_db::{
    new_v7, Priority, Recurrence, RecurrencePattern, ScheduledTask, TaskMetadata, TaskRepository,
    TaskStatus, TaskType,
};

fn task(owner: &str, offset_minutes: i64) -> ScheduledTask {
    // Postgres stores microseconds; truncate so round-trips compare equal.
    let now = Utc::now()
        .duration_trunc(Duration::microseconds(1))
        .unwrap();
    ScheduledTask {
        id: new_v7(),
        owner: owner.to_string(),
        title: "Water the plants".to_string(),
        description: Some("Balcony first".to_string()),
        task_type: TaskType::Reminder,
        scheduled_for: now + Duration::minutes(offset_minutes),
        recurrence: None,
        status: TaskStatus::Pending,
        metadata: TaskMetadata::default().with_priority(Priority::High),
        series_id: None,
        notified_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_insert_and_get_round_trip() {
    let db = connect_test_database().await;
    let owner = unique_owner("tasks");

    let mut t = task(&owner, 30);
    t.recurrence = Some(Recurrence::new(RecurrencePattern::Weekly).with_max_occurrences(3));
    db.tasks.insert_series(&[t.clone()]).await.unwrap();

    let fetched = db.tasks.get(t.id, &owner).await.unwrap().expect("task exists");
    assert_eq!(fetched, t);

    // Other owners never see it
    assert!(db.tasks.get(t.id, "someone_else").await.unwrap().is_none());

    cleanup_owner(&db, &owner).await;
}

#[tokio::test]
async fn test_series_insert_is_atomic() {
    let db = connect_test_database().await;
    let owner = unique_owner("tasks_atomic");

    let first = task(&owner, 10);
    let duplicate = first.clone();
    // Second row reuses the primary key, so the whole batch must roll back.
    let result = db.tasks.insert_series(&[first.clone(), duplicate]).await;
    assert!(result.is_err());
    assert!(db.tasks.get(first.id, &owner).await.unwrap().is_none());

    cleanup_owner(&db, &owner).await;
}

#[tokio::test]
async fn test_list_open_orders_by_due_time() {
    let db = connect_test_database().await;
    let owner = unique_owner("tasks_order");

    let late = task(&owner, 120);
    let early = task(&owner, 5);
    let closed = task(&owner, 1);
    db.tasks
        .insert_series(&[late.clone(), early.clone(), closed.clone()])
        .await
        .unwrap();
    db.tasks
        .update_status(closed.id, &owner, TaskStatus::Completed)
        .await
        .unwrap();

    let open = db.tasks.list_open(&owner).await.unwrap();
    let ids: Vec<_> = open.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    cleanup_owner(&db, &owner).await;
}

#[tokio::test]
async fn test_claim_due_lifecycle() {
    let db = connect_test_database().await;
    let owner = unique_owner("tasks_snooze");

    let t = task(&owner, -5);
    db.tasks.insert_series(&[t.clone()]).await.unwrap();

    let until = Utc::now() - Duration::seconds(1);
    assert!(db.tasks.snooze(t.id, &owner, until).await.unwrap());
    let snoozed = db.tasks.get(t.id, &owner).await.unwrap().unwrap();
    assert_eq!(snoozed.status, TaskStatus::Snoozed);

    let claimed = db.tasks.claim_due(Utc::now(), 1000).await.unwrap();
    let mine = claimed.iter().find(|d| d.id == t.id).unwrap();
    assert_eq!(mine.status, TaskStatus::Pending);

    let fired = db.tasks.get(t.id, &owner).await.unwrap().unwrap();
    assert_eq!(fired.status, TaskStatus::Pending);
    assert!(fired.notified_at.is_some());

    let again = db.tasks.claim_due(Utc::now(), 1000).await.unwrap();
    assert!(!again.iter().any(|d| d.id == t.id));

    db.tasks.release_claim(t.id).await.unwrap();
    let retried = db.tasks.claim_due(Utc::now(), 1000).await.unwrap();
    assert!(retried.iter().any(|d| d.id == t.id));

    // Claims run in one test so parallel tests never sweep each other's rows.
    let series: Vec<ScheduledTask> = (0..20).map(|_| task(&owner, -5)).collect();
    db.tasks.insert_series(&series).await.unwrap();
    let (a, b) = tokio::join!(
        db.tasks.claim_due(Utc::now(), 1000),
        db.tasks.claim_due(Utc::now(), 1000)
    );
    let mine = |claimed: Vec<ScheduledTask>| -> Vec<_> {
        claimed
            .into_iter()
            .filter(|c| c.owner == owner)
            .map(|c| c.id)
            .collect()
    };
    let (a, b) = (mine(a.unwrap()), mine(b.unwrap()));
    assert_eq!(a.len() + b.len(), series.len());
    assert!(a.iter().all(|id| !b.contains(id)));

    cleanup_owner(&db, &owner).await;
}

//! Task scheduling, transitions and the due-task sweep.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use colloquy_core::defaults::{
    BREAK_SUGGESTION_MINUTES, HIGH_PRIORITY_FOLLOWUP_HOURS, MEETING_FOLLOWUP_MINUTES,
    MEETING_REMINDER_LEAD_MINUTES, OVERDUE_FOLLOWUP_HOURS, SNOOZE_MAX_MINUTES, SNOOZE_MINUTES,
    SWEEP_BATCH_SIZE, UPCOMING_DAYS_MAX, WORK_INTENSITY_BREAK_THRESHOLD,
};
use colloquy_core::{
    new_v7, Error, IntentKind, MeetingSlot, MeetingTimes, NewTask, Notifier, ParsedIntent,
    PatternRepository, Priority, Result, ScheduledTask, TaskMetadata, TaskRepository, TaskStatus,
    TaskType, WorkIntensity, PATTERN_MEETING_TIMES, PATTERN_WORK_INTENSITY,
};
use colloquy_db::Database;

use crate::recurrence;

/// Outcome of one due-task sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Tasks found due.
    pub due: usize,
    pub notified: usize,
    /// High-priority follow-ups created.
    pub followups: usize,
    /// Tasks whose notification failed; they stay due for the next sweep.
    pub failed: usize,
}

/// Persists tasks and drives their lifecycle.
#[derive(Clone)]
pub struct TaskScheduler {
    tasks: Arc<dyn TaskRepository>,
    patterns: Arc<dyn PatternRepository>,
    notifier: Arc<dyn Notifier>,
    batch_size: i64,
}

impl TaskScheduler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        patterns: Arc<dyn PatternRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tasks,
            patterns,
            notifier,
            batch_size: SWEEP_BATCH_SIZE,
        }
    }

    pub fn from_database(db: &Database, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            Arc::new(db.tasks.clone()),
            Arc::new(db.patterns.clone()),
            notifier,
        )
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn build(new: &NewTask, id: Uuid, due: DateTime<Utc>, series_id: Option<Uuid>) -> ScheduledTask {
        let now = Utc::now();
        ScheduledTask {
            id,
            owner: new.owner.clone(),
            title: new.title.clone(),
            description: new.description.clone(),
            task_type: new.task_type,
            scheduled_for: due,
            recurrence: new.recurrence.clone(),
            status: TaskStatus::Pending,
            metadata: new.metadata.clone(),
            series_id,
            notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Persist a task, expanding a recurring one into its full series in a
    /// single transaction. Returns the id of the first task.
    pub async fn schedule_task(&self, new: NewTask) -> Result<Uuid> {
        if new.title.trim().is_empty() {
            return Err(Error::InvalidInput("task title is required".into()));
        }
        if new.owner.is_empty() {
            return Err(Error::InvalidInput("task owner is required".into()));
        }

        let first_id = new_v7();
        let series = match &new.recurrence {
            Some(rec) => {
                let dues = recurrence::expand(new.scheduled_for, rec)?;
                dues.into_iter()
                    .enumerate()
                    .map(|(i, due)| {
                        let id = if i == 0 { first_id } else { new_v7() };
                        Self::build(&new, id, due, Some(first_id))
                    })
                    .collect()
            }
            None => vec![Self::build(&new, first_id, new.scheduled_for, None)],
        };

        self.tasks.insert_series(&series).await?;

        info!(
            subsystem = "jobs",
            component = "scheduler",
            op = "schedule",
            owner = %new.owner,
            task_id = %first_id,
            task_type = new.task_type.as_str(),
            task_count = series.len(),
            "Task scheduled"
        );
        Ok(first_id)
    }

    /// Load an open task or fail with the reason it cannot transition.
    async fn open_task(&self, id: Uuid, owner: &str) -> Result<ScheduledTask> {
        let task = self
            .tasks
            .get(id, owner)
            .await?
            .ok_or(Error::TaskNotFound(id))?;
        if !task.status.is_open() {
            return Err(Error::InvalidTransition(format!(
                "task {} is already {}",
                id, task.status
            )));
        }
        Ok(task)
    }

    /// Mark a task completed. Completing a meeting schedules one suggestion
    /// follow-up [`MEETING_FOLLOWUP_MINUTES`] later.
    pub async fn complete_task(&self, id: Uuid, owner: &str) -> Result<()> {
        let task = self.open_task(id, owner).await?;
        if !self
            .tasks
            .update_status(id, owner, TaskStatus::Completed)
            .await?
        {
            return Err(Error::TaskNotFound(id));
        }

        if task.metadata.is_meeting() {
            let followup = NewTask::new(
                owner,
                format!("Follow up on: {}", task.title),
                TaskType::Suggestion,
                Utc::now() + Duration::minutes(MEETING_FOLLOWUP_MINUTES),
            )
            .with_description("Capture notes and action items from the meeting")
            .with_metadata(TaskMetadata {
                related_thread_id: task.metadata.related_thread_id,
                ..TaskMetadata::default().with_category("followup")
            });
            self.schedule_task(followup).await?;
        }

        debug!(
            subsystem = "jobs",
            component = "scheduler",
            op = "complete",
            owner = %owner,
            task_id = %id,
            "Task completed"
        );
        Ok(())
    }

    /// Push a task's due time to now + `minutes` (default
    /// [`SNOOZE_MINUTES`]). Returns the new due time.
    pub async fn snooze_task(
        &self,
        id: Uuid,
        owner: &str,
        minutes: Option<i64>,
    ) -> Result<DateTime<Utc>> {
        let minutes = minutes.unwrap_or(SNOOZE_MINUTES);
        if minutes <= 0 {
            return Err(Error::InvalidInput("snooze minutes must be positive".into()));
        }
        if minutes > SNOOZE_MAX_MINUTES {
            return Err(Error::InvalidInput(format!(
                "snooze minutes must be at most {}",
                SNOOZE_MAX_MINUTES
            )));
        }
        self.open_task(id, owner).await?;

        let until = Duration::try_minutes(minutes)
            .and_then(|d| Utc::now().checked_add_signed(d))
            .ok_or_else(|| Error::InvalidInput("snooze minutes out of range".into()))?;
        if !self.tasks.snooze(id, owner, until).await? {
            return Err(Error::TaskNotFound(id));
        }

        debug!(
            subsystem = "jobs",
            component = "scheduler",
            op = "snooze",
            owner = %owner,
            task_id = %id,
            minutes,
            "Task snoozed"
        );
        Ok(until)
    }

    pub async fn cancel_task(&self, id: Uuid, owner: &str) -> Result<()> {
        self.open_task(id, owner).await?;
        if !self
            .tasks
            .update_status(id, owner, TaskStatus::Cancelled)
            .await?
        {
            return Err(Error::TaskNotFound(id));
        }
        debug!(
            subsystem = "jobs",
            component = "scheduler",
            op = "cancel",
            owner = %owner,
            task_id = %id,
            "Task cancelled"
        );
        Ok(())
    }

    /// Fire every open task due at or before `now` that has not been
    /// notified for its current due time. Tasks are claimed before they are
    /// notified, so concurrent sweeps never fire the same task twice.
    ///
    /// A failed notification releases the claim for the next sweep. A
    /// non-recurring high-priority task gets one medium-priority follow-up
    /// [`HIGH_PRIORITY_FOLLOWUP_HOURS`] later.
    pub async fn process_due_tasks(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let start = Instant::now();
        let due = self.tasks.claim_due(now, self.batch_size).await?;
        let mut report = SweepReport {
            due: due.len(),
            ..Default::default()
        };

        for task in &due {
            if let Err(e) = self.notifier.notify(task).await {
                warn!(
                    subsystem = "jobs",
                    component = "scheduler",
                    op = "sweep",
                    task_id = %task.id,
                    error = %e,
                    "Notification failed"
                );
                report.failed += 1;
                if let Err(e) = self.tasks.release_claim(task.id).await {
                    warn!(
                        subsystem = "jobs",
                        component = "scheduler",
                        op = "sweep",
                        task_id = %task.id,
                        error = %e,
                        "Failed to release task claim"
                    );
                }
                continue;
            }
            report.notified += 1;

            if !task.is_recurring() && task.metadata.priority == Priority::High {
                match self.schedule_task(Self::high_priority_followup(task, now)).await {
                    Ok(_) => report.followups += 1,
                    Err(e) => warn!(
                        subsystem = "jobs",
                        component = "scheduler",
                        op = "sweep",
                        task_id = %task.id,
                        error = %e,
                        "Failed to create follow-up"
                    ),
                }
            }
        }

        if report.due > 0 {
            info!(
                subsystem = "jobs",
                component = "scheduler",
                op = "sweep",
                task_count = report.due,
                notified = report.notified,
                followups = report.followups,
                failed = report.failed,
                duration_ms = start.elapsed().as_millis() as u64,
                "Due tasks processed"
            );
        }
        Ok(report)
    }

    fn high_priority_followup(task: &ScheduledTask, now: DateTime<Utc>) -> NewTask {
        NewTask::new(
            task.owner.clone(),
            format!("Follow up: {}", task.title),
            TaskType::Followup,
            now + Duration::hours(HIGH_PRIORITY_FOLLOWUP_HOURS),
        )
        .with_metadata(TaskMetadata {
            related_thread_id: task.metadata.related_thread_id,
            ..TaskMetadata::default()
                .with_priority(Priority::Medium)
                .with_category(task.metadata.category.clone())
        })
    }

    /// Candidate tasks derived from the owner's state. Nothing is persisted.
    pub async fn generate_smart_suggestions(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Vec<NewTask> {
        let mut out = Vec::new();

        for task in self.pending_tasks(owner).await {
            if task.scheduled_for < now && task.metadata.priority == Priority::High {
                out.push(
                    NewTask::new(
                        owner,
                        format!("Follow up on overdue: {}", task.title),
                        TaskType::Followup,
                        now + Duration::hours(OVERDUE_FOLLOWUP_HOURS),
                    )
                    .with_metadata(TaskMetadata {
                        related_thread_id: task.metadata.related_thread_id,
                        ..TaskMetadata::default().with_priority(Priority::High)
                    }),
                );
            }
        }

        if let Some(times) = self
            .load_pattern::<MeetingTimes>(owner, PATTERN_MEETING_TIMES)
            .await
        {
            let lead = Duration::minutes(MEETING_REMINDER_LEAD_MINUTES);
            let next = times
                .slots
                .iter()
                .filter_map(|slot| next_slot_after(slot, now + lead))
                .min();
            if let Some(meeting_at) = next {
                let mut metadata = TaskMetadata::default().with_category("calendar");
                metadata.reminder_type = Some("meeting".into());
                out.push(
                    NewTask::new(owner, "Upcoming meeting", TaskType::Reminder, meeting_at - lead)
                        .with_description(format!(
                            "You usually have a meeting at {}",
                            meeting_at.format("%A %H:%M UTC")
                        ))
                        .with_metadata(metadata),
                );
            }
        }

        if let Some(intensity) = self
            .load_pattern::<WorkIntensity>(owner, PATTERN_WORK_INTENSITY)
            .await
        {
            if intensity.score > WORK_INTENSITY_BREAK_THRESHOLD {
                out.push(
                    NewTask::new(
                        owner,
                        "Take a break",
                        TaskType::Suggestion,
                        now + Duration::minutes(BREAK_SUGGESTION_MINUTES),
                    )
                    .with_description("You have been working intensely; a short break helps")
                    .with_metadata(
                        TaskMetadata::default()
                            .with_priority(Priority::Low)
                            .with_category("wellbeing"),
                    ),
                );
            }
        }

        out
    }

    async fn load_pattern<T: serde::de::DeserializeOwned>(
        &self,
        owner: &str,
        pattern_type: &str,
    ) -> Option<T> {
        match self.patterns.get(owner, pattern_type).await {
            Ok(Some(p)) => match serde_json::from_value(p.pattern_data) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "scheduler",
                        owner = %owner,
                        pattern_type,
                        error = %e,
                        "Malformed pattern ignored"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "scheduler",
                    owner = %owner,
                    pattern_type,
                    error = %e,
                    "Pattern lookup failed"
                );
                None
            }
        }
    }

    /// Schedule a reminder for an intent found in chat text.
    pub async fn schedule_from_intent(&self, owner: &str, intent: &ParsedIntent) -> Result<Uuid> {
        let mut metadata = TaskMetadata::default();
        if intent.kind == IntentKind::Meeting {
            metadata.category = "meeting".into();
            metadata.reminder_type = Some("meeting".into());
        }
        let task = NewTask::new(owner, intent.title.clone(), TaskType::Reminder, intent.due_at)
            .with_description("Created from chat")
            .with_metadata(metadata);
        self.schedule_task(task).await
    }

    // Reads below log and degrade to an empty list: an empty result can mean
    // either no tasks or a failed lookup.

    /// Open tasks, ascending due time.
    pub async fn pending_tasks(&self, owner: &str) -> Vec<ScheduledTask> {
        degrade(owner, "pending", self.tasks.list_open(owner).await)
    }

    /// Open tasks due within `days` of `now`, clamped to
    /// `1..=UPCOMING_DAYS_MAX`.
    pub async fn upcoming_tasks(
        &self,
        owner: &str,
        days: i64,
        now: DateTime<Utc>,
    ) -> Vec<ScheduledTask> {
        let days = days.clamp(1, UPCOMING_DAYS_MAX);
        degrade(
            owner,
            "upcoming",
            self.tasks
                .list_between(owner, now, now + Duration::days(days))
                .await,
        )
    }

    /// Open suggestion-type tasks.
    pub async fn suggestion_tasks(&self, owner: &str) -> Vec<ScheduledTask> {
        degrade(owner, "suggestions", self.tasks.list_suggestions(owner).await)
    }
}

fn degrade(owner: &str, query: &str, result: Result<Vec<ScheduledTask>>) -> Vec<ScheduledTask> {
    match result {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(
                subsystem = "jobs",
                component = "scheduler",
                op = "list",
                owner = %owner,
                query,
                error = %e,
                "Task lookup failed, returning empty list"
            );
            Vec::new()
        }
    }
}

/// First occurrence of a weekly slot strictly after `after`.
fn next_slot_after(slot: &MeetingSlot, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if slot.weekday > 6 {
        return None;
    }
    let time = NaiveTime::from_hms_opt(slot.hour, slot.minute, 0)?;
    let today = after.weekday().num_days_from_monday();
    let days_ahead = (slot.weekday + 7 - today) % 7;
    let mut at = (after.date_naive() + Duration::days(i64::from(days_ahead)))
        .and_time(time)
        .and_utc();
    if at <= after {
        at += Duration::days(7);
    }
    Some(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use colloquy_core::mock::{InMemoryPatternRepository, InMemoryTaskRepository, RecordingNotifier};
    use colloquy_core::{Recurrence, RecurrencePattern};
    use serde_json::json;

    struct Fixture {
        tasks: Arc<InMemoryTaskRepository>,
        patterns: Arc<InMemoryPatternRepository>,
        notifier: Arc<RecordingNotifier>,
        scheduler: TaskScheduler,
    }

    fn fixture() -> Fixture {
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let patterns = Arc::new(InMemoryPatternRepository::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = TaskScheduler::new(tasks.clone(), patterns.clone(), notifier.clone());
        Fixture {
            tasks,
            patterns,
            notifier,
            scheduler,
        }
    }

    fn monday_noon() -> DateTime<Utc> {
        // 2026-03-09 is a Monday
        Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_single_task() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Water plants", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();
        let stored = f.tasks.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].status, TaskStatus::Pending);
        assert!(stored[0].series_id.is_none());
    }

    #[tokio::test]
    async fn test_recurring_series_bounded() {
        let f = fixture();
        let rec = Recurrence::new(RecurrencePattern::Daily).with_max_occurrences(4);
        let meta = TaskMetadata::default().with_priority(Priority::High);
        let id = f
            .scheduler
            .schedule_task(
                NewTask::new("u1", "Standup", TaskType::Recurring, monday_noon())
                    .with_recurrence(rec)
                    .with_metadata(meta.clone()),
            )
            .await
            .unwrap();

        let stored = f.tasks.all();
        assert_eq!(stored.len(), 4);
        assert!(stored.iter().all(|t| t.title == "Standup" && t.metadata == meta));
        assert!(stored.iter().all(|t| t.series_id == Some(id)));
        assert_eq!(stored[3].scheduled_for, monday_noon() + Duration::days(3));
    }

    #[tokio::test]
    async fn test_schedule_rejects_blank_title() {
        let f = fixture();
        let err = f
            .scheduler
            .schedule_task(NewTask::new("u1", "  ", TaskType::Reminder, monday_noon()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(f.tasks.all().is_empty());
    }

    #[tokio::test]
    async fn test_snooze_then_complete() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();

        let before = Utc::now();
        let until = f.scheduler.snooze_task(id, "u1", Some(15)).await.unwrap();
        let expected = before + Duration::minutes(15);
        assert!((until - expected).num_seconds().abs() <= 2);

        let task = &f.tasks.all()[0];
        assert_eq!(task.status, TaskStatus::Snoozed);
        assert_eq!(task.scheduled_for, until);

        f.scheduler.complete_task(id, "u1").await.unwrap();
        assert_eq!(f.tasks.all()[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_snooze_rejects_out_of_range_minutes() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();

        for minutes in [i64::MAX, SNOOZE_MAX_MINUTES + 1] {
            assert!(matches!(
                f.scheduler.snooze_task(id, "u1", Some(minutes)).await,
                Err(Error::InvalidInput(_))
            ));
        }
        assert_eq!(f.tasks.all()[0].status, TaskStatus::Pending);
        assert!(f.scheduler.snooze_task(id, "u1", Some(SNOOZE_MAX_MINUTES)).await.is_ok());
    }

    #[tokio::test]
    async fn test_snooze_default_is_an_hour() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();
        let until = f.scheduler.snooze_task(id, "u1", None).await.unwrap();
        let delta = until - Utc::now();
        assert!(delta > Duration::minutes(59) && delta <= Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_terminal_states_reject_transitions() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();
        f.scheduler.cancel_task(id, "u1").await.unwrap();

        assert!(matches!(
            f.scheduler.complete_task(id, "u1").await,
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            f.scheduler.snooze_task(id, "u1", Some(5)).await,
            Err(Error::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_transition() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();
        assert!(matches!(
            f.scheduler.complete_task(id, "u2").await,
            Err(Error::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_completing_meeting_creates_followup() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(
                NewTask::new("u1", "Design review", TaskType::Reminder, monday_noon())
                    .with_metadata(TaskMetadata::default().with_category("Meeting")),
            )
            .await
            .unwrap();

        f.scheduler.complete_task(id, "u1").await.unwrap();

        let followups: Vec<_> = f
            .tasks
            .all()
            .into_iter()
            .filter(|t| t.task_type == TaskType::Suggestion)
            .collect();
        assert_eq!(followups.len(), 1);
        let delta = followups[0].scheduled_for - Utc::now();
        assert!(delta > Duration::minutes(29) && delta <= Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_sweep_notifies_and_creates_high_priority_followup() {
        let f = fixture();
        let now = monday_noon();
        let high = f
            .scheduler
            .schedule_task(
                NewTask::new("u1", "Pay invoice", TaskType::Reminder, now - Duration::minutes(5))
                    .with_metadata(TaskMetadata::default().with_priority(Priority::High)),
            )
            .await
            .unwrap();
        f.scheduler
            .schedule_task(NewTask::new("u1", "Later", TaskType::Reminder, now + Duration::hours(1)))
            .await
            .unwrap();

        let report = f.scheduler.process_due_tasks(now).await.unwrap();
        assert_eq!(report.due, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.followups, 1);
        assert_eq!(f.notifier.notified(), vec![high]);

        let followup = f
            .tasks
            .all()
            .into_iter()
            .find(|t| t.task_type == TaskType::Followup)
            .unwrap();
        assert_eq!(followup.scheduled_for, now + Duration::hours(4));
        assert_eq!(followup.metadata.priority, Priority::Medium);

        // Second sweep at the same instant fires nothing new
        let again = f.scheduler.process_due_tasks(now).await.unwrap();
        assert_eq!(again.due, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_followup_for_recurring() {
        let f = fixture();
        let now = monday_noon();
        f.scheduler
            .schedule_task(
                NewTask::new("u1", "Standup", TaskType::Recurring, now)
                    .with_recurrence(Recurrence::new(RecurrencePattern::Daily).with_max_occurrences(2))
                    .with_metadata(TaskMetadata::default().with_priority(Priority::High)),
            )
            .await
            .unwrap();

        let report = f.scheduler.process_due_tasks(now).await.unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(report.followups, 0);
    }

    #[tokio::test]
    async fn test_sweep_reverts_snoozed_to_pending() {
        let f = fixture();
        let id = f
            .scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();
        let until = f.scheduler.snooze_task(id, "u1", Some(1)).await.unwrap();

        let report = f.scheduler.process_due_tasks(until).await.unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(f.tasks.all()[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_sweep_failed_notification_retried() {
        let f = fixture();
        let now = monday_noon();
        f.scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, now))
            .await
            .unwrap();

        f.notifier.set_fail(true);
        let report = f.scheduler.process_due_tasks(now).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 0);

        f.notifier.set_fail(false);
        let report = f.scheduler.process_due_tasks(now).await.unwrap();
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_notify_once() {
        let f = fixture();
        let now = monday_noon();
        for title in ["Call", "Email", "Invoice"] {
            f.scheduler
                .schedule_task(NewTask::new("u1", title, TaskType::Reminder, now))
                .await
                .unwrap();
        }

        let other = f.scheduler.clone();
        let (a, b) = tokio::join!(f.scheduler.process_due_tasks(now), other.process_due_tasks(now));
        assert_eq!(a.unwrap().notified + b.unwrap().notified, 3);
        assert_eq!(f.notifier.notified().len(), 3);
    }

    #[tokio::test]
    async fn test_meeting_and_high_priority_followups_are_independent() {
        let f = fixture();
        let now = monday_noon();
        let id = f
            .scheduler
            .schedule_task(
                NewTask::new("u1", "Board meeting", TaskType::Reminder, now).with_metadata(
                    TaskMetadata::default()
                        .with_priority(Priority::High)
                        .with_category("meeting"),
                ),
            )
            .await
            .unwrap();

        f.scheduler.process_due_tasks(now).await.unwrap();
        f.scheduler.complete_task(id, "u1").await.unwrap();

        let all = f.tasks.all();
        assert_eq!(all.iter().filter(|t| t.task_type == TaskType::Followup).count(), 1);
        assert_eq!(all.iter().filter(|t| t.task_type == TaskType::Suggestion).count(), 1);
    }

    #[tokio::test]
    async fn test_reads_degrade_to_empty() {
        let f = fixture();
        f.scheduler
            .schedule_task(NewTask::new("u1", "Call", TaskType::Reminder, monday_noon()))
            .await
            .unwrap();
        f.tasks.set_fail_reads(true);
        assert!(f.scheduler.pending_tasks("u1").await.is_empty());
        assert!(f.scheduler.upcoming_tasks("u1", 7, monday_noon()).await.is_empty());
        assert!(f.scheduler.suggestion_tasks("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_upcoming_window_and_order() {
        let f = fixture();
        let now = monday_noon();
        for (title, days) in [("third", 5), ("first", 1), ("outside", 10), ("second", 3)] {
            f.scheduler
                .schedule_task(NewTask::new("u1", title, TaskType::Reminder, now + Duration::days(days)))
                .await
                .unwrap();
        }
        let titles: Vec<String> = f
            .scheduler
            .upcoming_tasks("u1", 7, now)
            .await
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_smart_suggestions_overdue_high_priority() {
        let f = fixture();
        let now = monday_noon();
        f.scheduler
            .schedule_task(
                NewTask::new("u1", "Ship release", TaskType::Reminder, now - Duration::hours(3))
                    .with_metadata(TaskMetadata::default().with_priority(Priority::High)),
            )
            .await
            .unwrap();
        f.scheduler
            .schedule_task(NewTask::new("u1", "Low stuff", TaskType::Reminder, now - Duration::hours(3)))
            .await
            .unwrap();

        let suggestions = f.scheduler.generate_smart_suggestions("u1", now).await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].scheduled_for, now + Duration::hours(2));
        assert!(suggestions[0].title.contains("Ship release"));
        // Not persisted
        assert_eq!(f.tasks.all().len(), 2);
    }

    #[tokio::test]
    async fn test_smart_suggestions_meeting_pattern() {
        let f = fixture();
        let now = monday_noon();
        // Wednesday 10:00
        f.patterns
            .upsert("u1", PATTERN_MEETING_TIMES, json!({"slots": [{"weekday": 2, "hour": 10}]}))
            .await
            .unwrap();

        let suggestions = f.scheduler.generate_smart_suggestions("u1", now).await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(
            suggestions[0].scheduled_for,
            Utc.with_ymd_and_hms(2026, 3, 11, 9, 45, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_smart_suggestions_meeting_too_close_rolls_a_week() {
        let f = fixture();
        let now = monday_noon();
        // Monday 12:10 is inside the 15 minute lead
        f.patterns
            .upsert("u1", PATTERN_MEETING_TIMES, json!({"slots": [{"weekday": 0, "hour": 12, "minute": 10}]}))
            .await
            .unwrap();

        let suggestions = f.scheduler.generate_smart_suggestions("u1", now).await;
        assert_eq!(
            suggestions[0].scheduled_for,
            Utc.with_ymd_and_hms(2026, 3, 16, 11, 55, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_smart_suggestions_break_threshold() {
        let f = fixture();
        let now = monday_noon();
        f.patterns
            .upsert("u1", PATTERN_WORK_INTENSITY, json!({"score": 0.8}))
            .await
            .unwrap();
        assert!(f.scheduler.generate_smart_suggestions("u1", now).await.is_empty());

        f.patterns
            .upsert("u1", PATTERN_WORK_INTENSITY, json!({"score": 0.85}))
            .await
            .unwrap();
        let suggestions = f.scheduler.generate_smart_suggestions("u1", now).await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Take a break");
        assert_eq!(suggestions[0].scheduled_for, now + Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_schedule_from_meeting_intent() {
        let f = fixture();
        let intent = ParsedIntent {
            title: "sync with design".into(),
            due_at: monday_noon(),
            kind: IntentKind::Meeting,
        };
        let id = f.scheduler.schedule_from_intent("u1", &intent).await.unwrap();
        let task = f.tasks.all().into_iter().find(|t| t.id == id).unwrap();
        assert!(task.metadata.is_meeting());
        assert_eq!(task.task_type, TaskType::Reminder);
    }

    #[test]
    fn test_next_slot_same_day_later() {
        let slot = MeetingSlot { weekday: 0, hour: 15, minute: 0 };
        assert_eq!(
            next_slot_after(&slot, monday_noon()).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 9, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_slot_invalid() {
        assert!(next_slot_after(&MeetingSlot { weekday: 7, hour: 9, minute: 0 }, monday_noon()).is_none());
        assert!(next_slot_after(&MeetingSlot { weekday: 1, hour: 25, minute: 0 }, monday_noon()).is_none());
    }
}

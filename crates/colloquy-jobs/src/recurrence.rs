//! Recurring series expansion.

use chrono::{DateTime, Duration, Utc};

use colloquy_core::defaults::{RECURRENCE_MAX_OCCURRENCES, RECURRENCE_MAX_OCCURRENCES_LIMIT};
use colloquy_core::{Error, IntervalUnit, Recurrence, RecurrencePattern, Result};

/// Spacing between two occurrences.
pub fn interval(recurrence: &Recurrence) -> Result<Duration> {
    match recurrence.pattern {
        RecurrencePattern::Daily => Ok(Duration::hours(24)),
        RecurrencePattern::Weekly => Ok(Duration::days(7)),
        // Fixed 30 days, not calendar months.
        RecurrencePattern::Monthly => Ok(Duration::days(30)),
        RecurrencePattern::Custom => {
            let (n, unit) = match (recurrence.interval, recurrence.unit) {
                (Some(n), Some(unit)) if n > 0 => (i64::from(n), unit),
                _ => {
                    return Err(Error::InvalidInput(
                        "custom recurrence needs a positive interval and a unit".into(),
                    ))
                }
            };
            let step = match unit {
                IntervalUnit::Minutes => Duration::try_minutes(n),
                IntervalUnit::Hours => Duration::try_hours(n),
                IntervalUnit::Days => Duration::try_days(n),
                IntervalUnit::Weeks => Duration::try_weeks(n),
            };
            step.ok_or_else(|| Error::InvalidInput("recurrence interval is too large".into()))
        }
    }
}

/// Due times of a series starting at `first_due`, original included.
///
/// Stops after `max_occurrences` (default
/// [`RECURRENCE_MAX_OCCURRENCES`]) or before the first time past
/// `end_date`, whichever comes first. The original is always returned.
/// A series longer than [`RECURRENCE_MAX_OCCURRENCES_LIMIT`], or one that
/// runs past the representable date range, is rejected.
pub fn expand(first_due: DateTime<Utc>, recurrence: &Recurrence) -> Result<Vec<DateTime<Utc>>> {
    let step = interval(recurrence)?;
    let max = recurrence
        .max_occurrences
        .unwrap_or(RECURRENCE_MAX_OCCURRENCES)
        .max(1);
    if max > RECURRENCE_MAX_OCCURRENCES_LIMIT {
        return Err(Error::InvalidInput(format!(
            "maxOccurrences must be at most {}",
            RECURRENCE_MAX_OCCURRENCES_LIMIT
        )));
    }

    let mut dues = vec![first_due];
    let mut next = first_due;
    while dues.len() < max as usize {
        next = next
            .checked_add_signed(step)
            .ok_or_else(|| Error::InvalidInput("recurrence runs past the supported date range".into()))?;
        if recurrence.end_date.is_some_and(|end| next > end) {
            break;
        }
        dues.push(next);
    }
    Ok(dues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_defaults_to_ten() {
        let dues = expand(start(), &Recurrence::new(RecurrencePattern::Daily)).unwrap();
        assert_eq!(dues.len(), 10);
        assert_eq!(dues[0], start());
        assert_eq!(dues[9], start() + Duration::days(9));
    }

    #[test]
    fn test_max_occurrences_includes_original() {
        let rec = Recurrence::new(RecurrencePattern::Weekly).with_max_occurrences(3);
        let dues = expand(start(), &rec).unwrap();
        assert_eq!(
            dues,
            vec![start(), start() + Duration::days(7), start() + Duration::days(14)]
        );
    }

    #[test]
    fn test_monthly_is_thirty_days() {
        let rec = Recurrence::new(RecurrencePattern::Monthly).with_max_occurrences(2);
        let dues = expand(start(), &rec).unwrap();
        assert_eq!(dues[1] - dues[0], Duration::days(30));
    }

    #[test]
    fn test_end_date_stops_first() {
        let rec = Recurrence::new(RecurrencePattern::Daily)
            .with_max_occurrences(10)
            .with_end_date(start() + Duration::days(2));
        let dues = expand(start(), &rec).unwrap();
        assert_eq!(dues.len(), 3);
    }

    #[test]
    fn test_end_date_before_start_keeps_original() {
        let rec = Recurrence::new(RecurrencePattern::Daily).with_end_date(start() - Duration::days(1));
        assert_eq!(expand(start(), &rec).unwrap(), vec![start()]);
    }

    #[test]
    fn test_custom_interval() {
        let rec = Recurrence::custom(90, IntervalUnit::Minutes).with_max_occurrences(3);
        let dues = expand(start(), &rec).unwrap();
        assert_eq!(dues[2], start() + Duration::minutes(180));
    }

    #[test]
    fn test_max_occurrences_above_limit_rejected() {
        let rec = Recurrence::new(RecurrencePattern::Daily)
            .with_max_occurrences(RECURRENCE_MAX_OCCURRENCES_LIMIT + 1);
        assert!(matches!(expand(start(), &rec), Err(Error::InvalidInput(_))));

        let rec = Recurrence::new(RecurrencePattern::Daily).with_max_occurrences(u32::MAX);
        assert!(matches!(expand(start(), &rec), Err(Error::InvalidInput(_))));

        let rec = Recurrence::new(RecurrencePattern::Daily)
            .with_max_occurrences(RECURRENCE_MAX_OCCURRENCES_LIMIT);
        assert_eq!(expand(start(), &rec).unwrap().len(), RECURRENCE_MAX_OCCURRENCES_LIMIT as usize);
    }

    #[test]
    fn test_huge_custom_interval_rejected() {
        let rec = Recurrence::custom(u32::MAX, IntervalUnit::Weeks).with_max_occurrences(3);
        assert!(matches!(expand(start(), &rec), Err(Error::InvalidInput(_))));

        // the step fits, the second occurrence does not
        let rec = Recurrence::custom(20_000_000, IntervalUnit::Weeks).with_max_occurrences(2);
        assert!(matches!(expand(start(), &rec), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_custom_without_unit_rejected() {
        let rec = Recurrence::new(RecurrencePattern::Custom);
        assert!(matches!(expand(start(), &rec), Err(Error::InvalidInput(_))));
        assert!(expand(start(), &Recurrence::custom(0, IntervalUnit::Days)).is_err());
    }

    #[test]
    fn test_zero_max_treated_as_one() {
        let rec = Recurrence::new(RecurrencePattern::Daily).with_max_occurrences(0);
        assert_eq!(expand(start(), &rec).unwrap().len(), 1);
    }
}

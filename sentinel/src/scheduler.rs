//! Wall-clock scheduling for the daemon.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

use crate::error::{Result, SentinelError};

/// Parse `"HH:MM"` entries, sorted and deduplicated.
pub fn parse_times(times: &[String]) -> Result<Vec<NaiveTime>> {
    let mut parsed = times
        .iter()
        .map(|t| {
            let (h, m) = common::parse_clock_time(t)
                .map_err(|e| SentinelError::Validation(format!("scheduler time '{}': {}", t, e)))?;
            NaiveTime::from_hms_opt(h, m, 0)
                .ok_or_else(|| SentinelError::Validation(format!("scheduler time '{}' out of range", t)))
        })
        .collect::<Result<Vec<_>>>()?;
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

/// First slot strictly after `now`. Slots that do not exist locally (DST gaps)
/// are skipped. Returns `None` when `times` is empty.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, times: &[NaiveTime]) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    (0..=2)
        .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
        .flat_map(|day| times.iter().map(move |t| day.and_time(*t)))
        .filter_map(|naive| tz.from_local_datetime(&naive).earliest())
        .filter(|candidate| candidate > now)
        .min()
}

/// Whether a run is due on `today` given the last run date and an interval in days.
pub fn should_run(last_run: Option<NaiveDate>, today: NaiveDate, every_days: u32) -> bool {
    match last_run {
        None => true,
        Some(last) => (today - last).num_days() >= i64::from(every_days.max(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn parses_and_sorts_times() {
        let times = parse_times(&["18:30".to_string(), "08:00".to_string(), "08:00".to_string()]).unwrap();
        assert_eq!(
            times,
            vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap(), NaiveTime::from_hms_opt(18, 30, 0).unwrap()]
        );
        assert!(parse_times(&["25:00".to_string()]).is_err());
        assert!(parse_times(&["noon".to_string()]).is_err());
    }

    #[test]
    fn next_slot_same_day_or_tomorrow() {
        let times = parse_times(&["08:00".to_string(), "18:30".to_string()]).unwrap();

        assert_eq!(next_run_after(&at(7, 0), &times), Some(at(8, 0)));
        assert_eq!(next_run_after(&at(8, 0), &times), Some(at(18, 30)));
        assert_eq!(
            next_run_after(&at(20, 0), &times),
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap())
        );
        assert_eq!(next_run_after(&at(20, 0), &[]), None);
    }

    #[test]
    fn frequency_gate() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        assert!(should_run(None, d(1), 3));
        assert!(!should_run(Some(d(1)), d(1), 1));
        assert!(should_run(Some(d(1)), d(2), 1));
        assert!(!should_run(Some(d(1)), d(3), 3));
        assert!(should_run(Some(d(1)), d(4), 3));
    }
}

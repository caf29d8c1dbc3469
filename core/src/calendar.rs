//! Calendar views over stored study sessions.

use std::collections::BTreeMap;

use r2d2_sqlite::rusqlite::Connection;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::errors::StudyError;
use crate::store::sessions::{sessions_between, StudySessionRecord};

pub const DEFAULT_STATS_DAYS: i64 = 30;

/// Sessions grouped by `YYYY-MM-DD`, one key per day of the week.
pub type WeekSchedule = BTreeMap<String, Vec<StudySessionRecord>>;

/// Monday of the week containing `now`, at midnight UTC.
pub fn week_start(now: OffsetDateTime) -> OffsetDateTime {
    let date = now.date() - Duration::days(now.weekday().number_days_from_monday() as i64);
    date.midnight().assume_utc()
}

/// Accepts a plain date or a full RFC 3339 timestamp.
pub fn parse_start_date(raw: &str) -> Result<OffsetDateTime, StudyError> {
    let raw = raw.trim();
    if let Ok(stamp) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(stamp);
    }
    let day = raw
        .get(..10)
        .and_then(|prefix| Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok())
        .ok_or_else(|| StudyError::InvalidInput(format!("start_date {raw:?} is not a date")))?;
    Ok(day.with_time(Time::MIDNIGHT).assume_utc())
}

/// `stamp` moved by `days` whole days, or `InvalidInput` when that leaves the supported date range.
fn shift_days(stamp: OffsetDateTime, days: i64) -> Result<OffsetDateTime, StudyError> {
    days.checked_mul(86_400)
        .and_then(|secs| stamp.checked_add(Duration::seconds(secs)))
        .ok_or_else(|| StudyError::InvalidInput(format!("a range of {days} days is out of bounds")))
}

fn day_key(stamp: OffsetDateTime) -> String {
    let date = stamp.date();
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

pub fn week_schedule(
    conn: &Connection,
    user_id: &str,
    start: OffsetDateTime,
) -> Result<WeekSchedule, StudyError> {
    let end = shift_days(start, 7)?;
    let mut schedule = WeekSchedule::new();
    for offset in 0..7 {
        schedule.insert(day_key(shift_days(start, offset)?), Vec::new());
    }
    for session in sessions_between(conn, user_id, start, end)? {
        if let Some(day) = schedule.get_mut(&day_key(session.start_time)) {
            day.push(session);
        }
    }
    Ok(schedule)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarStats {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    /// Percentage in `0..=100`.
    pub completion_rate: f64,
    pub total_study_time_minutes: i64,
    pub total_study_time_hours: f64,
    pub sessions_by_type: BTreeMap<String, usize>,
    pub study_time_by_subject: BTreeMap<String, i64>,
    pub period_days: i64,
}

pub fn summarize(sessions: &[StudySessionRecord], period_days: i64) -> CalendarStats {
    let total_sessions = sessions.len();
    let completed_sessions = sessions.iter().filter(|s| s.completed).count();
    let total_minutes: i64 = sessions.iter().map(|s| s.duration).sum();

    let mut sessions_by_type = BTreeMap::new();
    let mut study_time_by_subject = BTreeMap::new();
    for session in sessions {
        *sessions_by_type
            .entry(session.session_type.as_str().to_string())
            .or_insert(0) += 1;
        *study_time_by_subject
            .entry(session.subject.clone())
            .or_insert(0) += session.duration;
    }

    let completion_rate = if total_sessions == 0 {
        0.0
    } else {
        completed_sessions as f64 / total_sessions as f64 * 100.0
    };

    CalendarStats {
        total_sessions,
        completed_sessions,
        completion_rate,
        total_study_time_minutes: total_minutes,
        total_study_time_hours: (total_minutes as f64 / 60.0 * 100.0).round() / 100.0,
        sessions_by_type,
        study_time_by_subject,
        period_days,
    }
}

/// Statistics for sessions that started within the last `days` days, `now` included.
pub fn stats(
    conn: &Connection,
    user_id: &str,
    now: OffsetDateTime,
    days: i64,
) -> Result<CalendarStats, StudyError> {
    if days <= 0 {
        return Err(StudyError::InvalidInput("days must be positive".into()));
    }
    let from = shift_days(now, -days)?;
    let until = now
        .checked_add(Duration::seconds(1))
        .ok_or_else(|| StudyError::InvalidInput("current time is out of bounds".into()))?;
    let sessions = sessions_between(conn, user_id, from, until)?;
    Ok(summarize(&sessions, days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::store::sessions::tests::new_session;
    use crate::store::sessions::{complete_session, create_session, SessionType};
    use crate::store::users::create_user;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    #[test]
    fn week_starts_on_monday() {
        // 2024-03-07 is a Thursday.
        assert_eq!(
            week_start(datetime!(2024-03-07 15:42 UTC)),
            datetime!(2024-03-04 00:00 UTC)
        );
        assert_eq!(
            week_start(datetime!(2024-03-04 00:00 UTC)),
            datetime!(2024-03-04 00:00 UTC)
        );
    }

    #[test]
    fn start_date_formats() {
        assert_eq!(parse_start_date("2024-03-04").unwrap(), datetime!(2024-03-04 00:00 UTC));
        assert_eq!(
            parse_start_date("2024-03-04T08:30:00Z").unwrap(),
            datetime!(2024-03-04 08:30 UTC)
        );
        assert_eq!(
            parse_start_date("2024-03-04T08:30:00").unwrap(),
            datetime!(2024-03-04 00:00 UTC)
        );
        assert!(parse_start_date("next week").is_err());
    }

    #[test]
    fn schedule_has_seven_days_and_groups_sessions() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create_user(&conn, "ada@example.com", None, "hash").unwrap();
        let monday = datetime!(2024-03-04 00:00 UTC);
        create_session(&conn, &user.id, &new_session("Math", datetime!(2024-03-05 14:00 UTC), 60, SessionType::Focus)).unwrap();
        create_session(&conn, &user.id, &new_session("Art", datetime!(2024-03-05 09:00 UTC), 30, SessionType::Review)).unwrap();
        create_session(&conn, &user.id, &new_session("Late", datetime!(2024-03-11 09:00 UTC), 30, SessionType::Review)).unwrap();

        let week = week_schedule(&conn, &user.id, monday).unwrap();
        let keys: Vec<_> = week.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["2024-03-04", "2024-03-05", "2024-03-06", "2024-03-07", "2024-03-08", "2024-03-09", "2024-03-10"]
        );
        let tuesday: Vec<_> = week["2024-03-05"].iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(tuesday, vec!["Art", "Math"]);
        assert_eq!(week.values().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn stats_over_window() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create_user(&conn, "ada@example.com", None, "hash").unwrap();
        let now = datetime!(2024-03-20 12:00 UTC);

        let done = create_session(&conn, &user.id, &new_session("Math", datetime!(2024-03-18 09:00 UTC), 50, SessionType::Focus)).unwrap();
        create_session(&conn, &user.id, &new_session("Math", datetime!(2024-03-19 09:00 UTC), 25, SessionType::Focus)).unwrap();
        create_session(&conn, &user.id, &new_session("Biology", datetime!(2024-03-19 11:00 UTC), 5, SessionType::Break)).unwrap();
        // Outside the window.
        create_session(&conn, &user.id, &new_session("Math", datetime!(2024-01-01 09:00 UTC), 90, SessionType::Focus)).unwrap();
        complete_session(&conn, &user.id, &done.id).unwrap();

        let summary = stats(&conn, &user.id, now, 30).unwrap();
        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.completed_sessions, 1);
        assert_eq!(summary.total_study_time_minutes, 80);
        assert_eq!(summary.total_study_time_hours, 1.33);
        assert_eq!(summary.sessions_by_type.get("focus"), Some(&2));
        assert_eq!(summary.study_time_by_subject.get("Math"), Some(&75));
        assert_eq!(summary.period_days, 30);
        assert!((summary.completion_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_ranges_are_invalid_input() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create_user(&conn, "ada@example.com", None, "hash").unwrap();
        let now = datetime!(2024-03-20 12:00 UTC);

        for days in [10_000_000, i64::MAX] {
            assert!(matches!(
                stats(&conn, &user.id, now, days),
                Err(StudyError::InvalidInput(_))
            ));
        }
        assert!(matches!(stats(&conn, &user.id, now, 0), Err(StudyError::InvalidInput(_))));

        let last_week = parse_start_date("9999-12-30").unwrap();
        assert!(matches!(
            week_schedule(&conn, &user.id, last_week),
            Err(StudyError::InvalidInput(_))
        ));
        let first_valid = parse_start_date("9999-12-24").unwrap();
        assert_eq!(week_schedule(&conn, &user.id, first_valid).unwrap().len(), 7);
    }

    #[test]
    fn empty_summary_has_zero_rate() {
        let summary = summarize(&[], DEFAULT_STATS_DAYS);
        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.total_study_time_hours, 0.0);
        assert!(summary.sessions_by_type.is_empty());
    }
}

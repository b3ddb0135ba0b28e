//! Next-run arithmetic for recurring backups.

use chrono::{DateTime, Days, FixedOffset, Months, NaiveDateTime, NaiveTime, TimeZone, Utc};

use agencia_check_core::BackupFrequency;

fn to_utc(local: NaiveDateTime, timezone: FixedOffset) -> DateTime<Utc> {
    timezone
        .from_local_datetime(&local)
        .single()
        .map_or_else(|| local.and_utc(), |at| at.with_timezone(&Utc))
}

/// The next time a schedule fires after `from`.
///
/// Starts from today's occurrence of `time` (in `timezone`). If that is
/// still ahead it is the answer; otherwise it moves forward one period:
/// a day, seven days, or one calendar month (clamped to the month's last
/// day).
#[must_use]
pub fn next_run(
    frequency: BackupFrequency,
    time: NaiveTime,
    from: DateTime<Utc>,
    timezone: FixedOffset,
) -> DateTime<Utc> {
    let today = from.with_timezone(&timezone).date_naive();
    let candidate = today.and_time(time);
    if to_utc(candidate, timezone) > from {
        return to_utc(candidate, timezone);
    }

    let next_date = match frequency {
        BackupFrequency::Daily => today.checked_add_days(Days::new(1)),
        BackupFrequency::Weekly => today.checked_add_days(Days::new(7)),
        BackupFrequency::Monthly => today.checked_add_months(Months::new(1)),
    }
    .unwrap_or(today);

    to_utc(next_date.and_time(time), timezone)
}

//! Backup schedule arithmetic, for checking a schedule before creating it.
//!
//! # Usage
//!
//! ```bash
//! ac-cli schedule next --frequency monthly --time 03:00 --from 2024-01-31T15:00:00Z
//! ```

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

use agencia_check_admin::services::backups::next_run;
use agencia_check_core::BackupFrequency;

/// Compute and print the next run of a schedule.
#[must_use]
pub fn next(
    frequency: BackupFrequency,
    time: NaiveTime,
    from: Option<DateTime<Utc>>,
    timezone: FixedOffset,
) -> DateTime<Utc> {
    let from = from.unwrap_or_else(Utc::now);
    let at = next_run(frequency, time, from, timezone);

    #[allow(clippy::print_stdout)]
    {
        println!("{}", at.with_timezone(&timezone).to_rfc3339());
    }
    at
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_weekly_from_fixed_instant() {
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        let from = Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap();
        let at = next(
            BackupFrequency::Weekly,
            NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            Some(from),
            brt,
        );
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 8, 5, 0, 0).unwrap());
    }
}

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar window a quota counts over. Boundaries are in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWindow {
    Hour,
    Day,
    /// ISO week, starting Monday 00:00.
    Week,
    Month,
}

impl QuotaWindow {
    /// Start of the window containing `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let day = start_of_day(now);
        match self {
            QuotaWindow::Hour => day + Duration::hours(i64::from(now.hour())),
            QuotaWindow::Day => day,
            QuotaWindow::Week => day - Duration::days(i64::from(now.weekday().num_days_from_monday())),
            QuotaWindow::Month => first_of_month(now.year(), now.month()).unwrap_or(day),
        }
    }

    /// First boundary strictly after `now`.
    ///
    /// A timestamp exactly on a boundary belongs to the window that starts there,
    /// so its reset is the following boundary.
    pub fn next_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.window_start(now);
        match self {
            QuotaWindow::Hour => start + Duration::hours(1),
            QuotaWindow::Day => start + Duration::days(1),
            QuotaWindow::Week => start + Duration::days(7),
            QuotaWindow::Month => {
                let (y, m) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                first_of_month(y, m).unwrap_or(start + Duration::days(31))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaWindow::Hour => "hour",
            QuotaWindow::Day => "day",
            QuotaWindow::Week => "week",
            QuotaWindow::Month => "month",
        }
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()))
}

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::default())))
}

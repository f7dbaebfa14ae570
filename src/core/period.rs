use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Canonical rendering of period boundaries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq)]
pub enum PeriodError {
    #[error("'{0}' is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("{date} has no {boundary} in timezone {tz}")]
    NonexistentLocalTime {
        date: NaiveDate,
        boundary: &'static str,
        tz: Tz,
    },
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Day boundary arithmetic in the configured reporting timezone.
///
/// Royalty periods are stored as UTC instants but are defined in terms of
/// calendar days in the reporting timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingClock {
    tz: Tz,
}

impl ReportingClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_name(name: &str) -> Result<Self, PeriodError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| PeriodError::UnknownTimezone(name.to_string()))
    }

    pub fn parse_date(value: &str) -> Result<NaiveDate, PeriodError> {
        NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
            .map_err(|_| PeriodError::InvalidDate(value.to_string()))
    }

    /// 00:00:00.000 local time on `date`.
    pub fn start_of_date(&self, date: NaiveDate) -> Result<DateTime<Utc>, PeriodError> {
        self.local_to_utc(date.and_time(NaiveTime::MIN), "start of day")
    }

    /// 23:59:59.000 local time on `date`. Used for query windows.
    pub fn end_of_date(&self, date: NaiveDate) -> Result<DateTime<Utc>, PeriodError> {
        let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.local_to_utc(date.and_time(time), "end of day")
    }

    /// 23:59:59.999999999 local time on `date`. Used for stored period ends;
    /// the nonzero sub-second part marks the boundary as already normalized.
    pub fn last_instant_of_date(&self, date: NaiveDate) -> Result<DateTime<Utc>, PeriodError> {
        let time = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
        self.local_to_utc(date.and_time(time), "end of day")
    }

    /// Calendar date of `instant` in the reporting timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// `YYYY-MM-DD` rendering of `instant` in the reporting timezone.
    pub fn format_date(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).format(DATE_FORMAT).to_string()
    }

    pub fn start_of_day(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, PeriodError> {
        self.start_of_date(self.local_date(instant))
    }

    pub fn end_of_day(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, PeriodError> {
        self.last_instant_of_date(self.local_date(instant))
    }

    fn local_to_utc(
        &self,
        local: NaiveDateTime,
        boundary: &'static str,
    ) -> Result<DateTime<Utc>, PeriodError> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            // Ambiguous wall time (DST fall-back): the earlier instant for a
            // start, the later one for an end keeps the whole day covered.
            LocalResult::Ambiguous(early, late) => {
                let dt = if local.hour() == 0 { early } else { late };
                Ok(dt.with_timezone(&Utc))
            }
            LocalResult::None => Err(PeriodError::NonexistentLocalTime {
                date: local.date(),
                boundary,
                tz: self.tz,
            }),
        }
    }
}

impl Default for ReportingClock {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}

/// True when `instant` carries a sub-second component.
pub fn has_subsecond(instant: DateTime<Utc>) -> bool {
    instant.nanosecond() != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moscow() -> ReportingClock {
        ReportingClock::from_name("Europe/Moscow").unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            ReportingClock::parse_date("2021-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 31).unwrap()
        );
        assert!(ReportingClock::parse_date("not-a-date").is_err());
        assert!(ReportingClock::parse_date("2021-02-30").is_err());
    }

    #[test]
    fn test_unknown_timezone() {
        assert_eq!(
            ReportingClock::from_name("Mars/Olympus"),
            Err(PeriodError::UnknownTimezone("Mars/Olympus".to_string()))
        );
    }

    #[test]
    fn test_day_boundaries_in_reporting_tz() {
        let clock = moscow();
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();

        let start = clock.start_of_date(date).unwrap();
        assert_eq!(start.to_rfc3339(), "2020-12-31T21:00:00+00:00");

        let end = clock.end_of_date(date).unwrap();
        assert_eq!(end.to_rfc3339(), "2021-01-01T20:59:59+00:00");

        let last = clock.last_instant_of_date(date).unwrap();
        assert_eq!(last.nanosecond(), 999_999_999);
        assert_eq!(clock.format_date(last), "2021-01-01");
    }

    #[test]
    fn test_format_uses_local_date() {
        let clock = moscow();
        let instant = Utc.with_ymd_and_hms(2021, 1, 31, 22, 0, 0).unwrap();
        assert_eq!(clock.format_date(instant), "2021-02-01");
    }

    #[test]
    fn test_snap_to_day_boundaries() {
        let clock = moscow();
        let instant = Utc.with_ymd_and_hms(2021, 3, 10, 12, 30, 15).unwrap();
        assert_eq!(
            clock.start_of_day(instant).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 9, 21, 0, 0).unwrap()
        );
        assert!(has_subsecond(clock.end_of_day(instant).unwrap()));
        assert!(!has_subsecond(instant));
    }
}

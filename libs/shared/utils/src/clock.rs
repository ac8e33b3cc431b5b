use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use tracing::warn;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clock seen through the clinic's wall-clock offset. Appointment timestamps are
/// clinic-local, audit timestamps are UTC.
#[derive(Clone)]
pub struct ClinicClock {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn new(clock: Arc<dyn Clock>, utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!("Invalid clinic UTC offset of {} minutes, using UTC", utc_offset_minutes);
                Utc.fix()
            });

        Self { clock, offset }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.offset).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn local_time_applies_offset() {
        let utc = Utc.with_ymd_and_hms(2030, 1, 7, 2, 0, 0).unwrap();
        let clock = ClinicClock::new(Arc::new(FixedClock::new(utc)), -180);

        assert_eq!(clock.local_now().to_string(), "2030-01-06 23:00:00");
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2030, 1, 6).unwrap());
        assert_eq!(clock.now_utc(), utc);
    }

    #[test]
    fn fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(3));
        assert_eq!(clock.now(), start + Duration::hours(3));
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let utc = Utc.with_ymd_and_hms(2030, 1, 7, 2, 0, 0).unwrap();
        let clock = ClinicClock::new(Arc::new(FixedClock::new(utc)), 48 * 60);
        assert_eq!(clock.local_now(), utc.naive_utc());

        for minutes in [i32::MAX, i32::MIN] {
            let clock = ClinicClock::new(Arc::new(FixedClock::new(utc)), minutes);
            assert_eq!(clock.local_now(), utc.naive_utc());
        }
    }
}

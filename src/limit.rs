use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::{
    account::AccountNumber,
    store::{StoreError, TransferHistory},
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to, for pinning time in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Daily outgoing limit, evaluated on calendar dates of a fixed UTC offset.
///
/// A date covers the half-open range `[local midnight, next local midnight)`,
/// so a transfer at 23:59:59 and one at 00:00:01 always land on different days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    daily_limit: Decimal,
    offset: FixedOffset,
}

impl LimitPolicy {
    pub fn new(daily_limit: Decimal, offset: FixedOffset) -> Self {
        Self {
            daily_limit,
            offset,
        }
    }

    pub fn daily_limit(&self) -> Decimal {
        self.daily_limit
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn calendar_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// UTC bounds of `date`, end exclusive.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc_midnight =
            local_midnight - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        let start = Utc.from_utc_datetime(&utc_midnight);
        (start, start + TimeDelta::days(1))
    }

    /// Whether `amount` fits on top of what was already sent today.
    pub fn permits(&self, transferred_today: Decimal, amount: Decimal) -> bool {
        transferred_today
            .checked_add(amount)
            .is_some_and(|total| total <= self.daily_limit)
    }
}

/// Sum of successful outgoing transfers of `account` on `date`. Zero when there are none.
pub fn daily_transferred_total<H>(
    history: &H,
    policy: &LimitPolicy,
    account: &AccountNumber,
    date: NaiveDate,
) -> Result<Decimal, StoreError>
where
    H: TransferHistory + ?Sized,
{
    let (start, end) = policy.day_bounds(date);
    history.transferred_between(account, start, end)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn calendar_date_follows_offset() {
        let utc = LimitPolicy::new(dec!(5000.00), FixedOffset::east_opt(0).unwrap());
        let ist = LimitPolicy::new(dec!(5000.00), FixedOffset::east_opt(19_800).unwrap());
        let late = at("2024-03-10T23:59:59Z");
        let early = at("2024-03-11T00:00:01Z");

        assert_eq!(utc.calendar_date(late), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(utc.calendar_date(early), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        // +05:30 has already rolled over
        assert_eq!(ist.calendar_date(late), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn day_bounds_are_half_open() {
        let ist = LimitPolicy::new(dec!(5000.00), FixedOffset::east_opt(19_800).unwrap());
        let date = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let (start, end) = ist.day_bounds(date);
        assert_eq!(start, at("2024-03-10T18:30:00Z"));
        assert_eq!(end, at("2024-03-11T18:30:00Z"));
        assert_eq!(ist.calendar_date(start), date);
        assert_ne!(ist.calendar_date(end), date);
    }

    #[test]
    fn permits_up_to_limit() {
        let policy = LimitPolicy::new(dec!(5000.00), FixedOffset::east_opt(0).unwrap());
        assert!(policy.permits(dec!(0), dec!(5000.00)));
        assert!(policy.permits(dec!(3000.00), dec!(2000.00)));
        assert!(!policy.permits(dec!(3000.00), dec!(2500.00)));
        assert!(!policy.permits(Decimal::MAX, dec!(1)));
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(at("2024-03-10T12:00:00Z"));
        clock.advance(TimeDelta::hours(1));
        assert_eq!(clock.now(), at("2024-03-10T13:00:00Z"));
        clock.set(at("2024-01-01T00:00:00Z"));
        assert_eq!(clock.now(), at("2024-01-01T00:00:00Z"));
    }
}

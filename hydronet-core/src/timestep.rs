use chrono::{Datelike, NaiveDateTime, TimeDelta};
use thiserror::Error;

pub type TimestepIndex = usize;

const SECONDS_IN_DAY: f64 = 86_400.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimestepError {
    #[error("Timestep duration must be positive; found {0}")]
    NonPositiveDuration(TimeDelta),
    #[error("Start date `{start}` is after the end date `{end}`")]
    StartAfterEnd { start: NaiveDateTime, end: NaiveDateTime },
}

/// A single simulation instant and the length of time it represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timestep {
    pub date: NaiveDateTime,
    pub index: TimestepIndex,
    pub duration: TimeDelta,
}

impl Timestep {
    pub fn new(date: NaiveDateTime, index: TimestepIndex, duration: TimeDelta) -> Self {
        Self { date, index, duration }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Length of the time-step in (fractional) days.
    pub fn days(&self) -> f64 {
        self.duration.num_milliseconds() as f64 / 1000.0 / SECONDS_IN_DAY
    }

    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

#[derive(Debug, Clone)]
pub struct Timestepper {
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: TimeDelta,
}

impl Timestepper {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, step: TimeDelta) -> Self {
        Self { start, end, step }
    }

    /// Create the time-steps between the start and end dates (inclusive).
    fn timesteps(&self) -> Result<Vec<Timestep>, TimestepError> {
        if self.step <= TimeDelta::zero() {
            return Err(TimestepError::NonPositiveDuration(self.step));
        }
        if self.start > self.end {
            return Err(TimestepError::StartAfterEnd {
                start: self.start,
                end: self.end,
            });
        }

        let mut timesteps = Vec::new();
        let mut date = self.start;
        while date <= self.end {
            timesteps.push(Timestep::new(date, timesteps.len(), self.step));
            date += self.step;
        }
        Ok(timesteps)
    }
}

/// The time domain that a network will be simulated over.
#[derive(Debug, Clone)]
pub struct TimeDomain {
    timesteps: Vec<Timestep>,
}

impl TimeDomain {
    pub fn timesteps(&self) -> &[Timestep] {
        &self.timesteps
    }

    pub fn first(&self) -> Option<&Timestep> {
        self.timesteps.first()
    }

    /// The total number of time-steps in the domain.
    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }
}

impl TryFrom<Timestepper> for TimeDomain {
    type Error = TimestepError;

    fn try_from(value: Timestepper) -> Result<Self, Self::Error> {
        Ok(Self {
            timesteps: value.timesteps()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeDomain, TimestepError, Timestepper};
    use chrono::{NaiveDate, TimeDelta};
    use float_cmp::assert_approx_eq;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_timesteps() {
        let domain: TimeDomain = Timestepper::new(date(2020, 12, 30), date(2021, 1, 2), TimeDelta::days(1))
            .try_into()
            .unwrap();

        assert_eq!(domain.len(), 4);
        let ts = domain.timesteps()[2];
        assert_eq!(ts.index, 2);
        assert_eq!(ts.year(), 2021);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 1);
        assert_eq!(ts.day_of_year(), 1);
        assert_approx_eq!(f64, ts.days(), 1.0);
        assert!(domain.first().unwrap().is_first());
    }

    #[test]
    fn test_multi_day_and_sub_day_durations() {
        let domain: TimeDomain = Timestepper::new(date(2020, 1, 1), date(2020, 1, 31), TimeDelta::days(7))
            .try_into()
            .unwrap();
        assert_eq!(domain.len(), 5);
        assert_approx_eq!(f64, domain.timesteps()[0].days(), 7.0);

        let domain: TimeDomain = Timestepper::new(date(2020, 1, 1), date(2020, 1, 1), TimeDelta::hours(6))
            .try_into()
            .unwrap();
        assert_eq!(domain.len(), 1);
        assert_approx_eq!(f64, domain.timesteps()[0].days(), 0.25);
    }

    #[test]
    fn test_invalid_timestepper() {
        let result: Result<TimeDomain, _> =
            Timestepper::new(date(2020, 1, 1), date(2020, 1, 2), TimeDelta::zero()).try_into();
        assert!(matches!(result, Err(TimestepError::NonPositiveDuration(_))));

        let result: Result<TimeDomain, _> =
            Timestepper::new(date(2020, 1, 2), date(2020, 1, 1), TimeDelta::days(1)).try_into();
        assert!(matches!(result, Err(TimestepError::StartAfterEnd { .. })));
    }
}

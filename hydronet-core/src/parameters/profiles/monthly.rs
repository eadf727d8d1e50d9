use crate::parameters::{Parameter, ParameterCalculationError, ParameterMeta};
use crate::scenario::ScenarioIndex;
use crate::timestep::Timestep;
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Which day of the month each profile value is anchored to when interpolating.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MonthlyInterpDay {
    First,
    Last,
}

/// A value for each calendar month, optionally interpolated daily between months.
pub struct MonthlyProfileParameter {
    meta: ParameterMeta,
    values: [f64; 12],
    interp_day: Option<MonthlyInterpDay>,
}

impl MonthlyProfileParameter {
    pub fn new(name: &str, values: [f64; 12], interp_day: Option<MonthlyInterpDay>) -> Self {
        Self {
            meta: ParameterMeta::new(name),
            values,
            interp_day,
        }
    }
}

fn days_in_year_month(datetime: &NaiveDateTime) -> u32 {
    match datetime.month() {
        4 | 6 | 9 | 11 => 30,
        2 if datetime.date().leap_year() => 29,
        2 => 28,
        _ => 31,
    }
}

fn fraction_of_day(date: &NaiveDateTime) -> f64 {
    date.num_seconds_from_midnight() as f64 / 86400.0
}

/// The second value corresponds to the first day of the next month.
fn interpolate_first(date: &NaiveDateTime, first_value: f64, last_value: f64) -> f64 {
    let days_in_month = days_in_year_month(date) as f64;
    let elapsed = date.day() as f64 - 1.0 + fraction_of_day(date);
    first_value + (last_value - first_value) * elapsed / days_in_month
}

/// The first value corresponds to the last day of the previous month.
fn interpolate_last(date: &NaiveDateTime, first_value: f64, last_value: f64) -> f64 {
    let days_in_month = days_in_year_month(date);
    if date.day() >= days_in_month {
        return last_value;
    }
    let elapsed = date.day() as f64 + fraction_of_day(date);
    first_value + (last_value - first_value) * elapsed / days_in_month as f64
}

impl Parameter for MonthlyProfileParameter {
    fn meta(&self) -> &ParameterMeta {
        &self.meta
    }

    fn compute(&self, timestep: &Timestep, _scenario_index: &ScenarioIndex) -> Result<f64, ParameterCalculationError> {
        let month0 = timestep.date.month0() as usize;

        let value = match self.interp_day {
            Some(MonthlyInterpDay::First) => {
                let next_month0 = (month0 + 1) % 12;
                interpolate_first(&timestep.date, self.values[month0], self.values[next_month0])
            }
            Some(MonthlyInterpDay::Last) => {
                let prev_month0 = (month0 + 11) % 12;
                interpolate_last(&timestep.date, self.values[prev_month0], self.values[month0])
            }
            None => self.values[month0],
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{MonthlyInterpDay, MonthlyProfileParameter};
    use crate::parameters::Parameter;
    use crate::scenario::ScenarioIndex;
    use crate::timestep::{TimeDomain, Timestepper};
    use chrono::{NaiveDate, TimeDelta};
    use float_cmp::assert_approx_eq;

    fn domain(start: (i32, u32, u32), end: (i32, u32, u32)) -> TimeDomain {
        let start = NaiveDate::from_ymd_opt(start.0, start.1, start.2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(end.0, end.1, end.2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Timestepper::new(start, end, TimeDelta::days(1)).try_into().unwrap()
    }

    #[test]
    fn test_monthly_profile() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let p = MonthlyProfileParameter::new("profile", values, None);
        let si = ScenarioIndex::default();

        for ts in domain((2020, 1, 1), (2020, 12, 31)).timesteps() {
            assert_approx_eq!(f64, p.compute(ts, &si).unwrap(), ts.month() as f64);
        }
    }

    #[test]
    fn test_interpolate_first() {
        let mut values = [0.0; 12];
        values[0] = 0.0;
        values[1] = 31.0;
        let p = MonthlyProfileParameter::new("profile", values, Some(MonthlyInterpDay::First));
        let si = ScenarioIndex::default();

        let domain = domain((2021, 1, 1), (2021, 2, 1));
        for ts in domain.timesteps() {
            assert_approx_eq!(f64, p.compute(ts, &si).unwrap(), ts.index as f64);
        }
    }

    #[test]
    fn test_interpolate_last() {
        let mut values = [0.0; 12];
        values[11] = 0.0;
        values[0] = 31.0;
        let p = MonthlyProfileParameter::new("profile", values, Some(MonthlyInterpDay::Last));
        let si = ScenarioIndex::default();

        let domain = domain((2021, 1, 1), (2021, 1, 31));
        let computed: Vec<f64> = domain.timesteps().iter().map(|ts| p.compute(ts, &si).unwrap()).collect();
        assert_approx_eq!(f64, computed[0], 1.0);
        assert_approx_eq!(f64, computed[14], 15.0);
        assert_approx_eq!(f64, computed[30], 31.0);
    }
}

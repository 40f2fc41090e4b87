//! Time axes in decimal years.
//!
//! Monthly points are stored as `year + (month - 1) / 12`, computed from an
//! integer month count so that January of a year is exactly the integer year
//! and annual and monthly axes share their common points bit for bit.

use crate::errors::{TLMError, TLMResult};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
pub type Time = f64;

/// Tolerance used when matching time points.
const TIME_TOLERANCE: Time = 1e-6;

/// Supported resampling frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Start of each year
    Annual,
    /// Start of each month
    Monthly,
}

impl Frequency {
    /// Spacing between points in years.
    pub fn step(&self) -> Time {
        match self {
            Frequency::Annual => 1.0,
            Frequency::Monthly => 1.0 / 12.0,
        }
    }

    fn months_per_step(&self) -> i64 {
        match self {
            Frequency::Annual => 12,
            Frequency::Monthly => 1,
        }
    }
}

/// Ordered, strictly increasing time points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    values: Array1<Time>,
}

impl TimeAxis {
    /// Creates a time axis from its points.
    ///
    /// # Errors
    ///
    /// [`TLMError::InvalidTimeAxis`] unless the values are finite and
    /// strictly increasing.
    pub fn try_from_values(values: Array1<Time>) -> TLMResult<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TLMError::InvalidTimeAxis(
                "time values must be finite".to_string(),
            ));
        }
        if values.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(TLMError::InvalidTimeAxis(
                "time values must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { values })
    }

    /// An axis without time points.
    pub fn empty() -> Self {
        Self {
            values: Array1::zeros(0),
        }
    }

    /// Start of each year from `start_year` to `end_year` inclusive.
    pub fn annual(start_year: i32, end_year: i32) -> Self {
        Self::from_month_counts(
            i64::from(start_year) * 12,
            i64::from(end_year) * 12,
            Frequency::Annual,
        )
    }

    /// Start of each month from January `start_year` to January `end_year`
    /// inclusive.
    pub fn monthly(start_year: i32, end_year: i32) -> Self {
        Self::from_month_counts(
            i64::from(start_year) * 12,
            i64::from(end_year) * 12,
            Frequency::Monthly,
        )
    }

    fn from_month_counts(first: i64, last: i64, frequency: Frequency) -> Self {
        let step = frequency.months_per_step() as usize;
        let values: Vec<Time> = (first..=last)
            .step_by(step)
            .map(|months| months as Time / 12.0)
            .collect();
        Self {
            values: Array1::from(values),
        }
    }

    pub fn values(&self) -> ArrayView1<Time> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Time> {
        self.values.get(index).copied()
    }

    pub fn first(&self) -> Option<Time> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<Time> {
        self.values.last().copied()
    }

    /// Index of the point matching `time` within a small tolerance.
    pub fn index_of(&self, time: Time) -> Option<usize> {
        self.values
            .iter()
            .position(|v| (v - time).abs() < TIME_TOLERANCE)
    }

    /// Index of the first point that falls in the given calendar month.
    pub fn position(&self, year: i32, month: u32) -> Option<usize> {
        self.values
            .iter()
            .position(|&t| year_month(t) == (year, month))
    }

    /// The constant spacing between points, in years.
    ///
    /// # Errors
    ///
    /// [`TLMError::InvalidTimeAxis`] if there are fewer than two points or
    /// the spacing is not constant.
    pub fn regular_step(&self) -> TLMResult<Time> {
        if self.len() < 2 {
            return Err(TLMError::InvalidTimeAxis(format!(
                "at least two time points are required, got {}",
                self.len()
            )));
        }
        let step = self.values[1] - self.values[0];
        let irregular = self
            .values
            .windows(2)
            .into_iter()
            .any(|w| ((w[1] - w[0]) - step).abs() > TIME_TOLERANCE * step.max(1.0));
        if irregular {
            return Err(TLMError::InvalidTimeAxis(
                "time points are not evenly spaced".to_string(),
            ));
        }
        Ok(step)
    }

    /// Points at `frequency` spanning the same period as this axis.
    ///
    /// Only points that fall inside the current span are kept, so an annual
    /// axis resampled to monthly ends in January of its last year.
    pub fn resample(&self, frequency: Frequency) -> TLMResult<Self> {
        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(TLMError::InvalidTimeAxis(
                    "cannot resample an empty time axis".to_string(),
                ))
            }
        };
        let per_step = frequency.months_per_step();
        let first_months = ((first * 12.0 - TIME_TOLERANCE) / per_step as Time).ceil() as i64 * per_step;
        let last_months = ((last * 12.0 + TIME_TOLERANCE) / per_step as Time).floor() as i64 * per_step;
        if last_months < first_months {
            return Err(TLMError::InvalidTimeAxis(format!(
                "no {frequency:?} points between {first} and {last}"
            )));
        }
        Ok(Self::from_month_counts(first_months, last_months, frequency))
    }
}

impl TryFrom<Vec<Time>> for TimeAxis {
    type Error = TLMError;

    fn try_from(values: Vec<Time>) -> TLMResult<Self> {
        Self::try_from_values(Array1::from(values))
    }
}

/// Calendar `(year, month)` containing the decimal-year point `t`.
pub fn year_month(t: Time) -> (i32, u32) {
    let months = (t * 12.0 + TIME_TOLERANCE).floor() as i64;
    (months.div_euclid(12) as i32, months.rem_euclid(12) as u32 + 1)
}

/// Linear interpolation of `values` sampled at `times`.
///
/// Returns `None` if `target` lies outside the sampled range.
pub fn interpolate(times: ArrayView1<Time>, values: ArrayView1<FloatValue>, target: Time) -> Option<FloatValue> {
    let n = times.len();
    if n == 0 || n != values.len() {
        return None;
    }
    if (target - times[0]).abs() < TIME_TOLERANCE {
        return Some(values[0]);
    }
    if (target - times[n - 1]).abs() < TIME_TOLERANCE {
        return Some(values[n - 1]);
    }
    if target < times[0] || target > times[n - 1] {
        return None;
    }

    // First index with times[i] >= target
    let upper = times.iter().position(|&t| t >= target)?;
    if upper == 0 {
        return Some(values[0]);
    }
    let lower = upper - 1;
    let fraction = (target - times[lower]) / (times[upper] - times[lower]);
    Some(values[lower] + fraction * (values[upper] - values[lower]))
}

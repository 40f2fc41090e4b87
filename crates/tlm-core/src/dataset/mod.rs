//! Labelled, multi-scenario timeseries.
//!
//! A dataset is a table with one row per timeseries on a shared
//! [`TimeAxis`]. Rows are identified by their [`Metadata`] (scenario, model,
//! variable, unit, region and optionally climate model).
//!
//! The operations the model needs are expressed by the [`LabeledTimeseries`]
//! trait so that the scenario runner can work on any container providing
//! them. [`ScenarioDataset`] is the in-memory implementation.

pub mod metadata;

pub use metadata::{
    MetaColumn, MetaFilter, Metadata, CLIMATE_MODEL, MODEL, REGION, REQUIRED_FIELDS, SCENARIO,
    UNIT, VARIABLE,
};

use crate::errors::{TLMError, TLMResult};
use crate::timeseries::{interpolate, year_month, FloatValue, Frequency, TimeAxis};
use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Absolute tolerance used by [`ScenarioDataset::allclose`] for values near zero.
const ALLCLOSE_ATOL: FloatValue = 1e-12;

/// Operations on a labelled timeseries container.
///
/// Implementors provide the raw parts; everything else has a default
/// implementation in terms of them.
pub trait LabeledTimeseries: Sized {
    fn time_axis(&self) -> &TimeAxis;

    /// Metadata of every row, in row order.
    fn metadata(&self) -> &[Metadata];

    /// Values with shape `(rows, time points)`.
    fn values(&self) -> ArrayView2<FloatValue>;

    /// Builds a container, validating shapes and metadata.
    fn from_parts(
        values: Array2<FloatValue>,
        time_axis: TimeAxis,
        metadata: Vec<Metadata>,
    ) -> TLMResult<Self>;

    fn len(&self) -> usize {
        self.metadata().len()
    }

    fn is_empty(&self) -> bool {
        self.metadata().is_empty()
    }

    /// Distinct values of `field` in order of first appearance.
    fn meta_values(&self, field: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.metadata()
            .iter()
            .filter_map(|m| m.get(field))
            .filter(|value| seen.insert(*value))
            .map(str::to_string)
            .collect()
    }

    /// The single value of `field` shared by every row.
    ///
    /// # Errors
    ///
    /// [`TLMError::MetadataNotUnique`] if the field has zero or several values.
    fn get_unique_meta(&self, field: &str) -> TLMResult<String> {
        let values = self.meta_values(field);
        match values.as_slice() {
            [value] => Ok(value.clone()),
            _ => Err(TLMError::MetadataNotUnique {
                field: field.to_string(),
                values,
            }),
        }
    }

    /// Rows at `indices`, in the given order.
    fn select_rows(&self, indices: &[usize]) -> TLMResult<Self> {
        let values = self.values().select(Axis(0), indices);
        let metadata = indices
            .iter()
            .map(|&i| self.metadata()[i].clone())
            .collect();
        Self::from_parts(values, self.time_axis().clone(), metadata)
    }

    /// Rows selected by `filter`. The result may be empty.
    fn filter(&self, filter: &MetaFilter) -> TLMResult<Self> {
        let indices: Vec<usize> = self
            .metadata()
            .iter()
            .enumerate()
            .filter(|(_, m)| filter.selects(m))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&indices)
    }

    /// Splits the rows by the value of `field`, in order of first appearance.
    ///
    /// # Errors
    ///
    /// [`TLMError::MissingMetadata`] if a row lacks `field`.
    fn groupby(&self, field: &str) -> TLMResult<Vec<(String, Self)>> {
        if self.metadata().iter().any(|m| !m.contains(field)) {
            return Err(TLMError::MissingMetadata {
                field: field.to_string(),
            });
        }
        self.meta_values(field)
            .into_iter()
            .map(|value| {
                let group = self.filter(&MetaFilter::new().field(field, &value))?;
                Ok((value, group))
            })
            .collect()
    }

    /// Linearly interpolates every row onto `frequency` over the same period.
    fn resample(&self, frequency: Frequency) -> TLMResult<Self> {
        let target = self.time_axis().resample(frequency)?;
        log::debug!(
            "Resampling {} timeseries from {} to {} time points",
            self.len(),
            self.time_axis().len(),
            target.len()
        );

        let source_times = self.time_axis().values();
        let mut values = Array2::zeros((self.len(), target.len()));
        for (mut out_row, in_row) in values.outer_iter_mut().zip(self.values().outer_iter()) {
            for (out, &t) in out_row.iter_mut().zip(target.values().iter()) {
                *out = interpolate(source_times, in_row, t).ok_or_else(|| {
                    TLMError::InvalidTimeAxis(format!("{t} is outside the source time axis"))
                })?;
            }
        }
        Self::from_parts(values, target, self.metadata().to_vec())
    }

    fn timeseries(&self, index: usize) -> Option<ArrayView1<FloatValue>> {
        (index < self.len()).then(|| self.values().index_axis_move(Axis(0), index))
    }

    /// Values of the only row.
    ///
    /// # Errors
    ///
    /// [`TLMError::ShapeMismatch`] unless there is exactly one row.
    fn single_timeseries(&self) -> TLMResult<ArrayView1<FloatValue>> {
        match self.len() {
            1 => Ok(self.values().index_axis_move(Axis(0), 0)),
            n => Err(TLMError::ShapeMismatch {
                context: "single timeseries".to_string(),
                expected: 1,
                actual: n,
            }),
        }
    }

    /// Stacks the rows of several containers sharing one time axis.
    fn concat(datasets: Vec<Self>) -> TLMResult<Self> {
        let time_axis = match datasets.first() {
            Some(first) => first.time_axis().clone(),
            None => TimeAxis::empty(),
        };
        if let Some(other) = datasets.iter().find(|d| d.time_axis() != &time_axis) {
            return Err(TLMError::ShapeMismatch {
                context: "concatenated time axes".to_string(),
                expected: time_axis.len(),
                actual: other.time_axis().len(),
            });
        }

        let views: Vec<ArrayView2<FloatValue>> = datasets.iter().map(|d| d.values()).collect();
        let values = if views.is_empty() {
            Array2::zeros((0, time_axis.len()))
        } else {
            concatenate(Axis(0), &views).map_err(|e| TLMError::ShapeMismatch {
                context: format!("concatenated values ({e})"),
                expected: time_axis.len(),
                actual: 0,
            })?
        };
        let metadata = datasets
            .iter()
            .flat_map(|d| d.metadata().iter().cloned())
            .collect();
        Self::from_parts(values, time_axis, metadata)
    }
}

/// In-memory labelled timeseries table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDataset {
    values: Array2<FloatValue>,
    time_axis: TimeAxis,
    metadata: Vec<Metadata>,
}

impl ScenarioDataset {
    /// Creates a dataset from values, a time axis and per-row metadata.
    ///
    /// # Errors
    ///
    /// - [`TLMError::ShapeMismatch`] if the values do not match the number of
    ///   rows or time points
    /// - [`TLMError::MissingMetadata`] if a row lacks a required field
    /// - [`TLMError::DuplicateMetadata`] if two rows share the same metadata
    pub fn new(
        values: Array2<FloatValue>,
        time_axis: TimeAxis,
        metadata: Vec<Metadata>,
    ) -> TLMResult<Self> {
        let (rows, columns) = values.dim();
        if rows != metadata.len() {
            return Err(TLMError::ShapeMismatch {
                context: "rows".to_string(),
                expected: metadata.len(),
                actual: rows,
            });
        }
        if columns != time_axis.len() {
            return Err(TLMError::ShapeMismatch {
                context: "time points".to_string(),
                expected: time_axis.len(),
                actual: columns,
            });
        }
        if let Some(field) = metadata.iter().find_map(|m| m.missing_required().first().copied()) {
            return Err(TLMError::MissingMetadata {
                field: field.to_string(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = metadata.iter().find(|m| !seen.insert(*m)) {
            return Err(TLMError::DuplicateMetadata(duplicate.to_string()));
        }

        Ok(Self {
            values,
            time_axis,
            metadata,
        })
    }

    /// Creates a dataset from named metadata columns.
    ///
    /// Scalar columns are broadcast to every row.
    ///
    /// ```
    /// use ndarray::array;
    /// use tlm_core::dataset::{LabeledTimeseries, ScenarioDataset};
    /// use tlm_core::timeseries::TimeAxis;
    ///
    /// let dataset = ScenarioDataset::from_columns(
    ///     array![[0.0, 1.0, 2.0], [0.0, 0.5, 1.0]],
    ///     TimeAxis::annual(2000, 2002),
    ///     [
    ///         ("scenario", vec!["high", "low"].into()),
    ///         ("model", "unspecified".into()),
    ///         ("variable", "Effective Radiative Forcing".into()),
    ///         ("unit", "W/m^2".into()),
    ///         ("region", "World".into()),
    ///     ],
    /// )
    /// .unwrap();
    /// assert_eq!(dataset.meta_values("scenario"), vec!["high", "low"]);
    /// ```
    pub fn from_columns<'a>(
        values: Array2<FloatValue>,
        time_axis: TimeAxis,
        columns: impl IntoIterator<Item = (&'a str, MetaColumn)>,
    ) -> TLMResult<Self> {
        let rows = values.nrows();
        let mut metadata = vec![Metadata::new(); rows];
        for (field, column) in columns {
            if let Some(len) = column.len() {
                if len != rows {
                    return Err(TLMError::ShapeMismatch {
                        context: format!("metadata column `{field}`"),
                        expected: rows,
                        actual: len,
                    });
                }
            }
            for (row, m) in metadata.iter_mut().enumerate() {
                if let Some(value) = column.value(row) {
                    m.insert(field, value);
                }
            }
        }
        Self::new(values, time_axis, metadata)
    }

    /// Keeps the time points that fall in `year` (and `month`, if given).
    pub fn filter_time(&self, year: i32, month: Option<u32>) -> TLMResult<Self> {
        let columns: Vec<usize> = self
            .time_axis
            .values()
            .iter()
            .enumerate()
            .filter(|(_, &t)| {
                let (y, m) = year_month(t);
                y == year && month.map_or(true, |month| month == m)
            })
            .map(|(i, _)| i)
            .collect();

        let times = self.time_axis.values().select(Axis(0), &columns);
        Self::new(
            self.values.select(Axis(1), &columns),
            TimeAxis::try_from_values(times)?,
            self.metadata.clone(),
        )
    }

    /// Sets `field` to `value` on every row.
    pub fn set_meta(&self, field: &str, value: &str) -> TLMResult<Self> {
        let metadata = self
            .metadata
            .iter()
            .cloned()
            .map(|m| m.with(field, value))
            .collect();
        Self::new(self.values.clone(), self.time_axis.clone(), metadata)
    }

    /// Multiplies every value by `factor`. Units are left untouched.
    #[must_use]
    pub fn scale(&self, factor: FloatValue) -> Self {
        Self {
            values: &self.values * factor,
            time_axis: self.time_axis.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Compares two datasets row by row, matching rows by metadata.
    ///
    /// Rows may be in a different order. Values agree when
    /// `|a - b| <= rtol * max(|a|, |b|)` (or both are negligibly small).
    pub fn allclose(&self, other: &Self, rtol: FloatValue) -> bool {
        if self.len() != other.len() || self.time_axis.len() != other.time_axis.len() {
            return false;
        }
        let times_match = self
            .time_axis
            .values()
            .iter()
            .zip(other.time_axis.values().iter())
            .all(|(a, b)| (a - b).abs() < 1e-6);
        if !times_match {
            return false;
        }

        self.metadata.iter().enumerate().all(|(i, m)| {
            match other.metadata.iter().position(|o| o == m) {
                Some(j) => self
                    .values
                    .row(i)
                    .iter()
                    .zip(other.values.row(j).iter())
                    .all(|(&a, &b)| {
                        let diff = (a - b).abs();
                        diff <= rtol * a.abs().max(b.abs()) || diff <= ALLCLOSE_ATOL
                    }),
                None => false,
            }
        })
    }
}

impl LabeledTimeseries for ScenarioDataset {
    fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    fn values(&self) -> ArrayView2<FloatValue> {
        self.values.view()
    }

    fn from_parts(
        values: Array2<FloatValue>,
        time_axis: TimeAxis,
        metadata: Vec<Metadata>,
    ) -> TLMResult<Self> {
        Self::new(values, time_axis, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn forcing_dataset() -> ScenarioDataset {
        ScenarioDataset::from_columns(
            array![
                [0.0, 1.0, 2.0, 3.0],
                [0.0, 0.5, 1.0, 1.5],
                [0.0, 0.1, 0.2, 0.3],
            ],
            TimeAxis::annual(2000, 2003),
            [
                (SCENARIO, vec!["high", "low", "high"].into()),
                (MODEL, "unspecified".into()),
                (
                    VARIABLE,
                    vec![
                        "Effective Radiative Forcing",
                        "Effective Radiative Forcing",
                        "Effective Radiative Forcing|CO2",
                    ]
                    .into(),
                ),
                (UNIT, "W/m^2".into()),
                (REGION, "World".into()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_construction_validates_shape() {
        let result = ScenarioDataset::new(
            array![[0.0, 1.0]],
            TimeAxis::annual(2000, 2002),
            vec![Metadata::new()],
        );
        assert!(matches!(
            result,
            Err(TLMError::ShapeMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_construction_requires_metadata() {
        let result = ScenarioDataset::from_columns(
            array![[0.0, 1.0]],
            TimeAxis::annual(2000, 2001),
            [(SCENARIO, "a".into()), (MODEL, "m".into())],
        );
        assert_eq!(
            result.unwrap_err(),
            TLMError::MissingMetadata {
                field: VARIABLE.to_string()
            }
        );
    }

    #[test]
    fn test_construction_rejects_duplicates() {
        let dataset = forcing_dataset();
        let duplicated = ScenarioDataset::concat(vec![dataset.clone(), dataset]);
        assert!(matches!(duplicated, Err(TLMError::DuplicateMetadata(_))));
    }

    #[test]
    fn test_unique_meta() {
        let dataset = forcing_dataset();
        assert_eq!(dataset.get_unique_meta(UNIT).unwrap(), "W/m^2");

        match dataset.get_unique_meta(SCENARIO) {
            Err(TLMError::MetadataNotUnique { field, values }) => {
                assert_eq!(field, SCENARIO);
                assert_eq!(values, vec!["high", "low"]);
            }
            other => panic!("expected MetadataNotUnique, got {other:?}"),
        }
        assert!(dataset.get_unique_meta(CLIMATE_MODEL).is_err());
    }

    #[test]
    fn test_filter() {
        let dataset = forcing_dataset();
        let erf = dataset
            .filter(&MetaFilter::new().field(VARIABLE, "Effective Radiative Forcing"))
            .unwrap();
        assert_eq!(erf.len(), 2);

        let rest = dataset
            .filter(
                &MetaFilter::new()
                    .field(VARIABLE, "Effective Radiative Forcing")
                    .keep(false),
            )
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.get_unique_meta(VARIABLE).unwrap(), "Effective Radiative Forcing|CO2");

        let none = dataset
            .filter(&MetaFilter::new().field(REGION, "World|R5LAM"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_groupby_preserves_order() {
        let dataset = forcing_dataset();
        let groups = dataset.groupby(SCENARIO).unwrap();
        let names: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.single_timeseries().unwrap(), array![0.0, 0.5, 1.0, 1.5]);
        assert!(dataset.groupby(CLIMATE_MODEL).is_err());
    }

    #[test]
    fn test_single_timeseries() {
        let dataset = forcing_dataset();
        assert!(matches!(
            dataset.single_timeseries(),
            Err(TLMError::ShapeMismatch { actual: 3, .. })
        ));
        assert_eq!(dataset.timeseries(2).unwrap(), array![0.0, 0.1, 0.2, 0.3]);
        assert!(dataset.timeseries(3).is_none());
    }

    #[test]
    fn test_resample_monthly() {
        let dataset = forcing_dataset();
        let monthly = dataset.resample(Frequency::Monthly).unwrap();
        assert_eq!(monthly.time_axis(), &TimeAxis::monthly(2000, 2003));

        let row = monthly.timeseries(0).unwrap();
        assert_relative_eq!(row[6], 0.5, epsilon = 1e-12);
        assert_relative_eq!(row[12], 1.0, epsilon = 1e-12);
        assert_relative_eq!(row[36], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_filter_time() {
        let monthly = forcing_dataset().resample(Frequency::Monthly).unwrap();
        let june = monthly.filter_time(2001, Some(7)).unwrap();
        assert_eq!(june.time_axis().len(), 1);
        assert_relative_eq!(june.timeseries(0).unwrap()[0], 1.5, epsilon = 1e-12);

        let year = monthly.filter_time(2001, None).unwrap();
        assert_eq!(year.time_axis().len(), 12);
    }

    #[test]
    fn test_scale_and_set_meta() {
        let dataset = forcing_dataset();
        let scaled = dataset.scale(1e-3).set_meta(UNIT, "kW/m^2").unwrap();
        assert_eq!(scaled.get_unique_meta(UNIT).unwrap(), "kW/m^2");
        assert_relative_eq!(scaled.timeseries(0).unwrap()[3], 3e-3);
        assert!(!scaled.allclose(&dataset, 1e-6));
    }

    #[test]
    fn test_allclose_ignores_row_order() {
        let dataset = forcing_dataset();
        let reordered = dataset.select_rows(&[2, 0, 1]).unwrap();
        assert!(dataset.allclose(&reordered, 1e-12));

        let perturbed = ScenarioDataset::new(
            dataset.values().to_owned() * 1.01,
            dataset.time_axis().clone(),
            dataset.metadata().to_vec(),
        )
        .unwrap();
        assert!(!dataset.allclose(&perturbed, 1e-3));
        assert!(dataset.allclose(&perturbed, 0.02));
    }

    #[test]
    fn test_concat() {
        let dataset = forcing_dataset();
        let groups: Vec<ScenarioDataset> = dataset
            .groupby(SCENARIO)
            .unwrap()
            .into_iter()
            .map(|(_, group)| group)
            .collect();
        let joined = ScenarioDataset::concat(groups).unwrap();
        assert!(joined.allclose(&dataset, 1e-12));

        let other_axis = ScenarioDataset::new(
            array![[1.0, 2.0]],
            TimeAxis::annual(2000, 2001),
            vec![dataset.metadata()[0].clone()],
        )
        .unwrap();
        assert!(ScenarioDataset::concat(vec![dataset, other_axis]).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let dataset = forcing_dataset();
        let json = serde_json::to_string(&dataset).unwrap();
        let restored: ScenarioDataset = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, dataset);
    }
}

//! Row labels for scenario datasets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const SCENARIO: &str = "scenario";
pub const MODEL: &str = "model";
pub const CLIMATE_MODEL: &str = "climate_model";
pub const VARIABLE: &str = "variable";
pub const UNIT: &str = "unit";
pub const REGION: &str = "region";

/// Fields every row must carry. `climate_model` is optional.
pub const REQUIRED_FIELDS: [&str; 5] = [SCENARIO, MODEL, VARIABLE, UNIT, REGION];

/// Metadata identifying a single timeseries.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: &str) -> Option<String> {
        self.0.insert(field.to_string(), value.to_string())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Required fields absent from this row.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !self.contains(field))
            .collect()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
        )
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A metadata column used when building a dataset column-wise.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaColumn {
    /// Same value on every row
    Scalar(String),
    /// One value per row
    PerRow(Vec<String>),
}

impl MetaColumn {
    pub(crate) fn value(&self, row: usize) -> Option<&str> {
        match self {
            MetaColumn::Scalar(value) => Some(value),
            MetaColumn::PerRow(values) => values.get(row).map(String::as_str),
        }
    }

    pub(crate) fn len(&self) -> Option<usize> {
        match self {
            MetaColumn::Scalar(_) => None,
            MetaColumn::PerRow(values) => Some(values.len()),
        }
    }
}

impl From<&str> for MetaColumn {
    fn from(value: &str) -> Self {
        MetaColumn::Scalar(value.to_string())
    }
}

impl From<String> for MetaColumn {
    fn from(value: String) -> Self {
        MetaColumn::Scalar(value)
    }
}

impl From<Vec<&str>> for MetaColumn {
    fn from(values: Vec<&str>) -> Self {
        MetaColumn::PerRow(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for MetaColumn {
    fn from(values: Vec<String>) -> Self {
        MetaColumn::PerRow(values)
    }
}

/// Row selection by metadata.
///
/// A row matches when, for every constrained field, its value is one of the
/// allowed values. With `keep(false)` the matching rows are dropped instead.
///
/// ```
/// use tlm_core::dataset::{MetaFilter, Metadata};
///
/// let filter = MetaFilter::new()
///     .field("variable", "Effective Radiative Forcing")
///     .field("region", "World");
/// let row = Metadata::new()
///     .with("variable", "Effective Radiative Forcing")
///     .with("region", "World");
/// assert!(filter.selects(&row));
/// assert!(!filter.clone().keep(false).selects(&row));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetaFilter {
    constraints: Vec<(String, Vec<String>)>,
    keep: bool,
}

impl Default for MetaFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaFilter {
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
            keep: true,
        }
    }

    /// Requires `field == value`.
    #[must_use]
    pub fn field(self, field: &str, value: &str) -> Self {
        self.any_of(field, &[value])
    }

    /// Requires `field` to be one of `values`.
    #[must_use]
    pub fn any_of(mut self, field: &str, values: &[&str]) -> Self {
        self.constraints.push((
            field.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    /// Whether matching rows are kept (default) or dropped.
    #[must_use]
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.constraints.iter().all(|(field, allowed)| {
            metadata
                .get(field)
                .is_some_and(|value| allowed.iter().any(|a| a == value))
        })
    }

    /// Whether the row survives the filter.
    pub fn selects(&self, metadata: &Metadata) -> bool {
        self.matches(metadata) == self.keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(variable: &str, region: &str) -> Metadata {
        Metadata::new()
            .with(SCENARIO, "ssp126")
            .with(MODEL, "unspecified")
            .with(VARIABLE, variable)
            .with(UNIT, "W/m^2")
            .with(REGION, region)
    }

    #[test]
    fn test_required_fields() {
        let complete = row("Effective Radiative Forcing", "World");
        assert!(complete.missing_required().is_empty());

        let mut partial = complete.clone();
        partial.remove(REGION);
        partial.remove(UNIT);
        assert_eq!(partial.missing_required(), vec![UNIT, REGION]);
    }

    #[test]
    fn test_filter_any_of() {
        let filter = MetaFilter::new().any_of(REGION, &["World", "World|R5LAM"]);
        assert!(filter.selects(&row("x", "World")));
        assert!(filter.selects(&row("x", "World|R5LAM")));
        assert!(!filter.selects(&row("x", "World|R5ASIA")));
    }

    #[test]
    fn test_filter_missing_field_never_matches() {
        let filter = MetaFilter::new().field(CLIMATE_MODEL, "two_layer");
        assert!(!filter.matches(&row("x", "World")));
        assert!(filter.clone().keep(false).selects(&row("x", "World")));
    }

    #[test]
    fn test_from_iter_and_display() {
        let metadata: Metadata = [(SCENARIO, "a"), (REGION, "World")].into_iter().collect();
        assert_eq!(metadata.get(SCENARIO), Some("a"));
        assert_eq!(metadata.to_string(), "{region=World, scenario=a}");
    }

    #[test]
    fn test_meta_column() {
        let scalar = MetaColumn::from("World");
        assert_eq!(scalar.value(10), Some("World"));
        assert_eq!(scalar.len(), None);

        let per_row = MetaColumn::from(vec!["a", "b"]);
        assert_eq!(per_row.value(1), Some("b"));
        assert_eq!(per_row.value(2), None);
        assert_eq!(per_row.len(), Some(2));
    }
}

//! A two-layer energy balance climate model driven by labelled scenario data.
//!
//! ```
//! use ndarray::Array2;
//! use tlm::prelude::*;
//!
//! let time_axis = TimeAxis::annual(1750, 1850);
//! let mut values = Array2::zeros((1, time_axis.len()));
//! values.row_mut(0).assign(&ndarray::Array1::linspace(0.0, 4.0, time_axis.len()));
//!
//! let input = ScenarioDataset::from_columns(
//!     values,
//!     time_axis,
//!     [
//!         ("scenario", "test_scenario".into()),
//!         ("model", "unspecified".into()),
//!         ("variable", DEFAULT_DRIVER_VAR.into()),
//!         ("unit", "W/m^2".into()),
//!         ("region", "World".into()),
//!     ],
//! )
//! .unwrap();
//!
//! let output = ScenarioRunner::default().run_scenarios_default(&input).unwrap();
//! assert_eq!(output.len(), 4);
//! ```

pub use tlm_core as core;
pub use tlm_two_layer as two_layer;

pub mod prelude {
    pub use tlm_core::dataset::{LabeledTimeseries, MetaFilter, Metadata, ScenarioDataset};
    pub use tlm_core::errors::{TLMError, TLMResult};
    pub use tlm_core::timeseries::{FloatValue, Frequency, Time, TimeAxis};
    pub use tlm_core::units::{Quantity, Unit, UnitError, UnitRegistry};
    pub use tlm_two_layer::{
        DriverSeries, ScenarioRunner, TwoLayerModel, TwoLayerParameters, DEFAULT_DRIVER_VAR,
    };
}

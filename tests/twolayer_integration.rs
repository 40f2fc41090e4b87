//! End-to-end tests of scenario batches against single model runs.
//!
//! Inputs follow the usual layout of forcing scenario files: one global
//! `Effective Radiative Forcing` timeseries per scenario on an annual axis
//! from 1750 to 1850.

use approx::assert_relative_eq;
use ndarray::{Array1, Array2, ArrayView1};
use std::sync::Arc;
use tlm::prelude::*;
use tlm::two_layer::scenarios::{
    CLIMATE_MODEL_NAME, HEAT_UPTAKE_VARIABLE, TEMP_LOWER_VARIABLE, TEMP_UPPER_VARIABLE,
};

const CO2_DRIVER_VAR: &str = "Effective Radiative Forcing|CO2";

fn erf_ramp() -> Array1<FloatValue> {
    Array1::linspace(0.0, 4.0, 101)
}

fn erf_sine() -> Array1<FloatValue> {
    Array1::linspace(0.0, 4.0, 101).mapv(FloatValue::sin)
}

fn scenario_input(rows: &[Array1<FloatValue>], scenarios: Vec<&str>, variables: Vec<&str>) -> ScenarioDataset {
    let time_axis = TimeAxis::annual(1750, 1850);
    let mut values = Array2::zeros((rows.len(), time_axis.len()));
    for (mut out, row) in values.outer_iter_mut().zip(rows) {
        out.assign(row);
    }
    ScenarioDataset::from_columns(
        values,
        time_axis,
        [
            ("scenario", scenarios.into()),
            ("model", "unspecified".into()),
            ("climate_model", "junk input".into()),
            ("variable", variables.into()),
            ("unit", "W/m^2".into()),
            ("region", "World".into()),
        ],
    )
    .unwrap()
}

fn single_input() -> ScenarioDataset {
    scenario_input(&[erf_ramp()], vec!["test_scenario"], vec![DEFAULT_DRIVER_VAR])
}

fn registry() -> Arc<UnitRegistry> {
    Arc::new(UnitRegistry::new())
}

/// Runs a fresh model by hand on the single row of `driver`.
fn manual_run(driver: &ScenarioDataset, registry: &Arc<UnitRegistry>) -> TwoLayerModel {
    let unit = driver.get_unique_meta("unit").unwrap();
    let forcing = registry
        .quantity(driver.single_timeseries().unwrap().to_owned(), &unit)
        .unwrap();

    let mut model = TwoLayerModel::new(TwoLayerParameters::default(), registry.clone()).unwrap();
    model
        .set_drivers(DriverSeries::new(forcing, driver.time_axis().clone()).unwrap())
        .unwrap();
    model.reset().unwrap();
    model.run().unwrap();
    model
}

fn output_variable(output: &ScenarioDataset, scenario: &str, variable: &str) -> ScenarioDataset {
    output
        .filter(
            &MetaFilter::new()
                .field("scenario", scenario)
                .field("variable", variable),
        )
        .unwrap()
}

fn assert_series_close(actual: ArrayView1<FloatValue>, expected: ArrayView1<FloatValue>) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, max_relative = 1e-7);
    }
}

/// Checks every model output of `scenario` against a manual run on `driver`.
fn assert_matches_manual_run(output: &ScenarioDataset, scenario: &str, driver: &ScenarioDataset) {
    let model = manual_run(driver, &registry());

    let expected = [
        (TEMP_UPPER_VARIABLE, model.temp_upper(), "delta_degC"),
        (TEMP_LOWER_VARIABLE, model.temp_lower(), "delta_degC"),
        (HEAT_UPTAKE_VARIABLE, model.heat_uptake(), "W/m^2"),
    ];
    for (variable, values, unit) in expected {
        let result = output_variable(output, scenario, variable);
        assert_series_close(result.single_timeseries().unwrap(), values);
        assert_eq!(
            result.get_unique_meta("unit").unwrap(),
            unit,
            "unit of {variable}"
        );
        assert_eq!(
            result.get_unique_meta("climate_model").unwrap(),
            CLIMATE_MODEL_NAME
        );
    }
}

mod run_scenarios {
    use super::*;

    #[test]
    fn test_single_scenario_matches_manual_run() {
        let input = single_input();
        let output = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap();

        assert_matches_manual_run(&output, "test_scenario", &input);
    }

    #[test]
    fn test_multiple_scenarios_match_manual_runs() {
        let input = scenario_input(
            &[erf_ramp(), erf_sine()],
            vec!["test_scenario_1", "test_scenario_2"],
            vec![DEFAULT_DRIVER_VAR, DEFAULT_DRIVER_VAR],
        );
        let output = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap();

        for (scenario, group) in input.groupby("scenario").unwrap() {
            assert_matches_manual_run(&output, &scenario, &group);
        }
        assert_eq!(
            output.meta_values("scenario"),
            vec!["test_scenario_1", "test_scenario_2"]
        );
    }

    fn multiple_driver_input() -> ScenarioDataset {
        let ramp = erf_ramp();
        let sine = erf_sine();
        let cosine = Array1::linspace(0.0, 4.0, 101).mapv(FloatValue::cos);
        scenario_input(
            &[ramp.clone(), &ramp * 0.9, sine.clone(), &cosine * &sine],
            vec![
                "test_scenario_1",
                "test_scenario_1",
                "test_scenario_2",
                "test_scenario_2",
            ],
            vec![
                DEFAULT_DRIVER_VAR,
                CO2_DRIVER_VAR,
                DEFAULT_DRIVER_VAR,
                CO2_DRIVER_VAR,
            ],
        )
    }

    fn check_driver_var(driver_var: &str) {
        let input = multiple_driver_input();
        let output = ScenarioRunner::default()
            .run_scenarios(&input, driver_var)
            .unwrap();

        for (scenario, group) in input.groupby("scenario").unwrap() {
            let driver = group
                .filter(&MetaFilter::new().field("variable", driver_var))
                .unwrap();
            assert_matches_manual_run(&output, &scenario, &driver);
        }
    }

    #[test]
    fn test_total_forcing_driver() {
        check_driver_var(DEFAULT_DRIVER_VAR);
    }

    #[test]
    fn test_co2_forcing_driver() {
        check_driver_var(CO2_DRIVER_VAR);
    }

    #[test]
    fn test_driver_var_changes_results() {
        let input = multiple_driver_input();
        let runner = ScenarioRunner::default();
        let total = runner.run_scenarios(&input, DEFAULT_DRIVER_VAR).unwrap();
        let co2 = runner.run_scenarios(&input, CO2_DRIVER_VAR).unwrap();

        let upper_total = output_variable(&total, "test_scenario_1", TEMP_UPPER_VARIABLE);
        let upper_co2 = output_variable(&co2, "test_scenario_1", TEMP_UPPER_VARIABLE);
        let last_total = upper_total.single_timeseries().unwrap()[100];
        let last_co2 = upper_co2.single_timeseries().unwrap()[100];

        assert_relative_eq!(last_co2, 0.9 * last_total, max_relative = 1e-9);
    }

    #[test]
    fn test_input_is_echoed_unchanged() {
        let input = single_input();
        let output = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap();

        let echoed = output
            .filter(&MetaFilter::new().field("variable", DEFAULT_DRIVER_VAR))
            .unwrap();
        assert_eq!(echoed, input);
    }
}

mod timestep {
    use super::*;

    #[test]
    fn test_delta_t_follows_input() {
        let registry = registry();
        let input = single_input();

        let annual = manual_run(&input, &registry);
        let delta_t = annual.delta_t().unwrap();
        assert!(delta_t.approx_eq(&registry.quantity(1.0, "yr").unwrap(), 1e-12));

        let monthly = manual_run(&input.resample(Frequency::Monthly).unwrap(), &registry);
        let delta_t = monthly.delta_t().unwrap();
        assert!(delta_t.approx_eq(&registry.quantity(1.0, "month").unwrap(), 1e-12));
        assert_eq!(delta_t.unit(), &registry.parse("month").unwrap());
    }

    #[test]
    fn test_annual_and_monthly_runs_agree() {
        let input = single_input();
        let runner = ScenarioRunner::default();

        let annual = runner.run_scenarios_default(&input).unwrap();
        let monthly = runner
            .run_scenarios_default(&input.resample(Frequency::Monthly).unwrap())
            .unwrap();

        let last_year = 1850;
        let at_last_year = |output: &ScenarioDataset, variable: &str| {
            output_variable(output, "test_scenario", variable)
                .filter_time(last_year, Some(1))
                .unwrap()
                .single_timeseries()
                .unwrap()[0]
        };

        for variable in [TEMP_UPPER_VARIABLE, HEAT_UPTAKE_VARIABLE] {
            assert_relative_eq!(
                at_last_year(&annual, variable),
                at_last_year(&monthly, variable),
                max_relative = 1e-3
            );
        }
    }

    #[test]
    fn test_runner_reports_delta_t() {
        let registry = registry();
        let input = single_input();
        let runner = ScenarioRunner::new(TwoLayerParameters::default(), registry.clone()).unwrap();

        let annual = runner.delta_t(&input).unwrap();
        assert_eq!(annual.unit(), &registry.parse("yr").unwrap());
        assert_eq!(*annual.magnitude(), 1.0);

        let monthly = runner
            .delta_t(&input.resample(Frequency::Monthly).unwrap())
            .unwrap();
        assert_eq!(monthly.unit(), &registry.parse("month").unwrap());
        assert_eq!(*monthly.magnitude(), 1.0);
    }

    #[test]
    fn test_annual_and_monthly_runs_agree_at_every_year() {
        let input = scenario_input(&[erf_sine()], vec!["test_scenario"], vec![DEFAULT_DRIVER_VAR]);
        let runner = ScenarioRunner::default();

        let annual = runner.run_scenarios_default(&input).unwrap();
        let monthly = runner
            .run_scenarios_default(&input.resample(Frequency::Monthly).unwrap())
            .unwrap()
            .resample(Frequency::Annual)
            .unwrap();

        assert_eq!(annual.len(), 4);
        assert!(annual.allclose(&monthly, 1e-6));
    }
}

mod heat_uptake {
    use super::*;

    fn heat_uptake_of(output: &ScenarioDataset) -> Array1<FloatValue> {
        output_variable(output, "test_scenario", HEAT_UPTAKE_VARIABLE)
            .single_timeseries()
            .unwrap()
            .to_owned()
    }

    #[test]
    fn test_heat_uptake_is_forcing_minus_response() {
        let input = single_input();
        let output = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap();
        let parameters = TwoLayerParameters::default();

        let erf = input.single_timeseries().unwrap();
        let upper = output_variable(&output, "test_scenario", TEMP_UPPER_VARIABLE);
        let lower = output_variable(&output, "test_scenario", TEMP_LOWER_VARIABLE);
        let (t_u, t_l) = (
            upper.single_timeseries().unwrap()[100],
            lower.single_timeseries().unwrap()[100],
        );
        let expected = erf[100]
            - parameters.lambda0 * t_u
            - (parameters.efficacy - 1.0) * parameters.eta * (t_u - t_l);

        assert_relative_eq!(heat_uptake_of(&output)[100], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_initial_heat_uptake_is_initial_forcing() {
        let offset = erf_ramp() + 1.0;
        let input = scenario_input(&[offset], vec!["test_scenario"], vec![DEFAULT_DRIVER_VAR]);
        let output = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap();

        assert_eq!(heat_uptake_of(&output)[0], 1.0);
    }
}

mod units {
    use super::*;

    #[test]
    fn test_forcing_unit_is_converted() {
        let input = single_input();
        let runner = ScenarioRunner::default();
        let output = runner.run_scenarios_default(&input).unwrap();

        let other_unit = input.scale(1e-3).set_meta("unit", "kW/m^2").unwrap();
        let output_other_unit = runner.run_scenarios_default(&other_unit).unwrap();

        let exclude_driver = MetaFilter::new()
            .field("variable", DEFAULT_DRIVER_VAR)
            .keep(false);
        let models = output.filter(&exclude_driver).unwrap();
        let models_other_unit = output_other_unit.filter(&exclude_driver).unwrap();

        assert_eq!(models.len(), 3);
        assert!(models.allclose(&models_other_unit, 1e-7));
    }

    #[test]
    fn test_wrong_units() {
        let input = single_input().set_meta("unit", "W").unwrap();
        let err = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap_err();

        assert!(err.is_unit_error(), "expected a unit error, got {err:?}");
        assert!(matches!(
            err,
            TLMError::Unit(UnitError::IncompatibleDimensions { .. })
        ));
    }
}

mod missing_data {
    use super::*;

    #[test]
    fn test_wrong_region() {
        let input = single_input().set_meta("region", "World|R5LAM").unwrap();
        let err = ScenarioRunner::default()
            .run_scenarios_default(&input)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "No World data available for driver_var `Effective Radiative Forcing`"
        );
    }

    #[test]
    fn test_wrong_driver() {
        let input = single_input();
        let err = ScenarioRunner::default()
            .run_scenarios(&input, CO2_DRIVER_VAR)
            .unwrap_err();

        assert_eq!(
            err,
            TLMError::MissingDriver {
                driver_var: CO2_DRIVER_VAR.to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "No World data available for driver_var `Effective Radiative Forcing|CO2`"
        );
    }
}

mod configuration {
    use super::*;

    #[test]
    fn test_runner_from_toml_parameters() {
        let parameters = TwoLayerParameters::from_toml_str(
            r#"
            du = 60.0
            lambda0 = 1.0
            "#,
        )
        .unwrap();
        let runner = ScenarioRunner::new(parameters.clone(), registry()).unwrap();
        let output = runner.run_scenarios_default(&single_input()).unwrap();

        let default_output = ScenarioRunner::default()
            .run_scenarios_default(&single_input())
            .unwrap();
        let upper = output_variable(&output, "test_scenario", TEMP_UPPER_VARIABLE);
        let default_upper = output_variable(&default_output, "test_scenario", TEMP_UPPER_VARIABLE);

        // Weaker feedback warms more
        assert!(
            upper.single_timeseries().unwrap()[100] > default_upper.single_timeseries().unwrap()[100]
        );
        assert_eq!(runner.parameters(), &parameters);
    }
}

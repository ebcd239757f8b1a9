use anyhow::{anyhow, bail, Context};
use popdyn_core::integrator::SolverKind;
use popdyn_core::metrics::{reproduction_label, reproduction_number};
use popdyn_core::models::ModelKind;
use popdyn_core::parameters;
use popdyn_core::simulation::{self, SimulationRequest};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

mod session;

pub use session::WasmDashboard;

fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn parse_model(name: &str) -> anyhow::Result<ModelKind> {
    Ok(name.parse::<ModelKind>()?)
}

/// Empty or `"default"` keeps the model's own choice.
pub(crate) fn parse_solver(name: &str) -> anyhow::Result<Option<SolverKind>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "default" => Ok(None),
        "euler" => Ok(Some(SolverKind::Euler)),
        "rk4" => Ok(Some(SolverKind::Rk4)),
        "adaptive" | "dopri5" => Ok(Some(SolverKind::Adaptive)),
        other => bail!("Unknown solver '{other}'"),
    }
}

fn decode_request(request: JsValue) -> anyhow::Result<SimulationRequest> {
    from_value(request)
        .map_err(|e| anyhow!("{e}"))
        .context("Invalid simulation request")
}

/// Runs one simulation request and returns the report.
///
/// Only a request that cannot be decoded is an error; failed runs come back as
/// degenerate reports with a `failure` reason.
#[wasm_bindgen]
pub fn simulate(request: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let request = decode_request(request).map_err(to_js_error)?;
    serialize(&simulation::simulate(&request))
}

/// Default parameter set of a model, as shown after "reset".
#[wasm_bindgen]
pub fn default_parameters(model: &str) -> Result<JsValue, JsValue> {
    let model = parse_model(model).map_err(to_js_error)?;
    serialize(&model.default_parameters())
}

/// Parameter table of a model: names, defaults and admissible ranges.
#[wasm_bindgen]
pub fn parameter_table(model: &str) -> Result<JsValue, JsValue> {
    let model = parse_model(model).map_err(to_js_error)?;
    let rows: Vec<session::ParameterRow> = model
        .parameter_specs()
        .iter()
        .map(session::ParameterRow::from)
        .collect();
    serialize(&rows)
}

/// Rescales `(S₀, I₀, R₀)` to a new population, returned as a 3-element array.
#[wasm_bindgen]
pub fn rebalance_population(
    population: f64,
    susceptible: f64,
    infected: f64,
    recovered: f64,
) -> js_sys::Float64Array {
    let values =
        parameters::rebalance_population(population, [susceptible, infected, recovered]);
    js_sys::Float64Array::from(&values[..])
}

/// Live `R₀ = …` preview for the SIR/SEIR forms.
#[wasm_bindgen]
pub fn reproduction_number_label(beta: f64, gamma: f64) -> String {
    reproduction_label(reproduction_number(beta, gamma))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_names() {
        assert_eq!(parse_solver("").ok(), Some(None));
        assert_eq!(parse_solver("RK4").ok(), Some(Some(SolverKind::Rk4)));
        assert_eq!(
            parse_solver("adaptive").ok(),
            Some(Some(SolverKind::Adaptive))
        );
        assert!(parse_solver("lsoda").is_err());
    }

    #[test]
    fn model_names() {
        assert_eq!(parse_model("rumor_sir").ok(), Some(ModelKind::RumorSir));
        assert_eq!(parse_model("cohort_sir").ok(), Some(ModelKind::CohortSir));
        let err = parse_model("sis").expect_err("unknown model");
        assert!(err.to_string().contains("sis"));
    }

    #[test]
    fn reproduction_label_text() {
        assert_eq!(reproduction_number_label(0.24, 0.1), "R₀ = 2.40");
        assert_eq!(reproduction_number_label(0.24, 0.0), "R₀ = undefined");
    }
}

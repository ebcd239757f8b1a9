//! Parameter tables and the tolerant validator that sits between the dashboard
//! forms and the models.
//!
//! Validation never rejects a request. Missing, non-numeric or out-of-domain
//! inputs are replaced by the declared default (or clamped into the domain),
//! and every change is reported as an [`Adjustment`].

use crate::error::{Result, SimulationError};
use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Admissible values of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    /// Strictly greater than zero.
    Positive,
    NonNegative,
    AtLeast(f64),
    Between(f64, f64),
}

impl Domain {
    pub fn contains(self, value: f64) -> bool {
        match self {
            Domain::Positive => value > 0.0,
            Domain::NonNegative => value >= 0.0,
            Domain::AtLeast(min) => value >= min,
            Domain::Between(min, max) => (min..=max).contains(&value),
        }
    }

    /// Nearest admissible value, if the domain has a closed bound on that side.
    fn clamp(self, value: f64) -> Option<f64> {
        match self {
            Domain::Positive => (value > 0.0).then_some(value),
            Domain::NonNegative => Some(value.max(0.0)),
            Domain::AtLeast(min) => Some(value.max(min)),
            Domain::Between(min, max) => Some(value.clamp(min, max)),
        }
    }
}

/// How an out-of-domain value is repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Replace with the default.
    Default,
    /// Move to the nearest admissible value.
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub default: f64,
    pub domain: Domain,
    pub repair: Repair,
    /// Values are rounded to the nearest integer.
    pub integer: bool,
}

impl ParameterSpec {
    pub const fn new(name: &'static str, default: f64, domain: Domain) -> Self {
        Self {
            name,
            default,
            domain,
            repair: Repair::Default,
            integer: false,
        }
    }

    pub const fn clamped(self) -> Self {
        Self {
            repair: Repair::Clamp,
            ..self
        }
    }

    pub const fn integer(self) -> Self {
        Self {
            integer: true,
            ..self
        }
    }
}

/// A raw form value: either a number or the text the user typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    fn to_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(value) => Some(*value),
            RawValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Raw inputs keyed by parameter name; `None` is an explicitly empty field.
pub type RawParameters = BTreeMap<String, Option<RawValue>>;

/// Validated parameter values keyed by name. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParameters(BTreeMap<String, f64>);

impl ModelParameters {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<f64> {
        self.get(name).ok_or_else(|| SimulationError::InvalidParameter {
            name: name.to_string(),
            reason: "missing".to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts back into raw form, e.g. to feed a previous result into a new request.
    pub fn to_raw(&self) -> RawParameters {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), Some(RawValue::Number(*value))))
            .collect()
    }

    fn set(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }
}

impl FromIterator<(String, f64)> for ModelParameters {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    Missing,
    NotNumeric,
    NotFinite,
    OutOfDomain,
    Clamped,
    Rounded,
    /// Initial compartments would have exceeded the population.
    Capped,
    /// Initial compartments rescaled to a new population total.
    Rebalanced,
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AdjustmentReason::Missing => "missing, default used",
            AdjustmentReason::NotNumeric => "not a number, default used",
            AdjustmentReason::NotFinite => "not finite, default used",
            AdjustmentReason::OutOfDomain => "out of range, default used",
            AdjustmentReason::Clamped => "out of range, clamped",
            AdjustmentReason::Rounded => "rounded to an integer",
            AdjustmentReason::Capped => "capped to fit the population",
            AdjustmentReason::Rebalanced => "rescaled to the population total",
        };
        f.write_str(text)
    }
}

/// One change the validator made to the caller's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub parameter: String,
    pub original: Option<f64>,
    pub value: f64,
    pub reason: AdjustmentReason,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.parameter, self.reason, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedParameters {
    pub parameters: ModelParameters,
    pub adjustments: Vec<Adjustment>,
}

/// Validates `raw` against the parameter table of `kind`.
/// Unknown keys are ignored.
pub fn validate(kind: ModelKind, raw: &RawParameters) -> ValidatedParameters {
    let mut parameters = ModelParameters::default();
    let mut adjustments = Vec::new();

    for spec in kind.parameter_specs() {
        let input = raw.get(spec.name).and_then(Option::as_ref);
        let (value, adjustment) = validate_value(spec, input);
        parameters.set(spec.name, value);
        if let Some(adjustment) = adjustment {
            adjustments.push(adjustment);
        }
    }

    match kind {
        ModelKind::Sir => constrain_sir(&mut parameters, &mut adjustments),
        ModelKind::Seir => constrain_seir(&mut parameters, &mut adjustments),
        ModelKind::CohortSir => constrain_cohort(&mut parameters, &mut adjustments),
        ModelKind::Exponential
        | ModelKind::Logistic
        | ModelKind::VectorField
        | ModelKind::RumorSir => {}
    }

    for adjustment in &adjustments {
        match adjustment.reason {
            AdjustmentReason::Missing => log::debug!("{kind}: {adjustment}"),
            _ => log::warn!("{kind}: {adjustment}"),
        }
    }

    ValidatedParameters {
        parameters,
        adjustments,
    }
}

fn validate_value(spec: &ParameterSpec, input: Option<&RawValue>) -> (f64, Option<Adjustment>) {
    let adjusted = |original: Option<f64>, value: f64, reason| {
        (
            value,
            Some(Adjustment {
                parameter: spec.name.to_string(),
                original,
                value,
                reason,
            }),
        )
    };

    let Some(input) = input else {
        return adjusted(None, spec.default, AdjustmentReason::Missing);
    };
    let Some(mut value) = input.to_number() else {
        return adjusted(None, spec.default, AdjustmentReason::NotNumeric);
    };
    if !value.is_finite() {
        return adjusted(Some(value), spec.default, AdjustmentReason::NotFinite);
    }

    let original = value;
    let mut reason = None;
    if spec.integer && value.fract() != 0.0 {
        value = value.round();
        reason = Some(AdjustmentReason::Rounded);
    }
    if !spec.domain.contains(value) {
        let repaired = match spec.repair {
            Repair::Default => None,
            Repair::Clamp => spec.domain.clamp(value),
        };
        return match repaired {
            Some(clamped) => adjusted(Some(original), clamped, AdjustmentReason::Clamped),
            None => adjusted(Some(original), spec.default, AdjustmentReason::OutOfDomain),
        };
    }

    match reason {
        Some(reason) => adjusted(Some(original), value, reason),
        None => (value, None),
    }
}

fn cap(
    parameters: &mut ModelParameters,
    adjustments: &mut Vec<Adjustment>,
    name: &str,
    value: f64,
    reason: AdjustmentReason,
) {
    let original = parameters.get(name);
    if original != Some(value) {
        parameters.set(name, value);
        adjustments.push(Adjustment {
            parameter: name.to_string(),
            original,
            value,
            reason,
        });
    }
}

fn constrain_sir(parameters: &mut ModelParameters, adjustments: &mut Vec<Adjustment>) {
    let (Some(n), Some(i0), Some(r0)) = (
        parameters.get("N"),
        parameters.get("I0"),
        parameters.get("R0"),
    ) else {
        return;
    };
    let i0 = if i0 >= n { (n - 1.0).max(0.0) } else { i0 };
    cap(parameters, adjustments, "I0", i0, AdjustmentReason::Capped);
    if i0 + r0 > n {
        cap(parameters, adjustments, "R0", n - i0, AdjustmentReason::Capped);
    }
}

fn constrain_seir(parameters: &mut ModelParameters, adjustments: &mut Vec<Adjustment>) {
    let (Some(n), Some(e0), Some(i0)) = (
        parameters.get("N"),
        parameters.get("E0"),
        parameters.get("I0"),
    ) else {
        return;
    };
    if e0 + i0 >= n {
        let e0 = e0.min(n - 1.0).max(0.0);
        cap(parameters, adjustments, "E0", e0, AdjustmentReason::Capped);
        cap(parameters, adjustments, "I0", 0.0, AdjustmentReason::Capped);
    }
}

fn constrain_cohort(parameters: &mut ModelParameters, adjustments: &mut Vec<Adjustment>) {
    let (Some(n), Some(s0), Some(i0), Some(r0)) = (
        parameters.get("N"),
        parameters.get("S0"),
        parameters.get("I0"),
        parameters.get("R0"),
    ) else {
        return;
    };
    let total = s0 + i0 + r0;
    if (total - n).abs() <= 1e-9 * n.max(1.0) {
        return;
    }
    let [s, i, r] = rebalance_population(n, [s0, i0, r0]);
    for (name, value) in [("S0", s), ("I0", i), ("R0", r)] {
        cap(parameters, adjustments, name, value, AdjustmentReason::Rebalanced);
    }
}

/// Rescales `(S₀, I₀, R₀)` so the compartments sum to `population`.
///
/// Infected and recovered are scaled proportionally and truncated to whole
/// individuals; susceptibles absorb the remainder. A zero (or negative)
/// previous total puts everyone in the susceptible compartment.
pub fn rebalance_population(population: f64, [s0, i0, r0]: [f64; 3]) -> [f64; 3] {
    let total = s0 + i0 + r0;
    if !(total > 0.0) || !population.is_finite() {
        return [population, 0.0, 0.0];
    }
    let factor = population / total;
    let infected = (i0 * factor).trunc();
    let recovered = (r0 * factor).trunc();
    [population - infected - recovered, infected, recovered]
}

//! Scalar summaries extracted from a finished trajectory.

use crate::error::{Result, SimulationError};
use crate::trajectory::Trajectory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value that may be mathematically undefined, e.g. a ratio with a zero
/// denominator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    /// `numerator / denominator`, or `Undefined` when that is not a finite number.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            return MetricValue::Undefined;
        }
        let value = numerator / denominator;
        if value.is_finite() {
            MetricValue::Defined(value)
        } else {
            MetricValue::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            MetricValue::Defined(value) => Some(value),
            MetricValue::Undefined => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(value) => write!(f, "{value:.2}"),
            MetricValue::Undefined => f.write_str("undefined"),
        }
    }
}

/// Basic reproduction number `β/γ`.
pub fn reproduction_number(beta: f64, gamma: f64) -> MetricValue {
    MetricValue::ratio(beta, gamma)
}

/// Display text such as `R₀ = 2.40` or `R₀ = undefined`.
pub fn reproduction_label(value: MetricValue) -> String {
    format!("R₀ = {value}")
}

/// Qualitative reading of the reproduction number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Growing,
    Declining,
    Steady,
    Undefined,
}

impl From<MetricValue> for Outlook {
    fn from(r0: MetricValue) -> Self {
        match r0 {
            MetricValue::Defined(r) if r > 1.0 => Outlook::Growing,
            MetricValue::Defined(r) if r < 1.0 => Outlook::Declining,
            MetricValue::Defined(_) => Outlook::Steady,
            MetricValue::Undefined => Outlook::Undefined,
        }
    }
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outlook::Growing => "growing",
            Outlook::Declining => "declining",
            Outlook::Steady => "steady",
            Outlook::Undefined => "undefined",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentPeak {
    pub compartment: String,
    pub index: usize,
    pub time: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentValue {
    pub compartment: String,
    pub value: f64,
}

fn series<'a>(trajectory: &'a Trajectory, compartment: &str) -> Result<&'a [f64]> {
    match trajectory.series(compartment) {
        Some(series) if !series.is_empty() => Ok(series),
        Some(_) => Err(SimulationError::InvalidParameter {
            name: compartment.to_string(),
            reason: "trajectory is empty".to_string(),
        }),
        None => Err(SimulationError::InvalidParameter {
            name: compartment.to_string(),
            reason: "no such compartment".to_string(),
        }),
    }
}

/// Maximum of one compartment; ties resolve to the earliest index.
pub fn peak(trajectory: &Trajectory, compartment: &str) -> Result<CompartmentPeak> {
    let values = series(trajectory, compartment)?;
    let mut index = 0;
    for (i, value) in values.iter().enumerate().skip(1) {
        if *value > values[index] {
            index = i;
        }
    }
    Ok(CompartmentPeak {
        compartment: compartment.to_string(),
        index,
        time: trajectory.times[index],
        value: values[index],
    })
}

pub fn peaks(trajectory: &Trajectory) -> Vec<CompartmentPeak> {
    trajectory
        .compartments
        .iter()
        .filter_map(|name| peak(trajectory, name).ok())
        .collect()
}

pub fn final_value(trajectory: &Trajectory, compartment: &str) -> Result<f64> {
    let values = series(trajectory, compartment)?;
    Ok(values[values.len() - 1])
}

pub fn final_values(trajectory: &Trajectory) -> Vec<CompartmentValue> {
    trajectory
        .compartments
        .iter()
        .filter_map(|name| {
            final_value(trajectory, name).ok().map(|value| CompartmentValue {
                compartment: name.clone(),
                value,
            })
        })
        .collect()
}

/// Fraction of the population that ended up recovered.
pub fn attack_rate(final_recovered: f64, population: f64) -> Result<f64> {
    if !(population > 0.0) {
        return Err(SimulationError::SingularRate {
            quantity: "attack rate",
            divisor: "N",
        });
    }
    Ok(final_recovered / population)
}

/// Summary shared by the compartmental models (`I` infected, `R` recovered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpidemicMetrics {
    pub infection_peak: CompartmentPeak,
    /// `None` for models without a reproduction number.
    pub reproduction_number: Option<MetricValue>,
    pub outlook: Option<Outlook>,
    pub population: f64,
    pub final_recovered: f64,
    pub attack_rate: f64,
    pub attack_rate_percent: f64,
}

impl EpidemicMetrics {
    pub fn from_trajectory(
        trajectory: &Trajectory,
        population: f64,
        reproduction_number: Option<MetricValue>,
    ) -> Result<Self> {
        let infection_peak = peak(trajectory, "I")?;
        let final_recovered = final_value(trajectory, "R")?;
        let attack_rate = attack_rate(final_recovered, population)?;
        Ok(Self {
            infection_peak,
            reproduction_number,
            outlook: reproduction_number.map(Outlook::from),
            population,
            final_recovered,
            attack_rate,
            attack_rate_percent: attack_rate * 100.0,
        })
    }
}

/// Latent-stage summary for models with an exposed compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureMetrics {
    /// Mean incubation period `1/σ`.
    pub incubation_period: MetricValue,
    pub exposed_peak: CompartmentPeak,
    /// Infected peak time minus exposed peak time.
    pub peak_delay: f64,
}

impl ExposureMetrics {
    pub fn from_trajectory(trajectory: &Trajectory, sigma: f64) -> Result<Self> {
        let exposed_peak = peak(trajectory, "E")?;
        let infected_peak = peak(trajectory, "I")?;
        Ok(Self {
            incubation_period: MetricValue::ratio(1.0, sigma),
            peak_delay: infected_peak.time - exposed_peak.time,
            exposed_peak,
        })
    }
}

/// Share of the population left untouched, and the share the outbreak reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachMetrics {
    pub final_susceptible: f64,
    pub final_susceptible_percent: f64,
    /// `(N − S_final) / N` as a percentage.
    pub reach_percent: f64,
}

impl ReachMetrics {
    pub fn from_trajectory(trajectory: &Trajectory, population: f64) -> Result<Self> {
        if !(population > 0.0) {
            return Err(SimulationError::SingularRate {
                quantity: "reach",
                divisor: "N",
            });
        }
        let final_susceptible = final_value(trajectory, "S")?;
        let untouched = final_susceptible / population;
        Ok(Self {
            final_susceptible,
            final_susceptible_percent: untouched * 100.0,
            reach_percent: (1.0 - untouched) * 100.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub initial_value: f64,
    pub final_value: f64,
    pub carrying_capacity: Option<f64>,
    /// Time at which the population reaches 99% of the carrying capacity.
    pub time_to_capacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub peaks: Vec<CompartmentPeak>,
    pub final_state: Vec<CompartmentValue>,
    pub epidemic: Option<EpidemicMetrics>,
    pub exposure: Option<ExposureMetrics>,
    pub reach: Option<ReachMetrics>,
    pub growth: Option<GrowthMetrics>,
}

impl Metrics {
    /// Per-compartment peaks and final values; model-specific sections are empty.
    pub fn summary(trajectory: &Trajectory) -> Self {
        Self {
            peaks: peaks(trajectory),
            final_state: final_values(trajectory),
            ..Self::default()
        }
    }

    pub fn peak(&self, compartment: &str) -> Option<&CompartmentPeak> {
        self.peaks.iter().find(|p| p.compartment == compartment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trajectory {
        Trajectory {
            times: vec![0.0, 1.0, 2.0, 3.0],
            compartments: vec!["S".into(), "I".into(), "R".into()],
            series: vec![
                vec![9.0, 7.0, 5.0, 4.0],
                vec![1.0, 3.0, 3.0, 2.0],
                vec![0.0, 0.0, 2.0, 4.0],
            ],
        }
    }

    #[test]
    fn peak_prefers_the_first_maximum() {
        let p = peak(&sample(), "I").expect("peak");
        assert_eq!(p.index, 1);
        assert_eq!(p.time, 1.0);
        assert_eq!(p.value, 3.0);
        assert!(peak(&sample(), "E").is_err());
    }

    #[test]
    fn reproduction_number_handles_zero_recovery() {
        assert_eq!(reproduction_number(0.24, 0.1).to_string(), "2.40");
        assert_eq!(reproduction_number(0.3, 0.0), MetricValue::Undefined);
        assert_eq!(
            reproduction_label(reproduction_number(0.3, 0.0)),
            "R₀ = undefined"
        );
        assert_eq!(reproduction_label(reproduction_number(0.24, 0.1)), "R₀ = 2.40");
    }

    #[test]
    fn outlook_follows_threshold() {
        assert_eq!(Outlook::from(MetricValue::Defined(2.4)), Outlook::Growing);
        assert_eq!(Outlook::from(MetricValue::Defined(0.5)), Outlook::Declining);
        assert_eq!(Outlook::from(MetricValue::Defined(1.0)), Outlook::Steady);
        assert_eq!(Outlook::from(MetricValue::Undefined).to_string(), "undefined");
    }

    #[test]
    fn attack_rate_rejects_empty_population() {
        assert_eq!(attack_rate(400.0, 1000.0), Ok(0.4));
        assert!(matches!(
            attack_rate(0.0, 0.0),
            Err(SimulationError::SingularRate { .. })
        ));
    }

    #[test]
    fn epidemic_metrics_from_trajectory() {
        let metrics = EpidemicMetrics::from_trajectory(
            &sample(),
            10.0,
            Some(reproduction_number(0.2, 0.1)),
        )
        .expect("metrics");
        assert_eq!(metrics.infection_peak.value, 3.0);
        assert_eq!(metrics.final_recovered, 4.0);
        assert!((metrics.attack_rate_percent - 40.0).abs() < 1e-12);
        assert_eq!(metrics.outlook, Some(Outlook::Growing));
    }

    #[test]
    fn reach_complements_final_susceptibles() {
        let reach = ReachMetrics::from_trajectory(&sample(), 10.0).expect("reach");
        assert_eq!(reach.final_susceptible, 4.0);
        assert!((reach.final_susceptible_percent - 40.0).abs() < 1e-12);
        assert!((reach.reach_percent - 60.0).abs() < 1e-12);
        assert!(ReachMetrics::from_trajectory(&sample(), 0.0).is_err());
    }

    #[test]
    fn summary_lists_every_compartment() {
        let summary = Metrics::summary(&sample());
        assert_eq!(summary.peaks.len(), 3);
        assert_eq!(summary.peak("S").map(|p| p.index), Some(0));
        assert_eq!(summary.final_state[2].value, 4.0);
        assert!(summary.epidemic.is_none());
    }

    #[test]
    fn undefined_values_serialize_without_infinity() {
        let json = serde_json::to_string(&MetricValue::Undefined).expect("serialize");
        assert_eq!(json, r#"{"status":"undefined"}"#);
        let json = serde_json::to_string(&MetricValue::Defined(2.5)).expect("serialize");
        assert_eq!(json, r#"{"status":"defined","value":2.5}"#);
    }
}

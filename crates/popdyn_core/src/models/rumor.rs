//! Daley–Kendall style rumor spreading with mass-action contact.
//!
//! `S` are people who have not heard the rumor, `I` are spreaders and `R`
//! stiflers who know it but no longer pass it on.

use crate::error::{Result, SimulationError};
use crate::metrics::{EpidemicMetrics, Metrics};
use crate::models::{Model, ModelKind};
use crate::parameters::{Domain, ModelParameters, ParameterSpec};
use crate::traits::{constant, DynamicalSystem, Scalar};
use crate::trajectory::Trajectory;

pub const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("N", 275.0, Domain::AtLeast(1.0)),
    ParameterSpec::new("b", 0.004, Domain::Positive),
    ParameterSpec::new("k", 0.01, Domain::Positive),
    ParameterSpec::new("S0", 266.0, Domain::NonNegative),
    ParameterSpec::new("I0", 1.0, Domain::NonNegative),
    ParameterSpec::new("R0", 8.0, Domain::NonNegative),
    ParameterSpec::new("t_max", 15.0, Domain::Positive),
];

/// ```text
/// dS/dt = −b·S·I
/// dI/dt =  b·S·I − k·I
/// dR/dt =  k·I
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumorSir {
    pub population: f64,
    /// Contact rate `b`.
    pub spread: f64,
    /// Stifling rate `k`.
    pub stifle: f64,
    pub initial: [f64; 3],
}

impl<T: Scalar> DynamicalSystem<T> for RumorSir {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let b = constant::<T>(self.spread);
        let k = constant::<T>(self.stifle);
        let (s, i) = (x[0], x[1]);

        let contact = b * s * i;
        let stifled = k * i;
        out[0] = -contact;
        out[1] = contact - stifled;
        out[2] = stifled;
    }
}

impl Model for RumorSir {
    const KIND: ModelKind = ModelKind::RumorSir;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        let population = parameters.require("N")?;
        if population <= 0.0 {
            return Err(SimulationError::SingularRate {
                quantity: "rumor reach",
                divisor: "N",
            });
        }
        Ok(Self {
            population,
            spread: parameters.require("b")?,
            stifle: parameters.require("k")?,
            initial: [
                parameters.require("S0")?,
                parameters.require("I0")?,
                parameters.require("R0")?,
            ],
        })
    }

    fn initial_state(&self) -> Vec<f64> {
        self.initial.to_vec()
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics> {
        Ok(Metrics {
            epidemic: Some(EpidemicMetrics::from_trajectory(
                trajectory,
                self.population,
                None,
            )?),
            ..Metrics::summary(trajectory)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TimeGrid;
    use crate::settings::AdaptiveSettings;

    fn default_model() -> RumorSir {
        RumorSir::from_parameters(&ModelKind::RumorSir.default_parameters()).expect("defaults")
    }

    #[test]
    fn contact_is_not_normalised_by_population() {
        let model = default_model();
        let mut out = [0.0; 3];
        <RumorSir as DynamicalSystem<f64>>::apply(&model, 0.0, &[266.0, 1.0, 8.0], &mut out);
        assert!((out[0] + 0.004 * 266.0).abs() < 1e-12);
        assert!((out[2] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn rumor_spreads_and_conserves_population() {
        let model = default_model();
        let grid = TimeGrid::new(0.0, 15.0, 500).expect("grid");
        let trajectory = model
            .solve(&grid, None, &AdaptiveSettings::default())
            .expect("integration");
        for i in 0..trajectory.len() {
            let total = trajectory.total(i).expect("row");
            assert!((total - 275.0).abs() < 1e-6 * 275.0);
        }
        let metrics = model.metrics(&trajectory).expect("metrics");
        let epidemic = metrics.epidemic.expect("epidemic section");
        assert!(epidemic.infection_peak.value > 1.0);
        assert_eq!(epidemic.reproduction_number, None);
        assert_eq!(epidemic.outlook, None);
    }
}

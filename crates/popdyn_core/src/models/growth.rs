//! Single-population growth laws. Both have closed-form solutions, which are
//! what the dashboard plots; the ODE forms stay available to the integrators.

use crate::error::{Result, SimulationError};
use crate::grid::TimeGrid;
use crate::integrator::{integrate, ClampPolicy, SolverKind};
use crate::metrics::{GrowthMetrics, Metrics};
use crate::models::{Model, ModelKind};
use crate::parameters::{Domain, ModelParameters, ParameterSpec};
use crate::settings::AdaptiveSettings;
use crate::traits::{constant, DynamicalSystem, Scalar};
use crate::trajectory::Trajectory;

pub const EXPONENTIAL_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("P0", 100.0, Domain::AtLeast(1.0)).clamped(),
    ParameterSpec::new("r", 0.03, Domain::AtLeast(0.01)).clamped(),
    ParameterSpec::new("t_max", 100.0, Domain::AtLeast(10.0)).clamped(),
];

pub const LOGISTIC_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("P0", 100.0, Domain::AtLeast(1.0)).clamped(),
    ParameterSpec::new("r", 0.1, Domain::Positive),
    ParameterSpec::new("K", 1000.0, Domain::AtLeast(1.0)).clamped(),
    ParameterSpec::new("t_max", 100.0, Domain::AtLeast(10.0)).clamped(),
];

/// Fraction of the carrying capacity reported as "reached".
const CAPACITY_FRACTION: f64 = 0.99;

/// Samples `population(t)` over the grid.
fn closed_form(grid: &TimeGrid, population: impl Fn(f64) -> f64) -> Result<Trajectory> {
    let mut trajectory = Trajectory::with_capacity(&["P"], grid.len());
    for i in 0..grid.len() {
        let t = grid.time(i);
        let value = population(t);
        if !value.is_finite() {
            return Err(SimulationError::IntegrationFailure {
                time: t,
                reason: "closed-form population is not finite".to_string(),
            });
        }
        trajectory.push(t, &[value]);
    }
    Ok(trajectory)
}

/// `dP/dt = r·P`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    pub initial: f64,
    pub rate: f64,
}

impl Exponential {
    pub fn population_at(&self, t: f64) -> f64 {
        self.initial * (self.rate * t).exp()
    }
}

impl<T: Scalar> DynamicalSystem<T> for Exponential {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        out[0] = constant::<T>(self.rate) * x[0];
    }
}

impl Model for Exponential {
    const KIND: ModelKind = ModelKind::Exponential;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        Ok(Self {
            initial: parameters.require("P0")?,
            rate: parameters.require("r")?,
        })
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.initial]
    }

    fn solve(
        &self,
        grid: &TimeGrid,
        solver: Option<SolverKind>,
        settings: &AdaptiveSettings,
    ) -> Result<Trajectory> {
        match solver {
            Some(solver) => integrate(
                self,
                Self::KIND.compartments(),
                &self.initial_state(),
                grid,
                solver,
                ClampPolicy::None,
                settings,
            ),
            None => closed_form(grid, |t| self.population_at(t)),
        }
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics> {
        Ok(Metrics {
            growth: Some(GrowthMetrics {
                initial_value: self.initial,
                final_value: crate::metrics::final_value(trajectory, "P")?,
                carrying_capacity: None,
                time_to_capacity: None,
            }),
            ..Metrics::summary(trajectory)
        })
    }
}

/// `dP/dt = r·P·(1 − P/K)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Logistic {
    pub initial: f64,
    pub rate: f64,
    pub capacity: f64,
}

impl Logistic {
    /// `K·P₀ / (P₀ + (K − P₀)·e^{−rt})`, algebraically equal to
    /// `K·P₀·e^{rt} / (K + P₀(e^{rt} − 1))` but free of overflow for large `rt`.
    pub fn population_at(&self, t: f64) -> f64 {
        let (p0, k) = (self.initial, self.capacity);
        k * p0 / (p0 + (k - p0) * (-self.rate * t).exp())
    }

    /// Time at which `P` first reaches 99% of `K`; zero if it starts there.
    pub fn time_to_capacity(&self) -> f64 {
        let (p0, k) = (self.initial, self.capacity);
        if p0 >= CAPACITY_FRACTION * k {
            return 0.0;
        }
        let ratio = CAPACITY_FRACTION / (1.0 - CAPACITY_FRACTION);
        (ratio * (k - p0) / p0).ln() / self.rate
    }
}

impl<T: Scalar> DynamicalSystem<T> for Logistic {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let r = constant::<T>(self.rate);
        let k = constant::<T>(self.capacity);
        out[0] = r * x[0] * (T::one() - x[0] / k);
    }
}

impl Model for Logistic {
    const KIND: ModelKind = ModelKind::Logistic;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        let capacity = parameters.require("K")?;
        if capacity == 0.0 {
            return Err(SimulationError::SingularRate {
                quantity: "logistic growth",
                divisor: "K",
            });
        }
        Ok(Self {
            initial: parameters.require("P0")?,
            rate: parameters.require("r")?,
            capacity,
        })
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.initial]
    }

    fn solve(
        &self,
        grid: &TimeGrid,
        solver: Option<SolverKind>,
        settings: &AdaptiveSettings,
    ) -> Result<Trajectory> {
        match solver {
            Some(solver) => integrate(
                self,
                Self::KIND.compartments(),
                &self.initial_state(),
                grid,
                solver,
                ClampPolicy::None,
                settings,
            ),
            None => closed_form(grid, |t| self.population_at(t)),
        }
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics> {
        Ok(Metrics {
            growth: Some(GrowthMetrics {
                initial_value: self.initial,
                final_value: crate::metrics::final_value(trajectory, "P")?,
                carrying_capacity: Some(self.capacity),
                time_to_capacity: Some(self.time_to_capacity()),
            }),
            ..Metrics::summary(trajectory)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_closed_form_matches_known_value() {
        let model = Exponential {
            initial: 100.0,
            rate: 0.03,
        };
        let p = model.population_at(100.0);
        assert!((p - 2008.553_692).abs() < 1e-3, "{p}");
    }

    #[test]
    fn exponential_integrators_agree_with_closed_form() {
        let model = Exponential {
            initial: 100.0,
            rate: 0.03,
        };
        let grid = TimeGrid::new(0.0, 100.0, 101).expect("grid");
        let settings = AdaptiveSettings::default();
        let exact = model.solve(&grid, None, &settings).expect("closed form");
        let numeric = model
            .solve(&grid, Some(SolverKind::Rk4), &settings)
            .expect("rk4");
        for (a, b) in exact.series[0].iter().zip(&numeric.series[0]) {
            assert!((a - b).abs() / a < 1e-6);
        }
    }

    #[test]
    fn logistic_approaches_capacity() {
        let model = Logistic {
            initial: 100.0,
            rate: 0.1,
            capacity: 1000.0,
        };
        assert_eq!(model.population_at(0.0), 100.0);
        let p = model.population_at(150.0);
        assert!((1000.0 - p) / 1000.0 < 1e-3, "{p}");
        assert!(model.population_at(1e6).is_finite());
    }

    #[test]
    fn logistic_time_to_capacity_is_consistent() {
        let model = Logistic {
            initial: 100.0,
            rate: 0.1,
            capacity: 1000.0,
        };
        let t = model.time_to_capacity();
        assert!((model.population_at(t) - 990.0).abs() < 1e-6);
        let saturated = Logistic {
            initial: 1200.0,
            ..model
        };
        assert_eq!(saturated.time_to_capacity(), 0.0);
    }

    #[test]
    fn logistic_ode_matches_closed_form() {
        let model = Logistic {
            initial: 100.0,
            rate: 0.1,
            capacity: 1000.0,
        };
        let grid = TimeGrid::new(0.0, 100.0, 201).expect("grid");
        let settings = AdaptiveSettings::default();
        let numeric = model
            .solve(&grid, Some(SolverKind::Adaptive), &settings)
            .expect("adaptive");
        for (i, value) in numeric.series[0].iter().enumerate() {
            let exact = model.population_at(grid.time(i));
            assert!((value - exact).abs() < 1e-5 * exact, "t = {}", grid.time(i));
        }
    }

    #[test]
    fn metrics_report_capacity() {
        let model = Logistic {
            initial: 100.0,
            rate: 0.1,
            capacity: 1000.0,
        };
        let grid = TimeGrid::new(0.0, 100.0, 200).expect("grid");
        let trajectory = model
            .solve(&grid, None, &AdaptiveSettings::default())
            .expect("closed form");
        let growth = model.metrics(&trajectory).expect("metrics").growth.expect("growth");
        assert_eq!(growth.carrying_capacity, Some(1000.0));
        assert!(growth.final_value > 990.0);
    }
}

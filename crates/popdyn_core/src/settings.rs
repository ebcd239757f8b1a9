use crate::integrator::SolverKind;
use serde::{Deserialize, Serialize};

/// Step-size control for the adaptive integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub rtol: f64,
    pub atol: f64,
    pub h_min: f64,
    /// Internal step budget per output interval.
    pub max_steps: usize,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            h_min: 1e-12,
            max_steps: 100_000,
        }
    }
}

impl AdaptiveSettings {
    /// Returns settings with unusable fields replaced by their defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            rtol: positive(self.rtol, defaults.rtol),
            atol: positive(self.atol, defaults.atol),
            h_min: positive(self.h_min, defaults.h_min),
            max_steps: if self.max_steps == 0 {
                defaults.max_steps
            } else {
                self.max_steps
            },
        }
    }
}

/// Per-request engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Upper bound on grid resolution; bounds the cost of a single request.
    pub max_grid_points: usize,
    pub adaptive: AdaptiveSettings,
    /// Overrides the model's default solver for integrated models.
    pub solver: Option<SolverKind>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_grid_points: 10_000,
            adaptive: AdaptiveSettings::default(),
            solver: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings: SimulationSettings =
            serde_json::from_str(r#"{"solver":"euler","adaptive":{"rtol":1e-4}}"#)
                .expect("settings json");
        assert_eq!(settings.solver, Some(SolverKind::Euler));
        assert_eq!(settings.max_grid_points, 10_000);
        assert_eq!(settings.adaptive.rtol, 1e-4);
        assert_eq!(settings.adaptive.atol, 1e-9);
    }

    #[test]
    fn sanitized_replaces_unusable_tolerances() {
        let settings = AdaptiveSettings {
            rtol: -1.0,
            atol: f64::NAN,
            h_min: 0.0,
            max_steps: 0,
        }
        .sanitized();
        assert_eq!(settings, AdaptiveSettings::default());
    }
}

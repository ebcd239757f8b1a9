use crate::error::{Result, SimulationError};
use serde::{Deserialize, Serialize};

/// Largest interval count a step-based grid may ask for.
const MAX_INTERVALS: f64 = (u32::MAX - 1) as f64;

/// Number of `step`-wide intervals in `[start, end]`, at least one.
fn step_intervals(start: f64, end: f64, step: f64) -> Result<f64> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SimulationError::InvalidGrid(format!(
            "step ({step}) must be positive"
        )));
    }
    let intervals = ((end - start) / step).round();
    if !intervals.is_finite() {
        return Err(SimulationError::InvalidGrid(
            "grid bounds must be finite".to_string(),
        ));
    }
    Ok(intervals.max(1.0))
}

/// Evenly spaced, strictly increasing sequence of time points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    start: f64,
    end: f64,
    points: usize,
}

impl TimeGrid {
    pub fn new(start: f64, end: f64, points: usize) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SimulationError::InvalidGrid(
                "grid bounds must be finite".to_string(),
            ));
        }
        if end <= start {
            return Err(SimulationError::InvalidGrid(format!(
                "end ({end}) must be greater than start ({start})"
            )));
        }
        if points < 2 {
            return Err(SimulationError::InvalidGrid(
                "a grid needs at least 2 points".to_string(),
            ));
        }
        Ok(Self { start, end, points })
    }

    /// Builds a grid whose spacing is as close as possible to `step`.
    /// The end point is kept, so the effective step is `(end - start) / (points - 1)`.
    pub fn from_step(start: f64, end: f64, step: f64) -> Result<Self> {
        let intervals = step_intervals(start, end, step)?;
        if intervals >= MAX_INTERVALS {
            return Err(SimulationError::InvalidGrid(format!(
                "step ({step}) over [{start}, {end}] needs too many points"
            )));
        }
        Self::new(start, end, intervals as usize + 1)
    }

    /// Two points spanning `[0, t_max]`, or the unit interval if `t_max` is unusable.
    pub fn coarse(t_max: f64) -> Self {
        if t_max.is_finite() && t_max > 0.0 {
            Self {
                start: 0.0,
                end: t_max,
                points: 2,
            }
        } else {
            Self {
                start: 0.0,
                end: 1.0,
                points: 2,
            }
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    pub fn step(&self) -> f64 {
        (self.end - self.start) / (self.points - 1) as f64
    }

    /// Time of the `index`-th point; the last point is exactly `end`.
    pub fn time(&self, index: usize) -> f64 {
        if index + 1 >= self.points {
            self.end
        } else {
            self.start + index as f64 * self.step()
        }
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.points).map(|i| self.time(i)).collect()
    }
}

/// How finely a horizon is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Resolution {
    Points(usize),
    Step(f64),
}

impl Resolution {
    /// Builds the grid over `[0, t_max]`, capping the number of points.
    pub fn grid(self, t_max: f64, max_points: usize) -> Result<TimeGrid> {
        let cap = max_points.max(2);
        let requested = match self {
            Resolution::Points(points) => points as f64,
            Resolution::Step(step) => step_intervals(0.0, t_max, step)? + 1.0,
        };
        if requested > cap as f64 {
            log::warn!("grid of {requested} points exceeds the cap of {cap}; resampling");
            return TimeGrid::new(0.0, t_max, cap);
        }
        match self {
            Resolution::Points(points) => TimeGrid::new(0.0, t_max, points),
            Resolution::Step(step) => TimeGrid::from_step(0.0, t_max, step),
        }
    }
}

/// Grid requested by the caller. Missing pieces fall back to the model's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub t_max: Option<f64>,
    pub resolution: Option<Resolution>,
}

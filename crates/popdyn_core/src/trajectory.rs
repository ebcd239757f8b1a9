use crate::grid::TimeGrid;
use serde::{Deserialize, Serialize};

/// Time series produced by a run: one value per grid point for each compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub compartments: Vec<String>,
    /// `series[c][i]` is compartment `c` at `times[i]`.
    pub series: Vec<Vec<f64>>,
}

impl Trajectory {
    pub(crate) fn with_capacity(compartments: &[&str], points: usize) -> Self {
        Self {
            times: Vec::with_capacity(points),
            compartments: compartments.iter().map(|name| name.to_string()).collect(),
            series: vec![Vec::with_capacity(points); compartments.len()],
        }
    }

    pub(crate) fn push(&mut self, t: f64, state: &[f64]) {
        self.times.push(t);
        for (series, value) in self.series.iter_mut().zip(state) {
            series.push(*value);
        }
    }

    /// A flat line at zero over `grid`, returned in place of a failed run.
    pub fn flat(grid: &TimeGrid, compartments: &[&str]) -> Self {
        let mut trajectory = Self::with_capacity(compartments, grid.len());
        let zeros = vec![0.0; compartments.len()];
        for i in 0..grid.len() {
            trajectory.push(grid.time(i), &zeros);
        }
        trajectory
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn series(&self, compartment: &str) -> Option<&[f64]> {
        self.compartments
            .iter()
            .position(|name| name == compartment)
            .map(|idx| self.series[idx].as_slice())
    }

    /// State at the `index`-th time point, in compartment order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.len() {
            return None;
        }
        Some(self.series.iter().map(|series| series[index]).collect())
    }

    pub fn final_state(&self) -> Option<Vec<f64>> {
        self.len().checked_sub(1).and_then(|last| self.row(last))
    }

    /// Sum over all compartments at the `index`-th time point.
    pub fn total(&self, index: usize) -> Option<f64> {
        self.row(index).map(|row| row.iter().sum())
    }
}

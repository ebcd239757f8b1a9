use crate::equation_engine::{compile_expression, Bytecode, VM};
use crate::error::{Result, SimulationError};
use crate::parameters::{Domain, ModelParameters, ParameterSpec};
use crate::traits::{DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

pub const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("x_max", 5.0, Domain::Positive),
    ParameterSpec::new("y_max", 5.0, Domain::Positive),
    ParameterSpec::new("samples", 15.0, Domain::Between(5.0, 50.0)).integer(),
];

pub const DEFAULT_DX: &str = "sin(y)";
pub const DEFAULT_DY: &str = "cos(x)";

/// Share of the grid cell an arrow of maximal magnitude spans.
const ARROW_FILL: f64 = 0.8;

/// User-typed right-hand sides; blank or missing entries fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldExpressions {
    pub dx: Option<String>,
    pub dy: Option<String>,
}

impl FieldExpressions {
    pub fn new(dx: &str, dy: &str) -> Self {
        Self {
            dx: Some(dx.to_string()),
            dy: Some(dy.to_string()),
        }
    }

    pub fn resolved(&self) -> (&str, &str) {
        (
            or_default(&self.dx, DEFAULT_DX),
            or_default(&self.dy, DEFAULT_DY),
        )
    }
}

fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => default,
    }
}

/// The planar system `(dx/dt, dy/dt) = (f(x, y), g(x, y))` backed by the VM.
pub struct FieldSystem<T: Scalar> {
    pub equations: [Bytecode; 2],
    // Reused VM stack so `apply` does not allocate.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> FieldSystem<T> {
    pub fn new(dx: Bytecode, dy: Bytecode) -> Self {
        Self {
            equations: [dx, dy],
            stack: RefCell::new(Vec::with_capacity(32)),
        }
    }

    pub fn compile(expressions: &FieldExpressions) -> Result<Self> {
        let (dx, dy) = expressions.resolved();
        Ok(Self::new(compile_expression(dx)?, compile_expression(dy)?))
    }
}

impl<T: Scalar> DynamicalSystem<T> for FieldSystem<T> {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let mut stack = self.stack.borrow_mut();
        for (i, eq) in self.equations.iter().enumerate() {
            out[i] = VM::execute(eq, x, &mut stack);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldExtent {
    pub x_max: f64,
    pub y_max: f64,
    /// Samples per axis.
    pub samples: usize,
}

impl Default for FieldExtent {
    fn default() -> Self {
        Self {
            x_max: 5.0,
            y_max: 5.0,
            samples: 15,
        }
    }
}

impl FieldExtent {
    pub fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        let samples = parameters.require("samples")?;
        if !(samples >= 2.0) {
            return Err(SimulationError::InvalidParameter {
                name: "samples".to_string(),
                reason: "need at least 2 samples per axis".to_string(),
            });
        }
        Ok(Self {
            x_max: parameters.require("x_max")?,
            y_max: parameters.require("y_max")?,
            samples: samples as usize,
        })
    }

    fn axis(max: f64, samples: usize) -> Vec<f64> {
        let step = 2.0 * max / (samples.saturating_sub(1).max(1) as f64);
        (0..samples)
            .map(|i| if i + 1 == samples { max } else { -max + step * i as f64 })
            .collect()
    }

    pub fn xs(&self) -> Vec<f64> {
        Self::axis(self.x_max, self.samples)
    }

    pub fn ys(&self) -> Vec<f64> {
        Self::axis(self.y_max, self.samples)
    }

    pub fn arrow_scale(&self) -> f64 {
        ARROW_FILL * self.x_max.min(self.y_max) / self.samples as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    pub x: f64,
    pub y: f64,
    pub u: f64,
    pub v: f64,
    pub magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub start: [f64; 2],
    pub end: [f64; 2],
}

/// Static snapshot of a planar field on a square meshgrid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub extent: FieldExtent,
    /// Row-major: `points[row * samples + col]` sits at `(xs[col], ys[row])`.
    pub points: Vec<FieldSample>,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
    pub arrow_scale: f64,
    /// Arrows normalised by the maximum magnitude; zero vectors are skipped.
    pub arrows: Vec<Arrow>,
}

impl VectorField {
    pub fn sample(&self, row: usize, col: usize) -> Option<&FieldSample> {
        if row >= self.extent.samples || col >= self.extent.samples {
            return None;
        }
        self.points.get(row * self.extent.samples + col)
    }
}

/// Evaluates `system` at every node of the meshgrid described by `extent`.
pub fn evaluate(system: &impl DynamicalSystem<f64>, extent: &FieldExtent) -> Result<VectorField> {
    if system.dimension() != 2 {
        return Err(SimulationError::DimensionMismatch {
            expected: 2,
            found: system.dimension(),
        });
    }
    let xs = extent.xs();
    let ys = extent.ys();
    let mut points = Vec::with_capacity(xs.len() * ys.len());
    let mut out = [0.0; 2];

    for &y in &ys {
        for &x in &xs {
            system.apply(0.0, &[x, y], &mut out);
            let [u, v] = out;
            let magnitude = u.hypot(v);
            if !magnitude.is_finite() {
                return Err(SimulationError::IntegrationFailure {
                    time: 0.0,
                    reason: format!("field is not finite at ({x}, {y})"),
                });
            }
            points.push(FieldSample {
                x,
                y,
                u,
                v,
                magnitude,
            });
        }
    }

    let min_magnitude = points
        .iter()
        .map(|p| p.magnitude)
        .fold(f64::INFINITY, f64::min);
    let max_magnitude = points.iter().map(|p| p.magnitude).fold(0.0, f64::max);
    let arrow_scale = extent.arrow_scale();
    let arrows = if max_magnitude > 0.0 {
        points
            .iter()
            .filter(|p| p.magnitude > 0.0)
            .map(|p| {
                let factor = arrow_scale / max_magnitude;
                Arrow {
                    start: [p.x, p.y],
                    end: [p.x + p.u * factor, p.y + p.v * factor],
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    log::debug!(
        "evaluated vector field on {}x{} grid, |F| in [{min_magnitude}, {max_magnitude}]",
        extent.samples,
        extent.samples
    );
    Ok(VectorField {
        extent: *extent,
        points,
        min_magnitude,
        max_magnitude,
        arrow_scale,
        arrows,
    })
}

/// All-zero field over `extent`, shown when the expressions cannot be evaluated.
pub fn zero_field(extent: &FieldExtent) -> VectorField {
    let xs = extent.xs();
    let points = extent
        .ys()
        .into_iter()
        .flat_map(|y| {
            xs.iter().map(move |&x| FieldSample {
                x,
                y,
                u: 0.0,
                v: 0.0,
                magnitude: 0.0,
            })
        })
        .collect();
    VectorField {
        extent: *extent,
        points,
        min_magnitude: 0.0,
        max_magnitude: 0.0,
        arrow_scale: extent.arrow_scale(),
        arrows: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(samples: usize) -> FieldExtent {
        FieldExtent {
            x_max: 5.0,
            y_max: 5.0,
            samples,
        }
    }

    #[test]
    fn default_expressions_fill_blanks() {
        let expressions = FieldExpressions {
            dx: Some("   ".to_string()),
            dy: None,
        };
        assert_eq!(expressions.resolved(), (DEFAULT_DX, DEFAULT_DY));
    }

    #[test]
    fn meshgrid_is_symmetric_and_row_major() {
        let system = FieldSystem::compile(&FieldExpressions::new("x", "y")).expect("compile");
        let field = evaluate(&system, &extent(5)).expect("field");
        assert_eq!(field.points.len(), 25);
        let first = field.sample(0, 0).expect("first");
        assert_eq!((first.x, first.y), (-5.0, -5.0));
        let next = field.sample(0, 1).expect("next column");
        assert_eq!((next.x, next.y), (-2.5, -5.0));
        let last = field.sample(4, 4).expect("last");
        assert_eq!((last.x, last.y), (5.0, 5.0));
        assert_eq!(field.min_magnitude, 0.0);
        assert!((field.max_magnitude - 50.0_f64.sqrt()).abs() < 1e-12);
        // The origin has a zero vector and gets no arrow.
        assert_eq!(field.arrows.len(), 24);
    }

    #[test]
    fn default_field_matches_sin_cos() {
        let system = FieldSystem::compile(&FieldExpressions::default()).expect("compile");
        let field = evaluate(&system, &extent(15)).expect("field");
        for p in &field.points {
            assert!((p.u - p.y.sin()).abs() < 1e-12);
            assert!((p.v - p.x.cos()).abs() < 1e-12);
        }
        assert!((field.arrow_scale - 0.8 * 5.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn arrows_are_normalised_by_the_maximum() {
        let system = FieldSystem::compile(&FieldExpressions::new("2*x", "0")).expect("compile");
        let field = evaluate(&system, &extent(5)).expect("field");
        let longest = field
            .arrows
            .iter()
            .map(|a| (a.end[0] - a.start[0]).hypot(a.end[1] - a.start[1]))
            .fold(0.0, f64::max);
        assert!((longest - field.arrow_scale).abs() < 1e-12);
    }

    #[test]
    fn singular_field_is_reported() {
        let system = FieldSystem::compile(&FieldExpressions::new("1/x", "y")).expect("compile");
        let err = evaluate(&system, &extent(5)).expect_err("division by zero at x = 0");
        assert!(matches!(err, SimulationError::IntegrationFailure { .. }));
    }

    #[test]
    fn unknown_symbols_fail_to_compile() {
        let result = FieldSystem::<f64>::compile(&FieldExpressions::new("z", "y"));
        assert!(matches!(result, Err(SimulationError::Expression(_))));
    }

    #[test]
    fn zero_field_covers_the_grid() {
        let field = zero_field(&extent(7));
        assert_eq!(field.points.len(), 49);
        assert!(field.arrows.is_empty());
        assert!(field.points.iter().all(|p| p.magnitude == 0.0));
    }
}

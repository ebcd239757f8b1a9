use thiserror::Error;

/// Failures raised while parsing or compiling a vector-field expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("malformed number literal \"{0}\"")]
    InvalidNumber(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')'")]
    MissingClosingParen,
    #[error("unknown variable \"{0}\" (only x and y are allowed)")]
    UnknownVariable(String),
    #[error("unknown function \"{0}\" (allowed: sin, cos, exp, log, sqrt)")]
    UnknownFunction(String),
    #[error("expression is {length} characters long; the limit is {limit}")]
    TooLong { length: usize, limit: usize },
    #[error("expression is nested more than {0} levels deep")]
    TooDeep(usize),
}

/// Error taxonomy of the simulation engine.
///
/// None of these reach the dashboard as a crash: `simulate` folds them into a
/// degenerate result carrying the message as its failure reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("{quantity} is undefined because {divisor} is zero")]
    SingularRate {
        quantity: &'static str,
        divisor: &'static str,
    },
    #[error("integration failed at t = {time}: {reason}")]
    IntegrationFailure { time: f64, reason: String },
    #[error("invalid time grid: {0}")]
    InvalidGrid(String),
    #[error("state has {found} components but the system expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid expression: {0}")]
    Expression(#[from] ExpressionError),
}

impl SimulationError {
    pub(crate) fn non_finite(time: f64) -> Self {
        SimulationError::IntegrationFailure {
            time,
            reason: "derivative evaluation produced a non-finite value".to_string(),
        }
    }
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;

use thiserror::Error;

/// Error raised when an expression graph or a stepper is assembled from parts
/// that do not fit together.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Dimensions of the operands of a combinator do not match.
    #[error("dimension mismatch in {op}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Name of the operation that was being assembled.
        op: &'static str,
        /// Dimension required by the operation.
        expected: usize,
        /// Dimension that was actually provided.
        found: usize,
    },
    /// Coefficients of a Runge-Kutta method are inconsistent.
    #[error("invalid Butcher tableau: {0}")]
    InvalidTableau(String),
    /// A numerical parameter is outside of its admissible range.
    #[error("invalid value of {name}: {value}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}

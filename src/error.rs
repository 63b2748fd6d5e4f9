// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Error types.

use thiserror::Error;


/// Everything that can go wrong while configuring a medium or tracing rays.
///
/// Note that "no solutions" is *not* an error: a receiver in a shadow zone
/// yields an empty `SolutionSet`.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RayTracingError {
    /// A medium, backend or solver was configured with unusable parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A query fell outside the range over which a model is defined.
    #[error("{quantity} = {value} is outside the valid range [{min}, {max}]")]
    OutOfDomain {
        /// What was being queried ("depth", "frequency", ...).
        quantity: &'static str,
        /// The offending value.
        value: f64,
        /// Lower bound of the valid range.
        min: f64,
        /// Upper bound of the valid range.
        max: f64,
    },

    /// The source/receiver pair cannot be traced (coincident points, points
    /// above the surface for a solver that requires them in the ice, ...).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A single root bracket did not converge. The solvers absorb this and
    /// drop the candidate; it only escapes from the low-level numerics.
    #[error("root finding did not converge after {iterations} iterations (residual {residual:e})")]
    ConvergenceFailure {
        /// Number of iterations spent.
        iterations: usize,
        /// Best residual reached.
        residual: f64,
    },

    /// Adaptive quadrature failed, usually by running out of subdivisions
    /// before reaching the requested tolerance.
    #[error("integration failed with up to {subdivisions} subdivisions: {reason}")]
    IntegrationFailure {
        /// The subdivision limit of the workspace.
        subdivisions: usize,
        /// What GSL reported.
        reason: String,
    },
}


impl RayTracingError {
    pub(crate) fn out_of_domain(quantity: &'static str, value: f64, min: f64, max: f64) -> Self {
        RayTracingError::OutOfDomain { quantity, value, min, max }
    }
}


/// Shorthand for results carrying a `RayTracingError`.
pub type Result<T> = std::result::Result<T, RayTracingError>;

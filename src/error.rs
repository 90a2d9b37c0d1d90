//! Error types for the simulation core.
//!
//! [`SimError`] covers the two failure classes that are reported as errors
//! rather than as result fields: malformed input (caught while building a
//! [`Circuit`](crate::circuit::Circuit) or validating an analysis request) and
//! the numerical failures raised by the linear solver. Numerical failures are
//! normally converted into [`SolverIssue`](crate::analysis::SolverIssue)s by
//! the analysis drivers and never reach the caller as `Err`.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for the simulation core.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Circuit Construction Errors ============
    /// Node name could not be resolved
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Device definition is structurally invalid (terminal count, kind mismatch)
    #[error("Invalid device '{name}': {message}")]
    InvalidDevice { name: String, message: String },

    /// Device requires a value that was not supplied
    #[error("Device '{name}' requires a value ({what})")]
    MissingValue { name: String, what: String },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for device '{device}': {message}")]
    InvalidParameter {
        device: String,
        param: String,
        message: String,
    },

    /// Duplicate device name
    #[error("Duplicate device name '{name}'")]
    DuplicateDevice { name: String },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by device '{device}'")]
    UndefinedModel { model: String, device: String },

    /// Sweep source is missing or is not an independent source
    #[error("Unknown independent source '{name}'")]
    UnknownSource { name: String },

    // ============ Analysis Configuration Errors ============
    /// Invalid analysis parameter
    #[error("Invalid analysis parameter: {message}")]
    InvalidAnalysis { message: String },

    // ============ Numerical Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - circuit may have a floating node or a voltage source loop")]
    SingularMatrix,

    /// Linear solve produced a non-finite value
    #[error("Numerical overflow in unknown '{label}' (value: {value:.2e})")]
    NumericalOverflow { label: String, value: f64 },

    // ============ I/O Errors ============
    /// Error reading a netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Netlist or result JSON could not be (de)serialized
    #[cfg(feature = "cli")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Create an invalid device error
    pub fn invalid_device(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDevice {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a missing value error
    pub fn missing_value(name: impl Into<String>, what: impl Into<String>) -> Self {
        Self::MissingValue {
            name: name.into(),
            what: what.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        device: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            device: device.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid analysis error
    pub fn invalid_analysis(message: impl Into<String>) -> Self {
        Self::InvalidAnalysis {
            message: message.into(),
        }
    }

    /// True for failures of the numerical machinery rather than of the input.
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::SingularMatrix | Self::NumericalOverflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numerical_classification() {
        assert!(SimError::SingularMatrix.is_numerical());
        assert!(SimError::NumericalOverflow {
            label: "V(out)".to_string(),
            value: f64::NAN,
        }
        .is_numerical());
        assert!(!SimError::invalid_analysis("step must be positive").is_numerical());
        assert!(!SimError::NodeNotFound {
            node: "x".to_string()
        }
        .is_numerical());
    }

    #[test]
    fn test_messages() {
        let err = SimError::missing_value("R1", "resistance");
        assert_eq!(err.to_string(), "Device 'R1' requires a value (resistance)");
    }
}

//! Error types for simulation setup and record parsing.
//!
//! Everything that can go wrong is detected before the first iteration runs:
//! bad configuration, malformed input files, or I/O failures. The iteration
//! loop itself is infallible; numerical blow-ups are left visible in the
//! opinions rather than reported here.

use thiserror::Error;

/// Errors raised while building or loading a simulation.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Invalid parameter combination or inconsistent structure.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed record in an agent or network file.
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number in the source file.
        line: usize,
        /// What was wrong with the record.
        message: String,
    },

    /// Malformed single record (no file context).
    #[error("Invalid record: {0}")]
    ParseRecord(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML settings.
    #[error("Failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimulationError {
    /// Attach a line number to a record-level parse error.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            SimulationError::ParseRecord(message) => SimulationError::Parse { line, message },
            other => other,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_wraps_record_errors() {
        let err = SimulationError::ParseRecord("bad float".to_string()).at_line(7);
        match err {
            SimulationError::Parse { line, message } => {
                assert_eq!(line, 7);
                assert_eq!(message, "bad float");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_at_line_keeps_other_errors() {
        let err = SimulationError::Configuration("m too large".to_string()).at_line(3);
        assert!(matches!(err, SimulationError::Configuration(_)));
    }
}

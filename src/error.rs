//! Error types and handling for Forecourt
//!
//! Hardware, configuration and web failures all funnel into
//! [`ForecourtError`]. Events that the pump state machine cannot handle in
//! its current state are not errors and never show up here.

use thiserror::Error;

/// Result type alias for Forecourt operations
pub type Result<T> = std::result::Result<T, ForecourtError>;

/// Main error type for Forecourt
#[derive(Debug, Error)]
pub enum ForecourtError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// GPIO access errors (pump trigger pin)
    #[error("GPIO error: {message}")]
    Gpio { message: String },

    /// Card reader errors (SPI, MFRC522)
    #[error("RFID error: {message}")]
    Rfid { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl ForecourtError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ForecourtError::Config {
            message: message.into(),
        }
    }

    /// Create a new GPIO error
    pub fn gpio<S: Into<String>>(message: S) -> Self {
        ForecourtError::Gpio {
            message: message.into(),
        }
    }

    /// Create a new card reader error
    pub fn rfid<S: Into<String>>(message: S) -> Self {
        ForecourtError::Rfid {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        ForecourtError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        ForecourtError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ForecourtError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ForecourtError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        ForecourtError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ForecourtError {
    fn from(err: std::io::Error) -> Self {
        ForecourtError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ForecourtError {
    fn from(err: serde_yaml::Error) -> Self {
        ForecourtError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ForecourtError {
    fn from(err: serde_json::Error) -> Self {
        ForecourtError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "gpio")]
impl From<rppal::gpio::Error> for ForecourtError {
    fn from(err: rppal::gpio::Error) -> Self {
        ForecourtError::gpio(err.to_string())
    }
}

#[cfg(feature = "rfid")]
impl From<rppal::spi::Error> for ForecourtError {
    fn from(err: rppal::spi::Error) -> Self {
        ForecourtError::rfid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ForecourtError::config("test config error");
        assert!(matches!(err, ForecourtError::Config { .. }));

        let err = ForecourtError::rfid("reader missing");
        assert!(matches!(err, ForecourtError::Rfid { .. }));

        let err = ForecourtError::validation("field", "test validation error");
        assert!(matches!(err, ForecourtError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = ForecourtError::gpio("no /dev/gpiomem");
        assert_eq!(format!("{}", err), "GPIO error: no /dev/gpiomem");

        let err = ForecourtError::validation("pump.increment_rate", "must be positive");
        assert_eq!(
            format!("{}", err),
            "Validation error: pump.increment_rate - must be positive"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ForecourtError = io.into();
        assert!(matches!(err, ForecourtError::Io { .. }));
    }
}

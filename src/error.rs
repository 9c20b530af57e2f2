//! Error taxonomy shared by the feature computers and matrix transforms.

use thiserror::Error;

/// Convenient alias for results returned by the feature modules.
pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// Invalid option combination, detected at construction or first use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input that produced no output (empty waveform or feature matrix).
    #[error("data error: {0}")]
    Data(String),
}

impl FeatureError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Bail out of the current function with a [`FeatureError::Configuration`]
/// unless `cond` holds.
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::FeatureError::Configuration(format!($($arg)+)));
        }
    };
}

pub(crate) use ensure_config;

//! # Render Error Types
//!
//! All errors that can occur while loading effects or building draw calls.

use minko_data::DataError;
use thiserror::Error;

/// Errors that can occur in the render layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The effect file could not be parsed.
    #[error("invalid effect configuration: {0}")]
    Config(String),

    /// The requested technique does not exist in the effect.
    #[error("unknown technique: {0}")]
    UnknownTechnique(String),

    /// A state name that is not one of the render states.
    #[error("unknown render state: {0}")]
    UnknownState(String),

    /// A default value that does not fit its declared type.
    #[error("invalid default value for {name}: {reason}")]
    InvalidDefaultValue {
        /// Uniform or state name.
        name: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// A uniform type name that is not supported.
    #[error("unknown uniform type: {0}")]
    UnknownUniformType(String),

    /// Failure in the property namespace.
    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<toml::de::Error> for RenderError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

//! Error types for the coupling flow library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Mask type name not recognized
    #[error("Unknown mask type: {0:?}. Expected \"checkerboard\" or \"channel_wise\"")]
    UnknownMaskType(String),

    /// Both a joint net and separate scale/translate nets were supplied
    #[error("Supply either scale_net + translate_net or scale_translate_net, not both")]
    AmbiguousParameterNets,

    /// No parameter network was supplied
    #[error("No parameter network supplied: need scale_net + translate_net or scale_translate_net")]
    MissingParameterNets,

    /// Only one of the separate nets was supplied
    #[error("Incomplete parameter networks: {missing} is missing")]
    IncompleteParameterNets { missing: &'static str },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Tensor rank other than 2 or 4
    #[error("Unsupported tensor rank {0}: expected 2 (batch, features) or 4 (batch, channels, height, width)")]
    UnsupportedRank(usize),

    /// Checkerboard masking needs a spatial grid
    #[error("Checkerboard mask requires a rank-4 input, got flat features")]
    CheckerboardOnFeatures,

    /// Channel axis does not match the layer
    #[error("Channel mismatch: layer expects {expected} channels, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    /// Tensor shapes disagree
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    /// Flow sequence without layers
    #[error("Flow sequence must contain at least one flow")]
    EmptyFlow,

    /// Failure raised inside a caller-supplied parameter network
    #[error(transparent)]
    Network(#[from] anyhow::Error),

    /// ndarray reshape error
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Raised while constructing a layer; fatal, never retried
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownMaskType(_)
                | Error::AmbiguousParameterNets
                | Error::MissingParameterNets
                | Error::IncompleteParameterNets { .. }
                | Error::Config(_)
                | Error::EmptyFlow
        )
    }

    /// Raised when an input tensor has the wrong geometry for the layer
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedRank(_)
                | Error::CheckerboardOnFeatures
                | Error::ChannelMismatch { .. }
                | Error::ShapeMismatch { .. }
                | Error::Shape(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy() {
        assert!(Error::MissingParameterNets.is_config_error());
        assert!(Error::UnknownMaskType("diagonal".into()).is_config_error());
        assert!(!Error::MissingParameterNets.is_shape_error());

        assert!(Error::UnsupportedRank(3).is_shape_error());
        assert!(Error::CheckerboardOnFeatures.is_shape_error());
        assert!(!Error::CheckerboardOnFeatures.is_config_error());
    }

    #[test]
    fn test_network_error_is_transparent() {
        let err: Error = anyhow::anyhow!("scale net exploded").into();
        assert_eq!(err.to_string(), "scale net exploded");
        assert!(!err.is_config_error());
        assert!(!err.is_shape_error());
    }
}

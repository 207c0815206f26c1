//! Layer configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::flow::MaskType;

/// Default hidden dimension for the reference parameter networks
pub const DEFAULT_HIDDEN_DIM: usize = 64;

/// Default number of hidden layers in the reference parameter networks
pub const DEFAULT_NUM_HIDDEN_LAYERS: usize = 2;

/// Default bound on |log_s| produced by the joint reference network
pub const DEFAULT_SCALE_BOUND: f64 = 2.0;

/// Standard deviation of the reference network weight initialization
pub const DEFAULT_INIT_STD: f64 = 0.1;

/// Serializable description of an affine coupling layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Channel count (rank-4 input) or feature count (rank-2 input)
    pub in_channels: usize,
    /// Partition geometry
    pub mask_type: MaskType,
    /// Flip which half is the conditioning half
    #[serde(default)]
    pub inverse_mask: bool,
    /// Hidden width of the reference parameter networks
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,
    /// Hidden layer count of the reference parameter networks
    #[serde(default = "default_num_hidden")]
    pub num_hidden: usize,
    /// Bound on |log_s| for the joint reference network
    #[serde(default = "default_scale_bound")]
    pub scale_bound: f64,
}

fn default_hidden_dim() -> usize {
    DEFAULT_HIDDEN_DIM
}

fn default_num_hidden() -> usize {
    DEFAULT_NUM_HIDDEN_LAYERS
}

fn default_scale_bound() -> f64 {
    DEFAULT_SCALE_BOUND
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            in_channels: 4,
            mask_type: MaskType::ChannelWise,
            inverse_mask: false,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            num_hidden: DEFAULT_NUM_HIDDEN_LAYERS,
            scale_bound: DEFAULT_SCALE_BOUND,
        }
    }
}

impl CouplingConfig {
    /// Create a config with default network settings
    pub fn new(in_channels: usize, mask_type: MaskType, inverse_mask: bool) -> Self {
        Self {
            in_channels,
            mask_type,
            inverse_mask,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 {
            return Err(Error::Config("in_channels must be positive".into()));
        }
        if self.hidden_dim == 0 {
            return Err(Error::Config("hidden_dim must be positive".into()));
        }
        if self.num_hidden == 0 {
            return Err(Error::Config("num_hidden must be positive".into()));
        }
        if !(self.scale_bound.is_finite() && self.scale_bound > 0.0) {
            return Err(Error::Config(format!(
                "scale_bound must be positive and finite, got {}",
                self.scale_bound
            )));
        }
        Ok(())
    }
}

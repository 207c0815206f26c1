//! # Affine Coupling Layer
//!
//! Splits coordinates with a partition mask and rescales/shifts the
//! unmasked half using parameters predicted from the masked half:
//!
//! ```text
//! y = x * exp(log_s(mask * x)) + t(mask * x)
//! ```
//!
//! `log_s` and `t` are zeroed wherever the mask is 1, so those coordinates
//! pass through unchanged and the inverse can recompute the same parameters
//! from the output.

use ndarray::{Array1, ArrayD};
use std::fmt;
use tracing::{debug, trace};

use super::mask::{self, MaskType, TensorLayout};
use super::params::{JointParamFn, ParamFn, ParameterNet};
use super::{Flow, FlowOutput};
use crate::config::CouplingConfig;
use crate::error::{Error, Result};

/// Affine coupling layer
#[derive(Debug)]
pub struct AffineCoupling {
    /// Declared channel (or feature) count
    in_channels: usize,
    /// Partition geometry
    mask_type: MaskType,
    /// Whether the mask parity is flipped
    inverse_mask: bool,
    /// Scale/translation networks
    nets: ParameterNet,
}

impl AffineCoupling {
    /// Create a layer from resolved parameter networks
    pub fn new(
        in_channels: usize,
        mask_type: MaskType,
        inverse_mask: bool,
        nets: ParameterNet,
    ) -> Result<Self> {
        if in_channels == 0 {
            return Err(Error::Config("in_channels must be positive".into()));
        }

        debug!(
            in_channels,
            mask_type = mask_type.as_str(),
            inverse_mask,
            nets = nets.kind(),
            "created affine coupling layer"
        );

        Ok(Self {
            in_channels,
            mask_type,
            inverse_mask,
            nets,
        })
    }

    /// Create a layer from a config
    pub fn from_config(config: &CouplingConfig, nets: ParameterNet) -> Result<Self> {
        config.validate()?;
        Self::new(config.in_channels, config.mask_type, config.inverse_mask, nets)
    }

    /// Start building a layer
    pub fn builder(in_channels: usize) -> AffineCouplingBuilder {
        AffineCouplingBuilder::new(in_channels)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn mask_type(&self) -> MaskType {
        self.mask_type
    }

    pub fn inverse_mask(&self) -> bool {
        self.inverse_mask
    }

    fn layout(&self, x: &ArrayD<f64>) -> Result<TensorLayout> {
        let layout = TensorLayout::infer(x.shape())?;
        if self.mask_type == MaskType::Checkerboard {
            if let TensorLayout::Features { .. } = layout {
                return Err(Error::CheckerboardOnFeatures);
            }
        }
        if layout.channels() != self.in_channels {
            return Err(Error::ChannelMismatch {
                expected: self.in_channels,
                got: layout.channels(),
            });
        }
        Ok(layout)
    }

    /// Mask for `x`, at a shape that broadcasts against it
    pub fn build_mask(&self, x: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        let layout = self.layout(x)?;
        mask::build_mask(layout, self.mask_type, self.inverse_mask)
    }

    /// Compute `(log_s, t)` for `x`, both zero on the conditioning half
    pub fn get_parameters(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
    ) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
        let mask = self.build_mask(x)?;
        let x_masked = x * &mask;

        let (log_s, t) = self.nets.predict(&x_masked, cond)?;

        // The nets may write anywhere; only the unmasked half may move.
        let keep = mask.mapv(|m| 1.0 - m);
        Ok((&log_s * &keep, &t * &keep))
    }

    /// x -> y. The log-determinant is returned when `compute_jacobian` is set.
    pub fn forward(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
        compute_jacobian: bool,
    ) -> Result<FlowOutput> {
        let (log_s, t) = self.get_parameters(x, cond)?;
        let output = &(x * &log_s.mapv(f64::exp)) + &t;

        let log_det = compute_jacobian.then(|| log_det_jacobian(&log_s));
        if let Some(ld) = &log_det {
            trace!(batch = ld.len(), mean_log_det = ld.mean().unwrap_or(0.0), "coupling forward");
        }

        Ok(FlowOutput { output, log_det })
    }

    /// y -> x, recomputing the parameters from `z`'s untouched half
    pub fn inverse(&self, z: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>> {
        let (log_s, t) = self.get_parameters(z, cond)?;
        trace!(shape = ?z.shape(), "coupling inverse");
        Ok(&(z - &t) * &log_s.mapv(|v| (-v).exp()))
    }
}

/// Sum of `log_s` over every axis but the batch axis
fn log_det_jacobian(log_s: &ArrayD<f64>) -> Array1<f64> {
    log_s.outer_iter().map(|sample| sample.sum()).collect()
}

impl Flow for AffineCoupling {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn forward(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
        compute_jacobian: bool,
    ) -> Result<FlowOutput> {
        AffineCoupling::forward(self, x, cond, compute_jacobian)
    }

    fn inverse(&self, z: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>> {
        AffineCoupling::inverse(self, z, cond)
    }
}

impl fmt::Display for AffineCoupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in_features={}, mask_type={}, inverse_mask={}",
            self.in_channels, self.mask_type, self.inverse_mask
        )
    }
}

/// Builder validating the parameter network configuration.
///
/// Exactly one of `scale_net` + `translate_net` or `scale_translate_net`
/// must be given.
pub struct AffineCouplingBuilder {
    in_channels: usize,
    mask_type: Result<MaskType>,
    inverse_mask: bool,
    scale_net: Option<Box<dyn ParamFn>>,
    translate_net: Option<Box<dyn ParamFn>>,
    scale_translate_net: Option<Box<dyn JointParamFn>>,
}

impl AffineCouplingBuilder {
    pub fn new(in_channels: usize) -> Self {
        Self {
            in_channels,
            mask_type: Ok(MaskType::ChannelWise),
            inverse_mask: false,
            scale_net: None,
            translate_net: None,
            scale_translate_net: None,
        }
    }

    /// Take mask settings from a config
    pub fn from_config(config: &CouplingConfig) -> Self {
        Self::new(config.in_channels)
            .mask_type(config.mask_type)
            .inverse_mask(config.inverse_mask)
    }

    pub fn mask_type(mut self, mask_type: MaskType) -> Self {
        self.mask_type = Ok(mask_type);
        self
    }

    /// Set the mask type by name; an unknown name fails in `build`
    pub fn mask_type_name(mut self, name: &str) -> Self {
        self.mask_type = name.parse();
        self
    }

    pub fn inverse_mask(mut self, inverse_mask: bool) -> Self {
        self.inverse_mask = inverse_mask;
        self
    }

    pub fn scale_net(mut self, net: impl ParamFn + 'static) -> Self {
        self.scale_net = Some(Box::new(net));
        self
    }

    pub fn translate_net(mut self, net: impl ParamFn + 'static) -> Self {
        self.translate_net = Some(Box::new(net));
        self
    }

    pub fn scale_translate_net(mut self, net: impl JointParamFn + 'static) -> Self {
        self.scale_translate_net = Some(Box::new(net));
        self
    }

    pub fn build(self) -> Result<AffineCoupling> {
        let mask_type = self.mask_type?;

        let nets = match (self.scale_net, self.translate_net, self.scale_translate_net) {
            (Some(scale), Some(translate), None) => ParameterNet::Separate { scale, translate },
            (None, None, Some(joint)) => ParameterNet::Joint(joint),
            (None, None, None) => return Err(Error::MissingParameterNets),
            (_, _, Some(_)) => return Err(Error::AmbiguousParameterNets),
            (Some(_), None, None) => {
                return Err(Error::IncompleteParameterNets {
                    missing: "translate_net",
                })
            }
            (None, Some(_), None) => {
                return Err(Error::IncompleteParameterNets { missing: "scale_net" })
            }
        };

        AffineCoupling::new(self.in_channels, mask_type, self.inverse_mask, nets)
    }
}

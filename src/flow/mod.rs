//! Flow module: affine coupling layers and the pieces they are built from

mod coupling;
mod mask;
mod network;
mod params;
mod sequential;

pub use coupling::{AffineCoupling, AffineCouplingBuilder};
pub use mask::{build_mask, channel_wise_mask, checkerboard_mask, MaskType, TensorLayout};
pub use network::{Mlp, ScaleTranslateMlp};
pub use params::{JointParamFn, ParamFn, ParameterNet};
pub use sequential::FlowSequence;

use ndarray::{Array1, ArrayD};

use crate::error::Result;

/// Result of a forward pass
#[derive(Debug, Clone)]
pub struct FlowOutput {
    /// Transformed tensor, same shape as the input
    pub output: ArrayD<f64>,
    /// Per-sample log |det J|, present when the Jacobian was requested
    pub log_det: Option<Array1<f64>>,
}

/// An invertible transform with a tractable Jacobian log-determinant
pub trait Flow: Send + Sync {
    /// Channel (or feature) count this flow was declared with
    fn in_channels(&self) -> usize;

    /// x -> z, optionally reporting the per-sample log-determinant
    fn forward(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
        compute_jacobian: bool,
    ) -> Result<FlowOutput>;

    /// z -> x
    fn inverse(&self, z: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>>;
}

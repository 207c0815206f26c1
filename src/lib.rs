//! # Coupling Flow
//!
//! Affine coupling layers for normalizing flows.
//!
//! This library provides:
//! - Checkerboard and channel-wise partition masks
//! - An affine coupling layer with closed-form inverse and per-sample
//!   Jacobian log-determinant
//! - Pluggable scale/translation networks (separate or joint), with an
//!   optional side-conditioning input
//! - A flow sequence that chains layers and evaluates exact log-likelihoods
//!
//! ## Example
//!
//! ```rust
//! use coupling_flow::flow::{AffineCoupling, MaskType};
//! use coupling_flow::Result;
//! use ndarray::{ArrayD, IxDyn};
//!
//! fn main() -> Result<()> {
//!     let layer = AffineCoupling::builder(2)
//!         .mask_type(MaskType::Checkerboard)
//!         .scale_net(|x: &ArrayD<f64>, _: Option<&ArrayD<f64>>| -> Result<ArrayD<f64>> {
//!             Ok(x.mapv(f64::tanh))
//!         })
//!         .translate_net(|x: &ArrayD<f64>, _: Option<&ArrayD<f64>>| -> Result<ArrayD<f64>> {
//!             Ok(x * 0.5)
//!         })
//!         .build()?;
//!
//!     let x = ArrayD::from_elem(IxDyn(&[1, 2, 4, 4]), 0.3);
//!     let out = layer.forward(&x, None, true)?;
//!     let x_rec = layer.inverse(&out.output, None)?;
//!
//!     assert!((&x - &x_rec).iter().all(|d| d.abs() < 1e-10));
//!     assert_eq!(out.log_det.map(|ld| ld.len()), Some(1));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod flow;

// Re-export main types
pub use config::CouplingConfig;
pub use error::{Error, Result};
pub use flow::{
    AffineCoupling, AffineCouplingBuilder, Flow, FlowOutput, FlowSequence, MaskType,
    ParameterNet, TensorLayout,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Parameter Networks
//!
//! The coupling layer treats its scale and translation networks as opaque
//! functions of the masked input and an optional side-conditioning tensor.
//! Either two separate networks or one joint network may be supplied.

use ndarray::ArrayD;
use std::fmt;

use crate::error::{Error, Result};

/// Single-output parameter network (scale net or translation net)
pub trait ParamFn: Send + Sync {
    fn call(&self, x: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>>;
}

impl<F> ParamFn for F
where
    F: Fn(&ArrayD<f64>, Option<&ArrayD<f64>>) -> Result<ArrayD<f64>> + Send + Sync,
{
    fn call(&self, x: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>> {
        self(x, cond)
    }
}

/// Joint network returning `(log_s, t)` in one call
pub trait JointParamFn: Send + Sync {
    fn call(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
    ) -> Result<(ArrayD<f64>, ArrayD<f64>)>;
}

impl<F> JointParamFn for F
where
    F: Fn(&ArrayD<f64>, Option<&ArrayD<f64>>) -> Result<(ArrayD<f64>, ArrayD<f64>)> + Send + Sync,
{
    fn call(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
    ) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
        self(x, cond)
    }
}

/// The parameter networks owned by a coupling layer
pub enum ParameterNet {
    /// Independent scale and translation networks
    Separate {
        scale: Box<dyn ParamFn>,
        translate: Box<dyn ParamFn>,
    },
    /// One network producing both fields
    Joint(Box<dyn JointParamFn>),
}

impl ParameterNet {
    /// Wrap a pair of separate networks
    pub fn separate(scale: impl ParamFn + 'static, translate: impl ParamFn + 'static) -> Self {
        ParameterNet::Separate {
            scale: Box::new(scale),
            translate: Box::new(translate),
        }
    }

    /// Wrap a joint network
    pub fn joint(net: impl JointParamFn + 'static) -> Self {
        ParameterNet::Joint(Box::new(net))
    }

    /// Predict `(log_s, t)` from the masked input.
    ///
    /// Both outputs must have the input's shape. Errors raised by the
    /// networks are returned as-is.
    pub fn predict(
        &self,
        x_masked: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
    ) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
        let (log_s, t) = match self {
            ParameterNet::Separate { scale, translate } => {
                (scale.call(x_masked, cond)?, translate.call(x_masked, cond)?)
            }
            ParameterNet::Joint(net) => net.call(x_masked, cond)?,
        };

        check_shape(x_masked, &log_s)?;
        check_shape(x_masked, &t)?;

        Ok((log_s, t))
    }

    /// Variant name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterNet::Separate { .. } => "separate",
            ParameterNet::Joint(_) => "joint",
        }
    }
}

impl fmt::Debug for ParameterNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterNet::{}", self.kind())
    }
}

fn check_shape(input: &ArrayD<f64>, output: &ArrayD<f64>) -> Result<()> {
    if input.shape() != output.shape() {
        return Err(Error::ShapeMismatch {
            expected: input.shape().to_vec(),
            got: output.shape().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn ones(x: &ArrayD<f64>, _cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>> {
        Ok(ArrayD::ones(x.raw_dim()))
    }

    #[test]
    fn test_separate_predict() {
        let net = ParameterNet::separate(
            ones,
            |x: &ArrayD<f64>, _: Option<&ArrayD<f64>>| -> Result<ArrayD<f64>> { Ok(x * 2.0) },
        );
        let x = ArrayD::from_elem(IxDyn(&[2, 3]), 1.5);
        let (log_s, t) = net.predict(&x, None).unwrap();
        assert!(log_s.iter().all(|&v| v == 1.0));
        assert!(t.iter().all(|&v| v == 3.0));
        assert_eq!(net.kind(), "separate");
    }

    #[test]
    fn test_joint_forwards_conditioning() {
        let net = ParameterNet::joint(
            |x: &ArrayD<f64>, cond: Option<&ArrayD<f64>>| -> Result<(ArrayD<f64>, ArrayD<f64>)> {
                let c = cond.map(|c| c.sum()).unwrap_or(0.0);
                Ok((ArrayD::from_elem(x.raw_dim(), c), ArrayD::zeros(x.raw_dim())))
            },
        );
        let x = ArrayD::zeros(IxDyn(&[1, 4]));
        let cond = ArrayD::from_elem(IxDyn(&[1, 2]), 0.25);

        let (log_s, _) = net.predict(&x, Some(&cond)).unwrap();
        assert!(log_s.iter().all(|&v| v == 0.5));

        let (log_s, _) = net.predict(&x, None).unwrap();
        assert!(log_s.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_output_shape_checked() {
        let net = ParameterNet::separate(
            ones,
            |_: &ArrayD<f64>, _: Option<&ArrayD<f64>>| -> Result<ArrayD<f64>> {
                Ok(ArrayD::zeros(IxDyn(&[1, 1])))
            },
        );
        let x = ArrayD::zeros(IxDyn(&[2, 4]));
        assert!(matches!(
            net.predict(&x, None),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_network_error_propagates() {
        let net = ParameterNet::separate(
            |_: &ArrayD<f64>, _: Option<&ArrayD<f64>>| -> Result<ArrayD<f64>> {
                Err(anyhow::anyhow!("weights not loaded").into())
            },
            ones,
        );
        let x = ArrayD::zeros(IxDyn(&[1, 2]));
        let err = net.predict(&x, None).unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.to_string(), "weights not loaded");
    }
}

//! # Reference Parameter Networks
//!
//! Dense ReLU networks usable as scale, translation or joint
//! scale-translation networks. Each sample is flattened (and concatenated
//! with its flattened conditioning tensor, if any) before the dense layers,
//! and the output is reshaped back to the sample's shape.

use ndarray::{s, Array1, Array2, ArrayD, Axis};
use rand::Rng;
use rand_distr::StandardNormal;

use super::params::{JointParamFn, ParamFn};
use crate::config::{CouplingConfig, DEFAULT_INIT_STD};
use crate::error::{Error, Result};

/// Simple MLP (Multi-Layer Perceptron)
#[derive(Debug, Clone)]
pub struct Mlp {
    /// Weight matrices for each layer
    weights: Vec<Array2<f64>>,
    /// Bias vectors for each layer
    biases: Vec<Array1<f64>>,
}

impl Mlp {
    /// Create a new MLP with given architecture
    pub fn new(input_dim: usize, hidden_dim: usize, output_dim: usize, num_hidden: usize) -> Self {
        Self::with_rng(input_dim, hidden_dim, output_dim, num_hidden, &mut rand::thread_rng())
    }

    /// Create a new MLP drawing its weights from `rng`.
    ///
    /// `num_hidden` below 1 still builds one hidden layer.
    pub fn with_rng<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_dim: usize,
        output_dim: usize,
        num_hidden: usize,
        rng: &mut R,
    ) -> Self {
        let mut dims = vec![input_dim];
        dims.extend(std::iter::repeat(hidden_dim).take(num_hidden.max(1)));
        dims.push(output_dim);

        let mut weights = Vec::with_capacity(dims.len() - 1);
        let mut biases = Vec::with_capacity(dims.len() - 1);

        for pair in dims.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let w = Array2::from_shape_fn((fan_out, fan_in), |_| {
                DEFAULT_INIT_STD * rng.sample::<f64, _>(StandardNormal)
            });
            weights.push(w);
            biases.push(Array1::zeros(fan_out));
        }

        Self { weights, biases }
    }

    pub fn input_dim(&self) -> usize {
        self.weights[0].ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights[self.weights.len() - 1].nrows()
    }

    /// Total number of weights and biases
    pub fn num_parameters(&self) -> usize {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .map(|(w, b)| w.len() + b.len())
            .sum()
    }

    /// Forward pass through MLP with ReLU activations
    pub fn forward(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut h = x.clone();

        for i in 0..self.weights.len() - 1 {
            h = self.weights[i].dot(&h) + &self.biases[i];
            h.mapv_inplace(|v| v.max(0.0));
        }

        // Final layer (no activation)
        let last_idx = self.weights.len() - 1;
        self.weights[last_idx].dot(&h) + &self.biases[last_idx]
    }

    /// Run every sample of a batched tensor; returns `(batch, output_dim)`
    pub fn forward_batch(&self, x: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<Array2<f64>> {
        if x.ndim() == 0 {
            return Err(Error::UnsupportedRank(0));
        }
        if let Some(c) = cond {
            if c.ndim() == 0 {
                return Err(Error::UnsupportedRank(0));
            }
        }
        let batch = x.len_of(Axis(0));
        if let Some(c) = cond {
            if c.len_of(Axis(0)) != batch {
                return Err(Error::ShapeMismatch {
                    expected: vec![batch],
                    got: vec![c.len_of(Axis(0))],
                });
            }
        }

        let mut out = Array2::zeros((batch, self.output_dim()));
        for (b, sample) in x.outer_iter().enumerate() {
            let mut input: Vec<f64> = sample.iter().cloned().collect();
            if let Some(c) = cond {
                input.extend(c.index_axis(Axis(0), b).iter().cloned());
            }
            if input.len() != self.input_dim() {
                return Err(Error::ShapeMismatch {
                    expected: vec![self.input_dim()],
                    got: vec![input.len()],
                });
            }
            out.row_mut(b).assign(&self.forward(&Array1::from_vec(input)));
        }

        Ok(out)
    }
}

impl ParamFn for Mlp {
    fn call(&self, x: &ArrayD<f64>, cond: Option<&ArrayD<f64>>) -> Result<ArrayD<f64>> {
        let out = self.forward_batch(x, cond)?;
        Ok(out.into_shape(x.raw_dim())?)
    }
}

/// One MLP predicting both `log_s` and `t`.
///
/// `log_s = scale_bound * tanh(raw)` keeps the scale factor within
/// `exp(±scale_bound)`.
#[derive(Debug, Clone)]
pub struct ScaleTranslateMlp {
    net: Mlp,
    sample_dim: usize,
    scale_bound: f64,
}

impl ScaleTranslateMlp {
    /// `sample_dim` is the flattened size of one sample, `cond_dim` of one
    /// conditioning sample (0 when unconditioned)
    pub fn new(
        sample_dim: usize,
        cond_dim: usize,
        hidden_dim: usize,
        num_hidden: usize,
        scale_bound: f64,
    ) -> Self {
        Self::with_rng(
            sample_dim,
            cond_dim,
            hidden_dim,
            num_hidden,
            scale_bound,
            &mut rand::thread_rng(),
        )
    }

    pub fn with_rng<R: Rng + ?Sized>(
        sample_dim: usize,
        cond_dim: usize,
        hidden_dim: usize,
        num_hidden: usize,
        scale_bound: f64,
        rng: &mut R,
    ) -> Self {
        let net = Mlp::with_rng(sample_dim + cond_dim, hidden_dim, 2 * sample_dim, num_hidden, rng);
        Self {
            net,
            sample_dim,
            scale_bound,
        }
    }

    /// Network sized from a layer config
    pub fn from_config<R: Rng + ?Sized>(
        config: &CouplingConfig,
        sample_dim: usize,
        cond_dim: usize,
        rng: &mut R,
    ) -> Self {
        Self::with_rng(
            sample_dim,
            cond_dim,
            config.hidden_dim,
            config.num_hidden,
            config.scale_bound,
            rng,
        )
    }

    pub fn num_parameters(&self) -> usize {
        self.net.num_parameters()
    }
}

impl JointParamFn for ScaleTranslateMlp {
    fn call(
        &self,
        x: &ArrayD<f64>,
        cond: Option<&ArrayD<f64>>,
    ) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
        let out = self.net.forward_batch(x, cond)?;
        let d = self.sample_dim;
        let bound = self.scale_bound;

        let log_s = out.slice(s![.., ..d]).mapv(|v| bound * v.tanh());
        let t = out.slice(s![.., d..]).to_owned();

        Ok((log_s.into_shape(x.raw_dim())?, t.into_shape(x.raw_dim())?))
    }
}

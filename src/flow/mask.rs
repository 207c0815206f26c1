//! # Partition Masks
//!
//! Binary masks that split coordinates into a conditioning half (1) and a
//! transformed half (0). Masks are built at broadcast shapes so they combine
//! with batched tensors directly:
//!
//! - checkerboard over an image: `(1, 1, H, W)`
//! - channel-wise over an image: `(1, C, 1, 1)`
//! - channel-wise over flat features: `(1, F)`

use ndarray::{Array1, Array2, ArrayD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Partition geometry of a coupling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskType {
    /// Alternating 0/1 over the spatial grid, shared by all channels
    Checkerboard,
    /// First half of the channels against the second half
    ChannelWise,
}

impl MaskType {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskType::Checkerboard => "checkerboard",
            MaskType::ChannelWise => "channel_wise",
        }
    }
}

impl fmt::Display for MaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "checkerboard" => Ok(MaskType::Checkerboard),
            "channel_wise" | "channel-wise" => Ok(MaskType::ChannelWise),
            other => Err(Error::UnknownMaskType(other.to_string())),
        }
    }
}

/// Structural layout of a batched tensor, batch axis excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// (batch, channels, height, width)
    Image {
        channels: usize,
        height: usize,
        width: usize,
    },
    /// (batch, features)
    Features { features: usize },
}

impl TensorLayout {
    /// Infer the layout from a full tensor shape
    pub fn infer(shape: &[usize]) -> Result<Self> {
        match *shape {
            [_, channels, height, width] => Ok(TensorLayout::Image {
                channels,
                height,
                width,
            }),
            [_, features] => Ok(TensorLayout::Features { features }),
            _ => Err(Error::UnsupportedRank(shape.len())),
        }
    }

    /// Size of the axis that `in_channels` describes
    pub fn channels(&self) -> usize {
        match *self {
            TensorLayout::Image { channels, .. } => channels,
            TensorLayout::Features { features } => features,
        }
    }
}

/// Checkerboard pattern over a `height x width` grid.
///
/// Value at `(i, j)` is `(i + j + 1) % 2` when `inverse` is false, so the
/// top-left corner is 1; the inverted pattern starts with 0.
pub fn checkerboard_mask(height: usize, width: usize, inverse: bool) -> Array2<f64> {
    let bias = usize::from(!inverse);
    Array2::from_shape_fn((height, width), |(i, j)| ((i + j + bias) % 2) as f64)
}

/// Channel partition: the first `channels / 2` entries are 1, or the
/// remaining ones when `inverse` is set.
pub fn channel_wise_mask(channels: usize, inverse: bool) -> Array1<f64> {
    let split = channels / 2;
    Array1::from_shape_fn(channels, |c| if (c < split) != inverse { 1.0 } else { 0.0 })
}

/// Build a mask at the broadcast shape for `layout`
pub fn build_mask(layout: TensorLayout, mask_type: MaskType, inverse: bool) -> Result<ArrayD<f64>> {
    let mask = match (layout, mask_type) {
        (TensorLayout::Image { height, width, .. }, MaskType::Checkerboard) => {
            checkerboard_mask(height, width, inverse)
                .into_shape((1, 1, height, width))?
                .into_dyn()
        }
        (TensorLayout::Image { channels, .. }, MaskType::ChannelWise) => {
            channel_wise_mask(channels, inverse)
                .into_shape((1, channels, 1, 1))?
                .into_dyn()
        }
        (TensorLayout::Features { features }, MaskType::ChannelWise) => {
            channel_wise_mask(features, inverse)
                .into_shape((1, features))?
                .into_dyn()
        }
        (TensorLayout::Features { .. }, MaskType::Checkerboard) => {
            return Err(Error::CheckerboardOnFeatures)
        }
    };
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, IxDyn};

    #[test]
    fn test_checkerboard_5x4() {
        let expected = arr2(&[
            [1., 0., 1., 0.],
            [0., 1., 0., 1.],
            [1., 0., 1., 0.],
            [0., 1., 0., 1.],
            [1., 0., 1., 0.],
        ]);
        assert_eq!(checkerboard_mask(5, 4, false), expected);

        let expected_inv = arr2(&[
            [0., 1., 0., 1.],
            [1., 0., 1., 0.],
            [0., 1., 0., 1.],
            [1., 0., 1., 0.],
            [0., 1., 0., 1.],
        ]);
        assert_eq!(checkerboard_mask(5, 4, true), expected_inv);
    }

    #[test]
    fn test_channel_wise_6() {
        assert_eq!(channel_wise_mask(6, false), arr1(&[1., 1., 1., 0., 0., 0.]));
        assert_eq!(channel_wise_mask(6, true), arr1(&[0., 0., 0., 1., 1., 1.]));
    }

    #[test]
    fn test_channel_wise_odd() {
        assert_eq!(channel_wise_mask(5, false), arr1(&[1., 1., 0., 0., 0.]));
        assert_eq!(channel_wise_mask(5, true), arr1(&[0., 0., 1., 1., 1.]));
    }

    #[test]
    fn test_masks_are_complementary() {
        for (h, w) in [(1, 1), (2, 3), (5, 4), (7, 7)] {
            let sum = checkerboard_mask(h, w, false) + checkerboard_mask(h, w, true);
            assert!(sum.iter().all(|&v| v == 1.0), "{}x{}", h, w);
        }
        for c in 1..9 {
            let sum = channel_wise_mask(c, false) + channel_wise_mask(c, true);
            assert!(sum.iter().all(|&v| v == 1.0), "{} channels", c);
        }
    }

    #[test]
    fn test_build_mask_shapes() {
        let image = TensorLayout::infer(&[2, 4, 3, 5]).unwrap();

        let mask = build_mask(image, MaskType::Checkerboard, false).unwrap();
        assert_eq!(mask.shape(), &[1, 1, 3, 5]);

        let mask = build_mask(image, MaskType::ChannelWise, false).unwrap();
        assert_eq!(mask.shape(), &[1, 4, 1, 1]);
        assert_eq!(mask[IxDyn(&[0, 1, 0, 0])], 1.0);
        assert_eq!(mask[IxDyn(&[0, 2, 0, 0])], 0.0);

        let flat = TensorLayout::infer(&[8, 6]).unwrap();
        let mask = build_mask(flat, MaskType::ChannelWise, true).unwrap();
        assert_eq!(mask.shape(), &[1, 6]);
        assert_eq!(mask.sum(), 3.0);
    }

    #[test]
    fn test_build_mask_is_deterministic() {
        let layout = TensorLayout::infer(&[3, 2, 6, 6]).unwrap();
        let a = build_mask(layout, MaskType::Checkerboard, true).unwrap();
        let b = build_mask(layout, MaskType::Checkerboard, true).unwrap();
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn test_rank_validation() {
        assert!(matches!(
            TensorLayout::infer(&[2, 3, 4]),
            Err(Error::UnsupportedRank(3))
        ));
        assert!(matches!(TensorLayout::infer(&[5]), Err(Error::UnsupportedRank(1))));

        let flat = TensorLayout::infer(&[2, 4]).unwrap();
        assert!(matches!(
            build_mask(flat, MaskType::Checkerboard, false),
            Err(Error::CheckerboardOnFeatures)
        ));
    }

    #[test]
    fn test_mask_type_parse() {
        assert_eq!("checkerboard".parse::<MaskType>().unwrap(), MaskType::Checkerboard);
        assert_eq!("channel_wise".parse::<MaskType>().unwrap(), MaskType::ChannelWise);
        assert_eq!("channel-wise".parse::<MaskType>().unwrap(), MaskType::ChannelWise);
        assert!(matches!(
            "diagonal".parse::<MaskType>(),
            Err(Error::UnknownMaskType(_))
        ));
        assert_eq!(MaskType::ChannelWise.to_string(), "channel_wise");
    }
}

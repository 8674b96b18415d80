//! Shape and padding algebra for NCHW convolution
//!
//! Derives the output shape and total spatial padding from the input shape,
//! filter shape, strides, dilations, and padding policy. The output spatial
//! size always follows
//!
//! ```text
//! out = floor((in + pad_total - dilation * (k - 1) - 1) / stride) + 1
//! ```
//!
//! `Same` chooses `pad_total` so a stride-1 output matches the input spatial
//! size (`out = ceil(in / stride)` in general); `Valid` applies no padding;
//! `Explicit` takes the caller's per-axis totals verbatim.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TejerError};

/// Padding policy for a convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Padding {
    /// Pad so that a stride-1 output matches the input spatial size
    Same,
    /// No padding
    Valid,
    /// Explicit total padding per spatial axis (split as `before = total >> 1`,
    /// `after = total - before`)
    Explicit {
        /// Total padding along the height axis
        pad_h: usize,
        /// Total padding along the width axis
        pad_w: usize,
    },
}

/// Resolved output geometry for one convolution call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedShape {
    /// Output shape as `[N, OutC, Hout, Wout]`
    pub output_shape: [usize; 4],
    /// Total padding per spatial axis as `[pad_h, pad_w]`
    pub padding: [usize; 2],
}

/// Per-edge padding amounts derived from the per-axis totals
///
/// The before/after split keeps the real-data origin fixed: tiling shortfall
/// is only ever appended to `bottom` and `right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaddingSpec {
    /// Rows of zero padding above the input
    pub top: usize,
    /// Rows of zero padding below the input
    pub bottom: usize,
    /// Columns of zero padding left of the input
    pub left: usize,
    /// Columns of zero padding right of the input
    pub right: usize,
}

impl PaddingSpec {
    /// Split per-axis totals into per-edge amounts
    ///
    /// `before = total >> 1`, `after = total - before` on each axis.
    #[must_use]
    pub fn split(pad_h_total: usize, pad_w_total: usize) -> Self {
        let top = pad_h_total >> 1;
        let left = pad_w_total >> 1;
        Self {
            top,
            bottom: pad_h_total - top,
            left,
            right: pad_w_total - left,
        }
    }
}

/// Effective spatial extent of a dilated kernel
#[inline]
#[must_use]
pub fn dilated_kernel_extent(kernel: usize, dilation: usize) -> usize {
    (kernel - 1) * dilation + 1
}

fn output_extent(in_size: usize, pad_total: usize, k_eff: usize, stride: usize) -> Result<usize> {
    let span = in_size + pad_total;
    if span < k_eff {
        return Err(TejerError::InvalidConfiguration {
            reason: format!(
                "padded input extent {span} is smaller than effective kernel extent {k_eff}"
            ),
        });
    }
    Ok((span - k_eff) / stride + 1)
}

/// Resolve the output shape and total padding for an NCHW convolution
///
/// # Arguments
///
/// * `input_shape` - `[N, C, H, W]`
/// * `filter_shape` - `[OutC, InC, KH, KW]`
/// * `strides` - `(stride_h, stride_w)`
/// * `dilations` - `(dilation_h, dilation_w)`
/// * `padding` - padding policy
///
/// # Errors
///
/// - [`TejerError::InvalidShape`] if either shape is not rank 4
/// - [`TejerError::ShapeContract`] if filter input channels do not match the
///   input channel count (a caller bug, never a runtime condition)
/// - [`TejerError::InvalidConfiguration`] for a zero stride/dilation or a
///   non-positive resolved output extent
pub fn resolve(
    input_shape: &[usize],
    filter_shape: &[usize],
    strides: (usize, usize),
    dilations: (usize, usize),
    padding: Padding,
) -> Result<ResolvedShape> {
    if input_shape.len() != 4 {
        return Err(TejerError::InvalidShape {
            reason: format!("input must be rank-4 NCHW, got rank {}", input_shape.len()),
        });
    }
    if filter_shape.len() != 4 {
        return Err(TejerError::InvalidShape {
            reason: format!(
                "filter must be rank-4 [OutC, InC, KH, KW], got rank {}",
                filter_shape.len()
            ),
        });
    }
    if input_shape.contains(&0) || filter_shape.contains(&0) {
        return Err(TejerError::InvalidShape {
            reason: "shape dimensions cannot be zero".to_string(),
        });
    }
    if strides.0 == 0 || strides.1 == 0 || dilations.0 == 0 || dilations.1 == 0 {
        return Err(TejerError::InvalidConfiguration {
            reason: "strides and dilations must be positive".to_string(),
        });
    }

    let [batch, in_c, in_h, in_w] = [
        input_shape[0],
        input_shape[1],
        input_shape[2],
        input_shape[3],
    ];
    let [out_c, filter_in_c, k_h, k_w] = [
        filter_shape[0],
        filter_shape[1],
        filter_shape[2],
        filter_shape[3],
    ];

    if filter_in_c != in_c {
        return Err(TejerError::ShapeContract {
            reason: format!("filter input channels {filter_in_c} != input channels {in_c}"),
        });
    }

    let k_eff_h = dilated_kernel_extent(k_h, dilations.0);
    let k_eff_w = dilated_kernel_extent(k_w, dilations.1);

    let (pad_h, pad_w) = match padding {
        Padding::Valid => (0, 0),
        Padding::Explicit { pad_h, pad_w } => (pad_h, pad_w),
        Padding::Same => {
            let out_h = in_h.div_ceil(strides.0);
            let out_w = in_w.div_ceil(strides.1);
            let pad_h = ((out_h - 1) * strides.0 + k_eff_h).saturating_sub(in_h);
            let pad_w = ((out_w - 1) * strides.1 + k_eff_w).saturating_sub(in_w);
            (pad_h, pad_w)
        }
    };

    let out_h = output_extent(in_h, pad_h, k_eff_h, strides.0)?;
    let out_w = output_extent(in_w, pad_w, k_eff_w, strides.1)?;

    Ok(ResolvedShape {
        output_shape: [batch, out_c, out_h, out_w],
        padding: [pad_h, pad_w],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_stride1_preserves_spatial_size() {
        let r = resolve(&[1, 8, 5, 5], &[8, 8, 3, 3], (1, 1), (1, 1), Padding::Same).unwrap();
        assert_eq!(r.output_shape, [1, 8, 5, 5]);
        assert_eq!(r.padding, [2, 2]);
    }

    #[test]
    fn test_same_stride2_ceil() {
        let r = resolve(&[1, 4, 9, 9], &[6, 4, 3, 3], (2, 2), (1, 1), Padding::Same).unwrap();
        assert_eq!(r.output_shape, [1, 6, 5, 5]);
    }

    #[test]
    fn test_valid_no_padding() {
        let r = resolve(&[2, 3, 9, 11], &[4, 3, 3, 3], (1, 1), (1, 1), Padding::Valid).unwrap();
        assert_eq!(r.output_shape, [2, 4, 7, 9]);
        assert_eq!(r.padding, [0, 0]);
    }

    #[test]
    fn test_explicit_padding_floor_formula() {
        let r = resolve(
            &[1, 8, 6, 7],
            &[8, 8, 3, 3],
            (1, 1),
            (1, 1),
            Padding::Explicit { pad_h: 2, pad_w: 2 },
        )
        .unwrap();
        assert_eq!(r.output_shape, [1, 8, 6, 7]);
    }

    #[test]
    fn test_dilation_widens_kernel_extent() {
        // effective 3x3 extent with dilation 2 is 5x5
        let r = resolve(&[1, 4, 10, 10], &[4, 4, 3, 3], (1, 1), (2, 2), Padding::Valid).unwrap();
        assert_eq!(r.output_shape, [1, 4, 6, 6]);
        let r = resolve(&[1, 4, 10, 10], &[4, 4, 3, 3], (1, 1), (2, 2), Padding::Same).unwrap();
        assert_eq!(r.output_shape, [1, 4, 10, 10]);
        assert_eq!(r.padding, [4, 4]);
    }

    #[test]
    fn test_channel_mismatch_is_contract_violation() {
        let result = resolve(&[1, 3, 5, 5], &[4, 2, 3, 3], (1, 1), (1, 1), Padding::Same);
        assert!(matches!(
            result.unwrap_err(),
            TejerError::ShapeContract { .. }
        ));
    }

    #[test]
    fn test_kernel_larger_than_input_fails() {
        let result = resolve(&[1, 1, 2, 2], &[1, 1, 3, 3], (1, 1), (1, 1), Padding::Valid);
        assert!(matches!(
            result.unwrap_err(),
            TejerError::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn test_zero_stride_rejected() {
        let result = resolve(&[1, 1, 4, 4], &[1, 1, 3, 3], (0, 1), (1, 1), Padding::Valid);
        assert!(matches!(
            result.unwrap_err(),
            TejerError::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn test_non_rank4_rejected() {
        let result = resolve(&[1, 4, 4], &[1, 1, 3, 3], (1, 1), (1, 1), Padding::Valid);
        assert!(matches!(result.unwrap_err(), TejerError::InvalidShape { .. }));
    }

    #[test]
    fn test_padding_split_uneven() {
        let spec = PaddingSpec::split(3, 5);
        assert_eq!(spec.top, 1);
        assert_eq!(spec.bottom, 2);
        assert_eq!(spec.left, 2);
        assert_eq!(spec.right, 3);
    }
}

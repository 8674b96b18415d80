//! Bilinear resize over NCHW feature maps
//!
//! A collaborator kernel with none of the convolution engine's machinery:
//! no strategy selection, no scratch arena. Interpolation weights are
//! precomputed once per axis into cached tables, then the resize is a
//! table-driven lerp over `(batch, channel)`-parallel planes.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TejerError};
use crate::tensor::Tensor;

/// Precomputed 1-D interpolation entry for one output coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedInterpolation {
    /// Lower source index used in the interpolation
    pub lower: usize,
    /// Upper source index used in the interpolation
    pub upper: usize,
    /// Linear interpolation weight toward `upper`
    pub lerp: f32,
}

/// Source-to-destination scale for one axis
///
/// With `align_corners` the corner samples of input and output coincide,
/// which changes the scale to `(in - 1) / (out - 1)` whenever the output
/// has more than one sample.
#[inline]
#[must_use]
pub fn resize_scale(in_size: usize, out_size: usize, align_corners: bool) -> f32 {
    if align_corners && out_size > 1 {
        (in_size - 1) as f32 / (out_size - 1) as f32
    } else {
        in_size as f32 / out_size as f32
    }
}

/// Build the interpolation table for one axis (length `out_size + 1`)
#[must_use]
pub fn compute_interpolation_weights(
    out_size: usize,
    in_size: usize,
    scale: f32,
) -> Vec<CachedInterpolation> {
    let mut table = vec![
        CachedInterpolation {
            lower: 0,
            upper: 0,
            lerp: 0.0,
        };
        out_size + 1
    ];
    for i in (0..out_size).rev() {
        let position = i as f32 * scale;
        let lower = position as usize;
        table[i] = CachedInterpolation {
            lower,
            upper: (lower + 1).min(in_size - 1),
            lerp: position - lower as f32,
        };
    }
    table
}

#[inline]
fn lerp2d(
    top_left: f32,
    top_right: f32,
    bottom_left: f32,
    bottom_right: f32,
    x_lerp: f32,
    y_lerp: f32,
) -> f32 {
    let top = top_left + (top_right - top_left) * x_lerp;
    let bottom = bottom_left + (bottom_right - bottom_left) * x_lerp;
    top + (bottom - top) * y_lerp
}

/// Table-driven bilinear resize over NCHW planes
#[allow(clippy::too_many_arguments)]
fn resize_image_nchw(
    input: &[f32],
    in_h: usize,
    in_w: usize,
    out_h: usize,
    out_w: usize,
    xs: &[CachedInterpolation],
    ys: &[CachedInterpolation],
    output: &mut [f32],
) {
    let in_plane = in_h * in_w;

    output
        .par_chunks_mut(out_h * out_w)
        .enumerate()
        .for_each(|(plane_idx, out_plane)| {
            let plane = &input[plane_idx * in_plane..(plane_idx + 1) * in_plane];
            for y in 0..out_h {
                let lower_row = &plane[ys[y].lower * in_w..ys[y].lower * in_w + in_w];
                let upper_row = &plane[ys[y].upper * in_w..ys[y].upper * in_w + in_w];
                let y_lerp = ys[y].lerp;
                for x in 0..out_w {
                    out_plane[y * out_w + x] = lerp2d(
                        lower_row[xs[x].lower],
                        lower_row[xs[x].upper],
                        upper_row[xs[x].lower],
                        upper_row[xs[x].upper],
                        xs[x].lerp,
                        y_lerp,
                    );
                }
            }
        });
}

/// Bilinear resize operator with a fixed output size
///
/// # Examples
///
/// ```
/// use tejer::{ResizeBilinear, Tensor};
///
/// let op = ResizeBilinear::new(4, 4, false).unwrap();
/// let input = Tensor::from_vec(vec![1, 1, 2, 2], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
/// let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
/// op.run(&input, &mut output).unwrap();
/// assert_eq!(output.shape(), &[1, 1, 4, 4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeBilinear {
    out_height: usize,
    out_width: usize,
    align_corners: bool,
}

impl ResizeBilinear {
    /// Create a resize operator for a fixed output size
    ///
    /// # Errors
    ///
    /// Returns [`TejerError::InvalidConfiguration`] if either output extent
    /// is zero.
    pub fn new(out_height: usize, out_width: usize, align_corners: bool) -> Result<Self> {
        if out_height == 0 || out_width == 0 {
            return Err(TejerError::InvalidConfiguration {
                reason: "resize output extents must be positive".to_string(),
            });
        }
        Ok(Self {
            out_height,
            out_width,
            align_corners,
        })
    }

    /// Resize `input` into `output`
    ///
    /// Resizes `output` to `[N, C, out_h, out_w]`. When the requested size
    /// equals the input size the data is copied through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TejerError::InvalidShape`] if `input` is not rank 4.
    pub fn run(&self, input: &Tensor<f32>, output: &mut Tensor<f32>) -> Result<()> {
        if input.ndim() != 4 {
            return Err(TejerError::InvalidShape {
                reason: format!("input must be rank-4 NCHW, got rank {}", input.ndim()),
            });
        }
        let (batch, channels, in_h, in_w) =
            (input.dim(0), input.dim(1), input.dim(2), input.dim(3));

        output.resize(vec![batch, channels, self.out_height, self.out_width])?;

        if self.out_height == in_h && self.out_width == in_w {
            output.data_mut().copy_from_slice(input.data());
            return Ok(());
        }

        let height_scale = resize_scale(in_h, self.out_height, self.align_corners);
        let width_scale = resize_scale(in_w, self.out_width, self.align_corners);
        let ys = compute_interpolation_weights(self.out_height, in_h, height_scale);
        let xs = compute_interpolation_weights(self.out_width, in_w, width_scale);

        resize_image_nchw(
            input.data(),
            in_h,
            in_w,
            self.out_height,
            self.out_width,
            &xs,
            &ys,
            output.data_mut(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_plain_and_aligned() {
        assert!((resize_scale(4, 8, false) - 0.5).abs() < 1e-6);
        assert!((resize_scale(4, 7, true) - 0.5).abs() < 1e-6);
        // align_corners with a single output sample falls back to the
        // plain ratio
        assert!((resize_scale(4, 1, true) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_weights_clamp_at_edge() {
        let table = compute_interpolation_weights(4, 2, 0.5);
        assert_eq!(table.len(), 5);
        assert_eq!((table[0].lower, table[0].upper), (0, 1));
        // Last real entry maps to position 1.5: lower 1, upper clamped to 1
        assert_eq!((table[3].lower, table[3].upper), (1, 1));
        assert!((table[3].lerp - 0.5).abs() < 1e-6);
        // Sentinel entry
        assert_eq!((table[4].lower, table[4].upper), (0, 0));
    }

    #[test]
    fn test_identity_size_copies_through() {
        let op = ResizeBilinear::new(3, 3, false).unwrap();
        let input =
            Tensor::from_vec(vec![1, 1, 3, 3], (0..9).map(|v| v as f32).collect()).unwrap();
        let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
        op.run(&input, &mut output).unwrap();
        assert_eq!(output.data(), input.data());
    }

    #[test]
    fn test_upscale_2x_values() {
        let op = ResizeBilinear::new(4, 4, false).unwrap();
        let input = Tensor::from_vec(vec![1, 1, 2, 2], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
        op.run(&input, &mut output).unwrap();
        let d = output.data();
        // Corners interpolate with scale 0.5: x positions 0, 0.5, 1, 1.5
        assert!((d[0] - 0.0).abs() < 1e-6);
        assert!((d[1] - 0.5).abs() < 1e-6);
        assert!((d[2] - 1.0).abs() < 1e-6);
        assert!((d[3] - 1.0).abs() < 1e-6);
        // Row 3 clamps to the bottom input row
        assert!((d[12] - 2.0).abs() < 1e-6);
        assert!((d[15] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_align_corners_hits_input_corners() {
        let op = ResizeBilinear::new(3, 3, true).unwrap();
        let input = Tensor::from_vec(vec![1, 1, 2, 2], vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
        op.run(&input, &mut output).unwrap();
        let d = output.data();
        assert!((d[0] - 0.0).abs() < 1e-6);
        assert!((d[2] - 1.0).abs() < 1e-6);
        assert!((d[6] - 2.0).abs() < 1e-6);
        assert!((d[8] - 3.0).abs() < 1e-6);
        assert!((d[4] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_output_extent_rejected() {
        assert!(matches!(
            ResizeBilinear::new(0, 4, false).unwrap_err(),
            TejerError::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn test_multi_plane_resize_is_per_channel() {
        let op = ResizeBilinear::new(2, 2, false).unwrap();
        let mut data = vec![0.0; 2 * 4 * 4];
        data[16..].fill(10.0);
        let input = Tensor::from_vec(vec![1, 2, 4, 4], data).unwrap();
        let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
        op.run(&input, &mut output).unwrap();
        assert_eq!(output.shape(), &[1, 2, 2, 2]);
        assert!(output.data()[..4].iter().all(|&v| v == 0.0));
        assert!(output.data()[4..].iter().all(|&v| v == 10.0));
    }
}

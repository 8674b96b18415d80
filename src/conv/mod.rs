//! 2-D convolution operator
//!
//! [`Conv2d`] is the dispatch-and-execution engine: each call resolves the
//! output geometry, selects a strategy, plans tile-rounded extents, sizes
//! and carves the scratch arena, materializes a zero-padded input when the
//! extended extents require one, executes the selected kernel, crops the
//! oversized result back to the logical output shape, and applies bias and
//! activation in place.
//!
//! The operator owns only its scratch arena and the cached filter
//! transform; all tensors belong to the caller. One instance supports one
//! in-flight call at a time (`run` takes `&mut self`), which is the
//! sequential-graph-executor usage this engine is built for.

pub mod direct;
pub mod fused;
pub mod strategy;
pub mod winograd;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::arena::ScratchArena;
use crate::error::{Result, TejerError};
use crate::shape::{self, Padding, PaddingSpec};
use crate::tensor::Tensor;

use self::direct::{conv2d_direct, DirectParams};
use self::strategy::{Strategy, TileGeometry, WriteMode, WINOGRAD_TILE_AREA};
use self::winograd::FilterTransformCache;

/// Elementwise activation applied after bias
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Pass values through unchanged
    Identity,
    /// Clamp at zero
    Relu,
    /// Clamp into `[0, limit]`
    Relux(f32),
}

impl Activation {
    /// Apply the activation in place
    pub fn apply(self, data: &mut [f32]) {
        match self {
            Self::Identity => {}
            Self::Relu => {
                for v in data {
                    *v = v.max(0.0);
                }
            }
            Self::Relux(limit) => {
                for v in data {
                    *v = v.clamp(0.0, limit);
                }
            }
        }
    }
}

/// Configuration for a [`Conv2d`] operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conv2dConfig {
    /// Strides `(h, w)`
    pub strides: (usize, usize),
    /// Dilations `(h, w)`
    pub dilations: (usize, usize),
    /// Padding policy
    pub padding: Padding,
    /// Post-processing activation
    pub activation: Activation,
}

impl Default for Conv2dConfig {
    fn default() -> Self {
        Self {
            strides: (1, 1),
            dilations: (1, 1),
            padding: Padding::Valid,
            activation: Activation::Identity,
        }
    }
}

/// NCHW float32 convolution operator
///
/// # Examples
///
/// ```
/// use tejer::{Activation, Conv2d, Conv2dConfig, Padding, Tensor};
///
/// let mut op = Conv2d::new(Conv2dConfig {
///     padding: Padding::Same,
///     ..Conv2dConfig::default()
/// }).unwrap();
///
/// let input = Tensor::from_vec(vec![1, 8, 5, 5], vec![1.0; 200]).unwrap();
/// let filter = Tensor::from_vec(vec![8, 8, 3, 3], vec![1.0; 576]).unwrap();
/// let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
///
/// op.run(&input, &filter, None, &mut output).unwrap();
/// assert_eq!(output.shape(), &[1, 8, 5, 5]);
/// // Center elements see the full 3x3 window over 8 channels.
/// assert_eq!(output.data()[2 * 5 + 2], 72.0);
/// ```
#[derive(Debug, Default)]
pub struct Conv2d {
    config: Conv2dConfig,
    arena: ScratchArena,
    transformed_filter: FilterTransformCache,
}

impl Conv2d {
    /// Create an operator from a configuration
    ///
    /// # Errors
    ///
    /// Returns [`TejerError::InvalidConfiguration`] for zero strides or
    /// dilations.
    pub fn new(config: Conv2dConfig) -> Result<Self> {
        if config.strides.0 == 0
            || config.strides.1 == 0
            || config.dilations.0 == 0
            || config.dilations.1 == 0
        {
            return Err(TejerError::InvalidConfiguration {
                reason: "strides and dilations must be positive".to_string(),
            });
        }
        Ok(Self {
            config,
            arena: ScratchArena::new(),
            transformed_filter: FilterTransformCache::new(),
        })
    }

    /// The operator's configuration
    #[must_use]
    pub fn config(&self) -> &Conv2dConfig {
        &self.config
    }

    /// How many times the Winograd filter transform has executed
    ///
    /// Stays 0 until the first Winograd-dispatched call, then 1 for the
    /// rest of the operator's lifetime.
    #[must_use]
    pub fn filter_transform_count(&self) -> usize {
        self.transformed_filter.transform_count()
    }

    /// Execute the convolution
    ///
    /// Resizes `output` to the resolved `[N, OutC, Hout, Wout]` shape and
    /// fills it with `activation(conv(input, filter) + bias)`.
    ///
    /// The bound filter must stay constant across calls on one instance:
    /// the Winograd fast path caches its transform after the first call.
    ///
    /// # Errors
    ///
    /// - [`TejerError::ShapeContract`] on channel-count or bias-length
    ///   mismatch (caller bug)
    /// - [`TejerError::InvalidConfiguration`] on a non-positive resolved
    ///   output extent
    /// - [`TejerError::ScratchAllocation`] if scratch memory cannot grow
    ///
    /// After any error the contents of `output` are unspecified.
    pub fn run(
        &mut self,
        input: &Tensor<f32>,
        filter: &Tensor<f32>,
        bias: Option<&Tensor<f32>>,
        output: &mut Tensor<f32>,
    ) -> Result<()> {
        let resolved = shape::resolve(
            input.shape(),
            filter.shape(),
            self.config.strides,
            self.config.dilations,
            self.config.padding,
        )?;
        let [batch, out_c, out_h, out_w] = resolved.output_shape;
        let [pad_h_total, pad_w_total] = resolved.padding;
        let (in_c, in_h, in_w) = (input.dim(1), input.dim(2), input.dim(3));
        let (k_h, k_w) = (filter.dim(2), filter.dim(3));

        if let Some(bias) = bias {
            if bias.size() != out_c {
                return Err(TejerError::ShapeContract {
                    reason: format!(
                        "bias length {} != output channels {out_c}",
                        bias.size()
                    ),
                });
            }
        }

        output.resize(vec![batch, out_c, out_h, out_w])?;

        let mut strategy = Strategy::select(
            (k_h, k_w),
            self.config.strides,
            self.config.dilations,
            in_c,
            out_c,
        );
        // The 1x1 path assumes an empty padding; an explicit nonzero pad on
        // a 1x1 filter routes through the generic machinery instead.
        if strategy == Strategy::Fused1x1S1 && (pad_h_total != 0 || pad_w_total != 0) {
            strategy = Strategy::Direct;
        }

        let padded_in_h = in_h + pad_h_total;
        let padded_in_w = in_w + pad_w_total;
        let geometry = TileGeometry::plan(strategy, out_h, out_w, padded_in_h, padded_in_w);
        let mut padding = PaddingSpec::split(pad_h_total, pad_w_total);
        geometry.extend_padding(&mut padding, padded_in_h, padded_in_w);

        let (tiles_h, tiles_w) = geometry.winograd_tiles();
        let tile_count = tiles_h * tiles_w;
        let (transformed_in_size, transformed_out_size) = if strategy == Strategy::Winograd {
            (
                WINOGRAD_TILE_AREA * batch * in_c * tile_count,
                WINOGRAD_TILE_AREA * batch * out_c * tile_count,
            )
        } else {
            (0, 0)
        };

        let needs_padded_input = strategy.uses_padded_buffers()
            && (geometry.extra_in_h != in_h || geometry.extra_in_w != in_w);
        let padded_in_size = if needs_padded_input {
            batch * in_c * geometry.extra_in_h * geometry.extra_in_w
        } else {
            0
        };
        let needs_padded_output = geometry.extends_output(out_h, out_w);
        let padded_out_size = if needs_padded_output {
            batch * out_c * geometry.extra_out_h * geometry.extra_out_w
        } else {
            0
        };

        self.arena.rewind();
        self.arena.grow(
            transformed_in_size + transformed_out_size + padded_in_size + padded_out_size,
        )?;
        let [t_in, t_out, p_in, p_out] = self.arena.take([
            transformed_in_size,
            transformed_out_size,
            padded_in_size,
            padded_out_size,
        ])?;

        if needs_padded_input {
            pad_input(
                input.data(),
                in_h,
                in_w,
                geometry.extra_in_h,
                geometry.extra_in_w,
                padding.top,
                padding.left,
                p_in,
            );
        }
        let source: &[f32] = if needs_padded_input {
            p_in
        } else {
            input.data()
        };

        {
            let destination: &mut [f32] = if needs_padded_output {
                &mut *p_out
            } else {
                output.data_mut()
            };
            if strategy.write_mode() == WriteMode::Accumulate {
                destination.fill(0.0);
            }

            match strategy {
                Strategy::Winograd => {
                    let transformed = self.transformed_filter.get_or_transform(|| {
                        winograd::transform_filter(filter.data(), in_c, out_c)
                    });
                    winograd::transform_input(
                        source,
                        geometry.extra_in_h,
                        geometry.extra_in_w,
                        tiles_h,
                        tiles_w,
                        t_in,
                    );
                    winograd::multiply_transformed(
                        t_in,
                        transformed,
                        in_c,
                        out_c,
                        tile_count,
                        t_out,
                    );
                    winograd::inverse_transform(
                        t_out,
                        geometry.extra_out_h,
                        geometry.extra_out_w,
                        tiles_h,
                        tiles_w,
                        destination,
                    );
                }
                Strategy::Fused3x3S1 => fused::conv2d_3x3_s1(
                    source,
                    filter.data(),
                    batch,
                    geometry.extra_in_h,
                    geometry.extra_in_w,
                    in_c,
                    geometry.extra_out_h,
                    geometry.extra_out_w,
                    out_c,
                    destination,
                ),
                Strategy::Fused3x3S2 => fused::conv2d_3x3_s2(
                    source,
                    filter.data(),
                    batch,
                    geometry.extra_in_h,
                    geometry.extra_in_w,
                    in_c,
                    geometry.extra_out_h,
                    geometry.extra_out_w,
                    out_c,
                    destination,
                ),
                Strategy::Fused1x1S1 => fused::conv2d_1x1_s1(
                    input.data(),
                    filter.data(),
                    batch,
                    out_h,
                    out_w,
                    in_c,
                    out_c,
                    destination,
                ),
                Strategy::Direct => conv2d_direct(
                    source,
                    filter.data(),
                    DirectParams {
                        batch,
                        in_h: geometry.extra_in_h,
                        in_w: geometry.extra_in_w,
                        in_c,
                        out_h: geometry.extra_out_h,
                        out_w: geometry.extra_out_w,
                        out_c,
                        filter: (k_h, k_w),
                        strides: self.config.strides,
                        dilations: self.config.dilations,
                    },
                    destination,
                ),
            }
        }

        if needs_padded_output {
            unpack_output(
                p_out,
                geometry.extra_out_h,
                geometry.extra_out_w,
                out_h,
                out_w,
                output.data_mut(),
            );
        }

        if let Some(bias) = bias {
            add_bias(bias.data(), out_c, out_h * out_w, output.data_mut());
        }

        self.config.activation.apply(output.data_mut());
        Ok(())
    }
}

/// Copy the input into a zero-padded buffer at offset `(top, left)`
#[allow(clippy::too_many_arguments)]
fn pad_input(
    input: &[f32],
    in_h: usize,
    in_w: usize,
    padded_h: usize,
    padded_w: usize,
    top: usize,
    left: usize,
    padded: &mut [f32],
) {
    let in_plane = in_h * in_w;

    padded
        .par_chunks_mut(padded_h * padded_w)
        .enumerate()
        .for_each(|(plane_idx, padded_plane)| {
            let plane = &input[plane_idx * in_plane..(plane_idx + 1) * in_plane];
            padded_plane.fill(0.0);
            for y in 0..in_h {
                let dst = (y + top) * padded_w + left;
                padded_plane[dst..dst + in_w].copy_from_slice(&plane[y * in_w..(y + 1) * in_w]);
            }
        });
}

/// Crop the extended output back to the logical shape, row by row
fn unpack_output(
    padded: &[f32],
    padded_h: usize,
    padded_w: usize,
    out_h: usize,
    out_w: usize,
    output: &mut [f32],
) {
    let padded_plane = padded_h * padded_w;

    output
        .par_chunks_mut(out_h * out_w)
        .enumerate()
        .for_each(|(plane_idx, out_plane)| {
            let src_plane = &padded[plane_idx * padded_plane..(plane_idx + 1) * padded_plane];
            for y in 0..out_h {
                out_plane[y * out_w..(y + 1) * out_w]
                    .copy_from_slice(&src_plane[y * padded_w..y * padded_w + out_w]);
            }
        });
}

/// Broadcast-add the per-channel bias over all spatial positions
fn add_bias(bias: &[f32], out_c: usize, plane: usize, output: &mut [f32]) {
    output
        .par_chunks_mut(plane)
        .enumerate()
        .for_each(|(bm, out_plane)| {
            let b = bias[bm % out_c];
            for v in out_plane {
                *v += b;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_identity() {
        let mut data = vec![-1.0, 0.5, 2.0];
        Activation::Identity.apply(&mut data);
        assert_eq!(data, vec![-1.0, 0.5, 2.0]);
    }

    #[test]
    fn test_activation_relu() {
        let mut data = vec![-1.0, 0.5, 2.0];
        Activation::Relu.apply(&mut data);
        assert_eq!(data, vec![0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_activation_relux() {
        let mut data = vec![-1.0, 0.5, 2.0];
        Activation::Relux(1.0).apply(&mut data);
        assert_eq!(data, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_new_rejects_zero_stride() {
        let result = Conv2d::new(Conv2dConfig {
            strides: (0, 1),
            ..Conv2dConfig::default()
        });
        assert!(matches!(
            result.unwrap_err(),
            TejerError::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn test_bias_length_contract() {
        let mut op = Conv2d::new(Conv2dConfig {
            padding: Padding::Same,
            ..Conv2dConfig::default()
        })
        .unwrap();
        let input = Tensor::<f32>::zeros(vec![1, 2, 4, 4]).unwrap();
        let filter = Tensor::<f32>::zeros(vec![3, 2, 3, 3]).unwrap();
        let bias = Tensor::<f32>::zeros(vec![2]).unwrap();
        let mut output = Tensor::<f32>::zeros(vec![1, 1, 1, 1]).unwrap();
        let result = op.run(&input, &filter, Some(&bias), &mut output);
        assert!(matches!(
            result.unwrap_err(),
            TejerError::ShapeContract { .. }
        ));
    }

    #[test]
    fn test_channel_mismatch_contract() {
        let mut op = Conv2d::new(Conv2dConfig::default()).unwrap();
        let input = Tensor::<f32>::zeros(vec![1, 3, 5, 5]).unwrap();
        let filter = Tensor::<f32>::zeros(vec![4, 2, 3, 3]).unwrap();
        let mut output = Tensor::<f32>::zeros(vec![1, 1, 1, 1]).unwrap();
        let result = op.run(&input, &filter, None, &mut output);
        assert!(matches!(
            result.unwrap_err(),
            TejerError::ShapeContract { .. }
        ));
    }

    #[test]
    fn test_explicit_pad_on_1x1_falls_back_to_direct() {
        // A 1x1 filter with explicit padding must still honor the padding
        let mut op = Conv2d::new(Conv2dConfig {
            padding: Padding::Explicit { pad_h: 2, pad_w: 2 },
            ..Conv2dConfig::default()
        })
        .unwrap();
        let input = Tensor::from_vec(vec![1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let filter = Tensor::from_vec(vec![1, 1, 1, 1], vec![1.0]).unwrap();
        let mut output = Tensor::<f32>::zeros(vec![1, 1, 1, 1]).unwrap();
        op.run(&input, &filter, None, &mut output).unwrap();
        assert_eq!(output.shape(), &[1, 1, 4, 4]);
        // Original 2x2 block sits at offset (1, 1) inside a zero border
        assert_eq!(output.data()[5], 1.0);
        assert_eq!(output.data()[10], 4.0);
        assert_eq!(output.data()[0], 0.0);
    }
}

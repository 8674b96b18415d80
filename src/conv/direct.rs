//! Generic direct convolution
//!
//! Six nested loops over (batch, out channel, out y, out x, in channel,
//! filter taps), parallelized over the collapsed (batch, out channel) axes.
//! Handles any filter size, stride, and dilation, and serves as the
//! numerical reference every fast path must match.
//!
//! Contract: **accumulates** into `output`; the caller pre-zeroes the
//! buffer (see [`WriteMode::Accumulate`](super::strategy::WriteMode)).

use rayon::prelude::*;

/// Shape parameters for one direct-convolution invocation
#[derive(Debug, Clone, Copy)]
pub struct DirectParams {
    /// Batch size
    pub batch: usize,
    /// Input extents the kernel reads (padded)
    pub in_h: usize,
    /// Input width
    pub in_w: usize,
    /// Input channels
    pub in_c: usize,
    /// Output extents the kernel writes
    pub out_h: usize,
    /// Output width
    pub out_w: usize,
    /// Output channels
    pub out_c: usize,
    /// Filter spatial size `(kh, kw)`
    pub filter: (usize, usize),
    /// Strides `(h, w)`
    pub strides: (usize, usize),
    /// Dilations `(h, w)`
    pub dilations: (usize, usize),
}

/// Accumulate a direct NCHW convolution into `output`
///
/// `input` is `[batch, in_c, in_h, in_w]`, `filter` is
/// `[out_c, in_c, kh, kw]`, `output` is `[batch, out_c, out_h, out_w]`
/// and must be pre-zeroed.
pub fn conv2d_direct(input: &[f32], filter: &[f32], p: DirectParams, output: &mut [f32]) {
    let (k_h, k_w) = p.filter;
    let (stride_h, stride_w) = p.strides;
    let (dilation_h, dilation_w) = p.dilations;
    let in_plane = p.in_h * p.in_w;
    let filter_per_out = p.in_c * k_h * k_w;
    debug_assert_eq!(input.len(), p.batch * p.in_c * in_plane);
    debug_assert_eq!(output.len(), p.batch * p.out_c * p.out_h * p.out_w);
    debug_assert_eq!(filter.len(), p.out_c * filter_per_out);

    output
        .par_chunks_mut(p.out_h * p.out_w)
        .enumerate()
        .for_each(|(bm, out_plane)| {
            let b = bm / p.out_c;
            let m = bm % p.out_c;
            let input_base = b * p.in_c * in_plane;
            let filter_base = m * filter_per_out;

            for h in 0..p.out_h {
                for w in 0..p.out_w {
                    let mut acc = out_plane[h * p.out_w + w];
                    for c in 0..p.in_c {
                        let in_channel = input_base + c * in_plane;
                        let f_channel = filter_base + c * k_h * k_w;
                        for kh in 0..k_h {
                            let ih = h * stride_h + kh * dilation_h;
                            let in_row = in_channel + ih * p.in_w + w * stride_w;
                            let f_row = f_channel + kh * k_w;
                            for kw in 0..k_w {
                                acc += input[in_row + kw * dilation_w] * filter[f_row + kw];
                            }
                        }
                    }
                    out_plane[h * p.out_w + w] = acc;
                }
            }
        });
}

//! Fused-loop convolution microkernels
//!
//! Three specialized kernels with fixed filter/stride shapes:
//!
//! - 3x3 stride-1 over a 2x4 output register tile
//! - 3x3 stride-2 over a 1x4 output register tile
//! - 1x1 stride-1, which reduces to a per-pixel channel contraction
//!
//! The 3x3 kernels require the extended extents planned by
//! [`TileGeometry`](super::strategy::TileGeometry): output extents rounded
//! to the register-tile shape and input extents covering every tap the last
//! tile reads. All three fully overwrite their destination.

use rayon::prelude::*;

/// 3x3 stride-1 convolution over a padded input
///
/// `out_h` must be a multiple of 2 and `out_w` a multiple of 4;
/// `in_h >= out_h + 2` and `in_w >= out_w + 2`.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_3x3_s1(
    input: &[f32],
    filter: &[f32],
    batch: usize,
    in_h: usize,
    in_w: usize,
    in_c: usize,
    out_h: usize,
    out_w: usize,
    out_c: usize,
    output: &mut [f32],
) {
    debug_assert!(out_h % 2 == 0 && out_w % 4 == 0);
    debug_assert!(in_h >= out_h + 2 && in_w >= out_w + 2);
    debug_assert_eq!(output.len(), batch * out_c * out_h * out_w);
    let in_plane = in_h * in_w;

    output
        .par_chunks_mut(out_h * out_w)
        .enumerate()
        .for_each(|(bm, out_plane)| {
            let b = bm / out_c;
            let m = bm % out_c;

            for h in (0..out_h).step_by(2) {
                for w in (0..out_w).step_by(4) {
                    let mut acc = [[0.0f32; 4]; 2];
                    for c in 0..in_c {
                        let f = &filter[(m * in_c + c) * 9..(m * in_c + c) * 9 + 9];
                        let plane = &input[(b * in_c + c) * in_plane..(b * in_c + c + 1) * in_plane];
                        for (dy, row_acc) in acc.iter_mut().enumerate() {
                            for (dx, cell) in row_acc.iter_mut().enumerate() {
                                let mut sum = 0.0;
                                for ky in 0..3 {
                                    let row = (h + dy + ky) * in_w + w + dx;
                                    sum += plane[row] * f[ky * 3]
                                        + plane[row + 1] * f[ky * 3 + 1]
                                        + plane[row + 2] * f[ky * 3 + 2];
                                }
                                *cell += sum;
                            }
                        }
                    }
                    for dy in 0..2 {
                        for dx in 0..4 {
                            out_plane[(h + dy) * out_w + w + dx] = acc[dy][dx];
                        }
                    }
                }
            }
        });
}

/// 3x3 stride-2 convolution over a padded input
///
/// `out_w` must be a multiple of 4; the input extents must cover
/// `(extent - 1) * 2 + 3` taps on each axis.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_3x3_s2(
    input: &[f32],
    filter: &[f32],
    batch: usize,
    in_h: usize,
    in_w: usize,
    in_c: usize,
    out_h: usize,
    out_w: usize,
    out_c: usize,
    output: &mut [f32],
) {
    debug_assert!(out_w % 4 == 0);
    debug_assert!(in_h >= (out_h - 1) * 2 + 3 && in_w >= (out_w - 1) * 2 + 3);
    debug_assert_eq!(output.len(), batch * out_c * out_h * out_w);
    let in_plane = in_h * in_w;

    output
        .par_chunks_mut(out_h * out_w)
        .enumerate()
        .for_each(|(bm, out_plane)| {
            let b = bm / out_c;
            let m = bm % out_c;

            for h in 0..out_h {
                for w in (0..out_w).step_by(4) {
                    let mut acc = [0.0f32; 4];
                    for c in 0..in_c {
                        let f = &filter[(m * in_c + c) * 9..(m * in_c + c) * 9 + 9];
                        let plane = &input[(b * in_c + c) * in_plane..(b * in_c + c + 1) * in_plane];
                        for (dx, cell) in acc.iter_mut().enumerate() {
                            let mut sum = 0.0;
                            for ky in 0..3 {
                                let row = (h * 2 + ky) * in_w + (w + dx) * 2;
                                sum += plane[row] * f[ky * 3]
                                    + plane[row + 1] * f[ky * 3 + 1]
                                    + plane[row + 2] * f[ky * 3 + 2];
                            }
                            *cell += sum;
                        }
                    }
                    for dx in 0..4 {
                        out_plane[h * out_w + w + dx] = acc[dx];
                    }
                }
            }
        });
}

/// 1x1 stride-1 convolution
///
/// A per-pixel contraction over input channels; reads the raw (unpadded)
/// input and writes the raw output.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_1x1_s1(
    input: &[f32],
    filter: &[f32],
    batch: usize,
    height: usize,
    width: usize,
    in_c: usize,
    out_c: usize,
    output: &mut [f32],
) {
    let plane = height * width;
    debug_assert_eq!(output.len(), batch * out_c * plane);

    output
        .par_chunks_mut(plane)
        .enumerate()
        .for_each(|(bm, out_plane)| {
            let b = bm / out_c;
            let m = bm % out_c;
            let input_base = b * in_c * plane;

            out_plane.fill(0.0);
            for c in 0..in_c {
                let weight = filter[m * in_c + c];
                let in_plane = &input[input_base + c * plane..input_base + (c + 1) * plane];
                for (out_v, in_v) in out_plane.iter_mut().zip(in_plane) {
                    *out_v += weight * in_v;
                }
            }
        });
}

//! Winograd F(6,3) transform-domain convolution
//!
//! Maps 8x8 input tiles and the 3x3 filter into a transform domain where
//! the convolution becomes 64 independent channel contractions, then maps
//! the result back to 6x6 output tiles. For a tile this trades the direct
//! path's 36*9 multiplies per channel pair for 64, at the cost of the
//! transforms; selection therefore gates on a minimum channel count.
//!
//! Transform matrices are the Cook-Toom construction over the points
//! {0, ±1, ±2, ±1/2}:
//!
//! - filter: `U = G g Gᵀ` (G is 8x3)
//! - input: `V = Bᵀ d B` (Bᵀ is 8x8)
//! - output: `Y = Aᵀ M A` (Aᵀ is 6x8)
//!
//! Buffer layouts, all f32:
//!
//! - transformed filter: `[64, OutC, InC]` (contiguous channel rows per
//!   tile position, matching the contraction's access order)
//! - transformed input: `[N, InC, 64, tiles]`
//! - transformed output: `[N, OutC, 64, tiles]`
//!
//! The filter transform runs once per operator lifetime and is cached in
//! [`FilterTransformCache`]; the bound filter tensor must stay constant
//! across calls.

use rayon::prelude::*;

use super::strategy::{WINOGRAD_OUT_TILE, WINOGRAD_TILE_AREA};

const G: [[f32; 3]; 8] = [
    [1.0, 0.0, 0.0],
    [-2.0 / 9.0, -2.0 / 9.0, -2.0 / 9.0],
    [-2.0 / 9.0, 2.0 / 9.0, -2.0 / 9.0],
    [1.0 / 90.0, 1.0 / 45.0, 2.0 / 45.0],
    [1.0 / 90.0, -1.0 / 45.0, 2.0 / 45.0],
    [32.0 / 45.0, 16.0 / 45.0, 8.0 / 45.0],
    [32.0 / 45.0, -16.0 / 45.0, 8.0 / 45.0],
    [0.0, 0.0, 1.0],
];

const BT: [[f32; 8]; 8] = [
    [1.0, 0.0, -5.25, 0.0, 5.25, 0.0, -1.0, 0.0],
    [0.0, 1.0, 1.0, -4.25, -4.25, 1.0, 1.0, 0.0],
    [0.0, -1.0, 1.0, 4.25, -4.25, -1.0, 1.0, 0.0],
    [0.0, 0.5, 0.25, -2.5, -1.25, 2.0, 1.0, 0.0],
    [0.0, -0.5, 0.25, 2.5, -1.25, -2.0, 1.0, 0.0],
    [0.0, 2.0, 4.0, -2.5, -5.0, 0.5, 1.0, 0.0],
    [0.0, -2.0, 4.0, 2.5, -5.0, -0.5, 1.0, 0.0],
    [0.0, -1.0, 0.0, 5.25, 0.0, -5.25, 0.0, 1.0],
];

const AT: [[f32; 8]; 6] = [
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0],
    [0.0, 1.0, -1.0, 2.0, -2.0, 0.5, -0.5, 0.0],
    [0.0, 1.0, 1.0, 4.0, 4.0, 0.25, 0.25, 0.0],
    [0.0, 1.0, -1.0, 8.0, -8.0, 0.125, -0.125, 0.0],
    [0.0, 1.0, 1.0, 16.0, 16.0, 0.0625, 0.0625, 0.0],
    [0.0, 1.0, -1.0, 32.0, -32.0, 0.03125, -0.03125, 1.0],
];

/// One-shot cache for the transformed filter
///
/// Transitions `NotTransformed -> Transformed` exactly once per operator
/// lifetime; the transition count is observable for tests.
#[derive(Debug, Default)]
pub struct FilterTransformCache {
    transformed: Option<Vec<f32>>,
    transforms: usize,
}

impl FilterTransformCache {
    /// Create an empty (`NotTransformed`) cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached transform, computing it on first use
    pub fn get_or_transform(&mut self, transform: impl FnOnce() -> Vec<f32>) -> &[f32] {
        if self.transformed.is_none() {
            self.transformed = Some(transform());
            self.transforms += 1;
        }
        self.transformed.as_deref().unwrap_or_default()
    }

    /// How many times the transform has executed (0 or 1)
    #[must_use]
    pub fn transform_count(&self) -> usize {
        self.transforms
    }

    /// Whether the cache holds a transformed filter
    #[must_use]
    pub fn is_transformed(&self) -> bool {
        self.transformed.is_some()
    }
}

/// `U = G g Gᵀ` for one 3x3 filter tile
fn filter_tile_transform(g: &[f32]) -> [f32; WINOGRAD_TILE_AREA] {
    let mut tmp = [[0.0f32; 3]; 8];
    for (i, row) in G.iter().enumerate() {
        for j in 0..3 {
            tmp[i][j] = row[0] * g[j] + row[1] * g[3 + j] + row[2] * g[6 + j];
        }
    }
    let mut u = [0.0f32; WINOGRAD_TILE_AREA];
    for i in 0..8 {
        for (j, row) in G.iter().enumerate() {
            u[i * 8 + j] = tmp[i][0] * row[0] + tmp[i][1] * row[1] + tmp[i][2] * row[2];
        }
    }
    u
}

/// `V = Bᵀ d B` for one 8x8 input tile
fn input_tile_transform(d: &[[f32; 8]; 8]) -> [f32; WINOGRAD_TILE_AREA] {
    let mut tmp = [[0.0f32; 8]; 8];
    for (i, bt_row) in BT.iter().enumerate() {
        for j in 0..8 {
            let mut acc = 0.0;
            for k in 0..8 {
                acc += bt_row[k] * d[k][j];
            }
            tmp[i][j] = acc;
        }
    }
    let mut v = [0.0f32; WINOGRAD_TILE_AREA];
    for i in 0..8 {
        for (j, bt_row) in BT.iter().enumerate() {
            let mut acc = 0.0;
            for k in 0..8 {
                acc += tmp[i][k] * bt_row[k];
            }
            v[i * 8 + j] = acc;
        }
    }
    v
}

/// `Y = Aᵀ M A` for one transformed tile, yielding a 6x6 output tile
fn output_tile_transform(m: &[f32; WINOGRAD_TILE_AREA]) -> [[f32; 6]; 6] {
    let mut tmp = [[0.0f32; 8]; 8];
    for (i, at_row) in AT.iter().enumerate() {
        for j in 0..8 {
            let mut acc = 0.0;
            for k in 0..8 {
                acc += at_row[k] * m[k * 8 + j];
            }
            tmp[i][j] = acc;
        }
    }
    let mut y = [[0.0f32; 6]; 6];
    for (i, y_row) in y.iter_mut().enumerate() {
        for (j, at_row) in AT.iter().enumerate() {
            let mut acc = 0.0;
            for k in 0..8 {
                acc += tmp[i][k] * at_row[k];
            }
            y_row[j] = acc;
        }
    }
    y
}

/// Transform a `[OutC, InC, 3, 3]` filter into `[64, OutC, InC]`
#[must_use]
pub fn transform_filter(filter: &[f32], in_c: usize, out_c: usize) -> Vec<f32> {
    let pairs = out_c * in_c;
    let tiles: Vec<[f32; WINOGRAD_TILE_AREA]> = (0..pairs)
        .into_par_iter()
        .map(|mc| filter_tile_transform(&filter[mc * 9..mc * 9 + 9]))
        .collect();

    let mut out = vec![0.0f32; WINOGRAD_TILE_AREA * pairs];
    for (mc, tile) in tiles.iter().enumerate() {
        for (p, &v) in tile.iter().enumerate() {
            out[p * pairs + mc] = v;
        }
    }
    out
}

/// Transform padded input into `[N, InC, 64, tiles]`
pub fn transform_input(
    input: &[f32],
    in_h: usize,
    in_w: usize,
    tiles_h: usize,
    tiles_w: usize,
    transformed: &mut [f32],
) {
    let tile_count = tiles_h * tiles_w;
    let in_plane = in_h * in_w;

    transformed
        .par_chunks_mut(WINOGRAD_TILE_AREA * tile_count)
        .enumerate()
        .for_each(|(bc, block)| {
            let plane = &input[bc * in_plane..(bc + 1) * in_plane];
            for th in 0..tiles_h {
                for tw in 0..tiles_w {
                    let t = th * tiles_w + tw;
                    let mut d = [[0.0f32; 8]; 8];
                    for (y, d_row) in d.iter_mut().enumerate() {
                        let row = (th * WINOGRAD_OUT_TILE + y) * in_w + tw * WINOGRAD_OUT_TILE;
                        d_row.copy_from_slice(&plane[row..row + 8]);
                    }
                    let v = input_tile_transform(&d);
                    for (p, &value) in v.iter().enumerate() {
                        block[p * tile_count + t] = value;
                    }
                }
            }
        });
}

/// Contract transformed input `[N, InC, 64, tiles]` with the transformed
/// filter `[64, OutC, InC]` into `[N, OutC, 64, tiles]`
pub fn multiply_transformed(
    transformed_input: &[f32],
    transformed_filter: &[f32],
    in_c: usize,
    out_c: usize,
    tile_count: usize,
    transformed_output: &mut [f32],
) {
    let block = WINOGRAD_TILE_AREA * tile_count;

    transformed_output
        .par_chunks_mut(block)
        .enumerate()
        .for_each(|(bm, out_block)| {
            let b = bm / out_c;
            let m = bm % out_c;
            for p in 0..WINOGRAD_TILE_AREA {
                let filter_row = &transformed_filter[p * out_c * in_c + m * in_c..][..in_c];
                let out_row = &mut out_block[p * tile_count..(p + 1) * tile_count];
                out_row.fill(0.0);
                for (c, &weight) in filter_row.iter().enumerate() {
                    let in_row =
                        &transformed_input[((b * in_c + c) * WINOGRAD_TILE_AREA + p) * tile_count..]
                            [..tile_count];
                    for (out_v, in_v) in out_row.iter_mut().zip(in_row) {
                        *out_v += weight * in_v;
                    }
                }
            }
        });
}

/// Map `[N, OutC, 64, tiles]` back to spatial 6x6 tiles of the extended
/// output `[N, OutC, out_h, out_w]`
pub fn inverse_transform(
    transformed_output: &[f32],
    out_h: usize,
    out_w: usize,
    tiles_h: usize,
    tiles_w: usize,
    output: &mut [f32],
) {
    let tile_count = tiles_h * tiles_w;
    let block = WINOGRAD_TILE_AREA * tile_count;

    output
        .par_chunks_mut(out_h * out_w)
        .enumerate()
        .for_each(|(bm, plane)| {
            let src = &transformed_output[bm * block..(bm + 1) * block];
            for th in 0..tiles_h {
                for tw in 0..tiles_w {
                    let t = th * tiles_w + tw;
                    let mut m = [0.0f32; WINOGRAD_TILE_AREA];
                    for (p, value) in m.iter_mut().enumerate() {
                        *value = src[p * tile_count + t];
                    }
                    let y = output_tile_transform(&m);
                    for (dy, y_row) in y.iter().enumerate() {
                        let row = (th * WINOGRAD_OUT_TILE + dy) * out_w + tw * WINOGRAD_OUT_TILE;
                        plane[row..row + 6].copy_from_slice(y_row);
                    }
                }
            }
        });
}

//! Strategy selection and tiling geometry
//!
//! Choosing a convolution variant is a pure function of the filter size,
//! strides, dilations, and channel counts; no tensor data is consulted, so
//! selection is independently testable. The chosen strategy then determines
//! the tile-rounded ("extended") input/output extents the kernels operate
//! on; any shortfall between the extended and natural-padded extents is
//! appended to the bottom/right padding so the real-data origin never moves.

use crate::shape::PaddingSpec;

/// Output-tile edge of the Winograd F(6,3) fast path
pub const WINOGRAD_OUT_TILE: usize = 6;
/// Input-tile edge (`output tile + filter size - 1`)
pub const WINOGRAD_IN_TILE: usize = WINOGRAD_OUT_TILE + 2;
/// Elements in one transformed tile
pub const WINOGRAD_TILE_AREA: usize = WINOGRAD_IN_TILE * WINOGRAD_IN_TILE;

/// Minimum channel count on both sides before the Winograd transform
/// overhead amortizes
const WINOGRAD_MIN_CHANNELS: usize = 8;

/// How a strategy writes its destination buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The kernel fully overwrites every element of the destination
    Overwrite,
    /// The kernel accumulates; the executor must pre-zero the destination
    Accumulate,
}

/// Convolution execution strategy
///
/// Variants are ordered by selection priority. All strategies compute the
/// same mathematical convolution; [`Strategy::Direct`] is the numerical
/// reference the fast paths must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Winograd F(6,3) transform-domain fast path (3x3, stride 1, dilation 1,
    /// at least 8 channels on both sides)
    Winograd,
    /// Fused 3x3 stride-1 microkernel (2x4 output register tile)
    Fused3x3S1,
    /// Fused 3x3 stride-2 microkernel (1x4 output register tile)
    Fused3x3S2,
    /// Fused 1x1 stride-1 microkernel; no spatial receptive field, so it
    /// runs directly on the unpadded input and output
    Fused1x1S1,
    /// Generic direct convolution for any filter/stride/dilation
    Direct,
}

impl Strategy {
    /// Select a strategy from shape parameters (first match wins)
    #[must_use]
    pub fn select(
        filter: (usize, usize),
        strides: (usize, usize),
        dilations: (usize, usize),
        in_channels: usize,
        out_channels: usize,
    ) -> Self {
        let unit_dilation = dilations == (1, 1);
        match (filter, strides) {
            ((3, 3), (1, 1))
                if unit_dilation
                    && in_channels >= WINOGRAD_MIN_CHANNELS
                    && out_channels >= WINOGRAD_MIN_CHANNELS =>
            {
                Self::Winograd
            }
            ((3, 3), (1, 1)) if unit_dilation => Self::Fused3x3S1,
            ((3, 3), (2, 2)) if unit_dilation => Self::Fused3x3S2,
            ((1, 1), (1, 1)) if unit_dilation => Self::Fused1x1S1,
            _ => Self::Direct,
        }
    }

    /// Whether the kernel overwrites or accumulates into its destination
    #[must_use]
    pub fn write_mode(self) -> WriteMode {
        match self {
            Self::Direct => WriteMode::Accumulate,
            _ => WriteMode::Overwrite,
        }
    }

    /// Whether the strategy consumes the padded/extended buffers
    ///
    /// The 1x1 path reads each source pixel exactly once, so padding and
    /// tiling never apply to it.
    #[must_use]
    pub fn uses_padded_buffers(self) -> bool {
        !matches!(self, Self::Fused1x1S1)
    }
}

/// Tile-rounded extents for one convolution call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    /// Extended input height the kernel reads
    pub extra_in_h: usize,
    /// Extended input width the kernel reads
    pub extra_in_w: usize,
    /// Extended output height the kernel writes
    pub extra_out_h: usize,
    /// Extended output width the kernel writes
    pub extra_out_w: usize,
}

#[inline]
fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

impl TileGeometry {
    /// Compute extended extents for a strategy
    ///
    /// `padded_in_*` are the natural padded input extents (input plus the
    /// resolver's total padding). Extended extents are always at least the
    /// natural ones.
    #[must_use]
    pub fn plan(
        strategy: Strategy,
        out_h: usize,
        out_w: usize,
        padded_in_h: usize,
        padded_in_w: usize,
    ) -> Self {
        let (extra_out_h, extra_out_w, extra_in_h, extra_in_w) = match strategy {
            Strategy::Winograd => {
                let eoh = round_up(out_h, WINOGRAD_OUT_TILE);
                let eow = round_up(out_w, WINOGRAD_OUT_TILE);
                (eoh, eow, padded_in_h.max(eoh + 2), padded_in_w.max(eow + 2))
            }
            Strategy::Fused3x3S1 => {
                let eoh = round_up(out_h, 2);
                let eow = round_up(out_w, 4);
                (eoh, eow, padded_in_h.max(eoh + 2), padded_in_w.max(eow + 2))
            }
            Strategy::Fused3x3S2 => {
                // stride 2 already aligns the height axis
                let eow = round_up(out_w, 4);
                (
                    out_h,
                    eow,
                    padded_in_h.max((out_h - 1) * 2 + 3),
                    padded_in_w.max((eow - 1) * 2 + 3),
                )
            }
            Strategy::Fused1x1S1 | Strategy::Direct => (out_h, out_w, padded_in_h, padded_in_w),
        };
        Self {
            extra_in_h,
            extra_in_w,
            extra_out_h,
            extra_out_w,
        }
    }

    /// Whether the extended output differs from the logical output shape
    #[must_use]
    pub fn extends_output(&self, out_h: usize, out_w: usize) -> bool {
        self.extra_out_h != out_h || self.extra_out_w != out_w
    }

    /// Fold the tiling shortfall beyond the natural padded extents into the
    /// after-edges of `spec`
    pub fn extend_padding(&self, spec: &mut PaddingSpec, padded_in_h: usize, padded_in_w: usize) {
        spec.bottom += self.extra_in_h - padded_in_h;
        spec.right += self.extra_in_w - padded_in_w;
    }

    /// Winograd tile grid as `(tiles_h, tiles_w)`
    #[must_use]
    pub fn winograd_tiles(&self) -> (usize, usize) {
        (
            self.extra_out_h / WINOGRAD_OUT_TILE,
            self.extra_out_w / WINOGRAD_OUT_TILE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_priority() {
        // Winograd needs >= 8 channels on both sides
        assert_eq!(
            Strategy::select((3, 3), (1, 1), (1, 1), 8, 8),
            Strategy::Winograd
        );
        assert_eq!(
            Strategy::select((3, 3), (1, 1), (1, 1), 8, 7),
            Strategy::Fused3x3S1
        );
        assert_eq!(
            Strategy::select((3, 3), (1, 1), (1, 1), 4, 16),
            Strategy::Fused3x3S1
        );
        assert_eq!(
            Strategy::select((3, 3), (2, 2), (1, 1), 16, 16),
            Strategy::Fused3x3S2
        );
        assert_eq!(
            Strategy::select((1, 1), (1, 1), (1, 1), 3, 5),
            Strategy::Fused1x1S1
        );
    }

    #[test]
    fn test_dilation_disables_fast_paths() {
        assert_eq!(
            Strategy::select((3, 3), (1, 1), (2, 2), 16, 16),
            Strategy::Direct
        );
    }

    #[test]
    fn test_generic_fallbacks() {
        assert_eq!(
            Strategy::select((5, 5), (1, 1), (1, 1), 16, 16),
            Strategy::Direct
        );
        assert_eq!(
            Strategy::select((3, 3), (3, 3), (1, 1), 16, 16),
            Strategy::Direct
        );
        assert_eq!(
            Strategy::select((1, 1), (2, 2), (1, 1), 16, 16),
            Strategy::Direct
        );
        assert_eq!(
            Strategy::select((3, 1), (1, 1), (1, 1), 16, 16),
            Strategy::Direct
        );
    }

    #[test]
    fn test_write_modes() {
        assert_eq!(Strategy::Winograd.write_mode(), WriteMode::Overwrite);
        assert_eq!(Strategy::Fused3x3S1.write_mode(), WriteMode::Overwrite);
        assert_eq!(Strategy::Direct.write_mode(), WriteMode::Accumulate);
    }

    #[test]
    fn test_winograd_geometry_5x5_same() {
        // 5x5 SAME output rounds to 6x6 tiles; padded input 7 grows to 8
        let g = TileGeometry::plan(Strategy::Winograd, 5, 5, 7, 7);
        assert_eq!((g.extra_out_h, g.extra_out_w), (6, 6));
        assert_eq!((g.extra_in_h, g.extra_in_w), (8, 8));
        assert_eq!(g.winograd_tiles(), (1, 1));
        assert!(g.extends_output(5, 5));

        let mut spec = PaddingSpec::split(2, 2);
        g.extend_padding(&mut spec, 7, 7);
        assert_eq!((spec.top, spec.bottom), (1, 2));
        assert_eq!((spec.left, spec.right), (1, 2));
    }

    #[test]
    fn test_fused_s1_geometry() {
        // out 7x7 -> 8x8 extended; padded input 9 grows to 10
        let g = TileGeometry::plan(Strategy::Fused3x3S1, 7, 7, 9, 9);
        assert_eq!((g.extra_out_h, g.extra_out_w), (8, 8));
        assert_eq!((g.extra_in_h, g.extra_in_w), (10, 10));
    }

    #[test]
    fn test_fused_s2_geometry() {
        // out 5x5: height untouched, width rounds to 8;
        // input covers (extent - 1) * 2 + 3 taps
        let g = TileGeometry::plan(Strategy::Fused3x3S2, 5, 5, 10, 10);
        assert_eq!((g.extra_out_h, g.extra_out_w), (5, 8));
        assert_eq!((g.extra_in_h, g.extra_in_w), (11, 17));
    }

    #[test]
    fn test_direct_geometry_is_identity() {
        let g = TileGeometry::plan(Strategy::Direct, 4, 4, 8, 8);
        assert_eq!((g.extra_out_h, g.extra_out_w), (4, 4));
        assert_eq!((g.extra_in_h, g.extra_in_w), (8, 8));
        assert!(!g.extends_output(4, 4));
    }
}

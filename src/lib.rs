//! # Tejer
//!
//! Pure Rust NCHW convolution engine with Winograd and fused-tile fast paths.
//!
//! Tejer (Spanish: "to weave") dispatches each 2-D convolution to the best
//! of five numerically equivalent strategies (a Winograd F(6,3) transform
//! fast path, three fused-loop microkernels for 3x3 stride-1, 3x3 stride-2,
//! and 1x1, plus a generic direct fallback) based purely on the filter
//! shape, strides, dilations, and channel counts.
//!
//! ## Features
//!
//! - **Strategy dispatch**: pure shape-driven selection, independently
//!   testable; every fast path matches the direct reference
//! - **Scratch arena**: per-call temporaries carved from one reusable
//!   buffer that is rewound, never freed, between calls
//! - **Tiling geometry**: tile-rounded extents with the shortfall folded
//!   into bottom/right padding, so the data origin never moves
//! - **Post-processing**: per-channel bias and clamp activations in place
//!
//! ## Example
//!
//! ```rust
//! use tejer::{Conv2d, Conv2dConfig, Padding, Tensor};
//!
//! let mut op = Conv2d::new(Conv2dConfig {
//!     padding: Padding::Same,
//!     ..Conv2dConfig::default()
//! }).unwrap();
//!
//! let input = Tensor::from_vec(vec![1, 8, 5, 5], vec![1.0; 200]).unwrap();
//! let filter = Tensor::from_vec(vec![8, 8, 3, 3], vec![1.0; 576]).unwrap();
//! let mut output = Tensor::zeros(vec![1, 1, 1, 1]).unwrap();
//!
//! op.run(&input, &filter, None, &mut output).unwrap();
//! assert_eq!(output.shape(), &[1, 8, 5, 5]);
//! ```
//!
//! ## Concurrency
//!
//! Execution is synchronous and purely computational. Kernels parallelize
//! over collapsed `(batch, channel)` axes on the global rayon pool. One
//! operator instance supports one in-flight call at a time: `run` takes
//! `&mut self`, so overlapping calls on a shared instance do not compile;
//! callers that share an operator must serialize.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f32 for interpolation scales
#![allow(clippy::cast_possible_truncation)] // f32 -> usize interpolation indices
#![allow(clippy::cast_sign_loss)] // interpolation positions are non-negative
#![allow(clippy::needless_range_loop)] // index loops mirror the tile algebra
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::missing_panics_doc)] // Allow missing Panics doc sections
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks

pub mod arena;
pub mod conv;
pub mod error;
pub mod resize;
pub mod shape;
pub mod tensor;

pub use conv::{Activation, Conv2d, Conv2dConfig};
pub use error::{Result, TejerError};
pub use resize::ResizeBilinear;
pub use shape::Padding;
pub use tensor::Tensor;

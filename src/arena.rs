//! Reusable scratch arena for per-call temporaries
//!
//! The convolution operator needs up to four temporaries per call
//! (transformed input, transformed output, padded input, padded output).
//! Allocating them fresh on every call would dominate small-shape latency,
//! so the arena keeps one flat buffer that is *rewound* (cursor reset, not
//! freed) at the start of each call and grown only when a call needs more
//! than the current capacity. Capacity never shrinks.
//!
//! Views are handed out in one fixed order as disjoint mutable slices whose
//! lengths sum exactly to the call's planned total. An unused component is
//! an empty slice that is never dereferenced.

use crate::error::{Result, TejerError};

/// Rewindable scratch buffer sub-allocated per call
///
/// # Examples
///
/// ```
/// use tejer::arena::ScratchArena;
///
/// let mut arena = ScratchArena::new();
/// arena.rewind();
/// arena.grow(96).unwrap();
/// let [a, b, c, d] = arena.take([16, 32, 48, 0]).unwrap();
/// assert_eq!((a.len(), b.len(), c.len(), d.len()), (16, 32, 48, 0));
/// ```
#[derive(Debug, Default)]
pub struct ScratchArena {
    buffer: Vec<f32>,
    cursor: usize,
}

impl ScratchArena {
    /// Create an empty arena
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the cursor without releasing capacity
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Ensure the arena holds at least `total` elements
    ///
    /// Grows (reallocates) only when `total` exceeds the current capacity;
    /// never shrinks. Newly grown elements are zeroed, but callers must not
    /// rely on previously used regions holding any particular value.
    ///
    /// # Errors
    ///
    /// Returns [`TejerError::ScratchAllocation`] if the allocator cannot
    /// provide the requested capacity. The call that needed the scratch is
    /// then terminal; no partial output is valid.
    pub fn grow(&mut self, total: usize) -> Result<()> {
        if total > self.buffer.len() {
            let additional = total - self.buffer.len();
            self.buffer
                .try_reserve(additional)
                .map_err(|_| TejerError::ScratchAllocation { requested: total })?;
            self.buffer.resize(total, 0.0);
        }
        Ok(())
    }

    /// Current capacity in elements
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Elements handed out since the last rewind
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.cursor
    }

    /// Hand out four sequential non-overlapping views in fixed order
    ///
    /// The views start at the current cursor and advance it by the sum of
    /// `sizes`. Zero-sized entries yield empty slices.
    ///
    /// # Errors
    ///
    /// Returns [`TejerError::ScratchAllocation`] if the requested total
    /// exceeds the remaining capacity; callers must [`grow`](Self::grow)
    /// first.
    pub fn take(&mut self, sizes: [usize; 4]) -> Result<[&mut [f32]; 4]> {
        let total: usize = sizes.iter().sum();
        if self.cursor + total > self.buffer.len() {
            return Err(TejerError::ScratchAllocation {
                requested: self.cursor + total,
            });
        }
        let start = self.cursor;
        self.cursor += total;

        let region = &mut self.buffer[start..start + total];
        let (a, rest) = region.split_at_mut(sizes[0]);
        let (b, rest) = rest.split_at_mut(sizes[1]);
        let (c, d) = rest.split_at_mut(sizes[2]);
        Ok([a, b, c, d])
    }
}

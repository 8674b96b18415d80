//! Error types for tejer operations
//!
//! All fallible operations return [`Result`], which wraps [`TejerError`].
//! The taxonomy is deliberately small: every failure is fatal for the call
//! that produced it, and the only remediation is the caller correcting its
//! inputs. Output tensors must not be read after a failed call.

use thiserror::Error;

/// Error type for all tejer operations
#[derive(Debug, Error)]
pub enum TejerError {
    /// Tensor shape is structurally invalid (empty, zero dimension, wrong rank)
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Description of the shape problem
        reason: String,
    },

    /// Tensor data length does not match its declared shape
    #[error("Data size {data_size} does not match shape {shape:?} (expected {expected})")]
    DataShapeMismatch {
        /// Actual number of elements provided
        data_size: usize,
        /// Declared shape
        shape: Vec<usize>,
        /// Number of elements the shape requires
        expected: usize,
    },

    /// Caller violated an operator contract (channel or batch mismatch).
    ///
    /// This signals a bug in the calling code, not a runtime condition:
    /// the same inputs will fail the same way every time.
    #[error("Shape contract violation: {reason}")]
    ShapeContract {
        /// Description of the violated contract
        reason: String,
    },

    /// Operator configuration is invalid (zero stride, non-positive output size)
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration problem
        reason: String,
    },

    /// Scratch arena could not grow to the requested size
    #[error("Scratch allocation of {requested} elements failed")]
    ScratchAllocation {
        /// Total element count the call required
        requested: usize,
    },
}

/// Result type alias for tejer operations
pub type Result<T> = std::result::Result<T, TejerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TejerError::InvalidShape {
            reason: "shape cannot be empty".to_string(),
        };
        assert!(err.to_string().contains("shape cannot be empty"));

        let err = TejerError::DataShapeMismatch {
            data_size: 5,
            shape: vec![2, 3],
            expected: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains('6'));
    }

    #[test]
    fn test_scratch_allocation_display() {
        let err = TejerError::ScratchAllocation { requested: 1024 };
        assert!(err.to_string().contains("1024"));
    }
}

//! Tensor implementation
//!
//! This module provides the dense `Tensor` type the convolution engine
//! operates on. Data is stored flattened in row-major order; the engine
//! itself always works with 4-D NCHW `Tensor<f32>` (filter layout
//! `[OutC, InC, KH, KW]`, bias `[OutC]`), but the container is generic the
//! same way the rest of the numeric stack is.
//!
//! Tensors are owned by the caller. Operators only resize and write into
//! tensors they are handed; they never keep references across calls.

use std::fmt;

use num_traits::Num;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TejerError};

/// Dense N-dimensional tensor in row-major order
///
/// # Examples
///
/// ```
/// use tejer::Tensor;
///
/// let t = Tensor::from_vec(vec![2, 3], vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.ndim(), 2);
/// assert_eq!(t.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T: Num> {
    /// Flattened data in row-major order
    data: Vec<T>,
    /// Shape of the tensor
    shape: Vec<usize>,
}

impl<T: Num + Clone> Tensor<T> {
    /// Create a new tensor from a vector and shape
    ///
    /// # Arguments
    ///
    /// * `shape` - Dimensions of the tensor
    /// * `data` - Flattened data in row-major order
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - Shape is empty
    /// - Shape contains zero
    /// - Data size doesn't match shape
    ///
    /// # Examples
    ///
    /// ```
    /// use tejer::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(t.shape(), &[2, 2]);
    /// ```
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        if shape.is_empty() {
            return Err(TejerError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(TejerError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        let expected_size = shape.iter().product();

        if data.len() != expected_size {
            return Err(TejerError::DataShapeMismatch {
                data_size: data.len(),
                shape: shape.clone(),
                expected: expected_size,
            });
        }

        Ok(Self { data, shape })
    }

    /// Create a zero-filled tensor of the given shape
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty or contains zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use tejer::Tensor;
    ///
    /// let t = Tensor::<f32>::zeros(vec![1, 3, 4, 4]).unwrap();
    /// assert_eq!(t.size(), 48);
    /// ```
    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        let size = shape.iter().product();
        Self::from_vec(shape, vec![T::zero(); size])
    }

    /// Get the shape of the tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get the size of one dimension
    ///
    /// # Panics
    ///
    /// Panics if `axis` is out of range for the tensor's rank.
    ///
    /// # Examples
    ///
    /// ```
    /// use tejer::Tensor;
    ///
    /// let t = Tensor::<f32>::zeros(vec![2, 8, 5, 5]).unwrap();
    /// assert_eq!(t.dim(1), 8);
    /// ```
    #[must_use]
    pub fn dim(&self, axis: usize) -> usize {
        self.shape[axis]
    }

    /// Get a reference to the underlying data
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Resize the tensor in place to a new shape, discarding its contents
    ///
    /// The data buffer is reallocated only when the element count grows;
    /// all elements are reset to zero either way. Operators use this to
    /// shape their output tensor before writing the result.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty or contains zero.
    pub fn resize(&mut self, shape: Vec<usize>) -> Result<()> {
        if shape.is_empty() {
            return Err(TejerError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }
        if shape.contains(&0) {
            return Err(TejerError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }
        let size = shape.iter().product();
        self.data.clear();
        self.data.resize(size, T::zero());
        self.shape = shape;
        Ok(())
    }

    /// Fill every element with the given value
    pub fn fill(&mut self, value: T) {
        for v in &mut self.data {
            *v = value.clone();
        }
    }
}

impl<T: Num + Clone + fmt::Display> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?}, data=[", self.shape)?;
        for (i, val) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tensor() {
        let t = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.size(), 6);
    }

    #[test]
    fn test_empty_shape_error() {
        let result = Tensor::from_vec(vec![], vec![1.0, 2.0]);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            TejerError::InvalidShape { .. }
        ));
    }

    #[test]
    fn test_zero_dimension_error() {
        let result = Tensor::<f32>::from_vec(vec![2, 0], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_size_mismatch_error() {
        let result = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0]);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            TejerError::DataShapeMismatch { .. }
        ));
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::<f32>::zeros(vec![1, 2, 3, 3]).unwrap();
        assert_eq!(t.size(), 18);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_resize_reshapes_and_clears() {
        let mut t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        t.resize(vec![1, 2, 3, 3]).unwrap();
        assert_eq!(t.shape(), &[1, 2, 3, 3]);
        assert_eq!(t.size(), 18);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_resize_rejects_zero_dim() {
        let mut t = Tensor::<f32>::zeros(vec![2, 2]).unwrap();
        assert!(t.resize(vec![2, 0]).is_err());
    }

    #[test]
    fn test_fill() {
        let mut t = Tensor::<f32>::zeros(vec![2, 2]).unwrap();
        t.fill(3.5);
        assert!(t.data().iter().all(|&v| v == 3.5));
    }

    #[test]
    fn test_display() {
        let t = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
        let display = format!("{t}");
        assert!(display.contains("shape=[2]"));
        assert!(display.contains('1'));
        assert!(display.contains('2'));
    }
}

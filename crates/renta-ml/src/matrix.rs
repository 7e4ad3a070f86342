//! Dense matrix storage for tree training
//!
//! Feature matrices are small (hundreds of rows, tens of columns), so a
//! plain row-major `Vec<f32>` is all the structure the trainers need.

use crate::{MlError, MlResult};

/// A 2D matrix of f32 values
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    /// Matrix data in row-major order
    data: Vec<f32>,
    /// Number of rows
    rows: usize,
    /// Number of columns
    cols: usize,
}

impl Matrix {
    /// Create a new matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix from row vectors
    pub fn from_rows(data: Vec<Vec<f32>>) -> Self {
        let rows = data.len();
        let cols = if rows > 0 { data[0].len() } else { 0 };
        let flat: Vec<f32> = data.into_iter().flatten().collect();
        Self {
            data: flat,
            rows,
            cols,
        }
    }

    /// Create a column vector from a slice
    pub fn column(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
            rows: data.len(),
            cols: 1,
        }
    }

    /// Get the number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get the shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Get an element at (row, col)
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// Set an element at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    /// Get one row as a slice
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mean of all elements (0.0 for an empty matrix)
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }

    /// Element-wise subtraction
    pub fn sub(&self, other: &Matrix) -> MlResult<Matrix> {
        if self.shape() != other.shape() {
            return Err(MlError::DimensionMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }

        let data: Vec<f32> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();

        Ok(Matrix {
            data,
            rows: self.rows,
            cols: self.cols,
        })
    }
}

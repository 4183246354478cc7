//! Runtime values: scalars and row-major matrices

use crate::error::{EvalError, Result};
use std::fmt;

/// (rows, cols) of a value; a scalar is 1x1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub const SCALAR: Shape = Shape { rows: 1, cols: 1 };

    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Dense matrix stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Build a matrix; `data.len()` must equal `rows * cols`
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(EvalError::dimensionality(
                "matrix",
                format!("{} elements", rows * cols),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// 1xN row vector
    pub fn row(data: Vec<f64>) -> Self {
        Self {
            rows: 1,
            cols: data.len(),
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Standard matrix product
    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(EvalError::dimensionality(
                "*",
                format!("right operand with {} rows", self.cols),
                rhs.shape(),
            ));
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                for j in 0..rhs.cols {
                    out.data[i * rhs.cols + j] += a * rhs.data[k * rhs.cols + j];
                }
            }
        }
        Ok(out)
    }
}

/// Result of evaluating an expression or the content of a variable slot
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Matrix(Matrix),
}

impl Value {
    /// Zero-filled placeholder of the given shape.
    ///
    /// `scalar` distinguishes a true scalar from a 1x1 matrix.
    pub fn zeros(shape: Shape, scalar: bool) -> Self {
        if scalar {
            Value::Scalar(0.0)
        } else {
            Value::Matrix(Matrix::zeros(shape.rows, shape.cols))
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::SCALAR,
            Value::Matrix(m) => m.shape(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    /// Scalar content of a scalar or a 1x1 matrix
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Matrix(m) if m.rows == 1 && m.cols == 1 => Some(m.data[0]),
            Value::Matrix(_) => None,
        }
    }

    /// Elements in row-major order
    pub fn values(&self) -> &[f64] {
        match self {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Matrix(m) => &m.data,
        }
    }

    /// Elements of a scalar or a row vector
    pub fn as_row(&self) -> Option<&[f64]> {
        match self {
            Value::Matrix(m) if m.rows != 1 => None,
            _ => Some(self.values()),
        }
    }

    /// Require a scalar (or 1x1 matrix) operand
    pub(crate) fn expect_scalar(&self, operation: &'static str) -> Result<f64> {
        self.as_scalar()
            .ok_or_else(|| EvalError::dimensionality(operation, "a scalar", self.shape()))
    }

    /// Apply `f` to every element
    pub(crate) fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Matrix(m) => Value::Matrix(Matrix {
                rows: m.rows,
                cols: m.cols,
                data: m.data.iter().map(|&v| f(v)).collect(),
            }),
        }
    }

    /// Combine element-wise; a scalar operand is broadcast, two matrices
    /// must have the same shape.
    pub(crate) fn zip_with(
        &self,
        rhs: &Value,
        operation: &'static str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (self, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            (Value::Scalar(a), Value::Matrix(_)) => Ok(rhs.map(|b| f(*a, b))),
            (Value::Matrix(_), Value::Scalar(b)) => Ok(self.map(|a| f(a, *b))),
            (Value::Matrix(a), Value::Matrix(b)) => {
                if a.shape() != b.shape() {
                    return Err(EvalError::ShapeMismatch {
                        operation,
                        left: a.shape(),
                        right: b.shape(),
                    });
                }
                Ok(Value::Matrix(Matrix {
                    rows: a.rows,
                    cols: a.cols,
                    data: a.data.iter().zip(&b.data).map(|(&x, &y)| f(x, y)).collect(),
                }))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Matrix(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul() {
        let a = Matrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::new(3, 1, vec![1.0, 0.0, -1.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), Shape::new(2, 1));
        assert_eq!(c.as_slice(), &[-2.0, -2.0]);
        assert!(b.matmul(&b).is_err());
    }

    #[test]
    fn test_zip_with_broadcasts_scalars() {
        let m = Value::Matrix(Matrix::row(vec![1.0, 2.0]));
        let out = Value::Scalar(10.0).zip_with(&m, "+", |a, b| a + b).unwrap();
        assert_eq!(out.values(), &[11.0, 12.0]);
    }

    #[test]
    fn test_zip_with_rejects_mismatched_shapes() {
        let a = Value::Matrix(Matrix::row(vec![1.0, 2.0]));
        let b = Value::Matrix(Matrix::row(vec![1.0, 2.0, 3.0]));
        assert!(matches!(
            a.zip_with(&b, "+", |x, y| x + y),
            Err(EvalError::ShapeMismatch { operation: "+", .. })
        ));
    }

    #[test]
    fn test_scalar_views() {
        let one = Value::Matrix(Matrix::row(vec![4.0]));
        assert_eq!(one.as_scalar(), Some(4.0));
        assert!(!one.is_scalar());
        let col = Value::Matrix(Matrix::zeros(2, 1));
        assert!(col.as_row().is_none());
        assert_eq!(Value::Scalar(3.0).as_row(), Some(&[3.0][..]));
        assert_eq!(Shape::new(3, 5).to_string(), "3x5");
    }
}

//! Sequential reference check of a gathered product.

use std::fmt;

use crate::{Error, Matrix};

pub const RTOL: f64 = 1e-5;
pub const ATOL: f64 = 1e-8;

/// First element where the gathered result departs from the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub row: usize,
    pub col: usize,
    pub expected: f64,
    pub actual: f64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C[{}][{}] = {}, expected {}",
            self.row, self.col, self.actual, self.expected
        )
    }
}

/// Outcome of comparing a gathered product against `A·B`.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Match,
    Mismatch { at: Mismatch, expected: Matrix },
}

/// `|actual - expected| <= ATOL + RTOL * |expected|`. NaN never matches.
pub fn is_close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= ATOL + RTOL * expected.abs()
}

/// Plain triple loop over the full operands.
pub fn sequential_product(a: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
    if a.cols() != b.rows() {
        return Err(Error::DimensionMismatch(a.rows(), a.cols(), b.rows(), b.cols()));
    }
    let mut c = Matrix::zeros(a.rows(), b.cols());
    for i in 0..a.rows() {
        for j in 0..b.cols() {
            let mut sum = 0.0;
            for k in 0..a.cols() {
                sum += a[(i, k)] * b[(k, j)];
            }
            c[(i, j)] = sum;
        }
    }
    Ok(c)
}

pub fn first_mismatch(expected: &Matrix, actual: &Matrix) -> Option<Mismatch> {
    expected
        .as_slice()
        .iter()
        .zip(actual.as_slice())
        .position(|(&e, &a)| !is_close(a, e))
        .map(|idx| {
            let cols = expected.cols();
            Mismatch {
                row: idx / cols,
                col: idx % cols,
                expected: expected.as_slice()[idx],
                actual: actual.as_slice()[idx],
            }
        })
}

/// Recomputes `A·B` and compares it with `c` element-wise.
pub fn compare(a: &Matrix, b: &Matrix, c: &Matrix) -> Result<Verdict, Error> {
    let expected = sequential_product(a, b)?;
    if expected.rows() != c.rows() || expected.cols() != c.cols() {
        return Err(Error::DimensionMismatch(
            expected.rows(),
            expected.cols(),
            c.rows(),
            c.cols(),
        ));
    }
    Ok(match first_mismatch(&expected, c) {
        None => Verdict::Match,
        Some(at) => Verdict::Mismatch { at, expected },
    })
}

/// `true` when `c` equals `A·B` within tolerance.
pub fn verify(a: &Matrix, b: &Matrix, c: &Matrix) -> bool {
    matches!(compare(a, b, c), Ok(Verdict::Match))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operands() -> (Matrix, Matrix) {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
        (a, b)
    }

    #[test]
    fn accepts_correct_product() {
        let (a, b) = operands();
        let c = Matrix::from_rows(vec![vec![19.0, 22.0], vec![43.0, 50.0]]).unwrap();
        assert!(verify(&a, &b, &c));
    }

    #[test]
    fn single_perturbed_element_fails() {
        let (a, b) = operands();
        let mut c = sequential_product(&a, &b).unwrap();
        c[(1, 0)] += 0.01;
        assert!(!verify(&a, &b, &c));

        match compare(&a, &b, &c).unwrap() {
            Verdict::Mismatch { at, .. } => {
                assert_eq!((at.row, at.col), (1, 0));
                assert_eq!(at.expected, 43.0);
            }
            Verdict::Match => panic!("perturbed result accepted"),
        }
    }

    #[test]
    fn rounding_noise_is_tolerated() {
        assert!(is_close(1e6 + 1e-3, 1e6));
        assert!(!is_close(1.0 + 1e-4, 1.0));
        assert!(!is_close(f64::NAN, 0.0));
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let (a, b) = operands();
        let c = Matrix::zeros(1, 2);
        assert!(compare(&a, &b, &c).is_err());
        assert!(!verify(&a, &b, &c));
    }

    #[test]
    fn empty_operands_verify() {
        let empty = Matrix::zeros(0, 0);
        assert!(verify(&empty, &empty, &empty));
    }
}

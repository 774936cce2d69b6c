//! Local partial product of one row block.

use rayon::prelude::*;

use crate::config::ComputeMode;
use crate::{Error, Matrix};

/// Computes `block · b` with a direct dot product per output element.
///
/// `block` holds this rank's rows of A. An empty block yields an empty
/// result without reading `b`.
pub fn local_multiply(block: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
    check_dimensions(block, b)?;
    let mut out = Matrix::zeros(block.rows(), b.cols());
    for i in 0..block.rows() {
        multiply_row(block.row(i), b, out.row_mut(i));
    }
    Ok(out)
}

/// Same as [`local_multiply`], with output rows computed on the rayon pool.
///
/// Each element is accumulated in the same order as the sequential version,
/// so both produce identical results.
pub fn local_multiply_parallel(block: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
    check_dimensions(block, b)?;
    let mut out = Matrix::zeros(block.rows(), b.cols());
    if block.rows() == 0 || b.cols() == 0 {
        return Ok(out);
    }
    out.as_mut_slice()
        .par_chunks_mut(b.cols())
        .enumerate()
        .for_each(|(i, row)| multiply_row(block.row(i), b, row));
    Ok(out)
}

pub fn multiply_block(mode: ComputeMode, block: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
    match mode {
        ComputeMode::Sequential => local_multiply(block, b),
        ComputeMode::Parallel => local_multiply_parallel(block, b),
    }
}

fn check_dimensions(block: &Matrix, b: &Matrix) -> Result<(), Error> {
    if block.cols() != b.rows() {
        return Err(Error::DimensionMismatch(
            block.rows(),
            block.cols(),
            b.rows(),
            b.cols(),
        ));
    }
    Ok(())
}

fn multiply_row(a_row: &[f64], b: &Matrix, out: &mut [f64]) {
    for (j, c) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (k, a) in a_row.iter().enumerate() {
            sum += a * b[(k, j)];
        }
        *c = sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Matrix, Matrix) {
        let block = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
        (block, b)
    }

    #[test]
    fn multiplies_rows_by_b() {
        let (block, b) = sample();
        let c = local_multiply(&block, &b).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn empty_block_gives_empty_result() {
        let block = Matrix::zeros(0, 3);
        let b = Matrix::identity(3);
        for mode in [ComputeMode::Sequential, ComputeMode::Parallel] {
            let c = multiply_block(mode, &block, &b).unwrap();
            assert_eq!(c.rows(), 0);
            assert_eq!(c.cols(), 3);
            assert!(c.as_slice().is_empty());
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let block = Matrix::from_vec(7, 9, (0..63).map(|v| (v % 10) as f64 * 0.37).collect()).unwrap();
        let b = Matrix::from_vec(9, 9, (0..81).map(|v| (v % 7) as f64 - 2.5).collect()).unwrap();
        assert_eq!(
            local_multiply(&block, &b).unwrap(),
            local_multiply_parallel(&block, &b).unwrap()
        );
    }

    #[test]
    fn mismatched_inner_dimension_is_rejected() {
        let block = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 2);
        assert!(matches!(
            local_multiply(&block, &b),
            Err(Error::DimensionMismatch(2, 3, 2, 2))
        ));
    }
}

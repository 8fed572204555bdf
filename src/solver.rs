//! Dense linear solver: Gaussian elimination with partial pivoting by
//! magnitude, over `f64` and `Complex64`. Two entry points with identical
//! structure (spec.md §4.2) rather than one generic function, matching how
//! the pack's multi-crate examples keep a real and a complex solve path side
//! by side (e.g. `spicier-solver::linear::{solve_dense, solve_complex}`).
//!
//! The solver is pure: it neither reads nor mutates the circuit, and never
//! silently returns a NaN-filled solution on a singular matrix — it reports
//! `Error::SingularSystem` instead (SPEC_FULL.md §9).

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Default pivot-magnitude tolerance below which a matrix is declared
/// singular (spec.md §4.2).
pub const DEFAULT_PIVOT_EPSILON: f64 = 1e-12;

/// Solve `Ax = b` for real-valued `A` and `b` via Gaussian elimination with
/// partial pivoting. `A` is consumed by value since elimination is
/// destructive; callers that need to keep the original system should clone
/// first.
pub fn solve_real(a: DMatrix<f64>, b: DVector<f64>, pivot_eps: f64) -> Result<DVector<f64>> {
    let n = a.nrows();
    if a.nrows() != a.ncols() || b.len() != n {
        return Err(Error::MalformedSystem {
            reason: format!(
                "A is {}x{}, b has length {}; expected a square system matching b",
                a.nrows(),
                a.ncols(),
                b.len()
            ),
        });
    }
    if n == 0 {
        return Err(Error::MalformedSystem {
            reason: "zero-dimensional system".to_string(),
        });
    }

    let mut a = a;
    let mut b = b;

    for k in 0..n {
        let mut pivot_row = k;
        let mut pivot_mag = a[(k, k)].abs();
        for i in (k + 1)..n {
            let mag = a[(i, k)].abs();
            if mag > pivot_mag {
                pivot_mag = mag;
                pivot_row = i;
            }
        }

        if pivot_mag < pivot_eps {
            return Err(Error::SingularSystem { row: k });
        }

        if pivot_row != k {
            a.swap_rows(k, pivot_row);
            b.swap_rows(k, pivot_row);
        }

        let pivot = a[(k, k)];
        for i in (k + 1)..n {
            let factor = a[(i, k)] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                a[(i, j)] -= factor * a[(k, j)];
            }
            b[i] -= factor * b[k];
        }
    }

    Ok(back_substitute_real(&a, &b, n))
}

fn back_substitute_real(a: &DMatrix<f64>, b: &DVector<f64>, n: usize) -> DVector<f64> {
    let mut x = DVector::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[(i, j)] * x[j];
        }
        x[i] = sum / a[(i, i)];
    }
    x
}

/// Solve `Ax = b` for complex-valued `A` and `b`, identical in structure to
/// [`solve_real`] but pivoting on complex magnitude (`Complex64::norm`)
/// instead of absolute value.
pub fn solve_complex(
    a: DMatrix<Complex64>,
    b: DVector<Complex64>,
    pivot_eps: f64,
) -> Result<DVector<Complex64>> {
    let n = a.nrows();
    if a.nrows() != a.ncols() || b.len() != n {
        return Err(Error::MalformedSystem {
            reason: format!(
                "A is {}x{}, b has length {}; expected a square system matching b",
                a.nrows(),
                a.ncols(),
                b.len()
            ),
        });
    }
    if n == 0 {
        return Err(Error::MalformedSystem {
            reason: "zero-dimensional system".to_string(),
        });
    }

    let mut a = a;
    let mut b = b;

    for k in 0..n {
        let mut pivot_row = k;
        let mut pivot_mag = a[(k, k)].norm();
        for i in (k + 1)..n {
            let mag = a[(i, k)].norm();
            if mag > pivot_mag {
                pivot_mag = mag;
                pivot_row = i;
            }
        }

        if pivot_mag < pivot_eps {
            return Err(Error::SingularSystem { row: k });
        }

        if pivot_row != k {
            a.swap_rows(k, pivot_row);
            b.swap_rows(k, pivot_row);
        }

        let pivot = a[(k, k)];
        for i in (k + 1)..n {
            let factor = a[(i, k)] / pivot;
            if factor.norm() == 0.0 {
                continue;
            }
            for j in k..n {
                a[(i, j)] -= factor * a[(k, j)];
            }
            b[i] -= factor * b[k];
        }
    }

    Ok(back_substitute_complex(&a, &b, n))
}

fn back_substitute_complex(
    a: &DMatrix<Complex64>,
    b: &DVector<Complex64>,
    n: usize,
) -> DVector<Complex64> {
    let mut x = DVector::from_element(n, Complex64::new(0.0, 0.0));
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[(i, j)] * x[j];
        }
        x[i] = sum / a[(i, i)];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_simple_real_system() {
        // [2 1; 1 2] x = [3; 3] -> x = [1; 1]
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![3.0, 3.0]);
        let x = solve_real(a, b, DEFAULT_PIVOT_EPSILON).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn requires_partial_pivot_for_zero_diagonal() {
        // [0 1; 1 1] x = [1; 2] -> x = [1; 1]; a naive non-pivoting solver
        // divides by zero on row 0 without a row swap.
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let x = solve_real(a, b, DEFAULT_PIVOT_EPSILON).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn singular_system_is_reported_not_garbage() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let err = solve_real(a, b, DEFAULT_PIVOT_EPSILON).unwrap_err();
        assert!(matches!(err, Error::SingularSystem { row: 1 }));
    }

    #[test]
    fn dimension_mismatch_is_malformed() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let err = solve_real(a, b, DEFAULT_PIVOT_EPSILON).unwrap_err();
        assert!(matches!(err, Error::MalformedSystem { .. }));
    }

    #[test]
    fn solves_simple_complex_system() {
        let a = DMatrix::from_row_slice(
            1,
            1,
            &[Complex64::new(0.0, 2.0)],
        );
        let b = DVector::from_vec(vec![Complex64::new(0.0, 4.0)]);
        let x = solve_complex(a, b, DEFAULT_PIVOT_EPSILON).unwrap();
        assert!((x[0] - Complex64::new(2.0, 0.0)).norm() < 1e-10);
    }
}

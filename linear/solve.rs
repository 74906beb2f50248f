use super::Error;
use ndarray::prelude::*;

/// Solve `a * x = b` for a symmetric positive definite `a` using its Cholesky factorization.
pub(crate) fn solve_positive_definite(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>, Error> {
	let n = a.nrows();
	let mut l = Array2::<f64>::zeros((n, n));
	for i in 0..n {
		for j in 0..=i {
			let mut sum = a[[i, j]];
			for k in 0..j {
				sum -= l[[i, k]] * l[[j, k]];
			}
			if i == j {
				if sum <= 0.0 || !sum.is_finite() {
					return Err(Error::Singular);
				}
				l[[i, i]] = sum.sqrt();
			} else {
				l[[i, j]] = sum / l[[j, j]];
			}
		}
	}
	// Forward substitution for l * y = b.
	let mut y = Array1::<f64>::zeros(n);
	for i in 0..n {
		let mut sum = b[i];
		for k in 0..i {
			sum -= l[[i, k]] * y[k];
		}
		y[i] = sum / l[[i, i]];
	}
	// Back substitution for l^T * x = y.
	let mut x = Array1::<f64>::zeros(n);
	for i in (0..n).rev() {
		let mut sum = y[i];
		for k in i + 1..n {
			sum -= l[[k, i]] * x[k];
		}
		x[i] = sum / l[[i, i]];
	}
	Ok(x)
}

use super::{check_labels, mean_binomial_deviance, sigmoid, solve::solve_positive_definite, Error};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// These are the options passed to `LogisticRegression::train`.
#[derive(Clone, Debug)]
pub struct LogisticRegressionOptions {
	/// This is the maximum number of Newton steps.
	pub max_iterations: usize,
	/// Training stops when the relative change in deviance between iterations falls below this value.
	pub tolerance: f64,
	/// This small ridge is added to the diagonal of the normal equations so that separable data produces large but finite coefficients.
	pub ridge: f64,
}

impl Default for LogisticRegressionOptions {
	fn default() -> Self {
		Self {
			max_iterations: 25,
			tolerance: 1e-8,
			ridge: 1e-6,
		}
	}
}

/**
A `LogisticRegression` models the log odds of presence as a linear function of a subset of the features.

`weights` has one entry per feature in the training data. Features not in `features` have a weight of zero.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct LogisticRegression {
	pub bias: f64,
	pub weights: Array1<f64>,
	/// The indexes of the features included in the model, in ascending order.
	pub features: Vec<usize>,
	/// The residual deviance on the training data, `-2 * log likelihood`.
	pub deviance: f64,
	pub n_iterations: usize,
}

impl LogisticRegression {
	/// Fit a model on the columns of `features` listed in `columns` with iteratively reweighted least squares.
	pub fn train(
		features: ArrayView2<f32>,
		labels: &[bool],
		columns: &[usize],
		options: &LogisticRegressionOptions,
	) -> Result<LogisticRegression, Error> {
		check_labels(features.nrows(), labels)?;
		let mut columns = columns.to_vec();
		columns.sort_unstable();
		columns.dedup();
		let n_rows = features.nrows();
		let n_parameters = columns.len() + 1;
		// The design matrix has a leading column of ones for the bias.
		let mut design = Array2::<f64>::ones((n_rows, n_parameters));
		for (parameter_index, column) in columns.iter().enumerate() {
			for (value, feature) in izip!(
				design.column_mut(parameter_index + 1).iter_mut(),
				features.column(*column).iter()
			) {
				*value = feature.to_f64().unwrap();
			}
		}
		let targets: Vec<f64> = labels
			.iter()
			.map(|label| if *label { 1.0 } else { 0.0 })
			.collect();
		let mean_target = targets.iter().sum::<f64>() / n_rows.to_f64().unwrap();
		let mut parameters = Array1::<f64>::zeros(n_parameters);
		parameters[0] = (mean_target / (1.0 - mean_target)).ln();
		let mut probabilities = vec![0.0; n_rows];
		let mut deviance = compute_deviance(design.view(), parameters.view(), labels, &mut probabilities);
		let mut n_iterations = 0;
		while n_iterations < options.max_iterations {
			n_iterations += 1;
			// Assemble the Newton step X^T W X delta = X^T (y - p).
			let mut hessian = Array2::<f64>::zeros((n_parameters, n_parameters));
			let mut gradient = Array1::<f64>::zeros(n_parameters);
			for (row, probability, target) in
				izip!(design.axis_iter(Axis(0)), probabilities.iter(), targets.iter())
			{
				let weight = probability * (1.0 - probability);
				let residual = target - probability;
				for i in 0..n_parameters {
					gradient[i] += row[i] * residual;
					for j in 0..=i {
						hessian[[i, j]] += weight * row[i] * row[j];
					}
				}
			}
			for i in 0..n_parameters {
				hessian[[i, i]] += options.ridge;
				for j in 0..i {
					hessian[[j, i]] = hessian[[i, j]];
				}
			}
			let step = solve_positive_definite(hessian.view(), gradient.view())?;
			parameters += &step;
			if parameters.iter().any(|parameter| !parameter.is_finite()) {
				return Err(Error::NotFinite);
			}
			let previous_deviance = deviance;
			deviance = compute_deviance(design.view(), parameters.view(), labels, &mut probabilities);
			if (deviance - previous_deviance).abs() / (deviance.abs() + 0.1) < options.tolerance {
				break;
			}
		}
		let mut weights = Array1::<f64>::zeros(features.ncols());
		for (column, parameter) in izip!(columns.iter(), parameters.iter().skip(1)) {
			weights[*column] = *parameter;
		}
		Ok(LogisticRegression {
			bias: parameters[0],
			weights,
			features: columns,
			deviance,
			n_iterations,
		})
	}

	/// The Akaike information criterion, `deviance + 2 * n_parameters`.
	pub fn aic(&self) -> f64 {
		self.deviance + 2.0 * (self.features.len() + 1).to_f64().unwrap()
	}

	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		for (probability, row) in izip!(probabilities.iter_mut(), features.axis_iter(Axis(0))) {
			let logit = self.bias
				+ self
					.features
					.iter()
					.map(|column| self.weights[*column] * row[*column].to_f64().unwrap())
					.sum::<f64>();
			*probability = sigmoid(logit).to_f32().unwrap();
		}
	}
}

fn compute_deviance(
	design: ArrayView2<f64>,
	parameters: ArrayView1<f64>,
	labels: &[bool],
	probabilities: &mut [f64],
) -> f64 {
	for (probability, row) in izip!(probabilities.iter_mut(), design.axis_iter(Axis(0))) {
		*probability = sigmoid(row.dot(&parameters));
	}
	mean_binomial_deviance(probabilities, labels) * labels.len().to_f64().unwrap()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_intercept_only() {
		// With no features the fitted probability is the class frequency.
		let features = Array2::<f32>::zeros((4, 1));
		let labels = [true, false, false, false];
		let model =
			LogisticRegression::train(features.view(), &labels, &[], &Default::default()).unwrap();
		assert!((model.bias - (1.0f64 / 3.0).ln()).abs() < 1e-9);
		assert_eq!(model.weights, array![0.0]);
		let expected_deviance = -2.0 * (0.25f64.ln() + 3.0 * 0.75f64.ln());
		assert!((model.deviance - expected_deviance).abs() < 1e-4);
		assert!((model.aic() - (expected_deviance + 2.0)).abs() < 1e-4);
	}

	#[test]
	fn test_learns_direction() {
		let features = array![[0.0f32], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
		let labels = [false, false, true, false, true, false, true, true];
		let model =
			LogisticRegression::train(features.view(), &labels, &[0], &Default::default()).unwrap();
		assert!(model.weights[0] > 0.0);
		let mut probabilities = Array1::zeros(8);
		model.predict(features.view(), probabilities.view_mut());
		assert!(probabilities[7] > probabilities[0]);
		assert!(probabilities.iter().all(|p| *p > 0.0 && *p < 1.0));
	}

	#[test]
	fn test_single_class() {
		let features = Array2::<f32>::zeros((3, 1));
		let result = LogisticRegression::train(
			features.view(),
			&[true, true, true],
			&[0],
			&Default::default(),
		);
		assert_eq!(result, Err(Error::SingleClass));
	}
}

use super::{check_labels, mean_binomial_deviance, sigmoid, Error, PROBABILITY_EPSILON};
use covermap_dataframe::{max_stratified_folds, Folds};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rayon::prelude::*;

/// These are the options that control coordinate descent for a single penalty strength.
#[derive(Clone, Debug)]
pub struct ElasticNetOptions {
	/// This is the maximum number of quadratic approximations of the log likelihood.
	pub max_iterations: usize,
	/// This is the maximum number of coordinate descent passes over the features for each quadratic approximation.
	pub max_passes: usize,
	/// Coordinate descent stops when the largest weighted squared change in a coefficient falls below this value.
	pub tolerance: f64,
}

impl Default for ElasticNetOptions {
	fn default() -> Self {
		Self {
			max_iterations: 100,
			max_passes: 1000,
			tolerance: 1e-7,
		}
	}
}

/**
An `ElasticNet` is a logistic regression fitted by minimizing

`-loglik / n + lambda * ((1 - alpha) / 2 * |beta|_2^2 + alpha * |beta|_1)`

on standardized features. `alpha = 1` is the lasso and `alpha = 0` is ridge regression. The intercept is not penalized. `intercept` and `coefficients` are reported on the scale of the unstandardized features.
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ElasticNet {
	pub alpha: f64,
	pub lambda: f64,
	pub intercept: f64,
	pub coefficients: Vec<f64>,
}

struct Standardized {
	values: Array2<f64>,
	means: Vec<f64>,
	/// The population standard deviation of each column. Constant columns have a scale of zero and are left out of the model.
	scales: Vec<f64>,
}

impl Standardized {
	fn new(features: ArrayView2<f32>) -> Standardized {
		let n = features.nrows().to_f64().unwrap();
		let mut values = features.mapv(|value| value.to_f64().unwrap());
		let mut means = Vec::with_capacity(values.ncols());
		let mut scales = Vec::with_capacity(values.ncols());
		for mut column in values.axis_iter_mut(Axis(1)) {
			let mean = column.sum() / n;
			let variance = column.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n;
			let scale = if variance > 1e-24 { variance.sqrt() } else { 0.0 };
			column.mapv_inplace(|value| if scale > 0.0 { (value - mean) / scale } else { 0.0 });
			means.push(mean);
			scales.push(scale);
		}
		Standardized {
			values,
			means,
			scales,
		}
	}
}

/**
Compute the decreasing sequence of penalty strengths for `alpha`.

The first value is `lambda_max`, the smallest penalty at which every coefficient is zero. The values decrease geometrically to `lambda_max * lambda_min_ratio`. When `lambda_min_ratio` is `None` it is `1e-4` if there are more rows than features and `1e-2` otherwise. `alpha` values below `1e-3` use `1e-3` when computing `lambda_max`, so ridge paths start from a finite value.
*/
pub fn lambda_path(
	features: ArrayView2<f32>,
	labels: &[bool],
	alpha: f64,
	n_lambdas: usize,
	lambda_min_ratio: Option<f64>,
) -> Result<Vec<f64>, Error> {
	check_labels(features.nrows(), labels)?;
	check_alpha(alpha)?;
	let standardized = Standardized::new(features);
	Ok(lambda_path_standardized(
		&standardized,
		labels,
		alpha,
		n_lambdas,
		lambda_min_ratio,
	))
}

fn lambda_path_standardized(
	standardized: &Standardized,
	labels: &[bool],
	alpha: f64,
	n_lambdas: usize,
	lambda_min_ratio: Option<f64>,
) -> Vec<f64> {
	let n = labels.len().to_f64().unwrap();
	let targets = targets(labels);
	let mean_target = targets.iter().sum::<f64>() / n;
	let max_gradient = standardized
		.values
		.axis_iter(Axis(1))
		.map(|column| {
			izip!(column.iter(), targets.iter())
				.map(|(value, target)| value * (target - mean_target))
				.sum::<f64>()
				.abs() / n
		})
		.fold(0.0, f64::max);
	let lambda_max = if max_gradient > 0.0 {
		max_gradient / alpha.max(1e-3)
	} else {
		1.0
	};
	let default_ratio = if labels.len() > standardized.values.ncols() {
		1e-4
	} else {
		1e-2
	};
	let lambda_min_ratio = lambda_min_ratio.unwrap_or(default_ratio);
	let n_lambdas = n_lambdas.max(1);
	if n_lambdas == 1 {
		return vec![lambda_max];
	}
	let last = (n_lambdas - 1).to_f64().unwrap();
	(0..n_lambdas)
		.map(|index| lambda_max * lambda_min_ratio.powf(index.to_f64().unwrap() / last))
		.collect()
}

impl ElasticNet {
	/**
	Fit one model per value of `lambdas`, which should be decreasing. Each fit starts from the coefficients of the previous one.
	*/
	pub fn train_path(
		features: ArrayView2<f32>,
		labels: &[bool],
		alpha: f64,
		lambdas: &[f64],
		options: &ElasticNetOptions,
	) -> Result<Vec<ElasticNet>, Error> {
		check_labels(features.nrows(), labels)?;
		check_alpha(alpha)?;
		let standardized = Standardized::new(features);
		train_path_standardized(&standardized, labels, alpha, lambdas, options)
	}

	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		for (probability, row) in izip!(probabilities.iter_mut(), features.axis_iter(Axis(0))) {
			*probability = self.predict_row(row).to_f32().unwrap();
		}
	}

	fn predict_row(&self, row: ArrayView1<f32>) -> f64 {
		let logit = self.intercept
			+ izip!(row.iter(), self.coefficients.iter())
				.map(|(value, coefficient)| value.to_f64().unwrap() * coefficient)
				.sum::<f64>();
		sigmoid(logit)
	}

	fn predict_rows(&self, features: ArrayView2<f32>) -> Vec<f64> {
		features
			.axis_iter(Axis(0))
			.map(|row| self.predict_row(row))
			.collect()
	}
}

fn train_path_standardized(
	standardized: &Standardized,
	labels: &[bool],
	alpha: f64,
	lambdas: &[f64],
	options: &ElasticNetOptions,
) -> Result<Vec<ElasticNet>, Error> {
	let x = &standardized.values;
	let (n_rows, n_features) = x.dim();
	let n = n_rows.to_f64().unwrap();
	let targets = targets(labels);
	let mean_target = targets.iter().sum::<f64>() / n;
	let mut intercept = (mean_target / (1.0 - mean_target)).ln();
	let mut beta = vec![0.0; n_features];
	let mut weights = vec![0.0; n_rows];
	let mut residuals = vec![0.0; n_rows];
	let mut weighted_squares = vec![0.0; n_features];
	let mut models = Vec::with_capacity(lambdas.len());
	for lambda in lambdas.iter() {
		let l1 = lambda * alpha;
		let l2 = lambda * (1.0 - alpha);
		for _ in 0..options.max_iterations {
			// Form the quadratic approximation at the current coefficients. The residuals are z - eta where z is the working response.
			for (weight, residual, row, target) in izip!(
				weights.iter_mut(),
				residuals.iter_mut(),
				x.axis_iter(Axis(0)),
				targets.iter()
			) {
				let eta = intercept
					+ izip!(row.iter(), beta.iter())
						.map(|(value, beta)| value * beta)
						.sum::<f64>();
				let probability = sigmoid(eta)
					.max(PROBABILITY_EPSILON)
					.min(1.0 - PROBABILITY_EPSILON);
				*weight = probability * (1.0 - probability);
				*residual = (target - probability) / *weight;
			}
			let weight_sum: f64 = weights.iter().sum();
			for (weighted_square, column) in
				izip!(weighted_squares.iter_mut(), x.axis_iter(Axis(1)))
			{
				*weighted_square = izip!(column.iter(), weights.iter())
					.map(|(value, weight)| weight * value * value)
					.sum::<f64>() / n;
			}
			let mut max_outer_change: f64 = 0.0;
			for _ in 0..options.max_passes {
				let mut max_change: f64 = 0.0;
				let delta = izip!(weights.iter(), residuals.iter())
					.map(|(weight, residual)| weight * residual)
					.sum::<f64>() / weight_sum;
				intercept += delta;
				for residual in residuals.iter_mut() {
					*residual -= delta;
				}
				max_change = max_change.max(weight_sum / n * delta * delta);
				for (feature_index, column) in x.axis_iter(Axis(1)).enumerate() {
					if standardized.scales[feature_index] == 0.0 {
						continue;
					}
					let weighted_square = weighted_squares[feature_index];
					let gradient = izip!(column.iter(), weights.iter(), residuals.iter())
						.map(|(value, weight, residual)| weight * value * residual)
						.sum::<f64>() / n + weighted_square * beta[feature_index];
					let updated = soft_threshold(gradient, l1) / (weighted_square + l2);
					let change = updated - beta[feature_index];
					if change != 0.0 {
						for (residual, value) in izip!(residuals.iter_mut(), column.iter()) {
							*residual -= change * value;
						}
						beta[feature_index] = updated;
						max_change = max_change.max(weighted_square * change * change);
					}
				}
				max_outer_change = max_outer_change.max(max_change);
				if max_change < options.tolerance {
					break;
				}
			}
			if !intercept.is_finite() || beta.iter().any(|beta| !beta.is_finite()) {
				return Err(Error::NotFinite);
			}
			if max_outer_change < options.tolerance {
				break;
			}
		}
		let coefficients: Vec<f64> = izip!(beta.iter(), standardized.scales.iter())
			.map(|(beta, scale)| if *scale > 0.0 { beta / scale } else { 0.0 })
			.collect();
		let unstandardized_intercept = intercept
			- izip!(coefficients.iter(), standardized.means.iter())
				.map(|(coefficient, mean)| coefficient * mean)
				.sum::<f64>();
		models.push(ElasticNet {
			alpha,
			lambda: *lambda,
			intercept: unstandardized_intercept,
			coefficients,
		});
	}
	Ok(models)
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
	if value > threshold {
		value - threshold
	} else if value < -threshold {
		value + threshold
	} else {
		0.0
	}
}

fn targets(labels: &[bool]) -> Vec<f64> {
	labels
		.iter()
		.map(|label| if *label { 1.0 } else { 0.0 })
		.collect()
}

fn check_alpha(alpha: f64) -> Result<(), Error> {
	if (0.0..=1.0).contains(&alpha) {
		Ok(())
	} else {
		Err(Error::InvalidOption(format!(
			"alpha must be between 0 and 1, got {}",
			alpha
		)))
	}
}

/// These are the options passed to `ElasticNetCv::train`.
#[derive(Clone, Debug)]
pub struct ElasticNetCvOptions {
	/// The mixing parameters to search.
	pub alphas: Vec<f64>,
	/// The number of penalty strengths on the path for each alpha.
	pub n_lambdas: usize,
	pub lambda_min_ratio: Option<f64>,
	/// The requested number of folds. Fewer are used when the minority class has fewer rows.
	pub n_folds: usize,
	pub seed: u64,
	pub elastic_net_options: ElasticNetOptions,
}

impl Default for ElasticNetCvOptions {
	fn default() -> Self {
		Self {
			alphas: vec![0.1, 0.55, 1.0],
			n_lambdas: 20,
			lambda_min_ratio: None,
			n_folds: 10,
			seed: 0,
			elastic_net_options: ElasticNetOptions::default(),
		}
	}
}

/// The cross validated mean binomial deviance of one (alpha, lambda) pair.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ElasticNetCvPoint {
	pub alpha: f64,
	pub lambda: f64,
	pub mean_deviance: f64,
}

/**
An `ElasticNetCv` is the `ElasticNet` whose (alpha, lambda) pair had the lowest mean held out binomial deviance over stratified k-fold cross validation, refitted on all rows.

For each alpha the lambda path is computed from all rows, then the path is fitted on the training rows of every fold and scored on its held out rows. The mean deviance of a pair is the average of its per-fold mean deviances. Ties keep the earlier alpha and the larger lambda.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct ElasticNetCv {
	pub model: ElasticNet,
	pub n_folds: usize,
	pub mean_deviance: f64,
	pub points: Vec<ElasticNetCvPoint>,
}

impl ElasticNetCv {
	pub fn train(
		features: ArrayView2<f32>,
		labels: &[bool],
		options: &ElasticNetCvOptions,
	) -> Result<ElasticNetCv, Error> {
		check_labels(features.nrows(), labels)?;
		if options.alphas.is_empty() {
			return Err(Error::InvalidOption("alphas must not be empty".to_owned()));
		}
		for alpha in options.alphas.iter() {
			check_alpha(*alpha)?;
		}
		let n_folds = max_stratified_folds(labels, options.n_folds);
		if n_folds < 2 {
			return Err(Error::InsufficientFolds { n_folds });
		}
		let folds = Folds::stratified(labels, n_folds, options.seed);
		let standardized = Standardized::new(features);
		let splits: Vec<_> = folds.iter().collect();
		let mut points = Vec::new();
		for alpha in options.alphas.iter() {
			let lambdas = lambda_path_standardized(
				&standardized,
				labels,
				*alpha,
				options.n_lambdas,
				options.lambda_min_ratio,
			);
			let fold_deviances: Vec<Vec<f64>> = splits
				.par_iter()
				.map(|split| -> Result<Vec<f64>, Error> {
					let train_features = features.select(Axis(0), &split.train);
					let train_labels: Vec<bool> = split.train.iter().map(|i| labels[*i]).collect();
					let holdout_features = features.select(Axis(0), &split.test);
					let holdout_labels: Vec<bool> = split.test.iter().map(|i| labels[*i]).collect();
					let models = ElasticNet::train_path(
						train_features.view(),
						&train_labels,
						*alpha,
						&lambdas,
						&options.elastic_net_options,
					)?;
					Ok(models
						.iter()
						.map(|model| {
							mean_binomial_deviance(
								&model.predict_rows(holdout_features.view()),
								&holdout_labels,
							)
						})
						.collect())
				})
				.collect::<Result<_, _>>()?;
			for (lambda_index, lambda) in lambdas.iter().enumerate() {
				let mean_deviance = fold_deviances
					.iter()
					.map(|deviances| deviances[lambda_index])
					.sum::<f64>() / n_folds.to_f64().unwrap();
				points.push(ElasticNetCvPoint {
					alpha: *alpha,
					lambda: *lambda,
					mean_deviance,
				});
			}
			log::debug!("cross validated the lambda path for alpha {}", alpha);
		}
		let mut best_index = 0;
		for (index, point) in points.iter().enumerate() {
			if point.mean_deviance < points[best_index].mean_deviance {
				best_index = index;
			}
		}
		let best = points[best_index].clone();
		let lambdas: Vec<f64> = points
			.iter()
			.filter(|point| point.alpha == best.alpha && point.lambda >= best.lambda)
			.map(|point| point.lambda)
			.collect();
		let model = train_path_standardized(
			&standardized,
			labels,
			best.alpha,
			&lambdas,
			&options.elastic_net_options,
		)?
		.pop()
		.ok_or(Error::NotFinite)?;
		Ok(ElasticNetCv {
			model,
			n_folds,
			mean_deviance: best.mean_deviance,
			points,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Array2<f32>, Vec<bool>) {
		// Column 0 is informative, column 1 is constant, column 2 is weakly informative.
		let n = 60;
		let mut features = Array2::<f32>::zeros((n, 3));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let label = i % 3 != 0;
			let noise = ((i * 7) % 11) as f32 / 11.0;
			features[[i, 0]] = if label { 0.3 + 0.7 * noise } else { 0.5 * noise };
			features[[i, 1]] = 0.5;
			features[[i, 2]] = if label { noise } else { 1.0 - noise };
			labels.push(label);
		}
		(features, labels)
	}

	#[test]
	fn test_lambda_max_zeroes_coefficients() {
		let (features, labels) = fixture();
		let lambdas = lambda_path(features.view(), &labels, 1.0, 5, None).unwrap();
		assert_eq!(lambdas.len(), 5);
		assert!(lambdas.windows(2).all(|window| window[0] > window[1]));
		assert!((lambdas[4] / lambdas[0] - 1e-4).abs() < 1e-12);
		let models =
			ElasticNet::train_path(features.view(), &labels, 1.0, &lambdas, &Default::default())
				.unwrap();
		assert!(models[0].coefficients.iter().all(|c| c.abs() < 1e-9));
		let expected_intercept = (40.0f64 / 20.0).ln();
		assert!((models[0].intercept - expected_intercept).abs() < 1e-9);
		assert!(models[4].coefficients[0] > 0.0);
		assert_eq!(models[4].coefficients[1], 0.0);
	}

	#[test]
	fn test_cross_validation() {
		let (features, labels) = fixture();
		let options = ElasticNetCvOptions {
			n_lambdas: 8,
			n_folds: 5,
			seed: 42,
			..Default::default()
		};
		let cv = ElasticNetCv::train(features.view(), &labels, &options).unwrap();
		assert_eq!(cv.n_folds, 5);
		assert_eq!(cv.points.len(), 3 * 8);
		assert!(cv
			.points
			.iter()
			.all(|point| point.mean_deviance >= cv.mean_deviance));
		assert!(cv.model.coefficients[0] > 0.0);
		let mut probabilities = Array1::zeros(features.nrows());
		cv.model.predict(features.view(), probabilities.view_mut());
		assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
		let again = ElasticNetCv::train(features.view(), &labels, &options).unwrap();
		assert_eq!(cv, again);
	}

	#[test]
	fn test_insufficient_folds() {
		let features = array![[0.1f32], [0.2], [0.3], [0.4]];
		let labels = [true, false, false, false];
		let result = ElasticNetCv::train(features.view(), &labels, &Default::default());
		assert_eq!(result, Err(Error::InsufficientFolds { n_folds: 1 }));
	}

	#[test]
	fn test_invalid_alpha() {
		let (features, labels) = fixture();
		let options = ElasticNetCvOptions {
			alphas: vec![1.5],
			..Default::default()
		};
		assert!(matches!(
			ElasticNetCv::train(features.view(), &labels, &options),
			Err(Error::InvalidOption(_))
		));
	}
}

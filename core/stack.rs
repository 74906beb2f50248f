use crate::classifier::{Algorithm, StackedClassifier};
use crate::Error;
use covermap_linear::{ElasticNetCv, ElasticNetCvOptions, ElasticNetCvPoint, ElasticNetOptions};
use ndarray::prelude::*;

/// These are the options passed to `train_stacked_classifier`.
#[derive(Clone, Debug)]
pub struct StackingOptions {
	pub alphas: Vec<f64>,
	pub n_lambdas: usize,
	pub lambda_min_ratio: Option<f64>,
	pub n_folds: usize,
	pub seed: u64,
}

#[derive(Debug)]
pub struct StackingOutput {
	pub classifier: StackedClassifier,
	/// The number of cross validation folds actually used.
	pub n_folds: usize,
	pub mean_deviance: f64,
	pub points: Vec<ElasticNetCvPoint>,
}

/**
Fit the elastic net meta learner on the base prediction matrix of the Test rows. Column `j` of `base_predictions` holds the probabilities of `algorithms[j]`.

The fold count is the smaller of `options.n_folds` and the minority class count. Fewer than two rows of either class is a threshold error, since neither the meta learner nor the threshold can be estimated.
*/
pub fn train_stacked_classifier(
	base_predictions: ArrayView2<f32>,
	algorithms: Vec<Algorithm>,
	labels: &[bool],
	options: &StackingOptions,
) -> Result<StackingOutput, Error> {
	if base_predictions.ncols() != algorithms.len() {
		return Err(Error::Shape(format!(
			"{} base prediction columns for {} algorithms",
			base_predictions.ncols(),
			algorithms.len()
		)));
	}
	if algorithms.is_empty() {
		return Err(Error::Fit("no base model was trained".to_owned()));
	}
	let n_present = labels.iter().filter(|label| **label).count();
	let n_absent = labels.len() - n_present;
	if n_present < 2 || n_absent < 2 {
		return Err(Error::Threshold(format!(
			"the Test split has {} presence and {} absence rows, at least 2 of each are required",
			n_present, n_absent
		)));
	}
	let cv_options = ElasticNetCvOptions {
		alphas: options.alphas.clone(),
		n_lambdas: options.n_lambdas,
		lambda_min_ratio: options.lambda_min_ratio,
		n_folds: options.n_folds,
		seed: options.seed,
		elastic_net_options: ElasticNetOptions::default(),
	};
	let cv = ElasticNetCv::train(base_predictions, labels, &cv_options).map_err(|error| {
		match error {
			covermap_linear::Error::InsufficientFolds { .. } => Error::Threshold(error.to_string()),
			error => Error::Fit(error.to_string()),
		}
	})?;
	let coefficients_are_finite = cv.model.coefficients.iter().all(|c| c.is_finite());
	if !cv.model.intercept.is_finite() || !coefficients_are_finite {
		return Err(Error::Fit("the stacked coefficients are not finite".to_owned()));
	}
	log::info!(
		"stacked {} base models with alpha {} and lambda {:.6} over {} folds",
		algorithms.len(),
		cv.model.alpha,
		cv.model.lambda,
		cv.n_folds
	);
	Ok(StackingOutput {
		classifier: StackedClassifier {
			algorithms,
			model: cv.model,
		},
		n_folds: cv.n_folds,
		mean_deviance: cv.mean_deviance,
		points: cv.points,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	fn options() -> StackingOptions {
		StackingOptions {
			alphas: vec![0.1, 0.55, 1.0],
			n_lambdas: 10,
			lambda_min_ratio: None,
			n_folds: 10,
			seed: 5,
		}
	}

	fn fixture() -> (Array2<f32>, Vec<bool>) {
		// The first base model is informative, the second is a coin flip.
		let n = 48;
		let mut base_predictions = Array2::zeros((n, 2));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let label = i % 2 == 0;
			let noise = ((i * 13) % 9) as f32 / 9.0;
			base_predictions[[i, 0]] = if label { 0.4 + 0.5 * noise } else { 0.6 * noise };
			base_predictions[[i, 1]] = ((i * 5) % 7) as f32 / 7.0;
			labels.push(label);
		}
		(base_predictions, labels)
	}

	#[test]
	fn test_stacked_probabilities_are_probabilities() {
		let (base_predictions, labels) = fixture();
		let output = train_stacked_classifier(
			base_predictions.view(),
			vec![Algorithm::Glm, Algorithm::RandomForest],
			&labels,
			&options(),
		)
		.unwrap();
		assert_eq!(output.n_folds, 10);
		assert_eq!(output.points.len(), 30);
		let probabilities = output.classifier.predict_probability(base_predictions.view());
		assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
		assert!(output.classifier.model.coefficients[0] > 0.0);
		let auc = covermap_metrics::auc_roc(probabilities.as_slice().unwrap(), &labels);
		assert!(auc > 0.8);
	}

	#[test]
	fn test_fold_count_follows_minority_class() {
		let (base_predictions, mut labels) = fixture();
		for (index, label) in labels.iter_mut().enumerate() {
			*label = index % 12 == 0;
		}
		let output = train_stacked_classifier(
			base_predictions.view(),
			vec![Algorithm::Glm, Algorithm::RandomForest],
			&labels,
			&options(),
		)
		.unwrap();
		assert_eq!(output.n_folds, 4);
	}

	#[test]
	fn test_insufficient_test_rows() {
		let (base_predictions, _) = fixture();
		let mut labels = vec![false; base_predictions.nrows()];
		labels[3] = true;
		let error = train_stacked_classifier(
			base_predictions.view(),
			vec![Algorithm::Glm, Algorithm::RandomForest],
			&labels,
			&options(),
		)
		.unwrap_err();
		assert!(matches!(error, Error::Threshold(_)));
	}
}

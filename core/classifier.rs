/*!
This module defines the [`Classifier`](trait.Classifier.html) trait and one implementation per base algorithm, plus the [`StackedClassifier`](struct.StackedClassifier.html) that blends their probabilities.
*/

use crate::grid::GridItem;
use crate::Error;
use covermap_features::FeatureNormalizer;
use covermap_linear::{stepwise_aic, ElasticNet, LogisticRegression, StepwiseOptions};
use covermap_neural::NeuralNetwork;
use covermap_tree::{BinaryClassifier, RandomForest};
use ndarray::prelude::*;

/// A `Classifier` predicts the probability that each row of covariates belongs to the present class.
pub trait Classifier: Send + Sync + std::fmt::Debug {
	fn algorithm(&self) -> Algorithm;

	/// `features` has one row per example and one column per covariate, in the order the classifier was trained with.
	fn predict_probability(&self, features: ArrayView2<f32>) -> Array1<f32>;

	fn predict_label(&self, features: ArrayView2<f32>) -> Array1<bool> {
		self.predict_probability(features)
			.mapv(|probability| probability >= 0.5)
	}

	/// For each training row, the probability predicted by the parts of the model that did not see it. Only bagged models have these.
	fn out_of_bag_probabilities(&self) -> Option<&[f32]> {
		None
	}

	/// The importance of each covariate in training order, for tree ensembles.
	fn feature_importances(&self) -> Option<&[f32]> {
		None
	}

	/// The indexes of the covariates the model kept, for models that select a subset.
	fn selected_features(&self) -> Option<&[usize]> {
		None
	}
}

#[derive(
	Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Algorithm {
	#[serde(rename = "glm")]
	Glm,
	#[serde(rename = "random_forest")]
	RandomForest,
	#[serde(rename = "gradient_boosting")]
	GradientBoosting,
	#[serde(rename = "neural_network")]
	NeuralNetwork,
	#[serde(rename = "stacked")]
	Stacked,
}

impl Algorithm {
	pub fn name(&self) -> &'static str {
		match self {
			Algorithm::Glm => "glm",
			Algorithm::RandomForest => "random_forest",
			Algorithm::GradientBoosting => "gradient_boosting",
			Algorithm::NeuralNetwork => "neural_network",
			Algorithm::Stacked => "stacked",
		}
	}
}

impl std::fmt::Display for Algorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name())
	}
}

/// Train the model described by `grid_item` on every row of `features`.
pub fn train_model(
	grid_item: &GridItem,
	features: ArrayView2<f32>,
	labels: &[bool],
	column_names: &[String],
	seed: u64,
) -> Result<Box<dyn Classifier>, Error> {
	let model: Box<dyn Classifier> = match grid_item {
		GridItem::Glm { stepwise } => Box::new(GlmClassifier::train(
			features,
			labels,
			column_names,
			*stepwise,
		)?),
		GridItem::RandomForest { options } => Box::new(RandomForestClassifier {
			model: RandomForest::train(features, labels, options, seed)?,
		}),
		GridItem::GradientBoosting { options } => Box::new(GradientBoostingClassifier {
			model: BinaryClassifier::train(features, labels, options)?,
		}),
		GridItem::NeuralNetwork { options } => {
			let normalizer = FeatureNormalizer::fit(column_names, features);
			let normalized = normalizer.compute_array_f32(features);
			let model = NeuralNetwork::train(normalized.view(), labels, options, seed)?;
			Box::new(NeuralNetworkClassifier { normalizer, model })
		}
	};
	Ok(model)
}

/// A logistic regression on z-scored covariates, optionally reduced to a subset of covariates by stepwise AIC.
#[derive(Clone, Debug)]
pub struct GlmClassifier {
	pub normalizer: FeatureNormalizer,
	pub model: LogisticRegression,
}

impl GlmClassifier {
	pub fn train(
		features: ArrayView2<f32>,
		labels: &[bool],
		column_names: &[String],
		stepwise: bool,
	) -> Result<GlmClassifier, Error> {
		let normalizer = FeatureNormalizer::fit(column_names, features);
		let normalized = normalizer.compute_array_f32(features);
		let options = StepwiseOptions::default();
		let model = if stepwise {
			stepwise_aic(normalized.view(), labels, &options)?
		} else {
			let columns: Vec<usize> = (0..normalized.ncols()).collect();
			LogisticRegression::train(
				normalized.view(),
				labels,
				&columns,
				&options.logistic_regression_options,
			)?
		};
		Ok(GlmClassifier { normalizer, model })
	}
}

impl Classifier for GlmClassifier {
	fn algorithm(&self) -> Algorithm {
		Algorithm::Glm
	}

	fn predict_probability(&self, features: ArrayView2<f32>) -> Array1<f32> {
		let normalized = self.normalizer.compute_array_f32(features);
		let mut probabilities = Array1::zeros(features.nrows());
		self.model.predict(normalized.view(), probabilities.view_mut());
		probabilities
	}

	fn selected_features(&self) -> Option<&[usize]> {
		Some(&self.model.features)
	}
}

#[derive(Clone, Debug)]
pub struct RandomForestClassifier {
	pub model: RandomForest,
}

impl Classifier for RandomForestClassifier {
	fn algorithm(&self) -> Algorithm {
		Algorithm::RandomForest
	}

	fn predict_probability(&self, features: ArrayView2<f32>) -> Array1<f32> {
		let mut probabilities = Array1::zeros(features.nrows());
		self.model.predict(features, probabilities.view_mut());
		probabilities
	}

	fn out_of_bag_probabilities(&self) -> Option<&[f32]> {
		Some(&self.model.out_of_bag_probabilities)
	}

	fn feature_importances(&self) -> Option<&[f32]> {
		Some(&self.model.feature_importances)
	}
}

#[derive(Clone, Debug)]
pub struct GradientBoostingClassifier {
	pub model: BinaryClassifier,
}

impl Classifier for GradientBoostingClassifier {
	fn algorithm(&self) -> Algorithm {
		Algorithm::GradientBoosting
	}

	fn predict_probability(&self, features: ArrayView2<f32>) -> Array1<f32> {
		let mut probabilities = Array1::zeros(features.nrows());
		self.model.predict(features, probabilities.view_mut());
		probabilities
	}

	fn feature_importances(&self) -> Option<&[f32]> {
		Some(&self.model.feature_importances)
	}
}

/// A neural network on z-scored covariates.
#[derive(Clone, Debug)]
pub struct NeuralNetworkClassifier {
	pub normalizer: FeatureNormalizer,
	pub model: NeuralNetwork,
}

impl Classifier for NeuralNetworkClassifier {
	fn algorithm(&self) -> Algorithm {
		Algorithm::NeuralNetwork
	}

	fn predict_probability(&self, features: ArrayView2<f32>) -> Array1<f32> {
		let normalized = self.normalizer.compute_array_f32(features);
		let mut probabilities = Array1::zeros(features.nrows());
		self.model.predict(normalized.view(), probabilities.view_mut());
		probabilities
	}
}

/**
A `StackedClassifier` is an elastic net logistic regression whose inputs are the probabilities of the base classifiers, one column per entry of `algorithms` in that order.
*/
#[derive(Clone, Debug)]
pub struct StackedClassifier {
	pub algorithms: Vec<Algorithm>,
	pub model: ElasticNet,
}

impl StackedClassifier {
	/// Compute the stacked probability of each row of a base prediction matrix.
	pub fn predict_probability(&self, base_predictions: ArrayView2<f32>) -> Array1<f32> {
		let mut probabilities = Array1::zeros(base_predictions.nrows());
		self.model
			.predict(base_predictions, probabilities.view_mut());
		probabilities
	}

	pub fn predict_label(&self, base_predictions: ArrayView2<f32>, threshold: f32) -> Array1<bool> {
		self.predict_probability(base_predictions)
			.mapv(|probability| probability >= threshold)
	}
}

/// Build the base prediction matrix, with one column per classifier in order.
pub fn compute_base_predictions(
	classifiers: &[Box<dyn Classifier>],
	features: ArrayView2<f32>,
) -> Array2<f32> {
	let mut base_predictions = Array2::zeros((features.nrows(), classifiers.len()));
	for (classifier, mut column) in classifiers
		.iter()
		.zip(base_predictions.axis_iter_mut(Axis(1)))
	{
		column.assign(&classifier.predict_probability(features));
	}
	base_predictions
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Array2<f32>, Vec<bool>, Vec<String>) {
		// The first covariate separates the classes with a little overlap. The second is noise.
		let n = 60;
		let mut features = Array2::zeros((n, 2));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let label = i % 3 == 0;
			let noise = ((i * 7919) % 13) as f32 / 13.0;
			features[[i, 0]] = if label { 1.0 + noise } else { noise * 1.2 };
			features[[i, 1]] = ((i * 104_729) % 17) as f32;
			labels.push(label);
		}
		(features, labels, vec!["ndvi".to_owned(), "noise".to_owned()])
	}

	#[test]
	fn test_base_classifiers_rank_presence_higher() {
		let (features, labels, names) = fixture();
		let items = [
			GridItem::Glm { stepwise: false },
			GridItem::RandomForest {
				options: covermap_tree::RandomForestOptions {
					n_trees: 20,
					..Default::default()
				},
			},
			GridItem::GradientBoosting {
				options: covermap_tree::TrainOptions {
					max_rounds: 20,
					min_examples_per_child: 2,
					..Default::default()
				},
			},
			GridItem::NeuralNetwork {
				options: covermap_neural::TrainOptions {
					hidden_units: 2,
					..Default::default()
				},
			},
		];
		for item in items.iter() {
			let model = train_model(item, features.view(), &labels, &names, 7).unwrap();
			assert_eq!(model.algorithm(), item.algorithm());
			let probabilities = model.predict_probability(features.view());
			assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
			let auc = covermap_metrics::auc_roc(probabilities.as_slice().unwrap(), &labels);
			assert!(auc > 0.85, "{} auc {}", item.algorithm(), auc);
			let predicted = model.predict_label(features.view());
			assert_eq!(predicted.len(), labels.len());
			match item {
				GridItem::Glm { .. } => {
					assert_eq!(model.selected_features(), Some(&[0, 1][..]));
					assert!(model.feature_importances().is_none());
				}
				GridItem::RandomForest { .. } | GridItem::GradientBoosting { .. } => {
					let importances = model.feature_importances().unwrap();
					assert_eq!(importances.len(), 2);
					assert!(importances.iter().all(|importance| *importance >= 0.0));
					assert!(model.selected_features().is_none());
				}
				GridItem::NeuralNetwork { .. } => {
					assert!(model.feature_importances().is_none());
					assert!(model.selected_features().is_none());
				}
			}
		}
	}

	#[test]
	fn test_single_class_is_a_fit_error() {
		let (features, _, names) = fixture();
		let labels = vec![true; features.nrows()];
		let error = train_model(
			&GridItem::Glm { stepwise: true },
			features.view(),
			&labels,
			&names,
			0,
		)
		.unwrap_err();
		assert!(matches!(error, Error::Fit(_)));
	}
}

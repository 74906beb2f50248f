use super::{
	check_labels, compute_feature_importances, grow::grow_tree, Error, GrowOptions, LeafNode, Node,
	Tree,
};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::{clamp, ToPrimitive};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::ops::Neg;

/// These are the options passed to `BinaryClassifier::train`.
#[derive(Clone, Debug)]
pub struct TrainOptions {
	/// If true, the model will include the loss on the training data after each round.
	pub compute_loss: bool,
	/// This option sets the L2 regularization value, which helps avoid overfitting.
	pub l2_regularization: f32,
	/// The learning rate scales the leaf values to control the effect each tree has on the output.
	pub learning_rate: f32,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
	/// This is the number of rounds of training. One tree is trained per round.
	pub max_rounds: usize,
	/// A split will only be considered valid if the number of training examples sent to each of the resulting children is at least this value.
	pub min_examples_per_child: usize,
	/// A node will only be split if the best split achieves at least this minimum gain.
	pub min_gain_to_split: f32,
	/// A split will only be considered valid if the sum of hessians in each of the resulting children is at least this value.
	pub min_sum_hessians_per_child: f32,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			compute_loss: false,
			l2_regularization: 1.0,
			learning_rate: 0.1,
			max_depth: 3,
			max_rounds: 100,
			min_examples_per_child: 10,
			min_gain_to_split: 0.0,
			min_sum_hessians_per_child: 1e-3,
		}
	}
}

/// A `BinaryClassifier` is a gradient boosted tree model trained to predict the probability of presence.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryClassifier {
	/// The initial prediction of the model given no trained trees, the log odds of presence in the training labels.
	pub bias: f32,
	/// The trees for this model.
	pub trees: Vec<Tree>,
	/// The importance of each feature as measured by the fraction of branch nodes that split on it.
	pub feature_importances: Vec<f32>,
	/// The training losses in each round of training this model.
	pub losses: Option<Vec<f32>>,
}

impl BinaryClassifier {
	/// Train a binary classifier.
	pub fn train(
		features: ArrayView2<f32>,
		labels: &[bool],
		options: &TrainOptions,
	) -> Result<BinaryClassifier, Error> {
		check_labels(features.nrows(), labels)?;
		if options.max_rounds == 0 {
			return Err(Error::NoTrees);
		}
		let n_examples = features.nrows();
		let bias = compute_bias(labels);
		let grow_options = GrowOptions {
			max_depth: options.max_depth,
			min_examples_per_child: options.min_examples_per_child,
			min_sum_hessians_per_child: options.min_sum_hessians_per_child,
			min_gain_to_split: options.min_gain_to_split,
			l2_regularization: options.l2_regularization,
			max_features: None,
		};
		// Boosting uses every feature at every branch, so the generator is never drawn from.
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let mut logits = vec![bias; n_examples];
		let mut gradients = vec![0.0; n_examples];
		let mut hessians = vec![0.0; n_examples];
		let mut trees = Vec::with_capacity(options.max_rounds);
		let mut losses = if options.compute_loss {
			Some(Vec::with_capacity(options.max_rounds))
		} else {
			None
		};
		for _ in 0..options.max_rounds {
			update_gradients_and_hessians(&mut gradients, &mut hessians, labels, &logits);
			let mut tree = grow_tree(
				features,
				&gradients,
				&hessians,
				(0..n_examples).collect(),
				&grow_options,
				&mut rng,
			);
			for node in tree.nodes.iter_mut() {
				if let Node::Leaf(LeafNode { value }) = node {
					*value *= options.learning_rate;
				}
			}
			for (logit, row) in izip!(logits.iter_mut(), features.axis_iter(Axis(0))) {
				*logit += tree.predict(row);
			}
			trees.push(tree);
			if let Some(losses) = losses.as_mut() {
				losses.push(compute_loss(labels, &logits));
			}
		}
		log::debug!("trained {} rounds of gradient boosting", trees.len());
		let feature_importances = compute_feature_importances(&trees, features.ncols());
		Ok(BinaryClassifier {
			bias,
			trees,
			feature_importances,
			losses,
		})
	}

	/// Make predictions.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		for (probability, row) in izip!(probabilities.iter_mut(), features.axis_iter(Axis(0))) {
			let mut logit = self.bias;
			for tree in self.trees.iter() {
				logit += tree.predict(row);
			}
			*probability = sigmoid(logit);
		}
	}
}

/// Compute the binary cross entropy loss.
fn compute_loss(labels: &[bool], logits: &[f32]) -> f32 {
	let mut total = 0.0;
	for (label, logit) in izip!(labels.iter(), logits.iter()) {
		let label = if *label { 1.0 } else { 0.0 };
		let probability = clamp(sigmoid(*logit), std::f32::EPSILON, 1.0 - std::f32::EPSILON);
		total += -1.0 * label * probability.ln() + -1.0 * (1.0 - label) * (1.0 - probability).ln()
	}
	total / labels.len().to_f32().unwrap()
}

/// Compute the bias, the log odds of the positive class.
fn compute_bias(labels: &[bool]) -> f32 {
	let pos_count = labels.iter().filter(|label| **label).count();
	let neg_count = labels.len() - pos_count;
	(pos_count.to_f32().unwrap() / neg_count.to_f32().unwrap()).ln()
}

/// Compute the gradients and hessians for each example given the labels and predictions.
fn update_gradients_and_hessians(
	gradients: &mut [f32],
	hessians: &mut [f32],
	labels: &[bool],
	logits: &[f32],
) {
	for (gradient, hessian, label, logit) in izip!(
		gradients.iter_mut(),
		hessians.iter_mut(),
		labels.iter(),
		logits.iter()
	) {
		let probability = clamp(sigmoid(*logit), std::f32::EPSILON, 1.0 - std::f32::EPSILON);
		*gradient = probability - if *label { 1.0 } else { 0.0 };
		*hessian = probability * (1.0 - probability);
	}
}

fn sigmoid(value: f32) -> f32 {
	1.0 / (value.neg().exp() + 1.0)
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Array2<f32>, Vec<bool>) {
		let n = 80;
		let mut features = Array2::zeros((n, 2));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let x = i.to_f32().unwrap() / n.to_f32().unwrap();
			features[[i, 0]] = x;
			features[[i, 1]] = ((i * 13) % 7).to_f32().unwrap();
			labels.push(x > 0.4 && i % 10 != 0);
		}
		(features, labels)
	}

	#[test]
	fn test_binary_classifier() {
		let (features, labels) = fixture();
		let options = TrainOptions {
			compute_loss: true,
			max_rounds: 50,
			..Default::default()
		};
		let model = BinaryClassifier::train(features.view(), &labels, &options).unwrap();
		assert_eq!(model.trees.len(), 50);
		let n_present = labels.iter().filter(|l| **l).count().to_f32().unwrap();
		assert!((model.bias - (n_present / (80.0 - n_present)).ln()).abs() < 1e-6);
		let losses = model.losses.as_ref().unwrap();
		assert!(losses.last().unwrap() < losses.first().unwrap());
		let mut probabilities = Array1::zeros(features.nrows());
		model.predict(features.view(), probabilities.view_mut());
		assert!(probabilities.iter().all(|p| *p > 0.0 && *p < 1.0));
		assert!(probabilities[75] > 0.5);
		assert!(probabilities[5] < 0.5);
		let importance_sum: f32 = model.feature_importances.iter().sum();
		assert!((importance_sum - 1.0).abs() < 1e-5);
	}

	#[test]
	fn test_single_class() {
		let features = Array2::<f32>::zeros((3, 1));
		let result = BinaryClassifier::train(features.view(), &[false; 3], &Default::default());
		assert_eq!(result, Err(Error::SingleClass));
	}

	#[test]
	fn test_no_rounds() {
		let (features, labels) = fixture();
		let options = TrainOptions {
			max_rounds: 0,
			..Default::default()
		};
		let result = BinaryClassifier::train(features.view(), &labels, &options);
		assert_eq!(result, Err(Error::NoTrees));
	}
}

/*!
This crate implements a feed forward neural network binary classifier with a single hidden layer. The hidden units and the output unit use the sigmoid activation. The network is trained with full batch gradient descent on the binary cross entropy plus an L2 weight decay penalty, and training stops early when the loss stops improving.

The network expects features with comparable scales. Standardize them before training.
*/

#![allow(clippy::tabs_in_doc_comments)]

use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::ops::Neg;
use thiserror::Error;

mod early_stopping;

use self::early_stopping::EarlyStoppingMonitor;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
	#[error("the labels contain a single class")]
	SingleClass,
	#[error("the network weights are not finite")]
	NotFinite,
	#[error("expected {expected} rows of labels but got {actual}")]
	Shape { expected: usize, actual: usize },
	#[error("the network needs at least one hidden unit")]
	NoHiddenUnits,
}

/// These are the options passed to `NeuralNetwork::train`.
#[derive(Clone, Debug)]
pub struct TrainOptions {
	/// This is the number of units in the hidden layer.
	pub hidden_units: usize,
	/// This is the weight decay, the coefficient of the sum of squared weights added to the total loss.
	pub decay: f32,
	/// This is the learning rate to use when updating the model parameters.
	pub learning_rate: f32,
	/// This is the maximum number of epochs to train. Every epoch is one gradient step over all the examples.
	pub max_epochs: usize,
	/// Initial weights are drawn uniformly from `[-initial_weight_range, initial_weight_range]`.
	pub initial_weight_range: f32,
	/// If this many epochs pass without a decrease in loss of at least `min_decrease_in_loss`, training stops.
	pub n_epochs_without_improvement_to_stop: usize,
	pub min_decrease_in_loss: f32,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			hidden_units: 5,
			decay: 0.0,
			learning_rate: 0.5,
			max_epochs: 2000,
			initial_weight_range: 0.7,
			n_epochs_without_improvement_to_stop: 10,
			min_decrease_in_loss: 1e-7,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct NeuralNetwork {
	/// (hidden_units, n_features)
	pub hidden_weights: Array2<f32>,
	pub hidden_biases: Array1<f32>,
	pub output_weights: Array1<f32>,
	pub output_bias: f32,
	/// The mean training loss after each epoch.
	pub losses: Vec<f32>,
}

impl NeuralNetwork {
	/// Train a network. The initial weights are drawn from a `Xoshiro256Plus` seeded with `seed`.
	pub fn train(
		features: ArrayView2<f32>,
		labels: &[bool],
		options: &TrainOptions,
		seed: u64,
	) -> Result<NeuralNetwork, Error> {
		if labels.len() != features.nrows() {
			return Err(Error::Shape {
				expected: features.nrows(),
				actual: labels.len(),
			});
		}
		let n_present = labels.iter().filter(|label| **label).count();
		if n_present == 0 || n_present == labels.len() {
			return Err(Error::SingleClass);
		}
		if options.hidden_units == 0 {
			return Err(Error::NoHiddenUnits);
		}
		let (n_examples, n_features) = features.dim();
		let n = n_examples.to_f32().unwrap();
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let range = options.initial_weight_range;
		let mut uniform = || {
			if range > 0.0 {
				rng.gen_range(-range..range)
			} else {
				0.0
			}
		};
		let mut network = NeuralNetwork {
			hidden_weights: Array2::from_shape_simple_fn((options.hidden_units, n_features), &mut uniform),
			hidden_biases: Array1::from_shape_simple_fn(options.hidden_units, &mut uniform),
			output_weights: Array1::from_shape_simple_fn(options.hidden_units, &mut uniform),
			output_bias: uniform(),
			losses: Vec::new(),
		};
		let targets: Vec<f32> = labels
			.iter()
			.map(|label| if *label { 1.0 } else { 0.0 })
			.collect();
		let mut early_stopping_monitor = EarlyStoppingMonitor::new(
			options.min_decrease_in_loss,
			options.n_epochs_without_improvement_to_stop,
		);
		let mut hidden = Array1::<f32>::zeros(options.hidden_units);
		for _ in 0..options.max_epochs {
			let mut hidden_weight_gradients = Array2::<f32>::zeros(network.hidden_weights.raw_dim());
			let mut hidden_bias_gradients = Array1::<f32>::zeros(options.hidden_units);
			let mut output_weight_gradients = Array1::<f32>::zeros(options.hidden_units);
			let mut output_bias_gradient = 0.0;
			let mut total_loss = 0.0;
			for (row, target) in izip!(features.axis_iter(Axis(0)), targets.iter()) {
				let output = network.forward(row, hidden.view_mut());
				let clamped = output.max(std::f32::EPSILON).min(1.0 - std::f32::EPSILON);
				total_loss += -target * clamped.ln() - (1.0 - target) * (1.0 - clamped).ln();
				// The derivative of the cross entropy with respect to the output logit.
				let output_delta = output - target;
				output_bias_gradient += output_delta;
				for (unit, hidden_value) in hidden.iter().enumerate() {
					output_weight_gradients[unit] += output_delta * hidden_value;
					let hidden_delta = output_delta
						* network.output_weights[unit]
						* hidden_value * (1.0 - hidden_value);
					hidden_bias_gradients[unit] += hidden_delta;
					for (gradient, value) in izip!(
						hidden_weight_gradients.row_mut(unit).iter_mut(),
						row.iter()
					) {
						*gradient += hidden_delta * value;
					}
				}
			}
			let penalty = network.hidden_weights.iter().map(|w| w * w).sum::<f32>()
				+ network.output_weights.iter().map(|w| w * w).sum::<f32>();
			let loss = (total_loss + options.decay * penalty) / n;
			network.losses.push(loss);
			let step = options.learning_rate / n;
			let decay = 2.0 * options.decay;
			izip!(
				network.hidden_weights.iter_mut(),
				hidden_weight_gradients.iter()
			)
			.for_each(|(weight, gradient)| *weight -= step * (gradient + decay * *weight));
			izip!(
				network.output_weights.iter_mut(),
				output_weight_gradients.iter()
			)
			.for_each(|(weight, gradient)| *weight -= step * (gradient + decay * *weight));
			network.hidden_biases.scaled_add(-step, &hidden_bias_gradients);
			network.output_bias -= step * output_bias_gradient;
			if !network.is_finite() {
				return Err(Error::NotFinite);
			}
			if early_stopping_monitor.update(loss) {
				break;
			}
		}
		Ok(network)
	}

	/// Make predictions.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		let mut hidden = Array1::<f32>::zeros(self.output_weights.len());
		for (probability, row) in izip!(probabilities.iter_mut(), features.axis_iter(Axis(0))) {
			*probability = self.forward(row, hidden.view_mut());
		}
	}

	fn forward(&self, row: ArrayView1<f32>, mut hidden: ArrayViewMut1<f32>) -> f32 {
		for (hidden_value, weights, bias) in izip!(
			hidden.iter_mut(),
			self.hidden_weights.axis_iter(Axis(0)),
			self.hidden_biases.iter()
		) {
			*hidden_value = sigmoid(weights.dot(&row) + bias);
		}
		sigmoid(self.output_weights.dot(&hidden) + self.output_bias)
	}

	fn is_finite(&self) -> bool {
		self.hidden_weights.iter().all(|w| w.is_finite())
			&& self.hidden_biases.iter().all(|w| w.is_finite())
			&& self.output_weights.iter().all(|w| w.is_finite())
			&& self.output_bias.is_finite()
	}
}

fn sigmoid(value: f32) -> f32 {
	1.0 / (value.neg().exp() + 1.0)
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Array2<f32>, Vec<bool>) {
		let n = 40;
		let mut features = Array2::zeros((n, 2));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let x = (i.to_f32().unwrap() - 20.0) / 10.0;
			features[[i, 0]] = x;
			features[[i, 1]] = if i % 2 == 0 { 0.5 } else { -0.5 };
			labels.push(x > 0.0);
		}
		(features, labels)
	}

	#[test]
	fn test_neural_network() {
		let (features, labels) = fixture();
		let options = TrainOptions {
			hidden_units: 3,
			decay: 0.01,
			max_epochs: 500,
			..Default::default()
		};
		let network = NeuralNetwork::train(features.view(), &labels, &options, 11).unwrap();
		assert!(network.losses.last().unwrap() < network.losses.first().unwrap());
		let mut probabilities = Array1::zeros(features.nrows());
		network.predict(features.view(), probabilities.view_mut());
		assert!(probabilities.iter().all(|p| *p > 0.0 && *p < 1.0));
		assert!(probabilities[39] > probabilities[0]);
		assert!(probabilities[39] > 0.5);
		assert!(probabilities[0] < 0.5);
		let again = NeuralNetwork::train(features.view(), &labels, &options, 11).unwrap();
		assert_eq!(network, again);
	}

	#[test]
	fn test_errors() {
		let (features, labels) = fixture();
		let options = TrainOptions {
			hidden_units: 0,
			..Default::default()
		};
		assert_eq!(
			NeuralNetwork::train(features.view(), &labels, &options, 0),
			Err(Error::NoHiddenUnits)
		);
		assert_eq!(
			NeuralNetwork::train(features.view(), &[true; 40], &Default::default(), 0),
			Err(Error::SingleClass)
		);
	}
}

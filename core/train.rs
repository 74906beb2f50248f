/*!
This module trains the base classifier set of one target variable. Each configured algorithm expands into a grid of candidates, every candidate is scored by its resampled AUC on the Train split, and the best one is refitted on the whole Train split. Algorithms are trained in parallel.
*/

use crate::classifier::{train_model, Algorithm, Classifier};
use crate::config::{AlgorithmConfig, ValidationStrategy};
use crate::grid::{compute_hyperparameter_grid, GridItem};
use crate::validation::validate;
use crate::Error;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// The outcome of training one algorithm for one target variable.
#[derive(Debug)]
pub struct BaseModelOutput {
	pub algorithm: Algorithm,
	pub validation: ValidationStrategy,
	pub result: Result<TrainedBaseModel, Error>,
}

#[derive(Debug)]
pub struct TrainedBaseModel {
	pub model: Box<dyn Classifier>,
	pub hyperparameters: BTreeMap<String, f64>,
	pub resampled_auc: f32,
	pub n_candidates: usize,
}

/// Train every configured algorithm on the Train split. The outputs are in configuration order. A failed algorithm is logged and returned as an error so the caller can leave it out of stacking.
pub fn train_base_models(
	variable: &str,
	algorithms: &[AlgorithmConfig],
	features: ArrayView2<f32>,
	labels: &[bool],
	column_names: &[String],
	seed: u64,
) -> Vec<BaseModelOutput> {
	algorithms
		.par_iter()
		.map(|config| {
			let algorithm = config.algorithm();
			let validation = config.validation();
			let result = train_algorithm(variable, config, features, labels, column_names, seed);
			match &result {
				Ok(trained) => log::info!(
					"{}: trained {} with resampled auc {:.4}",
					variable,
					algorithm,
					trained.resampled_auc
				),
				Err(error) => log::warn!("{}: {} failed: {}", variable, algorithm, error),
			}
			BaseModelOutput {
				algorithm,
				validation,
				result,
			}
		})
		.collect()
}

fn train_algorithm(
	variable: &str,
	config: &AlgorithmConfig,
	features: ArrayView2<f32>,
	labels: &[bool],
	column_names: &[String],
	seed: u64,
) -> Result<TrainedBaseModel, Error> {
	let n_present = labels.iter().filter(|label| **label).count();
	if n_present == 0 || n_present == labels.len() {
		return Err(Error::Fit("the Train split contains a single class".to_owned()));
	}
	let algorithm = config.algorithm();
	let strategy = config.validation();
	let grid = compute_hyperparameter_grid(config, features.ncols());
	let n_candidates = grid.len();
	let mut best: Option<(GridItem, f32, Option<Box<dyn Classifier>>)> = None;
	let mut last_error = None;
	for grid_item in grid.into_iter() {
		let output = match validate(&grid_item, strategy, features, labels, column_names, seed) {
			Ok(output) => output,
			Err(error) => {
				log::warn!(
					"{}: {} candidate {:?} failed: {}",
					variable,
					algorithm,
					grid_item.hyperparameters(),
					error
				);
				last_error = Some(error);
				continue;
			}
		};
		log::debug!(
			"{}: {} candidate {:?} has resampled auc {}",
			variable,
			algorithm,
			grid_item.hyperparameters(),
			output.auc
		);
		let is_better = match &best {
			None => true,
			Some((_, best_auc, _)) => output.auc > *best_auc || best_auc.is_nan(),
		};
		if is_better {
			best = Some((grid_item, output.auc, output.model));
		}
	}
	let (grid_item, resampled_auc, model) = match best {
		Some(best) => best,
		None => {
			return Err(last_error
				.unwrap_or_else(|| Error::Fit("the hyperparameter grid is empty".to_owned())))
		}
	};
	let model = match model {
		Some(model) => model,
		None => train_model(&grid_item, features, labels, column_names, seed)?,
	};
	Ok(TrainedBaseModel {
		model,
		hyperparameters: grid_item.hyperparameters(),
		resampled_auc,
		n_candidates,
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::{GlmConfig, GradientBoostingConfig, NeuralNetworkConfig, RandomForestConfig};

	fn fixture() -> (Array2<f32>, Vec<bool>, Vec<String>) {
		let n = 60;
		let mut features = Array2::zeros((n, 2));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let label = i % 3 == 0;
			let jitter = ((i * 31) % 11) as f32 / 11.0;
			features[[i, 0]] = if label { 0.8 + jitter } else { jitter };
			features[[i, 1]] = ((i * 17) % 5) as f32;
			labels.push(label);
		}
		(features, labels, vec!["ndvi".to_owned(), "slope".to_owned()])
	}

	#[test]
	fn test_train_base_models() {
		let (features, labels, names) = fixture();
		let algorithms = vec![
			AlgorithmConfig::Glm(GlmConfig::default()),
			AlgorithmConfig::RandomForest(RandomForestConfig {
				n_trees: Some(25),
				..Default::default()
			}),
			AlgorithmConfig::GradientBoosting(GradientBoostingConfig {
				validation: Some(ValidationStrategy::KFold { n_folds: 3 }),
				max_depth: Some(vec![1, 2]),
				n_rounds: Some(vec![10]),
				min_examples_per_child: Some(2),
				..Default::default()
			}),
			AlgorithmConfig::NeuralNetwork(NeuralNetworkConfig {
				validation: Some(ValidationStrategy::OutOfBag),
				..Default::default()
			}),
		];
		let outputs = train_base_models("CRP", &algorithms, features.view(), &labels, &names, 11);
		let algorithms: Vec<Algorithm> = outputs.iter().map(|output| output.algorithm).collect();
		assert_eq!(
			algorithms,
			vec![
				Algorithm::Glm,
				Algorithm::RandomForest,
				Algorithm::GradientBoosting,
				Algorithm::NeuralNetwork
			]
		);
		for output in outputs.iter().take(3) {
			let trained = output.result.as_ref().unwrap();
			assert!(trained.resampled_auc > 0.8);
		}
		let gbt = outputs[2].result.as_ref().unwrap();
		assert_eq!(gbt.n_candidates, 2);
		assert!(gbt.hyperparameters.contains_key("max_depth"));
		// Out of bag validation has no meaning for a network, so the pair fails.
		assert!(matches!(outputs[3].result, Err(Error::Fit(_))));
	}

	#[test]
	fn test_single_class() {
		let (features, _, names) = fixture();
		let labels = vec![false; features.nrows()];
		let outputs = train_base_models(
			"WCP",
			&[AlgorithmConfig::Glm(GlmConfig::default())],
			features.view(),
			&labels,
			&names,
			0,
		);
		assert!(matches!(outputs[0].result, Err(Error::Fit(_))));
	}
}

use crate::config::AlgorithmConfig;
use covermap_tree::RandomForestOptions;
use itertools::iproduct;
use num_traits::ToPrimitive;
use std::collections::BTreeMap;

/// A `GridItem` is a description of a single entry in a hyperparameter grid. It specifies which model to train and which hyperparameters to use.
#[derive(Clone, Debug)]
pub enum GridItem {
	Glm {
		stepwise: bool,
	},
	RandomForest {
		options: RandomForestOptions,
	},
	GradientBoosting {
		options: covermap_tree::TrainOptions,
	},
	NeuralNetwork {
		options: covermap_neural::TrainOptions,
	},
}

pub const DEFAULT_GBT_MAX_DEPTHS: [usize; 3] = [1, 2, 3];
pub const DEFAULT_GBT_N_ROUNDS: [usize; 3] = [50, 100, 150];
pub const DEFAULT_GBT_LEARNING_RATE: f32 = 0.1;
pub const DEFAULT_GBT_MIN_EXAMPLES_PER_CHILD: usize = 10;
pub const DEFAULT_NN_HIDDEN_UNITS: [usize; 3] = [1, 3, 5];
pub const DEFAULT_NN_DECAYS: [f32; 3] = [0.0, 1e-4, 0.1];

/// Expand an algorithm's configuration into the candidates searched by validation. `n_features` is the number of covariates, which sets the default `mtry` values of the random forest.
pub fn compute_hyperparameter_grid(config: &AlgorithmConfig, n_features: usize) -> Vec<GridItem> {
	match config {
		AlgorithmConfig::Glm(config) => vec![GridItem::Glm {
			stepwise: config.stepwise.unwrap_or(true),
		}],
		AlgorithmConfig::RandomForest(config) => {
			let mut mtry = config
				.mtry
				.clone()
				.unwrap_or_else(|| default_mtry(n_features));
			for value in mtry.iter_mut() {
				*value = (*value).max(1).min(n_features.max(1));
			}
			mtry.sort_unstable();
			mtry.dedup();
			let defaults = RandomForestOptions::default();
			mtry.into_iter()
				.map(|max_features| GridItem::RandomForest {
					options: RandomForestOptions {
						n_trees: config.n_trees.unwrap_or(defaults.n_trees),
						max_features: Some(max_features),
						min_examples_per_leaf: config
							.min_examples_per_leaf
							.unwrap_or(defaults.min_examples_per_leaf),
						..defaults.clone()
					},
				})
				.collect()
		}
		AlgorithmConfig::GradientBoosting(config) => {
			let max_depths = config
				.max_depth
				.clone()
				.unwrap_or_else(|| DEFAULT_GBT_MAX_DEPTHS.to_vec());
			let n_rounds = config
				.n_rounds
				.clone()
				.unwrap_or_else(|| DEFAULT_GBT_N_ROUNDS.to_vec());
			iproduct!(max_depths.into_iter(), n_rounds.into_iter())
				.map(|(max_depth, max_rounds)| GridItem::GradientBoosting {
					options: covermap_tree::TrainOptions {
						max_depth,
						max_rounds,
						learning_rate: config.learning_rate.unwrap_or(DEFAULT_GBT_LEARNING_RATE),
						min_examples_per_child: config
							.min_examples_per_child
							.unwrap_or(DEFAULT_GBT_MIN_EXAMPLES_PER_CHILD),
						..Default::default()
					},
				})
				.collect()
		}
		AlgorithmConfig::NeuralNetwork(config) => {
			let hidden_units = config
				.hidden_units
				.clone()
				.unwrap_or_else(|| DEFAULT_NN_HIDDEN_UNITS.to_vec());
			let decays = config
				.decay
				.clone()
				.unwrap_or_else(|| DEFAULT_NN_DECAYS.to_vec());
			let defaults = covermap_neural::TrainOptions::default();
			iproduct!(hidden_units.into_iter(), decays.into_iter())
				.map(|(hidden_units, decay)| GridItem::NeuralNetwork {
					options: covermap_neural::TrainOptions {
						hidden_units,
						decay,
						max_epochs: config.max_epochs.unwrap_or(defaults.max_epochs),
						..defaults.clone()
					},
				})
				.collect()
		}
	}
}

/// The random forest tries `floor(sqrt(p))`, `p / 2`, and `p` covariates per branch by default.
fn default_mtry(n_features: usize) -> Vec<usize> {
	let sqrt = n_features.to_f64().unwrap().sqrt().floor().to_usize().unwrap();
	vec![sqrt, n_features / 2, n_features]
}

impl GridItem {
	pub fn algorithm(&self) -> crate::Algorithm {
		match self {
			GridItem::Glm { .. } => crate::Algorithm::Glm,
			GridItem::RandomForest { .. } => crate::Algorithm::RandomForest,
			GridItem::GradientBoosting { .. } => crate::Algorithm::GradientBoosting,
			GridItem::NeuralNetwork { .. } => crate::Algorithm::NeuralNetwork,
		}
	}

	/// The hyperparameters that distinguish this item from the others in its grid, for reporting.
	pub fn hyperparameters(&self) -> BTreeMap<String, f64> {
		let mut hyperparameters = BTreeMap::new();
		match self {
			GridItem::Glm { stepwise } => {
				hyperparameters.insert("stepwise".to_owned(), if *stepwise { 1.0 } else { 0.0 });
			}
			GridItem::RandomForest { options } => {
				hyperparameters.insert("n_trees".to_owned(), options.n_trees.to_f64().unwrap());
				hyperparameters.insert(
					"mtry".to_owned(),
					options.max_features.unwrap_or(0).to_f64().unwrap(),
				);
				hyperparameters.insert(
					"min_examples_per_leaf".to_owned(),
					options.min_examples_per_leaf.to_f64().unwrap(),
				);
			}
			GridItem::GradientBoosting { options } => {
				hyperparameters.insert("max_depth".to_owned(), options.max_depth.to_f64().unwrap());
				hyperparameters.insert("n_rounds".to_owned(), options.max_rounds.to_f64().unwrap());
				hyperparameters.insert(
					"learning_rate".to_owned(),
					options.learning_rate.to_f64().unwrap(),
				);
			}
			GridItem::NeuralNetwork { options } => {
				hyperparameters.insert(
					"hidden_units".to_owned(),
					options.hidden_units.to_f64().unwrap(),
				);
				hyperparameters.insert("decay".to_owned(), options.decay.to_f64().unwrap());
			}
		}
		hyperparameters
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::{
		GlmConfig, GradientBoostingConfig, NeuralNetworkConfig, RandomForestConfig,
	};

	#[test]
	fn test_default_grids() {
		let glm = compute_hyperparameter_grid(&AlgorithmConfig::Glm(GlmConfig::default()), 4);
		assert!(matches!(glm.as_slice(), [GridItem::Glm { stepwise: true }]));
		let gbt = compute_hyperparameter_grid(
			&AlgorithmConfig::GradientBoosting(GradientBoostingConfig::default()),
			4,
		);
		assert_eq!(gbt.len(), 9);
		let nn = compute_hyperparameter_grid(
			&AlgorithmConfig::NeuralNetwork(NeuralNetworkConfig::default()),
			4,
		);
		assert_eq!(nn.len(), 9);
		match &nn[1] {
			GridItem::NeuralNetwork { options } => {
				assert_eq!(options.hidden_units, 1);
				assert!((options.decay - 1e-4).abs() < 1e-9);
			}
			_ => panic!(),
		}
	}

	#[test]
	fn test_random_forest_mtry_is_deduplicated() {
		let mtry = |n_features: usize| -> Vec<usize> {
			compute_hyperparameter_grid(
				&AlgorithmConfig::RandomForest(RandomForestConfig::default()),
				n_features,
			)
			.iter()
			.map(|item| match item {
				GridItem::RandomForest { options } => options.max_features.unwrap(),
				_ => panic!(),
			})
			.collect()
		};
		assert_eq!(mtry(1), vec![1]);
		assert_eq!(mtry(4), vec![2, 4]);
		assert_eq!(mtry(9), vec![3, 4, 9]);
	}

	#[test]
	fn test_configured_grid() {
		let config = AlgorithmConfig::GradientBoosting(GradientBoostingConfig {
			max_depth: Some(vec![2]),
			n_rounds: Some(vec![10, 20]),
			learning_rate: Some(0.3),
			..Default::default()
		});
		let grid = compute_hyperparameter_grid(&config, 3);
		insta::assert_debug_snapshot!(grid.iter().map(|item| item.hyperparameters()).collect::<Vec<_>>(), @r###"
  [
      {
          "learning_rate": 0.30000001192092896,
          "max_depth": 2.0,
          "n_rounds": 10.0,
      },
      {
          "learning_rate": 0.30000001192092896,
          "max_depth": 2.0,
          "n_rounds": 20.0,
      },
  ]
  "###);
	}
}

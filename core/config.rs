/*!
This module defines the `Config` struct, which is read from a JSON file and configures a run of the [`pipeline`](../pipeline/index.html). Every optional field has a default, documented next to the function that applies it.
*/

use crate::Error;
use covermap_grid::BandSource;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_SEED: u64 = 1385;
pub const DEFAULT_TRAIN_FRACTION: f32 = 0.75;
pub const DEFAULT_STACKING_N_FOLDS: usize = 10;
pub const DEFAULT_STACKING_N_LAMBDAS: usize = 20;
pub const DEFAULT_STACKING_ALPHAS: [f64; 3] = [0.1, 0.55, 1.0];
pub const DEFAULT_MIN_SAMPLES_PER_CLASS: u64 = 2;

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub samples: SamplesConfig,
	pub covariates: Vec<BandSource>,
	pub output_dir: Option<PathBuf>,
	pub seed: Option<u64>,
	pub train_fraction: Option<f32>,
	pub algorithms: Option<Vec<AlgorithmConfig>>,
	pub stacking: Option<StackingConfig>,
	pub threshold: Option<ThresholdConfig>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct SamplesConfig {
	pub path: PathBuf,
	pub x_column: Option<String>,
	pub y_column: Option<String>,
	/// The label columns to model. If this is `None`, every column whose values are all `Y`, `N`, or missing is modeled.
	pub targets: Option<Vec<String>>,
	/// The EPSG code of the sample coordinates. If both this and the covariate grid's code are known, they must match.
	pub crs_epsg: Option<u16>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(tag = "algorithm")]
pub enum AlgorithmConfig {
	#[serde(rename = "glm")]
	Glm(GlmConfig),
	#[serde(rename = "random_forest")]
	RandomForest(RandomForestConfig),
	#[serde(rename = "gradient_boosting")]
	GradientBoosting(GradientBoostingConfig),
	#[serde(rename = "neural_network")]
	NeuralNetwork(NeuralNetworkConfig),
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct GlmConfig {
	pub validation: Option<ValidationStrategy>,
	/// If false, every covariate is kept instead of selecting a subset by AIC.
	pub stepwise: Option<bool>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct RandomForestConfig {
	pub validation: Option<ValidationStrategy>,
	pub n_trees: Option<usize>,
	/// The numbers of covariates tried at each branch to search.
	pub mtry: Option<Vec<usize>>,
	pub min_examples_per_leaf: Option<usize>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct GradientBoostingConfig {
	pub validation: Option<ValidationStrategy>,
	pub max_depth: Option<Vec<usize>>,
	pub n_rounds: Option<Vec<usize>>,
	pub learning_rate: Option<f32>,
	pub min_examples_per_child: Option<usize>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct NeuralNetworkConfig {
	pub validation: Option<ValidationStrategy>,
	pub hidden_units: Option<Vec<usize>>,
	pub decay: Option<Vec<f32>>,
	pub max_epochs: Option<usize>,
}

/// A `ValidationStrategy` says how the resampled AUC of a hyperparameter candidate is estimated on the Train split.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type")]
pub enum ValidationStrategy {
	#[serde(rename = "k_fold")]
	KFold { n_folds: usize },
	#[serde(rename = "repeated_k_fold")]
	RepeatedKFold { n_folds: usize, n_repeats: usize },
	/// Only the random forest supports out of bag validation.
	#[serde(rename = "out_of_bag")]
	OutOfBag,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct StackingConfig {
	pub n_folds: Option<usize>,
	pub alphas: Option<Vec<f64>>,
	pub n_lambdas: Option<usize>,
	pub lambda_min_ratio: Option<f64>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
	pub min_samples_per_class: Option<u64>,
}

impl AlgorithmConfig {
	pub fn algorithm(&self) -> crate::Algorithm {
		match self {
			AlgorithmConfig::Glm(_) => crate::Algorithm::Glm,
			AlgorithmConfig::RandomForest(_) => crate::Algorithm::RandomForest,
			AlgorithmConfig::GradientBoosting(_) => crate::Algorithm::GradientBoosting,
			AlgorithmConfig::NeuralNetwork(_) => crate::Algorithm::NeuralNetwork,
		}
	}

	/// The validation strategy, defaulting to out of bag for the random forest and 10 fold cross validation otherwise.
	pub fn validation(&self) -> ValidationStrategy {
		let k_fold = ValidationStrategy::KFold { n_folds: 10 };
		let (validation, default) = match self {
			AlgorithmConfig::Glm(config) => (config.validation, k_fold),
			AlgorithmConfig::RandomForest(config) => (config.validation, ValidationStrategy::OutOfBag),
			AlgorithmConfig::GradientBoosting(config) => (config.validation, k_fold),
			AlgorithmConfig::NeuralNetwork(config) => (config.validation, k_fold),
		};
		validation.unwrap_or(default)
	}

	/// Counts of zero would train a model that ignores its covariates.
	fn validate_options(&self) -> Result<(), Error> {
		let positive = |name: &str, values: &[usize]| {
			if values.iter().any(|value| *value == 0) {
				Err(Error::Config(format!(
					"{} {} must be at least 1",
					self.algorithm(),
					name
				)))
			} else {
				Ok(())
			}
		};
		match self {
			AlgorithmConfig::Glm(_) => Ok(()),
			AlgorithmConfig::RandomForest(config) => {
				let n_trees = config.n_trees.as_ref().map(std::slice::from_ref);
				positive("n_trees", n_trees.unwrap_or(&[]))?;
				positive("mtry", config.mtry.as_deref().unwrap_or(&[]))
			}
			AlgorithmConfig::GradientBoosting(config) => {
				positive("max_depth", config.max_depth.as_deref().unwrap_or(&[]))?;
				positive("n_rounds", config.n_rounds.as_deref().unwrap_or(&[]))
			}
			AlgorithmConfig::NeuralNetwork(config) => {
				positive("hidden_units", config.hidden_units.as_deref().unwrap_or(&[]))?;
				let max_epochs = config.max_epochs.as_ref().map(std::slice::from_ref);
				positive("max_epochs", max_epochs.unwrap_or(&[]))
			}
		}
	}
}

impl Config {
	/// Read a config from a JSON file. Relative paths in the config are resolved against the directory containing the file.
	pub fn from_path(path: &Path) -> Result<Config, Error> {
		let text = std::fs::read_to_string(path)
			.map_err(|error| Error::Config(format!("{}: {}", path.display(), error)))?;
		let mut config: Config = serde_json::from_str(&text)
			.map_err(|error| Error::Config(format!("{}: {}", path.display(), error)))?;
		let base = path.parent().unwrap_or_else(|| Path::new(""));
		config.resolve_paths(base);
		config.validate()?;
		Ok(config)
	}

	pub fn resolve_paths(&mut self, base: &Path) {
		let resolve = |path: &mut PathBuf| {
			if path.is_relative() {
				*path = base.join(&*path);
			}
		};
		resolve(&mut self.samples.path);
		for covariate in self.covariates.iter_mut() {
			resolve(&mut covariate.path);
		}
		if let Some(output_dir) = self.output_dir.as_mut() {
			resolve(output_dir);
		}
	}

	pub fn validate(&self) -> Result<(), Error> {
		if self.covariates.is_empty() {
			return Err(Error::Config("at least one covariate is required".to_owned()));
		}
		let mut names = BTreeSet::new();
		for covariate in self.covariates.iter() {
			if !names.insert(covariate.name.as_str()) {
				return Err(Error::Config(format!(
					"covariate \"{}\" is listed more than once",
					covariate.name
				)));
			}
		}
		let train_fraction = self.train_fraction();
		if !(train_fraction > 0.0 && train_fraction < 1.0) {
			return Err(Error::Config(format!(
				"train_fraction must be between 0 and 1, got {}",
				train_fraction
			)));
		}
		let algorithms = self.algorithms();
		if algorithms.is_empty() {
			return Err(Error::Config("at least one algorithm is required".to_owned()));
		}
		let mut seen = BTreeSet::new();
		for algorithm in algorithms.iter() {
			if !seen.insert(algorithm.algorithm()) {
				return Err(Error::Config(format!(
					"algorithm \"{}\" is listed more than once",
					algorithm.algorithm()
				)));
			}
			match algorithm.validation() {
				ValidationStrategy::KFold { n_folds }
				| ValidationStrategy::RepeatedKFold { n_folds, .. }
					if n_folds < 2 =>
				{
					return Err(Error::Config(format!(
						"{} validation needs at least 2 folds",
						algorithm.algorithm()
					)));
				}
				ValidationStrategy::RepeatedKFold { n_repeats: 0, .. } => {
					return Err(Error::Config(format!(
						"{} validation needs at least 1 repeat",
						algorithm.algorithm()
					)));
				}
				_ => {}
			}
			algorithm.validate_options()?;
		}
		if self.stacking_n_folds() < 2 {
			return Err(Error::Config("stacking needs at least 2 folds".to_owned()));
		}
		let alphas = self.stacking_alphas();
		if alphas.is_empty() || alphas.iter().any(|alpha| !(0.0..=1.0).contains(alpha)) {
			return Err(Error::Config(
				"stacking alphas must be a non-empty list of values between 0 and 1".to_owned(),
			));
		}
		Ok(())
	}

	pub fn seed(&self) -> u64 {
		self.seed.unwrap_or(DEFAULT_SEED)
	}

	pub fn train_fraction(&self) -> f32 {
		self.train_fraction.unwrap_or(DEFAULT_TRAIN_FRACTION)
	}

	pub fn output_dir(&self) -> PathBuf {
		self.output_dir
			.clone()
			.unwrap_or_else(|| PathBuf::from("output"))
	}

	/// The configured algorithms, or all four with their default options.
	pub fn algorithms(&self) -> Vec<AlgorithmConfig> {
		self.algorithms.clone().unwrap_or_else(|| {
			vec![
				AlgorithmConfig::Glm(GlmConfig::default()),
				AlgorithmConfig::RandomForest(RandomForestConfig::default()),
				AlgorithmConfig::GradientBoosting(GradientBoostingConfig::default()),
				AlgorithmConfig::NeuralNetwork(NeuralNetworkConfig::default()),
			]
		})
	}

	pub fn stacking_n_folds(&self) -> usize {
		self.stacking
			.as_ref()
			.and_then(|stacking| stacking.n_folds)
			.unwrap_or(DEFAULT_STACKING_N_FOLDS)
	}

	pub fn stacking_alphas(&self) -> Vec<f64> {
		self.stacking
			.as_ref()
			.and_then(|stacking| stacking.alphas.clone())
			.unwrap_or_else(|| DEFAULT_STACKING_ALPHAS.to_vec())
	}

	pub fn stacking_n_lambdas(&self) -> usize {
		self.stacking
			.as_ref()
			.and_then(|stacking| stacking.n_lambdas)
			.unwrap_or(DEFAULT_STACKING_N_LAMBDAS)
	}

	pub fn stacking_lambda_min_ratio(&self) -> Option<f64> {
		self.stacking
			.as_ref()
			.and_then(|stacking| stacking.lambda_min_ratio)
	}

	pub fn min_samples_per_class(&self) -> u64 {
		self.threshold
			.as_ref()
			.and_then(|threshold| threshold.min_samples_per_class)
			.unwrap_or(DEFAULT_MIN_SAMPLES_PER_CLASS)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_parse_config() {
		let json = r#"{
			"samples": { "path": "samples.csv", "targets": ["CRP"], "crs_epsg": 32736 },
			"covariates": [
				{ "name": "ndvi", "path": "/data/ndvi.tif" },
				{ "name": "elevation", "path": "elevation.tif" }
			],
			"seed": 7,
			"algorithms": [
				{ "algorithm": "glm", "validation": { "type": "repeated_k_fold", "n_folds": 5, "n_repeats": 2 } },
				{ "algorithm": "random_forest", "n_trees": 50, "mtry": [1, 2] },
				{ "algorithm": "gradient_boosting", "max_depth": [1, 2], "n_rounds": [20] }
			],
			"stacking": { "n_folds": 5 }
		}"#;
		let mut config: Config = serde_json::from_str(json).unwrap();
		config.resolve_paths(Path::new("/work"));
		config.validate().unwrap();
		assert_eq!(config.samples.path, PathBuf::from("/work/samples.csv"));
		assert_eq!(config.covariates[0].path, PathBuf::from("/data/ndvi.tif"));
		assert_eq!(config.covariates[1].path, PathBuf::from("/work/elevation.tif"));
		assert_eq!(config.seed(), 7);
		assert_eq!(config.train_fraction(), DEFAULT_TRAIN_FRACTION);
		let algorithms = config.algorithms();
		assert_eq!(algorithms.len(), 3);
		assert_eq!(
			algorithms[0].validation(),
			ValidationStrategy::RepeatedKFold {
				n_folds: 5,
				n_repeats: 2
			}
		);
		assert_eq!(algorithms[1].validation(), ValidationStrategy::OutOfBag);
		assert_eq!(
			algorithms[2].validation(),
			ValidationStrategy::KFold { n_folds: 10 }
		);
		assert_eq!(config.stacking_n_folds(), 5);
		assert_eq!(config.stacking_alphas(), vec![0.1, 0.55, 1.0]);
		assert_eq!(config.min_samples_per_class(), 2);
	}

	#[test]
	fn test_invalid_config() {
		let json = r#"{
			"samples": { "path": "samples.csv" },
			"covariates": [{ "name": "ndvi", "path": "ndvi.tif" }],
			"train_fraction": 1.5
		}"#;
		let config: Config = serde_json::from_str(json).unwrap();
		let error = config.validate().unwrap_err();
		assert_eq!(
			error.to_string(),
			"config error: train_fraction must be between 0 and 1, got 1.5"
		);
		let json = r#"{
			"samples": { "path": "samples.csv" },
			"covariates": [{ "name": "ndvi", "path": "ndvi.tif" }],
			"algorithms": [{ "algorithm": "glm" }, { "algorithm": "glm" }]
		}"#;
		let config: Config = serde_json::from_str(json).unwrap();
		assert!(matches!(config.validate(), Err(Error::Config(_))));
	}

	#[test]
	fn test_empty_models_are_rejected() {
		let parse = |algorithm: &str| -> Config {
			let json = format!(
				r#"{{
					"samples": {{ "path": "samples.csv" }},
					"covariates": [{{ "name": "ndvi", "path": "ndvi.tif" }}],
					"algorithms": [{}]
				}}"#,
				algorithm
			);
			serde_json::from_str(&json).unwrap()
		};
		let error = parse(r#"{ "algorithm": "random_forest", "n_trees": 0 }"#)
			.validate()
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"config error: random_forest n_trees must be at least 1"
		);
		let error = parse(r#"{ "algorithm": "gradient_boosting", "n_rounds": [50, 0] }"#)
			.validate()
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"config error: gradient_boosting n_rounds must be at least 1"
		);
		let error = parse(r#"{ "algorithm": "gradient_boosting", "max_depth": [0] }"#)
			.validate()
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"config error: gradient_boosting max_depth must be at least 1"
		);
		let error = parse(r#"{ "algorithm": "neural_network", "hidden_units": [0, 3] }"#)
			.validate()
			.unwrap_err();
		assert!(matches!(error, Error::Config(_)));
		parse(r#"{ "algorithm": "random_forest", "n_trees": 5, "mtry": [1] }"#)
			.validate()
			.unwrap();
	}
}

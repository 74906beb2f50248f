use crate::classifier::{train_model, Classifier};
use crate::config::ValidationStrategy;
use crate::grid::GridItem;
use crate::Error;
use covermap_dataframe::{max_stratified_folds, Folds};
use covermap_metrics::auc_roc;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rayon::prelude::*;

/// The resampled AUC of one grid item. Under out of bag validation the model fitted on every row is kept so it does not have to be refitted.
#[derive(Debug)]
pub struct ValidationOutput {
	pub auc: f32,
	pub n_resamples: usize,
	pub model: Option<Box<dyn Classifier>>,
}

/**
Estimate the AUC of `grid_item` on `features` with `strategy`.

k-fold validation fits the model on the training rows of each stratified fold and scores its held out rows; the resampled AUC is the mean over folds. Repeated k-fold repeats this with folds drawn from `seed + repeat`, wrapping at `u64::MAX`. The fold count is reduced to the minority class count when there are fewer minority rows than folds. Folds are fitted in parallel.
*/
pub fn validate(
	grid_item: &GridItem,
	strategy: ValidationStrategy,
	features: ArrayView2<f32>,
	labels: &[bool],
	column_names: &[String],
	seed: u64,
) -> Result<ValidationOutput, Error> {
	match strategy {
		ValidationStrategy::OutOfBag => {
			if !matches!(grid_item, GridItem::RandomForest { .. }) {
				return Err(Error::Fit(format!(
					"out of bag validation is not available for {}",
					grid_item.algorithm()
				)));
			}
			let model = train_model(grid_item, features, labels, column_names, seed)?;
			let auc = model
				.out_of_bag_probabilities()
				.map(|probabilities| auc_roc(probabilities, labels))
				.ok_or_else(|| Error::Fit("the model has no out of bag predictions".to_owned()))?;
			Ok(ValidationOutput {
				auc,
				n_resamples: 1,
				model: Some(model),
			})
		}
		ValidationStrategy::KFold { n_folds } => {
			k_fold(grid_item, n_folds, 1, features, labels, column_names, seed)
		}
		ValidationStrategy::RepeatedKFold { n_folds, n_repeats } => k_fold(
			grid_item,
			n_folds,
			n_repeats,
			features,
			labels,
			column_names,
			seed,
		),
	}
}

fn k_fold(
	grid_item: &GridItem,
	n_folds: usize,
	n_repeats: usize,
	features: ArrayView2<f32>,
	labels: &[bool],
	column_names: &[String],
	seed: u64,
) -> Result<ValidationOutput, Error> {
	let n_folds = max_stratified_folds(labels, n_folds);
	if n_folds < 2 {
		return Err(Error::Fit(format!(
			"{} cross validation folds are possible, at least 2 are required",
			n_folds
		)));
	}
	let splits: Vec<_> = (0..n_repeats.max(1))
		.flat_map(|repeat| {
			let repeat_seed = seed.wrapping_add(repeat.to_u64().unwrap());
			let folds = Folds::stratified(labels, n_folds, repeat_seed);
			folds.iter().collect::<Vec<_>>()
		})
		.collect();
	let aucs: Vec<f32> = splits
		.par_iter()
		.enumerate()
		.map(|(index, split)| -> Result<f32, Error> {
			let train_features = features.select(Axis(0), &split.train);
			let train_labels: Vec<bool> = split.train.iter().map(|i| labels[*i]).collect();
			let holdout_features = features.select(Axis(0), &split.test);
			let holdout_labels: Vec<bool> = split.test.iter().map(|i| labels[*i]).collect();
			let model = train_model(
				grid_item,
				train_features.view(),
				&train_labels,
				column_names,
				seed,
			)
			.map_err(|error| Error::Fit(format!("fold {}: {}", index % n_folds, error)))?;
			let probabilities = model.predict_probability(holdout_features.view());
			Ok(auc_roc(&probabilities.to_vec(), &holdout_labels))
		})
		.collect::<Result<_, _>>()?;
	let auc = aucs.iter().sum::<f32>() / aucs.len().to_f32().unwrap();
	Ok(ValidationOutput {
		auc,
		n_resamples: aucs.len(),
		model: None,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Array2<f32>, Vec<bool>, Vec<String>) {
		let n = 40;
		let mut features = Array2::zeros((n, 1));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let label = i % 4 == 0;
			let jitter = ((i * 31) % 7) as f32 / 7.0;
			features[[i, 0]] = if label { 1.0 + jitter } else { jitter };
			labels.push(label);
		}
		(features, labels, vec!["ndvi".to_owned()])
	}

	#[test]
	fn test_repeated_k_fold() {
		let (features, labels, names) = fixture();
		let item = GridItem::GradientBoosting {
			options: covermap_tree::TrainOptions {
				max_rounds: 10,
				min_examples_per_child: 1,
				..Default::default()
			},
		};
		let output = validate(
			&item,
			ValidationStrategy::RepeatedKFold {
				n_folds: 5,
				n_repeats: 2,
			},
			features.view(),
			&labels,
			&names,
			3,
		)
		.unwrap();
		assert_eq!(output.n_resamples, 10);
		assert!(output.model.is_none());
		assert!(output.auc > 0.9);
	}

	#[test]
	fn test_out_of_bag() {
		let (features, labels, names) = fixture();
		let item = GridItem::RandomForest {
			options: covermap_tree::RandomForestOptions {
				n_trees: 30,
				..Default::default()
			},
		};
		let output = validate(
			&item,
			ValidationStrategy::OutOfBag,
			features.view(),
			&labels,
			&names,
			3,
		)
		.unwrap();
		assert!(output.model.is_some());
		assert!(output.auc > 0.9);
		let error = validate(
			&GridItem::Glm { stepwise: true },
			ValidationStrategy::OutOfBag,
			features.view(),
			&labels,
			&names,
			3,
		)
		.unwrap_err();
		assert!(matches!(error, Error::Fit(_)));
	}

	#[test]
	fn test_repeated_k_fold_with_largest_seed() {
		let (features, labels, names) = fixture();
		let item = GridItem::GradientBoosting {
			options: covermap_tree::TrainOptions {
				max_rounds: 10,
				min_examples_per_child: 1,
				..Default::default()
			},
		};
		let output = validate(
			&item,
			ValidationStrategy::RepeatedKFold {
				n_folds: 5,
				n_repeats: 2,
			},
			features.view(),
			&labels,
			&names,
			u64::MAX,
		)
		.unwrap();
		assert_eq!(output.n_resamples, 10);
		assert!(output.auc > 0.9);
	}

	#[test]
	fn test_too_few_minority_rows() {
		let (features, _, names) = fixture();
		let mut labels = vec![false; features.nrows()];
		labels[0] = true;
		let error = validate(
			&GridItem::Glm { stepwise: false },
			ValidationStrategy::KFold { n_folds: 10 },
			features.view(),
			&labels,
			&names,
			0,
		)
		.unwrap_err();
		assert!(matches!(error, Error::Fit(_)));
	}
}

use super::{check_labels, compute_feature_importances, grow::grow_tree, Error, GrowOptions, Tree};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// These are the options passed to `RandomForest::train`.
#[derive(Clone, Debug)]
pub struct RandomForestOptions {
	pub n_trees: usize,
	/// The number of features tried at each branch. If this is `None`, `floor(sqrt(n_features))` features are tried.
	pub max_features: Option<usize>,
	/// Every leaf holds at least this many bootstrap examples.
	pub min_examples_per_leaf: usize,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
}

impl Default for RandomForestOptions {
	fn default() -> Self {
		Self {
			n_trees: 500,
			max_features: None,
			min_examples_per_leaf: 1,
			max_depth: 64,
		}
	}
}

/**
A `RandomForest` averages probability trees, each grown on a bootstrap sample of the training rows with a random subset of features considered at every branch. Each leaf holds the fraction of its bootstrap examples that are present.

Tree `i` draws its bootstrap sample and feature subsets from a `Xoshiro256Plus` seeded with `seed + i`, so training is deterministic regardless of how rayon schedules the trees.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct RandomForest {
	pub trees: Vec<Tree>,
	/// The number of features tried at each branch.
	pub max_features: usize,
	/// For each training row, the mean prediction of the trees whose bootstrap sample left it out, or NaN if every tree included it.
	pub out_of_bag_probabilities: Vec<f32>,
	/// The importance of each feature as measured by the fraction of branch nodes that split on it.
	pub feature_importances: Vec<f32>,
}

impl RandomForest {
	pub fn train(
		features: ArrayView2<f32>,
		labels: &[bool],
		options: &RandomForestOptions,
		seed: u64,
	) -> Result<RandomForest, Error> {
		check_labels(features.nrows(), labels)?;
		if options.n_trees == 0 {
			return Err(Error::NoTrees);
		}
		let n_examples = features.nrows();
		let n_features = features.ncols();
		let max_features = options
			.max_features
			.unwrap_or_else(|| {
				n_features
					.to_f64()
					.unwrap()
					.sqrt()
					.floor()
					.to_usize()
					.unwrap()
			})
			.max(1)
			.min(n_features);
		// With unit hessians and no regularization each leaf value is the mean label of its examples.
		let gradients: Vec<f32> = labels
			.iter()
			.map(|label| if *label { -1.0 } else { 0.0 })
			.collect();
		let hessians = vec![1.0; n_examples];
		let grow_options = GrowOptions {
			max_depth: options.max_depth,
			min_examples_per_child: options.min_examples_per_leaf,
			min_sum_hessians_per_child: 0.0,
			min_gain_to_split: 0.0,
			l2_regularization: 0.0,
			max_features: Some(max_features),
		};
		let trees_and_in_bag: Vec<(Tree, Vec<bool>)> = (0..options.n_trees)
			.into_par_iter()
			.map(|tree_index| {
				let mut rng = Xoshiro256Plus::seed_from_u64(seed.wrapping_add(tree_index.to_u64().unwrap()));
				let mut in_bag = vec![false; n_examples];
				let examples: Vec<usize> = (0..n_examples)
					.map(|_| {
						let example = rng.gen_range(0..n_examples);
						in_bag[example] = true;
						example
					})
					.collect();
				let tree = grow_tree(
					features,
					&gradients,
					&hessians,
					examples,
					&grow_options,
					&mut rng,
				);
				(tree, in_bag)
			})
			.collect();
		let mut sums = vec![0.0f64; n_examples];
		let mut counts = vec![0usize; n_examples];
		for (tree, in_bag) in trees_and_in_bag.iter() {
			for (example, row) in features.axis_iter(Axis(0)).enumerate() {
				if !in_bag[example] {
					sums[example] += f64::from(tree.predict(row));
					counts[example] += 1;
				}
			}
		}
		let out_of_bag_probabilities = izip!(sums.iter(), counts.iter())
			.map(|(sum, count)| {
				if *count == 0 {
					std::f32::NAN
				} else {
					(sum / count.to_f64().unwrap()).to_f32().unwrap()
				}
			})
			.collect();
		let trees: Vec<Tree> = trees_and_in_bag.into_iter().map(|(tree, _)| tree).collect();
		let feature_importances = compute_feature_importances(&trees, n_features);
		log::debug!(
			"trained a random forest of {} trees trying {} features per branch",
			trees.len(),
			max_features
		);
		Ok(RandomForest {
			trees,
			max_features,
			out_of_bag_probabilities,
			feature_importances,
		})
	}

	/// Make predictions.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		let n_trees = self.trees.len().to_f32().unwrap();
		for (probability, row) in izip!(probabilities.iter_mut(), features.axis_iter(Axis(0))) {
			let sum: f32 = self.trees.iter().map(|tree| tree.predict(row)).sum();
			*probability = sum / n_trees;
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Array2<f32>, Vec<bool>) {
		let n = 60;
		let mut features = Array2::zeros((n, 3));
		let mut labels = Vec::with_capacity(n);
		for i in 0..n {
			let x = i.to_f32().unwrap() / n.to_f32().unwrap();
			features[[i, 0]] = x;
			features[[i, 1]] = ((i * 17) % 5).to_f32().unwrap();
			features[[i, 2]] = 1.0 - x;
			labels.push(x >= 0.5);
		}
		(features, labels)
	}

	#[test]
	fn test_random_forest() {
		let (features, labels) = fixture();
		let options = RandomForestOptions {
			n_trees: 40,
			..Default::default()
		};
		let forest = RandomForest::train(features.view(), &labels, &options, 7).unwrap();
		assert_eq!(forest.trees.len(), 40);
		assert_eq!(forest.max_features, 1);
		let mut probabilities = Array1::zeros(features.nrows());
		forest.predict(features.view(), probabilities.view_mut());
		assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
		assert!(probabilities[55] > 0.5);
		assert!(probabilities[3] < 0.5);
		let n_out_of_bag = forest
			.out_of_bag_probabilities
			.iter()
			.filter(|p| p.is_finite())
			.count();
		assert!(n_out_of_bag > 50);
		assert!(forest
			.out_of_bag_probabilities
			.iter()
			.filter(|p| p.is_finite())
			.all(|p| (0.0..=1.0).contains(p)));
	}

	#[test]
	fn test_no_trees() {
		let (features, labels) = fixture();
		let options = RandomForestOptions {
			n_trees: 0,
			..Default::default()
		};
		let result = RandomForest::train(features.view(), &labels, &options, 7);
		assert_eq!(result, Err(Error::NoTrees));
	}

	#[test]
	fn test_random_forest_is_deterministic() {
		let (features, labels) = fixture();
		let options = RandomForestOptions {
			n_trees: 10,
			max_features: Some(2),
			..Default::default()
		};
		let left = RandomForest::train(features.view(), &labels, &options, 3).unwrap();
		let right = RandomForest::train(features.view(), &labels, &options, 3).unwrap();
		assert_eq!(left.trees, right.trees);
		assert_eq!(left.max_features, 2);
	}
}

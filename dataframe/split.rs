/*!
Stratified partitions of labeled rows. Every function here takes the seed explicitly, so calling it twice with the same labels and seed produces the same partition, and target variables that share a seed share a shuffle order.
*/

use num_traits::ToPrimitive;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// A `Split` holds the row indexes of the train and test sets, each sorted in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
	pub train: Vec<usize>,
	pub test: Vec<usize>,
}

/**
Split the rows into train and test sets, stratified by label so each set keeps the class proportions of the input.

For each class, the row indexes are shuffled with a `Xoshiro256Plus` seeded with `seed` and the first `round(train_fraction * n_class)` rows go to the train set. A class with at least two rows always puts at least one row in each set.
*/
pub fn stratified_split(labels: &[bool], train_fraction: f32, seed: u64) -> Split {
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let mut train = Vec::new();
	let mut test = Vec::new();
	for class in [false, true].iter() {
		let mut indexes = class_indexes(labels, *class);
		indexes.shuffle(&mut rng);
		let n = indexes.len();
		let n_train = (train_fraction * n.to_f32().unwrap())
			.round()
			.to_usize()
			.unwrap_or(0);
		let n_train = if n >= 2 {
			n_train.max(1).min(n - 1)
		} else {
			n
		};
		train.extend_from_slice(&indexes[..n_train]);
		test.extend_from_slice(&indexes[n_train..]);
	}
	train.sort_unstable();
	test.sort_unstable();
	Split { train, test }
}

/**
`Folds` assigns every row to one of `n_folds` cross validation folds, stratified by label.

For each class, the row indexes are shuffled with a `Xoshiro256Plus` seeded with `seed` and dealt to the folds in turn, so fold sizes within a class differ by at most one.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Folds {
	assignment: Vec<usize>,
	n_folds: usize,
}

impl Folds {
	pub fn stratified(labels: &[bool], n_folds: usize, seed: u64) -> Folds {
		let n_folds = n_folds.max(1);
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let mut assignment = vec![0; labels.len()];
		let mut next_fold = 0;
		for class in [false, true].iter() {
			let mut indexes = class_indexes(labels, *class);
			indexes.shuffle(&mut rng);
			for index in indexes {
				assignment[index] = next_fold;
				next_fold = (next_fold + 1) % n_folds;
			}
		}
		Folds {
			assignment,
			n_folds,
		}
	}

	pub fn n_folds(&self) -> usize {
		self.n_folds
	}

	/// Retrieve the training rows and the held out rows for `fold`, each sorted in ascending order.
	pub fn fold(&self, fold: usize) -> Split {
		let (test, train): (Vec<usize>, Vec<usize>) =
			(0..self.assignment.len()).partition(|index| self.assignment[*index] == fold);
		Split { train, test }
	}

	pub fn iter(&self) -> impl Iterator<Item = Split> + '_ {
		(0..self.n_folds).map(move |fold| self.fold(fold))
	}
}

/// Return the largest fold count no greater than `n_folds` that gives every fold at least one row of the minority class. This returns 0 or 1 when the labels cannot support cross validation.
pub fn max_stratified_folds(labels: &[bool], n_folds: usize) -> usize {
	let n_present = labels.iter().filter(|label| **label).count();
	let n_absent = labels.len() - n_present;
	n_folds.min(n_present.min(n_absent))
}

fn class_indexes(labels: &[bool], class: bool) -> Vec<usize> {
	labels
		.iter()
		.enumerate()
		.filter(|(_, label)| **label == class)
		.map(|(index, _)| index)
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;

	fn labels(n_present: usize, n_absent: usize) -> Vec<bool> {
		// Interleave the classes so stratification has work to do.
		let mut labels = Vec::new();
		let (mut present, mut absent) = (n_present, n_absent);
		while present > 0 || absent > 0 {
			if present > 0 {
				labels.push(true);
				present -= 1;
			}
			for _ in 0..3 {
				if absent > 0 {
					labels.push(false);
					absent -= 1;
				}
			}
		}
		labels
	}

	#[test]
	fn test_split_preserves_class_proportions() {
		let labels = labels(40, 120);
		let split = stratified_split(&labels, 0.75, 1_385_321);
		let count_present = |indexes: &[usize]| indexes.iter().filter(|i| labels[**i]).count();
		assert_eq!(split.train.len() + split.test.len(), labels.len());
		assert_eq!(count_present(&split.train), 30);
		assert_eq!(count_present(&split.test), 10);
		assert_eq!(split.train.len() - count_present(&split.train), 90);
		assert_eq!(split.test.len() - count_present(&split.test), 30);
		let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).cloned().collect();
		all.sort_unstable();
		assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
	}

	#[test]
	fn test_split_is_deterministic() {
		let labels = labels(17, 43);
		let left = stratified_split(&labels, 0.7, 42);
		let right = stratified_split(&labels, 0.7, 42);
		assert_eq!(left, right);
		let other = stratified_split(&labels, 0.7, 43);
		assert_ne!(left, other);
	}

	#[test]
	fn test_split_keeps_both_classes_in_test() {
		let labels = labels(2, 9);
		let split = stratified_split(&labels, 0.95, 7);
		assert!(split.test.iter().any(|i| labels[*i]));
		assert!(split.test.iter().any(|i| !labels[*i]));
	}

	#[test]
	fn test_folds_are_stratified_and_disjoint() {
		let labels = labels(10, 30);
		let folds = Folds::stratified(&labels, 5, 3);
		assert_eq!(folds.n_folds(), 5);
		let mut seen = vec![0; labels.len()];
		for split in folds.iter() {
			assert_eq!(split.test.iter().filter(|i| labels[**i]).count(), 2);
			assert_eq!(split.test.iter().filter(|i| !labels[**i]).count(), 6);
			assert_eq!(split.train.len() + split.test.len(), labels.len());
			for index in split.test {
				seen[index] += 1;
			}
		}
		assert!(seen.iter().all(|count| *count == 1));
	}

	#[test]
	fn test_max_stratified_folds() {
		assert_eq!(max_stratified_folds(&labels(3, 20), 10), 3);
		assert_eq!(max_stratified_folds(&labels(30, 20), 10), 10);
		assert_eq!(max_stratified_folds(&labels(0, 20), 10), 0);
	}
}

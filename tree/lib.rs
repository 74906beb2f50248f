/*!
This crate implements the two tree ensembles used to classify presence and absence: [`BinaryClassifier`](struct.BinaryClassifier.html), a gradient boosted ensemble of regression trees fitted to the logistic loss, and [`RandomForest`](struct.RandomForest.html), an ensemble of probability trees grown on bootstrap samples. Both grow their trees with the same exact greedy algorithm on per-example gradients and hessians.
*/

#![allow(clippy::tabs_in_doc_comments)]

use ndarray::prelude::*;
use num_traits::ToPrimitive;
use thiserror::Error;

mod binary_classifier;
mod forest;
mod grow;

pub use binary_classifier::{BinaryClassifier, TrainOptions};
pub use forest::{RandomForest, RandomForestOptions};

#[derive(Debug, Error, PartialEq)]
pub enum Error {
	#[error("the labels contain a single class")]
	SingleClass,
	#[error("at least one tree is required")]
	NoTrees,
	#[error("expected {expected} rows of labels but got {actual}")]
	Shape { expected: usize, actual: usize },
}

/// The options that control how a single tree is grown.
#[derive(Clone, Debug)]
pub(crate) struct GrowOptions {
	pub max_depth: usize,
	pub min_examples_per_child: usize,
	pub min_sum_hessians_per_child: f32,
	pub min_gain_to_split: f32,
	pub l2_regularization: f32,
	/// If this is `Some(n)`, each branch considers `n` features sampled without replacement instead of all of them.
	pub max_features: Option<usize>,
}

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
	pub nodes: Vec<Node>,
}

impl Tree {
	/// Make a prediction for a given example.
	pub fn predict(&self, features: ArrayView1<f32>) -> f32 {
		// Start at the root node.
		let mut node_index = 0;
		// Traverse the tree until we get to a leaf.
		loop {
			match &self.nodes[node_index] {
				Node::Branch(BranchNode {
					left_child_index,
					right_child_index,
					split:
						BranchSplitContinuous {
							feature_index,
							split_value,
						},
				}) => {
					node_index = if features[*feature_index] <= *split_value {
						*left_child_index
					} else {
						*right_child_index
					};
				}
				Node::Leaf(LeafNode { value }) => return *value,
			}
		}
	}
}

/// A node is either a branch or a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

/// A `BranchNode` is a branch in a tree.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchNode {
	/// This is the index in the tree's node vector for this node's left child.
	pub left_child_index: usize,
	/// This is the index in the tree's node vector for this node's right child.
	pub right_child_index: usize,
	pub split: BranchSplitContinuous,
}

/// A continuous branch split takes the value of a single feature, compares it with a `split_value`, and if the value is <= `split_value`, the example is sent left, and if it is > `split_value`, it is sent right.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchSplitContinuous {
	/// This is the index of the feature to get the value for.
	pub feature_index: usize,
	/// This is the threshold value of the split.
	pub split_value: f32,
}

/// The leaves in a tree hold the values to output for examples that get sent to them.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafNode {
	pub value: f32,
}

/// Compute the fraction of branches in `trees` that split on each feature.
pub(crate) fn compute_feature_importances(trees: &[Tree], n_features: usize) -> Vec<f32> {
	let mut counts = vec![0usize; n_features];
	for tree in trees {
		for node in tree.nodes.iter() {
			if let Node::Branch(branch) = node {
				counts[branch.split.feature_index] += 1;
			}
		}
	}
	let total: usize = counts.iter().sum();
	counts
		.iter()
		.map(|count| {
			if total == 0 {
				0.0
			} else {
				count.to_f32().unwrap() / total.to_f32().unwrap()
			}
		})
		.collect()
}

pub(crate) fn check_labels(n_rows: usize, labels: &[bool]) -> Result<(), Error> {
	if labels.len() != n_rows {
		return Err(Error::Shape {
			expected: n_rows,
			actual: labels.len(),
		});
	}
	let n_present = labels.iter().filter(|label| **label).count();
	if n_present == 0 || n_present == labels.len() {
		return Err(Error::SingleClass);
	}
	Ok(())
}

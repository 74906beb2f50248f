use super::{BranchNode, BranchSplitContinuous, GrowOptions, LeafNode, Node, Tree};
use ndarray::prelude::*;
use rand::seq::index::sample;
use rand_xoshiro::Xoshiro256Plus;
use std::cmp::Ordering;

struct QueueItem {
	node_index: usize,
	depth: usize,
	examples: Vec<usize>,
}

struct Split {
	feature_index: usize,
	split_value: f32,
	gain: f32,
}

/**
Grow a tree on `examples`, which may contain duplicates, using exact greedy splitting.

Each node's value is `-sum_gradients / (sum_hessians + l2_regularization)`. A node is split on the (feature, value) pair with the highest gain `G_L^2 / (H_L + l2) + G_R^2 / (H_R + l2) - G^2 / (H + l2)`, provided the gain exceeds `min_gain_to_split` and both children satisfy the minimum example count and hessian sum.
*/
pub(crate) fn grow_tree(
	features: ArrayView2<f32>,
	gradients: &[f32],
	hessians: &[f32],
	examples: Vec<usize>,
	options: &GrowOptions,
	rng: &mut Xoshiro256Plus,
) -> Tree {
	let mut nodes = vec![Node::Leaf(LeafNode { value: 0.0 })];
	let mut queue = vec![QueueItem {
		node_index: 0,
		depth: 0,
		examples,
	}];
	while let Some(QueueItem {
		node_index,
		depth,
		examples,
	}) = queue.pop()
	{
		let (sum_gradients, sum_hessians) = sums(&examples, gradients, hessians);
		nodes[node_index] = Node::Leaf(LeafNode {
			value: leaf_value(sum_gradients, sum_hessians, options.l2_regularization),
		});
		if depth >= options.max_depth || examples.len() < 2 * options.min_examples_per_child.max(1) {
			continue;
		}
		let split = match choose_best_split(features, gradients, hessians, &examples, options, rng) {
			Some(split) => split,
			None => continue,
		};
		let (left_examples, right_examples): (Vec<usize>, Vec<usize>) = examples
			.iter()
			.partition(|example| features[[**example, split.feature_index]] <= split.split_value);
		let left_child_index = nodes.len();
		let right_child_index = nodes.len() + 1;
		nodes.push(Node::Leaf(LeafNode { value: 0.0 }));
		nodes.push(Node::Leaf(LeafNode { value: 0.0 }));
		nodes[node_index] = Node::Branch(BranchNode {
			left_child_index,
			right_child_index,
			split: BranchSplitContinuous {
				feature_index: split.feature_index,
				split_value: split.split_value,
			},
		});
		queue.push(QueueItem {
			node_index: right_child_index,
			depth: depth + 1,
			examples: right_examples,
		});
		queue.push(QueueItem {
			node_index: left_child_index,
			depth: depth + 1,
			examples: left_examples,
		});
	}
	Tree { nodes }
}

fn sums(examples: &[usize], gradients: &[f32], hessians: &[f32]) -> (f64, f64) {
	examples.iter().fold((0.0, 0.0), |(g, h), example| {
		(
			g + f64::from(gradients[*example]),
			h + f64::from(hessians[*example]),
		)
	})
}

fn leaf_value(sum_gradients: f64, sum_hessians: f64, l2_regularization: f32) -> f32 {
	let denominator = sum_hessians + f64::from(l2_regularization);
	if denominator <= 0.0 {
		0.0
	} else {
		(-sum_gradients / denominator) as f32
	}
}

fn score(sum_gradients: f64, sum_hessians: f64, l2_regularization: f64) -> f64 {
	let denominator = sum_hessians + l2_regularization;
	if denominator <= 0.0 {
		0.0
	} else {
		sum_gradients * sum_gradients / denominator
	}
}

fn choose_best_split(
	features: ArrayView2<f32>,
	gradients: &[f32],
	hessians: &[f32],
	examples: &[usize],
	options: &GrowOptions,
	rng: &mut Xoshiro256Plus,
) -> Option<Split> {
	let n_features = features.ncols();
	let mut feature_indexes: Vec<usize> = match options.max_features {
		Some(max_features) if max_features < n_features => {
			sample(rng, n_features, max_features.max(1)).into_vec()
		}
		_ => (0..n_features).collect(),
	};
	feature_indexes.sort_unstable();
	let l2 = f64::from(options.l2_regularization);
	let min_hessians = f64::from(options.min_sum_hessians_per_child);
	let min_examples = options.min_examples_per_child.max(1);
	let (total_gradients, total_hessians) = sums(examples, gradients, hessians);
	let parent_score = score(total_gradients, total_hessians, l2);
	let mut best: Option<Split> = None;
	let mut sorted = examples.to_vec();
	for feature_index in feature_indexes {
		let column = features.column(feature_index);
		sorted.sort_by(|a, b| {
			column[*a]
				.partial_cmp(&column[*b])
				.unwrap_or(Ordering::Equal)
		});
		let (mut left_gradients, mut left_hessians) = (0.0f64, 0.0f64);
		for position in 0..sorted.len() - 1 {
			let example = sorted[position];
			left_gradients += f64::from(gradients[example]);
			left_hessians += f64::from(hessians[example]);
			let value = column[example];
			let next_value = column[sorted[position + 1]];
			// Examples with equal values cannot be separated.
			if value >= next_value {
				continue;
			}
			let n_left = position + 1;
			let n_right = sorted.len() - n_left;
			let right_gradients = total_gradients - left_gradients;
			let right_hessians = total_hessians - left_hessians;
			if n_left < min_examples
				|| n_right < min_examples
				|| left_hessians < min_hessians
				|| right_hessians < min_hessians
			{
				continue;
			}
			let gain = (score(left_gradients, left_hessians, l2)
				+ score(right_gradients, right_hessians, l2)
				- parent_score) as f32;
			let is_better = match &best {
				None => gain > options.min_gain_to_split,
				Some(best) => gain > best.gain,
			};
			if is_better {
				let midpoint = value + (next_value - value) / 2.0;
				let split_value = if midpoint < next_value { midpoint } else { value };
				best = Some(Split {
					feature_index,
					split_value,
					gain,
				});
			}
		}
	}
	best
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::SeedableRng;

	fn options() -> GrowOptions {
		GrowOptions {
			max_depth: 4,
			min_examples_per_child: 1,
			min_sum_hessians_per_child: 0.0,
			min_gain_to_split: 1e-6,
			l2_regularization: 0.0,
			max_features: None,
		}
	}

	#[test]
	fn test_grow_tree_mean_leaves() {
		// A gradient of -y with unit hessians makes every leaf the mean of its labels.
		let features = array![[0.0f32, 5.0], [1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
		let gradients = [0.0, 0.0, -1.0, -1.0];
		let hessians = [1.0; 4];
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let tree = grow_tree(
			features.view(),
			&gradients,
			&hessians,
			(0..4).collect(),
			&options(),
			&mut rng,
		);
		insta::assert_debug_snapshot!(tree, @r###"
  Tree {
      nodes: [
          Branch(
              BranchNode {
                  left_child_index: 1,
                  right_child_index: 2,
                  split: BranchSplitContinuous {
                      feature_index: 0,
                      split_value: 1.5,
                  },
              },
          ),
          Leaf(
              LeafNode {
                  value: -0.0,
              },
          ),
          Leaf(
              LeafNode {
                  value: 1.0,
              },
          ),
      ],
  }
  "###);
		assert_eq!(tree.predict(array![0.5f32, 0.0].view()), 0.0);
		assert_eq!(tree.predict(array![2.5f32, 0.0].view()), 1.0);
	}

	#[test]
	fn test_grow_tree_respects_min_examples() {
		let features = array![[0.0f32], [1.0], [2.0], [3.0]];
		let gradients = [0.0, 0.0, 0.0, -1.0];
		let hessians = [1.0; 4];
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		let tree = grow_tree(
			features.view(),
			&gradients,
			&hessians,
			(0..4).collect(),
			&GrowOptions {
				min_examples_per_child: 2,
				..options()
			},
			&mut rng,
		);
		// The only admissible split puts two examples on each side.
		match &tree.nodes[0] {
			Node::Branch(branch) => assert_eq!(branch.split.split_value, 1.5),
			Node::Leaf(_) => panic!("expected a branch"),
		}
		assert_eq!(tree.nodes.len(), 3);
	}
}

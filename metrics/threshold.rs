use super::{auc_roc::compute_tps_fps_by_threshold, ConfusionMatrix};
use num_traits::ToPrimitive;
use thiserror::Error;

/**
The balanced threshold is the decision cutoff where sensitivity (the true positive rate) and specificity (the true negative rate) are closest to each other.

The candidates are the distinct finite probabilities in the input. An example is predicted present when its probability is greater than or equal to the candidate. The chosen candidate minimizes `|tpr - tnr|`. Ties are broken by the larger `tpr + tnr`, and then by the larger threshold. Comparisons are done on integer counts, so ties are exact.
*/
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct BalancedThreshold {
	pub threshold: f32,
	pub true_positive_rate: f32,
	pub true_negative_rate: f32,
	pub confusion_matrix: ConfusionMatrix,
}

#[derive(Debug, Error, PartialEq)]
pub enum BalancedThresholdError {
	#[error("{n_presence} presence and {n_absence} absence scores, at least {min_samples_per_class} of each are required")]
	InsufficientSamples {
		n_presence: u64,
		n_absence: u64,
		min_samples_per_class: u64,
	},
}

pub fn balanced_threshold(
	probabilities: &[f32],
	labels: &[bool],
	min_samples_per_class: u64,
) -> Result<BalancedThreshold, BalancedThresholdError> {
	let tps_fps = compute_tps_fps_by_threshold(probabilities, labels);
	let n_presence: u64 = tps_fps
		.iter()
		.map(|point| point.true_positives.to_u64().unwrap())
		.sum();
	let n_absence: u64 = tps_fps
		.iter()
		.map(|point| point.false_positives.to_u64().unwrap())
		.sum();
	let min_samples_per_class = min_samples_per_class.max(1);
	if n_presence < min_samples_per_class || n_absence < min_samples_per_class {
		return Err(BalancedThresholdError::InsufficientSamples {
			n_presence,
			n_absence,
			min_samples_per_class,
		});
	}
	// Scaling tpr by n_absence and tnr by n_presence keeps both on the common denominator n_presence * n_absence.
	struct Best {
		threshold: f32,
		difference: u128,
		sum: u128,
		confusion_matrix: ConfusionMatrix,
	}
	let mut best: Option<Best> = None;
	let (mut true_positives, mut false_positives) = (0u64, 0u64);
	// Candidates are visited from the highest threshold to the lowest, so keeping the first of equal candidates prefers the larger threshold.
	for point in tps_fps.iter() {
		true_positives += point.true_positives.to_u64().unwrap();
		false_positives += point.false_positives.to_u64().unwrap();
		let true_negatives = n_absence - false_positives;
		let scaled_tpr = u128::from(true_positives) * u128::from(n_absence);
		let scaled_tnr = u128::from(true_negatives) * u128::from(n_presence);
		let difference = if scaled_tpr > scaled_tnr {
			scaled_tpr - scaled_tnr
		} else {
			scaled_tnr - scaled_tpr
		};
		let sum = scaled_tpr + scaled_tnr;
		let is_better = match &best {
			None => true,
			Some(best) => {
				difference < best.difference || (difference == best.difference && sum > best.sum)
			}
		};
		if is_better {
			best = Some(Best {
				threshold: point.threshold,
				difference,
				sum,
				confusion_matrix: ConfusionMatrix {
					true_positives,
					false_positives,
					true_negatives,
					false_negatives: n_presence - true_positives,
				},
			});
		}
	}
	// The sample check above guarantees at least one candidate.
	let best = best.ok_or(BalancedThresholdError::InsufficientSamples {
		n_presence,
		n_absence,
		min_samples_per_class,
	})?;
	Ok(BalancedThreshold {
		threshold: best.threshold,
		true_positive_rate: best.confusion_matrix.true_positive_rate(),
		true_negative_rate: best.confusion_matrix.true_negative_rate(),
		confusion_matrix: best.confusion_matrix,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	fn fixture() -> (Vec<f32>, Vec<bool>) {
		let probabilities = vec![0.9, 0.8, 0.7, 0.6, 0.55, 0.51, 0.49, 0.4, 0.2, 0.1];
		let labels = "PPPPPAPAAA".chars().map(|c| c == 'P').collect();
		(probabilities, labels)
	}

	#[test]
	fn test_balanced_threshold_fixture() {
		let (probabilities, labels) = fixture();
		let balanced = balanced_threshold(&probabilities, &labels, 1).unwrap();
		// At 0.51: tpr = 5/6, tnr = 3/4, |difference| = 1/12. At 0.55: 5/6 vs 4/4. At 0.49: 6/6 vs 3/4.
		assert_eq!(balanced.threshold, 0.51);
		assert_eq!(
			balanced.confusion_matrix,
			ConfusionMatrix {
				true_positives: 5,
				false_positives: 1,
				true_negatives: 3,
				false_negatives: 1,
			}
		);
		assert!((balanced.true_positive_rate - 5.0 / 6.0).abs() < 1e-6);
		assert!((balanced.true_negative_rate - 0.75).abs() < 1e-6);
	}

	#[test]
	fn test_balanced_threshold_reproduces_confusion_matrix() {
		let (probabilities, labels) = fixture();
		let balanced = balanced_threshold(&probabilities, &labels, 1).unwrap();
		let reapplied = ConfusionMatrix::at_threshold(&probabilities, &labels, balanced.threshold);
		assert_eq!(reapplied, balanced.confusion_matrix);
		let min = probabilities.iter().cloned().fold(f32::INFINITY, f32::min);
		let max = probabilities.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
		assert!(balanced.threshold >= min && balanced.threshold <= max);
	}

	#[test]
	fn test_balanced_threshold_ties_prefer_larger_sum() {
		// 0.8 gives tpr 1/4 and tnr 3/4. The tied scores at 0.5 jump to tpr 1 and tnr 1/2. Both differ by 1/2.
		let probabilities = [0.9, 0.8, 0.5, 0.5, 0.5, 0.5, 0.2, 0.2];
		let labels = [true, false, true, true, true, false, false, false];
		let balanced = balanced_threshold(&probabilities, &labels, 1).unwrap();
		assert_eq!(balanced.threshold, 0.5);
		assert_eq!(
			balanced.confusion_matrix,
			ConfusionMatrix {
				true_positives: 4,
				false_positives: 2,
				true_negatives: 2,
				false_negatives: 0,
			}
		);
	}

	#[test]
	fn test_balanced_threshold_insufficient_samples() {
		let result = balanced_threshold(&[0.9, 0.8, 0.1], &[true, true, false], 2);
		assert_eq!(
			result,
			Err(BalancedThresholdError::InsufficientSamples {
				n_presence: 2,
				n_absence: 1,
				min_samples_per_class: 2,
			})
		);
	}
}

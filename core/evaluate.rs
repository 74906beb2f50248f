use crate::Error;
use covermap_metrics::{
	auc_roc, balanced_threshold, compute_roc_curve, BalancedThreshold, BinaryCrossEntropy,
	BinaryCrossEntropyInput, RocCurvePoint, StreamingMetric,
};

/// The evaluation of stacked Test predictions.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Evaluation {
	pub auc: f32,
	/// The mean binary cross entropy, or `None` if there are no rows.
	pub cross_entropy: Option<f32>,
	pub threshold: BalancedThreshold,
	/// The fraction of rows labeled correctly at the balanced threshold.
	pub accuracy: f32,
	pub roc_curve: Vec<RocCurvePoint>,
}

/// Compute the ROC curve, its area, and the balanced threshold of the stacked Test probabilities.
pub fn evaluate(
	probabilities: &[f32],
	labels: &[bool],
	min_samples_per_class: u64,
) -> Result<Evaluation, Error> {
	if probabilities.len() != labels.len() {
		return Err(Error::Shape(format!(
			"{} probabilities for {} labels",
			probabilities.len(),
			labels.len()
		)));
	}
	let threshold = balanced_threshold(probabilities, labels, min_samples_per_class)?;
	let roc_curve = compute_roc_curve(probabilities, labels);
	let auc = auc_roc(probabilities, labels);
	let accuracy = threshold.confusion_matrix.accuracy();
	Ok(Evaluation {
		auc,
		cross_entropy: cross_entropy(probabilities, labels),
		threshold,
		accuracy,
		roc_curve,
	})
}

pub fn cross_entropy(probabilities: &[f32], labels: &[bool]) -> Option<f32> {
	let mut metric = BinaryCrossEntropy::default();
	for (probability, label) in probabilities.iter().zip(labels.iter()) {
		metric.update(BinaryCrossEntropyInput {
			probability: *probability,
			label: *label,
		});
	}
	metric.finalize()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_evaluate_fixture() {
		let probabilities = [0.9, 0.8, 0.7, 0.6, 0.55, 0.51, 0.49, 0.4, 0.2, 0.1];
		let labels: Vec<bool> = "PPPPPAPAAA".chars().map(|c| c == 'P').collect();
		let evaluation = evaluate(&probabilities, &labels, 2).unwrap();
		assert_eq!(evaluation.threshold.threshold, 0.51);
		assert!((evaluation.accuracy - 0.8).abs() < 1e-6);
		assert_eq!(evaluation.roc_curve.len(), 11);
		// Only the pair (0.51 absent, 0.49 present) is misordered, out of 24 pairs.
		assert!((evaluation.auc - 23.0 / 24.0).abs() < 1e-6);
		assert!(evaluation.cross_entropy.unwrap() > 0.0);
		assert_eq!(cross_entropy(&[], &[]), None);
	}

	#[test]
	fn test_evaluate_needs_both_classes() {
		let error = evaluate(&[0.9, 0.3, 0.2], &[true, false, false], 2).unwrap_err();
		assert!(matches!(error, Error::Threshold(_)));
	}
}

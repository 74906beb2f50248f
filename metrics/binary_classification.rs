use super::StreamingMetric;
use num_traits::ToPrimitive;

/**
`BinaryClassificationMetrics` accumulates the confusion matrix of a binary classifier at a single fixed threshold. An example is predicted present when its probability is greater than or equal to the threshold. Examples with a non-finite probability are not counted.
*/
#[derive(Clone, Debug)]
pub struct BinaryClassificationMetrics {
	threshold: f32,
	confusion_matrix: ConfusionMatrix,
}

/// The input to [BinaryClassificationMetrics](struct.BinaryClassificationMetrics.html).
pub struct BinaryClassificationMetricsInput<'a> {
	pub probabilities: &'a [f32],
	pub labels: &'a [bool],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
	pub true_positives: u64,
	pub false_positives: u64,
	pub true_negatives: u64,
	pub false_negatives: u64,
}

impl BinaryClassificationMetrics {
	pub fn new(threshold: f32) -> Self {
		Self {
			threshold,
			confusion_matrix: ConfusionMatrix::default(),
		}
	}
}

impl<'a> StreamingMetric<'a> for BinaryClassificationMetrics {
	type Input = BinaryClassificationMetricsInput<'a>;
	type Output = ConfusionMatrix;

	fn update(&mut self, input: BinaryClassificationMetricsInput) {
		for (probability, label) in input.probabilities.iter().zip(input.labels.iter()) {
			if !probability.is_finite() {
				continue;
			}
			let predicted = *probability >= self.threshold;
			let confusion_matrix = &mut self.confusion_matrix;
			match (predicted, *label) {
				(true, true) => confusion_matrix.true_positives += 1,
				(true, false) => confusion_matrix.false_positives += 1,
				(false, false) => confusion_matrix.true_negatives += 1,
				(false, true) => confusion_matrix.false_negatives += 1,
			}
		}
	}

	fn merge(&mut self, other: Self) {
		self.confusion_matrix.true_positives += other.confusion_matrix.true_positives;
		self.confusion_matrix.false_positives += other.confusion_matrix.false_positives;
		self.confusion_matrix.true_negatives += other.confusion_matrix.true_negatives;
		self.confusion_matrix.false_negatives += other.confusion_matrix.false_negatives;
	}

	fn finalize(self) -> ConfusionMatrix {
		self.confusion_matrix
	}
}

impl ConfusionMatrix {
	/// Compute the confusion matrix for `probabilities` against `labels` at `threshold`.
	pub fn at_threshold(probabilities: &[f32], labels: &[bool], threshold: f32) -> Self {
		let mut metrics = BinaryClassificationMetrics::new(threshold);
		metrics.update(BinaryClassificationMetricsInput {
			probabilities,
			labels,
		});
		metrics.finalize()
	}

	pub fn n_examples(&self) -> u64 {
		self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
	}

	pub fn n_positives(&self) -> u64 {
		self.true_positives + self.false_negatives
	}

	pub fn n_negatives(&self) -> u64 {
		self.true_negatives + self.false_positives
	}

	/// tpr = sensitivity = tp / (tp + fn)
	pub fn true_positive_rate(&self) -> f32 {
		ratio(self.true_positives, self.n_positives())
	}

	/// tnr = specificity = tn / (tn + fp)
	pub fn true_negative_rate(&self) -> f32 {
		ratio(self.true_negatives, self.n_negatives())
	}

	/// fpr = fp / (fp + tn)
	pub fn false_positive_rate(&self) -> f32 {
		ratio(self.false_positives, self.n_negatives())
	}

	pub fn accuracy(&self) -> f32 {
		ratio(self.true_positives + self.true_negatives, self.n_examples())
	}
}

fn ratio(numerator: u64, denominator: u64) -> f32 {
	numerator.to_f32().unwrap() / denominator.to_f32().unwrap()
}

#[test]
fn test_confusion_matrix_at_threshold() {
	let probabilities = [0.9, 0.6, 0.6, 0.4, 0.2, f32::NAN];
	let labels = [true, true, false, true, false, true];
	let confusion_matrix = ConfusionMatrix::at_threshold(&probabilities, &labels, 0.6);
	insta::assert_debug_snapshot!(confusion_matrix, @r###"
 ConfusionMatrix {
     true_positives: 2,
     false_positives: 1,
     true_negatives: 1,
     false_negatives: 1,
 }
 "###);
	assert!((confusion_matrix.true_positive_rate() - 2.0 / 3.0).abs() < 1e-6);
	assert!((confusion_matrix.true_negative_rate() - 0.5).abs() < 1e-6);
	assert!((confusion_matrix.accuracy() - 0.6).abs() < 1e-6);
}

#[test]
fn test_streaming_merge() {
	let mut left = BinaryClassificationMetrics::new(0.5);
	left.update(BinaryClassificationMetricsInput {
		probabilities: &[0.7, 0.2],
		labels: &[true, true],
	});
	let mut right = BinaryClassificationMetrics::new(0.5);
	right.update(BinaryClassificationMetricsInput {
		probabilities: &[0.1],
		labels: &[false],
	});
	left.merge(right);
	let confusion_matrix = left.finalize();
	assert_eq!(confusion_matrix.true_positives, 1);
	assert_eq!(confusion_matrix.false_negatives, 1);
	assert_eq!(confusion_matrix.true_negatives, 1);
	assert_eq!(confusion_matrix.n_examples(), 3);
}

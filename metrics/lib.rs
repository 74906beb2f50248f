/*!
This crate defines the [`Metric`](trait.Metric.html) and [`StreamingMetric`](trait.StreamingMetric.html) traits and the binary classification metrics used to evaluate presence/absence models: the ROC curve and its area, the confusion matrix at a threshold, the balanced threshold, and the binary cross entropy.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod auc_roc;
mod binary_classification;
mod binary_cross_entropy;
mod mean;
mod mean_variance;
mod threshold;

pub use self::auc_roc::{auc_roc, compute_roc_curve, RocCurvePoint};
pub use self::binary_classification::{
	BinaryClassificationMetrics, BinaryClassificationMetricsInput, ConfusionMatrix,
};
pub use self::binary_cross_entropy::{BinaryCrossEntropy, BinaryCrossEntropyInput};
pub use self::mean::Mean;
pub use self::mean_variance::{MeanVariance, MeanVarianceOutput};
pub use self::threshold::{balanced_threshold, BalancedThreshold, BalancedThresholdError};

/**
The `Metric` trait defines a common interface to metrics that can be computed when the entire input is available at once.

The seemingly unused generic lifetime `'a` exists here to allow `Input`s and `Output`s to borrow from their enclosing scope.
*/
pub trait Metric<'a> {
	type Input;
	type Output;
	fn compute(input: Self::Input) -> Self::Output;
}

/**
The `StreamingMetric` trait defines a common interface to metrics that can be computed in a streaming manner, where the input is available in chunks, such as the confusion matrix of a model evaluated over batches of rows.

After being initialized, a value of type `T` implementing the `StreamingMetric` trait can have `update()` called on it with values of the associated type `Input`. Multiple values of `T` can be merged together by calling `merge()`. This is useful when computing a metric across multiple threads. When finished aggregating, you can call `finalize()` on the metric to produce the associated type `Output`.

# Examples

```
use covermap_metrics::StreamingMetric;

struct Min(f32);

impl StreamingMetric<'_> for Min {
	type Input = f32;
	type Output = f32;
	fn update(&mut self, input: Self::Input) {
		self.0 = self.0.min(input)
	}
	fn merge(&mut self, other: Self) { self.0 = self.0.min(other.0) }
	fn finalize(self) -> Self::Output { self.0 }
}
```
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}

use itertools::izip;
use ndarray::prelude::*;
use covermap_metrics::{MeanVariance, Metric};

/**
A `NormalizedFeatureGroup` transforms a covariate column to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization).

# Example

For the training values `[0.0, 5.2, 1.3, 10.0]`:

Mean: 4.125

Standard Deviation: 3.89447

`feature_value = (value - mean) / std`

| covariate value | feature value                       |
|-----------------|-------------------------------------|
| 0.0             | (0.0 - 4.125) / 3.89447 = -1.05919  |
| 5.2             | (5.2 - 4.125) / 3.89447 = 0.27603   |
| NaN             | 0.0                                 |

A column with zero variance maps every value to 0.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedFeatureGroup {
	pub source_column_name: String,
	pub mean: f32,
	pub variance: f32,
}

impl NormalizedFeatureGroup {
	pub fn fit(source_column_name: String, values: ArrayView1<f32>) -> NormalizedFeatureGroup {
		let values = values.to_vec();
		let mean_variance = MeanVariance::compute(values.as_slice());
		NormalizedFeatureGroup {
			source_column_name,
			mean: mean_variance.mean,
			variance: mean_variance.variance,
		}
	}

	pub fn compute(&self, value: f32) -> f32 {
		if !value.is_finite() || self.variance == 0.0 {
			0.0
		} else {
			(value - self.mean) / f32::sqrt(self.variance)
		}
	}
}

/// A `FeatureNormalizer` holds one `NormalizedFeatureGroup` per covariate column, in column order.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureNormalizer {
	pub groups: Vec<NormalizedFeatureGroup>,
}

impl FeatureNormalizer {
	/// Fit one group per column of `features`. `column_names` must have one entry per column.
	pub fn fit(column_names: &[String], features: ArrayView2<f32>) -> FeatureNormalizer {
		let groups = izip!(column_names.iter(), features.axis_iter(Axis(1)))
			.map(|(column_name, column)| NormalizedFeatureGroup::fit(column_name.clone(), column))
			.collect();
		FeatureNormalizer { groups }
	}

	pub fn compute_array_f32(&self, features: ArrayView2<f32>) -> Array2<f32> {
		let mut output = Array2::zeros(features.raw_dim());
		for (mut output_column, column, group) in izip!(
			output.axis_iter_mut(Axis(1)),
			features.axis_iter(Axis(1)),
			self.groups.iter()
		) {
			for (output_value, value) in izip!(output_column.iter_mut(), column.iter()) {
				*output_value = group.compute(*value);
			}
		}
		output
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_normalized_feature_group() {
		let values = array![0.0, 5.2, 1.3, 10.0];
		let group = NormalizedFeatureGroup::fit("ndvi".to_owned(), values.view());
		assert!((group.mean - 4.125).abs() < 1e-5);
		assert!((group.compute(0.0) + 1.05919).abs() < 1e-4);
		assert!((group.compute(5.2) - 0.27603).abs() < 1e-4);
		assert_eq!(group.compute(f32::NAN), 0.0);
	}

	#[test]
	fn test_feature_normalizer() {
		let names = vec!["a".to_owned(), "b".to_owned()];
		let features = array![[1.0, 7.0], [3.0, 7.0], [5.0, 7.0]];
		let normalizer = FeatureNormalizer::fit(&names, features.view());
		assert_eq!(normalizer.groups.len(), 2);
		let normalized = normalizer.compute_array_f32(features.view());
		let column_mean: f32 = normalized.column(0).sum() / 3.0;
		assert!(column_mean.abs() < 1e-6);
		assert!(normalized.column(1).iter().all(|value| *value == 0.0));
		let unseen = normalizer.compute_array_f32(array![[3.0, 100.0]].view());
		assert_eq!(unseen, array![[0.0, 0.0]]);
	}
}

//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm

use super::Metric;
use num_traits::ToPrimitive;

/// `MeanVariance` computes the mean and the population variance of a column of values. Non-finite values are skipped.
pub struct MeanVariance;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanVarianceOutput {
	pub n: u64,
	pub mean: f32,
	pub variance: f32,
}

impl<'a> Metric<'a> for MeanVariance {
	type Input = &'a [f32];
	type Output = MeanVarianceOutput;

	fn compute(input: &'a [f32]) -> MeanVarianceOutput {
		let (n, mean, m2) = input
			.iter()
			.filter(|value| value.is_finite())
			.fold((0u64, 0.0f64, 0.0f64), |(n, mean, m2), value| {
				let value = value.to_f64().unwrap();
				let n = n + 1;
				let delta = value - mean;
				let mean = mean + delta / n.to_f64().unwrap();
				let m2 = m2 + delta * (value - mean);
				(n, mean, m2)
			});
		let variance = if n == 0 {
			0.0
		} else {
			m2 / n.to_f64().unwrap()
		};
		MeanVarianceOutput {
			n,
			mean: mean.to_f32().unwrap(),
			variance: variance.to_f32().unwrap(),
		}
	}
}

#[test]
fn test_mean_variance() {
	let output = MeanVariance::compute(&[0.0, 5.2, 1.3, 10.0, f32::NAN]);
	assert_eq!(output.n, 4);
	assert!((output.mean - 4.125).abs() < 1e-5);
	assert!((output.variance - 15.166875).abs() < 1e-4);
}

use super::{Error, LogisticRegression, LogisticRegressionOptions};
use ndarray::prelude::*;

#[derive(Clone, Debug)]
pub struct StepwiseOptions {
	pub logistic_regression_options: LogisticRegressionOptions,
	/// This is the maximum number of additions and removals.
	pub max_steps: usize,
}

impl Default for StepwiseOptions {
	fn default() -> Self {
		Self {
			logistic_regression_options: LogisticRegressionOptions::default(),
			max_steps: 1000,
		}
	}
}

/**
Select features for a `LogisticRegression` by the Akaike information criterion, searching in both directions.

The search starts from the model with every feature. At each step every model that drops one included feature or adds back one excluded feature is fitted, and the one with the lowest AIC replaces the current model if its AIC is lower. Candidate models that fail to fit are skipped. The search stops when no candidate improves the AIC.
*/
pub fn stepwise_aic(
	features: ArrayView2<f32>,
	labels: &[bool],
	options: &StepwiseOptions,
) -> Result<LogisticRegression, Error> {
	let all_features: Vec<usize> = (0..features.ncols()).collect();
	let mut current = LogisticRegression::train(
		features,
		labels,
		&all_features,
		&options.logistic_regression_options,
	)?;
	for _ in 0..options.max_steps {
		let mut best: Option<LogisticRegression> = None;
		for feature in all_features.iter() {
			let candidate_features: Vec<usize> = if current.features.contains(feature) {
				current
					.features
					.iter()
					.cloned()
					.filter(|included| included != feature)
					.collect()
			} else {
				let mut candidate_features = current.features.clone();
				candidate_features.push(*feature);
				candidate_features
			};
			let candidate = match LogisticRegression::train(
				features,
				labels,
				&candidate_features,
				&options.logistic_regression_options,
			) {
				Ok(candidate) => candidate,
				Err(error) => {
					log::debug!("skipping stepwise candidate {:?}: {}", candidate_features, error);
					continue;
				}
			};
			let is_better = match &best {
				None => true,
				Some(best) => candidate.aic() < best.aic(),
			};
			if is_better {
				best = Some(candidate);
			}
		}
		match best {
			Some(best) if best.aic() < current.aic() - 1e-10 => current = best,
			_ => break,
		}
	}
	Ok(current)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_stepwise_drops_noise() {
		// Feature 0 separates the classes imperfectly, features 1 and 2 are constant noise.
		let n = 40;
		let mut features = Array2::<f32>::zeros((n, 3));
		let mut labels = Vec::new();
		for i in 0..n {
			let x = i as f32 / n as f32;
			features[[i, 0]] = x;
			features[[i, 1]] = (i % 2) as f32;
			features[[i, 2]] = ((i / 2) % 2) as f32;
			// Every fourth label is flipped so the data is not separable.
			let label = x > 0.5;
			labels.push(if i % 4 == 0 { !label } else { label });
		}
		let model = stepwise_aic(features.view(), &labels, &Default::default()).unwrap();
		assert!(model.features.contains(&0));
		assert!(model.weights[0] > 0.0);
		let full = LogisticRegression::train(
			features.view(),
			&labels,
			&[0, 1, 2],
			&Default::default(),
		)
		.unwrap();
		assert!(model.aic() <= full.aic());
	}
}

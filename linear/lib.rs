/*!
This crate implements the linear models used to classify presence and absence. There are two model types. [`LogisticRegression`](struct.LogisticRegression.html) is an unpenalized logistic regression fitted with iteratively reweighted least squares, and [`stepwise_aic`](fn.stepwise_aic.html) uses it to choose a subset of covariates by the Akaike information criterion. [`ElasticNet`](struct.ElasticNet.html) is a logistic regression with a mixed L1/L2 penalty, fitted by coordinate descent along a decreasing path of penalty strengths, and [`ElasticNetCv`](struct.ElasticNetCv.html) chooses the mixing parameter and the penalty strength by stratified cross validation.

All fitting is done in `f64`. Features are accepted and probabilities are produced as `f32`.
*/

#![allow(clippy::tabs_in_doc_comments)]

use num_traits::ToPrimitive;
use thiserror::Error;

mod elastic_net;
mod glm;
mod solve;
mod stepwise;

pub use self::elastic_net::{
	lambda_path, ElasticNet, ElasticNetCv, ElasticNetCvOptions, ElasticNetCvPoint,
	ElasticNetOptions,
};
pub use self::glm::{LogisticRegression, LogisticRegressionOptions};
pub use self::stepwise::{stepwise_aic, StepwiseOptions};

#[derive(Debug, Error, PartialEq)]
pub enum Error {
	#[error("the labels contain a single class")]
	SingleClass,
	#[error("the fitted coefficients are not finite")]
	NotFinite,
	#[error("the normal equations are singular")]
	Singular,
	#[error("expected {expected} rows of labels but got {actual}")]
	Shape { expected: usize, actual: usize },
	#[error("{0}")]
	InvalidOption(String),
	#[error("{n_folds} cross validation folds are possible, at least 2 are required")]
	InsufficientFolds { n_folds: usize },
}

/// Probabilities are clamped to `[PROBABILITY_EPSILON, 1 - PROBABILITY_EPSILON]` when computing the deviance.
pub const PROBABILITY_EPSILON: f64 = 1e-5;

pub(crate) fn sigmoid(logit: f64) -> f64 {
	1.0 / ((-logit).exp() + 1.0)
}

/// The mean binomial deviance, `-2 / n * sum(y * ln(p) + (1 - y) * ln(1 - p))`.
pub fn mean_binomial_deviance(probabilities: &[f64], labels: &[bool]) -> f64 {
	if probabilities.is_empty() {
		return 0.0;
	}
	let total: f64 = probabilities
		.iter()
		.zip(labels.iter())
		.map(|(probability, label)| {
			let probability = probability.max(PROBABILITY_EPSILON).min(1.0 - PROBABILITY_EPSILON);
			if *label {
				-2.0 * probability.ln()
			} else {
				-2.0 * (1.0 - probability).ln()
			}
		})
		.sum();
	total / probabilities.len().to_f64().unwrap()
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

#[test]
fn test_mean_binomial_deviance() {
	let deviance = mean_binomial_deviance(&[0.5, 0.5], &[true, false]);
	assert!((deviance - 2.0 * std::f64::consts::LN_2).abs() < 1e-12);
	assert_eq!(mean_binomial_deviance(&[], &[]), 0.0);
}

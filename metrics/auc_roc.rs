use num_traits::ToPrimitive;

/// This function computes the area under the receiver operating characteristic curve using the trapezoid method.
pub fn auc_roc(probabilities: &[f32], labels: &[bool]) -> f32 {
	let roc_curve = compute_roc_curve(probabilities, labels);
	// compute the riemann sum of the roc curve
	roc_curve
		.windows(2)
		.map(|window| {
			let left = &window[0];
			let right = &window[1];
			let y_average = (left.true_positive_rate + right.true_positive_rate) / 2.0;
			let dx = right.false_positive_rate - left.false_positive_rate;
			y_average * dx
		})
		.sum()
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RocCurvePoint {
	/// The classification threshold. An example is predicted present when its probability is >= the threshold.
	pub threshold: f32,
	/// The true positive rate for all predictions with probability >= threshold.
	pub true_positive_rate: f32,
	/// The false positive rate for all predictions with probability >= threshold.
	pub false_positive_rate: f32,
}

/**
This function computes the ROC curve. The ROC curve plots the false positive rate on the x axis and the true positive rate on the y axis for every distinct probability in `probabilities`, from the highest to the lowest. The first point is always (0, 0) with a dummy threshold of 1.0. Non-finite probabilities are ignored.
*/
pub fn compute_roc_curve(probabilities: &[f32], labels: &[bool]) -> Vec<RocCurvePoint> {
	let mut tps_fps = compute_tps_fps_by_threshold(probabilities, labels);
	for i in 1..tps_fps.len() {
		tps_fps[i].true_positives += tps_fps[i - 1].true_positives;
		tps_fps[i].false_positives += tps_fps[i - 1].false_positives;
	}
	let (count_positives, count_negatives) = tps_fps
		.last()
		.map(|last| (last.true_positives, last.false_positives))
		.unwrap_or((0, 0));
	let count_positives = count_positives.to_f32().unwrap();
	let count_negatives = count_negatives.to_f32().unwrap();
	let mut roc_curve = vec![RocCurvePoint {
		threshold: 1.0,
		true_positive_rate: 0.0,
		false_positive_rate: 0.0,
	}];
	roc_curve.extend(tps_fps.iter().map(|point| RocCurvePoint {
		threshold: point.threshold,
		true_positive_rate: point.true_positives.to_f32().unwrap() / count_positives,
		false_positive_rate: point.false_positives.to_f32().unwrap() / count_negatives,
	}));
	roc_curve
}

#[derive(Debug)]
pub(crate) struct TpsFpsPoint {
	/// The classification threshold, always finite.
	pub threshold: f32,
	/// The true positives for this threshold.
	pub true_positives: usize,
	/// The false positives for this threshold.
	pub false_positives: usize,
}

/**
This function computes the counts of true positives and false positives at each classification threshold. Unlike the roc curve, each point contains just the count of true positives and false positives at exactly this threshold instead of all values greater than or equal to this threshold.
*/
pub(crate) fn compute_tps_fps_by_threshold(
	probabilities: &[f32],
	labels: &[bool],
) -> Vec<TpsFpsPoint> {
	let mut probabilities_labels: Vec<(f32, bool)> = probabilities
		.iter()
		.zip(labels.iter())
		.filter(|(probability, _)| probability.is_finite())
		.map(|(probability, label)| (*probability, *label))
		.collect();
	probabilities_labels.sort_by(|a, b| b.0.total_cmp(&a.0));
	let mut tps_fps: Vec<TpsFpsPoint> = Vec::new();
	for (probability, label) in probabilities_labels {
		let tp = if label { 1 } else { 0 };
		match tps_fps.last_mut() {
			// if probability is same as the last one, add to the previous bucket
			Some(last) if last.threshold == probability => {
				last.true_positives += tp;
				last.false_positives += 1 - tp;
			}
			_ => tps_fps.push(TpsFpsPoint {
				threshold: probability,
				true_positives: tp,
				false_positives: 1 - tp,
			}),
		}
	}
	tps_fps
}

#[test]
fn test_roc_curve() {
	let labels = vec![true, true, false, false];
	let probabilities = vec![0.9, 0.4, 0.4, 0.2];
	let left = compute_roc_curve(probabilities.as_slice(), labels.as_slice());
	let right = vec![
		RocCurvePoint {
			threshold: 1.0,
			true_positive_rate: 0.0,
			false_positive_rate: 0.0,
		},
		RocCurvePoint {
			threshold: 0.9,
			true_positive_rate: 0.5,
			false_positive_rate: 0.0,
		},
		RocCurvePoint {
			threshold: 0.4,
			true_positive_rate: 1.0,
			false_positive_rate: 0.5,
		},
		RocCurvePoint {
			threshold: 0.2,
			true_positive_rate: 1.0,
			false_positive_rate: 1.0,
		},
	];
	assert_eq!(left, right);
	let auc = auc_roc(probabilities.as_slice(), labels.as_slice());
	assert!(f32::abs(auc - 0.875) < f32::EPSILON)
}

#[test]
fn test_auc_roc_perfect_and_inverted() {
	let labels = [true, true, false, false];
	assert!((auc_roc(&[0.9, 0.8, 0.2, 0.1], &labels) - 1.0).abs() < f32::EPSILON);
	assert!(auc_roc(&[0.1, 0.2, 0.8, 0.9], &labels).abs() < f32::EPSILON);
}

#[test]
fn test_roc_curve_ignores_nan() {
	let curve = compute_roc_curve(&[0.7, f32::NAN, 0.3], &[true, true, false]);
	assert_eq!(curve.len(), 3);
	assert!((curve[2].true_positive_rate - 1.0).abs() < f32::EPSILON);
}

/*!
This module applies a trained variable to every pixel of a covariate grid. The output has one probability band per base model, then the stacked band, and a mask derived from the stacked band and the threshold.
*/

use crate::classifier::{compute_base_predictions, Algorithm, Classifier, StackedClassifier};
use crate::Error;
use covermap_grid::{CovariateGrid, Crs};
use covermap_util::progress_counter::ProgressCounter;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rayon::prelude::*;

/// Mask value for pixels with a no-data covariate.
pub const MASK_NODATA: u8 = 255;

/// Everything needed to map one target variable.
#[derive(Debug)]
pub struct TrainedVariable {
	pub name: String,
	/// The covariate names in the order the models were trained with.
	pub feature_schema: Vec<String>,
	pub crs: Option<Crs>,
	pub base_models: Vec<Box<dyn Classifier>>,
	pub stacked: StackedClassifier,
	pub threshold: f32,
}

/// A trained variable classifies raw covariate rows with its stacked model and labels them with its own threshold.
impl Classifier for TrainedVariable {
	fn algorithm(&self) -> Algorithm {
		Algorithm::Stacked
	}

	fn predict_probability(&self, features: ArrayView2<f32>) -> Array1<f32> {
		let base_predictions = compute_base_predictions(&self.base_models, features);
		self.stacked.predict_probability(base_predictions.view())
	}

	fn predict_label(&self, features: ArrayView2<f32>) -> Array1<bool> {
		let base_predictions = compute_base_predictions(&self.base_models, features);
		self.stacked.predict_label(base_predictions.view(), self.threshold)
	}
}

#[derive(Clone, Debug)]
pub struct SpatialMap {
	/// The base algorithm names in stacking order, then `stacked`.
	pub band_names: Vec<String>,
	/// (n_bands, n_rows, n_cols). No-data pixels are NaN in every band.
	pub probabilities: Array3<f32>,
	/// 1 where the stacked probability is at least the threshold, 0 where it is below, and `MASK_NODATA` for no-data pixels.
	pub mask: Array2<u8>,
}

impl SpatialMap {
	pub fn stacked(&self) -> ArrayView2<f32> {
		let last = self.probabilities.len_of(Axis(0)) - 1;
		self.probabilities.index_axis(Axis(0), last)
	}

	/// The fraction of pixels with data that the mask marks present.
	pub fn presence_fraction(&self) -> f32 {
		let n_present = self.mask.iter().filter(|value| **value == 1).count();
		let n_valid = self.mask.iter().filter(|value| **value != MASK_NODATA).count();
		if n_valid == 0 {
			0.0
		} else {
			n_present.to_f32().unwrap() / n_valid.to_f32().unwrap()
		}
	}
}

/// Threshold stacked probabilities into a mask. NaN probabilities become `MASK_NODATA`.
pub fn compute_mask(stacked: ArrayView2<f32>, threshold: f32) -> Array2<u8> {
	stacked.mapv(|probability| {
		if probability.is_nan() {
			MASK_NODATA
		} else if probability >= threshold {
			1
		} else {
			0
		}
	})
}

/**
Predict every pixel of `grid`. The grid's band names must equal the variable's feature schema, in order, and if both coordinate reference systems are known they must be equal.

Rows are predicted in parallel and `progress_counter` is incremented once per finished row.
*/
pub fn predict_grid(
	variable: &TrainedVariable,
	grid: &CovariateGrid,
	progress_counter: &ProgressCounter,
) -> Result<SpatialMap, Error> {
	if grid.band_names() != variable.feature_schema.as_slice() {
		return Err(Error::Shape(format!(
			"the grid bands [{}] do not match the covariates [{}] of {}",
			grid.band_names().join(", "),
			variable.feature_schema.join(", "),
			variable.name
		)));
	}
	if let (Some(grid_crs), Some(model_crs)) = (grid.crs(), variable.crs) {
		if grid_crs != model_crs {
			return Err(Error::Data(format!(
				"the grid is in {} but {} was trained in {}",
				grid_crs, variable.name, model_crs
			)));
		}
	}
	let (n_rows, n_cols) = (grid.n_rows(), grid.n_cols());
	let n_base = variable.base_models.len();
	let rows: Vec<Array2<f32>> = (0..n_rows)
		.into_par_iter()
		.map(|row| {
			let row_probabilities = predict_row(variable, grid, row);
			progress_counter.inc(1);
			row_probabilities
		})
		.collect();
	let mut probabilities = Array3::from_elem((n_base + 1, n_rows, n_cols), std::f32::NAN);
	for (row, row_probabilities) in rows.iter().enumerate() {
		probabilities
			.slice_mut(s![.., row, ..])
			.assign(&row_probabilities.t());
	}
	let mask = compute_mask(probabilities.index_axis(Axis(0), n_base), variable.threshold);
	let mut band_names: Vec<String> = variable
		.base_models
		.iter()
		.map(|model| model.algorithm().to_string())
		.collect();
	band_names.push(Algorithm::Stacked.to_string());
	Ok(SpatialMap {
		band_names,
		probabilities,
		mask,
	})
}

/// Returns (n_cols, n_base + 1) probabilities for one grid row.
fn predict_row(variable: &TrainedVariable, grid: &CovariateGrid, row: usize) -> Array2<f32> {
	let n_cols = grid.n_cols();
	let n_base = variable.base_models.len();
	let mut features = Array2::zeros((n_cols, grid.n_bands()));
	grid.row_features(row, features.view_mut());
	let valid: Vec<usize> = features
		.axis_iter(Axis(0))
		.enumerate()
		.filter(|(_, pixel)| pixel.iter().all(|value| value.is_finite()))
		.map(|(col, _)| col)
		.collect();
	let mut output = Array2::from_elem((n_cols, n_base + 1), std::f32::NAN);
	if valid.is_empty() {
		return output;
	}
	let valid_features = features.select(Axis(0), &valid);
	let base_predictions = compute_base_predictions(&variable.base_models, valid_features.view());
	let stacked = variable
		.stacked
		.predict_probability(base_predictions.view());
	for (index, col) in valid.iter().enumerate() {
		output
			.slice_mut(s![*col, ..n_base])
			.assign(&base_predictions.row(index));
		output[[*col, n_base]] = stacked[index];
	}
	output
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::classifier::{Algorithm, GlmClassifier};
	use covermap_grid::GeoTransform;
	use covermap_linear::ElasticNet;

	fn variable() -> TrainedVariable {
		// The glm is trained on a single covariate that marks presence above 0.5.
		let features = Array2::from_shape_vec(
			(8, 1),
			vec![0.0, 0.1, 0.2, 0.6, 0.4, 0.7, 0.8, 0.9],
		)
		.unwrap();
		let labels = [false, false, false, false, true, true, true, true];
		let names = vec!["ndvi".to_owned()];
		let glm = GlmClassifier::train(features.view(), &labels, &names, false).unwrap();
		TrainedVariable {
			name: "CRP".to_owned(),
			feature_schema: names,
			crs: Some(Crs {
				epsg: 32736,
				geographic: false,
			}),
			base_models: vec![Box::new(glm)],
			stacked: StackedClassifier {
				algorithms: vec![Algorithm::Glm],
				model: ElasticNet {
					alpha: 1.0,
					lambda: 0.0,
					intercept: -2.0,
					coefficients: vec![4.0],
				},
			},
			threshold: 0.5,
		}
	}

	fn grid(band_name: &str, epsg: u16) -> CovariateGrid {
		let values = Array3::from_shape_vec(
			(1, 2, 3),
			vec![0.05, 0.5, 0.95, std::f32::NAN, 0.3, 0.85],
		)
		.unwrap();
		CovariateGrid::new(
			vec![band_name.to_owned()],
			values,
			GeoTransform::new(0.0, 20.0, 10.0, 10.0),
			Some(Crs {
				epsg,
				geographic: false,
			}),
		)
		.unwrap()
	}

	#[test]
	fn test_predict_grid() {
		let variable = variable();
		let counter = ProgressCounter::new(2);
		let map = predict_grid(&variable, &grid("ndvi", 32736), &counter).unwrap();
		assert_eq!(counter.get(), 2);
		assert_eq!(map.band_names, vec!["glm", "stacked"]);
		assert_eq!(map.probabilities.dim(), (2, 2, 3));
		assert!(map.probabilities.slice(s![.., 1, 0]).iter().all(|p| p.is_nan()));
		let stacked = map.stacked();
		assert!(stacked
			.iter()
			.filter(|p| !p.is_nan())
			.all(|p| (0.0..=1.0).contains(p)));
		assert!(stacked[[0, 2]] > stacked[[0, 0]]);
		assert_eq!(map.mask[[1, 0]], MASK_NODATA);
		assert_eq!(map.mask[[0, 0]], 0);
		assert_eq!(map.mask[[0, 2]], 1);
		let pixels = array![[0.05f32], [0.95]];
		let probabilities = variable.predict_probability(pixels.view());
		assert!((probabilities[0] - stacked[[0, 0]]).abs() < 1e-6);
		assert!((probabilities[1] - stacked[[0, 2]]).abs() < 1e-6);
		assert_eq!(variable.predict_label(pixels.view()), array![false, true]);
		assert_eq!(variable.algorithm(), Algorithm::Stacked);
		let again =
			predict_grid(&variable, &grid("ndvi", 32736), &ProgressCounter::new(2)).unwrap();
		assert_eq!(again.mask, map.mask);
	}

	#[test]
	fn test_mask_area_does_not_grow_with_threshold() {
		let stacked = array![[0.1, 0.4, std::f32::NAN], [0.5, 0.7, 0.95]];
		let mut previous = usize::MAX;
		for threshold in [0.0, 0.3, 0.5, 0.6, 0.9, 1.0].iter() {
			let mask = compute_mask(stacked.view(), *threshold);
			let area = mask.iter().filter(|value| **value == 1).count();
			assert!(area <= previous);
			assert_eq!(mask[[0, 2]], MASK_NODATA);
			previous = area;
		}
		assert_eq!(compute_mask(stacked.view(), 0.5)[[1, 0]], 1);
	}

	#[test]
	fn test_schema_and_crs_mismatch() {
		let variable = variable();
		let counter = ProgressCounter::new(2);
		let error = predict_grid(&variable, &grid("elevation", 32736), &counter).unwrap_err();
		assert!(matches!(error, Error::Shape(_)));
		let error = predict_grid(&variable, &grid("ndvi", 4326), &counter).unwrap_err();
		assert!(matches!(error, Error::Data(_)));
	}
}

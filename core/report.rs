/*!
The run report, written as `report.json` next to the output rasters.
*/

use crate::classifier::Algorithm;
use crate::config::ValidationStrategy;
use crate::evaluate::Evaluation;
use covermap_grid::{CovariateGrid, GeoTransform};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Clone, Debug, serde::Serialize)]
pub struct Report {
	pub seed: u64,
	pub train_fraction: f32,
	pub grid: GridSummary,
	pub variables: Vec<VariableReport>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct GridSummary {
	pub band_names: Vec<String>,
	pub n_rows: usize,
	pub n_cols: usize,
	pub transform: GeoTransform,
	/// For example `EPSG:32736`, or `None` if the covariates carry no key directory.
	pub crs: Option<String>,
}

impl GridSummary {
	pub fn new(grid: &CovariateGrid) -> GridSummary {
		GridSummary {
			band_names: grid.band_names().to_vec(),
			n_rows: grid.n_rows(),
			n_cols: grid.n_cols(),
			transform: *grid.transform(),
			crs: grid.crs().map(|crs| crs.to_string()),
		}
	}
}

/// The outcome of one target variable. When `skipped` is set, the sections after the failing stage are absent.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct VariableReport {
	pub name: String,
	pub counts: Option<SampleCounts>,
	pub base_models: Vec<BaseModelReport>,
	pub stacking: Option<StackingReport>,
	pub evaluation: Option<Evaluation>,
	pub outputs: Option<OutputReport>,
	pub skipped: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct SampleCounts {
	pub n_samples: usize,
	pub n_missing_label: usize,
	/// Rows with a label but a no-data covariate, including rows outside the grid.
	pub n_missing_covariate: usize,
	pub n_train_present: usize,
	pub n_train_absent: usize,
	pub n_test_present: usize,
	pub n_test_absent: usize,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "status")]
pub enum BaseModelReport {
	#[serde(rename = "trained")]
	Trained {
		algorithm: Algorithm,
		validation: ValidationStrategy,
		n_candidates: usize,
		hyperparameters: BTreeMap<String, f64>,
		resampled_auc: f32,
		test_auc: f32,
		test_cross_entropy: Option<f32>,
		/// The covariates kept by stepwise selection.
		selected_covariates: Option<Vec<String>>,
		/// The fraction of branch nodes that split on each covariate.
		feature_importances: Option<BTreeMap<String, f32>>,
	},
	#[serde(rename = "failed")]
	Failed {
		algorithm: Algorithm,
		validation: ValidationStrategy,
		message: String,
	},
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct StackingReport {
	pub alpha: f64,
	pub lambda: f64,
	pub intercept: f64,
	pub coefficients: Vec<StackingCoefficient>,
	pub mean_deviance: f64,
	pub n_folds: usize,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct StackingCoefficient {
	pub algorithm: Algorithm,
	pub coefficient: f64,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct OutputReport {
	pub probability_path: PathBuf,
	pub mask_path: PathBuf,
	pub presence_fraction: f32,
}

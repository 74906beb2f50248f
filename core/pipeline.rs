/*!
This module runs the whole workflow: load the samples and the covariate grid, then for each target variable split the samples, train the base classifier set, stack, evaluate, and map.
*/

use crate::classifier::Classifier;
use crate::config::Config;
use crate::evaluate::{cross_entropy, evaluate};
use crate::predict::{predict_grid, TrainedVariable, MASK_NODATA};
use crate::progress::Progress;
use crate::report::{
	BaseModelReport, GridSummary, OutputReport, Report, SampleCounts, StackingCoefficient,
	StackingReport, VariableReport,
};
use crate::stack::{train_stacked_classifier, StackingOptions};
use crate::train::train_base_models;
use crate::Error;
use covermap_dataframe::{stratified_split, FromCsvOptions, SampleTable, TargetColumn};
use covermap_grid::{write_f32_pages, write_u8, CovariateGrid, Page};
use covermap_metrics::auc_roc;
use covermap_util::progress_counter::ProgressCounter;
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::path::{Path, PathBuf};

/// Command line overrides of the config.
#[derive(Clone, Debug)]
pub struct RunOptions {
	pub output_dir: Option<PathBuf>,
	pub seed: Option<u64>,
	/// If false, the models are trained and evaluated but no rasters are written.
	pub write_rasters: bool,
}

impl Default for RunOptions {
	fn default() -> Self {
		Self {
			output_dir: None,
			seed: None,
			write_rasters: true,
		}
	}
}

pub const REPORT_FILE_NAME: &str = "report.json";

/**
Run the workflow and write `report.json` to the output directory.

Unreadable inputs, an invalid config, and a sample coordinate system that differs from the grid's are returned as errors. Any other failure of a target variable is logged, recorded in the report, and the run continues with the next variable.
*/
pub fn run(
	config: &Config,
	options: &RunOptions,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<Report, Error> {
	config.validate()?;
	let seed = options.seed.unwrap_or_else(|| config.seed());
	let output_dir = options
		.output_dir
		.clone()
		.unwrap_or_else(|| config.output_dir());
	update_progress(Progress::LoadingSamples(config.samples.path.clone()));
	let table = load_samples(config)?;
	update_progress(Progress::LoadingCovariates(config.covariates.len()));
	let grid = CovariateGrid::from_sources(&config.covariates)?;
	check_crs(config, &grid)?;
	// Covariates are extracted once and shared by every target variable.
	let features = grid.sample_points(&table.x, &table.y);
	log::info!(
		"extracted {} covariates at {} sample locations",
		grid.n_bands(),
		table.nrows()
	);
	std::fs::create_dir_all(&output_dir)?;
	let context = VariableContext {
		config,
		grid: &grid,
		features: features.view(),
		seed,
		output_dir: &output_dir,
		write_rasters: options.write_rasters,
	};
	let mut variables = Vec::new();
	for target in table.targets.iter() {
		let mut report = VariableReport {
			name: target.name.clone(),
			..Default::default()
		};
		update_progress(Progress::Training(target.name.clone()));
		if let Err(error) = run_variable(&context, target, &mut report, update_progress) {
			log::warn!("skipping {}: {}", target.name, error);
			report.skipped = Some(error.to_string());
		}
		variables.push(report);
	}
	let report = Report {
		seed,
		train_fraction: config.train_fraction(),
		grid: GridSummary::new(&grid),
		variables,
	};
	let report_path = output_dir.join(REPORT_FILE_NAME);
	update_progress(Progress::Writing(report_path.clone()));
	std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
	Ok(report)
}

/// A summary of the inputs, without training anything.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Inspection {
	pub grid: GridSummary,
	pub n_samples: usize,
	/// Samples whose location has a no-data covariate or lies outside the grid.
	pub n_samples_without_covariates: usize,
	pub targets: Vec<TargetSummary>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct TargetSummary {
	pub name: String,
	pub n_present: usize,
	pub n_absent: usize,
	pub n_missing: usize,
}

pub fn inspect(config: &Config) -> Result<Inspection, Error> {
	config.validate()?;
	let table = load_samples(config)?;
	let grid = CovariateGrid::from_sources(&config.covariates)?;
	check_crs(config, &grid)?;
	let features = grid.sample_points(&table.x, &table.y);
	let n_samples_without_covariates = features
		.axis_iter(Axis(0))
		.filter(|row| row.iter().any(|value| !value.is_finite()))
		.count();
	Ok(Inspection {
		grid: GridSummary::new(&grid),
		n_samples: table.nrows(),
		n_samples_without_covariates,
		targets: table
			.targets
			.iter()
			.map(|target| TargetSummary {
				name: target.name.clone(),
				n_present: target.n_present(),
				n_absent: target.n_absent(),
				n_missing: target.n_missing(),
			})
			.collect(),
	})
}

fn load_samples(config: &Config) -> Result<SampleTable, Error> {
	let samples = &config.samples;
	let table = SampleTable::from_path(
		&samples.path,
		FromCsvOptions {
			x_column: samples.x_column.as_deref().unwrap_or("x"),
			y_column: samples.y_column.as_deref().unwrap_or("y"),
			target_columns: samples.targets.as_deref(),
			..Default::default()
		},
	)?;
	log::info!(
		"read {} samples with targets [{}] from {}",
		table.nrows(),
		table
			.targets
			.iter()
			.map(|target| target.name.as_str())
			.collect::<Vec<_>>()
			.join(", "),
		samples.path.display()
	);
	Ok(table)
}

fn check_crs(config: &Config, grid: &CovariateGrid) -> Result<(), Error> {
	if let (Some(epsg), Some(crs)) = (config.samples.crs_epsg, grid.crs()) {
		if epsg != crs.epsg {
			return Err(Error::Data(format!(
				"the samples are in EPSG:{} but the covariates are in {}",
				epsg, crs
			)));
		}
	}
	Ok(())
}

struct VariableContext<'a> {
	config: &'a Config,
	grid: &'a CovariateGrid,
	features: ArrayView2<'a, f32>,
	seed: u64,
	output_dir: &'a Path,
	write_rasters: bool,
}

fn run_variable(
	context: &VariableContext,
	target: &TargetColumn,
	report: &mut VariableReport,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<(), Error> {
	let config = context.config;
	let column_names = context.grid.band_names().to_vec();

	// Keep the rows with a label and a value for every covariate.
	let labeled: Vec<usize> = (0..target.labels.len())
		.filter(|row| target.labels[*row].is_some())
		.collect();
	for (column_name, column) in column_names
		.iter()
		.zip(context.features.axis_iter(Axis(1)))
	{
		if !labeled.is_empty() && labeled.iter().all(|row| !column[*row].is_finite()) {
			return Err(Error::Shape(format!(
				"covariate \"{}\" is missing at every sample location",
				column_name
			)));
		}
	}
	let rows: Vec<usize> = labeled
		.iter()
		.cloned()
		.filter(|row| context.features.row(*row).iter().all(|value| value.is_finite()))
		.collect();
	let labels: Vec<bool> = rows
		.iter()
		.map(|row| target.labels[*row] == Some(true))
		.collect();
	let features = context.features.select(Axis(0), &rows);

	let split = stratified_split(&labels, config.train_fraction(), context.seed);
	let train_features = features.select(Axis(0), &split.train);
	let train_labels: Vec<bool> = split.train.iter().map(|i| labels[*i]).collect();
	let test_features = features.select(Axis(0), &split.test);
	let test_labels: Vec<bool> = split.test.iter().map(|i| labels[*i]).collect();
	let count = |labels: &[bool], class: bool| {
		labels.iter().filter(|label| **label == class).count()
	};
	report.counts = Some(SampleCounts {
		n_samples: target.labels.len(),
		n_missing_label: target.labels.len() - labeled.len(),
		n_missing_covariate: labeled.len() - rows.len(),
		n_train_present: count(&train_labels, true),
		n_train_absent: count(&train_labels, false),
		n_test_present: count(&test_labels, true),
		n_test_absent: count(&test_labels, false),
	});
	log::info!(
		"{}: {} train and {} test rows",
		target.name,
		train_labels.len(),
		test_labels.len()
	);

	// Train the base classifier set and score each model on the Test split.
	let outputs = train_base_models(
		&target.name,
		&config.algorithms(),
		train_features.view(),
		&train_labels,
		&column_names,
		context.seed,
	);
	let mut base_models: Vec<Box<dyn Classifier>> = Vec::new();
	for output in outputs.into_iter() {
		match output.result {
			Ok(trained) => {
				let probabilities = trained.model.predict_probability(test_features.view());
				let probabilities = probabilities.to_vec();
				let test_auc = auc_roc(&probabilities, &test_labels);
				let selected_covariates = trained.model.selected_features().map(|features| {
					features
						.iter()
						.map(|index| column_names[*index].clone())
						.collect()
				});
				let feature_importances = trained.model.feature_importances().map(|importances| {
					izip!(column_names.iter().cloned(), importances.iter().cloned()).collect()
				});
				report.base_models.push(BaseModelReport::Trained {
					algorithm: output.algorithm,
					validation: output.validation,
					n_candidates: trained.n_candidates,
					hyperparameters: trained.hyperparameters,
					resampled_auc: trained.resampled_auc,
					test_auc,
					test_cross_entropy: cross_entropy(&probabilities, &test_labels),
					selected_covariates,
					feature_importances,
				});
				base_models.push(trained.model);
			}
			Err(error) => report.base_models.push(BaseModelReport::Failed {
				algorithm: output.algorithm,
				validation: output.validation,
				message: error.to_string(),
			}),
		}
	}
	if base_models.is_empty() {
		return Err(Error::Fit("every base model failed".to_owned()));
	}

	// Stack on the held out base predictions and choose the threshold.
	update_progress(Progress::Stacking(target.name.clone()));
	let base_predictions =
		crate::classifier::compute_base_predictions(&base_models, test_features.view());
	let algorithms = base_models.iter().map(|model| model.algorithm()).collect();
	let stacking = train_stacked_classifier(
		base_predictions.view(),
		algorithms,
		&test_labels,
		&StackingOptions {
			alphas: config.stacking_alphas(),
			n_lambdas: config.stacking_n_lambdas(),
			lambda_min_ratio: config.stacking_lambda_min_ratio(),
			n_folds: config.stacking_n_folds(),
			seed: context.seed,
		},
	)?;
	let model = &stacking.classifier.model;
	report.stacking = Some(StackingReport {
		alpha: model.alpha,
		lambda: model.lambda,
		intercept: model.intercept,
		coefficients: stacking
			.classifier
			.algorithms
			.iter()
			.zip(model.coefficients.iter())
			.map(|(algorithm, coefficient)| StackingCoefficient {
				algorithm: *algorithm,
				coefficient: *coefficient,
			})
			.collect(),
		mean_deviance: stacking.mean_deviance,
		n_folds: stacking.n_folds,
	});
	let stacked_probabilities = stacking
		.classifier
		.predict_probability(base_predictions.view())
		.to_vec();
	let evaluation = evaluate(
		&stacked_probabilities,
		&test_labels,
		config.min_samples_per_class(),
	)?;
	log::info!(
		"{}: stacked test auc {:.4}, threshold {}",
		target.name,
		evaluation.auc,
		evaluation.threshold.threshold
	);
	let threshold = evaluation.threshold.threshold;
	report.evaluation = Some(evaluation);

	if !context.write_rasters {
		return Ok(());
	}
	let variable = TrainedVariable {
		name: target.name.clone(),
		feature_schema: column_names,
		crs: context.grid.crs(),
		base_models,
		stacked: stacking.classifier,
		threshold,
	};
	let progress_counter = ProgressCounter::new(context.grid.n_rows().to_u64().unwrap());
	update_progress(Progress::Predicting(
		target.name.clone(),
		progress_counter.clone(),
	));
	let map = predict_grid(&variable, context.grid, &progress_counter)?;
	let probability_path = context
		.output_dir
		.join(format!("{}_probability.tif", target.name));
	let mask_path = context.output_dir.join(format!("{}_mask.tif", target.name));
	update_progress(Progress::Writing(probability_path.clone()));
	let pages: Vec<Page> = map
		.band_names
		.iter()
		.zip(map.probabilities.axis_iter(Axis(0)))
		.map(|(name, values)| Page {
			name: name.clone(),
			values: values.to_owned(),
		})
		.collect();
	write_f32_pages(
		&probability_path,
		&pages,
		context.grid.transform(),
		context.grid.crs(),
	)?;
	update_progress(Progress::Writing(mask_path.clone()));
	write_u8(
		&mask_path,
		map.mask.view(),
		context.grid.transform(),
		context.grid.crs(),
		MASK_NODATA,
	)?;
	report.outputs = Some(OutputReport {
		probability_path,
		mask_path,
		presence_fraction: map.presence_fraction(),
	});
	Ok(())
}

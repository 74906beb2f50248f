/*!
This crate loads the point observations used to train covermap models. A [`SampleTable`](struct.SampleTable.html) holds the projected coordinates of every sample location and one presence/absence label column per target variable. The [`split`](split/index.html) module partitions the rows of a label column into stratified train/test sets and stratified cross validation folds.
*/

#![allow(clippy::tabs_in_doc_comments)]

use thiserror::Error;

pub mod load;
pub mod split;

pub use self::load::*;
pub use self::split::*;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
	/// The x coordinate of each sample, in the projected coordinate system of the covariate grid.
	pub x: Vec<f64>,
	/// The y coordinate of each sample.
	pub y: Vec<f64>,
	pub targets: Vec<TargetColumn>,
}

/// A `TargetColumn` holds one label per row. `Some(true)` is presence, `Some(false)` is absence, and `None` is a missing label.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetColumn {
	pub name: String,
	pub labels: Vec<Option<bool>>,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Csv(#[from] csv::Error),
	#[error("did not find column \"{0}\" among column names \"{1}\"")]
	MissingColumn(String, String),
	#[error("invalid value \"{value}\" in column \"{column}\" at row {row}")]
	InvalidValue {
		row: usize,
		column: String,
		value: String,
	},
	#[error("the sample table has no target columns")]
	NoTargets,
}

impl SampleTable {
	pub fn nrows(&self) -> usize {
		self.x.len()
	}

	pub fn target(&self, name: &str) -> Option<&TargetColumn> {
		self.targets.iter().find(|target| target.name == name)
	}
}

impl TargetColumn {
	pub fn n_present(&self) -> usize {
		self.labels.iter().filter(|label| **label == Some(true)).count()
	}

	pub fn n_absent(&self) -> usize {
		self.labels.iter().filter(|label| **label == Some(false)).count()
	}

	pub fn n_missing(&self) -> usize {
		self.labels.iter().filter(|label| label.is_none()).count()
	}
}

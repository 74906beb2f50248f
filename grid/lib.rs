/*!
This crate reads and writes the georeferenced rasters covermap works with. A [`CovariateGrid`](struct.CovariateGrid.html) holds a stack of named covariate bands that share dimensions, a [`GeoTransform`](struct.GeoTransform.html), and a [`Crs`](struct.Crs.html). Each band is read from a single band GeoTIFF. Probability maps are written as multi-page float GeoTIFFs and masks as byte GeoTIFFs.
*/

#![allow(clippy::tabs_in_doc_comments)]

use std::path::PathBuf;
use thiserror::Error;

mod covariate_grid;
mod geotiff;
mod geotransform;

pub use self::covariate_grid::{BandSource, CovariateGrid};
pub use self::geotiff::{read_band, read_f32_pages, write_f32_pages, write_u8, Band, Page};
pub use self::geotransform::{Crs, GeoTransform};

#[derive(Debug, Error)]
pub enum Error {
	#[error("{path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("{path}: {source}")]
	Tiff {
		path: PathBuf,
		source: tiff::TiffError,
	},
	#[error("{path}: {message}")]
	Format { path: PathBuf, message: String },
	#[error("band \"{band}\" does not match band \"{reference}\": {message}")]
	Mismatch {
		band: String,
		reference: String,
		message: String,
	},
	#[error("the grid has no bands")]
	Empty,
	#[error("expected {expected} band names but got {actual}")]
	Shape { expected: usize, actual: usize },
}

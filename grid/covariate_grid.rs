use super::{read_band, Crs, Error, GeoTransform};
use ndarray::prelude::*;
use std::path::PathBuf;

/// A `BandSource` names a covariate and the single band GeoTIFF it is read from.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BandSource {
	pub name: String,
	pub path: PathBuf,
}

/**
A `CovariateGrid` is a stack of covariate bands on a common raster. Every band has the same dimensions, geotransform, and coordinate reference system. No-data cells are NaN.

The band order is fixed when the grid is built, and the covariate vector of a pixel lists the band values in that order.
*/
#[derive(Clone, Debug)]
pub struct CovariateGrid {
	band_names: Vec<String>,
	/// (n_bands, n_rows, n_cols)
	values: Array3<f32>,
	transform: GeoTransform,
	crs: Option<Crs>,
}

impl CovariateGrid {
	pub fn new(
		band_names: Vec<String>,
		values: Array3<f32>,
		transform: GeoTransform,
		crs: Option<Crs>,
	) -> Result<CovariateGrid, Error> {
		if band_names.is_empty() {
			return Err(Error::Empty);
		}
		if band_names.len() != values.len_of(Axis(0)) {
			return Err(Error::Shape {
				expected: values.len_of(Axis(0)),
				actual: band_names.len(),
			});
		}
		Ok(CovariateGrid {
			band_names,
			values,
			transform,
			crs,
		})
	}

	/// Read one GeoTIFF per band. Every band must match the first in dimensions, geotransform, and coordinate reference system.
	pub fn from_sources(sources: &[BandSource]) -> Result<CovariateGrid, Error> {
		let first = sources.first().ok_or(Error::Empty)?;
		let reference = read_band(&first.path)?;
		let (n_rows, n_cols) = reference.values.dim();
		let mut values = Array3::<f32>::zeros((sources.len(), n_rows, n_cols));
		values.index_axis_mut(Axis(0), 0).assign(&reference.values);
		log::info!(
			"read covariate \"{}\" from {} ({} x {})",
			first.name,
			first.path.display(),
			n_rows,
			n_cols
		);
		for (band_index, source) in sources.iter().enumerate().skip(1) {
			let band = read_band(&source.path)?;
			let mismatch = |message: String| Error::Mismatch {
				band: source.name.clone(),
				reference: first.name.clone(),
				message,
			};
			if band.values.dim() != (n_rows, n_cols) {
				return Err(mismatch(format!(
					"dimensions {:?} differ from {:?}",
					band.values.dim(),
					(n_rows, n_cols)
				)));
			}
			if !band.transform.is_compatible(&reference.transform) {
				return Err(mismatch(format!(
					"geotransform {:?} differs from {:?}",
					band.transform, reference.transform
				)));
			}
			if band.crs != reference.crs {
				return Err(mismatch(format!(
					"coordinate reference system {:?} differs from {:?}",
					band.crs, reference.crs
				)));
			}
			values.index_axis_mut(Axis(0), band_index).assign(&band.values);
			log::info!("read covariate \"{}\" from {}", source.name, source.path.display());
		}
		let band_names = sources.iter().map(|source| source.name.clone()).collect();
		CovariateGrid::new(band_names, values, reference.transform, reference.crs)
	}

	pub fn band_names(&self) -> &[String] {
		&self.band_names
	}

	pub fn n_bands(&self) -> usize {
		self.band_names.len()
	}

	pub fn n_rows(&self) -> usize {
		self.values.len_of(Axis(1))
	}

	pub fn n_cols(&self) -> usize {
		self.values.len_of(Axis(2))
	}

	pub fn transform(&self) -> &GeoTransform {
		&self.transform
	}

	pub fn crs(&self) -> Option<Crs> {
		self.crs
	}

	/// Return the covariate vector of the pixel containing (x, y), or `None` if the point is outside the grid. No-data values are NaN.
	pub fn sample(&self, x: f64, y: f64) -> Option<Vec<f32>> {
		let (row, col) = self.transform.pixel(x, y, self.n_rows(), self.n_cols())?;
		Some(self.values.slice(s![.., row, col]).to_vec())
	}

	/// Extract the covariate vectors at many points. Rows for points outside the grid are all NaN.
	pub fn sample_points(&self, xs: &[f64], ys: &[f64]) -> Array2<f32> {
		let mut features = Array2::from_elem((xs.len(), self.n_bands()), std::f32::NAN);
		for (mut features, (x, y)) in features
			.axis_iter_mut(Axis(0))
			.zip(xs.iter().zip(ys.iter()))
		{
			if let Some(values) = self.sample(*x, *y) {
				features.assign(&ArrayView1::from(values.as_slice()));
			}
		}
		features
	}

	/// Copy the covariate vectors of every pixel in `row` into `features`, which has shape (n_cols, n_bands).
	pub fn row_features(&self, row: usize, mut features: ArrayViewMut2<f32>) {
		features.assign(&self.values.slice(s![.., row, ..]).t());
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{write_f32_pages, write_u8, Page};

	fn grid() -> CovariateGrid {
		let values = Array3::from_shape_vec(
			(2, 2, 3),
			vec![
				1.0, 2.0, 3.0, 4.0, 5.0, std::f32::NAN, //
				10.0, 20.0, 30.0, 40.0, 50.0, 60.0,
			],
		)
		.unwrap();
		CovariateGrid::new(
			vec!["ndvi".to_owned(), "elevation".to_owned()],
			values,
			GeoTransform::new(0.0, 20.0, 10.0, -10.0),
			None,
		)
		.unwrap()
	}

	#[test]
	fn test_sample() {
		let grid = grid();
		assert_eq!(grid.sample(15.0, 5.0), Some(vec![5.0, 50.0]));
		assert_eq!(grid.sample(35.0, 5.0), None);
		let missing = grid.sample(25.0, 5.0).unwrap();
		assert!(missing[0].is_nan());
		assert_eq!(missing[1], 60.0);
		let features = grid.sample_points(&[5.0, 100.0], &[15.0, 15.0]);
		assert_eq!(features.row(0), array![1.0, 10.0]);
		assert!(features.row(1).iter().all(|value| value.is_nan()));
	}

	#[test]
	fn test_row_features() {
		let grid = grid();
		let mut features = Array2::zeros((3, 2));
		grid.row_features(0, features.view_mut());
		assert_eq!(features, array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]]);
	}

	#[test]
	fn test_shape_mismatch() {
		let result = CovariateGrid::new(
			vec!["ndvi".to_owned()],
			Array3::zeros((2, 1, 1)),
			GeoTransform::new(0.0, 0.0, 1.0, -1.0),
			None,
		);
		assert!(matches!(
			result,
			Err(Error::Shape {
				expected: 2,
				actual: 1
			})
		));
	}

	#[test]
	fn test_from_sources() {
		let directory = tempfile::tempdir().unwrap();
		let transform = GeoTransform::new(0.0, 20.0, 10.0, -10.0);
		let crs = Some(Crs {
			epsg: 32736,
			geographic: false,
		});
		let ndvi = directory.path().join("ndvi.tif");
		let water = directory.path().join("water.tif");
		let shifted = directory.path().join("shifted.tif");
		let pages = vec![Page {
			name: "ndvi".to_owned(),
			values: array![[0.1f32, 0.2], [0.3, 0.4]],
		}];
		write_f32_pages(&ndvi, &pages, &transform, crs).unwrap();
		write_u8(&water, array![[0u8, 1], [255, 1]].view(), &transform, crs, 255).unwrap();
		write_u8(
			&shifted,
			array![[0u8, 1], [1, 1]].view(),
			&GeoTransform::new(5.0, 20.0, 10.0, -10.0),
			crs,
			255,
		)
		.unwrap();
		let sources = vec![
			BandSource {
				name: "ndvi".to_owned(),
				path: ndvi.clone(),
			},
			BandSource {
				name: "water".to_owned(),
				path: water,
			},
		];
		let grid = CovariateGrid::from_sources(&sources).unwrap();
		assert_eq!(grid.n_bands(), 2);
		assert_eq!(grid.crs(), crs);
		assert_eq!(grid.sample(15.0, 15.0), Some(vec![0.2, 1.0]));
		assert!(grid.sample(5.0, 5.0).unwrap()[1].is_nan());
		let sources = vec![
			BandSource {
				name: "ndvi".to_owned(),
				path: ndvi,
			},
			BandSource {
				name: "shifted".to_owned(),
				path: shifted,
			},
		];
		let error = CovariateGrid::from_sources(&sources).unwrap_err();
		assert!(matches!(error, Error::Mismatch { band, .. } if band == "shifted"));
	}
}

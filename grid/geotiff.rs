use super::{Crs, Error, GeoTransform};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
/// Key values at or above this are user defined rather than EPSG codes.
const USER_DEFINED: u16 = 32767;

/// A `Band` is a single raster band read from a GeoTIFF. No-data cells, including those matching the GDAL no-data value, are NaN.
#[derive(Clone, Debug)]
pub struct Band {
	/// (n_rows, n_cols)
	pub values: Array2<f32>,
	pub transform: GeoTransform,
	pub crs: Option<Crs>,
	pub nodata: Option<f64>,
}

/// A `Page` is one named page of a multi-page GeoTIFF. The name is stored in the ImageDescription tag.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
	pub name: String,
	pub values: Array2<f32>,
}

fn tiff_error(path: &Path) -> impl Fn(tiff::TiffError) -> Error + '_ {
	move |source| Error::Tiff {
		path: path.to_owned(),
		source,
	}
}

fn format_error(path: &Path, message: impl Into<String>) -> Error {
	Error::Format {
		path: path.to_owned(),
		message: message.into(),
	}
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, Error> {
	let file = File::open(path).map_err(|source| Error::Io {
		path: path.to_owned(),
		source,
	})?;
	let decoder = Decoder::new(BufReader::new(file)).map_err(tiff_error(path))?;
	Ok(decoder.with_limits(Limits::unlimited()))
}

/// Read the first page of a GeoTIFF. The raster must be north up and georeferenced with the ModelPixelScale and ModelTiepoint tags.
pub fn read_band(path: &Path) -> Result<Band, Error> {
	let mut decoder = open_decoder(path)?;
	let values = read_page_values(path, &mut decoder)?;
	let transform = read_transform(path, &mut decoder)?;
	let crs = read_crs(path, &mut decoder)?;
	let nodata = match find_tag(path, &mut decoder, GDAL_NODATA)? {
		Some(value) => {
			let text = value.into_string().map_err(tiff_error(path))?;
			let text = text.trim_matches(char::from(0)).trim();
			let nodata = text
				.parse::<f64>()
				.map_err(|_| format_error(path, format!("invalid no-data value \"{}\"", text)))?;
			Some(nodata)
		}
		None => None,
	};
	let mut values = values;
	if let Some(nodata) = nodata {
		if let Some(nodata) = nodata.to_f32() {
			values.mapv_inplace(|value| if value == nodata { std::f32::NAN } else { value });
		}
	}
	Ok(Band {
		values,
		transform,
		crs,
		nodata,
	})
}

/// Read every page of a GeoTIFF as `f32` values, with the page names from the ImageDescription tag.
pub fn read_f32_pages(path: &Path) -> Result<Vec<Page>, Error> {
	let mut decoder = open_decoder(path)?;
	let mut pages = Vec::new();
	loop {
		let name = match decoder.find_tag(Tag::ImageDescription).map_err(tiff_error(path))? {
			Some(value) => value.into_string().map_err(tiff_error(path))?,
			None => String::new(),
		};
		let values = read_page_values(path, &mut decoder)?;
		pages.push(Page {
			name: name.trim_matches(char::from(0)).to_owned(),
			values,
		});
		if !decoder.more_images() {
			break;
		}
		decoder.next_image().map_err(tiff_error(path))?;
	}
	Ok(pages)
}

fn find_tag(
	path: &Path,
	decoder: &mut Decoder<BufReader<File>>,
	tag: u16,
) -> Result<Option<tiff::decoder::ifd::Value>, Error> {
	decoder
		.find_tag(Tag::from_u16_exhaustive(tag))
		.map_err(tiff_error(path))
}

fn read_page_values(
	path: &Path,
	decoder: &mut Decoder<BufReader<File>>,
) -> Result<Array2<f32>, Error> {
	let (width, height) = decoder.dimensions().map_err(tiff_error(path))?;
	let (n_cols, n_rows) = (width.to_usize().unwrap(), height.to_usize().unwrap());
	let values: Vec<f32> = match decoder.read_image().map_err(tiff_error(path))? {
		DecodingResult::F32(buffer) => buffer,
		DecodingResult::F64(buffer) => cast(buffer),
		DecodingResult::U8(buffer) => cast(buffer),
		DecodingResult::U16(buffer) => cast(buffer),
		DecodingResult::U32(buffer) => cast(buffer),
		DecodingResult::I8(buffer) => cast(buffer),
		DecodingResult::I16(buffer) => cast(buffer),
		DecodingResult::I32(buffer) => cast(buffer),
		_ => return Err(format_error(path, "unsupported sample format")),
	};
	// Multi-sample pixels are not supported, so the buffer must hold one value per pixel.
	Array2::from_shape_vec((n_rows, n_cols), values)
		.map_err(|_| format_error(path, "expected a single band raster"))
}

fn cast<T: ToPrimitive>(buffer: Vec<T>) -> Vec<f32> {
	buffer
		.into_iter()
		.map(|value| value.to_f32().unwrap_or(std::f32::NAN))
		.collect()
}

fn read_transform(
	path: &Path,
	decoder: &mut Decoder<BufReader<File>>,
) -> Result<GeoTransform, Error> {
	if find_tag(path, decoder, MODEL_TRANSFORMATION)?.is_some() {
		return Err(format_error(
			path,
			"rasters georeferenced with a model transformation are not supported",
		));
	}
	let scale = find_tag(path, decoder, MODEL_PIXEL_SCALE)?
		.ok_or_else(|| format_error(path, "missing the ModelPixelScale tag"))?
		.into_f64_vec()
		.map_err(tiff_error(path))?;
	let tiepoint = find_tag(path, decoder, MODEL_TIEPOINT)?
		.ok_or_else(|| format_error(path, "missing the ModelTiepoint tag"))?
		.into_f64_vec()
		.map_err(tiff_error(path))?;
	if scale.len() < 2 || tiepoint.len() < 6 {
		return Err(format_error(path, "malformed georeferencing tags"));
	}
	// The tiepoint is [i, j, k, x, y, z] and the scale is [sx, sy, sz].
	let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
	let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
	Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs(path: &Path, decoder: &mut Decoder<BufReader<File>>) -> Result<Option<Crs>, Error> {
	let keys = match find_tag(path, decoder, GEO_KEY_DIRECTORY)? {
		Some(value) => value.into_u16_vec().map_err(tiff_error(path))?,
		None => return Ok(None),
	};
	Ok(parse_geo_keys(&keys))
}

/// Find the EPSG code in a GeoKeyDirectory. The directory is a header of four shorts, the last of which is the key count, followed by one (key, location, count, value) entry per key.
fn parse_geo_keys(keys: &[u16]) -> Option<Crs> {
	if keys.len() < 4 {
		return None;
	}
	let mut model_type = None;
	let mut geographic_type = None;
	let mut projected_type = None;
	for entry in keys[4..].chunks_exact(4).take(usize::from(keys[3])) {
		// Only values stored inline, with a location of zero, are EPSG codes.
		if entry[1] != 0 {
			continue;
		}
		match entry[0] {
			GT_MODEL_TYPE_KEY => model_type = Some(entry[3]),
			GEOGRAPHIC_TYPE_KEY => geographic_type = Some(entry[3]),
			PROJECTED_CS_TYPE_KEY => projected_type = Some(entry[3]),
			_ => {}
		}
	}
	let is_code = |code: &u16| *code > 0 && *code < USER_DEFINED;
	match (model_type, projected_type.filter(is_code), geographic_type.filter(is_code)) {
		(Some(MODEL_TYPE_GEOGRAPHIC), _, Some(epsg)) => Some(Crs {
			epsg,
			geographic: true,
		}),
		(_, Some(epsg), _) => Some(Crs {
			epsg,
			geographic: false,
		}),
		(_, None, Some(epsg)) => Some(Crs {
			epsg,
			geographic: true,
		}),
		_ => None,
	}
}

fn geo_keys(crs: Option<Crs>) -> Vec<u16> {
	let mut entries = vec![[GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA]];
	match crs {
		Some(Crs {
			epsg,
			geographic: true,
		}) => {
			entries.insert(0, [GT_MODEL_TYPE_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
			entries.push([GEOGRAPHIC_TYPE_KEY, 0, 1, epsg]);
		}
		Some(Crs {
			epsg,
			geographic: false,
		}) => {
			entries.insert(0, [GT_MODEL_TYPE_KEY, 0, 1, MODEL_TYPE_PROJECTED]);
			entries.push([PROJECTED_CS_TYPE_KEY, 0, 1, epsg]);
		}
		None => entries.insert(0, [GT_MODEL_TYPE_KEY, 0, 1, MODEL_TYPE_PROJECTED]),
	}
	// Version 1.1.0 followed by the key count.
	let mut keys = vec![1, 1, 0, entries.len().to_u16().unwrap()];
	keys.extend(entries.iter().flatten());
	keys
}

fn create(path: &Path) -> Result<TiffEncoder<BufWriter<File>>, Error> {
	let file = File::create(path).map_err(|source| Error::Io {
		path: path.to_owned(),
		source,
	})?;
	TiffEncoder::new(BufWriter::new(file)).map_err(tiff_error(path))
}

/// Write one `f32` page per entry of `pages`, each carrying the georeferencing tags, the page name, and a NaN no-data value.
pub fn write_f32_pages(
	path: &Path,
	pages: &[Page],
	transform: &GeoTransform,
	crs: Option<Crs>,
) -> Result<(), Error> {
	let mut encoder = create(path)?;
	for page in pages {
		let (n_rows, n_cols) = page.values.dim();
		let mut image = encoder
			.new_image::<colortype::Gray32Float>(n_cols.to_u32().unwrap(), n_rows.to_u32().unwrap())
			.map_err(tiff_error(path))?;
		write_geo_tags(path, image.encoder(), transform, crs, "nan")?;
		image
			.encoder()
			.write_tag(Tag::ImageDescription, page.name.as_str())
			.map_err(tiff_error(path))?;
		let data: Vec<f32> = page.values.iter().cloned().collect();
		image.write_data(&data).map_err(tiff_error(path))?;
	}
	Ok(())
}

/// Write a single `u8` page with the georeferencing tags and the given no-data value.
pub fn write_u8(
	path: &Path,
	values: ArrayView2<u8>,
	transform: &GeoTransform,
	crs: Option<Crs>,
	nodata: u8,
) -> Result<(), Error> {
	let mut encoder = create(path)?;
	let (n_rows, n_cols) = values.dim();
	let mut image = encoder
		.new_image::<colortype::Gray8>(n_cols.to_u32().unwrap(), n_rows.to_u32().unwrap())
		.map_err(tiff_error(path))?;
	write_geo_tags(path, image.encoder(), transform, crs, &nodata.to_string())?;
	let data: Vec<u8> = values.iter().cloned().collect();
	image.write_data(&data).map_err(tiff_error(path))?;
	Ok(())
}

fn write_geo_tags<W: std::io::Write + std::io::Seek, K: tiff::encoder::TiffKind>(
	path: &Path,
	encoder: &mut tiff::encoder::DirectoryEncoder<W, K>,
	transform: &GeoTransform,
	crs: Option<Crs>,
	nodata: &str,
) -> Result<(), Error> {
	let scale = [transform.pixel_width, -transform.pixel_height, 0.0];
	let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
	encoder
		.write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
		.map_err(tiff_error(path))?;
	encoder
		.write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
		.map_err(tiff_error(path))?;
	encoder
		.write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), geo_keys(crs).as_slice())
		.map_err(tiff_error(path))?;
	encoder
		.write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata)
		.map_err(tiff_error(path))?;
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_geo_keys() {
		let crs = Crs {
			epsg: 32736,
			geographic: false,
		};
		let keys = geo_keys(Some(crs));
		assert_eq!(
			keys,
			vec![1, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 32736]
		);
		assert_eq!(parse_geo_keys(&keys), Some(crs));
		let wgs84 = Crs {
			epsg: 4326,
			geographic: true,
		};
		assert_eq!(parse_geo_keys(&geo_keys(Some(wgs84))), Some(wgs84));
		assert_eq!(parse_geo_keys(&geo_keys(None)), None);
	}

	#[test]
	fn test_write_and_read_band() {
		let directory = tempfile::tempdir().unwrap();
		let path = directory.path().join("mask.tif");
		let transform = GeoTransform::new(300_000.0, 9_000_000.0, 30.0, -30.0);
		let crs = Some(Crs {
			epsg: 32736,
			geographic: false,
		});
		let values = array![[0u8, 1, 255], [1, 1, 0]];
		write_u8(&path, values.view(), &transform, crs, 255).unwrap();
		let band = read_band(&path).unwrap();
		assert_eq!(band.transform, transform);
		assert_eq!(band.crs, crs);
		assert_eq!(band.nodata, Some(255.0));
		assert_eq!(band.values.dim(), (2, 3));
		assert_eq!(band.values[[0, 1]], 1.0);
		assert!(band.values[[0, 2]].is_nan());
	}

	#[test]
	fn test_write_and_read_pages() {
		let directory = tempfile::tempdir().unwrap();
		let path = directory.path().join("probability.tif");
		let transform = GeoTransform::new(0.0, 20.0, 10.0, -10.0);
		let pages = vec![
			Page {
				name: "glm".to_owned(),
				values: array![[0.1f32, 0.2], [std::f32::NAN, 0.4]],
			},
			Page {
				name: "stacked".to_owned(),
				values: array![[0.5f32, 0.6], [std::f32::NAN, 0.8]],
			},
		];
		write_f32_pages(&path, &pages, &transform, None).unwrap();
		let read = read_f32_pages(&path).unwrap();
		assert_eq!(read.len(), 2);
		assert_eq!(read[0].name, "glm");
		assert_eq!(read[1].name, "stacked");
		assert_eq!(read[1].values[[1, 1]], 0.8);
		assert!(read[1].values[[1, 0]].is_nan());
		let band = read_band(&path).unwrap();
		assert_eq!(band.crs, None);
		assert!(band.nodata.unwrap().is_nan());
		assert_eq!(band.values[[0, 1]], 0.2);
	}
}

use num_traits::ToPrimitive;

/**
A `GeoTransform` maps pixel coordinates to map coordinates for a north-up raster:

```text
x = origin_x + col * pixel_width
y = origin_y + row * pixel_height
```

`pixel_height` is negative when row 0 is the northern edge.
*/
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct GeoTransform {
	/// The x coordinate of the upper left corner.
	pub origin_x: f64,
	/// The y coordinate of the upper left corner.
	pub origin_y: f64,
	pub pixel_width: f64,
	pub pixel_height: f64,
}

impl GeoTransform {
	pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> GeoTransform {
		GeoTransform {
			origin_x,
			origin_y,
			pixel_width,
			pixel_height,
		}
	}

	/// Return the (row, col) of the pixel containing (x, y), or `None` if the point falls outside a raster of `n_rows` by `n_cols`.
	pub fn pixel(&self, x: f64, y: f64, n_rows: usize, n_cols: usize) -> Option<(usize, usize)> {
		if !x.is_finite() || !y.is_finite() || self.pixel_width == 0.0 || self.pixel_height == 0.0 {
			return None;
		}
		let col = ((x - self.origin_x) / self.pixel_width).floor();
		let row = ((y - self.origin_y) / self.pixel_height).floor();
		if col < 0.0 || row < 0.0 {
			return None;
		}
		let (row, col) = (row.to_usize()?, col.to_usize()?);
		if row < n_rows && col < n_cols {
			Some((row, col))
		} else {
			None
		}
	}

	/// The map coordinates of the center of the pixel at (row, col).
	pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
		let x = self.origin_x + (col.to_f64().unwrap() + 0.5) * self.pixel_width;
		let y = self.origin_y + (row.to_f64().unwrap() + 0.5) * self.pixel_height;
		(x, y)
	}

	/// Two transforms are compatible when their coefficients agree to within a millionth of a pixel.
	pub fn is_compatible(&self, other: &GeoTransform) -> bool {
		let tolerance = 1e-6 * self.pixel_width.abs().max(self.pixel_height.abs());
		(self.origin_x - other.origin_x).abs() <= tolerance
			&& (self.origin_y - other.origin_y).abs() <= tolerance
			&& (self.pixel_width - other.pixel_width).abs() <= tolerance
			&& (self.pixel_height - other.pixel_height).abs() <= tolerance
	}
}

/// A `Crs` identifies a coordinate reference system by its EPSG code, as recorded in a GeoTIFF key directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Crs {
	pub epsg: u16,
	/// True for geographic (latitude/longitude) systems, false for projected systems.
	pub geographic: bool,
}

impl std::fmt::Display for Crs {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "EPSG:{}", self.epsg)
	}
}

use super::*;
use std::path::Path;

#[derive(Clone, Debug)]
pub struct FromCsvOptions<'a> {
	/// The name of the column holding the x coordinate of each sample.
	pub x_column: &'a str,
	/// The name of the column holding the y coordinate of each sample.
	pub y_column: &'a str,
	/// The label columns to load. If this is `None`, every other column whose values are all `Y`, `N`, or invalid is loaded as a target.
	pub target_columns: Option<&'a [String]>,
	/// Values that are treated as missing in both coordinate and label columns.
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			x_column: "x",
			y_column: "y",
			target_columns: None,
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

/// These values are the default values that are considered invalid.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "NA", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

const PRESENT: &str = "Y";
const ABSENT: &str = "N";

impl SampleTable {
	pub fn from_path(path: &Path, options: FromCsvOptions) -> Result<Self, Error> {
		Self::from_csv(&mut csv::Reader::from_path(path)?, options)
	}

	pub fn from_csv<R>(reader: &mut csv::Reader<R>, options: FromCsvOptions) -> Result<Self, Error>
	where
		R: std::io::Read,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.trim().to_owned())
			.collect();
		let find_column = |name: &str| {
			column_names
				.iter()
				.position(|column_name| column_name == name)
				.ok_or_else(|| Error::MissingColumn(name.to_owned(), column_names.join(", ")))
		};
		let x_column_index = find_column(options.x_column)?;
		let y_column_index = find_column(options.y_column)?;
		let records = reader.records().collect::<Result<Vec<_>, _>>()?;
		let is_invalid = |value: &str| options.invalid_values.contains(&value);

		// Determine which columns hold labels.
		let target_column_indexes: Vec<usize> = match options.target_columns {
			Some(target_columns) => target_columns
				.iter()
				.map(|name| find_column(name))
				.collect::<Result<_, _>>()?,
			None => (0..column_names.len())
				.filter(|index| *index != x_column_index && *index != y_column_index)
				.filter(|index| {
					let mut has_label = false;
					let all_labels = records.iter().all(|record| {
						let value = record.get(*index).unwrap_or("").trim();
						if value == PRESENT || value == ABSENT {
							has_label = true;
							true
						} else {
							is_invalid(value)
						}
					});
					all_labels && has_label
				})
				.collect(),
		};
		if target_column_indexes.is_empty() {
			return Err(Error::NoTargets);
		}

		let parse_coordinate = |row: usize, column_index: usize, value: &str| {
			let value = value.trim();
			if is_invalid(value) {
				return Ok(std::f64::NAN);
			}
			match value.parse::<f64>() {
				Ok(value) if value.is_finite() => Ok(value),
				_ => Err(Error::InvalidValue {
					row,
					column: column_names[column_index].clone(),
					value: value.to_owned(),
				}),
			}
		};
		let mut x = Vec::with_capacity(records.len());
		let mut y = Vec::with_capacity(records.len());
		let mut targets: Vec<TargetColumn> = target_column_indexes
			.iter()
			.map(|index| TargetColumn {
				name: column_names[*index].clone(),
				labels: Vec::with_capacity(records.len()),
			})
			.collect();
		for (record_index, record) in records.iter().enumerate() {
			// Rows are numbered from 1, not counting the header.
			let row = record_index + 1;
			x.push(parse_coordinate(
				row,
				x_column_index,
				record.get(x_column_index).unwrap_or(""),
			)?);
			y.push(parse_coordinate(
				row,
				y_column_index,
				record.get(y_column_index).unwrap_or(""),
			)?);
			for (target, column_index) in targets.iter_mut().zip(target_column_indexes.iter()) {
				let value = record.get(*column_index).unwrap_or("").trim();
				let label = match value {
					PRESENT => Some(true),
					ABSENT => Some(false),
					value if is_invalid(value) => None,
					value => {
						return Err(Error::InvalidValue {
							row,
							column: target.name.clone(),
							value: value.to_owned(),
						})
					}
				};
				target.labels.push(label);
			}
		}
		Ok(SampleTable { x, y, targets })
	}
}

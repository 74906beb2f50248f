use thiserror::Error;

/// The errors produced while training, evaluating, and mapping a target variable.
#[derive(Debug, Error)]
pub enum Error {
	#[error("data error: {0}")]
	Data(String),
	#[error("fit error: {0}")]
	Fit(String),
	#[error("shape error: {0}")]
	Shape(String),
	#[error("threshold error: {0}")]
	Threshold(String),
	#[error("config error: {0}")]
	Config(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Samples(#[from] covermap_dataframe::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Grid(#[from] covermap_grid::Error),
}

impl From<covermap_linear::Error> for Error {
	fn from(error: covermap_linear::Error) -> Error {
		Error::Fit(error.to_string())
	}
}

impl From<covermap_tree::Error> for Error {
	fn from(error: covermap_tree::Error) -> Error {
		Error::Fit(error.to_string())
	}
}

impl From<covermap_neural::Error> for Error {
	fn from(error: covermap_neural::Error) -> Error {
		Error::Fit(error.to_string())
	}
}

impl From<covermap_metrics::BalancedThresholdError> for Error {
	fn from(error: covermap_metrics::BalancedThresholdError) -> Error {
		Error::Threshold(error.to_string())
	}
}

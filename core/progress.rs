use covermap_util::progress_counter::ProgressCounter;
use std::path::PathBuf;

/// The stages of a run, passed to the `update_progress` callback of [`run`](../pipeline/fn.run.html).
#[derive(Debug)]
pub enum Progress {
	LoadingSamples(PathBuf),
	LoadingCovariates(usize),
	Training(String),
	Stacking(String),
	Predicting(String, ProgressCounter),
	Writing(PathBuf),
}

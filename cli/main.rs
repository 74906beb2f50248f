//! This module contains the main entrypoint to the covermap cli.

use self::progress_logger::ProgressLogger;
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use covermap_core::{Config, RunOptions};
use std::path::PathBuf;

mod progress_logger;

#[derive(Parser)]
#[clap(
	about = "Map land cover probabilities with an ensemble of classifiers.",
	disable_help_subcommand = true
)]
enum Options {
	#[clap(name = "run")]
	Run(RunArgs),
	#[clap(name = "inspect")]
	Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
#[clap(about = "train, evaluate, and map every target variable")]
struct RunArgs {
	#[clap(short, long, help = "the path to a config file")]
	config: PathBuf,
	#[clap(short, long, help = "the directory to write rasters and the report to")]
	output_dir: Option<PathBuf>,
	#[clap(long, help = "the seed for every split, fold, and model")]
	seed: Option<u64>,
	#[clap(
		long = "no-rasters",
		help = "skip writing probability and mask rasters",
		parse(from_flag = std::ops::Not::not)
	)]
	rasters: bool,
}

#[derive(Parser, Debug)]
#[clap(about = "summarize the samples and the covariate grid")]
struct InspectArgs {
	#[clap(short, long, help = "the path to a config file")]
	config: PathBuf,
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let options = Options::parse();
	let result = match options {
		Options::Run(args) => cli_run(args),
		Options::Inspect(args) => cli_inspect(args),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_run(args: RunArgs) -> Result<()> {
	let config = Config::from_path(&args.config)
		.with_context(|| format!("failed to load {}", args.config.display()))?;
	let options = RunOptions {
		output_dir: args.output_dir,
		seed: args.seed,
		write_rasters: args.rasters,
	};
	let mut progress_logger = ProgressLogger::new();
	let report = covermap_core::run(&config, &options, &mut |progress| {
		progress_logger.update(progress)
	});
	progress_logger.finish();
	let report = report?;
	for variable in report.variables.iter() {
		match (&variable.skipped, &variable.evaluation) {
			(Some(reason), _) => log::warn!("{}: skipped: {}", variable.name, reason),
			(None, Some(evaluation)) => log::info!(
				"{}: auc {:.4}, threshold {:.4}",
				variable.name,
				evaluation.auc,
				evaluation.threshold.threshold
			),
			(None, None) => {}
		}
	}
	let n_mapped = report
		.variables
		.iter()
		.filter(|variable| variable.skipped.is_none())
		.count();
	log::info!(
		"finished {} of {} target variables",
		n_mapped,
		report.variables.len()
	);
	Ok(())
}

fn cli_inspect(args: InspectArgs) -> Result<()> {
	let config = Config::from_path(&args.config)
		.with_context(|| format!("failed to load {}", args.config.display()))?;
	let inspection = covermap_core::inspect(&config)?;
	println!("{}", serde_json::to_string_pretty(&inspection)?);
	Ok(())
}

/*!
This crate trains and applies covermap's ensemble land cover classifiers.

For each target variable, the samples with a label and a full covariate vector are split into stratified Train and Test sets. Every configured base algorithm is tuned by resampling on the Train split and refitted on it ([`train`](train/index.html)). The base models' probabilities on the Test split are blended by an elastic net logistic regression ([`stack`](stack/index.html)), and the ROC curve of the blended Test probabilities gives a threshold that balances sensitivity and specificity ([`evaluate`](evaluate/index.html)). Finally every model is applied to every pixel of the covariate grid ([`predict`](predict/index.html)). [`pipeline::run`](pipeline/fn.run.html) ties these stages together.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod error;

pub mod classifier;
pub mod config;
pub mod evaluate;
pub mod grid;
pub mod pipeline;
pub mod predict;
pub mod progress;
pub mod report;
pub mod stack;
pub mod train;
pub mod validation;

pub use self::classifier::{Algorithm, Classifier, StackedClassifier};
pub use self::config::Config;
pub use self::error::Error;
pub use self::pipeline::{inspect, run, RunOptions};
pub use self::progress::Progress;

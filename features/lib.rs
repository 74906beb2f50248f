/*!
This crate turns raw covariate values into model features. Each covariate column is standardized with a [`NormalizedFeatureGroup`](struct.NormalizedFeatureGroup.html) fitted on the training rows, and a [`FeatureNormalizer`](struct.FeatureNormalizer.html) applies the same transformation to every row the model later sees, whether that is a held out sample or a grid pixel.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod normalized;

pub use self::normalized::{FeatureNormalizer, NormalizedFeatureGroup};

//! Codeforces rating prediction and problem recommendation.
//!
//! Submissions are summarized into a [`FeatureVector`], a regressor predicts
//! a rating from it, and [`recommend`](recommend::recommend) shortlists
//! unsolved problems around that rating.

pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod recommend;
pub mod source;
pub mod store;
pub mod table;
pub mod train;
pub mod types;

pub use error::PipelineError;
pub use features::FeatureVector;
pub use model::{Estimator, GbtRegressor};

use crate::{model::ModelError, source::FetchError, store::StoreError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures surfaced by the feature, training and recommendation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No accepted, rated submission to build features from.
    #[error("no rated solved problems found")]
    NoData,

    #[error("data not found for {key}")]
    DataUnavailable { key: String },

    #[error("empty data for {key}")]
    EmptyData { key: String },

    #[error("not enough data to train: {found} qualifying rows, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    #[error("failed to train model for {key}: {source}")]
    TrainingFailure {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to fetch {what}: {source}")]
    FetchFailure {
        what: String,
        #[source]
        source: FetchError,
    },

    /// The user's history gave no usable feature vector. An empty shortlist
    /// is not this error; it is an `Ok` with no entries.
    #[error("no recommendations for {handle}: {source}")]
    NoRecommendations {
        handle: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl PipelineError {
    pub fn training(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::TrainingFailure { key: key.into(), source: source.into() }
    }

    pub fn fetch(what: impl Into<String>, source: FetchError) -> Self {
        Self::FetchFailure { what: what.into(), source }
    }
}


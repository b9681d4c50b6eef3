//! Per-user and general model training over processed tables.

use crate::{
    config::TrainConfig,
    error::PipelineError,
    model::{Estimator, GbtParams, GbtRegressor},
    store::{self, BlobStore},
    table::ProcessedTable,
    types::TrainingExample,
};

/// Fits a fresh model on `handle`'s processed row and stores it under
/// `models/{handle}_rating_model.json`.
///
/// This is a single-example fit; the resulting model always predicts the
/// user's own target.
pub fn train_one<S: BlobStore + ?Sized>(
    store: &mut S,
    handle: &str,
    params: &GbtParams,
) -> Result<(), PipelineError> {
    let key = store::processed_key(handle);
    let bytes = store.get(&key)?.ok_or(PipelineError::DataUnavailable { key })?;
    let table = ProcessedTable::parse(&bytes).map_err(|e| PipelineError::training(handle, e))?;
    if table.is_empty() {
        return Err(PipelineError::EmptyData { key: handle.to_string() });
    }

    let features = table.features(0).map_err(|e| PipelineError::training(handle, e))?;
    let target = table.target(0).map_err(|e| PipelineError::training(handle, e))?;

    let mut model = GbtRegressor::new(params.clone());
    model
        .fit(&[features], &[target])
        .map_err(|e| PipelineError::training(handle, e))?;
    store::save_estimator(store, &store::user_model_key(handle), &model)
        .map_err(|e| PipelineError::training(handle, e))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PipelineError)>,
}

/// Runs [`train_one`] for every handle. A failing handle is logged and
/// recorded; the rest of the batch still runs.
pub fn train_batch<S, I, H>(store: &mut S, handles: I, params: &GbtParams) -> BatchReport
where
    S: BlobStore + ?Sized,
    I: IntoIterator<Item = H>,
    H: AsRef<str>,
{
    let mut report = BatchReport::default();
    for handle in handles {
        let handle = handle.as_ref();
        match train_one(store, handle, params) {
            Ok(()) => {
                tracing::info!("model trained and saved for {}", handle);
                report.succeeded.push(handle.to_string());
            }
            Err(e) => {
                tracing::warn!("failed to train model for {}: {}", handle, e);
                report.failed.push((handle.to_string(), e));
            }
        }
    }
    report
}

/// Collects every row of every processed table exposing all feature columns
/// and the target. Tables that cannot be read or parsed are skipped with a
/// warning.
pub fn load_training_set<S: BlobStore + ?Sized>(
    store: &S,
) -> Result<Vec<TrainingExample>, PipelineError> {
    let mut examples = Vec::new();
    for key in store.list(store::PROCESSED_DIR)? {
        if !key.ends_with(store::PROCESSED_SUFFIX) {
            continue;
        }
        let bytes = match store.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("error reading {}: {}", key, e);
                continue;
            }
        };
        let table = match ProcessedTable::parse(&bytes) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("error reading {}: {}", key, e);
                continue;
            }
        };
        if !table.is_training_table() {
            tracing::debug!("{} is missing required columns", key);
            continue;
        }
        match table.examples() {
            Ok(rows) => examples.extend(rows),
            Err(e) => tracing::warn!("error reading {}: {}", key, e),
        }
    }
    Ok(examples)
}

/// Fits one model across all users' examples. Refuses to train below
/// `cfg.min_general_rows` examples.
pub fn train_general(
    examples: &[TrainingExample],
    cfg: &TrainConfig,
) -> Result<GbtRegressor, PipelineError> {
    if examples.len() < cfg.min_general_rows {
        return Err(PipelineError::InsufficientData {
            found: examples.len(),
            required: cfg.min_general_rows,
        });
    }
    tracing::info!("loaded {} user data rows for training", examples.len());

    let (x, y): (Vec<_>, Vec<_>) = examples.iter().map(|e| (e.features, e.target)).unzip();
    let mut model = GbtRegressor::new(cfg.model.clone());
    model
        .fit(&x, &y)
        .map_err(|e| PipelineError::training("general", e))?;
    Ok(model)
}

/// Loads the training set, fits the general model and stores it.
pub fn train_and_save_general<S: BlobStore + ?Sized>(
    store: &mut S,
    cfg: &TrainConfig,
) -> Result<usize, PipelineError> {
    let examples = load_training_set(&*store)?;
    let model = train_general(&examples, cfg)?;
    store::save_estimator(store, store::GENERAL_MODEL_KEY, &model)
        .map_err(|e| PipelineError::training("general", e))?;
    tracing::info!("general model trained and saved to {}", store::GENERAL_MODEL_KEY);
    Ok(examples.len())
}

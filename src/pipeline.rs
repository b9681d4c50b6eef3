//! Fetch-and-process flow that feeds the trainers and the recommender.

use crate::{
    config::{FeatureConfig, PipelineConfig},
    error::PipelineError,
    features::{self, FeatureVector},
    source::{self, CodeforcesClient},
    store::{self, BlobStore},
    table,
    train::BatchReport,
    types::SubmissionRecord,
};

/// Downloads submissions and rating history for `handle` and caches the raw
/// bodies under `data/`.
pub async fn fetch_user<S: BlobStore + ?Sized>(
    client: &CodeforcesClient,
    store: &mut S,
    handle: &str,
) -> Result<(), PipelineError> {
    let rating = client
        .rating_raw(handle)
        .await
        .map_err(|e| PipelineError::fetch(format!("rating of {handle}"), e))?;
    store.put(&store::rating_key(handle), &rating)?;

    let submissions = client
        .submissions_raw(handle)
        .await
        .map_err(|e| PipelineError::fetch(format!("submissions of {handle}"), e))?;
    store.put(&store::submissions_key(handle), &submissions)?;
    Ok(())
}

/// Parsed submissions from the cached `user.status` body.
pub fn cached_submissions<S: BlobStore + ?Sized>(
    store: &S,
    handle: &str,
) -> Result<Vec<SubmissionRecord>, PipelineError> {
    let key = store::submissions_key(handle);
    let bytes = store.get(&key)?.ok_or(PipelineError::DataUnavailable { key })?;
    source::parse_submissions(&bytes)
        .map_err(|e| PipelineError::fetch(format!("submissions of {handle}"), e))
}

/// Turns cached raw data into `processed/{handle}_processed_data.csv`, with
/// the latest contest rating as the target.
pub fn process_user<S: BlobStore + ?Sized>(
    store: &mut S,
    handle: &str,
    cfg: &FeatureConfig,
) -> Result<FeatureVector, PipelineError> {
    let records = cached_submissions(&*store, handle)?;
    let features = features::extract(&records, cfg)?;

    let key = store::rating_key(handle);
    let bytes = store.get(&key)?.ok_or(PipelineError::DataUnavailable { key })?;
    let history = source::parse_rating_history(&bytes)
        .map_err(|e| PipelineError::fetch(format!("rating of {handle}"), e))?;
    let target = source::latest_rating(&history).ok_or_else(|| PipelineError::EmptyData {
        key: store::rating_key(handle),
    })?;

    let row = table::write_row(&features, f64::from(target))
        .map_err(|e| PipelineError::training(handle, e))?;
    store.put(&store::processed_key(handle), &row)?;
    tracing::debug!("processed {}: {:?} -> {}", handle, features, target);
    Ok(features)
}

/// Fetches and processes each handle in turn. The fixed pause follows every
/// handle, failed or not. Failures are logged per handle and do not stop the
/// batch.
pub async fn collect<S: BlobStore + ?Sized>(
    client: &CodeforcesClient,
    store: &mut S,
    handles: &[String],
    cfg: &PipelineConfig,
) -> BatchReport {
    let mut report = BatchReport::default();
    for handle in handles {
        let res = match fetch_user(client, store, handle).await {
            Ok(()) => process_user(store, handle, &cfg.features),
            Err(e) => Err(e),
        };
        client.pace().await;
        match res {
            Ok(_) => {
                tracing::info!("collected {}", handle);
                report.succeeded.push(handle.clone());
            }
            Err(e) => {
                tracing::warn!("skipping {}: {}", handle, e);
                report.failed.push((handle.clone(), e));
            }
        }
    }
    report
}

/// Handles listed one per line; blank lines are ignored.
pub fn parse_handles(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

use crate::{
    config::{FeatureConfig, RecommendConfig},
    error::PipelineError,
    features::{self, FeatureVector},
    model::Estimator,
    types::{solved_set, ProblemCatalogEntry, Recommendation, SolvedSet, SubmissionRecord},
};

/// Shortlist plus the rating it was centered on.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortlist {
    pub predicted_rating: i32,
    pub problems: Vec<Recommendation>,
}

/// Unsolved catalog problems within `cfg.window` of `predicted_rating`,
/// ordered by (rating, name, tags, id) and cut to `cfg.top_n`.
pub fn candidates(
    predicted_rating: i32,
    catalog: &[ProblemCatalogEntry],
    solved: &SolvedSet,
    cfg: &RecommendConfig,
) -> Vec<Recommendation> {
    let mut picked: Vec<Recommendation> = catalog
        .iter()
        .filter_map(|p| p.rating.map(|rating| (p, rating)))
        .filter(|(_, rating)| {
            (i64::from(*rating) - i64::from(predicted_rating)).abs() <= i64::from(cfg.window)
        })
        .filter(|(p, _)| !solved.contains(&p.id))
        .map(|(p, rating)| Recommendation {
            rating,
            name: p.name.clone(),
            tags: p.tags.clone(),
            id: p.id.clone(),
        })
        .collect();
    picked.sort();
    picked.truncate(cfg.top_n);
    picked
}

/// Predicts a rating from `features` and shortlists problems around it.
pub fn recommend<E: Estimator + ?Sized>(
    estimator: &E,
    features: &FeatureVector,
    catalog: &[ProblemCatalogEntry],
    solved: &SolvedSet,
    cfg: &RecommendConfig,
) -> Result<Shortlist, PipelineError> {
    let raw = estimator.predict(features)?;
    let predicted_rating = raw.round() as i32;
    tracing::debug!(
        "{} predicted {} (raw {}) from {:?}",
        estimator.name(),
        predicted_rating,
        raw,
        features
    );
    Ok(Shortlist {
        predicted_rating,
        problems: candidates(predicted_rating, catalog, solved, cfg),
    })
}

/// Builds features and the solved set from one user's submissions, then
/// recommends. A history with no usable submissions is `NoRecommendations`.
pub fn recommend_for_records<E: Estimator + ?Sized>(
    handle: &str,
    estimator: &E,
    records: &[SubmissionRecord],
    catalog: &[ProblemCatalogEntry],
    feature_cfg: &FeatureConfig,
    cfg: &RecommendConfig,
) -> Result<Shortlist, PipelineError> {
    let features =
        features::extract(records, feature_cfg).map_err(|e| PipelineError::NoRecommendations {
            handle: handle.to_string(),
            source: Box::new(e),
        })?;
    let solved = solved_set(records);
    recommend(estimator, &features, catalog, &solved, cfg)
}

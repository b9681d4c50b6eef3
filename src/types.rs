use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Outcome tag of a submission. Only `Ok` counts toward features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "OK")]
    Ok,
    #[serde(other)]
    Other,
}

/// Composite problem key: contest id + problem index ("1700", "B").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProblemId {
    pub contest_id: u32,
    pub index: String,
}

impl ProblemId {
    pub fn new(contest_id: u32, index: impl Into<String>) -> Self {
        Self { contest_id, index: index.into() }
    }

    pub fn url(&self) -> String {
        format!("https://codeforces.com/contest/{}/problem/{}", self.contest_id, self.index)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.contest_id, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub verdict: Verdict,
    pub problem: ProblemId,
    pub rating: Option<i32>,       // unrated problems never reach the features
    pub created_at: i64,           // creationTimeSeconds
}

impl SubmissionRecord {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemCatalogEntry {
    pub id: ProblemId,
    pub name: String,
    pub rating: Option<i32>,
    pub tags: Vec<String>,
}

/// A shortlisted problem. Field order is the ranking order: rating first,
/// then name, tags and id as tie breakers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Recommendation {
    pub rating: i32,
    pub name: String,
    pub tags: Vec<String>,
    pub id: ProblemId,
}

/// (features, known future rating) pair used for training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: crate::features::FeatureVector,
    pub target: f64,
}

pub type SolvedSet = BTreeSet<ProblemId>;

/// Every problem the user got `OK` on, rated or not.
pub fn solved_set(records: &[SubmissionRecord]) -> SolvedSet {
    records
        .iter()
        .filter(|r| r.is_accepted())
        .map(|r| r.problem.clone())
        .collect()
}

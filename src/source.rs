//! Codeforces API client and payload parsing.

use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use crate::{
    config::FetchConfig,
    types::{ProblemCatalogEntry, ProblemId, SubmissionRecord, Verdict},
};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("api returned {status}: {comment}")]
    Api { status: String, comment: String },
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    comment: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProblem {
    contest_id: Option<u32>,
    index: String,
    #[serde(default)]
    name: String,
    rating: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,
}

impl ApiProblem {
    fn id(&self) -> Option<ProblemId> {
        self.contest_id.map(|c| ProblemId::new(c, self.index.clone()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSubmission {
    // Absent while a submission is still being judged.
    verdict: Option<Verdict>,
    problem: ApiProblem,
    creation_time_seconds: i64,
}

#[derive(Deserialize)]
struct ApiProblemset {
    problems: Vec<ApiProblem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub contest_id: u32,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_update_time_seconds: i64,
}

fn unwrap_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FetchError> {
    let env: Envelope<T> = serde_json::from_slice(bytes)?;
    match (env.status.as_str(), env.result) {
        ("OK", Some(result)) => Ok(result),
        (status, _) => Err(FetchError::Api {
            status: status.to_string(),
            comment: env.comment.unwrap_or_default(),
        }),
    }
}

/// Parses a `user.status` response. Submissions on problems without a
/// contest id (problemset-only archives) are dropped.
pub fn parse_submissions(bytes: &[u8]) -> Result<Vec<SubmissionRecord>, FetchError> {
    let raw: Vec<ApiSubmission> = unwrap_envelope(bytes)?;
    let total = raw.len();
    let records: Vec<SubmissionRecord> = raw
        .into_iter()
        .filter_map(|s| {
            Some(SubmissionRecord {
                problem: s.problem.id()?,
                verdict: s.verdict.unwrap_or(Verdict::Other),
                rating: s.problem.rating,
                created_at: s.creation_time_seconds,
            })
        })
        .collect();
    if records.len() < total {
        tracing::debug!("skipped {} submissions without contest id", total - records.len());
    }
    Ok(records)
}

pub fn parse_rating_history(bytes: &[u8]) -> Result<Vec<RatingChange>, FetchError> {
    unwrap_envelope(bytes)
}

/// Parses a `problemset.problems` response into catalog entries.
pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<ProblemCatalogEntry>, FetchError> {
    let set: ApiProblemset = unwrap_envelope(bytes)?;
    Ok(set
        .problems
        .into_iter()
        .filter_map(|p| {
            Some(ProblemCatalogEntry {
                id: p.id()?,
                name: p.name,
                rating: p.rating,
                tags: p.tags,
            })
        })
        .collect())
}

/// Rating after the user's most recent contest, used as the training target.
pub fn latest_rating(history: &[RatingChange]) -> Option<i32> {
    history
        .iter()
        .max_by_key(|c| c.rating_update_time_seconds)
        .map(|c| c.new_rating)
}

#[derive(Debug, Clone)]
pub struct CodeforcesClient {
    client: reqwest::Client,
    cfg: FetchConfig,
}

impl CodeforcesClient {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { client, cfg: cfg.clone() })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{}", self.cfg.api_base.trim_end_matches('/'), path);
        tracing::debug!("fetching {}", url);
        let res = self.client.get(&url).query(query).send().await?;
        if !res.status().is_success() {
            return Err(FetchError::Status(res.status()));
        }
        Ok(res.bytes().await?.to_vec())
    }

    /// Raw `user.status` body. Parse with [`parse_submissions`].
    pub async fn submissions_raw(&self, handle: &str) -> Result<Vec<u8>, FetchError> {
        let query = [
            ("handle", handle.to_string()),
            ("from", "1".to_string()),
            ("count", self.cfg.submission_count.to_string()),
        ];
        self.get("user.status", &query).await
    }

    /// Raw `user.rating` body. Parse with [`parse_rating_history`].
    pub async fn rating_raw(&self, handle: &str) -> Result<Vec<u8>, FetchError> {
        self.get("user.rating", &[("handle", handle.to_string())]).await
    }

    pub async fn catalog(&self) -> Result<Vec<ProblemCatalogEntry>, FetchError> {
        let bytes = self.get("problemset.problems", &[]).await?;
        parse_catalog(&bytes)
    }

    /// Fixed pause between successive user fetches.
    pub async fn pace(&self) {
        tokio::time::sleep(Duration::from_millis(self.cfg.delay_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submissions() {
        let body = br#"{"status":"OK","result":[
            {"id":1,"verdict":"OK","creationTimeSeconds":100,
             "problem":{"contestId":1700,"index":"B","name":"X","rating":1400,"tags":["math"]}},
            {"id":2,"verdict":"WRONG_ANSWER","creationTimeSeconds":90,
             "problem":{"contestId":1700,"index":"C","name":"Y","tags":[]}},
            {"id":3,"creationTimeSeconds":95,
             "problem":{"contestId":1700,"index":"D","name":"Z"}},
            {"id":4,"verdict":"OK","creationTimeSeconds":80,
             "problem":{"problemsetName":"acmsguru","index":"100","name":"A+B"}}
        ]}"#;
        let records = parse_submissions(body).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].verdict, Verdict::Ok);
        assert_eq!(records[0].rating, Some(1400));
        assert_eq!(records[0].problem, ProblemId::new(1700, "B"));
        assert_eq!(records[1].verdict, Verdict::Other);
        assert_eq!(records[2].verdict, Verdict::Other);
    }

    #[test]
    fn failed_status_is_an_error() {
        let body = br#"{"status":"FAILED","comment":"handle: User with handle nobody not found"}"#;
        match parse_submissions(body) {
            Err(FetchError::Api { status, comment }) => {
                assert_eq!(status, "FAILED");
                assert!(comment.contains("not found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_catalog() {
        let body = br#"{"status":"OK","result":{"problems":[
            {"contestId":1,"index":"A","name":"Theatre Square","type":"PROGRAMMING",
             "rating":1000,"tags":["math"]},
            {"contestId":2,"index":"B","name":"Unrated","type":"PROGRAMMING","tags":[]}
        ],"problemStatistics":[]}}"#;
        let catalog = parse_catalog(body).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].name, "Theatre Square");
        assert_eq!(catalog[0].tags, vec!["math".to_string()]);
        assert_eq!(catalog[1].rating, None);
    }

    #[test]
    fn latest_rating_uses_most_recent_contest() {
        let body = br#"{"status":"OK","result":[
            {"contestId":10,"contestName":"a","handle":"h","rank":1,
             "ratingUpdateTimeSeconds":200,"oldRating":1500,"newRating":1600},
            {"contestId":11,"contestName":"b","handle":"h","rank":1,
             "ratingUpdateTimeSeconds":100,"oldRating":0,"newRating":1500}
        ]}"#;
        let history = parse_rating_history(body).unwrap();
        assert_eq!(latest_rating(&history), Some(1600));
        assert_eq!(latest_rating(&[]), None);
    }
}

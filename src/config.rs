use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::PathBuf, str::FromStr};

use crate::model::GbtParams;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    /// Problems rated at or above this count as hard.
    pub hard_threshold: i32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { hard_threshold: 1800 }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RecommendConfig {
    /// Inclusive half-width of the rating window around the prediction.
    pub window: i32,
    pub top_n: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self { window: 150, top_n: 10 }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub min_general_rows: usize,
    pub model: GbtParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self { min_general_rows: 10, model: GbtParams::default() }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub api_base: String,
    pub submission_count: u32,
    /// Pause after each user fetch, in milliseconds.
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://codeforces.com/api".to_string(),
            submission_count: 10_000,
            delay_ms: 300,
            timeout_secs: 30,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub features: FeatureConfig,
    pub recommend: RecommendConfig,
    pub train: TrainConfig,
    pub fetch: FetchConfig,
}

impl PipelineConfig {
    /// Reads the JSON config at `path` when given, then applies `CF_*`
    /// environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config at {}", path))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("invalid config JSON in {}", path))?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var("CF_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(base) = env::var("CF_API_BASE") {
            self.fetch.api_base = base;
        }
        self.fetch.delay_ms = env_or_parse("CF_FETCH_DELAY_MS", self.fetch.delay_ms);
        self.recommend.window = env_or_parse("CF_RATING_WINDOW", self.recommend.window);
        self.recommend.top_n = env_or_parse("CF_TOP_N", self.recommend.top_n);
    }
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("failed to parse {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

//! Breathing-metric sample sources.
//!
//! Each metric comes from its own endpoint returning a small JSON object
//! such as `{"breathing_volume": 0.031}`. Only the named field is read;
//! anything else in the body is ignored.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lumina_logic::breath::{BreathConfig, BreathSample};
use thiserror::Error;

use crate::config::ApiConfig;

/// The three metrics the breathing service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreathMetric {
    Volume,
    Regularity,
    /// Breaths per second.
    Rate,
}

impl BreathMetric {
    /// JSON field carrying the metric.
    pub fn field(self) -> &'static str {
        match self {
            BreathMetric::Volume => "breathing_volume",
            BreathMetric::Regularity => "breathing_regularity",
            BreathMetric::Rate => "breathing_rate",
        }
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned status {0}")]
    Status(u16),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Field `{0}` missing or not a finite number")]
    MissingField(&'static str),
}

/// Anything that can produce a single metric reading.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch(&self, metric: BreathMetric) -> Result<f32, SampleError>;
}

/// Extract `field` from a JSON object body.
pub fn parse_metric(body: &str, field: &'static str) -> Result<f32, SampleError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    value
        .get(field)
        .and_then(serde_json::Value::as_f64)
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
        .ok_or(SampleError::MissingField(field))
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim();
    let path = path.trim();
    if base.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

// ── HTTP ────────────────────────────────────────────────────────────────

/// Polls the breathing service over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpSampleSource {
    client: reqwest::Client,
    volume_url: String,
    regularity_url: String,
    rate_url: String,
}

impl HttpSampleSource {
    pub fn new(api: &ApiConfig) -> Result<Self, SampleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(api.timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            client,
            volume_url: join_url(&api.base_url, &api.volume_path),
            regularity_url: join_url(&api.base_url, &api.regularity_path),
            rate_url: join_url(&api.base_url, &api.rate_path),
        })
    }

    pub fn url_for(&self, metric: BreathMetric) -> &str {
        match metric {
            BreathMetric::Volume => &self.volume_url,
            BreathMetric::Regularity => &self.regularity_url,
            BreathMetric::Rate => &self.rate_url,
        }
    }
}

#[async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch(&self, metric: BreathMetric) -> Result<f32, SampleError> {
        let response = self.client.get(self.url_for(metric)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SampleError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_metric(&body, metric.field())
    }
}

// ── Manual ──────────────────────────────────────────────────────────────

/// In-process source whose readings are set by the caller. Metrics that
/// are `None` in the current sample fail to fetch.
#[derive(Debug, Default)]
pub struct ManualSource {
    current: Mutex<BreathSample>,
}

impl ManualSource {
    pub fn new(sample: BreathSample) -> Self {
        Self {
            current: Mutex::new(sample),
        }
    }

    pub fn set(&self, sample: BreathSample) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = sample;
    }
}

#[async_trait]
impl SampleSource for ManualSource {
    async fn fetch(&self, metric: BreathMetric) -> Result<f32, SampleError> {
        let sample = *self.current.lock().unwrap_or_else(|e| e.into_inner());
        let value = match metric {
            BreathMetric::Volume => sample.volume,
            BreathMetric::Regularity => sample.regularity,
            BreathMetric::Rate => sample.rate,
        };
        value.ok_or(SampleError::MissingField(metric.field()))
    }
}

// ── Sampling round ──────────────────────────────────────────────────────

/// Fetch one round of metrics concurrently.
///
/// Volume is always requested; regularity and rate only when the model
/// uses them. A failed fetch yields `None` for that metric.
pub async fn fetch_sample<S>(source: &S, config: &BreathConfig) -> BreathSample
where
    S: SampleSource + ?Sized,
{
    let (volume, regularity, rate) = tokio::join!(
        fetch_or_none(source, BreathMetric::Volume, true),
        fetch_or_none(source, BreathMetric::Regularity, config.use_regularity),
        fetch_or_none(source, BreathMetric::Rate, config.use_rate_bonus),
    );
    BreathSample {
        volume,
        regularity,
        rate,
    }
}

async fn fetch_or_none<S>(source: &S, metric: BreathMetric, enabled: bool) -> Option<f32>
where
    S: SampleSource + ?Sized,
{
    if !enabled {
        return None;
    }
    match source.fetch(metric).await {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("Fetch {} failed: {}", metric.field(), e);
            None
        }
    }
}

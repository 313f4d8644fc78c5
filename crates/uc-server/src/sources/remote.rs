use std::time::Duration;

use reqwest::{StatusCode, Url};
use uc_core::core::{
    EvaluationTarget, MetricsFuture, MetricsSource, MetricsSourceError, QualityMetrics,
};

use crate::bootstrap::RemoteSettings;

#[derive(Debug, thiserror::Error)]
pub enum RemoteSourceError {
    #[error("invalid metrics base URL {url}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// RemoteMetricsSource — fetches precomputed metrics over HTTP
// ---------------------------------------------------------------------------

pub struct RemoteMetricsSource {
    client: reqwest::Client,
    base_url: Url,
    metrics_path: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteMetricsSource {
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteSourceError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| RemoteSourceError::BaseUrl {
            url: settings.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteSourceError::BaseUrl {
                url: settings.base_url.clone(),
                reason: "URL cannot carry a path".to_owned(),
            });
        }

        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            metrics_path: settings.metrics_path.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })
    }

    /// `{conversation_id}` and `{seed_id}` in the configured path are
    /// replaced with the target's identifiers. Every path segment is
    /// percent-encoded on its own, so an identifier never spans segments.
    pub fn url_for(&self, target: &EvaluationTarget) -> Result<Url, MetricsSourceError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                MetricsSourceError::InvalidTarget(format!(
                    "base URL {} cannot carry a path",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty();
            for template in self.metrics_path.trim_start_matches('/').split('/') {
                let segment = fill_segment(template, target);
                if segment != template && matches!(segment.as_str(), "." | "..") {
                    return Err(MetricsSourceError::InvalidTarget(format!(
                        "identifier {segment:?} is not a valid path segment"
                    )));
                }
                segments.push(&segment);
            }
        }
        Ok(url)
    }

    fn map_send_error(&self, err: reqwest::Error) -> MetricsSourceError {
        if err.is_timeout() {
            MetricsSourceError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            MetricsSourceError::Connection(err.to_string())
        }
    }
}

/// Single-pass placeholder substitution; substituted text is never rescanned.
fn fill_segment(template: &str, target: &EvaluationTarget) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{conversation_id}") {
            out.push_str(target.conversation_id.as_str());
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{seed_id}") {
            out.push_str(target.seed_id.as_str());
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

impl MetricsSource for RemoteMetricsSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn fetch<'a>(&'a self, target: &'a EvaluationTarget) -> MetricsFuture<'a> {
        Box::pin(async move {
            let url = self.url_for(target)?;

            let mut req = self.client.get(url);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req.send().await.map_err(|e| self.map_send_error(e))?;

            match resp.status() {
                StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
                status if status.is_success() => {
                    let metrics = resp.json::<QualityMetrics>().await.map_err(|e| {
                        if e.is_timeout() {
                            self.map_send_error(e)
                        } else {
                            MetricsSourceError::Decode(e.to_string())
                        }
                    })?;
                    Ok(Some(metrics))
                }
                status => {
                    let body = resp.text().await.unwrap_or_default();
                    Err(MetricsSourceError::Http {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
        })
    }
}

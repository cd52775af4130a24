//! Reputation service client.
//!
//! Talks to a VirusTotal-compatible v3 API in three regimes:
//!
//! 1. **Hash lookup** — `GET /files/<sha256>`. A known sample yields a
//!    verdict straight from its `last_analysis_stats`.
//! 2. **Submit and poll** — on a 404 the file is uploaded
//!    (`POST /files`) and the returned analysis id polled
//!    (`GET /analyses/<id>`) until it completes or the poll budget runs out.
//! 3. **Degraded operation** — no credential, or any transport error,
//!    produces an indeterminate verdict instead of an error.
//!
//! The public entry point is [`ReputationClient::assess`], which is
//! infallible by design: whatever goes wrong becomes
//! [`ScanVerdict::Indeterminate`] and the caller decides policy.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ReputationError, Result};
use crate::verdict::{AnalysisStats, ScanVerdict};

/// Production endpoint of the reputation service.
pub const DEFAULT_BASE_URL: &str = "https://www.virustotal.com/api/v3";

/// Timeout for a hash lookup round-trip.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for uploading a sample.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between analysis polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Number of polls before giving up (12 * 5 s = 60 s budget).
const POLL_ATTEMPTS: u32 = 12;

/// Client for the multi-engine reputation service.
#[derive(Debug, Clone)]
pub struct ReputationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ReputationClient {
    /// Create a client against the production endpoint.
    ///
    /// `api_key = None` puts the client in degraded mode: every assessment
    /// returns an indeterminate verdict without touching the network.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (tests, on-prem mirrors).
    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Whether a credential is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Obtain a verdict for the staged file with the given SHA-256 digest.
    ///
    /// Never fails: degraded operation and transport errors come back as
    /// [`ScanVerdict::Indeterminate`].
    pub async fn assess(&self, path: &Path, digest: &str) -> ScanVerdict {
        let Some(key) = self.api_key.as_deref() else {
            warn!("reputation credential not configured, skipping scan");
            return ScanVerdict::indeterminate("no API credential configured");
        };

        match self.lookup_or_submit(path, digest, key).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "reputation scan failed, treating as indeterminate");
                ScanVerdict::indeterminate(e.to_string())
            }
        }
    }

    async fn lookup_or_submit(&self, path: &Path, digest: &str, key: &str) -> Result<ScanVerdict> {
        debug!(%digest, "reputation hash lookup");
        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, digest))
            .header("x-apikey", key)
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let report: FileReport = response.json().await?;
                let stats = report.data.attributes.last_analysis_stats;
                debug!(
                    malicious = stats.malicious,
                    suspicious = stats.suspicious,
                    "known sample"
                );
                Ok(ScanVerdict::from_stats(&stats))
            }
            404 => {
                debug!(%digest, "sample unknown, submitting for analysis");
                self.submit_and_poll(path, key).await
            }
            status => Err(ReputationError::UnexpectedStatus { status }),
        }
    }

    async fn submit_and_poll(&self, path: &Path, key: &str) -> Result<ScanVerdict> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sample".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .header("x-apikey", key)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(status == 200 || status == 201) {
            return Err(ReputationError::UnexpectedStatus { status });
        }

        let submitted: SubmitResponse = response.json().await?;
        let analysis_id = submitted.data.id;
        if analysis_id.is_empty() {
            return Err(ReputationError::Malformed("empty analysis id".into()));
        }
        debug!(%analysis_id, "sample submitted, polling analysis");

        for attempt in 1..=POLL_ATTEMPTS {
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .http
                .get(format!("{}/analyses/{}", self.base_url, analysis_id))
                .header("x-apikey", key)
                .timeout(LOOKUP_TIMEOUT)
                .send()
                .await?;

            if response.status().as_u16() != 200 {
                continue;
            }

            let report: AnalysisReport = response.json().await?;
            if report.data.attributes.status == "completed" {
                let stats = report.data.attributes.stats;
                debug!(
                    attempt,
                    malicious = stats.malicious,
                    suspicious = stats.suspicious,
                    "analysis completed"
                );
                return Ok(ScanVerdict::from_stats(&stats));
            }
        }

        Ok(ScanVerdict::indeterminate("analysis timeout"))
    }
}

// Wire shapes of the v3 API, reduced to the fields the client reads.

#[derive(Debug, serde::Deserialize)]
struct FileReport {
    data: FileData,
}

#[derive(Debug, serde::Deserialize)]
struct FileData {
    attributes: FileAttributes,
}

#[derive(Debug, serde::Deserialize)]
struct FileAttributes {
    last_analysis_stats: AnalysisStats,
}

#[derive(Debug, serde::Deserialize)]
struct SubmitResponse {
    data: SubmitData,
}

#[derive(Debug, serde::Deserialize)]
struct SubmitData {
    id: String,
}

#[derive(Debug, serde::Deserialize)]
struct AnalysisReport {
    data: AnalysisData,
}

#[derive(Debug, serde::Deserialize)]
struct AnalysisData {
    attributes: AnalysisAttributes,
}

#[derive(Debug, serde::Deserialize)]
struct AnalysisAttributes {
    status: String,
    #[serde(default)]
    stats: AnalysisStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_degraded_mode_without_credential() {
        let client = ReputationClient::new(None);
        let verdict = client.assess(Path::new("/nonexistent"), "00").await;
        assert!(verdict.is_indeterminate());
    }

    #[tokio::test]
    async fn test_transport_failure_is_indeterminate() {
        // Nothing listens on this port; the lookup must degrade, not error.
        let client =
            ReputationClient::with_base_url(Some("key".into()), "http://127.0.0.1:1/api/v3");

        let mut staged = tempfile::NamedTempFile::new().unwrap();
        staged.write_all(b"%PDF-1.4\n").unwrap();

        let verdict = client.assess(staged.path(), "ab").await;
        assert!(verdict.is_indeterminate());
    }

    #[test]
    fn test_wire_shapes_deserialize() {
        let body = r#"{
            "data": {
                "attributes": {
                    "last_analysis_stats": {
                        "malicious": 0,
                        "suspicious": 1,
                        "harmless": 10,
                        "undetected": 50
                    }
                }
            }
        }"#;
        let report: FileReport = serde_json::from_str(body).unwrap();
        let stats = report.data.attributes.last_analysis_stats;
        assert_eq!(stats.engines_total(), 60);
        assert!(ScanVerdict::from_stats(&stats).is_clean());
    }

    #[test]
    fn test_analysis_report_without_stats_defaults_to_zero() {
        let body = r#"{"data": {"attributes": {"status": "queued"}}}"#;
        let report: AnalysisReport = serde_json::from_str(body).unwrap();
        assert_eq!(report.data.attributes.status, "queued");
        assert_eq!(report.data.attributes.stats, AnalysisStats::default());
    }
}

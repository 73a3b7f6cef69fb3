//! Multipart upload to the processing endpoint
//!
//! One request per cycle, no client-side retry: a failed upload surfaces
//! immediately and the operator retries from `Idle` if they want to.

use std::time::Duration;

use crate::error::UploadError;

use super::AudioArtifact;

/// Bound on connect, read, and write phases of the exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Path the server processes uploads on
const PROCESS_PATH: &str = "/process_audio";

/// Multipart field name for the audio part
const FIELD_NAME: &str = "file";

/// Declared filename of the audio part
const UPLOAD_FILE_NAME: &str = "audio_record.m4a";

/// Declared MIME type of the audio part
const UPLOAD_MIME: &str = "audio/mp4";

/// Derive the full endpoint URL from a user-supplied host
///
/// Tolerates bare `host:port` input: anything not already starting with
/// `http` gets an `http://` scheme prepended before the path is appended.
#[must_use]
pub fn normalize_endpoint(host: &str) -> String {
    if host.starts_with("http") {
        format!("{host}{PROCESS_PATH}")
    } else {
        format!("http://{host}{PROCESS_PATH}")
    }
}

/// Sends recorded artifacts to the server and returns raw response bodies
pub struct UploadClient {
    client: reqwest::Client,
}

impl UploadClient {
    /// Build a client with the fixed timeout policy
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be constructed.
    pub fn new() -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    /// Upload the artifact and return the raw response body
    ///
    /// # Errors
    ///
    /// `Timeout` when any phase exceeds the 120 second bound,
    /// `ServerStatus` for a non-2xx answer (body not parsed),
    /// `EmptyBody` for a 2xx answer with nothing in it, and
    /// `Transport` for everything the network layer throws.
    pub async fn send(
        &self,
        artifact: &AudioArtifact,
        host: &str,
    ) -> Result<String, UploadError> {
        let url = normalize_endpoint(host);

        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| UploadError::Transport(format!("read artifact: {e}")))?;

        tracing::debug!(url = %url, bytes = bytes.len(), "uploading");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(UPLOAD_MIME)
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(FIELD_NAME, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::Timeout
                } else {
                    UploadError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "server rejected upload");
            return Err(UploadError::ServerStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                UploadError::Timeout
            } else {
                UploadError::Transport(e.to_string())
            }
        })?;

        if body.is_empty() {
            return Err(UploadError::EmptyBody);
        }

        tracing::debug!(status = %status, body_len = body.len(), "response received");
        Ok(body)
    }
}

//! Response envelope decoding
//!
//! The server answers with `{"text": string, "audio": base64-string}`.
//! Both fields are mandatory; the audio is standard (padded, non-URL-safe)
//! base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::DecodeError;

/// The JSON envelope as sent by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerResponse {
    /// Transcript of the reply
    pub text: String,

    /// Base64-encoded response audio
    pub audio: String,
}

impl ServerResponse {
    /// Parse the envelope from a response body
    ///
    /// # Errors
    ///
    /// `MalformedJson` if the body is not JSON, `MissingField` naming
    /// whichever of `text`/`audio` is absent or not a string.
    pub fn parse(body: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| DecodeError::MalformedJson(e.to_string()))?;

        Ok(Self {
            text: string_field(&value, "text")?.to_string(),
            audio: string_field(&value, "audio")?.to_string(),
        })
    }
}

/// A decoded reply: transcript plus raw audio bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Transcript of the reply
    pub text: String,

    /// Decoded response audio
    pub audio: Vec<u8>,
}

/// Decodes response bodies into transcript and audio bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    /// Parse the envelope and decode its audio
    ///
    /// # Errors
    ///
    /// `MalformedJson` if the body is not JSON, `MissingField` naming
    /// whichever of `text`/`audio` is absent or not a string, and
    /// `BadEncoding` if the audio is not valid base64.
    pub fn decode(body: &str) -> Result<Utterance, DecodeError> {
        let envelope = ServerResponse::parse(body)?;

        let audio = BASE64
            .decode(&envelope.audio)
            .map_err(|e| DecodeError::BadEncoding(e.to_string()))?;

        tracing::debug!(
            text_len = envelope.text.len(),
            audio_bytes = audio.len(),
            "envelope decoded"
        );

        Ok(Utterance {
            text: envelope.text,
            audio,
        })
    }
}

/// Extract a mandatory string field, identifying it by name on failure
fn string_field<'a>(
    value: &'a serde_json::Value,
    name: &'static str,
) -> Result<&'a str, DecodeError> {
    value
        .get(name)
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::MissingField(name))
}

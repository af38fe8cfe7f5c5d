//! Request bodies and their validation.
//!
//! Fields are optional at the serde level so that a missing field is reported
//! as a 400 with a specific message instead of a generic extractor rejection.

use crate::error::{ApiError, ApiResult};
use aperture_core::provider::contract::is_valid_job_id;
use aperture_core::{ImageFormat, ImageInput, ImageMetadata, ProviderId};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// An image as sent by clients: base64 bytes plus identity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub data: Option<String>,
    pub format: Option<String>,
    pub filename: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSingleRequest {
    pub provider: Option<String>,
    pub image: Option<ImagePayload>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessBatchRequest {
    pub provider: Option<String>,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    #[serde(rename = "useBatchAPI", default)]
    pub use_batch_api: bool,
}

/// `?provider=` on the batch lookup routes.
#[derive(Debug, Deserialize)]
pub struct ProviderQuery {
    pub provider: Option<String>,
}

/// Turn a JSON extractor rejection into our 400 shape.
pub fn json_body<T: DeserializeOwned>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub fn parse_provider(value: Option<&str>) -> ApiResult<ProviderId> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("provider is required"))?;
    value.parse().map_err(ApiError::BadRequest)
}

/// A batch job id from the path, checked before it reaches a provider URL.
pub fn require_job_id(job_id: &str) -> ApiResult<&str> {
    if is_valid_job_id(job_id) {
        Ok(job_id)
    } else {
        Err(ApiError::bad_request(format!("Invalid batch job id: {job_id}")))
    }
}

/// Both prompts must be present and non-blank.
pub fn require_prompts(
    system_prompt: Option<String>,
    user_prompt: Option<String>,
) -> ApiResult<(String, String)> {
    let present = |p: Option<String>| p.filter(|s| !s.trim().is_empty());
    match (present(system_prompt), present(user_prompt)) {
        (Some(system), Some(user)) => Ok((system, user)),
        (None, _) => Err(ApiError::bad_request("systemPrompt is required")),
        (_, None) => Err(ApiError::bad_request("userPrompt is required")),
    }
}

impl ImagePayload {
    /// Decode into an [`ImageInput`]. `data` may be bare base64 or a
    /// `data:` URL.
    pub fn into_input(self) -> ApiResult<ImageInput> {
        let filename = self
            .filename
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("image.filename is required"))?;
        let incomplete = |field: &str| ApiError::bad_request(format!("image.{field} is required ({filename})"));
        let data = self
            .data
            .filter(|d| !d.is_empty())
            .ok_or_else(|| incomplete("data"))?;
        let format: ImageFormat = self
            .format
            .ok_or_else(|| incomplete("format"))?
            .parse()
            .map_err(ApiError::BadRequest)?;

        let encoded = match data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data.as_str(),
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ApiError::bad_request(format!("image.data for {filename} is not valid base64: {e}")))?;
        if bytes.is_empty() {
            return Err(incomplete("data"));
        }

        let mut input = ImageInput::new(bytes, format, filename);
        input.metadata = self.metadata;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(data: Option<&str>, format: Option<&str>, filename: Option<&str>) -> ImagePayload {
        ImagePayload {
            data: data.map(String::from),
            format: format.map(String::from),
            filename: filename.map(String::from),
            metadata: None,
        }
    }

    #[test]
    fn test_decodes_bare_and_data_url_base64() {
        let bare = payload(Some("AQID"), Some("png"), Some("a.png")).into_input().unwrap();
        assert_eq!(bare.data, vec![1, 2, 3]);
        assert_eq!(bare.format, ImageFormat::Png);

        let url = payload(Some("data:image/jpeg;base64,AQID"), Some("jpg"), Some("b.jpg"))
            .into_input()
            .unwrap();
        assert_eq!(url.data, vec![1, 2, 3]);
        assert_eq!(url.format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_incomplete_images_are_rejected() {
        assert!(payload(None, Some("png"), Some("a.png")).into_input().is_err());
        assert!(payload(Some("AQID"), None, Some("a.png")).into_input().is_err());
        assert!(payload(Some("AQID"), Some("png"), None).into_input().is_err());
        assert!(payload(Some("AQID"), Some("tiff"), Some("a.tiff")).into_input().is_err());
        assert!(payload(Some("!!!"), Some("png"), Some("a.png")).into_input().is_err());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(parse_provider(Some("gemini")).unwrap(), ProviderId::Google);
        assert!(parse_provider(None).is_err());
        let err = parse_provider(Some("mystery")).unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn test_job_id_checked() {
        assert_eq!(require_job_id("msgbatch_01abc").unwrap(), "msgbatch_01abc");
        assert_eq!(require_job_id("batches/abc-123").unwrap(), "batches/abc-123");
        let err = require_job_id("../files/file-1/content").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Invalid batch job id"));
        assert!(require_job_id("").is_err());
    }

    #[test]
    fn test_prompts_required() {
        assert!(require_prompts(Some("s".into()), Some("u".into())).is_ok());
        let err = require_prompts(Some(" ".into()), Some("u".into())).unwrap_err();
        assert_eq!(err.to_string(), "systemPrompt is required");
        let err = require_prompts(Some("s".into()), None).unwrap_err();
        assert_eq!(err.to_string(), "userPrompt is required");
    }
}

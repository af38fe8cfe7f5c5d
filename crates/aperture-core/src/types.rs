//! Core data types shared by every provider adapter and the gateway.
//!
//! All wire-facing types serialize in camelCase since the gateway's clients
//! are JavaScript/Swift apps.

use crate::cost::CostBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a supported vision provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Anthropic,
    Openai,
    Google,
    Grok,
    Groq,
}

impl ProviderId {
    /// Every provider, in the order they are listed to clients.
    pub const ALL: [ProviderId; 5] = [
        ProviderId::Anthropic,
        ProviderId::Openai,
        ProviderId::Google,
        ProviderId::Grok,
        ProviderId::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::Openai => "openai",
            ProviderId::Google => "google",
            ProviderId::Grok => "grok",
            ProviderId::Groq => "groq",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "openai" => Ok(ProviderId::Openai),
            "google" | "gemini" => Ok(ProviderId::Google),
            "grok" | "xai" => Ok(ProviderId::Grok),
            "groq" => Ok(ProviderId::Groq),
            other => Err(format!("Unknown provider: {other}")),
        }
    }
}

/// Encoded image formats accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Heic,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Heic => "heic",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(ImageFormat::Jpeg),
            "png" | "image/png" => Ok(ImageFormat::Png),
            "webp" | "image/webp" => Ok(ImageFormat::Webp),
            "heic" | "heif" | "image/heic" => Ok(ImageFormat::Heic),
            other => Err(format!("Unsupported image format: {other}")),
        }
    }
}

/// Optional capture, location and IPTC metadata sent alongside an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,

    /// GPS latitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude: Option<f64>,

    /// GPS longitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude: Option<f64>,

    /// IPTC title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// IPTC caption/abstract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// IPTC keywords
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl ImageMetadata {
    /// Render the metadata as a short context block for the model.
    ///
    /// Returns `None` when no field carries information.
    pub fn prompt_context(&self) -> Option<String> {
        let mut lines = Vec::new();
        if let Some(ref at) = self.captured_at {
            lines.push(format!("Captured: {at}"));
        }
        let camera: Vec<&str> = [self.camera_make.as_deref(), self.camera_model.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !camera.is_empty() {
            lines.push(format!("Camera: {}", camera.join(" ")));
        }
        if let (Some(lat), Some(lon)) = (self.gps_latitude, self.gps_longitude) {
            lines.push(format!("Location: {lat:.5}, {lon:.5}"));
        }
        if let Some(ref title) = self.title {
            lines.push(format!("Title: {title}"));
        }
        if let Some(ref caption) = self.caption {
            lines.push(format!("Caption: {caption}"));
        }
        if !self.keywords.is_empty() {
            lines.push(format!("Keywords: {}", self.keywords.join(", ")));
        }

        if lines.is_empty() {
            None
        } else {
            Some(format!("Photo context:\n{}", lines.join("\n")))
        }
    }
}

/// A raw image supplied by the caller, consumed once per request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Raw encoded image bytes
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub filename: String,
    pub metadata: Option<ImageMetadata>,
}

impl ImageInput {
    pub fn new(data: Vec<u8>, format: ImageFormat, filename: impl Into<String>) -> Self {
        Self {
            data,
            format,
            filename: filename.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A request to rate one image.
#[derive(Debug, Clone)]
pub struct RatingRequest {
    pub image: ImageInput,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl RatingRequest {
    /// User prompt with the image's metadata context appended, if any.
    pub fn full_user_prompt(&self) -> String {
        compose_user_prompt(&self.user_prompt, &self.image)
    }
}

/// A request to rate many images through a provider batch API.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub images: Vec<ImageInput>,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Append an image's metadata context block to a user prompt.
pub fn compose_user_prompt(user_prompt: &str, image: &ImageInput) -> String {
    match image.metadata.as_ref().and_then(ImageMetadata::prompt_context) {
        Some(context) => format!("{user_prompt}\n\n{context}"),
        None => user_prompt.to_string(),
    }
}

/// Lightroom-style color label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorLabel {
    Red,
    Yellow,
    Green,
    Blue,
    Purple,
    #[default]
    None,
}

impl ColorLabel {
    /// Parse a provider-supplied label, `None` when it is outside the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Some(ColorLabel::Red),
            "yellow" => Some(ColorLabel::Yellow),
            "green" => Some(ColorLabel::Green),
            "blue" => Some(ColorLabel::Blue),
            "purple" => Some(ColorLabel::Purple),
            "none" => Some(ColorLabel::None),
            _ => None,
        }
    }
}

/// Culling decision for a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepReject {
    Keep,
    Reject,
    Maybe,
}

impl KeepReject {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" | "pick" => Some(KeepReject::Keep),
            "reject" => Some(KeepReject::Reject),
            "maybe" => Some(KeepReject::Maybe),
            _ => None,
        }
    }

    /// Decision implied by a star rating.
    pub fn from_stars(stars: u8) -> Self {
        if stars >= 4 {
            KeepReject::Keep
        } else if stars <= 2 {
            KeepReject::Reject
        } else {
            KeepReject::Maybe
        }
    }
}

/// Technical quality assessment.
///
/// The `*_score` fields are on a 1–1000 scale; the unsuffixed fields are the
/// legacy 0–1 scale kept for older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalQuality {
    pub sharpness_score: u16,
    pub exposure_score: u16,
    pub composition_score: u16,
    pub color_score: u16,
    pub overall_score: u16,

    pub sharpness: f64,
    pub exposure: f64,
    pub composition: f64,
    pub color: f64,
    pub overall: f64,

    pub in_focus: bool,
}

/// Subject assessment (people, animals, main subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAnalysis {
    pub primary_subject: String,
    pub emotion: String,

    pub expression_score: u16,
    pub pose_score: u16,
    pub engagement_score: u16,
    pub prominence_score: u16,

    pub expression: f64,
    pub pose: f64,
    pub engagement: f64,
    pub prominence: f64,

    pub eyes_open: bool,
    pub eye_contact: bool,
}

/// Canonical, validated rating for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRating {
    /// Filename, or batch custom id until the gateway maps it back
    pub image_id: String,
    /// 1–5 stars
    pub star_rating: u8,
    pub color_label: ColorLabel,
    pub keep_reject: KeepReject,
    pub tags: Vec<String>,
    pub description: String,
    pub technical_quality: TechnicalQuality,
    pub subject_analysis: SubjectAnalysis,
}

/// Outcome of one synchronous rating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub rating: PhotoRating,
    pub cost: CostBreakdown,
    pub processing_time_ms: u64,
    pub provider: ProviderId,
}

/// Canonical batch lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Queued => "queued",
            BatchState::Processing => "processing",
            BatchState::Completed => "completed",
            BatchState::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly submitted provider batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    /// Provider-native job identifier
    pub job_id: String,
    pub provider: ProviderId,
    pub status: BatchState,
    pub total_images: usize,
    pub processed_images: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Result of polling a batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobStatus {
    pub job_id: String,
    pub provider: ProviderId,
    pub status: BatchState,
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<PhotoRating>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ratings collected from a completed batch job.
///
/// `cost` prices the token usage of the successful items at the provider's
/// batch rates.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    pub ratings: Vec<PhotoRating>,
    pub cost: CostBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_round_trip_names() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
        assert_eq!("Claude".parse::<ProviderId>().unwrap(), ProviderId::Anthropic);
        assert!("midjourney".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_image_format_aliases() {
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("image/png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert!("tiff".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_keep_reject_from_stars() {
        assert_eq!(KeepReject::from_stars(5), KeepReject::Keep);
        assert_eq!(KeepReject::from_stars(4), KeepReject::Keep);
        assert_eq!(KeepReject::from_stars(3), KeepReject::Maybe);
        assert_eq!(KeepReject::from_stars(2), KeepReject::Reject);
        assert_eq!(KeepReject::from_stars(1), KeepReject::Reject);
    }

    #[test]
    fn test_metadata_prompt_context() {
        let meta = ImageMetadata {
            captured_at: Some("2024-06-01T18:30:00Z".to_string()),
            camera_make: Some("Fujifilm".to_string()),
            camera_model: Some("X-T5".to_string()),
            gps_latitude: Some(46.5),
            gps_longitude: Some(7.9),
            keywords: vec!["alps".to_string(), "hiking".to_string()],
            ..Default::default()
        };
        let context = meta.prompt_context().unwrap();
        assert!(context.starts_with("Photo context:"));
        assert!(context.contains("Camera: Fujifilm X-T5"));
        assert!(context.contains("Keywords: alps, hiking"));
        assert!(ImageMetadata::default().prompt_context().is_none());
    }

    #[test]
    fn test_full_user_prompt_without_metadata_is_unchanged() {
        let request = RatingRequest {
            image: ImageInput::new(vec![1, 2, 3], ImageFormat::Jpeg, "a.jpg"),
            system_prompt: "sys".to_string(),
            user_prompt: "Rate this photo.".to_string(),
        };
        assert_eq!(request.full_user_prompt(), "Rate this photo.");
    }

    #[test]
    fn test_batch_state_terminal() {
        assert!(BatchState::Completed.is_terminal());
        assert!(BatchState::Failed.is_terminal());
        assert!(!BatchState::Queued.is_terminal());
        assert!(!BatchState::Processing.is_terminal());
        assert_eq!(
            serde_json::to_string(&BatchState::Processing).unwrap(),
            "\"processing\""
        );
    }
}

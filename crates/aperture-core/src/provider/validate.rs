//! Normalization of raw provider JSON into a canonical [`PhotoRating`].
//!
//! Providers return structurally different payloads (snake_case from schema
//! constrained outputs, camelCase from prompt-engineered ones, numbers as
//! strings, missing sections). Everything that leaves this module is in range.

use crate::types::{ColorLabel, KeepReject, PhotoRating, SubjectAnalysis, TechnicalQuality};
use serde_json::{Map, Value};

const DEFAULT_STARS: f64 = 3.0;
const DEFAULT_UNIT_SCORE: f64 = 0.5;

/// Build a validated rating for `image_id` from whatever the provider returned.
pub fn validate_rating(image_id: &str, raw: &Value) -> PhotoRating {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let star_rating = clamp_stars(field(obj, &["star_rating", "starRating", "rating", "stars"]));

    let color_label = field(obj, &["color_label", "colorLabel", "color"])
        .and_then(Value::as_str)
        .and_then(ColorLabel::parse)
        .unwrap_or_default();

    let keep_reject = field(obj, &["keep_reject", "keepReject", "decision"])
        .and_then(Value::as_str)
        .and_then(KeepReject::parse)
        .unwrap_or_else(|| KeepReject::from_stars(star_rating));

    let tags = field(obj, &["tags", "keywords"])
        .map(coerce_tags)
        .unwrap_or_default();

    let description = field(obj, &["description", "summary"])
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let tech = section(obj, &["technical_quality", "technicalQuality"]);
    let subject = section(obj, &["subject_analysis", "subjectAnalysis"]);

    PhotoRating {
        image_id: image_id.to_string(),
        star_rating,
        color_label,
        keep_reject,
        tags,
        description,
        technical_quality: technical_quality(tech.unwrap_or(&empty)),
        subject_analysis: subject_analysis(subject.unwrap_or(&empty)),
    }
}

/// Coerce a star rating to 1..=5: numeric strings accepted, anything else is 3,
/// halves round up.
pub fn clamp_stars(value: Option<&Value>) -> u8 {
    let stars = value.and_then(coerce_f64).unwrap_or(DEFAULT_STARS);
    (stars + 0.5).floor().clamp(1.0, 5.0) as u8
}

fn technical_quality(obj: &Map<String, Value>) -> TechnicalQuality {
    let sharpness = unit_score(obj, &["sharpness"]);
    let exposure = unit_score(obj, &["exposure", "exposure_accuracy", "exposureAccuracy"]);
    let composition = unit_score(obj, &["composition"]);
    let color = unit_score(obj, &["color", "color_balance", "colorBalance"]);
    let overall = unit_score(obj, &["overall", "overall_quality", "overallQuality"]);

    TechnicalQuality {
        sharpness_score: scaled_score(obj, &["sharpness_score", "sharpnessScore"], sharpness),
        exposure_score: scaled_score(obj, &["exposure_score", "exposureScore"], exposure),
        composition_score: scaled_score(
            obj,
            &["composition_score", "compositionScore"],
            composition,
        ),
        color_score: scaled_score(obj, &["color_score", "colorScore"], color),
        overall_score: scaled_score(obj, &["overall_score", "overallScore"], overall),
        sharpness,
        exposure,
        composition,
        color,
        overall,
        in_focus: flag(obj, &["in_focus", "inFocus"], true),
    }
}

fn subject_analysis(obj: &Map<String, Value>) -> SubjectAnalysis {
    let expression = unit_score(obj, &["expression", "expression_quality", "expressionQuality"]);
    let pose = unit_score(obj, &["pose", "pose_quality", "poseQuality"]);
    let engagement = unit_score(obj, &["engagement", "emotional_impact", "emotionalImpact"]);
    let prominence = unit_score(obj, &["prominence", "subject_prominence", "subjectProminence"]);

    SubjectAnalysis {
        primary_subject: text(obj, &["primary_subject", "primarySubject"], "unknown"),
        emotion: text(obj, &["emotion", "mood"], "neutral"),
        expression_score: scaled_score(obj, &["expression_score", "expressionScore"], expression),
        pose_score: scaled_score(obj, &["pose_score", "poseScore"], pose),
        engagement_score: scaled_score(obj, &["engagement_score", "engagementScore"], engagement),
        prominence_score: scaled_score(obj, &["prominence_score", "prominenceScore"], prominence),
        expression,
        pose,
        engagement,
        prominence,
        eyes_open: flag(obj, &["eyes_open", "eyesOpen"], true),
        eye_contact: flag(obj, &["eye_contact", "eyeContact"], false),
    }
}

/// First present key among `keys`, ignoring explicit nulls.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn section<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    field(obj, keys).and_then(Value::as_object)
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Legacy 0–1 score; missing or non-numeric is 0.5.
fn unit_score(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    field(obj, keys)
        .and_then(coerce_f64)
        .unwrap_or(DEFAULT_UNIT_SCORE)
        .clamp(0.0, 1.0)
}

/// 1–1000 score; missing is derived from the matching legacy value.
fn scaled_score(obj: &Map<String, Value>, keys: &[&str], legacy: f64) -> u16 {
    let raw = field(obj, keys)
        .and_then(coerce_f64)
        .unwrap_or(legacy * 1000.0);
    raw.round().clamp(1.0, 1000.0) as u16
}

fn flag(obj: &Map<String, Value>, keys: &[&str], default: bool) -> bool {
    match field(obj, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => true,
            "false" | "no" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(default),
        _ => default,
    }
}

fn text(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    field(obj, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn coerce_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Pull the JSON object out of a model's text reply.
///
/// Models asked for JSON sometimes wrap it in prose or markdown fences; the
/// outermost `{...}` span is parsed.
pub fn extract_json_object(text: &str) -> Result<Value, String> {
    let start = text
        .find('{')
        .ok_or_else(|| "no JSON object in model output".to_string())?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| "unterminated JSON object in model output".to_string())?;
    let value: Value =
        serde_json::from_str(&text[start..=end]).map_err(|e| format!("invalid JSON: {e}"))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("model output is not a JSON object".to_string())
    }
}

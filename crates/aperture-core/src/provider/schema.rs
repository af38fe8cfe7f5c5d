//! The rating output schema, rendered per provider dialect.
//!
//! OpenAI strict mode needs `additionalProperties: false` and every property
//! required; Gemini's `responseSchema` uses upper-case OpenAPI type names and
//! rejects `additionalProperties`; the prompt-engineered providers get the
//! same field list as plain-text instructions.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Integer,
    Number,
    Boolean,
    Text,
    Choice(&'static [&'static str]),
    TextList,
    Object(&'static [(&'static str, Kind, &'static str)]),
}

const COLOR_LABELS: &[&str] = &["red", "yellow", "green", "blue", "purple", "none"];
const DECISIONS: &[&str] = &["keep", "reject", "maybe"];

const TECHNICAL_FIELDS: &[(&str, Kind, &str)] = &[
    ("sharpness_score", Kind::Integer, "1-1000"),
    ("exposure_score", Kind::Integer, "1-1000"),
    ("composition_score", Kind::Integer, "1-1000"),
    ("color_score", Kind::Integer, "1-1000"),
    ("overall_score", Kind::Integer, "1-1000"),
    ("sharpness", Kind::Number, "0-1"),
    ("exposure", Kind::Number, "0-1"),
    ("composition", Kind::Number, "0-1"),
    ("color", Kind::Number, "0-1"),
    ("overall", Kind::Number, "0-1"),
    ("in_focus", Kind::Boolean, "true/false"),
];

const SUBJECT_FIELDS: &[(&str, Kind, &str)] = &[
    ("primary_subject", Kind::Text, "short noun phrase"),
    ("emotion", Kind::Text, "one word"),
    ("expression_score", Kind::Integer, "1-1000"),
    ("pose_score", Kind::Integer, "1-1000"),
    ("engagement_score", Kind::Integer, "1-1000"),
    ("prominence_score", Kind::Integer, "1-1000"),
    ("expression", Kind::Number, "0-1"),
    ("pose", Kind::Number, "0-1"),
    ("engagement", Kind::Number, "0-1"),
    ("prominence", Kind::Number, "0-1"),
    ("eyes_open", Kind::Boolean, "true/false"),
    ("eye_contact", Kind::Boolean, "true/false"),
];

const RATING_FIELDS: &[(&str, Kind, &str)] = &[
    ("star_rating", Kind::Integer, "1-5"),
    ("color_label", Kind::Choice(COLOR_LABELS), "one of red|yellow|green|blue|purple|none"),
    ("keep_reject", Kind::Choice(DECISIONS), "one of keep|reject|maybe"),
    ("tags", Kind::TextList, "array of short keywords"),
    ("description", Kind::Text, "one or two sentences"),
    ("technical_quality", Kind::Object(TECHNICAL_FIELDS), "object"),
    ("subject_analysis", Kind::Object(SUBJECT_FIELDS), "object"),
];

/// JSON Schema for OpenAI `response_format.json_schema` in strict mode.
pub fn openai_rating_schema() -> Value {
    render_openai(Kind::Object(RATING_FIELDS))
}

/// OpenAPI-subset schema for Gemini `generationConfig.responseSchema`.
pub fn gemini_rating_schema() -> Value {
    render_gemini(Kind::Object(RATING_FIELDS))
}

/// Plain-text output contract for providers without schema enforcement.
pub fn json_instructions() -> String {
    let mut out = String::from(
        "Respond with a single JSON object and nothing else (no markdown, no prose). \
         Use exactly these fields:\n",
    );
    describe(RATING_FIELDS, 0, &mut out);
    out
}

fn render_openai(kind: Kind) -> Value {
    match kind {
        Kind::Integer => json!({"type": "integer"}),
        Kind::Number => json!({"type": "number"}),
        Kind::Boolean => json!({"type": "boolean"}),
        Kind::Text => json!({"type": "string"}),
        Kind::Choice(values) => json!({"type": "string", "enum": values}),
        Kind::TextList => json!({"type": "array", "items": {"type": "string"}}),
        Kind::Object(fields) => {
            let mut properties = Map::new();
            for (name, kind, _) in fields {
                properties.insert((*name).to_string(), render_openai(*kind));
            }
            let required: Vec<&str> = fields.iter().map(|(name, _, _)| *name).collect();
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            })
        }
    }
}

fn render_gemini(kind: Kind) -> Value {
    match kind {
        Kind::Integer => json!({"type": "INTEGER"}),
        Kind::Number => json!({"type": "NUMBER"}),
        Kind::Boolean => json!({"type": "BOOLEAN"}),
        Kind::Text => json!({"type": "STRING"}),
        Kind::Choice(values) => json!({"type": "STRING", "enum": values}),
        Kind::TextList => json!({"type": "ARRAY", "items": {"type": "STRING"}}),
        Kind::Object(fields) => {
            let mut properties = Map::new();
            for (name, kind, _) in fields {
                properties.insert((*name).to_string(), render_gemini(*kind));
            }
            let required: Vec<&str> = fields.iter().map(|(name, _, _)| *name).collect();
            json!({
                "type": "OBJECT",
                "properties": properties,
                "required": required,
            })
        }
    }
}

fn describe(fields: &[(&str, Kind, &str)], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth + 1);
    for (name, kind, hint) in fields {
        match kind {
            Kind::Object(children) => {
                out.push_str(&format!("{indent}- {name}: object with\n"));
                describe(children, depth + 1, out);
            }
            _ => out.push_str(&format!("{indent}- {name}: {hint}\n")),
        }
    }
}

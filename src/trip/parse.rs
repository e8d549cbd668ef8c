//! Turning model text into a [`Trip`].
//!
//! Models do not always honor "no markdown": the answer may come wrapped in a code
//! fence or surrounded by prose. Extraction tries, in order, the raw text, a
//! ```` ```json ```` fence, any fence, then the outermost `{...}` span. The JSON is then
//! validated against the schema derived from [`Trip`] before being deserialized.

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::types::Trip;
use crate::{Error, ErrorContext, Result};

static JSON_FENCE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").ok());
static ANY_FENCE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"```\s*([\s\S]*?)\s*```").ok());
static OBJECT_SPAN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").ok());

static TRIP_SCHEMA: Lazy<std::result::Result<JSONSchema, String>> = Lazy::new(|| {
    let schema = trip_schema();
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| format!("Failed to compile trip schema: {}", e))
});

/// JSON Schema of the trip object.
pub fn trip_schema() -> Value {
    let schema = schemars::schema_for!(Trip);
    serde_json::to_value(&schema).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// A trip parsed from model output, together with the JSON it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrip {
    pub trip: Trip,
    /// The JSON object as the model wrote it; this is what gets persisted.
    pub raw: Value,
}

/// Locate a JSON value in free-form model text.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
        return Some(parsed);
    }

    for re in [&JSON_FENCE, &ANY_FENCE, &OBJECT_SPAN] {
        let Some(re) = (**re).as_ref() else {
            continue;
        };
        if let Some(captures) = re.captures(text) {
            let candidate = match captures.get(1) {
                Some(inner) => inner.as_str(),
                None => captures.get(0).map(|c| c.as_str()).unwrap_or(text),
            };
            if let Ok(parsed) = serde_json::from_str::<Value>(candidate.trim()) {
                return Some(parsed);
            }
        }
    }
    None
}

/// Parse and validate model output.
pub fn parse_trip(text: &str) -> Result<ParsedTrip> {
    let raw = extract_json(text).ok_or_else(|| {
        Error::parse_with_context(
            "model output is not valid JSON",
            ErrorContext::new()
                .with_details(preview(text))
                .with_source("trip_parser"),
        )
    })?;

    let schema = (*TRIP_SCHEMA)
        .as_ref()
        .map_err(|e| Error::runtime(e.clone()))?;
    if let Err(errors) = schema.validate(&raw) {
        let mut field_path = None;
        let messages: Vec<String> = errors
            .map(|e| {
                if field_path.is_none() {
                    field_path = Some(e.instance_path.to_string());
                }
                e.to_string()
            })
            .collect();
        let mut context = ErrorContext::new()
            .with_details(messages.join("; "))
            .with_source("trip_parser");
        if let Some(path) = field_path.filter(|p| !p.is_empty()) {
            context = context.with_field_path(path);
        }
        return Err(Error::parse_with_context(
            "model output does not match the trip schema",
            context,
        ));
    }

    let trip: Trip = serde_json::from_value(raw.clone()).map_err(|e| {
        Error::parse_with_context(
            format!("model output does not match the trip schema: {}", e),
            ErrorContext::new().with_source("trip_parser"),
        )
    })?;
    Ok(ParsedTrip { trip, raw })
}

/// Lenient read of a stored `tripDetail` string: any JSON object, or `None`.
pub fn parse_trip_detail(detail: &str) -> Option<Map<String, Value>> {
    match extract_json(detail)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

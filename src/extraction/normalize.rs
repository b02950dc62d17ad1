/*!
 * Normalization of the OCR webhook's reply. The webhook's response shape has
 * evolved over time; every historical shape is still accepted. Classification
 * runs the structural predicates in a fixed priority order and the first
 * match wins.
 */

use serde_json::Value;

use crate::models::ExtractionOutcome;

/// `OCRExitCode` value the OCR engine uses to report its own failure.
pub const ENGINE_FAILURE_EXIT_CODE: i64 = 3;

/// The known response shapes, newest first. Order of the variants mirrors the
/// classification priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrResponseShape {
    /// First element of a sequence carries `ParsedText`, a string that is
    /// itself JSON-encoded structured data.
    NestedEnvelope { outer_text: String },
    /// First element carries `OCRExitCode: 3`; the engine reported failure.
    EngineError { messages: Vec<String> },
    /// First element carries `ParsedResults` with a plain `ParsedText`.
    FlatResults { text: String },
    /// The payload itself (not a sequence element) carries `extractedText`.
    TopLevelField { text: String },
    /// None of the known shapes matched.
    Unrecognized,
}

/// Classify a raw payload into one of the known shapes. Pure; each predicate
/// is structural only and never inspects the inner encoded string.
pub fn classify(raw: &Value) -> OcrResponseShape {
    if let Some(entry) = first_element(raw) {
        if let Some(outer_text) = entry.get("ParsedText").and_then(Value::as_str) {
            return OcrResponseShape::NestedEnvelope {
                outer_text: outer_text.to_string(),
            };
        }
        if entry.get("OCRExitCode").and_then(Value::as_i64) == Some(ENGINE_FAILURE_EXIT_CODE) {
            return OcrResponseShape::EngineError {
                messages: error_messages(entry),
            };
        }
        if let Some(text) = flat_results_text(entry) {
            return OcrResponseShape::FlatResults {
                text: text.to_string(),
            };
        }
    } else if let Some(text) = raw.get("extractedText").and_then(Value::as_str) {
        return OcrResponseShape::TopLevelField {
            text: text.to_string(),
        };
    }
    OcrResponseShape::Unrecognized
}

/// Map a raw payload to a single success-or-failure outcome.
///
/// An unrecognized shape is deliberately surfaced to the user as a result
/// rather than failing hard, and it is accounted as a success by the caller.
pub fn normalize(raw: &Value) -> ExtractionOutcome {
    match classify(raw) {
        OcrResponseShape::NestedEnvelope { outer_text } => {
            // Inner decode failure degrades to the outer string verbatim.
            let text = decode_nested(&outer_text).unwrap_or(outer_text);
            ExtractionOutcome::Success { text }
        }
        OcrResponseShape::EngineError { messages } => {
            let joined = if messages.is_empty() {
                "Unknown error occurred".to_string()
            } else {
                messages.join(". ")
            };
            ExtractionOutcome::Failure {
                message: format!("Error from OCR service: {joined}"),
            }
        }
        OcrResponseShape::FlatResults { text } | OcrResponseShape::TopLevelField { text } => {
            ExtractionOutcome::Success { text }
        }
        OcrResponseShape::Unrecognized => ExtractionOutcome::Success {
            text: format!("Raw API Response: {}", pretty(raw)),
        },
    }
}

fn first_element(raw: &Value) -> Option<&Value> {
    raw.as_array()?.first()
}

fn flat_results_text(entry: &Value) -> Option<&str> {
    let results = entry.get("ParsedResults")?.as_array()?;
    results.first()?.get("ParsedText")?.as_str()
}

/// Decode the nested envelope's inner string and pull the parsed text out of
/// it. `None` means the inner decode (or its expected structure) failed.
fn decode_nested(outer_text: &str) -> Option<String> {
    let inner: Value = serde_json::from_str(outer_text).ok()?;
    flat_results_text(&inner).map(str::to_string)
}

/// `ErrorMessage` is a string or an ordered sequence of strings.
fn error_messages(entry: &Value) -> Vec<String> {
    match entry.get("ErrorMessage") {
        Some(Value::String(message)) => vec![message.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn pretty(raw: &Value) -> String {
    serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string())
}

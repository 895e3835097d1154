//! Three-tier structured output.
//!
//! Generative models are asked for JSON matching a declared shape, but their
//! output drifts: code fences, leading prose, missing fields, or no JSON at
//! all. Rather than surfacing those as errors, parsing degrades through
//! tiers:
//!
//! 1. [`Structured::Valid`] - strict parse succeeded
//! 2. [`Structured::Recovered`] - a loose parse filled gaps with defaults
//! 3. [`Structured::Fallback`] - nothing usable; the caller gets `T::default()`
//!
//! Callers only ever see a `T`; telemetry distinguishes the tiers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A structured result with its recovery tier.
#[derive(Debug, Clone)]
pub enum Structured<T> {
    /// Output matched the declared shape exactly.
    Valid(T),
    /// Output was malformed but partially usable; missing or mistyped
    /// fields were filled from defaults.
    Recovered { value: T, warnings: Vec<String> },
    /// Output was unusable; the value is `T::default()`.
    Fallback(T),
}

impl<T> Structured<T> {
    /// Unwrap to the inner value, whatever the tier.
    pub fn into_inner(self) -> T {
        match self {
            Self::Valid(value) => value,
            Self::Recovered { value, .. } => value,
            Self::Fallback(value) => value,
        }
    }

    /// Borrow the inner value.
    pub fn inner(&self) -> &T {
        match self {
            Self::Valid(value) => value,
            Self::Recovered { value, .. } => value,
            Self::Fallback(value) => value,
        }
    }

    /// Tier name for telemetry.
    pub fn tier(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Recovered { .. } => "recovered",
            Self::Fallback(_) => "fallback",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Parse raw model output into `T`, degrading through recovery tiers.
pub fn parse_structured<T>(raw: &str) -> Structured<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let cleaned = strip_code_fences(raw);

    // Tier 1: strict parse
    if let Ok(value) = serde_json::from_str::<T>(cleaned) {
        return Structured::Valid(value);
    }

    // Tier 2: extract the outermost JSON object and overlay it onto the
    // default shape so missing fields become defaults instead of errors.
    if let Some(fragment) = extract_json_object(cleaned) {
        if let Ok(parsed) = serde_json::from_str::<Value>(fragment) {
            let mut warnings = vec!["strict schema validation failed".to_string()];
            if let Some(value) = overlay_on_default::<T>(&parsed, &mut warnings) {
                return Structured::Recovered { value, warnings };
            }
        }
    }

    // Tier 3: nothing usable
    Structured::Fallback(T::default())
}

/// Strip markdown code fences that models wrap JSON in.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim_end_matches("```").trim()
}

/// Find the outermost `{ ... }` span in free text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Overlay parsed fields onto `T::default()` and deserialize the result.
fn overlay_on_default<T>(parsed: &Value, warnings: &mut Vec<String>) -> Option<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let parsed_map = parsed.as_object()?;
    let mut base = serde_json::to_value(T::default()).ok()?;
    let Some(base_map) = base.as_object_mut() else {
        return None;
    };

    for (key, value) in parsed_map {
        if base_map.contains_key(key) {
            base_map.insert(key.clone(), value.clone());
        } else {
            warnings.push(format!("dropped unknown field '{key}'"));
        }
    }

    match serde_json::from_value::<T>(base) {
        Ok(value) => Some(value),
        Err(e) => {
            // A provided field had an incompatible type; retry with defaults
            // only for the offending shape by falling back entirely.
            warnings.push(format!("loose parse failed: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(default)]
        message: String,
        #[serde(default)]
        items: Vec<String>,
    }

    #[test]
    fn test_valid_tier() {
        let result: Structured<Sample> =
            parse_structured(r#"{"message": "hi", "items": ["a"]}"#);
        assert!(result.is_valid());
        assert_eq!(result.inner().items, vec!["a"]);
    }

    #[test]
    fn test_strips_code_fences() {
        let raw = "```json\n{\"message\": \"hi\", \"items\": []}\n```";
        let result: Structured<Sample> = parse_structured(raw);
        assert!(result.is_valid());
        assert_eq!(result.inner().message, "hi");
    }

    #[test]
    fn test_recovered_tier_fills_defaults() {
        // Leading prose and an unknown field; strict parse fails
        let raw = "Here is the result: {\"message\": \"hi\", \"mood\": \"upbeat\"} hope it helps";
        let result: Structured<Sample> = parse_structured(raw);

        match &result {
            Structured::Recovered { value, warnings } => {
                assert_eq!(value.message, "hi");
                assert!(value.items.is_empty());
                assert!(warnings.iter().any(|w| w.contains("mood")));
            }
            other => panic!("expected recovered tier, got {}", other.tier()),
        }
    }

    #[test]
    fn test_fallback_tier() {
        let result: Structured<Sample> = parse_structured("I could not produce JSON, sorry.");
        assert!(result.is_fallback());
        assert_eq!(*result.inner(), Sample::default());
    }
}

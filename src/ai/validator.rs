//! Untrusted-output handling. Raw model text is stripped of transport
//! artifacts, parsed, and structurally checked before anything downstream
//! is allowed to treat it as a domain record.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::LocationCandidate;

/// Intermediate study plan shape, pre-ownership-stamping. Field defaults
/// are deliberately lenient; semantic checks happen after parsing.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedPlan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub days: Vec<ParsedDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedDay {
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub scripture: String,
    #[serde(rename = "supportingRefs", default)]
    pub supporting_refs: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub reflection: String,
    #[serde(default)]
    pub prayer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedBulletin {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub events: Vec<ParsedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
}

/// Strip a wrapping markdown code fence (```json ... ``` or bare ``` ...
/// ```) if present. Anything else passes through trimmed.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|_| AppError::MalformedResponse {
        snippet: snippet(cleaned),
    })
}

/// Enough of the offending payload for diagnostics, never the whole thing.
fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{}…", head)
    }
}

/// Parse and validate a study plan payload. The schema sent with the
/// request already demands exactly `expected_days` entries, but the model
/// is not trusted to obey it: a result with any other day count is a
/// generation failure, not a success.
pub fn parse_study_plan(raw: &str, expected_days: u32) -> Result<ParsedPlan> {
    let plan: ParsedPlan = parse_json(raw)?;
    if plan.days.len() != expected_days as usize {
        tracing::warn!(
            "Expected {} study days, model returned {}",
            expected_days,
            plan.days.len()
        );
        return Err(AppError::IncompleteGeneration);
    }
    Ok(plan)
}

/// Parse a bulletin payload. Missing summary or an empty event list are
/// both tolerated: an announcements-only bulletin is a valid outcome.
pub fn parse_bulletin(raw: &str) -> Result<ParsedBulletin> {
    parse_json(raw)
}

/// Parse a location search payload, keeping only entries with a string
/// name and numeric coordinates. Bad entries are dropped, not fatal:
/// partial results are still useful.
pub fn parse_locations(raw: &str) -> Result<Vec<LocationCandidate>> {
    let value: Value = parse_json(raw)?;
    let Some(entries) = value.as_array() else {
        return Err(AppError::MalformedResponse {
            snippet: snippet(strip_code_fences(raw)),
        });
    };

    let candidates = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let latitude = entry.get("latitude")?.as_f64()?;
            let longitude = entry.get("longitude")?.as_f64()?;
            let address = entry
                .get("address")
                .and_then(|a| a.as_str())
                .unwrap_or_default();
            Some(LocationCandidate {
                name: name.to_string(),
                address: address.to_string(),
                latitude,
                longitude,
            })
        })
        .collect();

    Ok(candidates)
}

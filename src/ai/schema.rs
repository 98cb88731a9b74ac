//! Declared output contracts, one per use case. These travel to the model
//! as `responseSchema` and are the shape the Response Validator expects.

use serde_json::{json, Value};

/// Schema for a multi-day study plan with exactly `days` entries carrying
/// `refs` supporting references each.
pub fn study_plan_schema(days: u32, refs: u8) -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "speaker": { "type": "string" },
            "days": {
                "type": "array",
                "minItems": days,
                "maxItems": days,
                "items": {
                    "type": "object",
                    "properties": {
                        "day": { "type": "integer" },
                        "topic": { "type": "string" },
                        "scripture": { "type": "string" },
                        "supportingRefs": {
                            "type": "array",
                            "maxItems": refs,
                            "items": { "type": "string" }
                        },
                        "body": { "type": "string" },
                        "reflection": { "type": "string" },
                        "prayer": { "type": "string" }
                    },
                    "required": ["day", "topic", "scripture", "body", "reflection", "prayer"]
                }
            }
        },
        "required": ["title", "days"]
    })
}

/// Schema for a scanned bulletin. Summary and events are both optional: an
/// announcements-only bulletin with no datable events is a valid outcome.
pub fn bulletin_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "summary": { "type": "string" },
            "events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "date": { "type": "string", "description": "ISO date, yyyy-mm-dd" },
                        "time": { "type": "string" },
                        "location": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["title", "date"]
                }
            }
        },
        "required": ["title"]
    })
}

/// Schema for a church location search.
pub fn location_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "address": { "type": "string" },
                "latitude": { "type": "number" },
                "longitude": { "type": "number" }
            },
            "required": ["name", "latitude", "longitude"]
        }
    })
}

mod client;
mod prompts;
mod schema;
mod validator;

pub use client::{GeminiClient, InlinePart, Part};
pub use prompts::{assemble_bulletin_parts, assemble_location_parts, assemble_study_parts};
pub use schema::{bulletin_schema, location_schema, study_plan_schema};
pub use validator::{
    parse_bulletin, parse_locations, parse_study_plan, ParsedBulletin, ParsedDay, ParsedEvent,
    ParsedPlan,
};

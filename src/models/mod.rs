mod bulletin;
mod input;
mod location;
mod plan;
mod settings;

pub use bulletin::{Bulletin, EventRecord};
pub use input::{GenerationInput, MediaBlob};
pub use location::LocationCandidate;
pub use plan::{DayEntry, StudyPlan};
pub use settings::{GenerationSettings, StudyDuration, StudyLength};

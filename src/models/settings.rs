use serde::{Deserialize, Serialize};

/// Hard cap on supporting references per day, whatever the config says.
pub const MAX_SUPPORTING_REFS: u8 = 5;

/// How many days the generated study should span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyDuration {
    ThreeDays,
    #[default]
    FiveDays,
    SevenDays,
    FourteenDays,
}

impl StudyDuration {
    pub fn day_count(&self) -> u32 {
        match self {
            StudyDuration::ThreeDays => 3,
            StudyDuration::FiveDays => 5,
            StudyDuration::SevenDays => 7,
            StudyDuration::FourteenDays => 14,
        }
    }
}

/// Target length of each day's devotional body, in three fixed tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StudyLength {
    /// Approximate word-count target quoted to the model.
    pub fn target_words(&self) -> u32 {
        match self {
            StudyLength::Short => 150,
            StudyLength::Medium => 300,
            StudyLength::Long => 500,
        }
    }
}

/// Durable per-user generation preferences. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub duration: StudyDuration,

    #[serde(default)]
    pub length: StudyLength,

    /// Supporting scripture references requested per day.
    #[serde(default = "default_supporting_refs")]
    pub supporting_refs: u8,

    /// Freeform description of the user's home church / area, used only to
    /// pick prompt phrasing.
    pub home_location: Option<String>,
}

fn default_supporting_refs() -> u8 {
    2
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            duration: StudyDuration::default(),
            length: StudyLength::default(),
            supporting_refs: default_supporting_refs(),
            home_location: None,
        }
    }
}

impl GenerationSettings {
    /// Reference count after applying the hard cap.
    pub fn capped_refs(&self) -> u8 {
        self.supporting_refs.min(MAX_SUPPORTING_REFS)
    }
}

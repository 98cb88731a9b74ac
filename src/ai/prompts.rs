//! Request assembly: turns user input plus settings into the ordered part
//! list sent to the model. Attachments go first (audio, then images, then
//! the user's own text) so the model sees all evidence before the
//! directive; the instructional text is always the last part.

use crate::error::{AppError, Result};
use crate::media::to_attachment;
use crate::models::{GenerationInput, GenerationSettings, MediaBlob};

use super::client::Part;

/// Build the part list for study plan generation.
pub fn assemble_study_parts(
    input: &GenerationInput,
    settings: &GenerationSettings,
) -> Result<Vec<Part>> {
    if input.is_empty() {
        return Err(AppError::EmptyInput);
    }

    let mut parts = Vec::new();

    if let Some(audio) = &input.audio {
        if !audio.is_empty() {
            parts.push(Part::Inline {
                inline_data: to_attachment(audio),
            });
        }
    }

    for image in &input.images {
        if !image.is_empty() {
            parts.push(Part::Inline {
                inline_data: to_attachment(image),
            });
        }
    }

    if let Some(text) = &input.text {
        if !text.trim().is_empty() {
            parts.push(Part::Text {
                text: format!("Sermon notes / transcript:\n{}", text),
            });
        }
    }

    if parts.is_empty() {
        return Err(AppError::EmptyInput);
    }

    parts.push(Part::Text {
        text: study_instruction(settings),
    });

    Ok(parts)
}

/// Build the part list for bulletin scanning.
pub fn assemble_bulletin_parts(images: &[MediaBlob]) -> Result<Vec<Part>> {
    let mut parts: Vec<Part> = images
        .iter()
        .filter(|img| !img.is_empty())
        .map(|img| Part::Inline {
            inline_data: to_attachment(img),
        })
        .collect();

    if parts.is_empty() {
        return Err(AppError::EmptyInput);
    }

    parts.push(Part::Text {
        text: BULLETIN_INSTRUCTION.to_string(),
    });

    Ok(parts)
}

/// Build the part list for a church location search.
pub fn assemble_location_parts(query: &str) -> Result<Vec<Part>> {
    if query.trim().is_empty() {
        return Err(AppError::EmptyInput);
    }

    Ok(vec![Part::Text {
        text: format!(
            "List churches matching the following search, with their street \
             address and geographic coordinates. Search: {}",
            query.trim()
        ),
    }])
}

fn study_instruction(settings: &GenerationSettings) -> String {
    let days = settings.duration.day_count();
    let words = settings.length.target_words();
    let refs = settings.capped_refs();

    let mut instruction = format!(
        "You are given a sermon (recording, photographed notes, or transcript). \
         Write a {days}-day devotional study plan drawn from its message.\n\
         For each day provide: the day number (1 through {days}), a topic, the \
         primary scripture reference, exactly {refs} supporting scripture \
         references, a devotional of about {words} words, a reflection question, \
         and a short prayer.\n\
         Also extract the sermon title and, if identifiable, the speaker's name."
    );

    if let Some(home) = &settings.home_location {
        if !home.trim().is_empty() {
            instruction.push_str(&format!(
                "\nWrite for a reader whose home congregation is {}.",
                home.trim()
            ));
        }
    }

    instruction
}

const BULLETIN_INSTRUCTION: &str = "You are given photographs of a church bulletin. \
Extract the bulletin title, a short summary of its announcements, and every \
datable event. For each event provide its title, calendar date in yyyy-mm-dd \
form, start time as printed, location, and a one-line description. Omit \
events with no identifiable date.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StudyDuration, StudyLength};

    fn text_of(part: &Part) -> &str {
        match part {
            Part::Text { text } => text,
            Part::Inline { .. } => panic!("expected text part"),
        }
    }

    #[test]
    fn empty_input_fails_fast() {
        let err = assemble_study_parts(&GenerationInput::default(), &GenerationSettings::default())
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyInput));
    }

    #[test]
    fn instruction_contains_configured_literals() {
        let settings = GenerationSettings {
            duration: StudyDuration::FiveDays,
            length: StudyLength::Medium,
            supporting_refs: 2,
            home_location: None,
        };
        let parts =
            assemble_study_parts(&GenerationInput::from_text("notes"), &settings).unwrap();
        let instruction = text_of(parts.last().unwrap());

        assert!(instruction.contains("5-day"));
        assert!(instruction.contains("300 words"));
        assert!(instruction.contains("exactly 2 supporting"));
    }

    #[test]
    fn attachments_precede_instruction_in_priority_order() {
        let input = GenerationInput {
            audio: Some(MediaBlob::new(vec![1], "audio/m4a")),
            images: vec![MediaBlob::new(vec![2], "image/jpeg")],
            text: Some("typed notes".to_string()),
            audio_duration_secs: 30,
        };
        let parts = assemble_study_parts(&input, &GenerationSettings::default()).unwrap();

        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], Part::Inline { inline_data } if inline_data.mime_type == "audio/m4a"));
        assert!(matches!(&parts[1], Part::Inline { inline_data } if inline_data.mime_type == "image/jpeg"));
        assert!(text_of(&parts[2]).contains("typed notes"));
        // Directive comes last, after all evidence.
        assert!(text_of(&parts[3]).contains("devotional study plan"));
    }

    #[test]
    fn home_location_changes_phrasing() {
        let settings = GenerationSettings {
            home_location: Some("Grace Chapel, Austin".to_string()),
            ..Default::default()
        };
        let parts =
            assemble_study_parts(&GenerationInput::from_text("notes"), &settings).unwrap();
        assert!(text_of(parts.last().unwrap()).contains("Grace Chapel, Austin"));
    }

    #[test]
    fn bulletin_parts_require_an_image() {
        assert!(matches!(
            assemble_bulletin_parts(&[]),
            Err(AppError::EmptyInput)
        ));
        let parts =
            assemble_bulletin_parts(&[MediaBlob::new(vec![9], "image/jpeg")]).unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn blank_location_query_is_rejected() {
        assert!(matches!(
            assemble_location_parts("   "),
            Err(AppError::EmptyInput)
        ));
    }
}

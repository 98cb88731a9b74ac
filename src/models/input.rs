/// A raw binary capture plus the MIME type it should travel under.
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl MediaBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Whatever the user supplied for one generation run. All fields optional,
/// but at least one must be non-empty before a request can be assembled.
#[derive(Debug, Clone, Default)]
pub struct GenerationInput {
    pub audio: Option<MediaBlob>,
    pub images: Vec<MediaBlob>,
    pub text: Option<String>,
    /// Duration of the audio capture in seconds, 0 when not audio-derived.
    pub audio_duration_secs: u32,
}

impl GenerationInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_images(images: Vec<MediaBlob>) -> Self {
        Self {
            images,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        let audio_empty = self.audio.as_ref().map_or(true, |a| a.is_empty());
        let images_empty = self.images.iter().all(|i| i.is_empty());
        let text_empty = self
            .text
            .as_ref()
            .map_or(true, |t| t.trim().is_empty());
        audio_empty && images_empty && text_empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_input_is_empty() {
        assert!(GenerationInput::default().is_empty());
    }

    #[test]
    fn whitespace_text_counts_as_empty() {
        let input = GenerationInput::from_text("   \n  ");
        assert!(input.is_empty());
    }

    #[test]
    fn single_image_is_not_empty() {
        let input = GenerationInput::from_images(vec![MediaBlob::new(vec![1, 2, 3], "image/jpeg")]);
        assert!(!input.is_empty());
    }
}

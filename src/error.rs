use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// No usable content was assembled from the user's input. Raised before
    /// any network call is made.
    #[error("No sermon content was provided")]
    EmptyInput,

    /// The generation service cannot be used at all (no API key configured).
    #[error("Generation service is not configured")]
    GenerationUnavailable,

    /// The model answered but carried no text payload.
    #[error("The model returned an empty response")]
    GenerationEmptyResponse,

    /// The model's text could not be parsed as the declared schema. Carries
    /// a truncated snippet of the offending payload for diagnostics.
    #[error("Could not parse model response: {snippet}")]
    MalformedResponse { snippet: String },

    /// Syntactically valid JSON that is semantically empty (e.g. a study
    /// plan with zero days).
    #[error("The model returned an incomplete result")]
    IncompleteGeneration,

    /// The processing watchdog fired before the generation round-trip
    /// finished. The in-flight call is detached, not aborted.
    #[error("Processing timed out after {0} seconds")]
    ProcessingTimeout(u64),

    /// A second processing request arrived while one was already in flight.
    #[error("Another request is already being processed")]
    AlreadyProcessing,

    /// Non-success status from the generation API, with the response body.
    #[error("Generation API error: {0}")]
    GenerationApi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether re-running the whole pipeline with the same input could
    /// plausibly succeed. Untrusted-output faults, the local watchdog, and
    /// service-side failures (a 5xx is usually transient) are retryable; a
    /// missing credential is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::GenerationEmptyResponse
                | AppError::MalformedResponse { .. }
                | AppError::IncompleteGeneration
                | AppError::ProcessingTimeout(_)
                | AppError::GenerationApi(_)
                | AppError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_faults_are_retryable_missing_setup_is_not() {
        assert!(AppError::GenerationApi("HTTP 503: overloaded".to_string()).is_retryable());
        assert!(AppError::ProcessingTimeout(120).is_retryable());
        assert!(AppError::IncompleteGeneration.is_retryable());
        assert!(!AppError::GenerationUnavailable.is_retryable());
        assert!(!AppError::EmptyInput.is_retryable());
    }
}

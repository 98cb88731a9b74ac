use crate::config::Config;
use crate::models::GenerationSettings;

/// Identity and preferences for one pipeline invocation, passed explicitly
/// into every entry point. Ownership stamping always reads from here, never
/// from model output or any ambient cache.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub settings: GenerationSettings,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>, settings: GenerationSettings) -> Self {
        Self {
            user_id: user_id.into(),
            settings,
        }
    }
}

impl From<&Config> for UserSession {
    fn from(config: &Config) -> Self {
        Self {
            user_id: config.user_id.clone(),
            settings: config.settings.clone(),
        }
    }
}

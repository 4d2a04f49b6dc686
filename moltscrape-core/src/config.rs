use crate::error::ConfigError;

pub const MOLTBOOK_API_KEY_VAR: &str = "MOLTBOOK_API_KEY";
pub const LANGSMITH_API_KEY_VAR: &str = "LANGSMITH_API_KEY";

/// API credentials picked up from the environment. The Moltbook listing
/// endpoint is public, so its key is optional; the uploaders refuse to
/// run without the analytics key.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub moltbook_api_key: Option<String>,
    pub langsmith_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            moltbook_api_key: read_env(MOLTBOOK_API_KEY_VAR),
            langsmith_api_key: read_env(LANGSMITH_API_KEY_VAR),
        }
    }

    pub fn require_langsmith_key(&self) -> Result<&str, ConfigError> {
        self.langsmith_api_key
            .as_deref()
            .ok_or(ConfigError::MissingEnvironmentVariable {
                var_name: LANGSMITH_API_KEY_VAR.to_string(),
            })
    }
}

fn read_env(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

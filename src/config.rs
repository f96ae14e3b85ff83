use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::openai::LlmError;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const ENV_API_URL: &str = "STORYLOOM_API_URL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "STORYLOOM_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_owned(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl LlmConfig {
    /// Defaults, then the JSON file (when given and present), then the
    /// environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?.unwrap_or_default(),
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn read_file(path: &Path) -> anyhow::Result<Option<Self>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("read llm config: {}", path.display())));
            }
        };
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parse llm config: {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        crate::store::write_json_atomic(path, self)
            .with_context(|| format!("write llm config: {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.model = model;
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_url.trim().is_empty() {
            missing.push("apiUrl");
        }
        if self.api_key.trim().is_empty() {
            missing.push("apiKey");
        }
        if self.model.trim().is_empty() {
            missing.push("model");
        }
        missing
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LlmError::MissingConfig(missing.join(", ")))
        }
    }

    /// The key with all but its last four characters hidden.
    pub fn masked_key(&self) -> String {
        let chars = self.api_key.chars().collect::<Vec<_>>();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail = chars[chars.len() - 4..].iter().collect::<String>();
        format!("{}{tail}", "*".repeat(chars.len() - 4))
    }
}

//! Configuration file support

use parley_ai::{
    CompletionConfig, EmptyFramePolicy,
    providers::{get_api_key, openai::API_KEY_ENV},
};
use parley_chat::DEFAULT_SYSTEM_PROMPT;
use parley_tui::ThemeName;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for parley
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to request
    pub model: Option<String>,
    /// Upper bound on tokens generated per reply
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Instruction prepended to every new conversation
    pub system_prompt: Option<String>,
    /// Base URL of an OpenAI-compatible server
    pub base_url: Option<String>,
    /// What to do with frames that carry no JSON object
    pub empty_frame_policy: Option<EmptyFramePolicy>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Color theme for TUI mode
    pub theme: Option<ThemeName>,
    /// API key (alternative to the environment variable)
    pub api_key: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Parse config file contents
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let defaults = CompletionConfig::default();
        let default_config = Config {
            model: Some(defaults.model),
            max_tokens: Some(defaults.max_tokens),
            temperature: Some(defaults.temperature),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            base_url: None,
            empty_frame_policy: Some(EmptyFramePolicy::default()),
            tui: Some(true),
            theme: Some(ThemeName::default()),
            api_key: None,
        };

        default_config.save()?;
        Ok(path)
    }

    /// Request parameters from the file, with defaults for anything unset
    pub fn completion_config(&self) -> CompletionConfig {
        let mut config = CompletionConfig::default();
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        config
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Get the API key, checking config then the environment
    pub fn api_key(&self) -> Option<String> {
        get_api_key(self.api_key.as_deref(), API_KEY_ENV).ok()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux) or set PARLEY_CONFIG_PATH

# Model and sampling parameters
model = "gpt-4"
max_tokens = 600
temperature = 0.5

# Instruction sent at the start of every conversation
system_prompt = "You are a chat bot. Please return all responses in Markdown."

# Any OpenAI-compatible server (optional)
# base_url = "http://localhost:11434/v1"

# Frames with no JSON object: "end-stream" or "skip-unless-done"
empty_frame_policy = "end-stream"

# Whether to use TUI mode by default
# Set to false for simple stdin/stdout mode
tui = true

# "dark" or "light"
theme = "dark"

# API key (optional - OPENAI_API_KEY is used otherwise)
# api_key = "sk-..."
"#
}

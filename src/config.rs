use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::relay::NormalizationPolicy;

pub const QUESTION_PLACEHOLDER: &str = "{question}";

const DEFAULT_SYSTEM_INSTRUCTIONS: &str = r#"You are PoultryPro AI for Kenyan farmers. RESPOND STRICTLY IN THIS FORMAT:

1. [Main advice in 15 words]
   [Kiswahili translation in brackets]
2. [Supplemental tip]
3. [Safety warning/consideration]

KENYAN CONTEXT MUSTS:
- Recommend Unga wa Kuku Fugo, Amaranth, KARIBRO feed
- Mention common brands: Unga Farmcare, EDEN Poultry Feeds
- Key diseases: Newcastle [Kifaranga], Gumboro, Coccidiosis"#;

const DEFAULT_QUESTION_FRAME: &str =
    "SWALI: {question}\nJIBU kwa: 1) Ushauri, 2) Nyongeza, 3) Tahadhari";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub prompt: PromptConfig,
    pub apology: ApologyConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl Mode {
    pub fn is_development(self) -> bool {
        self == Mode::Development
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            cors_origins: vec!["*".to_string()],
            body_limit_bytes: 10 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: String::new(),
            max_output_tokens: 120,
            temperature: 0.3,
            top_p: 0.85,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Body fields that may carry the question, in order of preference.
    pub field_aliases: Vec<String>,
    pub min_question_chars: usize,
    pub normalization: NormalizationPolicy,
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            field_aliases: vec!["message".to_string(), "question".to_string()],
            min_question_chars: 3,
            normalization: NormalizationPolicy::BulletExtraction,
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub system_instructions: String,
    /// Must contain `{question}` when set. An empty string disables framing.
    pub question_frame: Option<String>,
    /// An empty `user` text disables the exemplar turn.
    pub exemplar: Option<ExemplarConfig>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_instructions: DEFAULT_SYSTEM_INSTRUCTIONS.to_string(),
            question_frame: Some(DEFAULT_QUESTION_FRAME.to_string()),
            exemplar: Some(ExemplarConfig {
                user: "Mfano wa jibu: Ugavi wa lishe bora kwa kuku".to_string(),
                model: None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemplarConfig {
    pub user: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApologyConfig {
    pub error: String,
    pub action: String,
}

impl Default for ApologyConfig {
    fn default() -> Self {
        Self {
            error: "Samahani, kuna shida kiufundi [Technical error]".to_string(),
            action: "Tafadhali jaribu tena baada ya dakika chache".to_string(),
        }
    }
}

impl Config {
    /// Resolves the config file (explicit path, user config dir, `./config.toml`),
    /// falls back to defaults when none exists, then applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                tracing::info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        let user_config = directories::ProjectDirs::from("com", "local", "kuku")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        Ok(user_config
            .into_iter()
            .chain(std::iter::once(PathBuf::from("config.toml")))
            .find(|p| p.exists()))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(mode) = lookup("KUKU_MODE") {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(e) => tracing::warn!("Ignoring KUKU_MODE: {}", e),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.prompt.system_instructions.trim().is_empty() {
            anyhow::bail!("prompt.system_instructions must not be empty");
        }
        if self.pipeline.field_aliases.iter().all(|a| a.trim().is_empty()) {
            anyhow::bail!("pipeline.field_aliases must name at least one field");
        }
        if self.pipeline.min_question_chars == 0 {
            anyhow::bail!("pipeline.min_question_chars must be at least 1");
        }
        if let Some(frame) = &self.prompt.question_frame
            && !frame.trim().is_empty()
            && !frame.contains(QUESTION_PLACEHOLDER)
        {
            anyhow::bail!(
                "prompt.question_frame must contain the {} placeholder",
                QUESTION_PLACEHOLDER
            );
        }
        if self.llm.api_key.is_empty() {
            tracing::warn!("No GEMINI_API_KEY configured; backend calls will fail");
        }
        Ok(())
    }

    /// Copy safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.llm.api_key.is_empty() {
            config.llm.api_key = "***".to_string();
        }
        config
    }
}

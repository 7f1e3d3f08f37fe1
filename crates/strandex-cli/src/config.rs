use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use strandex_agents::{default_agents_dir, expand_path};
use strandex_providers::{default_threads, LlamaConfig};

/// Prefix for environment overrides, e.g. `STRANDEX_LLAMA_MODEL_PATH`.
pub const ENV_PREFIX: &str = "STRANDEX_";

/// Process-wide settings, read once at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// GGUF model file; required only when a backend is started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llama_model_path: Option<String>,

    #[serde(default = "default_ctx")]
    pub llama_ctx: u32,

    #[serde(default = "default_threads")]
    pub llama_threads: usize,

    #[serde(default)]
    pub llama_gpu_layers: u32,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub llama_verbose: bool,

    /// `llama-server` executable
    #[serde(default = "default_server")]
    pub llama_server: String,

    /// Attach to this running server instead of spawning one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llama_url: Option<String>,

    #[serde(default = "default_port")]
    pub llama_port: u16,

    /// Render results as Markdown on terminals
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub render: bool,

    /// Stream the final summary as it is generated
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub stream: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_dir: Option<String>,

    /// Write a Markdown report file per run
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub report: bool,

    /// Directory for report files (defaults to the working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

fn default_ctx() -> u32 {
    4096
}

fn default_server() -> String {
    "llama-server".to_string()
}

fn default_port() -> u16 {
    8089
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llama_model_path: None,
            llama_ctx: default_ctx(),
            llama_threads: default_threads(),
            llama_gpu_layers: 0,
            llama_verbose: false,
            llama_server: default_server(),
            llama_url: None,
            llama_port: default_port(),
            render: true,
            stream: true,
            log_level: None,
            agents_dir: None,
            report: true,
            output_dir: None,
        }
    }
}

/// Accepts booleans, 0/1 and the usual yes/no/on/off spellings.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(n) => Ok(n != 0),
        Flag::Text(s) => parse_flag(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean value: {:?}", s))),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Read `.env` into the environment. A missing file is not an error; any
/// other failure is returned for the caller to report once logging is up.
pub fn load_dotenv() -> Option<dotenvy::Error> {
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

impl Settings {
    /// Load defaults, then the config file, then `STRANDEX_*` variables.
    pub fn load() -> Result<Self> {
        Self::figment(Self::config_path().ok())
            .extract()
            .context("Invalid strandex configuration")
    }

    fn figment(config_file: Option<PathBuf>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("strandex").join("config.toml"))
    }

    /// Backend construction parameters.
    pub fn to_llama_config(&self) -> LlamaConfig {
        let mut config = LlamaConfig::new()
            .with_ctx(self.llama_ctx)
            .with_threads(self.llama_threads.max(1))
            .with_gpu_layers(self.llama_gpu_layers)
            .with_verbose(self.llama_verbose)
            .with_server_bin(self.llama_server.as_str())
            .with_port(self.llama_port);

        if let Some(path) = self.llama_model_path.as_deref().filter(|p| !p.is_empty()) {
            config = config.with_model_path(expand_path(path));
        }
        if let Some(url) = self.llama_url.as_deref().filter(|u| !u.is_empty()) {
            config = config.with_server_url(url);
        }
        config
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.agents_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(expand_path)
            .unwrap_or_else(default_agents_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }
}

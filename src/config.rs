use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agents::RequestSettings;
use crate::document::DocumentConfig;

// ── Prompt paths ──────────────────────────────────────────────────────────────

/// Optional system-prompt files, one per agent. Unset or unreadable entries
/// fall back to the built-in prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptPaths {
    pub edit: Option<PathBuf>,
    pub fix: Option<PathBuf>,
    pub condense: Option<PathBuf>,
    pub expand: Option<PathBuf>,
}

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// OpenAI-compatible base URL, including the version segment
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional API key (sent as Bearer token)
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Cap on completion length for every operation except unbounded reroll.
    #[serde(default = "default_max_tokens")]
    pub max_output_tokens: u32,
    /// Recorded in saved documents; not enforced.
    #[serde(default = "default_max_tokens")]
    pub max_input_tokens: u32,
    /// Character budget for preceding/subsequent context.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub prompts: PromptPaths,
}

fn default_endpoint() -> String {
    "https://api.cerebras.ai/v1".to_string()
}

fn default_model() -> String {
    "llama3.1-8b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_context_chars() -> usize {
    2000
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_tokens(),
            max_input_tokens: default_max_tokens(),
            context_chars: default_context_chars(),
            request_timeout_secs: default_request_timeout(),
            prompts: PromptPaths::default(),
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Directory new documents are saved under
    #[serde(default = "default_works_dir")]
    pub works_dir: PathBuf,

    /// JSON-lines log file; defaults under the data directory
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

fn default_works_dir() -> PathBuf {
    PathBuf::from("works")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: HashMap::new(),
            works_dir: default_works_dir(),
            log_path: None,
        }
    }
}

impl ConfigFile {
    /// Load from `path`, or return a default config if the file doesn't exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to `path` (only if it doesn't exist).
    pub fn write_default_if_missing(path: &Path) -> Result<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(path.to_path_buf())
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub max_input_tokens: u32,
    pub context_chars: usize,
    pub request_timeout_secs: u64,
    pub prompts: PromptPaths,
    pub works_dir: PathBuf,
    pub log_path: PathBuf,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        endpoint_override: Option<&str>,
        model_override: Option<&str>,
        api_key_override: Option<&str>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            endpoint: endpoint_override
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            model: model_override
                .map(str::to_string)
                .unwrap_or(base.model),
            api_key: api_key_override
                .map(str::to_string)
                .or(base.api_key)
                .filter(|k| !k.is_empty()),
            profile_name,
            temperature: base.temperature,
            max_output_tokens: base.max_output_tokens,
            max_input_tokens: base.max_input_tokens,
            context_chars: base.context_chars,
            request_timeout_secs: base.request_timeout_secs,
            prompts: base.prompts,
            works_dir: file.works_dir.clone(),
            log_path: file.log_path.clone().unwrap_or_else(default_log_path),
        }
    }

    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            context_chars: self.context_chars,
            max_output_tokens: self.max_output_tokens,
        }
    }

    /// Settings block written into newly created documents.
    pub fn document_config(&self) -> DocumentConfig {
        DocumentConfig {
            api_url: self.endpoint.clone(),
            model_name: self.model.clone(),
            temperature: self.temperature,
            max_input_tokens: self.max_input_tokens,
            max_output_tokens: Some(self.max_output_tokens),
            ..DocumentConfig::default()
        }
    }

    /// Key shown as its first four chars only, for debug output.
    pub fn redacted_key(&self) -> String {
        match &self.api_key {
            None => "(none)".to_string(),
            Some(k) => {
                let prefix: String = k.chars().take(4).collect();
                format!("{prefix}…")
            }
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scribe")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

fn default_log_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(".local/share")
        })
        .join("scribe")
        .join("scribe.log")
}

/// Save target for a name typed at the prompt: `document.json` when blank,
/// `.json` appended when missing, relative names placed under `works_dir`.
pub fn document_save_path(works_dir: &Path, name: &str) -> PathBuf {
    let name = name.trim();
    let mut file = if name.is_empty() {
        "document.json".to_string()
    } else {
        name.to_string()
    };
    if !file.ends_with(".json") {
        file.push_str(".json");
    }
    let path = PathBuf::from(file);
    if path.is_absolute() {
        path
    } else {
        works_dir.join(path)
    }
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# scribe configuration
# Run `scribe --init` to regenerate this file.

default_profile = "cerebras"

# Where documents are saved when you name them at the save prompt.
works_dir = "works"
# log_path = "/home/me/.local/share/scribe/scribe.log"

# ── Cerebras (default) ────────────────────────────────────────────────────────
[profiles.cerebras]
endpoint          = "https://api.cerebras.ai/v1"
model             = "llama3.1-8b"
# api_key         = "csk-..."      # or export FS_API_KEY
temperature       = 0.7
max_output_tokens = 4096
context_chars     = 2000

# ── Local Ollama ──────────────────────────────────────────────────────────────
# [profiles.local]
# endpoint = "http://localhost:11434/v1"
# model    = "qwen3:14b"

# ── OpenRouter ────────────────────────────────────────────────────────────────
# [profiles.openrouter]
# endpoint = "https://openrouter.ai/api/v1"
# model    = "meta-llama/llama-3.1-70b-instruct"
# api_key  = "sk-or-..."

# ── Custom system prompts (optional, per-profile) ────────────────────────────
# [profiles.cerebras.prompts]
# edit     = "/home/me/prompts/edit.txt"
# fix      = "/home/me/prompts/fix.txt"
# condense = "/home/me/prompts/condense.txt"
# expand   = "/home/me/prompts/expand.txt"
"#;

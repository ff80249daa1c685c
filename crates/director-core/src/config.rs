//! Configuration management
//!
//! Settings are resolved in this order (later wins):
//! 1. Built-in defaults
//! 2. `director.toml` (or the file passed on the command line)
//! 3. Environment variables
//!
//! Inside the settings file `${VAR_NAME}` is replaced with the value of the
//! environment variable, or with an empty string when it is unset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Error;

/// Default settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "director.toml";

/// LLM Provider type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible API (Ollama, vLLM, OpenAI, ...)
    #[default]
    OpenAi,
    /// Anthropic Claude API
    Claude,
}

impl LlmProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "claude" | "anthropic" => LlmProvider::Claude,
            _ => LlmProvider::OpenAi,
        }
    }
}

/// LLM configuration for the classification service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (local providers such as Ollama need none)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API provider
    #[serde(default)]
    pub provider: LlmProvider,

    /// Base URL of the provider API
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            provider: LlmProvider::OpenAi,
            base_url: Some(default_llm_base_url()),
        }
    }
}

/// Where the director's own HTTP surface listens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Connection metadata for one downstream agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Base URL the streaming request is sent to
    pub base_url: String,

    /// Optional path or absolute URL of the agent card
    #[serde(default)]
    pub capability_endpoint: Option<String>,
}

/// Timeouts applied to downstream calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegationConfig {
    /// TCP/TLS connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum silence between two chunks of the downstream stream
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Optional ceiling on a whole streamed exchange
    #[serde(default)]
    pub stream_timeout_secs: Option<u64>,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            stream_timeout_secs: None,
        }
    }
}

/// Main configuration for the director
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Known downstream agents keyed by agent id
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub delegation: DelegationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            agents: default_agents(),
            llm: LlmConfig::default(),
            delegation: DelegationConfig::default(),
        }
    }
}

fn default_model() -> String {
    "deepseek-r1:8b".to_string()
}

fn default_llm_base_url() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    10010
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    120
}

fn default_agents() -> BTreeMap<String, AgentConfig> {
    let mut agents = BTreeMap::new();
    agents.insert(
        "widgets".to_string(),
        AgentConfig {
            base_url: "http://localhost:10020".to_string(),
            capability_endpoint: None,
        },
    );
    agents
}

impl Config {
    /// Replace `${VAR_NAME}` occurrences with environment values.
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load settings from a TOML file, then apply environment overrides.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Parse settings from TOML text (environment expansion included, no overrides).
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);

        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Configuration(format!("Failed to parse TOML: {}", e)))?;

        Self::from_toml_config(toml)
    }

    /// Load settings from `path`, or from `director.toml` when present.
    ///
    /// Without any file the built-in defaults are used.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn from_toml_config(toml: TomlConfig) -> crate::Result<Self> {
        let server = toml.server.unwrap_or_default();
        let server = ServerConfig {
            host: server.host.unwrap_or_else(default_host),
            port: server.port.unwrap_or_else(default_port),
        };

        let agents = match toml.agents {
            Some(agents) => {
                for (id, agent) in &agents {
                    if agent.base_url.trim().is_empty() {
                        return Err(Error::Configuration(format!(
                            "agent '{}' has an empty base_url",
                            id
                        )));
                    }
                }
                agents
            }
            None => default_agents(),
        };

        let llm = toml.llm.unwrap_or_default();
        let llm = LlmConfig {
            api_key: llm.api_key.filter(|k| !k.is_empty()),
            model: llm.model.unwrap_or_else(default_model),
            provider: llm
                .provider
                .as_deref()
                .map(LlmProvider::parse)
                .unwrap_or_default(),
            base_url: llm.base_url.or_else(|| Some(default_llm_base_url())),
        };

        let delegation = toml.delegation.unwrap_or_default();
        let delegation = DelegationConfig {
            connect_timeout_secs: delegation
                .connect_timeout_secs
                .unwrap_or_else(default_connect_timeout),
            read_timeout_secs: delegation
                .read_timeout_secs
                .unwrap_or_else(default_read_timeout),
            stream_timeout_secs: delegation.stream_timeout_secs,
        };

        Ok(Config {
            server,
            agents,
            llm,
            delegation,
        })
    }

    /// Override settings from the environment
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("DIRECTOR_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("DIRECTOR_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(agents) = std::env::var("DIRECTOR_AGENTS") {
            self.agents = Self::parse_agents(&agents);
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            if !provider.is_empty() {
                self.llm.provider = LlmProvider::parse(&provider);
            }
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }
        if let Ok(api_key) = std::env::var("LLM_API_KEY") {
            if !api_key.is_empty() {
                self.llm.api_key = Some(api_key);
            }
        }
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = Some(base_url);
            }
        }
    }

    /// Parse `id=url,id=url` into an agent map. Malformed entries are skipped.
    fn parse_agents(value: &str) -> BTreeMap<String, AgentConfig> {
        value
            .split(',')
            .filter_map(|entry| {
                let (id, url) = entry.split_once('=')?;
                let (id, url) = (id.trim(), url.trim());
                if id.is_empty() || url.is_empty() {
                    return None;
                }
                Some((
                    id.to_string(),
                    AgentConfig {
                        base_url: url.to_string(),
                        capability_endpoint: None,
                    },
                ))
            })
            .collect()
    }

    /// Public URL of the director built from host and port
    pub fn public_url(&self) -> String {
        format!("http://{}:{}/", self.server.host, self.server.port)
    }
}

// ============================================================================
// TOML structures (file parsing only)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    agents: Option<BTreeMap<String, AgentConfig>>,
    llm: Option<TomlLlmConfig>,
    delegation: Option<TomlDelegationConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLlmConfig {
    /// "openai" or "claude"
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDelegationConfig {
    #[serde(default)]
    connect_timeout_secs: Option<u64>,
    #[serde(default)]
    read_timeout_secs: Option<u64>,
    #[serde(default)]
    stream_timeout_secs: Option<u64>,
}

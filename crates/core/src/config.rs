//! Configuration management for the Grounded service.
//!
//! This module handles loading and merging configuration from multiple sources,
//! lowest precedence first:
//! - Built-in defaults
//! - A YAML config file (`--config`, `GROUNDED_CONFIG`, or `./grounded.yaml`)
//! - Environment variables (deployment names such as `ORDERS_API_URL`)
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "grounded.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    pub server: ServerConfig,
    pub backends: BackendsConfig,
    pub routing: RoutingConfig,
    pub retrieval: RetrievalConfig,
    pub drafting: DraftingConfig,
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub admin_token: String,
}

/// Backend data services and the order-delay policy lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub orders_url: String,
    pub billing_url: String,
    pub inventory_url: String,
    pub policy_url: String,

    /// Per-call timeout for every adapter request
    pub timeout_secs: u64,

    /// Order status that triggers the policy lookup
    pub delay_status: String,

    /// Policy key fetched for delayed orders
    pub delay_policy_key: String,
}

/// Intent vocabularies and sentinel identifiers.
///
/// Keywords are matched as case-insensitive substrings of the message.
/// The sentinels are used when intent is inferred from the message but no
/// explicit identifier was sent; `None` skips the slot instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub order_keywords: Vec<String>,
    pub billing_keywords: Vec<String>,
    pub inventory_keywords: Vec<String>,
    pub specs_keywords: Vec<String>,
    pub default_order_id: Option<i64>,
    pub default_sku: Option<String>,
    pub top_k: usize,
}

/// Retrieval index and embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub index_path: PathBuf,
    pub embedding: EmbeddingSettings,
    pub batch_size: usize,

    /// Hits scoring below this are dropped; no cutoff when unset
    pub min_score: Option<f32>,

    /// Language tag stored for documents that carry none
    pub default_lang: String,
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// "trigram" (deterministic, offline) or "ollama"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: Option<String>,
}

/// Grounded drafting (LLM rewrite) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftingConfig {
    pub enabled: bool,
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,

    /// Cap on generated tokens; `None` leaves it to the model
    pub max_tokens: Option<u32>,

    /// YAML prompt definition replacing the built-in drafting prompt
    pub prompt_file: Option<PathBuf>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerConfig>,
    backends: Option<BackendsConfig>,
    routing: Option<RoutingConfig>,
    retrieval: Option<RetrievalConfig>,
    drafting: Option<DraftingConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            admin_token: "changeme".to_string(),
        }
    }
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            orders_url: "http://orders-api:8000".to_string(),
            billing_url: "http://billing-api:8000".to_string(),
            inventory_url: "http://inventory-api:8000".to_string(),
            policy_url: "http://policy-api:8000".to_string(),
            timeout_secs: 5,
            delay_status: "delayed".to_string(),
            delay_policy_key: "delayed_order_disclaimer".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            order_keywords: words(&["pedido", "order"]),
            billing_keywords: words(&["factura", "invoice"]),
            inventory_keywords: words(&["sku", "stock", "inventario"]),
            specs_keywords: words(&["ficha", "manual", "especific", "spec"]),
            default_order_id: Some(1),
            default_sku: Some("SKU-001".to_string()),
            top_k: 3,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/rag_index.sqlite"),
            embedding: EmbeddingSettings::default(),
            batch_size: 64,
            min_score: None,
            default_lang: "es".to_string(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "ollama".to_string(),
            endpoint: "http://ollama:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.2,
            timeout_secs: 25,
            max_tokens: Some(320),
            prompt_file: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            server: ServerConfig::default(),
            backends: BackendsConfig::default(),
            routing: RoutingConfig::default(),
            retrieval: RetrievalConfig::default(),
            drafting: DraftingConfig::default(),
        }
    }
}

impl BackendsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DraftingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from defaults, a YAML file, and the process environment.
    ///
    /// `config_file` wins over `GROUNDED_CONFIG`; when neither is set,
    /// `./grounded.yaml` is merged if it exists. An explicitly named file
    /// that does not exist is an error.
    ///
    /// Environment variables:
    /// - `ORDERS_API_URL`, `BILLING_API_URL`, `INVENTORY_API_URL`, `POLICY_API_URL`
    /// - `ADMIN_TOKEN`, `GROUNDED_BIND`
    /// - `OLLAMA_BASE_URL`, `MODEL_ID`: drafting endpoint and model
    /// - `EMBED_MODEL`, `RAG_VECTOR_DIM`, `RAG_INDEX_PATH`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use grounded_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Orders: {}", config.backends.orders_url);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("GROUNDED_CONFIG").ok().map(PathBuf::from));

        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                config = config.merge_yaml(&path)?;
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    config = config.merge_yaml(&path)?;
                }
            }
        }

        // Environment variables override YAML config
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    ///
    /// Sections present in the file replace the defaults; fields missing
    /// inside a section keep their default values.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        let mut result = self.clone();
        result.config_file = Some(path.to_path_buf());

        if let Some(server) = config_file.server {
            result.server = server;
        }
        if let Some(backends) = config_file.backends {
            result.backends = backends;
        }
        if let Some(routing) = config_file.routing {
            result.routing = routing;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(drafting) = config_file.drafting {
            result.drafting = drafting;
        }

        // Merge logging settings
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        Ok(result)
    }

    /// Apply environment overrides read through `get`.
    ///
    /// Taking the lookup as a function keeps tests independent of the
    /// process environment.
    pub fn apply_env<F>(&mut self, get: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("ORDERS_API_URL") {
            self.backends.orders_url = url;
        }
        if let Some(url) = get("BILLING_API_URL") {
            self.backends.billing_url = url;
        }
        if let Some(url) = get("INVENTORY_API_URL") {
            self.backends.inventory_url = url;
        }
        if let Some(url) = get("POLICY_API_URL") {
            self.backends.policy_url = url;
        }
        if let Some(token) = get("ADMIN_TOKEN") {
            self.server.admin_token = token;
        }
        if let Some(bind) = get("GROUNDED_BIND") {
            self.server.bind = bind;
        }
        if let Some(endpoint) = get("OLLAMA_BASE_URL") {
            self.drafting.endpoint = endpoint;
        }
        if let Some(model) = get("MODEL_ID") {
            self.drafting.model = model;
        }
        if let Some(model) = get("EMBED_MODEL") {
            self.retrieval.embedding.model = model;
        }
        if let Some(dim) = get("RAG_VECTOR_DIM") {
            self.retrieval.embedding.dimensions = dim.trim().parse().map_err(|_| {
                AppError::Config(format!("RAG_VECTOR_DIM is not a number: {}", dim))
            })?;
        }
        if let Some(path) = get("RAG_INDEX_PATH") {
            self.retrieval.index_path = PathBuf::from(path);
        }
        if let Some(level) = get("RUST_LOG") {
            self.log_level = Some(level);
        }

        // Check for NO_COLOR environment variable
        if get("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
        bind: Option<String>,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        if let Some(bind) = bind {
            self.server.bind = bind;
        }

        self
    }

    /// Validate the configuration before any component is built.
    pub fn validate(&self) -> AppResult<()> {
        let embedding_providers = ["trigram", "ollama"];
        let provider = self.retrieval.embedding.provider.as_str();
        if !embedding_providers.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                embedding_providers.join(", ")
            )));
        }

        let drafting_providers = ["ollama"];
        let provider = self.drafting.provider.as_str();
        if !drafting_providers.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown drafting provider: {}. Supported: {}",
                provider,
                drafting_providers.join(", ")
            )));
        }

        if self.retrieval.batch_size == 0 {
            return Err(AppError::Config(
                "retrieval.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.retrieval.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "retrieval.embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        if self.routing.top_k == 0 {
            return Err(AppError::Config(
                "routing.top_k must be greater than zero".to_string(),
            ));
        }
        if self.drafting.max_tokens == Some(0) {
            return Err(AppError::Config(
                "drafting.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.backends.timeout_secs == 0 || self.drafting.timeout_secs == 0 {
            return Err(AppError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub knowledge: KnowledgeConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub payments: PaymentsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub directory: PathBuf,
}

/// Gupshup credentials. Without an api key outbound messages are logged
/// instead of sent.
#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub api_key: Option<SecretString>,
    pub source_number: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct PaymentsConfig {
    pub secret_key: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub signature_tolerance_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub knowledge_directory: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub server_port: Option<u16>,
    pub payments_currency: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://innkeep.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            knowledge: KnowledgeConfig { directory: PathBuf::from("data/kb") },
            whatsapp: WhatsAppConfig {
                api_base: "https://api.gupshup.io".to_string(),
                api_key: None,
                source_number: None,
                timeout_secs: 10,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                temperature: 0.2,
                max_tokens: 200,
            },
            payments: PaymentsConfig {
                secret_key: None,
                webhook_secret: None,
                currency: "eur".to_string(),
                success_url: "http://localhost:8000/success".to_string(),
                cancel_url: "http://localhost:8000/cancel".to_string(),
                api_base: "https://api.stripe.com".to_string(),
                timeout_secs: 15,
                signature_tolerance_secs: 300,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// Chat completions endpoint root. Ollama serves the OpenAI-compatible
    /// API under `/v1`.
    pub fn resolved_base_url(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(base_url), _) => base_url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => "https://api.openai.com/v1".to_string(),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1".to_string(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        has_secret(self.api_key.as_ref())
    }
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        has_secret(self.api_key.as_ref())
            && self.source_number.as_ref().is_some_and(|number| !number.trim().is_empty())
    }
}

impl PaymentsConfig {
    pub fn has_secret_key(&self) -> bool {
        has_secret(self.secret_key.as_ref())
    }

    pub fn has_webhook_secret(&self) -> bool {
        has_secret(self.webhook_secret.as_ref())
    }
}

fn has_secret(secret: Option<&SecretString>) -> bool {
    secret.is_some_and(|value| !value.expose_secret().trim().is_empty())
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("innkeep.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(directory) = knowledge.directory {
                self.knowledge.directory = directory;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(api_base) = whatsapp.api_base {
                self.whatsapp.api_base = api_base;
            }
            if let Some(api_key) = whatsapp.api_key {
                self.whatsapp.api_key = Some(secret_value(api_key));
            }
            if let Some(source_number) = whatsapp.source_number {
                self.whatsapp.source_number = Some(source_number);
            }
            if let Some(timeout_secs) = whatsapp.timeout_secs {
                self.whatsapp.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(payments) = patch.payments {
            if let Some(secret_key) = payments.secret_key {
                self.payments.secret_key = Some(secret_value(secret_key));
            }
            if let Some(webhook_secret) = payments.webhook_secret {
                self.payments.webhook_secret = Some(secret_value(webhook_secret));
            }
            if let Some(currency) = payments.currency {
                self.payments.currency = currency;
            }
            if let Some(success_url) = payments.success_url {
                self.payments.success_url = success_url;
            }
            if let Some(cancel_url) = payments.cancel_url {
                self.payments.cancel_url = cancel_url;
            }
            if let Some(api_base) = payments.api_base {
                self.payments.api_base = api_base;
            }
            if let Some(timeout_secs) = payments.timeout_secs {
                self.payments.timeout_secs = timeout_secs;
            }
            if let Some(tolerance) = payments.signature_tolerance_secs {
                self.payments.signature_tolerance_secs = tolerance;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("INNKEEP_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("INNKEEP_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("INNKEEP_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("INNKEEP_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("INNKEEP_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("INNKEEP_KNOWLEDGE_DIRECTORY") {
            self.knowledge.directory = PathBuf::from(value);
        }

        if let Some(value) = read_env("INNKEEP_WHATSAPP_API_BASE") {
            self.whatsapp.api_base = value;
        }
        if let Some(value) = read_env("INNKEEP_WHATSAPP_API_KEY") {
            self.whatsapp.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("INNKEEP_WHATSAPP_SOURCE_NUMBER") {
            self.whatsapp.source_number = Some(value);
        }
        if let Some(value) = read_env("INNKEEP_WHATSAPP_TIMEOUT_SECS") {
            self.whatsapp.timeout_secs = parse_u64("INNKEEP_WHATSAPP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("INNKEEP_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("INNKEEP_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("INNKEEP_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("INNKEEP_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("INNKEEP_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("INNKEEP_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("INNKEEP_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("INNKEEP_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("INNKEEP_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("INNKEEP_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("INNKEEP_PAYMENTS_SECRET_KEY") {
            self.payments.secret_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_WEBHOOK_SECRET") {
            self.payments.webhook_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_CURRENCY") {
            self.payments.currency = value;
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_SUCCESS_URL") {
            self.payments.success_url = value;
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_CANCEL_URL") {
            self.payments.cancel_url = value;
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_API_BASE") {
            self.payments.api_base = value;
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_TIMEOUT_SECS") {
            self.payments.timeout_secs = parse_u64("INNKEEP_PAYMENTS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("INNKEEP_PAYMENTS_SIGNATURE_TOLERANCE_SECS") {
            self.payments.signature_tolerance_secs =
                parse_u64("INNKEEP_PAYMENTS_SIGNATURE_TOLERANCE_SECS", &value)?;
        }

        if let Some(value) = read_env("INNKEEP_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("INNKEEP_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("INNKEEP_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("INNKEEP_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("INNKEEP_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("INNKEEP_LOGGING_LEVEL").or_else(|| read_env("INNKEEP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("INNKEEP_LOGGING_FORMAT").or_else(|| read_env("INNKEEP_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(directory) = overrides.knowledge_directory {
            self.knowledge.directory = directory;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(currency) = overrides.payments_currency {
            self.payments.currency = currency;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_llm(&self.llm)?;
        validate_payments(&self.payments)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("innkeep.toml"), PathBuf::from("config/innkeep.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn validate_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    validate_http_url("whatsapp.api_base", &whatsapp.api_base)?;
    validate_timeout("whatsapp.timeout_secs", whatsapp.timeout_secs)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if let Some(base_url) = &llm.base_url {
        validate_http_url("llm.base_url", base_url)?;
    }

    Ok(())
}

fn validate_payments(payments: &PaymentsConfig) -> Result<(), ConfigError> {
    let currency = payments.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(
            "payments.currency must be a three-letter ISO code such as `eur`".to_string(),
        ));
    }
    validate_http_url("payments.api_base", &payments.api_base)?;
    validate_http_url("payments.success_url", &payments.success_url)?;
    validate_http_url("payments.cancel_url", &payments.cancel_url)?;
    validate_timeout("payments.timeout_secs", payments.timeout_secs)?;

    if payments.signature_tolerance_secs == 0 {
        return Err(ConfigError::Validation(
            "payments.signature_tolerance_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    knowledge: Option<KnowledgePatch>,
    whatsapp: Option<WhatsAppPatch>,
    llm: Option<LlmPatch>,
    payments: Option<PaymentsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    api_base: Option<String>,
    api_key: Option<String>,
    source_number: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentsPatch {
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    currency: Option<String>,
    success_url: Option<String>,
    cancel_url: Option<String>,
    api_base: Option<String>,
    timeout_secs: Option<u64>,
    signature_tolerance_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_run_in_dry_run_mode() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.payments.currency == "eur", "default currency should be eur")?;
        ensure(config.server.port == 8000, "default port should be 8000")?;
        ensure(config.llm.model == "gpt-4o-mini", "default model should be gpt-4o-mini")?;
        ensure(
            config.knowledge.directory == PathBuf::from("data/kb"),
            "default knowledge directory should be data/kb",
        )?;
        ensure(!config.whatsapp.is_configured(), "whatsapp should start unconfigured")?;
        ensure(!config.payments.has_webhook_secret(), "webhook secret should start unset")?;
        ensure(
            config.llm.resolved_base_url() == "https://api.openai.com/v1",
            "openai base url should be the default",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GUPSHUP_KEY", "gs-from-env");
        env::set_var("TEST_STRIPE_WEBHOOK", "whsec_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("innkeep.toml");
            fs::write(
                &path,
                r#"
[whatsapp]
api_key = "${TEST_GUPSHUP_KEY}"
source_number = "4930123456"

[payments]
webhook_secret = "${TEST_STRIPE_WEBHOOK}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.whatsapp.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("gs-from-env".to_string()),
                "gupshup key should be loaded from environment",
            )?;
            ensure(config.whatsapp.is_configured(), "whatsapp should be configured")?;
            ensure(config.payments.has_webhook_secret(), "webhook secret should be loaded")?;
            Ok(())
        })();

        clear_vars(&["TEST_GUPSHUP_KEY", "TEST_STRIPE_WEBHOOK"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_INNKEEP_ABSENT"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("innkeep.toml");
        fs::write(&path, "[llm]\napi_key = \"${TEST_INNKEEP_ABSENT}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_INNKEEP_ABSENT"),
            "interpolation error should name the variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("INNKEEP_LOG_LEVEL", "warn");
        env::set_var("INNKEEP_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["INNKEEP_LOG_LEVEL", "INNKEEP_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("INNKEEP_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("INNKEEP_LLM_PROVIDER", "ollama");
        env::set_var("INNKEEP_PAYMENTS_CURRENCY", "usd");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("innkeep.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[llm]
provider = "openai"
model = "from-file-model"

[payments]
currency = "gbp"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.llm.provider == LlmProvider::Ollama, "env provider should win over file")?;
            ensure(config.llm.model == "from-file-model", "file model should win over default")?;
            ensure(config.payments.currency == "usd", "env currency should win over file")?;
            ensure(
                config.llm.resolved_base_url() == "http://localhost:11434/v1",
                "ollama base url should be used when none is set",
            )?;
            Ok(())
        })();

        clear_vars(&["INNKEEP_DATABASE_URL", "INNKEEP_LLM_PROVIDER", "INNKEEP_PAYMENTS_CURRENCY"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("INNKEEP_PAYMENTS_CURRENCY", "euro");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("payments.currency")
            );
            ensure(has_message, "validation failure should mention payments.currency")
        })();

        clear_vars(&["INNKEEP_PAYMENTS_CURRENCY"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("INNKEEP_SERVER_PORT", "eighty");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "INNKEEP_SERVER_PORT"),
                "error should name the port override",
            ),
        };

        clear_vars(&["INNKEEP_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("INNKEEP_PAYMENTS_SECRET_KEY", "sk_test_secret_value");
        env::set_var("INNKEEP_LLM_API_KEY", "sk-llm-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("sk_test_secret_value"),
                "debug output should not contain the payment secret key",
            )?;
            ensure(
                !debug.contains("sk-llm-secret-value"),
                "debug output should not contain the llm api key",
            )?;
            ensure(config.payments.has_secret_key(), "payment secret key should be set")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["INNKEEP_PAYMENTS_SECRET_KEY", "INNKEEP_LLM_API_KEY"]);
        result
    }
}

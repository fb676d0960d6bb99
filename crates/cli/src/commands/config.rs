use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use innkeep_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

/// Effective configuration with the layer each value came from. Secrets are
/// reported as set or unset, never printed.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = SourceResolver { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    let entries = vec![
        sources.entry("database.url", &["INNKEEP_DATABASE_URL"], config.database.url.clone()),
        sources.entry(
            "database.max_connections",
            &["INNKEEP_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        sources.entry(
            "knowledge.directory",
            &["INNKEEP_KNOWLEDGE_DIRECTORY"],
            config.knowledge.directory.display().to_string(),
        ),
        sources.entry("whatsapp.api_base", &["INNKEEP_WHATSAPP_API_BASE"], config.whatsapp.api_base.clone()),
        sources.entry(
            "whatsapp.api_key",
            &["INNKEEP_WHATSAPP_API_KEY"],
            redact(config.whatsapp.api_key.as_ref()),
        ),
        sources.entry(
            "whatsapp.source_number",
            &["INNKEEP_WHATSAPP_SOURCE_NUMBER"],
            config.whatsapp.source_number.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        sources.entry(
            "llm.provider",
            &["INNKEEP_LLM_PROVIDER"],
            format!("{:?}", config.llm.provider).to_lowercase(),
        ),
        sources.entry("llm.model", &["INNKEEP_LLM_MODEL"], config.llm.model.clone()),
        sources.entry("llm.base_url", &["INNKEEP_LLM_BASE_URL"], config.llm.resolved_base_url()),
        sources.entry("llm.api_key", &["INNKEEP_LLM_API_KEY"], redact(config.llm.api_key.as_ref())),
        sources.entry(
            "payments.secret_key",
            &["INNKEEP_PAYMENTS_SECRET_KEY"],
            redact(config.payments.secret_key.as_ref()),
        ),
        sources.entry(
            "payments.webhook_secret",
            &["INNKEEP_PAYMENTS_WEBHOOK_SECRET"],
            redact(config.payments.webhook_secret.as_ref()),
        ),
        sources.entry("payments.currency", &["INNKEEP_PAYMENTS_CURRENCY"], config.payments.currency.clone()),
        sources.entry(
            "server.bind_address",
            &["INNKEEP_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        sources.entry(
            "server.port",
            &["INNKEEP_SERVER_PORT", "PORT"],
            config.server.port.to_string(),
        ),
        sources.entry(
            "logging.level",
            &["INNKEEP_LOGGING_LEVEL", "INNKEEP_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        sources.entry(
            "logging.format",
            &["INNKEEP_LOGGING_FORMAT", "INNKEEP_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ];

    let data = serde_json::to_value(&entries).ok();
    CommandResult::success(
        "config",
        "effective config (source precedence: env > file > default)",
        data,
    )
}

struct SourceResolver<'a> {
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

impl SourceResolver<'_> {
    fn entry(&self, key: &'static str, env_keys: &[&str], value: String) -> ConfigEntry {
        ConfigEntry { key, value, source: self.source(key, env_keys) }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("innkeep.toml"), PathBuf::from("config/innkeep.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        Some(_) => "<empty>".to_string(),
        None => "<unset>".to_string(),
    }
}

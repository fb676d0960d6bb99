use innkeep_core::catalog::{CatalogSource, DirectoryCatalogSource};
use innkeep_core::config::{AppConfig, LlmProvider, LoadOptions};
use innkeep_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Readiness report. Warnings (dry-run messaging, missing LLM key) do not
/// fail the run; a broken config, database or knowledge directory does.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 6 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_database(&config));
            checks.push(check_knowledge(&config));
            checks.push(check_whatsapp(&config));
            checks.push(check_llm(&config));
            checks.push(check_payments(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["database", "knowledge_base", "whatsapp", "llm", "payments"] {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::new(
                "database",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
        let migrated = migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("migrations failed: {error}"));
        pool.close().await;
        migrated
    });

    match result {
        Ok(()) => DoctorCheck::new(
            "database",
            CheckStatus::Pass,
            format!("connected and migrated `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::new("database", CheckStatus::Fail, error),
    }
}

fn check_knowledge(config: &AppConfig) -> DoctorCheck {
    let directory = &config.knowledge.directory;
    match DirectoryCatalogSource::new(directory).load() {
        Ok(knowledge) if knowledge.rooms.is_empty() => DoctorCheck::new(
            "knowledge_base",
            CheckStatus::Warn,
            format!("no rooms found in `{}`; bookings cannot be quoted", directory.display()),
        ),
        Ok(knowledge) => DoctorCheck::new(
            "knowledge_base",
            CheckStatus::Pass,
            format!(
                "{} room(s), {} faq(s), {} upsell(s)",
                knowledge.rooms.len(),
                knowledge.faqs.len(),
                knowledge.upsells.len()
            ),
        ),
        Err(error) => DoctorCheck::new("knowledge_base", CheckStatus::Fail, error.to_string()),
    }
}

fn check_whatsapp(config: &AppConfig) -> DoctorCheck {
    if config.whatsapp.is_configured() {
        DoctorCheck::new("whatsapp", CheckStatus::Pass, "gupshup credentials present")
    } else {
        DoctorCheck::new(
            "whatsapp",
            CheckStatus::Warn,
            "api key or source number missing; outbound messages will only be logged",
        )
    }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    match (config.llm.provider, config.llm.has_api_key()) {
        (LlmProvider::OpenAi, false) => DoctorCheck::new(
            "llm",
            CheckStatus::Warn,
            "openai api key missing; free-text questions get the fallback reply",
        ),
        _ => DoctorCheck::new(
            "llm",
            CheckStatus::Pass,
            format!("{} via {}", config.llm.model, config.llm.resolved_base_url()),
        ),
    }
}

fn check_payments(config: &AppConfig) -> DoctorCheck {
    let mut missing = Vec::new();
    if !config.payments.has_secret_key() {
        missing.push("payments.secret_key");
    }
    if !config.payments.has_webhook_secret() {
        missing.push("payments.webhook_secret");
    }

    if missing.is_empty() {
        DoctorCheck::new("payments", CheckStatus::Pass, "stripe keys present")
    } else {
        DoctorCheck::new(
            "payments",
            CheckStatus::Warn,
            format!("missing {}; checkout or webhooks will fail", missing.join(", ")),
        )
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

use innkeep_core::config::{AppConfig, LoadOptions};
use innkeep_db::{connect_with_settings, migrations, DbPool};
use serde_json::json;

use crate::commands::{current_thread_runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
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
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let before = applied_versions(&pool).await;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let after = applied_versions(&pool).await;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>((before, after))
    });

    match result {
        Ok((before, after)) => {
            let newly_applied =
                after.iter().filter(|version| !before.contains(version)).copied().collect::<Vec<_>>();
            CommandResult::success(
                "migrate",
                format!(
                    "applied {} migration(s) on `{}`",
                    newly_applied.len(),
                    config.database.url
                ),
                Some(json!({ "applied": newly_applied, "current": after })),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

/// Versions recorded in the sqlx bookkeeping table; empty before the first run.
async fn applied_versions(pool: &DbPool) -> Vec<i64> {
    sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
        .fetch_all(pool)
        .await
        .unwrap_or_default()
}

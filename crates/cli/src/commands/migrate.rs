use crate::commands::{
    connect, current_thread_runtime, load_config, CommandResult, StepError, EXIT_DATABASE,
    EXIT_MIGRATION,
};
use procura_db::migrations;

/// Applies pending migrations, or with `status_only` reports what would be applied.
pub fn run(status_only: bool) -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;

        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| ("migration_status", error.to_string(), EXIT_DATABASE))?;

        if !status_only && !pending.is_empty() {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        }

        let applied = migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("migration_status", error.to_string(), EXIT_DATABASE))?;
        pool.close().await;
        Ok::<(Vec<i64>, Vec<i64>), StepError>((applied, pending))
    });

    match result {
        Ok((applied, pending)) if status_only => CommandResult::success(
            "migrate",
            format!(
                "migration status: {} applied [{}], {} pending [{}]",
                applied.len(),
                join_versions(&applied),
                pending.len(),
                join_versions(&pending)
            ),
        ),
        Ok((applied, pending)) => CommandResult::success(
            "migrate",
            format!(
                "applied {} pending migration(s); schema now at {} version(s)",
                pending.len(),
                applied.len()
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

fn join_versions(versions: &[i64]) -> String {
    versions.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
}

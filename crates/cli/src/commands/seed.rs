use crate::commands::{
    connect, current_thread_runtime, load_config, CommandResult, StepError, EXIT_MIGRATION,
    EXIT_SEED,
};
use procura_db::fixtures::PurchaseSeedInfo;
use procura_db::{migrations, DemoSeedDataset, SqlPurchaseRepository};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let repository = SqlPurchaseRepository::new(pool.clone());
        let seed_result = DemoSeedDataset::load(&repository)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;

        let verification = DemoSeedDataset::verify(&repository)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;

        let run_result: Result<Vec<PurchaseSeedInfo>, StepError> = if verification.all_present {
            Ok(seed_result.purchases_seeded)
        } else {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), EXIT_SEED))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(purchases) => CommandResult::success("seed", summary(&purchases)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

/// Lists every demo row; insertion counts are left out so reruns print the same summary.
fn summary(purchases: &[PurchaseSeedInfo]) -> String {
    let lines: Vec<String> = purchases
        .iter()
        .map(|info| format!("  - {}: {} ({})", info.purchase_id, info.status, info.description))
        .collect();
    format!("demo dataset loaded ({} purchase requests):\n{}", purchases.len(), lines.join("\n"))
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some demo purchases failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}

use crate::commands::{
    connect, current_thread_runtime, load_config, CommandResult, StepError, EXIT_DATABASE,
};
use procura_core::dashboard::{format_inr, DashboardQuery, DashboardView, StatusFilter};
use procura_core::session::ActorRole;
use procura_core::workflow::ApprovalEngine;
use procura_db::{PurchaseService, SqlPurchaseRepository};

/// Prints the dashboard projection as an operator sees it: no session, so no actions.
pub fn run(search: String, status: StatusFilter) -> CommandResult {
    let config = match load_config("list") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("list") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;
        let service = PurchaseService::from_repository(
            SqlPurchaseRepository::new(pool.clone()),
            ApprovalEngine::with_threshold(config.workflow.approval_threshold),
        );

        let view: Result<DashboardView, StepError> = service
            .dashboard(DashboardQuery { search, status }, &ActorRole::Anonymous)
            .await
            .map_err(|error| ("repository", error.to_string(), EXIT_DATABASE));
        pool.close().await;
        view
    });

    match result {
        Ok(view) => CommandResult::success("list", render(&view)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("list", error_class, message, exit_code)
        }
    }
}

fn render(view: &DashboardView) -> String {
    let stats = &view.stats;
    let mut lines = vec![format!(
        "{} purchase request(s) [status={}, search={:?}]: {} pending, {} approved, {} rejected, total {}",
        stats.total,
        view.query.status,
        view.query.search,
        stats.pending,
        stats.approved,
        stats.rejected,
        stats.total_amount_display
    )];

    for row in &view.rows {
        let purchase = &row.purchase;
        lines.push(format!(
            "  - {} [{}] {} / {} {}{}",
            purchase.id,
            purchase.status,
            purchase.uploader_name,
            purchase.vendor_name,
            format_inr(purchase.amount),
            if row.requires_director { " (director sign-off required)" } else { "" }
        ));
    }

    lines.join("\n")
}

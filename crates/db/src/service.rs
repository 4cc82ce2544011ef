//! The single path through which purchase requests are created and mutated.
//!
//! Every workflow command is planned by [`ApprovalEngine`] against the stored
//! record before anything is written, so callers cannot commit a transition
//! the engine refuses.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use procura_core::dashboard::{DashboardQuery, DashboardView};
use procura_core::domain::purchase::{PurchaseDraft, PurchaseId, PurchaseRequest};
use procura_core::errors::ApplicationError;
use procura_core::session::RoleContext;
use procura_core::workflow::{ApprovalEngine, TransitionPlan, WorkflowCommand};

use crate::repositories::PurchaseRepository;

#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    Updated(PurchaseRequest),
    Deleted(PurchaseId),
}

pub struct PurchaseService<R: ?Sized = dyn PurchaseRepository> {
    repository: Arc<R>,
    engine: ApprovalEngine,
}

impl PurchaseService {
    pub fn from_repository(
        repository: impl PurchaseRepository + 'static,
        engine: ApprovalEngine,
    ) -> Self {
        Self { repository: Arc::new(repository), engine }
    }
}

impl<R> PurchaseService<R>
where
    R: PurchaseRepository + ?Sized,
{
    pub fn new(repository: Arc<R>, engine: ApprovalEngine) -> Self {
        Self { repository, engine }
    }

    pub fn engine(&self) -> &ApprovalEngine {
        &self.engine
    }

    pub async fn submit(
        &self,
        draft: PurchaseDraft,
        correlation_id: &str,
    ) -> Result<PurchaseRequest, ApplicationError> {
        let draft = draft.validate().map_err(|error| {
            warn!(
                event_name = "purchase.submit.rejected",
                correlation_id = %correlation_id,
                error = %error,
                "purchase draft failed validation"
            );
            ApplicationError::from(error)
        })?;

        let stored = self.repository.insert(draft).await?;
        info!(
            event_name = "purchase.submitted",
            correlation_id = %correlation_id,
            purchase_id = %stored.id,
            amount = %stored.amount,
            requires_director = self.engine.requires_director(&stored),
            "purchase request submitted"
        );
        Ok(stored)
    }

    pub async fn list(&self) -> Result<Vec<PurchaseRequest>, ApplicationError> {
        Ok(self.repository.list().await?)
    }

    pub async fn get(&self, id: &PurchaseId) -> Result<PurchaseRequest, ApplicationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("purchase `{id}`")))
    }

    /// Fetches the authoritative list and projects it for `actor`.
    pub async fn dashboard<C>(
        &self,
        query: DashboardQuery,
        actor: &C,
    ) -> Result<DashboardView, ApplicationError>
    where
        C: RoleContext + Sync + ?Sized,
    {
        let purchases = self.repository.list().await?;
        Ok(DashboardView::build(purchases, query, actor, &self.engine)?)
    }

    /// Loads the record, plans `command` for `actor`, and commits the plan.
    pub async fn execute<C>(
        &self,
        id: &PurchaseId,
        command: WorkflowCommand,
        actor: &C,
        correlation_id: &str,
    ) -> Result<ActionOutcome, ApplicationError>
    where
        C: RoleContext + Sync + ?Sized,
    {
        let role = actor.current_role();
        let current = self.get(id).await?;

        let plan = self.engine.plan(command, &current, actor, Utc::now()).map_err(|error| {
            warn!(
                event_name = "purchase.action.denied",
                correlation_id = %correlation_id,
                purchase_id = %id,
                command = %command,
                role = %role,
                status = %current.status,
                "workflow action refused"
            );
            ApplicationError::from(error)
        })?;

        let outcome = match plan {
            TransitionPlan::Update(update) => {
                let updated = self.repository.update(id, update).await.map_err(|error| {
                    warn!(
                        event_name = "purchase.action.write_failed",
                        correlation_id = %correlation_id,
                        purchase_id = %id,
                        command = %command,
                        error = %error,
                        "workflow write did not apply"
                    );
                    ApplicationError::from(error)
                })?;
                ActionOutcome::Updated(updated)
            }
            TransitionPlan::Delete => {
                self.repository.delete(id).await?;
                ActionOutcome::Deleted(id.clone())
            }
        };

        info!(
            event_name = "purchase.action.applied",
            correlation_id = %correlation_id,
            purchase_id = %id,
            command = %command,
            role = %role,
            "workflow action applied"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use procura_core::dashboard::DashboardQuery;
    use procura_core::domain::purchase::{
        Attachment, BillType, Hub, PaymentSequence, PurchaseDraft, PurchaseId, PurchaseStatus,
        Purpose,
    };
    use procura_core::errors::{ApplicationError, DomainError};
    use procura_core::session::ActorRole;
    use procura_core::workflow::{ApprovalEngine, WorkflowCommand};

    use super::{ActionOutcome, PurchaseService};
    use crate::repositories::{
        InMemoryPurchaseRepository, PurchaseRepository, SqlPurchaseRepository,
    };
    use crate::{connect_with_settings, migrations};

    fn draft(amount: i64) -> PurchaseDraft {
        PurchaseDraft {
            uploader_name: "Neha Joshi".to_string(),
            vendor_name: "Lotus Print".to_string(),
            purpose: Purpose::SmallPurchase,
            amount: Decimal::new(amount, 0),
            bill_type: BillType::Covalent,
            hub: Hub::Pune,
            payment_sequence: PaymentSequence::PaymentFirst,
            payment_date: NaiveDate::from_ymd_opt(2026, 5, 20).expect("date"),
            attachment: Some(Attachment {
                url: "https://files.example.com/purchase-files/lotus.pdf".to_string(),
                name: "lotus.pdf".to_string(),
            }),
        }
    }

    fn service() -> PurchaseService<InMemoryPurchaseRepository> {
        PurchaseService::new(
            Arc::new(InMemoryPurchaseRepository::default()),
            ApprovalEngine::default(),
        )
    }

    #[tokio::test]
    async fn submit_validates_before_storing() {
        let service = service();
        let mut invalid = draft(500);
        invalid.attachment = None;

        let error = service.submit(invalid, "test").await.expect_err("bill required");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));
        assert!(service.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn small_request_takes_finance_fast_path() {
        let service = service();
        let stored = service.submit(draft(5_000), "test").await.expect("submit");

        let outcome = service
            .execute(&stored.id, WorkflowCommand::FinanceApprove, &ActorRole::Finance, "test")
            .await
            .expect("finance approve");

        let ActionOutcome::Updated(updated) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(updated.status, PurchaseStatus::FinanceApproved);
        assert!(updated.finance_approved());
    }

    #[tokio::test]
    async fn service_refuses_what_the_engine_refuses() {
        let service = service();
        let stored = service.submit(draft(15_000), "test").await.expect("submit");

        let error = service
            .execute(&stored.id, WorkflowCommand::FinanceApprove, &ActorRole::Finance, "test")
            .await
            .expect_err("director gate");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Unauthorized(_))));

        let unchanged = service.get(&stored.id).await.expect("get");
        assert_eq!(unchanged, stored);
    }

    #[tokio::test]
    async fn anonymous_actor_cannot_delete() {
        let service = service();
        let stored = service.submit(draft(100), "test").await.expect("submit");

        let error = service
            .execute(&stored.id, WorkflowCommand::Delete, &ActorRole::Anonymous, "test")
            .await
            .expect_err("anonymous delete");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Unauthorized(_))));
        assert!(service.get(&stored.id).await.is_ok());
    }

    #[tokio::test]
    async fn missing_purchase_is_not_found() {
        let service = service();
        let error = service
            .execute(
                &PurchaseId("ghost".into()),
                WorkflowCommand::Reject,
                &ActorRole::Director,
                "test",
            )
            .await
            .expect_err("missing");
        assert!(matches!(error, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn two_stage_approval_through_sql_store() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let service =
            PurchaseService::from_repository(
                SqlPurchaseRepository::new(pool),
                ApprovalEngine::default(),
            );

        let stored = service.submit(draft(15_000), "test").await.expect("submit");
        service
            .execute(&stored.id, WorkflowCommand::DirectorApprove, &ActorRole::Director, "test")
            .await
            .expect("director approve");
        let outcome = service
            .execute(&stored.id, WorkflowCommand::FinanceApprove, &ActorRole::Finance, "test")
            .await
            .expect("finance approve");

        let ActionOutcome::Updated(updated) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(updated.status, PurchaseStatus::FinanceApproved);
        assert!(updated.director_approved());
        assert!(updated.finance_approved());

        let outcome = service
            .execute(&stored.id, WorkflowCommand::Delete, &ActorRole::Director, "test")
            .await
            .expect("delete");
        assert_eq!(outcome, ActionOutcome::Deleted(stored.id.clone()));
        assert!(service.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn dashboard_reflects_the_store() {
        let repository = Arc::new(InMemoryPurchaseRepository::default());
        let service = PurchaseService::new(repository.clone(), ApprovalEngine::default());
        service.submit(draft(20_000), "test").await.expect("submit");

        let view =
            service.dashboard(DashboardQuery::default(), &ActorRole::Director).await.expect("view");
        assert_eq!(view.rows.len(), 1);
        assert!(view.rows[0].actions.director_approve);
        assert_eq!(repository.list().await.expect("list").len(), 1);
    }
}

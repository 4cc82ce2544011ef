use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use procura_core::domain::purchase::{PurchaseDraft, PurchaseId, PurchaseRequest};
use procura_core::workflow::PurchaseUpdate;

use super::{PurchaseRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryPurchaseRepository {
    purchases: RwLock<HashMap<String, PurchaseRequest>>,
}

#[async_trait::async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn list(&self) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let purchases = self.purchases.read().await;
        let mut listed: Vec<PurchaseRequest> = purchases.values().cloned().collect();
        listed.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.cmp(&left.id))
        });
        Ok(listed)
    }

    async fn find_by_id(
        &self,
        id: &PurchaseId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let purchases = self.purchases.read().await;
        Ok(purchases.get(&id.0).cloned())
    }

    async fn insert(&self, draft: PurchaseDraft) -> Result<PurchaseRequest, RepositoryError> {
        let request = PurchaseRequest::from_draft(PurchaseId::generate(), draft, Utc::now());
        let mut purchases = self.purchases.write().await;
        if purchases.contains_key(&request.id.0) {
            return Err(RepositoryError::DuplicateId(request.id));
        }
        purchases.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    async fn import(&self, request: PurchaseRequest) -> Result<bool, RepositoryError> {
        let mut purchases = self.purchases.write().await;
        if purchases.contains_key(&request.id.0) {
            return Ok(false);
        }
        purchases.insert(request.id.0.clone(), request);
        Ok(true)
    }

    async fn update(
        &self,
        id: &PurchaseId,
        update: PurchaseUpdate,
    ) -> Result<PurchaseRequest, RepositoryError> {
        let mut purchases = self.purchases.write().await;
        let stored =
            purchases.get_mut(&id.0).ok_or_else(|| RepositoryError::NotFound(id.clone()))?;

        if stored.status != update.expected_status {
            return Err(RepositoryError::StaleStatus {
                id: id.clone(),
                expected: update.expected_status,
                actual: stored.status,
            });
        }

        update.apply_to(stored);
        Ok(stored.clone())
    }

    async fn delete(&self, id: &PurchaseId) -> Result<(), RepositoryError> {
        let mut purchases = self.purchases.write().await;
        purchases.remove(&id.0).map(|_| ()).ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use procura_core::domain::purchase::{
        ApprovalStamp, BillType, Hub, PaymentSequence, PurchaseDraft, PurchaseId, PurchaseRequest,
        PurchaseStatus, Purpose,
    };
    use procura_core::workflow::{PurchaseUpdate, WorkflowChange};

    use crate::repositories::{InMemoryPurchaseRepository, PurchaseRepository, RepositoryError};

    fn draft() -> PurchaseDraft {
        PurchaseDraft {
            uploader_name: "Ravi".to_string(),
            vendor_name: "Acme Repairs".to_string(),
            purpose: Purpose::Salary,
            amount: Decimal::new(7_500, 0),
            bill_type: BillType::Quantum,
            hub: Hub::Bangalore,
            payment_sequence: PaymentSequence::PaymentWithoutBill,
            payment_date: NaiveDate::from_ymd_opt(2026, 6, 30).expect("date"),
            attachment: None,
        }
    }

    fn record(id: &str, minutes: i64) -> PurchaseRequest {
        let base = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).single().expect("timestamp");
        PurchaseRequest::from_draft(
            PurchaseId(id.to_string()),
            draft(),
            base + Duration::minutes(minutes),
        )
    }

    #[tokio::test]
    async fn in_memory_purchase_repo_round_trip() {
        let repo = InMemoryPurchaseRepository::default();

        let stored = repo.insert(draft()).await.expect("insert");
        let found = repo.find_by_id(&stored.id).await.expect("find");

        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn list_orders_like_the_sql_store() {
        let repo = InMemoryPurchaseRepository::default();
        repo.import(record("pr-a", 0)).await.expect("import a");
        repo.import(record("pr-c", 10)).await.expect("import c");
        repo.import(record("pr-b", 10)).await.expect("import b");

        let ids: Vec<String> =
            repo.list().await.expect("list").into_iter().map(|purchase| purchase.id.0).collect();
        assert_eq!(ids, vec!["pr-c", "pr-b", "pr-a"]);
    }

    #[tokio::test]
    async fn update_checks_expected_status_under_lock() {
        let repo = InMemoryPurchaseRepository::default();
        repo.import(record("pr-1", 0)).await.expect("import");
        let id = PurchaseId("pr-1".to_string());
        let now = Utc::now();

        let approved = repo
            .update(
                &id,
                PurchaseUpdate {
                    expected_status: PurchaseStatus::Pending,
                    change: WorkflowChange::FinanceApproval { stamp: ApprovalStamp::granted(now) },
                    updated_at: now,
                },
            )
            .await
            .expect("first writer wins");
        assert_eq!(approved.status, PurchaseStatus::FinanceApproved);

        let error = repo
            .update(
                &id,
                PurchaseUpdate {
                    expected_status: PurchaseStatus::Pending,
                    change: WorkflowChange::Rejection,
                    updated_at: now,
                },
            )
            .await
            .expect_err("second writer is stale");
        assert!(matches!(
            error,
            RepositoryError::StaleStatus { actual: PurchaseStatus::FinanceApproved, .. }
        ));
    }

    #[tokio::test]
    async fn delete_reports_missing_ids() {
        let repo = InMemoryPurchaseRepository::default();
        repo.import(record("pr-1", 0)).await.expect("import");

        repo.delete(&PurchaseId("pr-1".to_string())).await.expect("delete");
        let error = repo.delete(&PurchaseId("pr-1".to_string())).await.expect_err("already gone");
        assert!(matches!(error, RepositoryError::NotFound(_)));
    }
}

use async_trait::async_trait;
use thiserror::Error;

use procura_core::domain::purchase::{PurchaseDraft, PurchaseId, PurchaseRequest, PurchaseStatus};
use procura_core::errors::ApplicationError;
use procura_core::workflow::PurchaseUpdate;

pub mod memory;
pub mod purchase;

pub use memory::InMemoryPurchaseRepository;
pub use purchase::SqlPurchaseRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("purchase `{0}` was not found")]
    NotFound(PurchaseId),
    #[error("purchase `{0}` already exists")]
    DuplicateId(PurchaseId),
    #[error("purchase `{id}` is {actual}, expected {expected}")]
    StaleStatus { id: PurchaseId, expected: PurchaseStatus, actual: PurchaseStatus },
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => Self::NotFound(format!("purchase `{id}`")),
            conflict @ (RepositoryError::StaleStatus { .. } | RepositoryError::DuplicateId(_)) => {
                Self::Conflict(conflict.to_string())
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Durable storage for purchase requests.
///
/// `update` is a conditional write: it only applies while the stored status
/// still equals `PurchaseUpdate::expected_status`, and reports
/// [`RepositoryError::StaleStatus`] otherwise.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Newest first; ties broken by id descending.
    async fn list(&self) -> Result<Vec<PurchaseRequest>, RepositoryError>;

    async fn find_by_id(&self, id: &PurchaseId)
        -> Result<Option<PurchaseRequest>, RepositoryError>;

    /// Stores a new pending request with a fresh id and `created_at = updated_at = now`.
    async fn insert(&self, draft: PurchaseDraft) -> Result<PurchaseRequest, RepositoryError>;

    /// Stores a fully formed record as-is. Returns `false` when the id already exists.
    async fn import(&self, request: PurchaseRequest) -> Result<bool, RepositoryError>;

    async fn update(
        &self,
        id: &PurchaseId,
        update: PurchaseUpdate,
    ) -> Result<PurchaseRequest, RepositoryError>;

    async fn delete(&self, id: &PurchaseId) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use procura_core::domain::purchase::{PurchaseId, PurchaseStatus};
    use procura_core::errors::ApplicationError;

    use super::RepositoryError;

    #[test]
    fn not_found_maps_to_application_not_found() {
        let error = ApplicationError::from(RepositoryError::NotFound(PurchaseId("p-1".into())));
        assert_eq!(error, ApplicationError::NotFound("purchase `p-1`".to_string()));
    }

    #[test]
    fn stale_status_maps_to_conflict() {
        let error = ApplicationError::from(RepositoryError::StaleStatus {
            id: PurchaseId("p-2".into()),
            expected: PurchaseStatus::Pending,
            actual: PurchaseStatus::Rejected,
        });
        assert!(matches!(
            error,
            ApplicationError::Conflict(ref message) if message.contains("rejected")
        ));
    }

    #[test]
    fn duplicate_id_maps_to_conflict() {
        let error = ApplicationError::from(RepositoryError::DuplicateId(PurchaseId("p-3".into())));
        assert_eq!(error, ApplicationError::Conflict("purchase `p-3` already exists".to_string()));
    }

    #[test]
    fn decode_failure_maps_to_persistence() {
        let error = ApplicationError::from(RepositoryError::Decode("bad amount".into()));
        assert!(matches!(error, ApplicationError::Persistence(_)));
    }
}

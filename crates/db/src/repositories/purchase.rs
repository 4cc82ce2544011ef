use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use procura_core::domain::purchase::{
    ApprovalStamp, Attachment, BillType, Hub, PaymentSequence, PurchaseDraft, PurchaseId,
    PurchaseRequest, PurchaseStatus, Purpose,
};
use procura_core::workflow::{PurchaseUpdate, WorkflowChange};

use super::{PurchaseRepository, RepositoryError};
use crate::DbPool;

const PURCHASE_COLUMNS: &str = "id, uploader_name, vendor_name, purpose, amount, file_url, file_name,
    status, payment_date, payment_sequence, bill_type, hub, director_approval, finance_approval,
    created_at, updated_at";

pub struct SqlPurchaseRepository {
    pool: DbPool,
}

impl SqlPurchaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert_record(&self, request: &PurchaseRequest) -> Result<bool, RepositoryError> {
        let (file_url, file_name) = match &request.attachment {
            Some(attachment) => (Some(attachment.url.as_str()), Some(attachment.name.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            "INSERT INTO purchase_request (
                id, uploader_name, vendor_name, purpose, amount, file_url, file_name, status,
                payment_date, payment_sequence, bill_type, hub, director_approval,
                finance_approval, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&request.id.0)
        .bind(&request.uploader_name)
        .bind(&request.vendor_name)
        .bind(request.purpose.as_str())
        .bind(request.amount.to_string())
        .bind(file_url)
        .bind(file_name)
        .bind(request.status.as_str())
        .bind(request.payment_date.format("%Y-%m-%d").to_string())
        .bind(request.payment_sequence.as_str())
        .bind(request.bill_type.as_str())
        .bind(request.hub.as_str())
        .bind(encode_stamp(request.director_approval.as_ref())?)
        .bind(encode_stamp(request.finance_approval.as_ref())?)
        .bind(format_timestamp(request.created_at))
        .bind(format_timestamp(request.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Inserts `request`, refusing to touch an existing row with the same id.
    async fn insert_new(
        &self,
        request: PurchaseRequest,
    ) -> Result<PurchaseRequest, RepositoryError> {
        if !self.insert_record(&request).await? {
            return Err(RepositoryError::DuplicateId(request.id));
        }
        Ok(request)
    }
}

#[async_trait::async_trait]
impl PurchaseRepository for SqlPurchaseRepository {
    async fn list(&self) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase_request ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(purchase_from_row).collect()
    }

    async fn find_by_id(
        &self,
        id: &PurchaseId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {PURCHASE_COLUMNS} FROM purchase_request WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(purchase_from_row).transpose()
    }

    async fn insert(&self, draft: PurchaseDraft) -> Result<PurchaseRequest, RepositoryError> {
        let request = PurchaseRequest::from_draft(PurchaseId::generate(), draft, Utc::now());
        self.insert_new(request).await
    }

    async fn import(&self, request: PurchaseRequest) -> Result<bool, RepositoryError> {
        self.insert_record(&request).await
    }

    async fn update(
        &self,
        id: &PurchaseId,
        update: PurchaseUpdate,
    ) -> Result<PurchaseRequest, RepositoryError> {
        let (director_approval, finance_approval) = match &update.change {
            WorkflowChange::DirectorApproval { stamp } => (Some(stamp), None),
            WorkflowChange::FinanceApproval { stamp } => (None, Some(stamp)),
            WorkflowChange::Rejection => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE purchase_request
             SET status = ?,
                 director_approval = COALESCE(?, director_approval),
                 finance_approval = COALESCE(?, finance_approval),
                 updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(update.status().as_str())
        .bind(encode_stamp(director_approval)?)
        .bind(encode_stamp(finance_approval)?)
        .bind(format_timestamp(update.updated_at))
        .bind(&id.0)
        .bind(update.expected_status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM purchase_request WHERE id = ?")
                    .bind(&id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Err(match actual {
                None => RepositoryError::NotFound(id.clone()),
                Some(raw) => RepositoryError::StaleStatus {
                    id: id.clone(),
                    expected: update.expected_status,
                    actual: parse_status(&raw)?,
                },
            });
        }

        let row =
            sqlx::query(&format!("SELECT {PURCHASE_COLUMNS} FROM purchase_request WHERE id = ?"))
                .bind(&id.0)
                .fetch_one(&mut *tx)
                .await?;
        let updated = purchase_from_row(row)?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, id: &PurchaseId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM purchase_request WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.clone()));
        }
        Ok(())
    }
}

fn purchase_from_row(row: SqliteRow) -> Result<PurchaseRequest, RepositoryError> {
    let purpose_raw = row.try_get::<String, _>("purpose")?;
    let purpose = Purpose::parse(&purpose_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown purpose `{purpose_raw}`")))?;

    let bill_type_raw = row.try_get::<String, _>("bill_type")?;
    let bill_type = BillType::parse(&bill_type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown bill type `{bill_type_raw}`")))?;

    let hub_raw = row.try_get::<String, _>("hub")?;
    let hub = Hub::parse(&hub_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown hub `{hub_raw}`")))?;

    let sequence_raw = row.try_get::<String, _>("payment_sequence")?;
    let payment_sequence = PaymentSequence::parse(&sequence_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment sequence `{sequence_raw}`"))
    })?;

    let attachment = Attachment::from_columns(row.try_get("file_url")?, row.try_get("file_name")?)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let request = PurchaseRequest {
        id: PurchaseId(row.try_get("id")?),
        uploader_name: row.try_get("uploader_name")?,
        vendor_name: row.try_get("vendor_name")?,
        purpose,
        amount: parse_amount(row.try_get("amount")?)?,
        bill_type,
        hub,
        payment_sequence,
        payment_date: parse_date("payment_date", row.try_get("payment_date")?)?,
        attachment,
        status: parse_status(&row.try_get::<String, _>("status")?)?,
        director_approval: decode_stamp("director_approval", row.try_get("director_approval")?)?,
        finance_approval: decode_stamp("finance_approval", row.try_get("finance_approval")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    };

    request.check_invariants().map_err(|error| RepositoryError::Decode(error.to_string()))?;
    Ok(request)
}

fn parse_status(value: &str) -> Result<PurchaseStatus, RepositoryError> {
    PurchaseStatus::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown purchase status `{value}`")))
}

fn parse_amount(value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `amount`: `{value}` ({error})"))
    })
}

fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_stamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<ApprovalStamp>, RepositoryError> {
    value
        .map(|raw| {
            serde_json::from_str::<ApprovalStamp>(&raw).map_err(|error| {
                RepositoryError::Decode(format!(
                    "invalid approval in `{column}`: `{raw}` ({error})"
                ))
            })
        })
        .transpose()
}

fn encode_stamp(stamp: Option<&ApprovalStamp>) -> Result<Option<String>, RepositoryError> {
    stamp
        .map(|stamp| {
            serde_json::to_string(stamp).map_err(|error| RepositoryError::Encode(error.to_string()))
        })
        .transpose()
}

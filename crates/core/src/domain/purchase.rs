use std::fmt;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(pub String);

impl PurchaseId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    Procurement,
    Salary,
    Repair,
    #[serde(rename = "Small Purchase")]
    SmallPurchase,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Procurement => "Procurement",
            Self::Salary => "Salary",
            Self::Repair => "Repair",
            Self::SmallPurchase => "Small Purchase",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Procurement" => Some(Self::Procurement),
            "Salary" => Some(Self::Salary),
            "Repair" => Some(Self::Repair),
            "Small Purchase" => Some(Self::SmallPurchase),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    Quantum,
    Covalent,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantum => "quantum",
            Self::Covalent => "covalent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quantum" => Some(Self::Quantum),
            "covalent" => Some(Self::Covalent),
            _ => None,
        }
    }
}

/// Originating office of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hub {
    Mumbai,
    Delhi,
    Bangalore,
    Pune,
}

impl Hub {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mumbai => "mumbai",
            Self::Delhi => "delhi",
            Self::Bangalore => "bangalore",
            Self::Pune => "pune",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mumbai" => Some(Self::Mumbai),
            "delhi" => Some(Self::Delhi),
            "bangalore" => Some(Self::Bangalore),
            "pune" => Some(Self::Pune),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSequence {
    PaymentFirst,
    BillFirst,
    PaymentWithoutBill,
}

impl PaymentSequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentFirst => "payment_first",
            Self::BillFirst => "bill_first",
            Self::PaymentWithoutBill => "payment_without_bill",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "payment_first" => Some(Self::PaymentFirst),
            "bill_first" => Some(Self::BillFirst),
            "payment_without_bill" => Some(Self::PaymentWithoutBill),
            _ => None,
        }
    }

    pub fn requires_attachment(&self) -> bool {
        !matches!(self, Self::PaymentWithoutBill)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    DirectorApproved,
    FinanceApproved,
    Rejected,
}

impl PurchaseStatus {
    pub const ALL: [PurchaseStatus; 4] =
        [Self::Pending, Self::DirectorApproved, Self::FinanceApproved, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DirectorApproved => "director_approved",
            Self::FinanceApproved => "finance_approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "director_approved" => Some(Self::DirectorApproved),
            "finance_approved" => Some(Self::FinanceApproved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinanceApproved | Self::Rejected)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A director or finance sign-off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStamp {
    pub approved: bool,
    pub date: DateTime<Utc>,
}

/// Truncates to the microsecond precision timestamps are persisted with.
pub fn record_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

impl ApprovalStamp {
    pub fn granted(at: DateTime<Utc>) -> Self {
        Self { approved: true, date: record_timestamp(at) }
    }
}

/// Reference to a bill file held by external storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
}

impl Attachment {
    /// Pairs the nullable `file_url` / `file_name` columns; one without the other is rejected.
    pub fn from_columns(
        url: Option<String>,
        name: Option<String>,
    ) -> Result<Option<Self>, ValidationError> {
        match (url, name) {
            (Some(url), Some(name)) => Ok(Some(Self { url, name })),
            (None, None) => Ok(None),
            _ => Err(ValidationError::IncompleteAttachment),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{field}` is required")]
    MissingField { field: &'static str },
    #[error("amount must not be negative (got {amount})")]
    NegativeAmount { amount: Decimal },
    #[error("amount {amount} exceeds the maximum of {max}")]
    AmountTooLarge { amount: Decimal, max: Decimal },
    #[error("a bill attachment is required unless the payment is made without a bill")]
    MissingAttachment,
    #[error("`file_url` and `file_name` must be provided together")]
    IncompleteAttachment,
}

/// Largest amount a single request may carry (one lakh crore rupees).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Submission payload for a new purchase request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DraftRecord", into = "DraftRecord")]
pub struct PurchaseDraft {
    pub uploader_name: String,
    pub vendor_name: String,
    pub purpose: Purpose,
    pub amount: Decimal,
    pub bill_type: BillType,
    pub hub: Hub,
    pub payment_sequence: PaymentSequence,
    pub payment_date: NaiveDate,
    pub attachment: Option<Attachment>,
}

impl PurchaseDraft {
    /// Checks the draft and returns it with names trimmed.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.uploader_name = self.uploader_name.trim().to_string();
        self.vendor_name = self.vendor_name.trim().to_string();

        if self.uploader_name.is_empty() {
            return Err(ValidationError::MissingField { field: "uploader_name" });
        }
        if self.vendor_name.is_empty() {
            return Err(ValidationError::MissingField { field: "vendor_name" });
        }
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(ValidationError::NegativeAmount { amount: self.amount });
        }
        if self.amount > MAX_AMOUNT {
            return Err(ValidationError::AmountTooLarge { amount: self.amount, max: MAX_AMOUNT });
        }

        match &self.attachment {
            Some(attachment) => {
                if attachment.url.trim().is_empty() {
                    return Err(ValidationError::MissingField { field: "file_url" });
                }
                if attachment.name.trim().is_empty() {
                    return Err(ValidationError::MissingField { field: "file_name" });
                }
            }
            None if self.payment_sequence.requires_attachment() => {
                return Err(ValidationError::MissingAttachment);
            }
            None => {}
        }

        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PurchaseRecord", into = "PurchaseRecord")]
pub struct PurchaseRequest {
    pub id: PurchaseId,
    pub uploader_name: String,
    pub vendor_name: String,
    pub purpose: Purpose,
    pub amount: Decimal,
    pub bill_type: BillType,
    pub hub: Hub,
    pub payment_sequence: PaymentSequence,
    pub payment_date: NaiveDate,
    pub attachment: Option<Attachment>,
    pub status: PurchaseStatus,
    pub director_approval: Option<ApprovalStamp>,
    pub finance_approval: Option<ApprovalStamp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRequest {
    /// A freshly submitted request: pending, no approvals.
    pub fn from_draft(id: PurchaseId, draft: PurchaseDraft, now: DateTime<Utc>) -> Self {
        let now = record_timestamp(now);
        Self {
            id,
            uploader_name: draft.uploader_name,
            vendor_name: draft.vendor_name,
            purpose: draft.purpose,
            amount: draft.amount,
            bill_type: draft.bill_type,
            hub: draft.hub,
            payment_sequence: draft.payment_sequence,
            payment_date: draft.payment_date,
            attachment: draft.attachment,
            status: PurchaseStatus::Pending,
            director_approval: None,
            finance_approval: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn director_approved(&self) -> bool {
        self.director_approval.as_ref().is_some_and(|stamp| stamp.approved)
    }

    pub fn finance_approved(&self) -> bool {
        self.finance_approval.as_ref().is_some_and(|stamp| stamp.approved)
    }

    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(DomainError::InvariantViolation(format!(
                "purchase {} has negative amount {}",
                self.id, self.amount
            )));
        }

        if self.finance_approved() && self.status != PurchaseStatus::FinanceApproved {
            return Err(DomainError::InvariantViolation(format!(
                "purchase {} carries a finance approval but is {}",
                self.id, self.status
            )));
        }

        if self.status == PurchaseStatus::DirectorApproved && !self.director_approved() {
            return Err(DomainError::InvariantViolation(format!(
                "purchase {} is director_approved without a director sign-off",
                self.id
            )));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DraftRecord {
    uploader_name: String,
    vendor_name: String,
    purpose: Purpose,
    amount: Decimal,
    bill_type: BillType,
    hub: Hub,
    payment_sequence: PaymentSequence,
    payment_date: NaiveDate,
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

impl TryFrom<DraftRecord> for PurchaseDraft {
    type Error = ValidationError;

    fn try_from(record: DraftRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            attachment: Attachment::from_columns(record.file_url, record.file_name)?,
            uploader_name: record.uploader_name,
            vendor_name: record.vendor_name,
            purpose: record.purpose,
            amount: record.amount,
            bill_type: record.bill_type,
            hub: record.hub,
            payment_sequence: record.payment_sequence,
            payment_date: record.payment_date,
        })
    }
}

impl From<PurchaseDraft> for DraftRecord {
    fn from(draft: PurchaseDraft) -> Self {
        let (file_url, file_name) = split_attachment(draft.attachment);
        Self {
            uploader_name: draft.uploader_name,
            vendor_name: draft.vendor_name,
            purpose: draft.purpose,
            amount: draft.amount,
            bill_type: draft.bill_type,
            hub: draft.hub,
            payment_sequence: draft.payment_sequence,
            payment_date: draft.payment_date,
            file_url,
            file_name,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PurchaseRecord {
    id: PurchaseId,
    uploader_name: String,
    vendor_name: String,
    purpose: Purpose,
    amount: Decimal,
    file_url: Option<String>,
    file_name: Option<String>,
    status: PurchaseStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    payment_date: NaiveDate,
    payment_sequence: PaymentSequence,
    bill_type: BillType,
    hub: Hub,
    director_approval: Option<ApprovalStamp>,
    finance_approval: Option<ApprovalStamp>,
}

impl TryFrom<PurchaseRecord> for PurchaseRequest {
    type Error = ValidationError;

    fn try_from(record: PurchaseRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            attachment: Attachment::from_columns(record.file_url, record.file_name)?,
            id: record.id,
            uploader_name: record.uploader_name,
            vendor_name: record.vendor_name,
            purpose: record.purpose,
            amount: record.amount,
            bill_type: record.bill_type,
            hub: record.hub,
            payment_sequence: record.payment_sequence,
            payment_date: record.payment_date,
            status: record.status,
            director_approval: record.director_approval,
            finance_approval: record.finance_approval,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl From<PurchaseRequest> for PurchaseRecord {
    fn from(request: PurchaseRequest) -> Self {
        let (file_url, file_name) = split_attachment(request.attachment);
        Self {
            id: request.id,
            uploader_name: request.uploader_name,
            vendor_name: request.vendor_name,
            purpose: request.purpose,
            amount: request.amount,
            file_url,
            file_name,
            status: request.status,
            created_at: request.created_at,
            updated_at: request.updated_at,
            payment_date: request.payment_date,
            payment_sequence: request.payment_sequence,
            bill_type: request.bill_type,
            hub: request.hub,
            director_approval: request.director_approval,
            finance_approval: request.finance_approval,
        }
    }
}

fn split_attachment(attachment: Option<Attachment>) -> (Option<String>, Option<String>) {
    match attachment {
        Some(Attachment { url, name }) => (Some(url), Some(name)),
        None => (None, None),
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::purchase::{ApprovalStamp, PurchaseRequest, PurchaseStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowCommand {
    DirectorApprove,
    FinanceApprove,
    Reject,
    Delete,
}

impl WorkflowCommand {
    pub const ALL: [WorkflowCommand; 4] =
        [Self::DirectorApprove, Self::FinanceApprove, Self::Reject, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectorApprove => "director-approve",
            Self::FinanceApprove => "finance-approve",
            Self::Reject => "reject",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "director-approve" => Some(Self::DirectorApprove),
            "finance-approve" => Some(Self::FinanceApprove),
            "reject" => Some(Self::Reject),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The workflow fields one command is allowed to write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowChange {
    DirectorApproval { stamp: ApprovalStamp },
    FinanceApproval { stamp: ApprovalStamp },
    Rejection,
}

impl WorkflowChange {
    pub fn target_status(&self) -> PurchaseStatus {
        match self {
            Self::DirectorApproval { .. } => PurchaseStatus::DirectorApproved,
            Self::FinanceApproval { .. } => PurchaseStatus::FinanceApproved,
            Self::Rejection => PurchaseStatus::Rejected,
        }
    }
}

/// A conditional write: applies only while the stored status is still `expected_status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseUpdate {
    pub expected_status: PurchaseStatus,
    pub change: WorkflowChange,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseUpdate {
    pub fn status(&self) -> PurchaseStatus {
        self.change.target_status()
    }

    pub fn apply_to(&self, request: &mut PurchaseRequest) {
        match &self.change {
            WorkflowChange::DirectorApproval { stamp } => {
                request.director_approval = Some(stamp.clone());
            }
            WorkflowChange::FinanceApproval { stamp } => {
                request.finance_approval = Some(stamp.clone());
            }
            WorkflowChange::Rejection => {}
        }
        request.status = self.status();
        request.updated_at = self.updated_at;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionPlan {
    Update(PurchaseUpdate),
    Delete,
}

/// Which actions a dashboard row should offer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableActions {
    pub director_approve: bool,
    pub finance_approve: bool,
    pub reject: bool,
    pub delete: bool,
}

impl AvailableActions {
    pub fn allows(&self, command: WorkflowCommand) -> bool {
        match command {
            WorkflowCommand::DirectorApprove => self.director_approve,
            WorkflowCommand::FinanceApprove => self.finance_approve,
            WorkflowCommand::Reject => self.reject,
            WorkflowCommand::Delete => self.delete,
        }
    }

    pub fn any(&self) -> bool {
        self.director_approve || self.finance_approve || self.reject || self.delete
    }
}

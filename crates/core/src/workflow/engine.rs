use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::purchase::{
    record_timestamp, ApprovalStamp, PurchaseId, PurchaseRequest, PurchaseStatus,
};
use crate::session::{ActorRole, RoleContext};
use crate::workflow::commands::{
    AvailableActions, PurchaseUpdate, TransitionPlan, WorkflowChange, WorkflowCommand,
};

/// Amounts at or above this need a director sign-off before finance can approve.
pub const APPROVAL_THRESHOLD: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("`{role}` may not {command} purchase {purchase_id} while it is {status}")]
pub struct AuthorizationError {
    pub command: WorkflowCommand,
    pub role: ActorRole,
    pub purchase_id: PurchaseId,
    pub status: PurchaseStatus,
}

/// Decides which transitions an actor may take on a purchase request.
///
/// Every predicate is a pure function of the request and the actor's role.
/// [`ApprovalEngine::plan`] re-checks the matching predicate before producing
/// the write, so callers cannot commit a transition the predicate refuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApprovalEngine {
    threshold: Decimal,
}

impl Default for ApprovalEngine {
    fn default() -> Self {
        Self { threshold: APPROVAL_THRESHOLD }
    }
}

impl ApprovalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Whether the request takes the two-stage director-then-finance path.
    pub fn requires_director(&self, request: &PurchaseRequest) -> bool {
        request.amount >= self.threshold
    }

    pub fn can_director_approve<C>(&self, request: &PurchaseRequest, actor: &C) -> bool
    where
        C: RoleContext + ?Sized,
    {
        actor.current_role() == ActorRole::Director
            && request.status == PurchaseStatus::Pending
            && self.requires_director(request)
            && !request.director_approved()
    }

    pub fn can_finance_approve<C>(&self, request: &PurchaseRequest, actor: &C) -> bool
    where
        C: RoleContext + ?Sized,
    {
        actor.current_role() == ActorRole::Finance
            && matches!(request.status, PurchaseStatus::Pending | PurchaseStatus::DirectorApproved)
            && (!self.requires_director(request) || request.director_approved())
            && !request.finance_approved()
    }

    pub fn can_reject<C>(&self, request: &PurchaseRequest, actor: &C) -> bool
    where
        C: RoleContext + ?Sized,
    {
        actor.current_role().is_privileged() && !request.status.is_terminal()
    }

    /// Deletion is gated on role only, never on status.
    pub fn can_delete<C>(&self, _request: &PurchaseRequest, actor: &C) -> bool
    where
        C: RoleContext + ?Sized,
    {
        actor.current_role().is_privileged()
    }

    pub fn permits<C>(&self, command: WorkflowCommand, request: &PurchaseRequest, actor: &C) -> bool
    where
        C: RoleContext + ?Sized,
    {
        match command {
            WorkflowCommand::DirectorApprove => self.can_director_approve(request, actor),
            WorkflowCommand::FinanceApprove => self.can_finance_approve(request, actor),
            WorkflowCommand::Reject => self.can_reject(request, actor),
            WorkflowCommand::Delete => self.can_delete(request, actor),
        }
    }

    pub fn available_actions<C>(&self, request: &PurchaseRequest, actor: &C) -> AvailableActions
    where
        C: RoleContext + ?Sized,
    {
        AvailableActions {
            director_approve: self.can_director_approve(request, actor),
            finance_approve: self.can_finance_approve(request, actor),
            reject: self.can_reject(request, actor),
            delete: self.can_delete(request, actor),
        }
    }

    /// Computes the write for `command`, refusing when its predicate does not hold.
    pub fn plan<C>(
        &self,
        command: WorkflowCommand,
        request: &PurchaseRequest,
        actor: &C,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, AuthorizationError>
    where
        C: RoleContext + ?Sized,
    {
        if !self.permits(command, request, actor) {
            return Err(AuthorizationError {
                command,
                role: actor.current_role(),
                purchase_id: request.id.clone(),
                status: request.status,
            });
        }

        let change = match command {
            WorkflowCommand::DirectorApprove => {
                WorkflowChange::DirectorApproval { stamp: ApprovalStamp::granted(now) }
            }
            WorkflowCommand::FinanceApprove => {
                WorkflowChange::FinanceApproval { stamp: ApprovalStamp::granted(now) }
            }
            WorkflowCommand::Reject => WorkflowChange::Rejection,
            WorkflowCommand::Delete => return Ok(TransitionPlan::Delete),
        };

        Ok(TransitionPlan::Update(PurchaseUpdate {
            expected_status: request.status,
            change,
            updated_at: record_timestamp(now),
        }))
    }
}

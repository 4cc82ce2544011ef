pub mod commands;
pub mod engine;

pub use commands::{
    AvailableActions, PurchaseUpdate, TransitionPlan, WorkflowChange, WorkflowCommand,
};
pub use engine::{ApprovalEngine, AuthorizationError, APPROVAL_THRESHOLD};

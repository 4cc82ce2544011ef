pub mod config;
pub mod dashboard;
pub mod domain;
pub mod errors;
pub mod session;
pub mod workflow;

pub use dashboard::{DashboardQuery, DashboardRow, DashboardStats, DashboardView, StatusFilter};
pub use domain::purchase::{
    ApprovalStamp, Attachment, BillType, Hub, PaymentSequence, PurchaseDraft, PurchaseId,
    PurchaseRequest, PurchaseStatus, Purpose, ValidationError, MAX_AMOUNT,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use session::{ActorRole, Role, RoleContext, Session, SessionRegistry, SessionToken};
pub use workflow::{
    ApprovalEngine, AuthorizationError, AvailableActions, PurchaseUpdate, TransitionPlan,
    WorkflowChange, WorkflowCommand, APPROVAL_THRESHOLD,
};

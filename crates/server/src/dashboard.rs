//! JSON API behind the approval dashboard.
//!
//! Session endpoints:
//! - `POST   /api/v1/session`                           log in as director or finance
//! - `DELETE /api/v1/session`                           revoke the bearer token
//!
//! Purchase endpoints:
//! - `GET    /api/v1/purchases?search=&status=`         dashboard view (session required)
//! - `POST   /api/v1/purchases`                         submit a new request
//! - `GET    /api/v1/purchases/{id}`                    one request with the caller's actions
//! - `POST   /api/v1/purchases/{id}/director-approve`   director sign-off
//! - `POST   /api/v1/purchases/{id}/finance-approve`    finance sign-off
//! - `POST   /api/v1/purchases/{id}/reject`             reject
//! - `DELETE /api/v1/purchases/{id}`                    delete
//!
//! Every action re-reads the store afterwards and answers with the refreshed
//! dashboard view.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use procura_core::dashboard::{DashboardQuery, DashboardRow, DashboardView};
use procura_core::domain::purchase::{PurchaseDraft, PurchaseId, PurchaseRequest};
use procura_core::errors::{ApplicationError, InterfaceError};
use procura_core::session::{RoleContext, Session, SessionRegistry};
use procura_core::workflow::WorkflowCommand;
use procura_db::{ActionOutcome, PurchaseService};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct DashboardState {
    service: Arc<PurchaseService>,
    sessions: SessionRegistry,
}

impl DashboardState {
    pub fn new(service: Arc<PurchaseService>, sessions: SessionRegistry) -> Self {
        Self { service, sessions }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionClosed {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub command: WorkflowCommand,
    pub purchase_id: PurchaseId,
    /// `None` after a delete.
    pub purchase: Option<PurchaseRequest>,
    /// `None` when the action committed but the dashboard could not be re-read.
    pub dashboard: Option<DashboardView>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/v1/session", post(login).delete(logout))
        .route("/api/v1/purchases", get(list_purchases).post(submit_purchase))
        .route("/api/v1/purchases/{id}", get(get_purchase).delete(delete_purchase))
        .route("/api/v1/purchases/{id}/director-approve", post(director_approve))
        .route("/api/v1/purchases/{id}/finance-approve", post(finance_approve))
        .route("/api/v1/purchases/{id}/reject", post(reject_purchase))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Session handlers
// ---------------------------------------------------------------------------

async fn login(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Session>, ApiFailure> {
    let correlation_id = correlation_id(&headers);

    let Some(session) = state.sessions.login(body.username.trim(), &body.password, Utc::now())
    else {
        warn!(
            event_name = "session.login.failed",
            correlation_id = %correlation_id,
            username = %body.username.trim(),
            "login rejected"
        );
        return Err(unauthorized(&correlation_id, "invalid username or password"));
    };

    info!(
        event_name = "session.login",
        correlation_id = %correlation_id,
        username = %session.username,
        role = %session.current_role(),
        expires_at = %session.expires_at.to_rfc3339(),
        "session opened"
    );
    Ok(Json(session))
}

async fn logout(
    State(state): State<DashboardState>,
    headers: HeaderMap,
) -> Result<Json<SessionClosed>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let token = bearer_token(&headers)
        .ok_or_else(|| unauthorized(&correlation_id, "missing bearer token"))?;

    if !state.sessions.logout(token) {
        return Err(unauthorized(&correlation_id, "session is not active"));
    }

    info!(event_name = "session.logout", correlation_id = %correlation_id, "session closed");
    Ok(Json(SessionClosed { success: true }))
}

// ---------------------------------------------------------------------------
// Purchase handlers
// ---------------------------------------------------------------------------

async fn list_purchases(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let session = require_session(&state, &headers, &correlation_id)?;

    let view = state
        .service
        .dashboard(query, &session)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(view))
}

async fn submit_purchase(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    payload: Result<Json<PurchaseDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseRequest>), ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let Json(draft) = payload.map_err(|rejection| {
        warn!(
            event_name = "purchase.submit.malformed",
            correlation_id = %correlation_id,
            error = %rejection.body_text(),
            "purchase draft could not be decoded"
        );
        respond(InterfaceError::BadRequest {
            message: rejection.body_text(),
            correlation_id: correlation_id.clone(),
        })
    })?;

    let stored = state
        .service
        .submit(draft, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Anyone may read a single request; the affordances reflect the caller's session, if any.
async fn get_purchase(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DashboardRow>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let session = optional_session(&state, &headers);

    let purchase = state
        .service
        .get(&PurchaseId(id))
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    let engine = state.service.engine();
    Ok(Json(DashboardRow {
        requires_director: engine.requires_director(&purchase),
        actions: engine.available_actions(&purchase, &session),
        purchase,
    }))
}

async fn director_approve(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ActionResponse>, ApiFailure> {
    act(&state, &headers, id, query, WorkflowCommand::DirectorApprove).await
}

async fn finance_approve(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ActionResponse>, ApiFailure> {
    act(&state, &headers, id, query, WorkflowCommand::FinanceApprove).await
}

async fn reject_purchase(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ActionResponse>, ApiFailure> {
    act(&state, &headers, id, query, WorkflowCommand::Reject).await
}

async fn delete_purchase(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ActionResponse>, ApiFailure> {
    act(&state, &headers, id, query, WorkflowCommand::Delete).await
}

async fn act(
    state: &DashboardState,
    headers: &HeaderMap,
    id: String,
    query: DashboardQuery,
    command: WorkflowCommand,
) -> Result<Json<ActionResponse>, ApiFailure> {
    let correlation_id = correlation_id(headers);
    let session = require_session(state, headers, &correlation_id)?;
    let purchase_id = PurchaseId(id);

    let outcome = state
        .service
        .execute(&purchase_id, command, &session, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    let dashboard = match state.service.dashboard(query, &session).await {
        Ok(view) => Some(view),
        Err(error) => {
            warn!(
                event_name = "dashboard.refresh.failed",
                correlation_id = %correlation_id,
                purchase_id = %purchase_id,
                command = %command,
                error = %error,
                "action committed but the dashboard could not be refreshed"
            );
            None
        }
    };

    let purchase = match outcome {
        ActionOutcome::Updated(purchase) => Some(purchase),
        ActionOutcome::Deleted(_) => None,
    };
    Ok(Json(ActionResponse { command, purchase_id, purchase, dashboard }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn optional_session(state: &DashboardState, headers: &HeaderMap) -> Option<Session> {
    bearer_token(headers).and_then(|token| state.sessions.resolve(token, Utc::now()))
}

fn require_session(
    state: &DashboardState,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<Session, ApiFailure> {
    optional_session(state, headers)
        .ok_or_else(|| unauthorized(correlation_id, "a director or finance session is required"))
}

fn unauthorized(correlation_id: &str, detail: &str) -> ApiFailure {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            error: "unauthorized".to_string(),
            message: "Sign in as director or finance to continue.".to_string(),
            detail: detail.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: ApplicationError, correlation_id: &str) -> ApiFailure {
    respond(error.into_interface(correlation_id))
}

fn respond(error: InterfaceError) -> ApiFailure {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(
            event_name = "dashboard.request.failed",
            correlation_id = %error.correlation_id(),
            error_class = error.code(),
            error = %error,
            "dashboard request failed"
        );
    }

    (
        status,
        Json(ApiError {
            error: error.code().to_string(),
            message: error.user_message().to_string(),
            detail: error.message().to_string(),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{HeaderValue, Request};
    use chrono::NaiveDate;
    use procura_core::dashboard::StatusFilter;
    use procura_core::domain::purchase::{
        Attachment, BillType, Hub, PaymentSequence, PurchaseStatus, Purpose,
    };
    use procura_core::session::{ActorRole, Credential, CredentialTable, Role};
    use procura_core::workflow::{ApprovalEngine, PurchaseUpdate};
    use procura_db::{
        connect_with_settings, migrations, DemoSeedDataset, DbPool, InMemoryPurchaseRepository,
        PurchaseRepository, RepositoryError, SqlPurchaseRepository,
    };
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    /// Reads and writes go to memory; every listing fails.
    struct UnlistableRepository(InMemoryPurchaseRepository);

    #[async_trait::async_trait]
    impl PurchaseRepository for UnlistableRepository {
        async fn list(&self) -> Result<Vec<PurchaseRequest>, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn find_by_id(
            &self,
            id: &PurchaseId,
        ) -> Result<Option<PurchaseRequest>, RepositoryError> {
            self.0.find_by_id(id).await
        }

        async fn insert(&self, draft: PurchaseDraft) -> Result<PurchaseRequest, RepositoryError> {
            self.0.insert(draft).await
        }

        async fn import(&self, request: PurchaseRequest) -> Result<bool, RepositoryError> {
            self.0.import(request).await
        }

        async fn update(
            &self,
            id: &PurchaseId,
            update: PurchaseUpdate,
        ) -> Result<PurchaseRequest, RepositoryError> {
            self.0.update(id, update).await
        }

        async fn delete(&self, id: &PurchaseId) -> Result<(), RepositoryError> {
            self.0.delete(id).await
        }
    }

    async fn post_draft(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/purchases")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(CORRELATION_HEADER, "corr-submit")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("submit response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json error body"))
    }

    fn draft_json(amount: i64) -> Value {
        serde_json::to_value(draft(amount)).expect("draft json")
    }

    async fn setup() -> (DbPool, DashboardState) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let repository = SqlPurchaseRepository::new(pool.clone());
        DemoSeedDataset::load(&repository).await.expect("seed");

        let service =
            Arc::new(PurchaseService::from_repository(repository, ApprovalEngine::default()));
        let sessions = SessionRegistry::new(
            CredentialTable::new(vec![
                Credential {
                    username: "director".to_string(),
                    password: "director-pass".to_string().into(),
                    role: Role::Director,
                },
                Credential {
                    username: "finance".to_string(),
                    password: "finance-pass".to_string().into(),
                    role: Role::Finance,
                },
            ]),
            chrono::Duration::minutes(30),
        );

        (pool, DashboardState::new(service, sessions))
    }

    fn signed_in(state: &DashboardState, username: &str, password: &str) -> HeaderMap {
        let session = state.sessions.login(username, password, Utc::now()).expect("login");
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", session.token.0)).expect("header"),
        );
        headers
    }

    fn draft(amount: i64) -> PurchaseDraft {
        PurchaseDraft {
            uploader_name: "Kiran Patel".to_string(),
            vendor_name: "Deccan Hardware".to_string(),
            purpose: Purpose::Repair,
            amount: Decimal::new(amount, 0),
            bill_type: BillType::Quantum,
            hub: Hub::Bangalore,
            payment_sequence: PaymentSequence::BillFirst,
            payment_date: NaiveDate::from_ymd_opt(2026, 4, 15).expect("date"),
            attachment: Some(Attachment {
                url: "https://files.example.com/purchase-files/deccan.pdf".to_string(),
                name: "deccan.pdf".to_string(),
            }),
        }
    }

    fn id(value: &str) -> Path<String> {
        Path(value.to_string())
    }

    #[tokio::test]
    async fn login_issues_session_for_valid_credentials() {
        let (_pool, state) = setup().await;

        let Json(session) = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                username: "  Director ".to_string(),
                password: "director-pass".to_string(),
            }),
        )
        .await
        .expect("login should succeed");

        assert_eq!(session.role, Role::Director);
        assert!(session.expires_at > session.issued_at);
        assert!(state.sessions.resolve(&session.token.0, Utc::now()).is_some());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let (_pool, state) = setup().await;

        let (status, Json(body)) = login(
            State(state),
            HeaderMap::new(),
            Json(LoginRequest {
                username: "finance".to_string(),
                password: "FINANCE-PASS".to_string(),
            }),
        )
        .await
        .expect_err("password is case-sensitive");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, "unauthorized");
    }

    #[tokio::test]
    async fn dashboard_requires_session() {
        let (_pool, state) = setup().await;

        let (status, _) =
            list_purchases(State(state), HeaderMap::new(), Query(DashboardQuery::default()))
                .await
                .expect_err("anonymous dashboard");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboard_shows_role_specific_actions() {
        let (_pool, state) = setup().await;
        let headers = signed_in(&state, "director", "director-pass");

        let Json(view) =
            list_purchases(State(state), headers, Query(DashboardQuery::default()))
                .await
                .expect("dashboard");

        assert_eq!(view.role, ActorRole::Director);
        assert_eq!(view.stats.total, 5);
        assert_eq!(view.stats.pending, 2);
        assert_eq!(view.stats.approved, 1);
        assert_eq!(view.stats.rejected, 1);

        let large = view.rows.iter().find(|row| row.purchase.id.0 == "demo-pr-002").expect("row");
        assert!(large.requires_director);
        assert!(large.actions.director_approve);
        assert!(!large.actions.finance_approve);

        let small = view.rows.iter().find(|row| row.purchase.id.0 == "demo-pr-001").expect("row");
        assert!(!small.actions.director_approve);
        assert!(small.actions.reject);
        assert!(small.actions.delete);
    }

    #[tokio::test]
    async fn dashboard_filters_by_search_and_status() {
        let (_pool, state) = setup().await;
        let headers = signed_in(&state, "finance", "finance-pass");

        let Json(view) = list_purchases(
            State(state),
            headers,
            Query(DashboardQuery {
                search: "ACME".to_string(),
                status: StatusFilter::Only(PurchaseStatus::Pending),
            }),
        )
        .await
        .expect("dashboard");

        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].purchase.vendor_name, "Acme Repairs");
        assert_eq!(view.stats.total, 1);
    }

    #[tokio::test]
    async fn submit_creates_pending_request() {
        let (_pool, state) = setup().await;

        let (status, Json(stored)) =
            submit_purchase(State(state.clone()), HeaderMap::new(), Ok(Json(draft(12_500))))
                .await
                .expect("submit");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(stored.status, PurchaseStatus::Pending);
        assert!(stored.director_approval.is_none());
        assert!(stored.finance_approval.is_none());

        let Json(row) = get_purchase(State(state), HeaderMap::new(), id(&stored.id.0))
            .await
            .expect("fetch stored request");
        assert_eq!(row.purchase, stored);
        assert!(!row.actions.any(), "anonymous readers get no actions");
    }

    #[tokio::test]
    async fn submit_without_bill_is_bad_request() {
        let (_pool, state) = setup().await;
        let mut invalid = draft(900);
        invalid.attachment = None;

        let (status, Json(body)) =
            submit_purchase(State(state), HeaderMap::new(), Ok(Json(invalid)))
                .await
                .expect_err("bill required");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "bad_request");
    }

    #[tokio::test]
    async fn draft_missing_a_field_is_bad_request_with_error_body() {
        let (_pool, state) = setup().await;
        let mut body = draft_json(900);
        body.as_object_mut().expect("object").remove("vendor_name");

        let (status, error) = post_draft(router(state), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "bad_request");
        assert_eq!(error["correlation_id"], "corr-submit");
        assert!(error["detail"].as_str().unwrap_or("").contains("vendor_name"), "{error}");
    }

    #[tokio::test]
    async fn draft_with_half_an_attachment_is_bad_request() {
        let (_pool, state) = setup().await;
        let mut body = draft_json(900);
        body.as_object_mut().expect("object").remove("file_name");

        let (status, error) = post_draft(router(state), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "bad_request");
        assert!(error["detail"].as_str().unwrap_or("").contains("file_name"), "{error}");
    }

    #[tokio::test]
    async fn oversized_amount_is_bad_request() {
        let (_pool, state) = setup().await;
        let mut body = draft_json(900);
        body["amount"] = Value::String("1000000000000.01".to_string());

        let (status, error) = post_draft(router(state.clone()), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "bad_request");

        let finance = signed_in(&state, "finance", "finance-pass");
        let Json(view) = list_purchases(State(state), finance, Query(DashboardQuery::default()))
            .await
            .expect("dashboard still renders");
        assert_eq!(view.stats.total, 5);
    }

    #[tokio::test]
    async fn committed_action_survives_a_failed_dashboard_refresh() {
        let (_pool, seeded) = setup().await;
        let memory = InMemoryPurchaseRepository::default();
        for purchase in DemoSeedDataset::purchases() {
            memory.import(purchase).await.expect("import");
        }
        let service = PurchaseService::from_repository(
            UnlistableRepository(memory),
            ApprovalEngine::default(),
        );
        let state = DashboardState::new(Arc::new(service), seeded.sessions.clone());
        let finance = signed_in(&state, "finance", "finance-pass");

        let Json(response) = finance_approve(
            State(state.clone()),
            finance,
            id("demo-pr-001"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect("the write committed");

        assert!(response.dashboard.is_none());
        assert_eq!(
            response.purchase.map(|purchase| purchase.status),
            Some(PurchaseStatus::FinanceApproved)
        );
        let stored =
            state.service.get(&PurchaseId("demo-pr-001".to_string())).await.expect("stored");
        assert_eq!(stored.status, PurchaseStatus::FinanceApproved);
    }

    #[tokio::test]
    async fn finance_cannot_skip_director_on_large_request() {
        let (pool, state) = setup().await;
        let headers = signed_in(&state, "finance", "finance-pass");

        let (status, Json(body)) = finance_approve(
            State(state),
            headers,
            id("demo-pr-002"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect_err("director gate");

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "forbidden");

        let stored: String =
            sqlx::query_scalar("SELECT status FROM purchase_request WHERE id = 'demo-pr-002'")
                .fetch_one(&pool)
                .await
                .expect("status");
        assert_eq!(stored, "pending");
    }

    #[tokio::test]
    async fn two_stage_approval_returns_refreshed_dashboard() {
        let (_pool, state) = setup().await;
        let director = signed_in(&state, "director", "director-pass");
        let finance = signed_in(&state, "finance", "finance-pass");

        let Json(first) = director_approve(
            State(state.clone()),
            director,
            id("demo-pr-002"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect("director approve");
        assert_eq!(
            first.purchase.as_ref().map(|p| p.status),
            Some(PurchaseStatus::DirectorApproved)
        );
        assert_eq!(first.dashboard.as_ref().map(|view| view.stats.pending), Some(1));

        let Json(second) = finance_approve(
            State(state),
            finance,
            id("demo-pr-002"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect("finance approve");

        let purchase = second.purchase.expect("updated purchase");
        assert_eq!(purchase.status, PurchaseStatus::FinanceApproved);
        assert!(purchase.director_approved());
        assert!(purchase.finance_approved());
        assert_eq!(second.dashboard.map(|view| view.stats.approved), Some(2));
    }

    #[tokio::test]
    async fn reject_keeps_existing_director_stamp() {
        let (_pool, state) = setup().await;
        let finance = signed_in(&state, "finance", "finance-pass");

        let Json(response) = reject_purchase(
            State(state),
            finance,
            id("demo-pr-003"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect("reject");

        let purchase = response.purchase.expect("updated purchase");
        assert_eq!(purchase.status, PurchaseStatus::Rejected);
        assert!(purchase.director_approved());
    }

    #[tokio::test]
    async fn rejected_request_is_terminal() {
        let (_pool, state) = setup().await;
        let director = signed_in(&state, "director", "director-pass");

        let (status, _) = director_approve(
            State(state),
            director,
            id("demo-pr-005"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect_err("terminal");

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delete_removes_request_in_any_status() {
        let (_pool, state) = setup().await;
        let director = signed_in(&state, "director", "director-pass");

        let Json(response) = delete_purchase(
            State(state.clone()),
            director,
            id("demo-pr-004"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect("delete");

        assert!(response.purchase.is_none());
        assert_eq!(response.dashboard.map(|view| view.stats.total), Some(4));

        let (status, _) = get_purchase(State(state), HeaderMap::new(), id("demo-pr-004"))
            .await
            .expect_err("deleted");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn acting_without_session_is_unauthorized() {
        let (_pool, state) = setup().await;

        let (status, _) = delete_purchase(
            State(state),
            HeaderMap::new(),
            id("demo-pr-001"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect_err("anonymous delete");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn action_on_missing_purchase_is_not_found() {
        let (_pool, state) = setup().await;
        let director = signed_in(&state, "director", "director-pass");

        let (status, Json(body)) = reject_purchase(
            State(state),
            director,
            id("missing"),
            Query(DashboardQuery::default()),
        )
        .await
        .expect_err("missing");

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "not_found");
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let (_pool, state) = setup().await;
        let headers = signed_in(&state, "director", "director-pass");

        let Json(closed) = logout(State(state.clone()), headers.clone()).await.expect("logout");
        assert!(closed.success);

        let (status, _) =
            list_purchases(State(state.clone()), headers.clone(), Query(DashboardQuery::default()))
                .await
                .expect_err("revoked");
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = logout(State(state), headers).await.expect_err("already closed");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_failure_maps_to_service_unavailable() {
        let (pool, state) = setup().await;
        let headers = signed_in(&state, "finance", "finance-pass");
        pool.close().await;

        let (status, Json(body)) =
            list_purchases(State(state), headers, Query(DashboardQuery::default()))
                .await
                .expect_err("closed pool");

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error, "service_unavailable");
    }

    #[test]
    fn conflict_maps_to_409_with_correlation_id() {
        let (status, Json(body)) =
            failure(ApplicationError::Conflict("purchase `p` moved".to_string()), "corr-9");

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "conflict");
        assert_eq!(body.correlation_id, "corr-9");
    }

    #[test]
    fn bearer_token_parsing_is_scheme_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc-123"));
        assert_eq!(bearer_token(&headers), Some("abc-123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc-123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn router_serves_login_then_dashboard() {
        let (_pool, state) = setup().await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/session")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"finance","password":"finance-pass"}"#))
                    .expect("request"),
            )
            .await
            .expect("login response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let session: serde_json::Value = serde_json::from_slice(&body).expect("json");
        let token = session["token"].as_str().expect("token").to_string();
        assert_eq!(session["role"], "finance");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/purchases?status=pending&search=kaveri")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(CORRELATION_HEADER, "corr-router")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dashboard response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let view: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(view["role"], "finance");
        assert_eq!(view["rows"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["rows"][0]["purchase"]["id"], "demo-pr-001");
        assert_eq!(view["rows"][0]["actions"]["finance_approve"], true);
    }
}

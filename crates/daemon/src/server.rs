//! HTTP API server

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use vpspanel_common::api::{
    ChangePasswordRequest, CreateUserRequest, Dashboard, HealthResponse, LoginRequest,
    LoginResponse, SetActiveRequest, SignUpRequest, UpdateProfileRequest, VpsView,
};
use vpspanel_common::{now_epoch_secs, ActivityEntry, Identity};

use crate::auth::middleware::require_auth;
use crate::auth::AuthenticatedIdentity;
use crate::functions::{body, docker_manager_handler, terminal_exec_handler};
use crate::response::{ok, ApiResult};
use crate::state::PanelState;

/// Build the full router: public auth endpoints plus everything behind
/// the bearer-token middleware.
pub fn router(state: PanelState) -> Router {
    let protected_routes = Router::new()
        // Remote operations
        .route("/functions/v1/docker-manager", post(docker_manager_handler))
        .route("/functions/v1/terminal-exec", post(terminal_exec_handler))

        // Session and profile
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/password", post(change_password_handler))
        .route("/api/auth/me", get(me_handler).patch(update_profile_handler))

        // Registry, activity and dashboards
        .route("/api/vps", get(list_vps_handler))
        .route("/api/vps/:vps_id", get(get_vps_handler))
        .route("/api/activity", get(activity_handler))
        .route("/api/dashboard", get(dashboard_handler))

        // User management
        .route("/api/admin/users", get(list_users_handler).post(create_user_handler))
        .route("/api/admin/users/:user_id", axum::routing::delete(delete_user_handler))
        .route("/api/admin/users/:user_id/active", post(set_active_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .merge(protected_routes)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    state: PanelState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Panel API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "vpspaneld".to_string(),
        version: vpspanel_common::VERSION.to_string(),
    })
}

async fn signup_handler(
    State(state): State<PanelState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let req = body(payload)?;
    ok(state.auth.sign_up(&req.username, &req.password, req.email).await?)
}

async fn login_handler(
    State(state): State<PanelState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let req = body(payload)?;
    let session = state.auth.sign_in(&req.username, &req.password).await?;
    ok(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        identity: session.identity,
    })
}

async fn logout_handler(
    State(state): State<PanelState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> ApiResult<bool> {
    state.auth.sign_out(bearer.token())?;
    ok(true)
}

async fn change_password_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<bool> {
    let req = body(payload)?;
    state.auth.change_password(&caller, &req.new_password).await?;
    ok(true)
}

async fn me_handler(
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
) -> ApiResult<Identity> {
    ok(caller)
}

async fn update_profile_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let req = body(payload)?;
    ok(state
        .auth
        .update_profile(&caller, req.username.as_deref(), req.email)?)
}

async fn list_vps_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
) -> ApiResult<Vec<VpsView>> {
    let now = now_epoch_secs();
    let views = state
        .registry
        .list(&caller)?
        .into_iter()
        .map(|v| VpsView::new(v, now))
        .collect();
    ok(views)
}

async fn get_vps_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    Path(vps_id): Path<String>,
) -> ApiResult<VpsView> {
    let vps = state.registry.get(&caller, &vps_id)?;
    ok(VpsView::new(vps, now_epoch_secs()))
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    vps_id: Option<String>,
    limit: Option<usize>,
}

async fn activity_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityEntry>> {
    ok(state
        .activity
        .list_for(&caller, query.vps_id.as_deref(), query.limit)?)
}

async fn dashboard_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
) -> ApiResult<Dashboard> {
    ok(state.dashboards.for_caller(&caller)?)
}

async fn list_users_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
) -> ApiResult<Vec<Identity>> {
    ok(state.auth.list_users(&caller)?)
}

async fn create_user_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let req = body(payload)?;
    ok(state
        .auth
        .create_user(&caller, &req.username, &req.password, req.role)
        .await?)
}

async fn delete_user_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    Path(user_id): Path<String>,
) -> ApiResult<bool> {
    state.delete_user(&caller, &user_id)?;
    ok(true)
}

async fn set_active_handler(
    State(state): State<PanelState>,
    Extension(AuthenticatedIdentity(caller)): Extension<AuthenticatedIdentity>,
    Path(user_id): Path<String>,
    payload: Result<Json<SetActiveRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let req = body(payload)?;
    ok(state.auth.set_active(&caller, &user_id, req.active)?)
}

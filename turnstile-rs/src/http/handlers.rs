use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use tracing::{debug, error, info, warn};

use crate::store::User;

use super::error::ApiError;
use super::gateway::{require_basic, require_bearer, Identity};
use super::responses::{
    CreateUserForm, DeleteUserForm, HealthResponse, LoginRequest, LoginResponse, VisitResponse,
};
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let bearer_routes = Router::new()
        .route("/", get(visit_count))
        .route("/verify", get(verify).post(verify))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    let admin_routes = Router::new()
        .route("/admin", get(admin_page))
        .route("/admin/users", post(create_user))
        .route("/admin/users/delete", post(delete_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_basic));

    Router::new()
        .route("/login", post(login))
        .route("/health", get(health))
        .merge(bearer_routes)
        .merge(admin_routes)
        .layer(tower_http::request_id::SetRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
            tower_http::request_id::MakeRequestUuid::default(),
        ))
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(|err| {
        debug!(error = %err, "malformed login body");
        ApiError::Validation("invalid request body")
    })?;

    let record = state
        .store
        .find_user(&request.username)
        .await
        .map_err(|err| {
            error!(error = %err, "credential lookup failed");
            ApiError::Internal
        })?;
    // unknown user and wrong password collapse to the same response; the log
    // lines keep them apart for operators
    let Some(record) = record else {
        warn!(username = %request.username, "login rejected: unknown user");
        return Err(ApiError::InvalidCredentials);
    };
    if !state.hasher.verify(&record.password_hash, &request.password) {
        warn!(username = %request.username, "login rejected: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.tokens.issue(&record.username).map_err(|err| {
        error!(error = %err, "token issuance failed");
        ApiError::Internal
    })?;

    info!(username = %record.username, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        user: User {
            username: record.username,
            created_at: record.created_at,
        },
    }))
}

/// The bearer gateway has already done all the work by the time this runs.
async fn verify(Extension(identity): Extension<Identity>) -> StatusCode {
    debug!(username = %identity.username, "token verified");
    StatusCode::OK
}

async fn visit_count(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<VisitResponse>, ApiError> {
    let count = state.store.record_visit().await.map_err(|err| {
        error!(error = %err, "failed to record visit");
        ApiError::Internal
    })?;
    debug!(count, username = %identity.username, "visit recorded");
    Ok(Json(VisitResponse { count }))
}

async fn admin_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let users = state.store.list_users().await.map_err(|err| {
        error!(error = %err, "failed to list users");
        ApiError::Internal
    })?;
    debug!(users = users.len(), "admin page requested");
    Ok(Html(super::responses::render_admin_page(&users)))
}

async fn create_user(
    State(state): State<AppState>,
    payload: Result<Form<CreateUserForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Form(form) = payload.map_err(|err| {
        debug!(error = %err, "malformed create-user form");
        ApiError::Validation("username and password required")
    })?;
    if form.username.is_empty() || form.password.is_empty() {
        return Err(ApiError::Validation("username and password required"));
    }

    let digest = state.hasher.hash(&form.password).map_err(|err| {
        error!(error = %err, "password hashing failed");
        ApiError::Internal
    })?;
    state
        .store
        .create_user(&form.username, &digest)
        .await
        .map_err(|err| {
            error!(username = %form.username, error = %err, "failed to create user");
            ApiError::Internal
        })?;

    info!(username = %form.username, "user created");
    Ok(Redirect::to("/admin"))
}

async fn delete_user(
    State(state): State<AppState>,
    payload: Result<Form<DeleteUserForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Form(form) = payload.map_err(|err| {
        debug!(error = %err, "malformed delete-user form");
        ApiError::Validation("username required")
    })?;
    if form.username == "admin" {
        warn!("refused to delete the admin user");
        return Err(ApiError::Validation("cannot delete admin user"));
    }

    state
        .store
        .delete_user(&form.username)
        .await
        .map_err(|err| {
            error!(username = %form.username, error = %err, "failed to delete user");
            ApiError::Internal
        })?;

    info!(username = %form.username, "user deleted");
    Ok(Redirect::to("/admin"))
}

use crate::{
    service::accounts,
    server::{
        Result, ServerError, ServerRouter, SessionTtl,
        auth::Viewer,
        json::{Created, Json},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use flock_common::model::user::User;
use flock_db::Backend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(me)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Deserialize)]
struct RegisterRequest {
    handle: String,
    password: String,
    confirm_password: String,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<Arc<Backend>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Created<User>> {
    let user = accounts::register(
        &*store,
        request.handle,
        &request.password,
        &request.confirm_password,
    )
    .await?;

    Ok(Created(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/login", rejection(ServerError))]
struct LoginPath();

#[derive(Deserialize)]
struct LoginRequest {
    handle: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: User,
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<Backend>>,
    State(SessionTtl(ttl)): State<SessionTtl>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (token, user) = accounts::login(&*store, request.handle, &request.password, ttl).await?;

    Ok(Json(LoginResponse {
        token: token.as_token_str(),
        user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
) -> Result<StatusCode> {
    accounts::logout(&*store, &viewer.token).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me", rejection(ServerError))]
struct MePath();

async fn me(MePath(): MePath, viewer: Viewer) -> Json<User> {
    Json(viewer.user)
}

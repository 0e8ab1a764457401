use crate::{
    service::{
        accounts,
        feed::{self, Profile},
        graph::{self, FollowState},
    },
    server::{Result, ServerError, ServerRouter, auth::Viewer, json::Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use flock_common::model::user::UserHandle;
use flock_db::Backend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_users)
        .typed_get(get_profile)
        .typed_post(toggle_follow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

async fn list_users(
    UsersPath(): UsersPath,
    State(store): State<Arc<Backend>>,
    _viewer: Viewer,
) -> Result<Json<Vec<UserHandle>>> {
    let handles = accounts::directory(&*store).await?;

    Ok(Json(handles))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}", rejection(ServerError))]
struct UserPath {
    handle: UserHandle,
}

async fn get_profile(
    UserPath { handle }: UserPath,
    State(store): State<Arc<Backend>>,
    _viewer: Viewer,
) -> Result<Json<Profile>> {
    let profile = feed::profile(&*store, &handle).await?;

    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}/follow", rejection(ServerError))]
struct FollowPath {
    handle: UserHandle,
}

#[derive(Serialize)]
struct FollowResponse {
    handle: UserHandle,
    state: FollowState,
}

async fn toggle_follow(
    FollowPath { handle }: FollowPath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
) -> Result<Json<FollowResponse>> {
    let state = graph::toggle_follow(&*store, &viewer.user, &handle).await?;

    Ok(Json(FollowResponse { handle, state }))
}

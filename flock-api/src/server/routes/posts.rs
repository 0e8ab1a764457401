use crate::{
    service::{
        graph::{self, LikeState},
        posts,
    },
    server::{
        Result, ServerError, ServerRouter,
        auth::Viewer,
        json::{Created, Json},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use flock_common::model::{
    Id,
    post::{Post, PostMarker},
};
use flock_db::Backend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(edit_post)
        .typed_delete(delete_post)
        .typed_post(toggle_like)
}

/// Raw content; validation happens in the service layer so rejected input can be
/// echoed back.
#[derive(Deserialize)]
struct ContentRequest {
    content: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
    Json(request): Json<ContentRequest>,
) -> Result<Created<Post>> {
    let post = posts::create_post(&*store, &viewer.user, request.content).await?;

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<Backend>>,
    _viewer: Viewer,
) -> Result<Json<Post>> {
    let post = posts::fetch_post(&*store, id).await?;

    Ok(Json(post))
}

async fn edit_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
    Json(request): Json<ContentRequest>,
) -> Result<Json<Post>> {
    let post = posts::edit_post(&*store, &viewer.user, id, request.content).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
) -> Result<StatusCode> {
    posts::delete_post(&*store, &viewer.user, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePath {
    id: Id<PostMarker>,
}

#[derive(Serialize)]
struct LikeResponse {
    post_id: Id<PostMarker>,
    state: LikeState,
    like_count: usize,
}

async fn toggle_like(
    LikePath { id }: LikePath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
) -> Result<Json<LikeResponse>> {
    let toggle = graph::toggle_like(&*store, &viewer.user, id).await?;

    Ok(Json(LikeResponse {
        post_id: id,
        state: toggle.state,
        like_count: toggle.like_count,
    }))
}

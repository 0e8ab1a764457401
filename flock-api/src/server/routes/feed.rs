use crate::{
    service::feed,
    server::{Result, ServerError, ServerRouter, auth::Viewer, json::Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use flock_common::model::post::Post;
use flock_db::Backend;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed", rejection(ServerError))]
struct FeedPath();

async fn get_feed(
    FeedPath(): FeedPath,
    State(store): State<Arc<Backend>>,
    viewer: Viewer,
) -> Result<Json<Vec<Post>>> {
    let posts = feed::assemble_feed(&*store, &viewer.user).await?;

    Ok(Json(posts))
}

use crate::{service::accounts, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use flock_common::model::{session::SessionToken, user::User};
use flock_db::Backend;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::OffsetDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The user a request acts as, resolved from its bearer session token.
#[derive(Clone, Debug)]
pub struct Viewer {
    pub user: User,
    pub token: SessionToken,
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<Backend>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token: SessionToken = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let store = Arc::<Backend>::from_ref(state);
        let user = accounts::authenticate(&*store, &token, OffsetDateTime::now_utc())
            .await?
            .ok_or(ServerError::InvalidToken)?;

        Ok(Self { user, token })
    }
}

use crate::service::{CoreError, Result};
use flock_common::{
    model::{
        password::PasswordDigest,
        session::{Session, SessionToken},
        user::{CreateUser, User, UserHandle},
    },
    util::PositiveDuration,
};
use flock_db::Store;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub async fn register<S: Store>(
    store: &S,
    handle: String,
    password: &str,
    confirm_password: &str,
) -> Result<User> {
    let handle = UserHandle::new(handle)?;
    if password.is_empty() {
        return Err(CoreError::EmptyPassword);
    }
    if password != confirm_password {
        return Err(CoreError::PasswordMismatch);
    }
    if store.find_user_by_handle(&handle).await?.is_some() {
        return Err(CoreError::HandleTaken(handle));
    }

    let user = store
        .insert_user(&CreateUser {
            handle,
            password_digest: PasswordDigest::derive(password)?,
        })
        .await?;

    info!(user_id = %user.id, handle = %user.handle, "Registered user");
    Ok(user)
}

/// Checks the password and opens a session lasting `ttl` (`None` never
/// expires). An unknown handle and a wrong password are indistinguishable to
/// the caller.
pub async fn login<S: Store>(
    store: &S,
    handle: String,
    password: &str,
    ttl: Option<PositiveDuration>,
) -> Result<(SessionToken, User)> {
    let Ok(handle) = UserHandle::new(handle) else {
        return Err(CoreError::InvalidCredentials);
    };

    let credentials = store.find_credentials(&handle).await?;
    let Some(credentials) = credentials.filter(|creds| creds.password_digest.verify(password))
    else {
        warn!(%handle, "Rejected login");
        return Err(CoreError::InvalidCredentials);
    };

    let user = credentials.user;
    let token = SessionToken::generate_random(user.id);
    let session = Session::open(&token, OffsetDateTime::now_utc(), ttl)?;
    store.insert_session(&session).await?;

    info!(user_id = %user.id, %handle, "Opened session");
    Ok((token, user))
}

pub async fn logout<S: Store>(store: &S, token: &SessionToken) -> Result<()> {
    store.delete_session(&token.hash()?).await?;
    info!(user_id = %token.user_id, "Closed session");
    Ok(())
}

/// The user behind `token`, or `None` if the session is unknown, expired,
/// issued for someone else, or its user is gone. Expired sessions are removed.
pub async fn authenticate<S: Store>(
    store: &S,
    token: &SessionToken,
    now: OffsetDateTime,
) -> Result<Option<User>> {
    let token_hash = token.hash()?;
    let Some(session) = store.find_session(&token_hash).await? else {
        return Ok(None);
    };
    if session.is_expired_at(now) {
        store.delete_session(&token_hash).await?;
        debug!(user_id = %session.user, "Removed expired session");
        return Ok(None);
    }
    if !session.admits(token, now) {
        return Ok(None);
    }

    Ok(store.find_user_by_id(session.user).await?)
}

/// Every registered handle, sorted.
pub async fn directory<S: Store>(store: &S) -> Result<Vec<UserHandle>> {
    Ok(store.list_user_handles().await?)
}

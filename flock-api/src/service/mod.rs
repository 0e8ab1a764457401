//! The operations behind every request, independent of HTTP.
//!
//! Each function takes the store it works on and, where an identity matters,
//! the acting [`User`](flock_common::model::user::User) resolved for the
//! request. Nothing here holds session state of its own.

use flock_common::model::{
    Id,
    password::PasswordHashError,
    post::{InvalidPostContentError, PostMarker},
    session::SessionTokenHashError,
    user::{InvalidUserHandleError, UserHandle},
};
use flock_db::DbError;
use thiserror::Error;

pub mod accounts;
pub mod feed;
pub mod graph;
pub mod posts;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    InvalidHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    InvalidContent(#[from] InvalidPostContentError),
    #[error("The password must not be empty")]
    EmptyPassword,
    #[error("The passwords do not match")]
    PasswordMismatch,
    #[error("Invalid handle or password")]
    InvalidCredentials,
    #[error("Only the author may change post {0}")]
    NotOwner(Id<PostMarker>),
    #[error("Users cannot follow themselves")]
    SelfFollow,
    #[error("User {0} was not found")]
    UserNotFound(UserHandle),
    #[error("Post {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("The handle {0} is already taken")]
    HandleTaken(UserHandle),
    #[error("Deriving the password digest failed: {0}")]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    SessionTokenHash(#[from] SessionTokenHashError),
    #[error(transparent)]
    Store(DbError),
}

/// Coarse classification of a [`CoreError`], used to pick a response status.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ErrorKind {
    /// The input had the wrong shape or length.
    Validation,
    /// The actor has no rights over the target.
    Authorization,
    NotFound,
    /// The handle is already registered.
    Conflict,
    /// The store or a hashing primitive failed.
    Store,
}

impl CoreError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHandle(_)
            | Self::InvalidContent(_)
            | Self::EmptyPassword
            | Self::PasswordMismatch
            | Self::InvalidCredentials => ErrorKind::Validation,
            Self::NotOwner(_) | Self::SelfFollow => ErrorKind::Authorization,
            Self::UserNotFound(_) | Self::PostNotFound(_) => ErrorKind::NotFound,
            Self::HandleTaken(_) => ErrorKind::Conflict,
            Self::PasswordHash(_) | Self::SessionTokenHash(_) | Self::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::HandleTaken(handle) => Self::HandleTaken(handle),
            err => Self::Store(err),
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::service::{CoreError, ErrorKind};
    use flock_common::model::user::UserHandle;
    use flock_db::DbError;

    #[test]
    fn taken_handle_from_store_is_a_conflict() {
        let handle = UserHandle::new("alice".to_owned()).unwrap();
        let err = CoreError::from(DbError::HandleTaken(handle.clone()));

        assert!(matches!(&err, CoreError::HandleTaken(taken) if *taken == handle));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn rejections_are_classified() {
        assert_eq!(CoreError::SelfFollow.kind(), ErrorKind::Authorization);
        assert_eq!(CoreError::InvalidCredentials.kind(), ErrorKind::Validation);
        assert_eq!(CoreError::PostNotFound(7_u64.into()).kind(), ErrorKind::NotFound);
    }
}

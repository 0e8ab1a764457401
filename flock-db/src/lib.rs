//! Persistence for users, posts and sessions.
//!
//! [`Store`] is the only interface the rest of the application talks to.
//! [`DbClient`] backs it with Postgres, [`MemoryClient`] keeps everything in
//! process, and [`Backend`] picks one of the two at startup.

pub mod backend;
pub mod client;
pub mod memory;
mod record;

pub use backend::Backend;
pub use client::DbClient;
pub use memory::MemoryClient;

use flock_common::{
    model::{
        Id, ModelValidationError,
        post::{CreatePost, Post, PostContent, PostMarker},
        session::{Session, SessionTokenHash},
        user::{CreateUser, Credentials, User, UserHandle, UserMarker},
    },
    snowflake::SnowflakeTimeError,
};
use std::collections::BTreeSet;
use thiserror::Error;
use time::OffsetDateTime;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate a new id: {0}")]
    IdGeneration(#[from] SnowflakeTimeError),
    #[error("The handle {0} is already taken")]
    HandleTaken(UserHandle),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Membership change on a set-valued field.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum SetOp {
    /// Adds the element unless it is already present.
    Add,
    Remove,
}

impl SetOp {
    /// The operation that flips membership of an element that currently is
    /// (`true`) or is not (`false`) in the set.
    #[must_use]
    pub fn toggle(is_member: bool) -> Self {
        if is_member { Self::Remove } else { Self::Add }
    }
}

/// Each method touches a single record, and every update is applied atomically
/// to that record. Nothing spans records: deleting a post leaves no trace
/// elsewhere, and follow lists are never rewritten on behalf of other users.
pub trait Store: Send + Sync {
    fn find_user_by_handle(
        &self,
        handle: &UserHandle,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    fn find_user_by_id(
        &self,
        user_id: Id<UserMarker>,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    fn find_credentials(
        &self,
        handle: &UserHandle,
    ) -> impl Future<Output = Result<Option<Credentials>>> + Send;

    /// All handles, sorted.
    fn list_user_handles(&self) -> impl Future<Output = Result<Vec<UserHandle>>> + Send;

    /// Fails with [`DbError::HandleTaken`] if the handle is in use.
    fn insert_user(&self, user: &CreateUser) -> impl Future<Output = Result<User>> + Send;

    fn update_user_following(
        &self,
        user_id: Id<UserMarker>,
        op: SetOp,
        handle: &UserHandle,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Posts by any of `authors`, newest first (see
    /// [`newest_first`](flock_common::model::post::newest_first)), at most
    /// `limit` of them.
    fn find_posts(
        &self,
        authors: &BTreeSet<UserHandle>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Post>>> + Send;

    fn find_post_by_id(
        &self,
        post_id: Id<PostMarker>,
    ) -> impl Future<Output = Result<Option<Post>>> + Send;

    fn insert_post(&self, post: &CreatePost) -> impl Future<Output = Result<Post>> + Send;

    /// Returns whether the post still existed.
    fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
        updated_at: OffsetDateTime,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn update_post_likes(
        &self,
        post_id: Id<PostMarker>,
        op: SetOp,
        user_id: Id<UserMarker>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Returns whether a post was removed.
    fn delete_post(&self, post_id: Id<PostMarker>) -> impl Future<Output = Result<bool>> + Send;

    fn insert_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    fn find_session(
        &self,
        token_hash: &SessionTokenHash,
    ) -> impl Future<Output = Result<Option<Session>>> + Send;

    fn delete_session(
        &self,
        token_hash: &SessionTokenHash,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use crate::SetOp;

    #[test]
    fn toggle_flips_membership() {
        assert_eq!(SetOp::toggle(true), SetOp::Remove);
        assert_eq!(SetOp::toggle(false), SetOp::Add);
    }
}

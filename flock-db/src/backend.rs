use crate::{DbClient, MemoryClient, Result, SetOp, Store};
use flock_common::model::{
    Id,
    post::{CreatePost, Post, PostContent, PostMarker},
    session::{Session, SessionTokenHash},
    user::{CreateUser, Credentials, User, UserHandle, UserMarker},
};
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// The store chosen at startup.
#[derive(Debug)]
pub enum Backend {
    Postgres(DbClient),
    Memory(MemoryClient),
}

macro_rules! delegate {
    ($self:ident.$method:ident($($arg:expr),*)) => {
        match $self {
            Backend::Postgres(client) => client.$method($($arg),*).await,
            Backend::Memory(client) => client.$method($($arg),*).await,
        }
    };
}

impl Store for Backend {
    async fn find_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        delegate!(self.find_user_by_handle(handle))
    }

    async fn find_user_by_id(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        delegate!(self.find_user_by_id(user_id))
    }

    async fn find_credentials(&self, handle: &UserHandle) -> Result<Option<Credentials>> {
        delegate!(self.find_credentials(handle))
    }

    async fn list_user_handles(&self) -> Result<Vec<UserHandle>> {
        delegate!(self.list_user_handles())
    }

    async fn insert_user(&self, user: &CreateUser) -> Result<User> {
        delegate!(self.insert_user(user))
    }

    async fn update_user_following(
        &self,
        user_id: Id<UserMarker>,
        op: SetOp,
        handle: &UserHandle,
    ) -> Result<()> {
        delegate!(self.update_user_following(user_id, op, handle))
    }

    async fn find_posts(&self, authors: &BTreeSet<UserHandle>, limit: usize) -> Result<Vec<Post>> {
        delegate!(self.find_posts(authors, limit))
    }

    async fn find_post_by_id(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        delegate!(self.find_post_by_id(post_id))
    }

    async fn insert_post(&self, post: &CreatePost) -> Result<Post> {
        delegate!(self.insert_post(post))
    }

    async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
        updated_at: OffsetDateTime,
    ) -> Result<bool> {
        delegate!(self.update_post_content(post_id, content, updated_at))
    }

    async fn update_post_likes(
        &self,
        post_id: Id<PostMarker>,
        op: SetOp,
        user_id: Id<UserMarker>,
    ) -> Result<()> {
        delegate!(self.update_post_likes(post_id, op, user_id))
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        delegate!(self.delete_post(post_id))
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        delegate!(self.insert_session(session))
    }

    async fn find_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        delegate!(self.find_session(token_hash))
    }

    async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<()> {
        delegate!(self.delete_session(token_hash))
    }
}

impl From<DbClient> for Backend {
    fn from(client: DbClient) -> Self {
        Self::Postgres(client)
    }
}

impl From<MemoryClient> for Backend {
    fn from(client: MemoryClient) -> Self {
        Self::Memory(client)
    }
}

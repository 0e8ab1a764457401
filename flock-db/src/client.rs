use crate::{
    DbError, Result, SetOp, Store,
    record::{CredentialsRecord, PostRecord, SessionRecord, UserRecord},
};
use flock_common::{
    model::{
        Id,
        post::{CreatePost, Post, PostContent, PostMarker},
        session::{Session, SessionTokenHash},
        user::{CreateUser, Credentials, User, UserHandle, UserMarker},
    },
    snowflake::{NodeId, Snowflake, SnowflakeGenerator},
};
use sqlx::{PgPool, migrate::Migrator, query, query_as, query_scalar};
use std::{
    collections::BTreeSet,
    fmt::{Debug, Formatter},
    sync::{Mutex, PoisonError},
};
use time::OffsetDateTime;
use tracing::debug;

static MIGRATOR: Migrator = sqlx::migrate!();

const USER_COLUMNS: &str = "user_snowflake, handle, created_at, following";
const POST_COLUMNS: &str =
    "post_snowflake, author_snowflake, author_handle, content, created_at, updated_at, likes";

pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<SnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, node_id: NodeId) -> Self {
        Self {
            pool,
            snowflake_generator: Mutex::new(SnowflakeGenerator::new(node_id)),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    fn next_snowflake(&self) -> Result<Snowflake> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;
        Ok(snowflake)
    }
}

impl Debug for DbClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn snowflake_param<Marker>(id: Id<Marker>) -> i64 {
    id.snowflake().get().cast_signed()
}

impl Store for DbClient {
    async fn find_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        debug!(%handle, "Fetching user by handle");

        let record = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users.users WHERE handle = $1"
        ))
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        debug!(%user_id, "Fetching user by id");

        let record = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users.users WHERE user_snowflake = $1"
        ))
        .bind(snowflake_param(user_id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn find_credentials(&self, handle: &UserHandle) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(&format!(
            "SELECT {USER_COLUMNS}, password_digest FROM users.users WHERE handle = $1"
        ))
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn list_user_handles(&self) -> Result<Vec<UserHandle>> {
        let handles = query_scalar::<_, String>("SELECT handle FROM users.users ORDER BY handle")
            .fetch_all(&self.pool)
            .await?;

        let handles: Vec<UserHandle> = handles
            .into_iter()
            .map(UserHandle::new)
            .collect::<Result<_, _>>()
            .map_err(|err| DbError::Data(err.into()))?;
        Ok(handles)
    }

    async fn insert_user(&self, user: &CreateUser) -> Result<User> {
        let user_snowflake = self.next_snowflake()?;

        let record = query_as::<_, UserRecord>(&format!(
            "
            INSERT INTO users.users (user_snowflake, handle, password_digest, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user_snowflake.get().cast_signed())
        .bind(user.handle.get())
        .bind(user.password_digest.as_phc())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation())
            {
                DbError::HandleTaken(user.handle.clone())
            } else {
                err.into()
            }
        })?;

        Ok(record.try_into()?)
    }

    async fn update_user_following(
        &self,
        user_id: Id<UserMarker>,
        op: SetOp,
        handle: &UserHandle,
    ) -> Result<()> {
        debug!(%user_id, ?op, %handle, "Updating following");

        let statement = match op {
            SetOp::Add => {
                "
                UPDATE users.users
                SET following = array_append(following, $2)
                WHERE user_snowflake = $1 AND NOT ($2 = ANY(following))
                "
            }
            SetOp::Remove => {
                "
                UPDATE users.users
                SET following = array_remove(following, $2)
                WHERE user_snowflake = $1
                "
            }
        };

        query(statement)
            .bind(snowflake_param(user_id))
            .bind(handle.get())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_posts(&self, authors: &BTreeSet<UserHandle>, limit: usize) -> Result<Vec<Post>> {
        debug!(authors = authors.len(), limit, "Fetching posts");

        let authors: Vec<String> = authors
            .iter()
            .map(|handle| handle.get().to_owned())
            .collect();
        let records = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            WHERE author_handle = ANY($1)
            ORDER BY created_at DESC, post_snowflake DESC
            LIMIT $2
            "
        ))
        .bind(authors)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let posts: Vec<Post> = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn find_post_by_id(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts.posts WHERE post_snowflake = $1"
        ))
        .bind(snowflake_param(post_id))
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn insert_post(&self, post: &CreatePost) -> Result<Post> {
        let post_snowflake = self.next_snowflake()?;

        let record = query_as::<_, PostRecord>(&format!(
            "
            INSERT INTO posts.posts
                (post_snowflake, author_snowflake, author_handle, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(post_snowflake.get().cast_signed())
        .bind(snowflake_param(post.author_id))
        .bind(post.author_handle.get())
        .bind(post.content.get())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
        updated_at: OffsetDateTime,
    ) -> Result<bool> {
        let result = query(
            "UPDATE posts.posts SET content = $2, updated_at = $3 WHERE post_snowflake = $1",
        )
        .bind(snowflake_param(post_id))
        .bind(content.get())
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_post_likes(
        &self,
        post_id: Id<PostMarker>,
        op: SetOp,
        user_id: Id<UserMarker>,
    ) -> Result<()> {
        debug!(%post_id, ?op, %user_id, "Updating likes");

        let statement = match op {
            SetOp::Add => {
                "
                UPDATE posts.posts
                SET likes = array_append(likes, $2)
                WHERE post_snowflake = $1 AND NOT ($2 = ANY(likes))
                "
            }
            SetOp::Remove => {
                "
                UPDATE posts.posts
                SET likes = array_remove(likes, $2)
                WHERE post_snowflake = $1
                "
            }
        };

        query(statement)
            .bind(snowflake_param(post_id))
            .bind(snowflake_param(user_id))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE post_snowflake = $1")
            .bind(snowflake_param(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO users.sessions
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(snowflake_param(session.user))
        .bind(session.created_at)
        .bind(
            session
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = query_as::<_, SessionRecord>(
            "
            SELECT user_snowflake, token_hash, created_at, expires_after_seconds
            FROM users.sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<()> {
        query("DELETE FROM users.sessions WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

use crate::{DbError, Result, SetOp, Store};
use flock_common::{
    model::{
        Id,
        post::{CreatePost, Post, PostContent, PostMarker, newest_first},
        session::{Session, SessionTokenHash},
        user::{CreateUser, Credentials, User, UserHandle, UserMarker},
    },
    snowflake::{NodeId, SnowflakeGenerator},
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

/// Keeps all records in process memory. Every operation takes the lock once,
/// so a single update is atomic just like a single statement in Postgres.
#[derive(Debug)]
pub struct MemoryClient {
    state: RwLock<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    snowflake_generator: SnowflakeGenerator,
    users: BTreeMap<Id<UserMarker>, Credentials>,
    handles: BTreeMap<UserHandle, Id<UserMarker>>,
    posts: BTreeMap<Id<PostMarker>, Post>,
    sessions: HashMap<SessionTokenHash, Session>,
}

impl MemoryClient {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                snowflake_generator: SnowflakeGenerator::new(node_id),
                users: BTreeMap::new(),
                handles: BTreeMap::new(),
                posts: BTreeMap::new(),
                sessions: HashMap::new(),
            }),
        }
    }
}

impl Store for MemoryClient {
    async fn find_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        Ok(self
            .find_credentials(handle)
            .await?
            .map(|credentials| credentials.user))
    }

    async fn find_user_by_id(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .get(&user_id)
            .map(|credentials| credentials.user.clone()))
    }

    async fn find_credentials(&self, handle: &UserHandle) -> Result<Option<Credentials>> {
        let state = self.state.read().await;
        Ok(state
            .handles
            .get(handle)
            .and_then(|user_id| state.users.get(user_id))
            .cloned())
    }

    async fn list_user_handles(&self) -> Result<Vec<UserHandle>> {
        let state = self.state.read().await;
        Ok(state.handles.keys().cloned().collect())
    }

    async fn insert_user(&self, user: &CreateUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state.handles.contains_key(&user.handle) {
            return Err(DbError::HandleTaken(user.handle.clone()));
        }

        let id = Id::new(state.snowflake_generator.generate()?);
        let new_user = User {
            id,
            handle: user.handle.clone(),
            created_at: OffsetDateTime::now_utc(),
            following: BTreeSet::new(),
        };

        state.handles.insert(user.handle.clone(), id);
        state.users.insert(
            id,
            Credentials {
                user: new_user.clone(),
                password_digest: user.password_digest.clone(),
            },
        );

        Ok(new_user)
    }

    async fn update_user_following(
        &self,
        user_id: Id<UserMarker>,
        op: SetOp,
        handle: &UserHandle,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(credentials) = state.users.get_mut(&user_id) {
            let following = &mut credentials.user.following;
            let changed = match op {
                SetOp::Add => following.insert(handle.clone()),
                SetOp::Remove => following.remove(handle),
            };
            debug!(%user_id, ?op, %handle, changed, "Updated following");
        }

        Ok(())
    }

    async fn find_posts(&self, authors: &BTreeSet<UserHandle>, limit: usize) -> Result<Vec<Post>> {
        let state = self.state.read().await;

        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|post| authors.contains(&post.author_handle))
            .cloned()
            .collect();
        posts.sort_by(newest_first);
        posts.truncate(limit);

        Ok(posts)
    }

    async fn find_post_by_id(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let state = self.state.read().await;
        Ok(state.posts.get(&post_id).cloned())
    }

    async fn insert_post(&self, post: &CreatePost) -> Result<Post> {
        let mut state = self.state.write().await;

        let id = Id::new(state.snowflake_generator.generate()?);
        let new_post = Post {
            id,
            author_id: post.author_id,
            author_handle: post.author_handle.clone(),
            content: post.content.clone(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
            likes: BTreeSet::new(),
        };
        state.posts.insert(id, new_post.clone());

        Ok(new_post)
    }

    async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
        updated_at: OffsetDateTime,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(post) = state.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        post.content = content.clone();
        post.updated_at = Some(updated_at);

        Ok(true)
    }

    async fn update_post_likes(
        &self,
        post_id: Id<PostMarker>,
        op: SetOp,
        user_id: Id<UserMarker>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(post) = state.posts.get_mut(&post_id) {
            let changed = match op {
                SetOp::Add => post.likes.insert(user_id),
                SetOp::Remove => post.likes.remove(&user_id),
            };
            debug!(%post_id, ?op, %user_id, changed, "Updated likes");
        }

        Ok(())
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.posts.remove(&post_id).is_some())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());

        Ok(())
    }

    async fn find_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.remove(token_hash);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{DbError, MemoryClient, SetOp, Store};
    use flock_common::{
        model::{
            password::PasswordDigest,
            post::{CreatePost, PostContent},
            session::{Session, SessionToken},
            user::{CreateUser, User, UserHandle},
        },
        snowflake::NodeId,
    };
    use std::collections::BTreeSet;
    use time::OffsetDateTime;

    fn handle(handle: &str) -> UserHandle {
        UserHandle::new(handle.to_owned()).unwrap()
    }

    async fn insert_user(client: &MemoryClient, name: &str) -> User {
        client
            .insert_user(&CreateUser {
                handle: handle(name),
                password_digest: PasswordDigest::derive("pw").unwrap(),
            })
            .await
            .unwrap()
    }

    async fn insert_post(client: &MemoryClient, author: &User, content: &str) -> u64 {
        client
            .insert_post(&CreatePost {
                author_id: author.id,
                author_handle: author.handle.clone(),
                content: PostContent::new(content.to_owned()).unwrap(),
            })
            .await
            .unwrap()
            .id
            .into()
    }

    #[tokio::test]
    async fn users_are_found_by_handle_and_id() {
        let client = MemoryClient::new(NodeId::default());
        let alice = insert_user(&client, "alice").await;

        assert_eq!(
            client.find_user_by_handle(&handle("alice")).await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(client.find_user_by_id(alice.id).await.unwrap(), Some(alice));
        assert_eq!(client.find_user_by_handle(&handle("Alice")).await.unwrap(), None);

        let credentials = client.find_credentials(&handle("alice")).await.unwrap().unwrap();
        assert!(credentials.password_digest.verify("pw"));
    }

    #[tokio::test]
    async fn duplicate_handle_is_rejected() {
        let client = MemoryClient::new(NodeId::default());
        insert_user(&client, "alice").await;

        let result = client
            .insert_user(&CreateUser {
                handle: handle("alice"),
                password_digest: PasswordDigest::derive("other").unwrap(),
            })
            .await;

        assert!(matches!(result, Err(DbError::HandleTaken(taken)) if taken == handle("alice")));
        assert_eq!(client.list_user_handles().await.unwrap(), [handle("alice")]);
    }

    #[tokio::test]
    async fn following_add_never_duplicates() {
        let client = MemoryClient::new(NodeId::default());
        let alice = insert_user(&client, "alice").await;

        for _ in 0..3 {
            client
                .update_user_following(alice.id, SetOp::Add, &handle("bob"))
                .await
                .unwrap();
        }
        let alice = client.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(alice.following, BTreeSet::from([handle("bob")]));

        client
            .update_user_following(alice.id, SetOp::Remove, &handle("bob"))
            .await
            .unwrap();
        let alice = client.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert!(alice.following.is_empty());
    }

    #[tokio::test]
    async fn find_posts_filters_orders_and_limits() {
        let client = MemoryClient::new(NodeId::default());
        let alice = insert_user(&client, "alice").await;
        let bob = insert_user(&client, "bob").await;
        let carol = insert_user(&client, "carol").await;

        let first = insert_post(&client, &alice, "one").await;
        insert_post(&client, &carol, "not included").await;
        let second = insert_post(&client, &bob, "two").await;
        let third = insert_post(&client, &alice, "three").await;

        let authors = BTreeSet::from([handle("alice"), handle("bob")]);
        let posts = client.find_posts(&authors, 10).await.unwrap();
        let ids: Vec<u64> = posts.iter().map(|post| post.id.into()).collect();
        assert_eq!(ids, [third, second, first]);

        let posts = client.find_posts(&authors, 2).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(u64::from(posts[0].id), third);
    }

    #[tokio::test]
    async fn post_updates_and_deletion() {
        let client = MemoryClient::new(NodeId::default());
        let bob = insert_user(&client, "bob").await;
        let post_id = insert_post(&client, &bob, "hello").await.into();

        let edited_at = OffsetDateTime::now_utc();
        let content = PostContent::new("hello world".to_owned()).unwrap();
        assert!(
            client
                .update_post_content(post_id, &content, edited_at)
                .await
                .unwrap()
        );
        client
            .update_post_likes(post_id, SetOp::Add, bob.id)
            .await
            .unwrap();
        client
            .update_post_likes(post_id, SetOp::Add, bob.id)
            .await
            .unwrap();

        let post = client.find_post_by_id(post_id).await.unwrap().unwrap();
        assert_eq!(post.content.get(), "hello world");
        assert_eq!(post.updated_at, Some(edited_at));
        assert_eq!(post.like_count(), 1);

        assert!(client.delete_post(post_id).await.unwrap());
        assert!(!client.delete_post(post_id).await.unwrap());
        assert_eq!(client.find_post_by_id(post_id).await.unwrap(), None);
        assert!(
            !client
                .update_post_content(post_id, &content, edited_at)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn sessions_round_trip() {
        let client = MemoryClient::new(NodeId::default());
        let alice = insert_user(&client, "alice").await;
        let token = SessionToken::generate_random(alice.id);
        let session = Session {
            user: alice.id,
            token_hash: token.hash().unwrap(),
            created_at: OffsetDateTime::now_utc(),
            expires_after: None,
        };

        client.insert_session(&session).await.unwrap();
        assert_eq!(
            client.find_session(&session.token_hash).await.unwrap(),
            Some(session.clone())
        );

        client.delete_session(&session.token_hash).await.unwrap();
        assert_eq!(client.find_session(&session.token_hash).await.unwrap(), None);
    }
}

use crate::service::{CoreError, Result};
use flock_common::model::{
    post::Post,
    user::{User, UserHandle},
};
use flock_db::Store;
use serde::Serialize;
use std::collections::BTreeSet;

/// Most posts returned by a feed or a profile.
pub const FEED_LIMIT: usize = 50;

/// Posts by the viewer and everyone they follow, newest first.
pub async fn assemble_feed<S: Store>(store: &S, viewer: &User) -> Result<Vec<Post>> {
    Ok(store.find_posts(&viewer.feed_authors(), FEED_LIMIT).await?)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Profile {
    pub user: User,
    pub posts: Vec<Post>,
}

pub async fn profile<S: Store>(store: &S, handle: &UserHandle) -> Result<Profile> {
    let user = store
        .find_user_by_handle(handle)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(handle.clone()))?;
    let posts = store
        .find_posts(&BTreeSet::from([user.handle.clone()]), FEED_LIMIT)
        .await?;

    Ok(Profile { user, posts })
}

#[cfg(test)]
mod tests {
    use crate::service::{
        CoreError,
        feed::{FEED_LIMIT, assemble_feed, profile},
        graph::toggle_follow,
        posts::create_post,
        testing,
    };
    use flock_common::model::{post::Post, user::UserHandle};
    use flock_db::Store;

    fn contents(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.content.get()).collect()
    }

    #[tokio::test]
    async fn feed_contains_only_followed_authors_and_self() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        let carol = testing::user(&store, "carol").await;

        create_post(&store, &alice, "from alice".to_owned()).await.unwrap();
        create_post(&store, &bob, "from bob".to_owned()).await.unwrap();
        create_post(&store, &carol, "from carol".to_owned()).await.unwrap();
        toggle_follow(&store, &alice, &bob.handle).await.unwrap();

        let alice = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        let feed = assemble_feed(&store, &alice).await.unwrap();

        let authors = alice.feed_authors();
        assert!(feed.iter().all(|post| authors.contains(&post.author_handle)));
        assert_eq!(contents(&feed), ["from bob", "from alice"]);
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_capped() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;

        for n in 0..FEED_LIMIT + 5 {
            create_post(&store, &alice, format!("post {n}")).await.unwrap();
        }

        let feed = assemble_feed(&store, &alice).await.unwrap();
        assert_eq!(feed.len(), FEED_LIMIT);
        assert_eq!(feed[0].content.get(), format!("post {}", FEED_LIMIT + 4));
        assert!(feed.windows(2).all(|pair| {
            pair[0].created_at > pair[1].created_at
                || (pair[0].created_at == pair[1].created_at && pair[0].id > pair[1].id)
        }));
    }

    #[tokio::test]
    async fn follow_then_unfollow_changes_feed() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        create_post(&store, &bob, "hi from bob".to_owned()).await.unwrap();

        toggle_follow(&store, &alice, &bob.handle).await.unwrap();
        let following = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(contents(&assemble_feed(&store, &following).await.unwrap()), ["hi from bob"]);

        toggle_follow(&store, &alice, &bob.handle).await.unwrap();
        let unfollowed = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert!(assemble_feed(&store, &unfollowed).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_shows_own_posts_only() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        create_post(&store, &alice, "mine".to_owned()).await.unwrap();
        create_post(&store, &bob, "not mine".to_owned()).await.unwrap();

        let alice_profile = profile(&store, &alice.handle).await.unwrap();
        assert_eq!(alice_profile.user, alice);
        assert_eq!(contents(&alice_profile.posts), ["mine"]);

        let missing = UserHandle::new("nobody".to_owned()).unwrap();
        assert!(matches!(
            profile(&store, &missing).await,
            Err(CoreError::UserNotFound(handle)) if handle == missing
        ));
    }
}

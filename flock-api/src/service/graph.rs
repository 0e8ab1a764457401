//! Follow and like toggles. There are no separate add and remove entry
//! points: each call flips membership and reports the resulting state.

use crate::service::{CoreError, Result};
use flock_common::model::{
    Id,
    post::PostMarker,
    user::{User, UserHandle},
};
use flock_db::{SetOp, Store};
use serde::Serialize;
use tracing::info;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowState {
    Following,
    NotFollowing,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeState {
    Liked,
    NotLiked,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct LikeToggle {
    pub state: LikeState,
    pub like_count: usize,
}

pub async fn toggle_follow<S: Store>(
    store: &S,
    actor: &User,
    target: &UserHandle,
) -> Result<FollowState> {
    if actor.handle == *target {
        return Err(CoreError::SelfFollow);
    }
    if store.find_user_by_handle(target).await?.is_none() {
        return Err(CoreError::UserNotFound(target.clone()));
    }

    // The request may have resolved the actor before an earlier toggle landed.
    let actor = store
        .find_user_by_id(actor.id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(actor.handle.clone()))?;

    let op = SetOp::toggle(actor.follows(target));
    store.update_user_following(actor.id, op, target).await?;

    let state = match op {
        SetOp::Add => FollowState::Following,
        SetOp::Remove => FollowState::NotFollowing,
    };
    info!(actor = %actor.handle, %target, ?state, "Toggled follow");
    Ok(state)
}

pub async fn toggle_like<S: Store>(
    store: &S,
    actor: &User,
    post_id: Id<PostMarker>,
) -> Result<LikeToggle> {
    let mut post = store
        .find_post_by_id(post_id)
        .await?
        .ok_or(CoreError::PostNotFound(post_id))?;

    let op = SetOp::toggle(post.is_liked_by(actor.id));
    store.update_post_likes(post_id, op, actor.id).await?;

    let state = match op {
        SetOp::Add => {
            post.likes.insert(actor.id);
            LikeState::Liked
        }
        SetOp::Remove => {
            post.likes.remove(&actor.id);
            LikeState::NotLiked
        }
    };
    info!(actor = %actor.handle, %post_id, ?state, "Toggled like");
    Ok(LikeToggle {
        state,
        like_count: post.like_count(),
    })
}

#[cfg(test)]
mod tests {
    use crate::service::{
        CoreError,
        graph::{FollowState, LikeState, toggle_follow, toggle_like},
        posts::create_post,
        testing,
    };
    use flock_common::model::user::UserHandle;
    use flock_db::Store;

    #[tokio::test]
    async fn follow_toggle_is_an_involution() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        let before = alice.following.clone();

        assert_eq!(
            toggle_follow(&store, &alice, &bob.handle).await.unwrap(),
            FollowState::Following
        );
        let between = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert!(between.follows(&bob.handle));

        assert_eq!(
            toggle_follow(&store, &alice, &bob.handle).await.unwrap(),
            FollowState::NotFollowing
        );
        let after = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(after.following, before);
    }

    #[tokio::test]
    async fn self_follow_and_unknown_target_change_nothing() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let ghost = UserHandle::new("ghost".to_owned()).unwrap();

        assert!(matches!(
            toggle_follow(&store, &alice, &alice.handle).await,
            Err(CoreError::SelfFollow)
        ));
        assert!(matches!(
            toggle_follow(&store, &alice, &ghost).await,
            Err(CoreError::UserNotFound(handle)) if handle == ghost
        ));

        let alice = store.find_user_by_id(alice.id).await.unwrap().unwrap();
        assert!(alice.following.is_empty());
    }

    #[tokio::test]
    async fn like_toggle_is_an_involution() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        let post = create_post(&store, &bob, "like me".to_owned()).await.unwrap();

        let liked = toggle_like(&store, &alice, post.id).await.unwrap();
        assert_eq!(liked.state, LikeState::Liked);
        assert_eq!(liked.like_count, 1);

        let stored = store.find_post_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.likes.iter().filter(|id| **id == alice.id).count(), 1);

        let unliked = toggle_like(&store, &alice, post.id).await.unwrap();
        assert_eq!(unliked.state, LikeState::NotLiked);
        assert_eq!(unliked.like_count, 0);

        let stored = store.find_post_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.likes, post.likes);
    }

    #[tokio::test]
    async fn likes_from_different_users_accumulate() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        let post = create_post(&store, &bob, "popular".to_owned()).await.unwrap();

        toggle_like(&store, &alice, post.id).await.unwrap();
        let both = toggle_like(&store, &bob, post.id).await.unwrap();

        assert_eq!(both.like_count, 2);
    }

    #[tokio::test]
    async fn liking_a_missing_post_fails() {
        let store = testing::store();
        let alice = testing::user(&store, "alice").await;

        assert!(matches!(
            toggle_like(&store, &alice, 12345_u64.into()).await,
            Err(CoreError::PostNotFound(id)) if u64::from(id) == 12345
        ));
    }
}

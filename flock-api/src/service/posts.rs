use crate::service::{CoreError, Result};
use flock_common::model::{
    Id,
    post::{CreatePost, Post, PostContent, PostMarker},
    user::User,
};
use flock_db::Store;
use time::OffsetDateTime;
use tracing::info;

pub async fn fetch_post<S: Store>(store: &S, post_id: Id<PostMarker>) -> Result<Post> {
    store
        .find_post_by_id(post_id)
        .await?
        .ok_or(CoreError::PostNotFound(post_id))
}

/// Content is checked before anything is written.
pub async fn create_post<S: Store>(store: &S, actor: &User, content: String) -> Result<Post> {
    let content = PostContent::new(content)?;
    let post = store
        .insert_post(&CreatePost {
            author_id: actor.id,
            author_handle: actor.handle.clone(),
            content,
        })
        .await?;

    info!(post_id = %post.id, author = %actor.handle, "Created post");
    Ok(post)
}

/// Ownership is checked before the new content, so a non-owner never learns
/// whether their content would have been accepted. On a validation failure the
/// error carries the rejected input unchanged.
pub async fn edit_post<S: Store>(
    store: &S,
    actor: &User,
    post_id: Id<PostMarker>,
    content: String,
) -> Result<Post> {
    let mut post = owned_post(store, actor, post_id).await?;
    let content = PostContent::new(content)?;
    let updated_at = OffsetDateTime::now_utc();

    if !store
        .update_post_content(post_id, &content, updated_at)
        .await?
    {
        return Err(CoreError::PostNotFound(post_id));
    }

    post.content = content;
    post.updated_at = Some(updated_at);
    info!(%post_id, author = %actor.handle, "Edited post");
    Ok(post)
}

pub async fn delete_post<S: Store>(
    store: &S,
    actor: &User,
    post_id: Id<PostMarker>,
) -> Result<()> {
    owned_post(store, actor, post_id).await?;
    if !store.delete_post(post_id).await? {
        return Err(CoreError::PostNotFound(post_id));
    }

    info!(%post_id, author = %actor.handle, "Deleted post");
    Ok(())
}

async fn owned_post<S: Store>(store: &S, actor: &User, post_id: Id<PostMarker>) -> Result<Post> {
    let post = fetch_post(store, post_id).await?;
    if post.is_authored_by(actor.id) {
        Ok(post)
    } else {
        Err(CoreError::NotOwner(post_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::service::{
        CoreError, ErrorKind,
        posts::{create_post, delete_post, edit_post, fetch_post},
        testing,
    };
    use flock_common::model::post::{EditStatus, POST_CONTENT_MAX_LEN};
    use flock_db::Store;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn invalid_content_is_not_persisted() {
        let store = testing::store();
        let bob = testing::user(&store, "bob").await;

        for content in [String::new(), "   ".to_owned(), "x".repeat(POST_CONTENT_MAX_LEN + 1)] {
            let err = create_post(&store, &bob, content).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let authors = BTreeSet::from([bob.handle.clone()]);
        assert!(store.find_posts(&authors, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_at_the_limit_is_accepted() {
        let store = testing::store();
        let bob = testing::user(&store, "bob").await;

        let post = create_post(&store, &bob, "é".repeat(POST_CONTENT_MAX_LEN))
            .await
            .unwrap();
        assert_eq!(post.content.get().chars().count(), POST_CONTENT_MAX_LEN);
    }

    #[tokio::test]
    async fn create_edit_and_foreign_edit() {
        let store = testing::store();
        let bob = testing::user(&store, "bob").await;
        let carol = testing::user(&store, "carol").await;

        let post = create_post(&store, &bob, "hello".to_owned()).await.unwrap();
        assert_eq!(post.content.get(), "hello");
        assert_eq!(post.updated_at, None);
        assert!(post.likes.is_empty());

        let edited = edit_post(&store, &bob, post.id, "hello world".to_owned())
            .await
            .unwrap();
        assert_eq!(edited.content.get(), "hello world");
        assert!(matches!(edited.edit_status(), EditStatus::Edited(_)));
        assert_eq!(fetch_post(&store, post.id).await.unwrap(), edited);

        let err = edit_post(&store, &carol, post.id, "hijacked".to_owned())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(fetch_post(&store, post.id).await.unwrap(), edited);
    }

    #[tokio::test]
    async fn ownership_is_checked_before_content() {
        let store = testing::store();
        let bob = testing::user(&store, "bob").await;
        let carol = testing::user(&store, "carol").await;
        let post = create_post(&store, &bob, "hello".to_owned()).await.unwrap();

        assert!(matches!(
            edit_post(&store, &carol, post.id, String::new()).await,
            Err(CoreError::NotOwner(id)) if id == post.id
        ));
    }

    #[tokio::test]
    async fn rejected_edit_echoes_input() {
        let store = testing::store();
        let bob = testing::user(&store, "bob").await;
        let post = create_post(&store, &bob, "hello".to_owned()).await.unwrap();
        let too_long = "y".repeat(POST_CONTENT_MAX_LEN + 1);

        let Err(CoreError::InvalidContent(err)) =
            edit_post(&store, &bob, post.id, too_long.clone()).await
        else {
            panic!("edit should have been rejected");
        };
        assert_eq!(err.into_content(), too_long);
        assert_eq!(fetch_post(&store, post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn only_the_author_deletes() {
        let store = testing::store();
        let bob = testing::user(&store, "bob").await;
        let carol = testing::user(&store, "carol").await;
        let post = create_post(&store, &bob, "bye".to_owned()).await.unwrap();

        assert!(matches!(
            delete_post(&store, &carol, post.id).await,
            Err(CoreError::NotOwner(_))
        ));
        delete_post(&store, &bob, post.id).await.unwrap();

        assert!(matches!(
            fetch_post(&store, post.id).await,
            Err(CoreError::PostNotFound(_))
        ));
        assert!(matches!(
            delete_post(&store, &bob, post.id).await,
            Err(CoreError::PostNotFound(_))
        ));
    }
}

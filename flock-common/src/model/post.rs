use crate::model::{
    Id,
    user::{UserHandle, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as DeError, Unexpected},
};
use std::{cmp::Ordering, collections::BTreeSet, fmt::Display};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_CONTENT_MAX_LEN: usize = 280;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    /// Copy of the author's handle at posting time.
    pub author_handle: UserHandle,
    pub content: PostContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub likes: BTreeSet<Id<UserMarker>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EditStatus {
    Pristine,
    Edited(OffsetDateTime),
}

impl Post {
    #[must_use]
    pub fn is_authored_by(&self, user_id: Id<UserMarker>) -> bool {
        self.author_id == user_id
    }

    #[must_use]
    pub fn is_liked_by(&self, user_id: Id<UserMarker>) -> bool {
        self.likes.contains(&user_id)
    }

    #[must_use]
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    #[must_use]
    pub fn edit_status(&self) -> EditStatus {
        match self.updated_at {
            None => EditStatus::Pristine,
            Some(updated_at) => EditStatus::Edited(updated_at),
        }
    }
}

/// Feed order: newest `created_at` first, equal timestamps resolved by the
/// later id first.
#[must_use]
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author_id: Id<UserMarker>,
    pub author_handle: UserHandle,
    pub content: PostContent,
}

/// Trimmed post text of 1 to [`POST_CONTENT_MAX_LEN`] characters.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostContent(String);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum InvalidPostContentError {
    #[error("Post content must not be empty")]
    Empty(String),
    #[error("Post content has {length} characters, at most {POST_CONTENT_MAX_LEN} are allowed")]
    TooLong { content: String, length: usize },
}

impl InvalidPostContentError {
    /// The rejected input, exactly as it was submitted.
    #[must_use]
    pub fn into_content(self) -> String {
        match self {
            Self::Empty(content) | Self::TooLong { content, .. } => content,
        }
    }
}

impl PostContent {
    pub fn new(content: String) -> Result<Self, InvalidPostContentError> {
        let trimmed = content.trim();
        let length = trimmed.chars().count();

        if length == 0 {
            Err(InvalidPostContentError::Empty(content))
        } else if length > POST_CONTENT_MAX_LEN {
            Err(InvalidPostContentError::TooLong { content, length })
        } else if trimmed.len() == content.len() {
            Ok(Self(content))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for PostContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostContent::new(inner).map_err(|err| {
            DeError::invalid_value(Unexpected::Str(&err.into_content()), &"PostContent")
        })
    }
}

use crate::model::{Id, password::PasswordDigest};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{borrow::Borrow, collections::BTreeSet, fmt::Display};
use thiserror::Error;
use time::OffsetDateTime;

pub const USER_HANDLE_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub handle: UserHandle,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Followed users by handle. Never contains [`User::handle`].
    pub following: BTreeSet<UserHandle>,
}

impl User {
    #[must_use]
    pub fn follows(&self, handle: &UserHandle) -> bool {
        self.following.contains(handle)
    }

    /// Everyone whose posts end up in this user's feed: the followed users and
    /// the user themselves.
    #[must_use]
    pub fn feed_authors(&self) -> BTreeSet<UserHandle> {
        let mut authors = self.following.clone();
        authors.insert(self.handle.clone());
        authors
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub handle: UserHandle,
    pub password_digest: PasswordDigest,
}

/// A user together with the digest their password is checked against.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: User,
    pub password_digest: PasswordDigest,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct UserHandle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user handle is invalid: {0:?}")]
pub struct InvalidUserHandleError(String);

impl UserHandle {
    /// Handles are case-sensitive, 1 to [`USER_HANDLE_MAX_LEN`] characters long
    /// and contain no whitespace.
    pub fn new(handle: String) -> Result<Self, InvalidUserHandleError> {
        let length = handle.chars().count();
        if (1..=USER_HANDLE_MAX_LEN).contains(&length) && !handle.contains(char::is_whitespace) {
            Ok(UserHandle(handle))
        } else {
            Err(InvalidUserHandleError(handle))
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

impl Display for UserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UserHandle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserHandle {
    type Error = InvalidUserHandleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for UserHandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserHandle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserHandle"))
    }
}

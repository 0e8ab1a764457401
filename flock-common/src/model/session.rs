//! Bearer session tokens.
//!
//! A token reads `<user id>:<base64 core>:<base64 salt>`. Only the argon2 hash of
//! core and salt is persisted, so a leaked session table cannot be replayed.

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const SESSION_TOKEN_CORE_LEN: usize = 24;
pub const SESSION_TOKEN_SALT_LEN: usize = 18;
pub const SESSION_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing session token failed: {0}")]
pub struct SessionTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; SESSION_TOKEN_CORE_LEN],
    pub salt: [u8; SESSION_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionTokenHash(pub Box<[u8; SESSION_TOKEN_HASH_LEN]>);

/// A persisted login. `expires_after: None` never expires.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub token_hash: SessionTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Session {
    /// The persisted side of a freshly issued `token`.
    pub fn open(
        token: &SessionToken,
        created_at: OffsetDateTime,
        expires_after: Option<PositiveDuration>,
    ) -> Result<Self, SessionTokenHashError> {
        Ok(Self {
            user: token.user_id,
            token_hash: token.hash()?,
            created_at,
            expires_after,
        })
    }

    /// `None` if the session never expires, including when the expiry lies
    /// beyond the representable date range.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_after
            .and_then(|expires_after| self.created_at.checked_add(expires_after.get()))
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at < now)
    }

    /// Whether this session lets `token` act at `now`. The token must name the
    /// user the session was issued to.
    #[must_use]
    pub fn admits(&self, token: &SessionToken, now: OffsetDateTime) -> bool {
        self.user == token.user_id && !self.is_expired_at(now)
    }
}

impl SessionToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            core: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<SessionTokenHash, SessionTokenHashError> {
        let mut hash = Box::new([0; SESSION_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(SessionTokenHashError)?;

        Ok(SessionTokenHash(hash))
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = u64::from_str(user_id_part)
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for SessionTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The session token hash had an invalid length")]
pub struct InvalidSessionTokenHashError;

impl TryFrom<Vec<u8>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let bytes: [u8; SESSION_TOKEN_HASH_LEN] =
            value.try_into().map_err(|_| InvalidSessionTokenHashError)?;
        Ok(Self(Box::new(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        session::{Session, SessionToken, SessionTokenDecodeError},
    };
    use crate::util::PositiveDuration;
    use time::{Duration, macros::datetime};

    #[test]
    fn token_string_parses_back() {
        let token = SessionToken::generate_random(Id::from(42_u64));
        let parsed: SessionToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
        assert_eq!(parsed.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            "42".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "abc:AAAA:AAAA".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "42:AAAA:AAAA".parse::<SessionToken>(),
            Err(SessionTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn different_tokens_hash_differently() {
        let first = SessionToken::generate_random(Id::from(1_u64));
        let second = SessionToken::generate_random(Id::from(1_u64));

        assert_ne!(first.hash().unwrap(), second.hash().unwrap());
    }

    #[test]
    fn session_expiry() {
        let token = SessionToken::generate_random(Id::from(1_u64));
        let created_at = datetime!(2025-06-01 12:00 UTC);
        let mut session = Session {
            user: token.user_id,
            token_hash: token.hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::from_hours(24),
        };

        assert!(!session.is_expired_at(created_at + Duration::hours(23)));
        assert!(session.is_expired_at(created_at + Duration::hours(25)));

        session.expires_after = None;
        assert!(!session.is_expired_at(created_at + Duration::weeks(520)));
    }

    #[test]
    fn expiry_past_the_date_range_never_expires() {
        let token = SessionToken::generate_random(Id::from(1_u64));
        let now = datetime!(2025-06-01 12:00 UTC);
        let session = Session::open(&token, now, PositiveDuration::from_hours(u32::MAX)).unwrap();

        assert_eq!(session.expires_at(), None);
        assert!(!session.is_expired_at(now + Duration::weeks(52 * 1000)));

        let huge = PositiveDuration::try_from(Duration::MAX).unwrap();
        let session = Session::open(&token, now, Some(huge)).unwrap();
        assert!(!session.is_expired_at(now));
    }

    #[test]
    fn session_admits_only_its_own_user_until_expiry() {
        let token = SessionToken::generate_random(Id::from(1_u64));
        let created_at = datetime!(2025-06-01 12:00 UTC);
        let session = Session::open(&token, created_at, PositiveDuration::from_hours(1)).unwrap();

        assert_eq!(session.token_hash, token.hash().unwrap());
        assert_eq!(session.expires_at(), Some(created_at + Duration::hours(1)));
        assert!(session.admits(&token, created_at + Duration::minutes(30)));
        assert!(!session.admits(&token, created_at + Duration::hours(2)));

        let mut foreign = token.clone();
        foreign.user_id = Id::from(2_u64);
        assert!(!session.admits(&foreign, created_at));
    }
}

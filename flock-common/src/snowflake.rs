//! Time-ordered 64-bit ids.
//!
//! Bit layout, most significant first: 42 bits of milliseconds since
//! [`FLOCK_EPOCH`], 10 bits of node id, 12 bits of sequence. Ids handed out by
//! one [`SnowflakeGenerator`] are strictly increasing, so sorting by id is
//! sorting by insertion order.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::{Duration, OffsetDateTime, macros::datetime};

pub const FLOCK_EPOCH: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

pub const TIMESTAMP_BITS: u32 = 42;
pub const NODE_ID_BITS: u32 = 10;
pub const SEQUENCE_BITS: u32 = 12;

const NODE_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + NODE_ID_BITS;

pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;
pub const MAX_NODE_ID: u16 = (1 << NODE_ID_BITS) - 1;
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    BeforeEpoch,
    #[error("Specified time does not fit into the timestamp bits.")]
    TooLate,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Node id {0} is larger than {MAX_NODE_ID}")]
pub struct NodeIdOutOfRangeError(pub u16);

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct NodeId(u16);

impl NodeId {
    #[must_use]
    pub fn new(id: u16) -> Option<Self> {
        (id <= MAX_NODE_ID).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for NodeId {
    type Error = NodeIdOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NodeIdOutOfRangeError(value))
    }
}

impl From<NodeId> for u16 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Snowflake(u64);

impl Snowflake {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner)
    }

    /// Parts that are out of range are masked to their bit width.
    #[must_use]
    pub fn from_parts(millis: u64, node_id: NodeId, sequence: u16) -> Self {
        Self(
            (millis & MAX_TIMESTAMP) << TIMESTAMP_SHIFT
                | u64::from(node_id.get()) << NODE_ID_SHIFT
                | u64::from(sequence & MAX_SEQUENCE),
        )
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn node_id(self) -> NodeId {
        NodeId((self.0 >> NODE_ID_SHIFT) as u16 & MAX_NODE_ID)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sequence(self) -> u16 {
        self.0 as u16 & MAX_SEQUENCE
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn created_at(self) -> OffsetDateTime {
        FLOCK_EPOCH + Duration::milliseconds(self.millis() as i64)
    }
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Snowflake> for u64 {
    fn from(value: Snowflake) -> Self {
        value.get()
    }
}

fn millis_since_epoch(time: OffsetDateTime) -> Result<u64, SnowflakeTimeError> {
    let millis = (time - FLOCK_EPOCH).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimeError::BeforeEpoch);
    }

    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis <= MAX_TIMESTAMP)
        .ok_or(SnowflakeTimeError::TooLate)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator {
    node_id: NodeId,
    last: Option<(u64, u16)>,
}

impl SnowflakeGenerator {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            last: None,
        }
    }

    #[must_use]
    pub fn node_id(self) -> NodeId {
        self.node_id
    }

    /// A clock that stands still or runs backwards keeps counting from the last
    /// issued timestamp, borrowing the next millisecond once the sequence is
    /// exhausted.
    pub fn generate_at(&mut self, time: OffsetDateTime) -> Result<Snowflake, SnowflakeTimeError> {
        let millis = millis_since_epoch(time)?;

        let (millis, sequence) = match self.last {
            Some((last_millis, last_sequence)) if millis <= last_millis => {
                if last_sequence == MAX_SEQUENCE {
                    (last_millis + 1, 0)
                } else {
                    (last_millis, last_sequence + 1)
                }
            }
            _ => (millis, 0),
        };

        if millis > MAX_TIMESTAMP {
            return Err(SnowflakeTimeError::TooLate);
        }

        self.last = Some((millis, sequence));
        Ok(Snowflake::from_parts(millis, self.node_id, sequence))
    }

    pub fn generate(&mut self) -> Result<Snowflake, SnowflakeTimeError> {
        self.generate_at(OffsetDateTime::now_utc())
    }
}

use thiserror::Error;
use time::Duration;

/// A strictly positive span of time, used for session lifetimes.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    /// `None` for zero hours.
    #[must_use]
    pub fn from_hours(hours: u32) -> Option<Self> {
        Self::new(Duration::hours(i64::from(hours)))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn whole_seconds(&self) -> i64 {
        self.0.whole_seconds()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::PositiveDuration;
    use time::Duration;

    #[test]
    fn only_positive_durations() {
        assert_eq!(
            PositiveDuration::from_hours(24).map(|duration| duration.get()),
            Some(Duration::hours(24))
        );
        assert!(PositiveDuration::from_hours(0).is_none());
        assert_eq!(
            PositiveDuration::from_hours(u32::MAX).map(|duration| duration.get()),
            Some(Duration::hours(i64::from(u32::MAX)))
        );
        assert!(PositiveDuration::try_from(Duration::seconds(-1)).is_err());
        assert_eq!(
            PositiveDuration::try_from(Duration::minutes(2)).map(|duration| duration.whole_seconds()),
            Ok(120)
        );
    }
}

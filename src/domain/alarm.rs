//! Named periodic alarms handled by the engine.

use std::fmt;
use std::str::FromStr;

/// Returned when parsing an unknown alarm name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown alarm '{0}'")]
pub struct UnknownAlarm(pub String);

/// A periodic job. Names match the alarm facility's identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alarm {
    /// Retention pass, weekly by default.
    Cleanup,
    /// Retry-queue drain, hourly by default.
    RetryQueue,
    /// Storage quota check, daily by default.
    StorageCheck,
}

impl Alarm {
    pub const ALL: [Alarm; 3] = [Alarm::Cleanup, Alarm::RetryQueue, Alarm::StorageCheck];

    pub fn name(&self) -> &'static str {
        match self {
            Alarm::Cleanup => "cleanup",
            Alarm::RetryQueue => "retryQueue",
            Alarm::StorageCheck => "storageCheck",
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Alarm {
    type Err = UnknownAlarm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Alarm::ALL
            .into_iter()
            .find(|alarm| alarm.name() == s)
            .ok_or_else(|| UnknownAlarm(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for alarm in Alarm::ALL {
            assert_eq!(alarm.name().parse::<Alarm>().unwrap(), alarm);
        }
        assert_eq!(
            "retry_queue".parse::<Alarm>(),
            Err(UnknownAlarm("retry_queue".to_string()))
        );
    }
}

//! Duration strings used by rule files (`"30m"`, `"2h"`, `"1d"`).

use chrono::Duration;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::RuleError;

/// Longest offset a rule may use, for `time_ago`, `tolerance` and cooldowns.
pub const MAX_SPAN_DAYS: i64 = 36_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn suffix(self) -> &'static str {
        match self {
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }
}

/// A `(magnitude, unit)` offset such as `2h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAgo {
    pub magnitude: u32,
    pub unit: TimeUnit,
}

impl TimeAgo {
    pub const ZERO: TimeAgo = TimeAgo {
        magnitude: 0,
        unit: TimeUnit::Minutes,
    };

    pub fn is_zero(&self) -> bool {
        self.magnitude == 0
    }

    /// The offset as a duration, or `None` past [`MAX_SPAN_DAYS`].
    pub fn to_duration(self) -> Option<Duration> {
        let n = self.magnitude as i64;
        let duration = match self.unit {
            TimeUnit::Minutes => Duration::try_minutes(n),
            TimeUnit::Hours => Duration::try_hours(n),
            TimeUnit::Days => Duration::try_days(n),
        }?;
        (duration <= Duration::days(MAX_SPAN_DAYS)).then_some(duration)
    }
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\s*([A-Za-z]+)$").expect("valid duration regex"))
}

impl FromStr for TimeAgo {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = pattern()
            .captures(s.trim())
            .ok_or_else(|| RuleError::InvalidDuration(s.to_string()))?;

        let magnitude = caps[1]
            .parse::<u32>()
            .map_err(|_| RuleError::InvalidDuration(s.to_string()))?;
        let unit = match &caps[2] {
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            other => return Err(RuleError::UnsupportedUnit(other.to_string())),
        };

        let parsed = Self { magnitude, unit };
        if parsed.to_duration().is_none() {
            return Err(RuleError::InvalidDuration(s.to_string()));
        }
        Ok(parsed)
    }
}

impl fmt::Display for TimeAgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        let t: TimeAgo = "30m".parse().unwrap();
        assert_eq!(t.to_duration(), Some(Duration::minutes(30)));

        let t: TimeAgo = "2h".parse().unwrap();
        assert_eq!(t.to_duration(), Some(Duration::hours(2)));
        assert_eq!(t.to_string(), "2h");

        let t: TimeAgo = " 1d ".parse().unwrap();
        assert_eq!(t.to_duration(), Some(Duration::days(1)));
    }

    #[test]
    fn test_zero() {
        let t: TimeAgo = "0m".parse().unwrap();
        assert!(t.is_zero());
        assert!("0h".parse::<TimeAgo>().unwrap().is_zero());
        assert!(!"1m".parse::<TimeAgo>().unwrap().is_zero());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!("2w".parse::<TimeAgo>(), Err(RuleError::UnsupportedUnit(u)) if u == "w"));
        assert!(matches!("h".parse::<TimeAgo>(), Err(RuleError::InvalidDuration(_))));
        assert!(matches!("-1h".parse::<TimeAgo>(), Err(RuleError::InvalidDuration(_))));
        assert!(matches!("".parse::<TimeAgo>(), Err(RuleError::InvalidDuration(_))));
        assert!(matches!("99999999999m".parse::<TimeAgo>(), Err(RuleError::InvalidDuration(_))));
    }

    #[test]
    fn test_rejects_oversized_offsets() {
        assert!(matches!("200000000d".parse::<TimeAgo>(), Err(RuleError::InvalidDuration(_))));
        assert!(matches!("4000000000h".parse::<TimeAgo>(), Err(RuleError::InvalidDuration(_))));
        assert!("36600d".parse::<TimeAgo>().is_ok());
        assert!("36601d".parse::<TimeAgo>().is_err());

        let unchecked = TimeAgo {
            magnitude: u32::MAX,
            unit: TimeUnit::Days,
        };
        assert_eq!(unchecked.to_duration(), None);
    }
}

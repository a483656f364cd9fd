//! Candle interval type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle bucket width for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CandleInterval {
    /// 1 second
    S1,
    /// 5 seconds
    S5,
    /// 15 seconds
    S15,
    /// 1 minute
    #[default]
    M1,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 1 hour
    H1,
    /// 1 day
    D1,
}

impl CandleInterval {
    /// Returns the bucket width in seconds.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::S1 => 1,
            Self::S5 => 5,
            Self::S15 => 15,
            Self::M1 => 60,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::H1 => 3600,
            Self::D1 => 86400,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::S1 => "S1",
            Self::S5 => "S5",
            Self::S15 => "S15",
            Self::M1 => "M1",
            Self::M5 => "M5",
            Self::M15 => "M15",
            Self::H1 => "H1",
            Self::D1 => "D1",
        };
        f.write_str(s)
    }
}

impl FromStr for CandleInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S1" => Ok(Self::S1),
            "S5" => Ok(Self::S5),
            "S15" => Ok(Self::S15),
            "M1" => Ok(Self::M1),
            "M5" => Ok(Self::M5),
            "M15" => Ok(Self::M15),
            "H1" => Ok(Self::H1),
            "D1" => Ok(Self::D1),
            other => Err(format!("unknown interval: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse() {
        assert_eq!("M5".parse::<CandleInterval>().unwrap(), CandleInterval::M5);
        assert!("X9".parse::<CandleInterval>().is_err());
    }

    #[test]
    fn test_interval_seconds() {
        assert_eq!(CandleInterval::M1.seconds(), 60);
        assert_eq!(CandleInterval::D1.seconds(), 86400);
    }

    #[test]
    fn test_interval_display_roundtrip() {
        for s in ["S1", "S5", "S15", "M1", "M5", "M15", "H1", "D1"] {
            let interval: CandleInterval = s.parse().unwrap();
            assert_eq!(interval.to_string(), s);
        }
    }
}

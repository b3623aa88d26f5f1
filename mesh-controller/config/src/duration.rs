use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Human-friendly duration used throughout the configuration stream
/// (`250ms`, `10s`, `1h30m`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConfigDuration(pub Duration);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("invalid duration unit; expected one of 'ns', 'us', 'ms', 's', 'm', or 'h'")]
    InvalidUnit,

    #[error("duration is missing a unit")]
    NoUnit,

    #[error("invalid number in duration: {0}")]
    NotANumber(#[from] std::num::ParseFloatError),
}

impl From<ConfigDuration> for Duration {
    fn from(ConfigDuration(duration): ConfigDuration) -> Self {
        duration
    }
}

impl From<Duration> for ConfigDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl FromStr for ConfigDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "0" {
            return Ok(Self(Duration::ZERO));
        }

        let mut rest = s;
        let mut total = Duration::ZERO;
        while !rest.is_empty() {
            let unit_start = rest
                .find(|c: char| c.is_alphabetic())
                .ok_or(DurationError::NoUnit)?;
            let (value, tail) = rest.split_at(unit_start);
            let value = value.parse::<f64>()?;
            let unit_end = tail
                .find(|c: char| !c.is_alphabetic())
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_end);
            let base = match unit {
                "ns" => Duration::from_nanos(1),
                "us" => Duration::from_micros(1),
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => Duration::from_secs(60),
                "h" => Duration::from_secs(60 * 60),
                _ => return Err(DurationError::InvalidUnit),
            };
            total += base.mul_f64(value);
            rest = tail;
        }
        Ok(Self(total))
    }
}

impl fmt::Display for ConfigDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl Serialize for ConfigDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfigDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = ConfigDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration string such as '10s' or '250ms'")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        let cases: &[(&str, Duration)] = &[
            ("0", Duration::ZERO),
            ("5s", Duration::from_secs(5)),
            ("250ms", Duration::from_millis(250)),
            ("10ns", Duration::from_nanos(10)),
            ("11us", Duration::from_micros(11)),
            ("15m", Duration::from_secs(900)),
            ("2h", Duration::from_secs(7200)),
            ("1h30m", Duration::from_secs(5400)),
            ("1.5s", Duration::from_millis(1500)),
            (".5s", Duration::from_millis(500)),
        ];
        for (input, expected) in cases {
            assert_eq!(
                input.parse::<ConfigDuration>().unwrap().0,
                *expected,
                "{input}",
            );
        }
    }

    #[test]
    fn rejects_malformed_durations() {
        assert_eq!(
            "5".parse::<ConfigDuration>(),
            Err(DurationError::NoUnit)
        );
        assert_eq!(
            "5w".parse::<ConfigDuration>(),
            Err(DurationError::InvalidUnit)
        );
        assert!("s".parse::<ConfigDuration>().is_err());
    }
}

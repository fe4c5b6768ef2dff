//! Duration text forms used by requests and configuration.
//!
//! Two forms are accepted: ISO-8601 durations (`PT30S`, `PT1M30.5S`, `P1DT2H`, `P2W`) and
//! the span form `[d.]hh:mm:ss[.fffffff]`. Durations are always written back as ISO-8601.

use std::time::Duration;

use crate::{Error, Result};

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Parses an ISO-8601 or span-form duration.
///
/// # Errors
/// Returns [`Error::InvalidRequest`] if the text matches neither form or is negative.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use callscope::utils::parse_duration;
///
/// assert_eq!(parse_duration("PT1M30S")?, Duration::from_secs(90));
/// assert_eq!(parse_duration("00:00:45")?, Duration::from_secs(45));
/// # Ok::<(), callscope::Error>(())
/// ```
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let seconds = if text.starts_with(['P', 'p']) {
        parse_iso8601(text)
    } else if text.contains(':') {
        parse_span(text)
    } else {
        None
    }
    .ok_or_else(|| Error::InvalidRequest(format!("unrecognized duration '{text}'")))?;

    Duration::try_from_secs_f64(seconds)
        .map_err(|_| Error::InvalidRequest(format!("duration '{text}' is out of range")))
}

/// Renders a duration in ISO-8601 form (`PT90S`, `PT0.25S`).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("PT{}S", duration.as_secs())
    } else {
        format!("PT{}S", duration.as_secs_f64())
    }
}

fn parse_iso8601(text: &str) -> Option<f64> {
    let body = &text[1..];
    let (date, time) = match body.find(['T', 't']) {
        Some(split) => (&body[..split], Some(&body[split + 1..])),
        None => (body, None),
    };

    let mut total = 0.0;
    let mut components = 0;

    for (value, unit) in components_of(date)? {
        total += value
            * match unit.to_ascii_uppercase() {
                'W' => SECONDS_PER_WEEK,
                'D' => SECONDS_PER_DAY,
                _ => return None,
            };
        components += 1;
    }

    if let Some(time) = time {
        if time.is_empty() {
            return None;
        }
        for (value, unit) in components_of(time)? {
            total += value
                * match unit.to_ascii_uppercase() {
                    'H' => SECONDS_PER_HOUR,
                    'M' => SECONDS_PER_MINUTE,
                    'S' => 1.0,
                    _ => return None,
                };
            components += 1;
        }
    }

    (components > 0).then_some(total)
}

/// Splits `1H30M` into `[(1.0, 'H'), (30.0, 'M')]`.
fn components_of(text: &str) -> Option<Vec<(f64, char)>> {
    let mut components = Vec::new();
    let mut start = 0;

    for (index, c) in text.char_indices() {
        if c.is_ascii_alphabetic() {
            let number = text[start..index].replace(',', ".");
            if number.is_empty() {
                return None;
            }
            components.push((number.parse::<f64>().ok()?, c));
            start = index + c.len_utf8();
        } else if !(c.is_ascii_digit() || c == '.' || c == ',') {
            return None;
        }
    }

    (start == text.len()).then_some(components)
}

fn parse_span(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return None;
    };

    let (days, hours) = match hours.split_once('.') {
        Some((days, hours)) => (days.parse::<u64>().ok()?, hours),
        None => (0, *hours),
    };
    let hours = hours.parse::<u64>().ok()?;
    let minutes = minutes.parse::<u64>().ok()?;
    let seconds = seconds.parse::<f64>().ok()?;

    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    Some(
        days as f64 * SECONDS_PER_DAY
            + hours as f64 * SECONDS_PER_HOUR
            + minutes as f64 * SECONDS_PER_MINUTE
            + seconds,
    )
}

/// Serde adapter for `Duration` fields written as duration text.
pub(crate) mod text {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_duration(&text).map_err(D::Error::custom)
    }

    /// Same as the parent adapter, for optional fields.
    pub mod option {
        use std::time::Duration;

        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => {
                    serializer.serialize_str(&super::super::format_duration(*duration))
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| super::super::parse_duration(&text).map_err(D::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601_forms() {
        assert_eq!(parse_duration("PT30S").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("PT1M30S").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("P1DT2H").unwrap(), Duration::from_secs(93_600));
        assert_eq!(parse_duration("P2W").unwrap(), Duration::from_secs(1_209_600));
        assert_eq!(parse_duration("PT0.5S").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("pt10s").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_span_forms() {
        assert_eq!(parse_duration("00:00:30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("01:02:03").unwrap(), Duration::from_secs(3_723));
        assert_eq!(parse_duration("1.00:00:00").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("2.03:00:05").unwrap(), Duration::from_secs(183_605));
        assert_eq!(parse_duration("00:00:01.25").unwrap(), Duration::from_millis(1_250));
    }

    #[test]
    fn test_rejects_garbage() {
        for text in ["", "P", "PT", "30", "PTS", "P1H", "PT1X", "00:61:00", "1:2", "P-1D"] {
            assert!(parse_duration(text).is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::from_secs(90)), "PT90S");
        assert_eq!(format_duration(Duration::from_millis(250)), "PT0.25S");
        assert_eq!(
            parse_duration(&format_duration(Duration::from_millis(1_500))).unwrap(),
            Duration::from_millis(1_500)
        );
    }
}

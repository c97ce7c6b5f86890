use crate::errors::EngineError;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(DateTime<FixedOffset>);

impl Time {
    /// Builds a time from calendar parts; seconds are `seconds_numer / seconds_denom`.
    #[track_caller]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        seconds_numer: i64,
        seconds_denom: i64,
        offset_seconds: i32,
    ) -> Result<Self, EngineError> {
        if seconds_denom <= 0 {
            return Err(EngineError::runtime("seconds denominator must be positive"));
        }
        let numer = seconds_numer as i128;
        let denom = seconds_denom as i128;
        let whole = numer.div_euclid(denom);
        let nanos = numer.rem_euclid(denom) * 1_000_000_000 / denom;
        if !(0..60).contains(&whole) {
            return Err(EngineError::runtime(format!(
                "seconds out of range: {}/{}",
                seconds_numer, seconds_denom
            )));
        }
        let offset = FixedOffset::east_opt(offset_seconds)
            .ok_or_else(|| EngineError::runtime(format!("invalid UTC offset: {}", offset_seconds)))?;
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_nano_opt(hour, minute, whole as u32, nanos as u32))
            .ok_or_else(|| {
                EngineError::runtime(format!(
                    "invalid date/time: {:04}-{:02}-{:02} {:02}:{:02}",
                    year, month, day, hour, minute
                ))
            })?;
        let value = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| EngineError::runtime("ambiguous local time"))?;
        Ok(Self(value))
    }

    pub fn now() -> Self {
        Self(Utc::now().fixed_offset())
    }

    #[track_caller]
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(Self)
            .map_err(|err| EngineError::runtime(format!("invalid time '{}': {}", text, err)))
    }

    /// ISO-8601 with exactly six fractional digits, `Z` for UTC.
    pub fn xmlschema(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn format(&self, pattern: &str) -> String {
        self.0.format(pattern).to_string()
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }

    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Time {
    fn from(value: DateTime<Tz>) -> Self {
        Self(value.fixed_offset())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xmlschema())
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.xmlschema())
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

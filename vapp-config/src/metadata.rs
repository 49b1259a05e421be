//! Typed metadata values.
//!
//! The control plane stores metadata with an explicit type per entry, and a
//! value must read back with the type it was written with: `true` stays a
//! boolean and `-999` stays a number, never their string renderings.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DATETIME_KEY: &str = "datetime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Boolean(bool),
    Integer(i64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl MetadataValue {
    /// Name of the typed value on the control plane.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Boolean(_) => "MetadataBooleanValue",
            MetadataValue::Integer(_) => "MetadataNumberValue",
            MetadataValue::String(_) => "MetadataStringValue",
            MetadataValue::DateTime(_) => "MetadataDateTimeValue",
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Boolean(b) => write!(f, "{b}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::String(s) => f.write_str(s),
            MetadataValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Boolean(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetadataValue::DateTime(value)
    }
}

/// Accepts RFC 3339 as well as the `2013-10-23 15:34:00 +0000` form.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl Serialize for MetadataValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            MetadataValue::Boolean(b) => serializer.serialize_bool(*b),
            MetadataValue::Integer(i) => serializer.serialize_i64(*i),
            MetadataValue::String(s) => serializer.serialize_str(s),
            MetadataValue::DateTime(dt) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATETIME_KEY, &dt.to_rfc3339())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for MetadataValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MetadataValueVisitor)
    }
}

struct MetadataValueVisitor;

impl<'de> Visitor<'de> for MetadataValueVisitor {
    type Value = MetadataValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a boolean, an integer, a string, or {datetime: <timestamp>}")
    }

    fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(MetadataValue::Boolean(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(MetadataValue::Integer(value))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        i64::try_from(value)
            .map(MetadataValue::Integer)
            .map_err(|_| E::custom(format!("integer metadata value {value} is out of range")))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Err(E::custom(format!(
            "floating point metadata value {value} is not supported; quote it to store a string"
        )))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(MetadataValue::String(value.to_string()))
    }

    fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(MetadataValue::String(value))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let Some((key, raw)) = map.next_entry::<String, String>()? else {
            return Err(de::Error::custom("empty mapping is not a metadata value"));
        };
        if key != DATETIME_KEY {
            return Err(de::Error::custom(format!(
                "unknown metadata value type '{key}', expected '{DATETIME_KEY}'"
            )));
        }
        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom(
                "a datetime metadata value takes exactly one key",
            ));
        }
        parse_datetime(&raw)
            .map(MetadataValue::DateTime)
            .ok_or_else(|| de::Error::custom(format!("invalid datetime '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use indexmap::IndexMap;
    use serde_yaml_ng as serde_yaml;

    #[test]
    fn yaml_scalars_keep_their_types() {
        let yaml = r#"
is_true: true
is_integer: -999
is_string: Hello World
quoted_number: "42"
"#;
        let values: IndexMap<String, MetadataValue> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(values["is_true"], MetadataValue::Boolean(true));
        assert_eq!(values["is_integer"], MetadataValue::Integer(-999));
        assert_eq!(values["is_string"], MetadataValue::String("Hello World".into()));
        assert_eq!(values["quoted_number"], MetadataValue::String("42".into()));
    }

    #[test]
    fn datetime_mapping_selects_datetime_variant() {
        let yaml = "created: {datetime: '2013-10-23 15:34:00 +0000'}";
        let values: IndexMap<String, MetadataValue> = serde_yaml::from_str(yaml).unwrap();
        let expected = Utc.with_ymd_and_hms(2013, 10, 23, 15, 34, 0).unwrap();
        assert_eq!(values["created"], MetadataValue::DateTime(expected));
    }

    #[test]
    fn floats_are_rejected() {
        let err = serde_yaml::from_str::<MetadataValue>("1.5").unwrap_err();
        assert!(err.to_string().contains("floating point"));
    }

    #[test]
    fn unknown_mapping_type_is_rejected() {
        let err = serde_yaml::from_str::<MetadataValue>("{date: '2013-10-23'}").unwrap_err();
        assert!(err.to_string().contains("unknown metadata value type"));
    }

    #[test]
    fn json_round_trip_preserves_every_variant() {
        let mut values = IndexMap::new();
        values.insert("b".to_string(), MetadataValue::Boolean(false));
        values.insert("i".to_string(), MetadataValue::Integer(i64::MIN));
        values.insert("s".to_string(), MetadataValue::String("true".into()));
        values.insert(
            "d".to_string(),
            MetadataValue::DateTime(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()),
        );

        let json = serde_json::to_string(&values).unwrap();
        let back: IndexMap<String, MetadataValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn type_names_match_control_plane_types() {
        assert_eq!(MetadataValue::from(true).type_name(), "MetadataBooleanValue");
        assert_eq!(MetadataValue::from(3i64).type_name(), "MetadataNumberValue");
        assert_eq!(MetadataValue::from("x").type_name(), "MetadataStringValue");
    }
}

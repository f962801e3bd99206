//! Points and their line protocol encoding.
//!
//! A point renders as one line:
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] timestamp
//! ```
//!
//! Tags are written in key order and tags with empty values are skipped.
//! Measurement names escape commas and spaces; tag keys, tag values and field
//! keys additionally escape `=`. Backslashes are doubled so a trailing `\\`
//! cannot escape the separator that follows. Newlines in those positions are
//! written as `\n` so a single point never spans two lines.

use crate::error::PointError;
use chrono::{DateTime, Utc};
use rpcstats_common::Precision;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Indexed string dimensions of a point
pub type Tags = BTreeMap<String, String>;

/// Payload values of a point
pub type Fields = BTreeMap<String, FieldValue>;

/// Scalar field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    UInteger(u64),
    Boolean(bool),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::UInteger(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}i", v),
            Self::UInteger(v) => write!(f, "{}u", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::String(v) => {
                f.write_char('"')?;
                for c in v.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('"')
            }
        }
    }
}

/// One timestamped observation
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Tags,
    fields: Fields,
    time: DateTime<Utc>,
}

impl Point {
    /// Build a point, rejecting values the line protocol cannot carry.
    pub fn new(
        measurement: impl Into<String>,
        tags: Tags,
        fields: Fields,
        time: DateTime<Utc>,
    ) -> Result<Self, PointError> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(PointError::MissingMeasurement);
        }
        if fields.is_empty() {
            return Err(PointError::NoFields);
        }
        if tags.keys().any(|k| k.is_empty()) {
            return Err(PointError::EmptyTagKey);
        }
        for (key, value) in &fields {
            if key.is_empty() {
                return Err(PointError::EmptyFieldKey);
            }
            if let FieldValue::Float(v) = value {
                if !v.is_finite() {
                    return Err(PointError::UnsupportedValue {
                        field: key.clone(),
                        value: v.to_string(),
                    });
                }
            }
        }
        if time.timestamp_nanos_opt().is_none() {
            return Err(PointError::UnsupportedValue {
                field: "time".to_string(),
                value: time.to_rfc3339(),
            });
        }

        Ok(Self {
            measurement,
            tags,
            fields,
            time,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Encode the point as a single line, without the trailing newline.
    pub fn to_line(&self, precision: Precision) -> String {
        let mut line = String::with_capacity(64);
        escape_into(&mut line, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            escape_into(&mut line, key, &[',', '=', ' ']);
            // Writing into a String cannot fail
            let _ = write!(line, "={}", value);
        }

        let _ = write!(line, " {}", self.timestamp(precision));
        line
    }

    fn timestamp(&self, precision: Precision) -> i64 {
        match precision {
            // Checked in Point::new
            Precision::Ns => self.time.timestamp_nanos_opt().unwrap_or_default(),
            Precision::Us => self.time.timestamp_micros(),
            Precision::Ms => self.time.timestamp_millis(),
            Precision::S => self.time.timestamp(),
        }
    }
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if c == '\n' {
            out.push_str("\\n");
            continue;
        }
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at_epoch_plus(nanos: i64) -> DateTime<Utc> {
        Utc.timestamp_nanos(nanos)
    }

    fn latency_fields(ms: f64) -> Fields {
        let mut fields = Fields::new();
        fields.insert("latency".to_string(), FieldValue::Float(ms));
        fields
    }

    #[test]
    fn test_encode_basic_point() {
        let mut tags = Tags::new();
        tags.insert("method".to_string(), "/test.Service/Ping".to_string());
        tags.insert("error_code".to_string(), "OK".to_string());

        let point = Point::new(
            "rpc_latency",
            tags,
            latency_fields(12.5),
            at_epoch_plus(1_500_000_000_123_456_789),
        )
        .unwrap();

        assert_eq!(
            point.to_line(Precision::Ns),
            "rpc_latency,error_code=OK,method=/test.Service/Ping latency=12.5 1500000000123456789"
        );
    }

    #[test]
    fn test_encode_precision() {
        let point = Point::new(
            "m",
            Tags::new(),
            latency_fields(1.0),
            at_epoch_plus(1_500_000_000_123_456_789),
        )
        .unwrap();

        assert_eq!(point.to_line(Precision::Us), "m latency=1 1500000000123456");
        assert_eq!(point.to_line(Precision::Ms), "m latency=1 1500000000123");
        assert_eq!(point.to_line(Precision::S), "m latency=1 1500000000");
    }

    #[test]
    fn test_encode_field_types() {
        let mut fields = Fields::new();
        fields.insert("a".to_string(), FieldValue::Integer(-3));
        fields.insert("b".to_string(), FieldValue::UInteger(7));
        fields.insert("c".to_string(), FieldValue::Boolean(true));
        fields.insert("d".to_string(), FieldValue::from(r#"say "hi" \o/"#));

        let point = Point::new("m", Tags::new(), fields, at_epoch_plus(1)).unwrap();

        assert_eq!(
            point.to_line(Precision::Ns),
            r#"m a=-3i,b=7u,c=true,d="say \"hi\" \\o/" 1"#
        );
    }

    #[test]
    fn test_encode_escapes() {
        let mut tags = Tags::new();
        tags.insert("error".to_string(), "bad input, a=b\nsecond".to_string());

        let point = Point::new("my measure,x", tags, latency_fields(0.5), at_epoch_plus(9)).unwrap();

        assert_eq!(
            point.to_line(Precision::Ns),
            r"my\ measure\,x,error=bad\ input\,\ a\=b\nsecond latency=0.5 9"
        );
    }

    #[test]
    fn test_empty_tag_values_skipped() {
        let mut tags = Tags::new();
        tags.insert("error".to_string(), String::new());
        tags.insert("method".to_string(), "/a/B".to_string());

        let point = Point::new("m", tags, latency_fields(2.0), at_epoch_plus(5)).unwrap();

        assert_eq!(point.to_line(Precision::Ns), "m,method=/a/B latency=2 5");
    }

    #[test]
    fn test_rejects_invalid_points() {
        let now = Utc::now();

        assert_eq!(
            Point::new("", Tags::new(), latency_fields(1.0), now),
            Err(PointError::MissingMeasurement)
        );
        assert_eq!(
            Point::new("m", Tags::new(), Fields::new(), now),
            Err(PointError::NoFields)
        );

        let mut tags = Tags::new();
        tags.insert(String::new(), "v".to_string());
        assert_eq!(
            Point::new("m", tags, latency_fields(1.0), now),
            Err(PointError::EmptyTagKey)
        );

        assert!(matches!(
            Point::new("m", Tags::new(), latency_fields(f64::NAN), now),
            Err(PointError::UnsupportedValue { .. })
        ));
        assert!(matches!(
            Point::new("m", Tags::new(), latency_fields(f64::INFINITY), now),
            Err(PointError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn test_trailing_backslash_does_not_escape_separator() {
        let mut tags = Tags::new();
        tags.insert("error".to_string(), "open C:\\tmp\\".to_string());

        let point = Point::new("m", tags, latency_fields(1.5), at_epoch_plus(7)).unwrap();

        assert_eq!(
            point.to_line(Precision::Ns),
            r"m,error=open\ C:\\tmp\\ latency=1.5 7"
        );
    }

    /// Number of spaces not preceded by an odd run of backslashes
    fn unescaped_spaces(line: &str) -> usize {
        let mut count = 0;
        let mut backslashes = 0;
        for c in line.chars() {
            match c {
                '\\' => backslashes += 1,
                ' ' if backslashes % 2 == 0 => {
                    count += 1;
                    backslashes = 0;
                }
                _ => backslashes = 0,
            }
        }
        count
    }

    proptest! {
        #[test]
        fn encoded_names_never_break_the_line(
            measurement in "(?s).+",
            key in "(?s).+",
            value in "(?s).*",
        ) {
            let mut tags = Tags::new();
            tags.insert(key, value);

            let point = Point::new(measurement, tags, latency_fields(1.0), at_epoch_plus(1)).unwrap();
            let line = point.to_line(Precision::Ns);

            prop_assert!(!line.contains('\n'));
            // Exactly two unescaped spaces separate tags, fields and timestamp
            prop_assert_eq!(unescaped_spaces(&line), 2);
            prop_assert!(line.ends_with(" latency=1 1"));
        }

        #[test]
        fn float_fields_round_trip(v in proptest::num::f64::NORMAL) {
            let point = Point::new("m", Tags::new(), latency_fields(v), at_epoch_plus(1)).unwrap();
            let line = point.to_line(Precision::Ns);
            let encoded = line
                .strip_prefix("m latency=")
                .and_then(|rest| rest.strip_suffix(" 1"))
                .unwrap();
            prop_assert_eq!(encoded.parse::<f64>().unwrap(), v);
        }
    }
}

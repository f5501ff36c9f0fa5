//! Rendering events into bytes
//!
//! Layouts write straight into a caller-owned buffer so appenders can reuse
//! one buffer for every event they see.

use super::error::Result;
use super::log_entry::LogEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::io::Write;

/// Line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// `[2025-01-08T10:30:45.123Z] [INFO ] [main] app - Request processed`
    #[default]
    Text,

    /// One JSON object per line
    Json,
}

/// Timestamp rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Seconds since the epoch
    Unix,

    UnixMillis,

    UnixMicros,

    /// Any strftime pattern, e.g. `%d/%b/%Y:%H:%M:%S %z`
    Custom(String),
}

impl TimestampFormat {
    /// Lazily formatted timestamp, nothing is allocated until it is written
    pub fn display<'a>(&'a self, timestamp: &'a DateTime<Utc>) -> FormattedTimestamp<'a> {
        FormattedTimestamp {
            format: self,
            timestamp,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TimestampFormat::Unix | TimestampFormat::UnixMillis | TimestampFormat::UnixMicros
        )
    }
}

pub struct FormattedTimestamp<'a> {
    format: &'a TimestampFormat,
    timestamp: &'a DateTime<Utc>,
}

impl fmt::Display for FormattedTimestamp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self.timestamp;
        match self.format {
            TimestampFormat::Iso8601 => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            TimestampFormat::Iso8601Micros => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
            TimestampFormat::Rfc3339 => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.6f%:z")),
            TimestampFormat::Unix => write!(f, "{}", ts.timestamp()),
            TimestampFormat::UnixMillis => write!(f, "{}", ts.timestamp_millis()),
            TimestampFormat::UnixMicros => write!(f, "{}", ts.timestamp_micros()),
            TimestampFormat::Custom(pattern) => write!(f, "{}", ts.format(pattern)),
        }
    }
}

impl Serialize for FormattedTimestamp<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let ts = self.timestamp;
        match self.format {
            TimestampFormat::Unix => serializer.serialize_i64(ts.timestamp()),
            TimestampFormat::UnixMillis => serializer.serialize_i64(ts.timestamp_millis()),
            TimestampFormat::UnixMicros => serializer.serialize_i64(ts.timestamp_micros()),
            _ => serializer.collect_str(self),
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: FormattedTimestamp<'a>,
    level: &'a str,
    logger: &'a str,
    thread: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<&'a str>,
}

/// Output format plus timestamp format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub format: OutputFormat,
    pub timestamp: TimestampFormat,
}

impl Layout {
    pub fn new(format: OutputFormat, timestamp: TimestampFormat) -> Self {
        Self { format, timestamp }
    }

    pub fn text() -> Self {
        Self::new(OutputFormat::Text, TimestampFormat::default())
    }

    pub fn json() -> Self {
        Self::new(OutputFormat::Json, TimestampFormat::default())
    }

    /// Append one rendered line, newline included, to `out`
    pub fn render(&self, event: &LogEvent<'_>, out: &mut Vec<u8>) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.render_text(event, &format_args!("{:5}", event.level), out),
            OutputFormat::Json => self.render_json(event, out),
        }
    }

    /// Text line with a caller-supplied level column
    pub(crate) fn render_text(
        &self,
        event: &LogEvent<'_>,
        level: &dyn fmt::Display,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        write!(
            out,
            "[{}] [{}] [{}] {} - ",
            self.timestamp.display(&event.timestamp),
            level,
            event.thread,
            event.logger
        )?;
        write_sanitized(out, event.message);
        out.push(b'\n');
        Ok(())
    }

    fn render_json(&self, event: &LogEvent<'_>, out: &mut Vec<u8>) -> Result<()> {
        let line = JsonLine {
            timestamp: self.timestamp.display(&event.timestamp),
            level: event.level.to_str(),
            logger: event.logger,
            thread: event.thread,
            message: event.message,
            template: (event.template != event.message).then_some(event.template),
        };
        serde_json::to_writer(&mut *out, &line)?;
        out.push(b'\n');
        Ok(())
    }
}

/// Escape line breaks and tabs so one event stays on one line
fn write_sanitized(out: &mut Vec<u8>, message: &str) {
    let bytes = message.as_bytes();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let escaped: &[u8] = match b {
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            _ => continue,
        };
        out.extend_from_slice(&bytes[start..i]);
        out.extend_from_slice(escaped);
        start = i + 1;
    }
    out.extend_from_slice(&bytes[start..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use chrono::TimeZone;

    fn fixed_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    fn event<'a>(message: &'a str) -> LogEvent<'a> {
        LogEvent::new(LogLevel::Info, "app", message, "main").with_timestamp(fixed_datetime())
    }

    fn render(layout: &Layout, event: &LogEvent<'_>) -> String {
        let mut out = Vec::new();
        layout.render(event, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_timestamp_formats() {
        let ts = fixed_datetime();
        assert_eq!(TimestampFormat::Iso8601.display(&ts).to_string(), "2025-01-08T10:30:45.123Z");
        assert_eq!(
            TimestampFormat::Iso8601Micros.display(&ts).to_string(),
            "2025-01-08T10:30:45.123456Z"
        );
        assert_eq!(
            TimestampFormat::Rfc3339.display(&ts).to_string(),
            "2025-01-08T10:30:45.123456+00:00"
        );
        assert_eq!(TimestampFormat::Unix.display(&ts).to_string(), "1736332245");
        assert_eq!(
            TimestampFormat::Custom("%Y/%m/%d".to_string()).display(&ts).to_string(),
            "2025/01/08"
        );
        assert!(TimestampFormat::UnixMillis.is_numeric());
    }

    #[test]
    fn test_text_line() {
        let line = render(&Layout::text(), &event("Request processed"));
        assert_eq!(
            line,
            "[2025-01-08T10:30:45.123Z] [INFO ] [main] app - Request processed\n"
        );
    }

    #[test]
    fn test_text_line_escapes_line_breaks() {
        let line = render(&Layout::text(), &event("first\nINJECTED\tline\r"));
        assert!(line.ends_with("app - first\\nINJECTED\\tline\\r\n"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_json_line() {
        let event = event("user 42 logged in").with_template("user {} logged in");
        let line = render(&Layout::json(), &event);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();

        assert_eq!(value["timestamp"], "2025-01-08T10:30:45.123Z");
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["logger"], "app");
        assert_eq!(value["message"], "user 42 logged in");
        assert_eq!(value["template"], "user {} logged in");
    }

    #[test]
    fn test_json_numeric_timestamp_and_no_template() {
        let layout = Layout::new(OutputFormat::Json, TimestampFormat::UnixMillis);
        let line = render(&layout, &event("plain"));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();

        assert_eq!(value["timestamp"], 1736332245123i64);
        assert!(value.get("template").is_none());
    }
}

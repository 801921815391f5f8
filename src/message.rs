// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-tracing.  If
// not, see <http://www.gnu.org/licenses/>.

//! GELF [1.1] message construction.
//!
//! [1.1]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//!
//! [`GelfMessageBuilder`] turns a [`LogRecord`] into a flat JSON object: the fixed GELF envelope
//! (`version`, `host`, `short_message`, `full_message`, `timestamp`, `level`) followed by one
//! underscore-prefixed additional field per leaf of the record's property tree.

use crate::{
    error::{Error, Result},
    flatten::PropertyFlattener,
    level::{default_level_mapping, LogLevel, SyslogLevel},
    naming::{NoOpPropertyNamingStrategy, PropertyNamingStrategy},
    record::LogRecord,
};

use backtrace::Backtrace;
use chrono::prelude::*;
use serde_json::{Map, Value};

use std::sync::Arc;

pub const GELF_VERSION: &str = "1.1";
/// Sent as `host` when we're given no (or a blank) host name.
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_SHORT_MESSAGE_MAX_LENGTH: usize = 250;

/// A serialized GELF message: the JSON object that goes into the datagram or the HTTP body.
pub type GelfMessage = Map<String, Value>;

/// Attempt to figure-out a name for this host.
///
/// Try [gethostname()] first, then fall back to the first local IP address; if both fail, use
/// [`DEFAULT_HOST`]. Never fails.
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
pub fn system_host_name() -> String {
    hostname::get()
        .ok()
        .map(|hn| hn.to_string_lossy().into_owned())
        .filter(|hn| !hn.trim().is_empty())
        .or_else(|| local_ip_address::local_ip().ok().map(|ip| ip.to_string()))
        .unwrap_or_else(|| DEFAULT_HOST.to_owned())
}

/// Builds GELF messages from [`LogRecord`]s.
///
/// Cheap to share; holds nothing but configuration.
pub struct GelfMessageBuilder {
    host: String,
    short_message_max_length: usize,
    truncation_suffix: Option<String>,
    facility: Option<String>,
    include_message_template: bool,
    naming: Arc<dyn PropertyNamingStrategy>,
    map_level: Box<dyn Fn(&LogLevel) -> SyslogLevel + Send + Sync>,
}

impl std::default::Default for GelfMessageBuilder {
    fn default() -> Self {
        GelfMessageBuilder {
            host: DEFAULT_HOST.to_owned(),
            short_message_max_length: DEFAULT_SHORT_MESSAGE_MAX_LENGTH,
            truncation_suffix: None,
            facility: None,
            include_message_template: false,
            naming: Arc::new(NoOpPropertyNamingStrategy),
            map_level: Box::new(default_level_mapping),
        }
    }
}

pub struct GelfMessageBuilderBuilder {
    imp: GelfMessageBuilder,
}

impl GelfMessageBuilderBuilder {
    /// The sender's identity; blank names are replaced by [`DEFAULT_HOST`].
    pub fn host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.imp.host = if host.trim().is_empty() {
            DEFAULT_HOST.to_owned()
        } else {
            host
        };
        self
    }
    pub fn short_message_max_length(mut self, max: usize) -> Result<Self> {
        if max == 0 {
            return Err(Error::bad_config("the short message maximum length must be positive"));
        }
        self.imp.short_message_max_length = max;
        Ok(self)
    }
    pub fn truncation_suffix(mut self, suffix: Option<String>) -> Self {
        self.imp.truncation_suffix = suffix;
        self
    }
    pub fn facility(mut self, facility: Option<String>) -> Self {
        self.imp.facility = facility;
        self
    }
    pub fn include_message_template(mut self, include: bool) -> Self {
        self.imp.include_message_template = include;
        self
    }
    pub fn naming_strategy(mut self, naming: Arc<dyn PropertyNamingStrategy>) -> Self {
        self.imp.naming = naming;
        self
    }
    pub fn map_level<F>(mut self, map_level: F) -> Self
    where
        F: Fn(&LogLevel) -> SyslogLevel + Send + Sync + 'static,
    {
        self.imp.map_level = Box::new(map_level);
        self
    }
    pub fn build(self) -> GelfMessageBuilder {
        self.imp
    }
}

impl GelfMessageBuilder {
    pub fn builder() -> GelfMessageBuilderBuilder {
        GelfMessageBuilderBuilder {
            imp: GelfMessageBuilder::default(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build the GELF message for `record`.
    ///
    /// Additional fields are merged in property order; should two flatten to the same name, the
    /// later one wins.
    pub fn build(&self, record: &LogRecord) -> GelfMessage {
        let level = (self.map_level)(&record.level);

        let mut msg = Map::new();
        msg.insert("version".to_owned(), GELF_VERSION.into());
        msg.insert("host".to_owned(), self.host.clone().into());
        msg.insert(
            "short_message".to_owned(),
            self.short_message(&record.message).into(),
        );
        msg.insert("full_message".to_owned(), record.message.clone().into());
        msg.insert(
            "timestamp".to_owned(),
            Value::from(epoch_seconds(&record.timestamp)),
        );
        msg.insert("level".to_owned(), level.code().into());
        msg.insert("_level_name".to_owned(), record.level.to_string().into());
        if let Some(facility) = &self.facility {
            msg.insert("facility".to_owned(), facility.clone().into());
        }
        if self.include_message_template {
            if let Some(template) = &record.message_template {
                msg.insert("_message_template".to_owned(), template.clone().into());
            }
        }

        let flattener = PropertyFlattener::new(self.naming.as_ref());
        for (name, value) in &record.properties {
            for (field, value) in flattener.flatten(name, value, "") {
                msg.insert(field, value);
            }
        }

        msg
    }

    /// Build the GELF message for `record` & serialize it.
    pub fn to_json(&self, record: &LogRecord) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.build(record)).map_err(|err| Error::Serialize {
            source: Box::new(err),
            back: Backtrace::new(),
        })
    }

    /// `message`, cut down to at most `short_message_max_length` characters.
    fn short_message(&self, message: &str) -> String {
        let max = self.short_message_max_length;
        let cut = match message.char_indices().nth(max) {
            None => return message.to_owned(),
            Some((i, _)) => i,
        };
        match &self.truncation_suffix {
            None => message[..cut].to_owned(),
            Some(suffix) => {
                let n = suffix.chars().count();
                if n >= max {
                    suffix.chars().take(max).collect()
                } else {
                    message.chars().take(max - n).chain(suffix.chars()).collect()
                }
            }
        }
    }
}

/// Seconds since the Unix epoch, to microsecond precision.
fn epoch_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{naming::CamelCasePropertyNamingStrategy, record::PropertyValue};

    use serde_json::json;

    fn record(level: LogLevel, message: &str) -> LogRecord {
        LogRecord::new(level, message).with_timestamp(Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap())
    }

    #[test]
    fn envelope() {
        let builder = GelfMessageBuilder::builder().host("node1").build();
        let msg = builder.build(
            &record(LogLevel::Error, "disk full on node1").with_property("Host", "node1"),
        );

        assert_eq!(msg["version"], json!("1.1"));
        assert_eq!(msg["host"], json!("node1"));
        assert_eq!(msg["level"], json!(3));
        assert_eq!(msg["_level_name"], json!("Error"));
        assert_eq!(msg["short_message"], json!("disk full on node1"));
        assert_eq!(msg["full_message"], json!("disk full on node1"));
        assert_eq!(msg["_Host"], json!("node1"));
        assert_eq!(msg["timestamp"].as_f64(), Some(1_700_000_000.123456));
        assert!(!msg.contains_key("facility"));

        let keys: Vec<&str> = msg.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "version",
                "host",
                "short_message",
                "full_message",
                "timestamp",
                "level",
                "_level_name",
                "_Host"
            ]
        );
    }

    #[test]
    fn blank_host() {
        assert_eq!(GelfMessageBuilder::default().host(), "localhost");
        assert_eq!(GelfMessageBuilder::builder().host("  \t").build().host(), "localhost");
        assert!(!system_host_name().is_empty());
    }

    #[test]
    fn truncation() {
        let long: String = std::iter::repeat('é').take(300).collect();

        let builder = GelfMessageBuilder::builder()
            .short_message_max_length(100)
            .unwrap()
            .build();
        let msg = builder.build(&record(LogLevel::Information, &long));
        assert_eq!(msg["short_message"].as_str().unwrap().chars().count(), 100);
        assert_eq!(msg["full_message"].as_str().unwrap().chars().count(), 300);

        let builder = GelfMessageBuilder::builder()
            .short_message_max_length(10)
            .unwrap()
            .truncation_suffix(Some("...".to_owned()))
            .build();
        let msg = builder.build(&record(LogLevel::Information, "0123456789abcdef"));
        assert_eq!(msg["short_message"], json!("0123456..."));
        let msg = builder.build(&record(LogLevel::Information, "0123456789"));
        assert_eq!(msg["short_message"], json!("0123456789"));

        assert!(GelfMessageBuilder::builder().short_message_max_length(0).is_err());
    }

    #[test]
    fn optional_fields() {
        let builder = GelfMessageBuilder::builder()
            .facility(Some("billing".to_owned()))
            .include_message_template(true)
            .naming_strategy(Arc::new(CamelCasePropertyNamingStrategy))
            .map_level(|_| SyslogLevel::LOG_ALERT)
            .build();
        let msg = builder.build(
            &record(LogLevel::Warning, "user 5 logged in")
                .with_template("user {UserId} logged in")
                .with_property("UserId", 5),
        );
        assert_eq!(msg["facility"], json!("billing"));
        assert_eq!(msg["_message_template"], json!("user {UserId} logged in"));
        assert_eq!(msg["_userId"], json!(5));
        assert_eq!(msg["level"], json!(1));
        assert_eq!(msg["_level_name"], json!("Warning"));
    }

    #[test]
    fn last_write_wins() {
        let msg = GelfMessageBuilder::default().build(
            &record(LogLevel::Debug, "collide")
                .with_property("A.B", 1)
                .with_property("A", PropertyValue::structure(vec![("B", PropertyValue::from(2))])),
        );
        assert_eq!(msg["_A.B"], json!(2));
        assert_eq!(msg.len(), 8);
    }

    #[test]
    fn no_properties() {
        let json = GelfMessageBuilder::default()
            .to_json(&record(LogLevel::Information, "Hello, 世界!"))
            .unwrap();
        let value: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["short_message"], json!("Hello, 世界!"));
        assert_eq!(value.as_object().unwrap().len(), 7);
    }
}

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

//! The structured log events this crate consumes.
//!
//! A [`LogRecord`] is what the host logging pipeline hands us: a timestamp, a severity, the
//! rendered message and a list of named [`PropertyValue`]s. Property values form a tree: a value is
//! either a [`Scalar`], a sequence of values, or a structure of named values.

use crate::level::LogLevel;

use chrono::prelude::*;

type StdResult<T, E> = std::result::Result<T, E>;

/// A leaf in the property tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    DateTime(DateTime<Utc>),
    /// Anything else; carries the value's textual (usually `Debug`) rendering.
    Other(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::I64(n) => write!(f, "{}", n),
            Scalar::U64(n) => write!(f, "{}", n),
            Scalar::F64(x) => write!(f, "{}", x),
            Scalar::String(s) | Scalar::Other(s) => write!(f, "{}", s),
            Scalar::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// A (possibly nested) property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Scalar(Scalar),
    Sequence(Vec<PropertyValue>),
    Structure {
        type_tag: Option<String>,
        members: Vec<(String, PropertyValue)>,
    },
}

impl PropertyValue {
    pub fn null() -> PropertyValue {
        PropertyValue::Scalar(Scalar::Null)
    }

    /// Convenience constructor for an untagged structure.
    pub fn structure<I, K>(members: I) -> PropertyValue
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        PropertyValue::Structure {
            type_tag: None,
            members: members.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn sequence<I, V>(items: I) -> PropertyValue
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        PropertyValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

/// Render a value for human consumption: strings nested inside sequences & structures are
/// quoted, sequences look like `[1, 2, "three"]` and structures like `Point { X: 1, Y: 2 }`.
impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        match self {
            PropertyValue::Scalar(s) => write!(f, "{}", s),
            PropertyValue::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_nested(f, item)?;
                }
                write!(f, "]")
            }
            PropertyValue::Structure { type_tag, members } => {
                if let Some(tag) = type_tag {
                    write!(f, "{} ", tag)?;
                }
                write!(f, "{{ ")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    write_nested(f, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

fn write_nested(f: &mut std::fmt::Formatter<'_>, value: &PropertyValue) -> std::fmt::Result {
    match value {
        PropertyValue::Scalar(Scalar::String(s)) => write!(f, "{:?}", s),
        other => write!(f, "{}", other),
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident as $conv:ty),+ $(,)?) => {
        $(
            impl std::convert::From<$t> for PropertyValue {
                fn from(x: $t) -> Self {
                    PropertyValue::Scalar(Scalar::$variant(<$conv>::from(x)))
                }
            }
        )+
    };
}

scalar_from! {
    bool => Bool as bool,
    i8 => I64 as i64,
    i16 => I64 as i64,
    i32 => I64 as i64,
    i64 => I64 as i64,
    u8 => U64 as u64,
    u16 => U64 as u64,
    u32 => U64 as u64,
    u64 => U64 as u64,
    f32 => F64 as f64,
    f64 => F64 as f64,
    String => String as String,
    &str => String as String,
    DateTime<Utc> => DateTime as DateTime<Utc>,
}

impl<T: Into<PropertyValue>> std::convert::From<Option<T>> for PropertyValue {
    fn from(x: Option<T>) -> Self {
        x.map(Into::into).unwrap_or_else(PropertyValue::null)
    }
}

/// One structured log event, as supplied by the host pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// The fully rendered message
    pub message: String,
    /// The template the message was rendered from, when the host has one
    pub message_template: Option<String>,
    /// Named properties, in the order the host recorded them. An absent property map is simply
    /// an empty list.
    pub properties: Vec<(String, PropertyValue)>,
}

impl LogRecord {
    /// A record stamped with the current time, bearing no properties.
    pub fn new(level: LogLevel, message: impl Into<String>) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            message_template: None,
            properties: Vec::new(),
        }
    }
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }
}

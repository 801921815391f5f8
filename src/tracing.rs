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

//! Primitives for mapping [`tracing`] entities to [`LogRecord`]s.
//!
//! [`EventFormatter`] implementations turn [`Event`]s into [`LogRecord`]s. This module provides a
//! single implementation, [`DefaultEventFormatter`], that takes the "message" field as the
//! rendered message & every other field as a property.
//!
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html

use crate::{
    level::LogLevel,
    record::{LogRecord, PropertyValue, Scalar},
};

use tracing_subscriber::{layer::Context, registry::LookupSpan};

type StdResult<T, E> = std::result::Result<T, E>;

/// Format [`tracing`] [`Event`]s to [`LogRecord`]s.
///
/// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// The translation from [`tracing`] events to GELF messages occurs in three parts:
///
/// 1. turning the Event (and perhaps the Spans in which it occurred) into a [`LogRecord`]
///
/// 2. building the GELF message from that record & serializing it
///
/// 3. transporting the result to Graylog
///
/// This trait formally defines step 1. [`on_event`](EventFormatter::on_event) indicates, firstly,
/// whether this event shall produce a GELF message at all, and if so, what goes into it. Span
/// hooks are there for implementations that want to remember span fields for later events; they
/// do nothing by default.
pub trait EventFormatter<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    type Error: std::error::Error + 'static;
    /// An event has occurred; `meta` is the event's metadata, normalized if it came from `log`.
    fn on_event(
        &self,
        event: &tracing::Event,
        meta: &tracing::Metadata,
        ctx: Context<'_, S>,
    ) -> StdResult<Option<LogRecord>, Self::Error>;
    /// A new span was created
    fn on_new_span(
        &self,
        _attrs: &tracing_core::span::Attributes<'_>,
        _id: &tracing_core::span::Id,
        _ctx: Context<'_, S>,
    ) {
    }
    /// Values were recorded on an existing span
    fn on_record(
        &self,
        _id: &tracing_core::span::Id,
        _values: &tracing_core::span::Record<'_>,
        _ctx: Context<'_, S>,
    ) {
    }
}

/// Collects `tracing` fields as properties, setting aside the "message" field.
#[derive(Default)]
struct PropertyVisitor {
    message: Option<String>,
    properties: Vec<(String, PropertyValue)>,
}

impl PropertyVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: PropertyValue) {
        // Fields synthesized by tracing-log; their contents are already in the normalized
        // metadata.
        #[cfg(feature = "tracing-log")]
        if field.name().starts_with("log.") {
            return;
        }
        // A span field recorded twice keeps its latest value, in its original position.
        match self
            .properties
            .iter_mut()
            .find(|(name, _)| name == field.name())
        {
            Some((_, old)) => *old = value,
            None => self.properties.push((field.name().to_owned(), value)),
        }
    }
}

impl tracing::field::Visit for PropertyVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // The tracing macros "pre-format" the `message` field so that `value` actually refers
            // to a `std::fmt::Arguments` instance, which will print to a debug format without
            // enclosing double-quotes.
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, PropertyValue::Scalar(Scalar::Other(format!("{:?}", value))));
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.push(field, value.into());
        }
    }
    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, value.into());
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, value.into());
    }
    fn record_i128(&mut self, field: &tracing::field::Field, value: i128) {
        let value = match i64::try_from(value) {
            Ok(n) => n.into(),
            Err(_) => (value as f64).into(),
        };
        self.push(field, value);
    }
    fn record_u128(&mut self, field: &tracing::field::Field, value: u128) {
        let value = match u64::try_from(value) {
            Ok(n) => n.into(),
            Err(_) => (value as f64).into(),
        };
        self.push(field, value);
    }
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push(field, value.into());
    }
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, value.into());
    }
    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.push(field, value.to_string().into());
    }
}

/// The fields recorded on a span, kept in its extensions.
#[derive(Debug, Default)]
struct SpanFields(Vec<(String, PropertyValue)>);

fn default_level_mapping(level: &tracing::Level) -> LogLevel {
    LogLevel::from(level)
}

/// The stock [`EventFormatter`].
///
/// The event's "message" field becomes the rendered message (the empty string if there is none)
/// & every other field becomes a property: numbers stay numbers, `bool`s & `&str`s keep their
/// types, errors are rendered with `Display` & anything else with `Debug`. Optionally, each span
/// in the event's scope contributes a structure property named after the span, and the event's
/// target, module & source location can be included.
pub struct DefaultEventFormatter {
    map_level: Box<dyn Fn(&tracing::Level) -> LogLevel + Send + Sync>,
    span_fields: bool,
    target: bool,
    module: bool,
    location: bool,
}

impl std::default::Default for DefaultEventFormatter {
    fn default() -> Self {
        DefaultEventFormatter {
            map_level: Box::new(default_level_mapping),
            span_fields: false,
            target: false,
            module: false,
            location: false,
        }
    }
}

pub struct DefaultEventFormatterBuilder {
    imp: DefaultEventFormatter,
}

impl DefaultEventFormatterBuilder {
    pub fn map_level<F>(mut self, map_level: F) -> Self
    where
        F: Fn(&tracing::Level) -> LogLevel + Send + Sync + 'static,
    {
        self.imp.map_level = Box::new(map_level);
        self
    }
    /// Send the fields of enclosing spans as `_span.field`.
    pub fn with_span_fields(mut self, span_fields: bool) -> Self {
        self.imp.span_fields = span_fields;
        self
    }
    /// Send the event's target as `_target`.
    pub fn with_target(mut self, target: bool) -> Self {
        self.imp.target = target;
        self
    }
    /// Send the event's module path as `_module`.
    pub fn with_module(mut self, module: bool) -> Self {
        self.imp.module = module;
        self
    }
    /// Send the event's source file & line as `_file` & `_line`.
    pub fn with_location(mut self, location: bool) -> Self {
        self.imp.location = location;
        self
    }
    pub fn build(self) -> DefaultEventFormatter {
        self.imp
    }
}

impl DefaultEventFormatter {
    pub fn builder() -> DefaultEventFormatterBuilder {
        DefaultEventFormatterBuilder {
            imp: DefaultEventFormatter::default(),
        }
    }

    fn span_properties<S>(
        &self,
        event: &tracing::Event,
        ctx: &Context<'_, S>,
    ) -> Vec<(String, PropertyValue)>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        let scope = match ctx.event_scope(event) {
            Some(scope) => scope,
            None => return Vec::new(),
        };
        scope
            .from_root()
            .map(|span| {
                let members = span
                    .extensions()
                    .get::<SpanFields>()
                    .map(|fields| fields.0.clone())
                    .unwrap_or_default();
                (
                    span.name().to_owned(),
                    PropertyValue::Structure {
                        type_tag: None,
                        members,
                    },
                )
            })
            .collect()
    }

    fn metadata_properties(&self, meta: &tracing::Metadata) -> Vec<(String, PropertyValue)> {
        let mut properties = Vec::new();
        if self.target {
            properties.push(("_target".to_owned(), meta.target().into()));
        }
        if self.module {
            if let Some(module) = meta.module_path() {
                properties.push(("_module".to_owned(), module.into()));
            }
        }
        if self.location {
            if let Some(file) = meta.file() {
                properties.push(("_file".to_owned(), file.into()));
            }
            if let Some(line) = meta.line() {
                properties.push(("_line".to_owned(), line.into()));
            }
        }
        properties
    }
}

impl<S> EventFormatter<S> for DefaultEventFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    type Error = std::convert::Infallible;

    fn on_event(
        &self,
        event: &tracing::Event,
        meta: &tracing::Metadata,
        ctx: Context<'_, S>,
    ) -> StdResult<Option<LogRecord>, Self::Error> {
        let mut visitor = PropertyVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            (self.map_level)(meta.level()),
            visitor.message.unwrap_or_default(),
        );
        record.properties = self.metadata_properties(meta);
        if self.span_fields {
            record.properties.extend(self.span_properties(event, &ctx));
        }
        // The event's own fields come last so that they win any name collisions
        record.properties.extend(visitor.properties);
        Ok(Some(record))
    }

    fn on_new_span(
        &self,
        attrs: &tracing_core::span::Attributes<'_>,
        id: &tracing_core::span::Id,
        ctx: Context<'_, S>,
    ) {
        if !self.span_fields {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let mut visitor = PropertyVisitor::default();
            attrs.record(&mut visitor);
            span.extensions_mut()
                .insert(SpanFields(visitor.properties));
        }
    }

    fn on_record(
        &self,
        id: &tracing_core::span::Id,
        values: &tracing_core::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        if !self.span_fields {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            let mut visitor = PropertyVisitor {
                message: None,
                properties: extensions
                    .remove::<SpanFields>()
                    .map(|fields| fields.0)
                    .unwrap_or_default(),
            };
            values.record(&mut visitor);
            extensions.insert(SpanFields(visitor.properties));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::record::Scalar;

    use std::sync::{Arc, Mutex};

    use tracing_subscriber::{layer::SubscriberExt, registry::Registry};

    /// Just enough of a Layer to drive a formatter & keep what it produces.
    struct Recorder<F> {
        formatter: F,
        records: Arc<Mutex<Vec<LogRecord>>>,
    }

    impl<S, F> tracing_subscriber::layer::Layer<S> for Recorder<F>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
        F: EventFormatter<S> + 'static,
    {
        fn on_new_span(
            &self,
            attrs: &tracing_core::span::Attributes<'_>,
            id: &tracing_core::span::Id,
            ctx: Context<'_, S>,
        ) {
            self.formatter.on_new_span(attrs, id, ctx);
        }
        fn on_record(
            &self,
            id: &tracing_core::span::Id,
            values: &tracing_core::span::Record<'_>,
            ctx: Context<'_, S>,
        ) {
            self.formatter.on_record(id, values, ctx);
        }
        fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
            if let Ok(Some(record)) = self.formatter.on_event(event, event.metadata(), ctx) {
                self.records.lock().unwrap().push(record);
            }
        }
    }

    fn record_with<F: FnOnce()>(formatter: DefaultEventFormatter, f: F) -> Vec<LogRecord> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default().with(Recorder {
            formatter,
            records: records.clone(),
        });
        tracing::subscriber::with_default(subscriber, f);
        let records = records.lock().unwrap().clone();
        records
    }

    fn property<'a>(record: &'a LogRecord, name: &str) -> Option<&'a PropertyValue> {
        record
            .properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[derive(Debug)]
    struct Thing(u8);

    #[test]
    fn fields() {
        let records = record_with(DefaultEventFormatter::default(), || {
            tracing::error!(
                Host = "node1",
                count = 3,
                big = 3u64,
                ratio = 0.5,
                ok = false,
                thing = ?Thing(7),
                "disk full on {}",
                "node1"
            );
        });
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message, "disk full on node1");
        assert_eq!(property(record, "Host"), Some(&PropertyValue::from("node1")));
        assert_eq!(property(record, "count"), Some(&PropertyValue::from(3i64)));
        assert_eq!(property(record, "big"), Some(&PropertyValue::from(3u64)));
        assert_eq!(property(record, "ratio"), Some(&PropertyValue::from(0.5)));
        assert_eq!(property(record, "ok"), Some(&PropertyValue::from(false)));
        assert_eq!(
            property(record, "thing"),
            Some(&PropertyValue::Scalar(Scalar::Other("Thing(7)".to_owned())))
        );
        assert!(property(record, "message").is_none());
    }

    #[test]
    fn wide_integers() {
        let records = record_with(DefaultEventFormatter::default(), || {
            tracing::info!(
                small = 42i128,
                negative = -7i128,
                unsigned = 9u128,
                huge = u128::MAX,
                "wide"
            );
        });
        let record = &records[0];
        assert_eq!(property(record, "small"), Some(&PropertyValue::from(42i64)));
        assert_eq!(property(record, "negative"), Some(&PropertyValue::from(-7i64)));
        assert_eq!(property(record, "unsigned"), Some(&PropertyValue::from(9u64)));
        assert_eq!(
            property(record, "huge"),
            Some(&PropertyValue::from(u128::MAX as f64))
        );
    }

    #[test]
    fn no_message() {
        let records = record_with(DefaultEventFormatter::default(), || {
            tracing::trace!(answer = 42);
        });
        assert_eq!(records[0].message, "");
        assert_eq!(records[0].level, LogLevel::Verbose);
        assert_eq!(records[0].properties.len(), 1);
    }

    #[test]
    fn errors() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let records = record_with(DefaultEventFormatter::default(), || {
            let err: &(dyn std::error::Error + 'static) = &err;
            tracing::warn!(error = err, "oops");
        });
        assert_eq!(property(&records[0], "error"), Some(&PropertyValue::from("boom")));
    }

    #[test]
    fn spans_and_metadata() {
        let formatter = DefaultEventFormatter::builder()
            .with_span_fields(true)
            .with_target(true)
            .with_location(true)
            .map_level(|_| LogLevel::Fatal)
            .build();
        let records = record_with(formatter, || {
            let outer = tracing::info_span!("request", id = 17, path = tracing::field::Empty);
            let _outer = outer.enter();
            outer.record("path", "/index.html");
            let inner = tracing::info_span!("db", table = "users");
            let _inner = inner.enter();
            tracing::info!("querying");
        });
        let record = &records[0];
        assert_eq!(record.level, LogLevel::Fatal);
        assert_eq!(
            property(record, "_target"),
            Some(&PropertyValue::from(module_path!()))
        );
        assert!(property(record, "_file").is_some());
        assert!(property(record, "_line").is_some());
        assert_eq!(
            property(record, "request"),
            Some(&PropertyValue::structure(vec![
                ("id", PropertyValue::from(17i64)),
                ("path", PropertyValue::from("/index.html")),
            ]))
        );
        let names: Vec<&str> = record.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["_target", "_file", "_line", "request", "db"]);
    }
}

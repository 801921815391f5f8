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

//! [gelf-tracing](crate) [`Layer`] & [`GelfSink`].
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! [`GelfSink`] is the terminal stage: it takes one [`LogRecord`] at a time, builds & serializes
//! the GELF message and hands it to its [`Transport`]. It knows nothing about [`tracing`], so it
//! can be driven directly by any logging pipeline.
//!
//! [`Layer`] plugs a [`GelfSink`] into a [`tracing-subscriber`] stack. A basic struct is defined,
//! with constructors for a few (sensible) combinations of type parameters. Consumers of this crate
//! are of course free to implement the [`EventFormatter`] and [`Transport`] traits for themselves
//! & provide their own implementations.
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html

use crate::{
    config::Config,
    diagnostics::{self, EmitGuard},
    error::Result,
    message::GelfMessageBuilder,
    record::LogRecord,
    tracing::{DefaultEventFormatter, EventFormatter},
    transport::{GelfTransport, Transport, UdpTransport},
};

use tracing::Event;
use tracing_subscriber::{layer::Context, registry::LookupSpan};

// When the tracing-log feature is enabled, use NormalizeEvent to extract file/line metadata
// from events that originated from the `log` crate. This follows the same pattern used by
// tracing-subscriber's fmt layer.
// See: https://github.com/tokio-rs/tracing/blob/master/tracing-subscriber/src/fmt/fmt_layer.rs
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         struct GelfSink                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Build, serialize & send one GELF message per [`LogRecord`].
///
/// Sends are independent of one another; the sink holds no state across calls beyond its
/// configuration & its transport.
pub struct GelfSink<T: Transport> {
    builder: GelfMessageBuilder,
    transport: T,
}

impl<T: Transport> GelfSink<T> {
    pub fn new(builder: GelfMessageBuilder, transport: T) -> GelfSink<T> {
        GelfSink { builder, transport }
    }
    /// A sink with the default message builder.
    pub fn with_transport(transport: T) -> GelfSink<T> {
        GelfSink::new(GelfMessageBuilder::default(), transport)
    }
    /// Send `record`; return the number of bytes put on the wire.
    pub fn try_emit(&self, record: &LogRecord) -> Result<usize> {
        let payload = self.builder.to_json(record)?;
        self.transport.send(&payload)
    }
    /// Send `record`, reporting any failure to [`diagnostics`] rather than to the caller.
    pub fn emit(&self, record: &LogRecord) {
        let _guard = match EmitGuard::enter() {
            Some(guard) => guard,
            None => return,
        };
        self.send_or_report(record);
    }
    /// [`emit`](GelfSink::emit), for callers already holding the [`EmitGuard`].
    fn send_or_report(&self, record: &LogRecord) {
        if let Err(err) = self.try_emit(record) {
            diagnostics::emit_err(&err, "Failed to send a GELF message");
        }
    }
    pub fn message_builder(&self) -> &GelfMessageBuilder {
        &self.builder
    }
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl GelfSink<GelfTransport> {
    /// Build the sink `config` describes; transport problems are reported here, not per message.
    pub fn from_config(config: &Config) -> Result<GelfSink<GelfTransport>> {
        Ok(GelfSink::new(
            config.message_builder()?,
            GelfTransport::from_config(config)?,
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          struct Layer                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that will send [`Event`]s to
/// Graylog as GELF messages.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct Layer<S, F: EventFormatter<S>, T: Transport>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    event_formatter: F,
    sink: GelfSink<T>,
    // I need the Subscriber implementation type as a type parameter to transmit it to the
    // EventFormatter trait. 👇 gets the compiler to shut-up about unused type parameters.
    subscriber_type: std::marker::PhantomData<S>,
}

/// A [`Layer`] implementation with the following characteristics:
///
/// - Uses the default formatter for mapping from Tracing events to records
/// - Builds GELF messages with the default settings
/// - Sends the resulting messages over UDP
///
/// May be used with any [`tracing_subscriber::Subscriber`] implementation that supports
/// [`LookupSpan`].
///
/// [`tracing_subscriber::Subscriber`]: https://docs.rs/tracing/latest/tracing/trait.Subscriber.html
/// [`LookupSpan`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/registry/trait.LookupSpan.html
impl<S> Layer<S, DefaultEventFormatter, UdpTransport>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// Attempt to construct a [`Layer`] that will send GELF messages via UDP to port 12201 on
    /// localhost
    pub fn try_default() -> Result<Self> {
        Ok(Layer::with_transport(UdpTransport::local()?))
    }
}

/// A [`Layer`] whose transport is chosen by a [`Config`].
impl<S> Layer<S, DefaultEventFormatter, GelfTransport>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// Construct a [`Layer`] as described by `config`. An unusable configuration fails here,
    /// never later.
    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Layer::new(
            GelfSink::from_config(&config)?,
            DefaultEventFormatter::default(),
        ))
    }
}

/// Customize a [`Layer`] implementation with the default event formatter & message builder, but
/// with a custom [`Transport`] implementation.
impl<S, T: Transport> Layer<S, DefaultEventFormatter, T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// Construct a Layer that will send GELF messages via transport `transport`
    pub fn with_transport(transport: T) -> Self {
        Layer::new(
            GelfSink::with_transport(transport),
            DefaultEventFormatter::default(),
        )
    }
}

impl<S, F: EventFormatter<S>, T: Transport> Layer<S, F, T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// construct Layer with custom inners
    pub fn new(sink: GelfSink<T>, event_formatter: F) -> Self {
        Layer {
            event_formatter,
            sink,
            subscriber_type: std::marker::PhantomData,
        }
    }
    pub fn sink(&self) -> &GelfSink<T> {
        &self.sink
    }
}

/// This is the Big Tuna-- the [`Layer`] implementation.
///
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
impl<S, F, T> tracing_subscriber::layer::Layer<S> for Layer<S, F, T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    F: EventFormatter<S> + 'static,
    T: Transport + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing_core::span::Attributes<'_>,
        id: &tracing_core::span::Id,
        ctx: Context<'_, S>,
    ) {
        self.event_formatter.on_new_span(attrs, id, ctx);
    }

    fn on_record(
        &self,
        id: &tracing_core::span::Id,
        values: &tracing_core::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        self.event_formatter.on_record(id, values, ctx);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // Anything our own transport logs (ureq, say, via `log`) would land right back here.
        let _guard = match EmitGuard::enter() {
            Some(guard) => guard,
            None => return,
        };

        // When the tracing-log feature is enabled, use normalized_metadata() to get
        // file/line info for events that originated from the `log` crate.
        // For native tracing events, normalized_metadata() returns None and we use
        // the event's own metadata.
        // See: https://github.com/tokio-rs/tracing/blob/9978c3663bcd58de14b3cf089ad24cb63d00a922/tracing-subscriber/src/fmt/format/pretty.rs#L182
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        match self.event_formatter.on_event(event, meta, ctx) {
            Ok(Some(record)) => self.sink.send_or_report(&record),
            Ok(None) => (),
            Err(err) => diagnostics::emit_err(&err, "Failed to format a tracing Event"),
        }
    }
}

#[cfg(test)]
mod smoke {

    use super::*;

    use crate::{error::Error, level::LogLevel};

    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::{layer::SubscriberExt, registry::Registry};

    /// Keeps every payload it's asked to send.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<Vec<u8>>>>);

    impl Transport for Capture {
        fn send(&self, buf: &[u8]) -> Result<usize> {
            self.0.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }
    }

    impl Capture {
        fn messages(&self) -> Vec<Value> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|buf| serde_json::from_slice(buf).unwrap())
                .collect()
        }
    }

    /// Always fails, with `reason`.
    struct Unreachable(&'static str);

    impl Transport for Unreachable {
        fn send(&self, _buf: &[u8]) -> Result<usize> {
            Err(Error::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                self.0,
            )))
        }
    }

    /// Collects whatever is written to diagnostics.
    #[derive(Clone, Default)]
    struct Diagnostics(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Diagnostics {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Diagnostics {
        /// Reports whose error mentions `reason`; other tests may be reporting at the same time.
        fn reports(&self, reason: &str) -> Vec<Value> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str::<Value>(line).unwrap())
                .filter(|report| {
                    report["@x"]
                        .as_str()
                        .map_or(false, |x| x.contains(reason))
                })
                .collect()
        }
    }

    #[test]
    fn disk_full() {
        let capture = Capture::default();
        let sink = GelfSink::new(
            GelfMessageBuilder::builder().host("node1").build(),
            capture.clone(),
        );
        let subscriber = Registry::default().with(Layer::new(sink, DefaultEventFormatter::default()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(Host = "node1", "disk full on {}", "node1");
        });

        let messages = capture.messages();
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg["version"], json!("1.1"));
        assert_eq!(msg["host"], json!("node1"));
        assert_eq!(msg["level"], json!(3));
        assert_eq!(msg["_level_name"], json!("Error"));
        assert_eq!(msg["short_message"], json!("disk full on node1"));
        assert_eq!(msg["full_message"], json!("disk full on node1"));
        assert_eq!(msg["_Host"], json!("node1"));
        assert!(msg["timestamp"].as_f64().unwrap() > 1_600_000_000.0);
    }

    #[test]
    fn spans() {
        let capture = Capture::default();
        let formatter = DefaultEventFormatter::builder()
            .with_span_fields(true)
            .build();
        let layer = Layer::new(GelfSink::with_transport(capture.clone()), formatter);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", id = 17, user = "alice");
            let _enter = span.enter();
            tracing::info!(tags = ?["a", "b"], "handled");
        });

        let msg = &capture.messages()[0];
        assert_eq!(msg["_request.id"], json!(17));
        assert_eq!(msg["_request.user"], json!("alice"));
        assert_eq!(msg["_tags"], json!("[\"a\", \"b\"]"));
        assert_eq!(msg["level"], json!(6));
    }

    #[test]
    fn failures_stay_inside() {
        let _lock = diagnostics::test_writer_lock();
        let capture = Diagnostics::default();
        diagnostics::set_writer(capture.clone());

        // The application never sees the failure; diagnostics does
        let subscriber =
            Registry::default().with(Layer::with_transport(Unreachable("layer: nobody home")));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("this goes nowhere");
        });

        GelfSink::with_transport(Unreachable("sink: nobody home"))
            .emit(&LogRecord::new(LogLevel::Warning, "neither does this"));

        diagnostics::reset_writer();

        for reason in ["layer: nobody home", "sink: nobody home"] {
            let reports = capture.reports(reason);
            assert_eq!(reports.len(), 1, "{}", reason);
            assert_eq!(reports[0]["@l"], json!("ERROR"));
            assert_eq!(reports[0]["@mt"], json!("Failed to send a GELF message"));
            assert!(reports[0]["@x"]
                .as_str()
                .unwrap()
                .starts_with("Transport error"));
        }

        let sink = GelfSink::with_transport(Unreachable("try_emit"));
        let record = LogRecord::new(LogLevel::Warning, "this goes nowhere");
        assert!(matches!(sink.try_emit(&record), Err(Error::Transport { .. })));
    }

    #[test]
    fn no_reentry() {
        // A sink already emitting on this thread drops the record rather than recursing
        let capture = Capture::default();
        let sink = GelfSink::with_transport(capture.clone());
        let _guard = EmitGuard::enter();
        sink.emit(&LogRecord::new(LogLevel::Information, "dropped"));
        assert!(capture.messages().is_empty());
    }

    #[test]
    fn too_large_is_dropped() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let encoder = crate::chunk::ChunkEncoder::new(
            crate::chunk::MIN_DATAGRAM_SIZE,
            Arc::new(crate::message_id::RandomIdGenerator),
        )
        .unwrap();
        let sink = GelfSink::with_transport(
            UdpTransport::with_encoder(server.local_addr().unwrap(), encoder).unwrap(),
        );
        match sink.try_emit(&LogRecord::new(LogLevel::Information, "hello")) {
            Err(Error::MessageTooLarge { chunks, .. }) => assert!(chunks > 128),
            _ => panic!("expected MessageTooLarge"),
        }
    }

    #[test]
    fn from_config() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let config = Config::builder()
            .host_name_or_address("127.0.0.1")
            .port(server.local_addr().unwrap().port())
            .host("web-01")
            .facility("smoke")
            .build()
            .unwrap();
        let layer = Layer::from_config(config).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user_id = 5, "Hello, 世界!");
        });

        let mut buf = [0u8; 8192];
        let n = server.recv(&mut buf).unwrap();
        let msg: Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(msg["host"], json!("web-01"));
        assert_eq!(msg["facility"], json!("smoke"));
        assert_eq!(msg["short_message"], json!("Hello, 世界!"));
        assert_eq!(msg["_user_id"], json!(5));
    }

    #[test]
    fn try_default() {
        let layer: Layer<Registry, DefaultEventFormatter, UdpTransport> = Layer::try_default().unwrap();
        assert_eq!(layer.sink().transport().target().port(), 12201);
    }
}

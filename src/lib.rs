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

//! A [`tracing-subscriber`] [`Layer`] implementation for sending [`tracing`] [`Event`]s to
//! [Graylog] in the [GELF] format
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/0.1.35/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [Graylog]: https://graylog.org
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//!
//! # Introduction
//!
//! GELF, the Graylog Extended Log Format, is a flat JSON object: a small fixed envelope
//! (`version`, `host`, `short_message`, `full_message`, `timestamp` & `level`) plus any number of
//! "additional fields" whose names begin with an underscore. Messages travel over UDP (split into
//! "chunks" when they won't fit in one datagram) or are POSTed to an HTTP input.
//!
//! [`tracing`] events, on the other hand, are structured: they carry typed fields & occur inside
//! spans which carry fields of their own. This crate bridges the two:
//!
//! 1. an [`EventFormatter`] turns each [`Event`] into a [`LogRecord`]: a timestamp, a level, the
//!    rendered message & a tree of named properties
//!
//! 2. a [`GelfMessageBuilder`] flattens that tree into additional fields (`Request { UserId: 5 }`
//!    becomes `_Request.UserId = 5`) & adds the envelope
//!
//! 3. a [`Transport`] delivers the serialized message, chunking as needed for UDP
//!
//! [`EventFormatter`]: crate::tracing::EventFormatter
//! [`LogRecord`]: crate::record::LogRecord
//! [`GelfMessageBuilder`]: crate::message::GelfMessageBuilder
//! [`Transport`]: crate::transport::Transport
//!
//! The last two steps are packaged as a [`GelfSink`], which may be used without [`tracing`] at all.
//!
//! [`GelfSink`]: crate::layer::GelfSink
//!
//! # Usage
//!
//! [`gelf-tracing`](crate)'s [`Layer`] comes with sane defaults:
//!
//! ```rust
//! use tracing::info;
//! use gelf_tracing::layer::Layer;
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! // The default configuration is to send GELF messages via UDP to port 12201 on the localhost.
//! let subscriber = Registry::default().with(Layer::try_default().unwrap());
//!
//! info!("Hello, world!");
//! ```
//!
//! Will produce GELF messages that look something like this:
//!
//! ```text
//! {"version":"1.1","host":"localhost","short_message":"Hello, world!","full_message":"Hello, world!","timestamp":1656025855.123456,"level":6,"_level_name":"Information"}
//! ```
//!
//! That said, the transport, the GELF message contents and the means of formatting [`tracing`]
//! [`Event`]s are configurable:
//!
//! ```no_run
//! use tracing::info;
//! use gelf_tracing::{config::{Config, TransportType}, layer::Layer};
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let config = Config::builder()
//!     .host_name_or_address("graylog.domain.io")
//!     .transport_type(TransportType::Http)
//!     .system_host()
//!     .facility("billing")
//!     .build()
//!     .unwrap();
//! let subscriber = Registry::default().with(Layer::from_config(config).unwrap());
//!
//! info!(user_id = 5, "Hello, world!");
//! ```
//!
//! Will POST the message to `http://graylog.domain.io:12201/gelf`, with an additional field
//! `_user_id` of 5.
//!
//! # Failures
//!
//! Logging must never take the application down. Errors encountered while sending are written to
//! the crate's [`diagnostics`] channel (stderr, by default) & otherwise dropped. Nothing is
//! retried.

pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod flatten;
pub mod layer;
pub mod level;
pub mod message;
pub mod message_id;
pub mod naming;
pub mod record;
pub mod tracing;
pub mod transport;

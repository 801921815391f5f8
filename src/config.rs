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

//! Sink configuration.
//!
//! Everything about where & how GELF messages are sent lives in a [`Config`], assembled through
//! [`Config::builder`]. Out-of-range values are refused when the configuration is built, never
//! when a message is sent.
//!
//! ```rust
//! use gelf_tracing::config::{Config, TransportType};
//! let config = Config::builder()
//!     .host_name_or_address("graylog.local")
//!     .transport_type_name("http")
//!     .unwrap()
//!     .facility("billing")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.transport_type(), TransportType::Http);
//! assert_eq!(config.port(), 12201);
//! ```

use crate::{
    chunk::{check_datagram_size, DEFAULT_MAX_DATAGRAM_SIZE},
    error::{Error, Result},
    level::{LogLevel, SyslogLevel},
    message::{system_host_name, GelfMessageBuilder, DEFAULT_SHORT_MESSAGE_MAX_LENGTH},
    message_id::MessageIdGeneratorKind,
    naming::{NoOpPropertyNamingStrategy, PropertyNamingStrategy},
};

use backtrace::Backtrace;

use std::{net::UdpSocket, str::FromStr, sync::Arc, time::Duration};

pub const DEFAULT_HOST_NAME_OR_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 12201;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// How GELF messages reach the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportType {
    #[default]
    Udp,
    Http,
}

impl FromStr for TransportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransportType::Udp),
            "http" => Ok(TransportType::Http),
            _ => Err(Error::UnsupportedTransport {
                name: s.to_owned(),
                back: Backtrace::new(),
            }),
        }
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Udp => write!(f, "udp"),
            TransportType::Http => write!(f, "http"),
        }
    }
}

/// Supplies the HTTP agent the HTTP transport posts through.
pub type HttpClientFactory = Arc<dyn Fn() -> ureq::Agent + Send + Sync>;
/// Supplies the socket the UDP transport sends from.
pub type UdpClientFactory = Arc<dyn Fn() -> std::io::Result<Arc<UdpSocket>> + Send + Sync>;

type LevelMapping = Arc<dyn Fn(&LogLevel) -> SyslogLevel + Send + Sync>;

/// GELF sink configuration; see the module docs.
#[derive(Clone)]
pub struct Config {
    host_name_or_address: String,
    port: u16,
    transport_type: TransportType,
    message_id_generator: MessageIdGeneratorKind,
    max_datagram_size: usize,
    short_message_max_length: usize,
    truncation_suffix: Option<String>,
    facility: Option<String>,
    host: Option<String>,
    property_naming_strategy: Arc<dyn PropertyNamingStrategy>,
    include_message_template: bool,
    map_level: Option<LevelMapping>,
    http_client_factory: Option<HttpClientFactory>,
    udp_client_factory: Option<UdpClientFactory>,
    http_timeout: Duration,
}

impl std::default::Default for Config {
    fn default() -> Self {
        Config {
            host_name_or_address: DEFAULT_HOST_NAME_OR_ADDRESS.to_owned(),
            port: DEFAULT_PORT,
            transport_type: TransportType::default(),
            message_id_generator: MessageIdGeneratorKind::default(),
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            short_message_max_length: DEFAULT_SHORT_MESSAGE_MAX_LENGTH,
            truncation_suffix: None,
            facility: None,
            host: None,
            property_naming_strategy: Arc::new(NoOpPropertyNamingStrategy),
            include_message_template: false,
            map_level: None,
            http_client_factory: None,
            udp_client_factory: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host_name_or_address", &self.host_name_or_address)
            .field("port", &self.port)
            .field("transport_type", &self.transport_type)
            .field("message_id_generator", &self.message_id_generator)
            .field("max_datagram_size", &self.max_datagram_size)
            .field("short_message_max_length", &self.short_message_max_length)
            .field("truncation_suffix", &self.truncation_suffix)
            .field("facility", &self.facility)
            .field("host", &self.host)
            .field("include_message_template", &self.include_message_template)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

pub struct ConfigBuilder {
    imp: Config,
}

impl ConfigBuilder {
    /// The Graylog server to send to.
    pub fn host_name_or_address(mut self, host: impl Into<String>) -> Self {
        self.imp.host_name_or_address = host.into();
        self
    }
    pub fn port(mut self, port: u16) -> Self {
        self.imp.port = port;
        self
    }
    pub fn transport_type(mut self, transport_type: TransportType) -> Self {
        self.imp.transport_type = transport_type;
        self
    }
    /// Select the transport by name ("udp" or "http", in any case).
    pub fn transport_type_name(self, name: &str) -> Result<Self> {
        Ok(self.transport_type(name.parse()?))
    }
    pub fn message_id_generator(mut self, kind: MessageIdGeneratorKind) -> Self {
        self.imp.message_id_generator = kind;
        self
    }
    /// Select the message ID generator by name ("random", "guid" or "counter").
    pub fn message_id_generator_name(self, name: &str) -> Result<Self> {
        Ok(self.message_id_generator(name.parse()?))
    }
    /// The largest datagram the UDP transport sends; between 13 & 65507 bytes.
    pub fn max_datagram_size(mut self, max: usize) -> Self {
        self.imp.max_datagram_size = max;
        self
    }
    pub fn short_message_max_length(mut self, max: usize) -> Self {
        self.imp.short_message_max_length = max;
        self
    }
    pub fn truncation_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.imp.truncation_suffix = Some(suffix.into());
        self
    }
    pub fn facility(mut self, facility: impl Into<String>) -> Self {
        self.imp.facility = Some(facility.into());
        self
    }
    /// The sender identity carried in each message's `host` field.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.imp.host = Some(host.into());
        self
    }
    /// Identify ourselves by this machine's host name.
    pub fn system_host(mut self) -> Self {
        self.imp.host = Some(system_host_name());
        self
    }
    pub fn property_naming_strategy<N>(mut self, naming: N) -> Self
    where
        N: PropertyNamingStrategy + 'static,
    {
        self.imp.property_naming_strategy = Arc::new(naming);
        self
    }
    pub fn include_message_template(mut self, include: bool) -> Self {
        self.imp.include_message_template = include;
        self
    }
    /// Override the host level to syslog severity mapping.
    pub fn map_level<F>(mut self, map_level: F) -> Self
    where
        F: Fn(&LogLevel) -> SyslogLevel + Send + Sync + 'static,
    {
        self.imp.map_level = Some(Arc::new(map_level));
        self
    }
    pub fn http_client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> ureq::Agent + Send + Sync + 'static,
    {
        self.imp.http_client_factory = Some(Arc::new(factory));
        self
    }
    pub fn udp_client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> std::io::Result<Arc<UdpSocket>> + Send + Sync + 'static,
    {
        self.imp.udp_client_factory = Some(Arc::new(factory));
        self
    }
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.imp.http_timeout = timeout;
        self
    }
    pub fn build(self) -> Result<Config> {
        check_datagram_size(self.imp.max_datagram_size)?;
        if self.imp.short_message_max_length == 0 {
            return Err(Error::bad_config(
                "the short message maximum length must be positive",
            ));
        }
        if self.imp.host_name_or_address.trim().is_empty() {
            return Err(Error::bad_config("no GELF server host name or address"));
        }
        Ok(self.imp)
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            imp: Config::default(),
        }
    }
    pub fn host_name_or_address(&self) -> &str {
        &self.host_name_or_address
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }
    pub fn message_id_generator(&self) -> MessageIdGeneratorKind {
        self.message_id_generator
    }
    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }
    pub fn short_message_max_length(&self) -> usize {
        self.short_message_max_length
    }
    pub fn facility(&self) -> Option<&str> {
        self.facility.as_deref()
    }
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
    pub fn http_client_factory(&self) -> Option<&HttpClientFactory> {
        self.http_client_factory.as_ref()
    }
    pub fn udp_client_factory(&self) -> Option<&UdpClientFactory> {
        self.udp_client_factory.as_ref()
    }
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
    /// The [`GelfMessageBuilder`] this configuration describes.
    pub fn message_builder(&self) -> Result<GelfMessageBuilder> {
        let mut builder = GelfMessageBuilder::builder()
            .short_message_max_length(self.short_message_max_length)?
            .truncation_suffix(self.truncation_suffix.clone())
            .facility(self.facility.clone())
            .include_message_template(self.include_message_template)
            .naming_strategy(self.property_naming_strategy.clone());
        if let Some(host) = &self.host {
            builder = builder.host(host.clone());
        }
        if let Some(map_level) = &self.map_level {
            let map_level = map_level.clone();
            builder = builder.map_level(move |level| map_level(level));
        }
        Ok(builder.build())
    }
}

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

//! The GELF transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, as well
//! as the UDP & HTTP implementations.
//!
//! # Examples
//!
//! To send GELF messages over UDP to a Graylog input listening on port 12201 (the default) on
//! localhost:
//!
//! ```rust
//! use gelf_tracing::transport::UdpTransport;
//! let transpo = UdpTransport::local().unwrap();
//! ```
//!
//! On a non-standard port on another host:
//!
//! ```rust
//! use gelf_tracing::transport::UdpTransport;
//! let transpo = UdpTransport::new("some-host.domain.io:5514");
//! assert!(transpo.is_err()); // no such host, after all
//! ```
//!
//! To POST messages to a Graylog HTTP input:
//!
//! ```rust
//! use gelf_tracing::transport::HttpTransport;
//! use std::time::Duration;
//! let transpo = HttpTransport::new("graylog.domain.io", 12201, Duration::from_secs(5));
//! assert_eq!(transpo.url(), "http://graylog.domain.io:12201/gelf");
//! ```
//!
//! # Resource ownership
//!
//! A transport that creates its own socket or HTTP agent owns it, and it's closed when the
//! transport is dropped. One built from a [`Config`] carrying a client factory holds only a
//! shared handle to whatever the factory returns; dropping the transport releases just that
//! handle.

use crate::{
    chunk::{ChunkEncoder, DEFAULT_MAX_DATAGRAM_SIZE},
    config::{Config, TransportType, DEFAULT_PORT},
    error::{Error, Result},
    message_id::RandomIdGenerator,
};

use backtrace::Backtrace;
use bytes::Bytes;

use std::{
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::Arc,
    time::Duration,
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
pub trait Transport {
    /// Deliver one serialized GELF message; return the number of bytes put on the wire.
    ///
    /// Implementations frame `buf` as their protocol requires (chunking, for UDP). They never
    /// retry.
    fn send(&self, buf: &[u8]) -> Result<usize>;
}

/// Sending GELF messages via UDP datagrams, chunking those that don't fit in one.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    encoder: ChunkEncoder,
}

/// Prefer an IPv4 address when the name has both.
fn resolve<A: ToSocketAddrs>(addr: A) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs().map_err(Error::transport)?.collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            Error::transport(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "the GELF host name resolved to no addresses",
            ))
        })
}

fn bind_for(target: &SocketAddr) -> Result<UdpSocket> {
    // Bind to any available port...
    let local = if target.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    UdpSocket::bind(local).map_err(Error::transport)
}

impl UdpTransport {
    /// Construct a [`Transport`] implementation via UDP at `addr`, chunking at the default
    /// datagram size with random message IDs.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<UdpTransport> {
        UdpTransport::with_encoder(
            addr,
            ChunkEncoder::new(DEFAULT_MAX_DATAGRAM_SIZE, Arc::new(RandomIdGenerator))?,
        )
    }
    /// Construct a [`Transport`] implementation via UDP at `addr` using `encoder`.
    pub fn with_encoder<A: ToSocketAddrs>(addr: A, encoder: ChunkEncoder) -> Result<UdpTransport> {
        let target = resolve(addr)?;
        let socket = Arc::new(bind_for(&target)?);
        Ok(UdpTransport {
            socket,
            target,
            encoder,
        })
    }
    /// Send datagrams to `addr` through a socket someone else owns.
    pub fn with_socket<A: ToSocketAddrs>(
        socket: Arc<UdpSocket>,
        addr: A,
        encoder: ChunkEncoder,
    ) -> Result<UdpTransport> {
        Ok(UdpTransport {
            socket,
            target: resolve(addr)?,
            encoder,
        })
    }
    /// Construct a [`Transport`] implementation via UDP at localhost:12201
    pub fn local() -> Result<UdpTransport> {
        UdpTransport::new(("localhost", DEFAULT_PORT))
    }
    pub fn from_config(config: &Config) -> Result<UdpTransport> {
        let encoder = ChunkEncoder::new(
            config.max_datagram_size(),
            config.message_id_generator().build(),
        )?;
        let addr = (config.host_name_or_address(), config.port());
        match config.udp_client_factory() {
            Some(factory) => {
                let socket = factory().map_err(Error::transport)?;
                UdpTransport::with_socket(socket, addr, encoder)
            }
            None => UdpTransport::with_encoder(addr, encoder),
        }
    }
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        let datagrams = self.encoder.to_chunks(Bytes::copy_from_slice(buf))?;
        // Chunks go out in sequence order, one datagram apiece.
        let mut cb_sent = 0;
        for datagram in datagrams.encode() {
            cb_sent += self
                .socket
                .send_to(&datagram, self.target)
                .map_err(Error::transport)?;
        }
        Ok(cb_sent)
    }
}

/// Sending GELF messages via HTTP POST to a Graylog GELF HTTP input.
#[derive(Debug)]
pub struct HttpTransport {
    agent: ureq::Agent,
    url: String,
}

/// `{host}:{port}/gelf`; `host` may carry its own scheme, defaulting to http.
fn gelf_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}/gelf", host, port)
    } else {
        format!("http://{}:{}/gelf", host, port)
    }
}

impl HttpTransport {
    /// Construct a [`Transport`] implementation POSTing to `host`:`port`, with an agent of its own.
    pub fn new(host: &str, port: u16, timeout: Duration) -> HttpTransport {
        HttpTransport::with_agent(ureq::AgentBuilder::new().timeout(timeout).build(), host, port)
    }
    /// POST through `agent`, which may be shared with others.
    pub fn with_agent(agent: ureq::Agent, host: &str, port: u16) -> HttpTransport {
        HttpTransport {
            agent,
            url: gelf_url(host, port),
        }
    }
    pub fn from_config(config: &Config) -> HttpTransport {
        match config.http_client_factory() {
            Some(factory) => {
                HttpTransport::with_agent(factory(), config.host_name_or_address(), config.port())
            }
            None => HttpTransport::new(
                config.host_name_or_address(),
                config.port(),
                config.http_timeout(),
            ),
        }
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        match self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json; charset=utf-8")
            .send_bytes(buf)
        {
            Ok(response) if (200..300).contains(&response.status()) => Ok(buf.len()),
            Ok(response) => Err(Error::HttpStatus {
                status: response.status(),
                back: Backtrace::new(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(Error::HttpStatus {
                status,
                back: Backtrace::new(),
            }),
            Err(ureq::Error::Transport(err)) => Err(Error::transport(err)),
        }
    }
}

/// The transport named in a [`Config`], chosen once at construction.
#[derive(Debug)]
pub enum GelfTransport {
    Udp(UdpTransport),
    Http(HttpTransport),
}

impl GelfTransport {
    pub fn from_config(config: &Config) -> Result<GelfTransport> {
        Ok(match config.transport_type() {
            TransportType::Udp => GelfTransport::Udp(UdpTransport::from_config(config)?),
            TransportType::Http => GelfTransport::Http(HttpTransport::from_config(config)),
        })
    }
}

impl Transport for GelfTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        match self {
            GelfTransport::Udp(udp) => udp.send(buf),
            GelfTransport::Http(http) => http.send(buf),
        }
    }
}

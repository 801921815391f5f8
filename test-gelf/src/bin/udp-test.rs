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

//! Send GELF messages over UDP to a listener on the local host & check what arrives.

use gelf_tracing::{
    chunk::Chunk,
    config::{Config, TransportType},
    layer::Layer,
    message_id::MessageIdGeneratorKind,
};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

use std::{collections::BTreeMap, net::UdpSocket, time::Duration};

/// Read one GELF message, reassembling chunks if need be.
fn receive(socket: &UdpSocket) -> Value {
    let mut buf = [0u8; 65536];
    let mut pieces = BTreeMap::new();
    loop {
        let n = socket.recv(&mut buf).unwrap();
        match Chunk::decode(&buf[..n]) {
            None => return serde_json::from_slice(&buf[..n]).unwrap(),
            Some(chunk) => {
                let total = chunk.total as usize;
                pieces.insert(chunk.sequence, chunk.payload);
                if pieces.len() == total {
                    let payload: Vec<u8> = pieces.values().flat_map(|p| p.iter().copied()).collect();
                    return serde_json::from_slice(&payload).unwrap();
                }
            }
        }
    }
}

pub fn main() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let config = Config::builder()
        .host_name_or_address("127.0.0.1")
        .port(server.local_addr().unwrap().port())
        .transport_type(TransportType::Udp)
        .message_id_generator(MessageIdGeneratorKind::Counter)
        .max_datagram_size(1024)
        .host("udp-test")
        .build()
        .unwrap();

    // Setup the real subscriber...
    let subscriber = Registry::default().with(Layer::from_config(config).unwrap());
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    trace!("Hello, 世界!");
    debug!("Hello, 世界!");
    info!("Hello, 世界!");
    warn!("Hello, 世界!");
    error!("Hello, 世界!");

    for expected in [7, 7, 6, 4, 3] {
        let msg = receive(&server);
        assert_eq!(msg["host"], "udp-test");
        assert_eq!(msg["short_message"], "Hello, 世界!");
        assert_eq!(msg["level"], expected);
    }

    // Big enough to need chunking
    let big = "x".repeat(5000);
    info!(padding = big.as_str(), "a large message");
    let msg = receive(&server);
    assert_eq!(msg["short_message"], "a large message");
    assert_eq!(msg["_padding"].as_str().unwrap().len(), 5000);

    println!("udp-test: OK");
}

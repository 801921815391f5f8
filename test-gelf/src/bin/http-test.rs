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

//! POST GELF messages to a minimal HTTP listener on the local host & check what arrives.

use gelf_tracing::{
    config::{Config, TransportType},
    layer::Layer,
};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    sync::mpsc,
    thread,
    time::Duration,
};

/// Accept `count` requests, answering each with 202 & passing the path & body back.
fn serve(listener: TcpListener, count: usize) -> mpsc::Receiver<(String, Value)> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..count {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let path = request_line.split(' ').nth(1).unwrap_or("").to_string();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim().is_empty() {
                    break;
                }
                if let Some((key, value)) = line.split_once(':') {
                    if key.trim().eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            stream
                .write_all(b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            tx.send((path, serde_json::from_slice(&body).unwrap())).unwrap();
        }
    });
    rx
}

pub fn main() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let rx = serve(listener, 2);

    let config = Config::builder()
        .host_name_or_address("127.0.0.1")
        .port(port)
        .transport_type(TransportType::Http)
        .host("http-test")
        .facility("smoke")
        .build()
        .unwrap();

    // Setup the real subscriber...
    let subscriber = Registry::default().with(Layer::from_config(config).unwrap());
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    info!(user_id = 5, "Hello, 世界!");
    error!(id = "abc", "disk full on {}", "node1");

    let (path, msg) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(path, "/gelf");
    assert_eq!(msg["host"], "http-test");
    assert_eq!(msg["facility"], "smoke");
    assert_eq!(msg["short_message"], "Hello, 世界!");
    assert_eq!(msg["_user_id"], 5);

    let (_, msg) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(msg["level"], 3);
    assert_eq!(msg["short_message"], "disk full on node1");
    assert_eq!(msg["_id_"], "abc");

    println!("http-test: OK");
}

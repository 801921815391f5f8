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

//! GELF chunk message IDs.
//!
//! Every chunk of a chunked GELF message carries the same eight-byte message ID; the Graylog
//! input reassembles chunks by that ID. Two messages in flight with the same ID get mixed up, so
//! generators must not repeat themselves over short intervals, even when called from many threads.

use crate::error::{Error, Result};

use backtrace::Backtrace;

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// The eight bytes shared by all chunks of one message.
pub type MessageId = [u8; 8];

/// Produce message IDs. Implementations must be safe to call concurrently.
pub trait MessageIdGenerator: Send + Sync {
    fn next_id(&self) -> MessageId;
}

/// Eight bytes from the thread-local CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdGenerator;

impl MessageIdGenerator for RandomIdGenerator {
    fn next_id(&self) -> MessageId {
        rand::random::<[u8; 8]>()
    }
}

/// A fresh v4 UUID, folded in half.
#[derive(Clone, Copy, Debug, Default)]
pub struct GuidIdGenerator;

impl MessageIdGenerator for GuidIdGenerator {
    fn next_id(&self) -> MessageId {
        let uuid = uuid::Uuid::new_v4();
        let bytes = uuid.as_bytes();
        let mut id = [0u8; 8];
        for (i, b) in id.iter_mut().enumerate() {
            *b = bytes[i] ^ bytes[i + 8];
        }
        id
    }
}

/// A process-wide counter, seeded once from the clock & the RNG so that restarts (and other
/// machines) start somewhere else.
#[derive(Debug)]
pub struct CounterIdGenerator {
    next: AtomicU64,
}

impl CounterIdGenerator {
    pub fn new() -> CounterIdGenerator {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        CounterIdGenerator::starting_at(nanos ^ rand::random::<u64>())
    }
    pub fn starting_at(seed: u64) -> CounterIdGenerator {
        CounterIdGenerator {
            next: AtomicU64::new(seed),
        }
    }
}

impl std::default::Default for CounterIdGenerator {
    fn default() -> Self {
        CounterIdGenerator::new()
    }
}

impl MessageIdGenerator for CounterIdGenerator {
    fn next_id(&self) -> MessageId {
        self.next.fetch_add(1, Ordering::Relaxed).to_be_bytes()
    }
}

/// The message ID strategies one can select by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageIdGeneratorKind {
    #[default]
    Random,
    Guid,
    Counter,
}

impl MessageIdGeneratorKind {
    pub fn build(self) -> Arc<dyn MessageIdGenerator> {
        match self {
            MessageIdGeneratorKind::Random => Arc::new(RandomIdGenerator),
            MessageIdGeneratorKind::Guid => Arc::new(GuidIdGenerator),
            MessageIdGeneratorKind::Counter => Arc::new(CounterIdGenerator::new()),
        }
    }
}

impl FromStr for MessageIdGeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(MessageIdGeneratorKind::Random),
            "guid" | "uuid" => Ok(MessageIdGeneratorKind::Guid),
            "counter" | "timestamp" => Ok(MessageIdGeneratorKind::Counter),
            _ => Err(Error::UnsupportedIdGenerator {
                name: s.to_owned(),
                back: Backtrace::new(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::collections::HashSet;

    fn distinct(gen: &dyn MessageIdGenerator, n: usize) -> bool {
        let ids: HashSet<MessageId> = (0..n).map(|_| gen.next_id()).collect();
        ids.len() == n
    }

    #[test]
    fn no_repeats() {
        assert!(distinct(&RandomIdGenerator, 10_000));
        assert!(distinct(&GuidIdGenerator, 10_000));
        assert!(distinct(&CounterIdGenerator::new(), 10_000));
    }

    #[test]
    fn counter() {
        let gen = CounterIdGenerator::starting_at(0x0102030405060708);
        assert_eq!(gen.next_id(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(gen.next_id(), [1, 2, 3, 4, 5, 6, 7, 9]);

        let gen = CounterIdGenerator::starting_at(u64::MAX);
        assert_eq!(gen.next_id(), [0xff; 8]);
        assert_eq!(gen.next_id(), [0; 8]);
    }

    #[test]
    fn concurrent_counter() {
        let gen = Arc::new(CounterIdGenerator::starting_at(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..1_000).map(|_| gen.next_id()).collect::<Vec<_>>())
            })
            .collect();
        let ids: HashSet<MessageId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 8_000);
    }

    #[test]
    fn from_str() {
        assert_eq!(
            "Random".parse::<MessageIdGeneratorKind>().unwrap(),
            MessageIdGeneratorKind::Random
        );
        assert_eq!(
            "guid".parse::<MessageIdGeneratorKind>().unwrap(),
            MessageIdGeneratorKind::Guid
        );
        assert_eq!(
            "COUNTER".parse::<MessageIdGeneratorKind>().unwrap(),
            MessageIdGeneratorKind::Counter
        );
        assert!("md5".parse::<MessageIdGeneratorKind>().is_err());
        let _ = MessageIdGeneratorKind::default().build().next_id();
    }
}

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

//! [gelf-tracing](crate) errors

use backtrace::Backtrace;

/// [gelf-tracing](crate) error type
///
/// [gelf-tracing](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of a
/// straightforward enumeration with a few match arms chosen on the basis what the caller will need
/// to respond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// A configuration value was out of range
    BadConfig {
        reason: String,
        back: Backtrace,
    },
    /// The payload would need more chunks than GELF allows; it must be dropped, not truncated
    MessageTooLarge {
        size: usize,
        chunks: usize,
        back: Backtrace,
    },
    /// The Graylog HTTP input answered with a non-success status
    HttpStatus {
        status: u16,
        back: Backtrace,
    },
    /// Failed to serialize a GELF message to JSON
    Serialize {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// General transport layer error
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// A message ID generator name we don't know
    UnsupportedIdGenerator {
        name: String,
        back: Backtrace,
    },
    /// A transport name we don't know
    UnsupportedTransport {
        name: String,
        back: Backtrace,
    },
}

impl Error {
    /// Build a [`Error::Transport`] from any error; handy in `map_err`.
    pub fn transport<E>(err: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }

    pub fn bad_config(reason: impl Into<String>) -> Error {
        Error::BadConfig {
            reason: reason.into(),
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadConfig { reason, .. } => write!(f, "Bad configuration: {}", reason),
            Error::MessageTooLarge { size, chunks, .. } => write!(
                f,
                "A GELF message of {} bytes would need {} chunks; at most {} are allowed",
                size,
                chunks,
                crate::chunk::MAX_CHUNKS
            ),
            Error::HttpStatus { status, .. } => write!(
                f,
                "Unable to send the GELF message via HTTP: the server answered {}",
                status
            ),
            Error::Serialize { source, .. } => {
                write!(f, "While serializing a GELF message, got {}", source)
            }
            Error::Transport { source, .. } => write!(f, "Transport error: {}", source),
            Error::UnsupportedIdGenerator { name, .. } => {
                write!(f, "Unsupported message ID generator '{}'", name)
            }
            Error::UnsupportedTransport { name, .. } => {
                write!(f, "Unsupported transport type '{}'", name)
            }
            _ => write!(f, "Other gelf-tracing error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadConfig { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::MessageTooLarge { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::HttpStatus { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Serialize { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Transport { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "gelf-tracing error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    #[allow(unreachable_patterns)]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serialize { source, .. } | Error::Transport { source, .. } => {
                let source: &(dyn std::error::Error + 'static) = &**source;
                Some(source)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let err = Error::MessageTooLarge {
            size: 2_000_000,
            chunks: 245,
            back: Backtrace::new(),
        };
        assert_eq!(
            format!("{}", err),
            "A GELF message of 2000000 bytes would need 245 chunks; at most 128 are allowed"
        );

        let err = Error::transport(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(format!("{}", err), "Transport error: refused");
        assert!(std::error::Error::source(&err).is_some());
    }
}

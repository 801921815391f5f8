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

//! Severity definitions & the mapping between them.
//!
//! GELF borrows its `level` field from syslog: an integer in 0..=7 whose meaning is given by RFC
//! [5424]. [`SyslogLevel`] replicates the names used in `<syslog.h>`. [`LogLevel`] is the ordered
//! enumeration our callers think in; [`default_level_mapping`] takes one to the other.
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424

type StdResult<T, E> = std::result::Result<T, E>;

/// RFC [5424] defines eight severity levels for messages. The enumeration values duplicate the
/// constants documented as per the `syslog()` manual [page] & defined in `<syslog.h>`, which is
/// exactly what a GELF `level` carries.
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyslogLevel {
    /// system is unusable
    LOG_EMERG = 0,
    /// action must be take immediately
    LOG_ALERT = 1,
    /// critical conditions
    LOG_CRIT = 2,
    /// error conditions
    LOG_ERR = 3,
    /// warning conditions
    LOG_WARNING = 4,
    /// normal, but significant condition
    LOG_NOTICE = 5,
    /// informational message
    LOG_INFO = 6,
    /// debug-level message
    LOG_DEBUG = 7,
}

impl SyslogLevel {
    /// The numeric code that goes into the GELF `level` field.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl std::default::Default for SyslogLevel {
    fn default() -> Self {
        SyslogLevel::LOG_INFO
    }
}

impl std::fmt::Display for SyslogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                SyslogLevel::LOG_EMERG => "LOG_EMERG",
                SyslogLevel::LOG_ALERT => "LOG_ALERT",
                SyslogLevel::LOG_CRIT => "LOG_CRIT",
                SyslogLevel::LOG_ERR => "LOG_ERR",
                SyslogLevel::LOG_WARNING => "LOG_WARNING",
                SyslogLevel::LOG_NOTICE => "LOG_NOTICE",
                SyslogLevel::LOG_INFO => "LOG_INFO",
                SyslogLevel::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

/// The severity of a [`LogRecord`](crate::record::LogRecord), ordered from least to most severe.
///
/// This is a little richer than [`tracing::Level`]: a record handed directly to a
/// [`GelfSink`](crate::layer::GelfSink) may be `Fatal`, which has no `tracing` counterpart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                LogLevel::Verbose => "Verbose",
                LogLevel::Debug => "Debug",
                LogLevel::Information => "Information",
                LogLevel::Warning => "Warning",
                LogLevel::Error => "Error",
                LogLevel::Fatal => "Fatal",
            }
        )
    }
}

impl std::convert::From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Verbose,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// Map a [`LogLevel`] to the syslog severity GELF expects.
///
/// Every host level has a severity; `Fatal`, which syslog has no exact counterpart for, is sent as
/// [`SyslogLevel::LOG_CRIT`]. Callers with levels of their own that have no obvious severity should
/// map them to [`SyslogLevel::default`], [`SyslogLevel::LOG_INFO`].
pub fn default_level_mapping(level: &LogLevel) -> SyslogLevel {
    match level {
        LogLevel::Verbose | LogLevel::Debug => SyslogLevel::LOG_DEBUG,
        LogLevel::Information => SyslogLevel::LOG_INFO,
        LogLevel::Warning => SyslogLevel::LOG_WARNING,
        LogLevel::Error => SyslogLevel::LOG_ERR,
        LogLevel::Fatal => SyslogLevel::LOG_CRIT,
    }
}

#[cfg(test)]
mod level_tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(LogLevel::Verbose, 7)]
    #[case(LogLevel::Debug, 7)]
    #[case(LogLevel::Information, 6)]
    #[case(LogLevel::Warning, 4)]
    #[case(LogLevel::Error, 3)]
    #[case(LogLevel::Fatal, 2)]
    fn maps_to_syslog(#[case] level: LogLevel, #[case] code: u8) {
        assert_eq!(default_level_mapping(&level).code(), code);
    }

    #[test]
    fn default_severity() {
        assert_eq!(SyslogLevel::default(), SyslogLevel::LOG_INFO);
        assert_eq!(SyslogLevel::default().code(), 6);
    }

    #[test]
    fn names() {
        assert_eq!(format!("{}", LogLevel::Information), "Information");
        assert_eq!(format!("{}", SyslogLevel::LOG_ERR), "LOG_ERR");
        assert_eq!(LogLevel::from(&tracing::Level::WARN), LogLevel::Warning);
        assert!(LogLevel::Verbose < LogLevel::Fatal);
    }
}

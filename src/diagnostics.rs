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

//! Internal self-logging.
//!
//! A logging sink can't very well report its own failures through the logging pipeline it's part
//! of, and it mustn't return them to the application either. Instead, failures are written here:
//! one compact JSON object per line (`@t`, `@l`, `@mt` & `@x`), to stderr unless redirected with
//! [`set_writer`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use std::{
    cell::Cell,
    fmt::Display,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

static ENABLED: AtomicBool = AtomicBool::new(true);
static WRITER: Mutex<Option<Box<dyn Write + Send>>> = Mutex::new(None);

thread_local! {
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

#[derive(Serialize)]
struct DiagnosticEvent<'a> {
    #[serde(rename = "@t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "@l")]
    level: &'static str,
    #[serde(rename = "@mt")]
    message_template: &'a str,
    #[serde(rename = "@x", skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Report `error`, described by `message_template`.
pub fn emit_err(error: &impl Display, message_template: &str) {
    let err_str = format!("{}", error);
    write_event(DiagnosticEvent {
        timestamp: Utc::now(),
        level: "ERROR",
        message_template,
        error: Some(&err_str),
    });
}

/// Report something that isn't an error.
pub fn emit(level: &'static str, message_template: &str) {
    write_event(DiagnosticEvent {
        timestamp: Utc::now(),
        level,
        message_template,
        error: None,
    });
}

fn write_event(evt: DiagnosticEvent<'_>) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let json = match serde_json::to_string(&evt) {
        Ok(json) => json,
        Err(_) => return,
    };
    // A poisoned lock just means another thread panicked mid-write; carry on.
    let mut guard = match WRITER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    // Nowhere left to report a failure to write a diagnostic.
    let _ = match guard.as_mut() {
        Some(writer) => writeln!(writer, "{}", json).and_then(|_| writer.flush()),
        None => writeln!(std::io::stderr(), "{}", json),
    };
}

/// Send diagnostics to `writer` rather than stderr.
pub fn set_writer<W: Write + Send + 'static>(writer: W) {
    let mut guard = match WRITER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(Box::new(writer));
}

/// Send diagnostics to stderr once more.
pub fn reset_writer() {
    let mut guard = match WRITER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
}

/// Silence diagnostics altogether.
pub fn disable() {
    ENABLED.store(false, Ordering::Relaxed);
}

pub fn enable() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Marks the current thread as busy emitting a GELF message; dropping it clears the mark.
#[derive(Debug)]
pub struct EmitGuard {
    _priv: (),
}

impl EmitGuard {
    /// `None` if this thread is already emitting (i.e. the sink has somehow been re-entered).
    pub fn enter() -> Option<EmitGuard> {
        EMITTING.with(|emitting| {
            if emitting.replace(true) {
                None
            } else {
                Some(EmitGuard { _priv: () })
            }
        })
    }
}

impl Drop for EmitGuard {
    fn drop(&mut self) {
        EMITTING.with(|emitting| emitting.set(false));
    }
}

/// Held by tests that redirect or silence diagnostics, so they don't trample one another.
#[cfg(test)]
pub(crate) fn test_writer_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    match LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

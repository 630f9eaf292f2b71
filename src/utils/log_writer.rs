// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Log output that cooperates with an active progress bar
//!
//! While a bar is registered, each log line is written with the bar
//! suspended so it is redrawn below the line instead of being torn.

use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::Mutex;

static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR.lock().ok().and_then(|bar| bar.clone())
}

fn set_active_bar(bar: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE_BAR.lock() {
        *slot = bar;
    }
}

/// Keeps log output routed around `bar` until dropped
#[must_use = "logs stop going around the bar once the guard is dropped"]
pub struct LogRouting {
    _private: (),
}

impl Drop for LogRouting {
    fn drop(&mut self) {
        set_active_bar(None);
    }
}

/// Route log output around `bar` for the lifetime of the returned guard
pub fn route_logs_around(bar: &ProgressBar) -> LogRouting {
    set_active_bar(Some(bar.clone()));
    LogRouting { _private: () }
}

/// Stderr writer for the tracing subscriber
pub struct LogWriter;

/// `MakeWriter` for `tracing_subscriber::fmt::layer().with_writer(..)`
pub fn log_writer() -> LogWriter {
    LogWriter
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_bar() {
            Some(bar) => bar.suspend(|| io::stderr().write_all(buf)).map(|_| buf.len()),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_follows_guard_lifetime() {
        let bar = ProgressBar::hidden();
        {
            let _routing = route_logs_around(&bar);
            assert!(active_bar().is_some());

            let line = b"INFO T1__N1 gridss: running\n";
            assert_eq!(log_writer().write(line).unwrap(), line.len());
        }
        assert!(active_bar().is_none());
        assert_eq!(log_writer().write(b"done\n").unwrap(), 5);
    }
}

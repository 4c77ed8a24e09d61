//! Diagnostic trace sink.
//!
//! The transport reports every request and response it moves, and the reason
//! for an idle close, through a [`TraceSink`]. [`Silent`] is the default and
//! discards everything, so the exchange path never branches on whether a
//! logger is configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rtutcp::{LogSink, TransportConfig};
//!
//! let config = TransportConfig::default().with_trace(Arc::new(LogSink::new("tcp: ")));
//! ```

use std::fmt;

/// Receiver of trace lines.
pub trait TraceSink: Send + Sync {
    /// Records one trace line.
    fn trace(&self, args: fmt::Arguments<'_>);
}

/// Sink that discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl TraceSink for Silent {
    #[inline]
    fn trace(&self, _args: fmt::Arguments<'_>) {}
}

/// Sink that forwards lines to the `log` facade at debug level.
#[derive(Debug, Clone)]
pub struct LogSink {
    prefix: String,
}

impl LogSink {
    /// Creates a sink that prepends `prefix` to every line.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the line prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("")
    }
}

impl TraceSink for LogSink {
    fn trace(&self, args: fmt::Arguments<'_>) {
        log::debug!(target: "rtutcp::trace", "{}{}", self.prefix, args);
    }
}

/// Formats bytes as lowercase hex pairs separated by single spaces
/// (`01 03 00 00`).
#[derive(Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Sink that keeps every line, for assertions in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl Recorder {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TraceSink for Recorder {
    fn trace(&self, args: fmt::Arguments<'_>) {
        self.lines.lock().unwrap().push(args.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(HexDump(&[0x01, 0x03, 0x00, 0xab]).to_string(), "01 03 00 ab");
        assert_eq!(HexDump(&[]).to_string(), "");
        assert_eq!(format!("{:?}", HexDump(&[0xff])), "ff");
    }

    #[test]
    fn test_recorder() {
        let sink = Recorder::default();
        sink.trace(format_args!("modbus: sending {}", HexDump(&[0x11, 0x22])));
        assert_eq!(sink.lines(), vec!["modbus: sending 11 22".to_string()]);
    }

    #[test]
    fn test_silent_and_log_sink_accept_lines() {
        Silent.trace(format_args!("dropped"));
        let sink = LogSink::new("tcp: ");
        assert_eq!(sink.prefix(), "tcp: ");
        sink.trace(format_args!("no logger installed"));
    }
}

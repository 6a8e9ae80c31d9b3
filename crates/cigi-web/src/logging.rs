#![forbid(unsafe_code)]

//! Console logging for the overlay.
//!
//! Every formatted `tracing` event becomes one or more lines prefixed with
//! [`LOG_PREFIX`], handed to a [`LineSink`]. In the browser the sink is
//! `console.log`; natively it is stderr.

use std::io;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Prefix on every console line.
pub const LOG_PREFIX: &str = "[CIGI Overlay]";

/// Destination for finished log lines.
pub trait LineSink: Clone + Send + Sync + 'static {
    fn write_line(&self, line: &str);
}

/// Writes to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LineSink for StderrSink {
    fn write_line(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Buffers one formatted event and emits it line by line on flush or drop.
#[derive(Debug)]
pub struct PrefixedLineWriter<S: LineSink> {
    sink: S,
    buf: Vec<u8>,
}

impl<S: LineSink> PrefixedLineWriter<S> {
    fn emit_complete_lines(&mut self) {
        while let Some(end) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            self.emit(&line[..end]);
        }
    }

    fn emit(&self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches('\r');
        if !text.is_empty() {
            self.sink.write_line(&format!("{LOG_PREFIX} {text}"));
        }
    }
}

impl<S: LineSink> io::Write for PrefixedLineWriter<S> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        self.emit_complete_lines();
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_complete_lines();
        Ok(())
    }
}

impl<S: LineSink> Drop for PrefixedLineWriter<S> {
    fn drop(&mut self) {
        self.emit_complete_lines();
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            self.emit(&rest);
        }
    }
}

/// [`MakeWriter`] producing a fresh [`PrefixedLineWriter`] per event.
#[derive(Debug, Clone)]
pub struct ConsoleMakeWriter<S: LineSink> {
    sink: S,
}

impl<S: LineSink> ConsoleMakeWriter<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<'a, S: LineSink> MakeWriter<'a> for ConsoleMakeWriter<S> {
    type Writer = PrefixedLineWriter<S>;

    fn make_writer(&'a self) -> Self::Writer {
        PrefixedLineWriter {
            sink: self.sink.clone(),
            buf: Vec::new(),
        }
    }
}

/// Build the overlay's fmt subscriber: no timestamps, no ANSI, no targets.
pub fn subscriber<S: LineSink>(
    sink: S,
    max_level: Level,
) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter::new(sink))
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_max_level(max_level)
        .finish()
}

/// Install the subscriber globally. Returns `false` if one was already set.
pub fn init<S: LineSink>(sink: S, max_level: Level) -> bool {
    tracing::subscriber::set_global_default(subscriber(sink, max_level)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Lines(Arc<Mutex<Vec<String>>>);

    impl LineSink for Lines {
        fn write_line(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_owned());
        }
    }

    impl Lines {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    #[test]
    fn writer_prefixes_each_line() {
        let lines = Lines::default();
        let make = ConsoleMakeWriter::new(lines.clone());
        {
            let mut writer = make.make_writer();
            writer.write_all(b"first\nsecond\n").unwrap();
        }
        assert_eq!(
            lines.take(),
            vec!["[CIGI Overlay] first".to_owned(), "[CIGI Overlay] second".to_owned()]
        );
    }

    #[test]
    fn partial_line_is_emitted_on_drop() {
        let lines = Lines::default();
        let make = ConsoleMakeWriter::new(lines.clone());
        {
            let mut writer = make.make_writer();
            writer.write_all(b"no newline").unwrap();
            assert!(lines.take().is_empty());
        }
        assert_eq!(lines.take(), vec!["[CIGI Overlay] no newline".to_owned()]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let lines = Lines::default();
        let make = ConsoleMakeWriter::new(lines.clone());
        drop({
            let mut writer = make.make_writer();
            writer.write_all(b"\r\n\nkept\r\n").unwrap();
            writer
        });
        assert_eq!(lines.take(), vec!["[CIGI Overlay] kept".to_owned()]);
    }

    #[test]
    fn subscriber_formats_events_with_fields() {
        let lines = Lines::default();
        tracing::subscriber::with_default(subscriber(lines.clone(), Level::INFO), || {
            tracing::info!(element = "panel", "element transition");
            tracing::debug!("filtered out");
        });
        let out = lines.take();
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("[CIGI Overlay] "));
        assert!(out[0].contains("INFO"));
        assert!(out[0].contains("element transition"));
        assert!(out[0].contains("element=\"panel\""));
    }

    #[test]
    fn second_init_reports_existing_subscriber() {
        let _ = init(Lines::default(), Level::ERROR);
        assert!(!init(Lines::default(), Level::ERROR));
    }
}

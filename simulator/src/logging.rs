use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Tees formatted log lines to stdout and, optionally, a log file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = path
            .map(File::create)
            .transpose()?
            .map(|file| Arc::new(Mutex::new(file)));
        Ok(Self { file })
    }

    fn with_file(&self, op: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
        match &self.file {
            Some(file) => op(&mut file.lock().unwrap_or_else(PoisonError::into_inner)),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.with_file(|file| file.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.with_file(Write::flush)
    }
}

/// One line of the simulation trace.
#[derive(Debug, Clone)]
pub(crate) struct SimEvent {
    pub(crate) at_ms: u64,
    pub(crate) query: usize,
    pub(crate) detail: String,
}

/// Keeps the head and the tail of a run's trace. Only dumped on failure, so a
/// passing stress run doesn't log every query.
pub(crate) struct EventLog {
    head_limit: usize,
    tail_limit: usize,
    head: Vec<SimEvent>,
    tail: VecDeque<SimEvent>,
    dropped: usize,
}

impl EventLog {
    pub(crate) fn new(head_limit: usize, tail_limit: usize) -> Self {
        Self {
            head_limit,
            tail_limit,
            head: Vec::with_capacity(head_limit),
            tail: VecDeque::with_capacity(tail_limit),
            dropped: 0,
        }
    }

    pub(crate) fn record(&mut self, event: SimEvent) {
        if self.head.len() < self.head_limit {
            self.head.push(event);
            return;
        }
        if self.tail_limit == 0 {
            self.dropped += 1;
            return;
        }
        if self.tail.len() == self.tail_limit {
            self.tail.pop_front();
            self.dropped += 1;
        }
        self.tail.push_back(event);
    }

    pub(crate) fn len(&self) -> usize {
        self.head.len() + self.tail.len() + self.dropped
    }

    pub(crate) fn dump(&self, reason: &str) {
        tracing::error!("failure: {reason}");
        for event in &self.head {
            log_event(event);
        }
        if self.dropped > 0 {
            tracing::error!("... {} events omitted ...", self.dropped);
        }
        for event in &self.tail {
            log_event(event);
        }
    }
}

fn log_event(event: &SimEvent) {
    tracing::error!("[{:>8}ms] q{:<6} {}", event.at_ms, event.query, event.detail);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(query: usize) -> SimEvent {
        SimEvent {
            at_ms: 0,
            query,
            detail: String::new(),
        }
    }

    #[test]
    fn keeps_head_and_most_recent_tail() {
        let mut log = EventLog::new(2, 3);
        for query in 0..10 {
            log.record(event(query));
        }
        let head: Vec<_> = log.head.iter().map(|e| e.query).collect();
        let tail: Vec<_> = log.tail.iter().map(|e| e.query).collect();
        assert_eq!(head, vec![0, 1]);
        assert_eq!(tail, vec![7, 8, 9]);
        assert_eq!(log.dropped, 5);
        assert_eq!(log.len(), 10);
    }
}

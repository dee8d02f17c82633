//! Log line splitting and lazy log iteration.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::{debug, trace};

use crate::api::{LogSource, Stream};
use crate::error::{SchedulerError, SchedulerResult};

/// Split `text` into lines, each keeping its trailing `\n`.
///
/// Only the last fragment may lack a newline. Concatenating the fragments
/// reproduces `text` exactly.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Caller-side options for [`crate::Scheduler::log_iter`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Only yield lines matching this pattern.
    pub regex: Option<String>,
    pub since: Option<SystemTime>,
    pub until: Option<SystemTime>,
    /// Keep waiting for output until the app reaches a terminal state.
    pub should_tail: bool,
    /// Defaults to the backend's [`crate::SchedulerBackend::default_log_stream`].
    pub streams: Option<Stream>,
    /// Wait between polls while tailing.
    pub poll_interval: Duration,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            regex: None,
            since: None,
            until: None,
            should_tail: false,
            streams: None,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl LogOptions {
    pub fn tail() -> Self {
        Self {
            should_tail: true,
            ..Self::default()
        }
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    pub fn with_streams(mut self, stream: Stream) -> Self {
        self.streams = Some(stream);
        self
    }

    pub fn with_window(mut self, since: Option<SystemTime>, until: Option<SystemTime>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub(crate) fn compile_regex(&self) -> SchedulerResult<Option<Regex>> {
        self.regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| SchedulerError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

/// Reports whether the app whose logs are being read has finished.
pub type TerminalProbe<'a> = Box<dyn FnMut() -> SchedulerResult<bool> + Send + 'a>;

/// Lazy, forward-only sequence of log lines for one replica.
///
/// Reassembles lines split across source chunks and applies the regex
/// filter. Without tailing it ends once the source has nothing more. With
/// tailing, `next` blocks (polling) until new output arrives or the app
/// reaches a terminal state. Stop early by dropping the iterator.
pub struct LogIter<'a> {
    source: Box<dyn LogSource>,
    filter: Option<Regex>,
    ready: VecDeque<String>,
    partial: String,
    should_tail: bool,
    poll_interval: Duration,
    is_terminal: TerminalProbe<'a>,
    finished: bool,
}

impl<'a> LogIter<'a> {
    pub fn new(
        source: Box<dyn LogSource>,
        filter: Option<Regex>,
        should_tail: bool,
        poll_interval: Duration,
        is_terminal: TerminalProbe<'a>,
    ) -> Self {
        Self {
            source,
            filter,
            ready: VecDeque::new(),
            partial: String::new(),
            should_tail,
            poll_interval,
            is_terminal,
            finished: false,
        }
    }

    fn ingest(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let mut buf = std::mem::take(&mut self.partial);
        buf.push_str(chunk);
        for fragment in split_lines(&buf) {
            if fragment.ends_with('\n') {
                self.push_line(fragment.to_string());
            } else {
                self.partial = fragment.to_string();
            }
        }
    }

    fn push_line(&mut self, line: String) {
        let keep = match &self.filter {
            Some(re) => re.is_match(line.trim_end_matches('\n')),
            None => true,
        };
        if keep {
            self.ready.push_back(line);
        }
    }

    /// Read whatever the source still holds, then emit the unterminated tail.
    fn drain_and_finish(&mut self) -> SchedulerResult<()> {
        self.finished = true;
        while let Some(chunk) = self.read()?.filter(|c| !c.is_empty()) {
            self.ingest(&chunk);
        }
        if !self.partial.is_empty() {
            let last = std::mem::take(&mut self.partial);
            self.push_line(last);
        }
        Ok(())
    }

    fn read(&mut self) -> SchedulerResult<Option<String>> {
        self.source
            .read_chunk()
            .map_err(|e| SchedulerError::backend("log source", "read", e))
    }

    fn step(&mut self) -> SchedulerResult<()> {
        // An empty chunk counts as no output.
        if let Some(chunk) = self.read()?.filter(|c| !c.is_empty()) {
            self.ingest(&chunk);
            return Ok(());
        }
        if !self.should_tail {
            return self.drain_and_finish();
        }
        if (self.is_terminal)()? {
            debug!("app reached a terminal state, finishing log tail");
            return self.drain_and_finish();
        }
        trace!(interval = ?self.poll_interval, "no new log output, waiting");
        std::thread::sleep(self.poll_interval);
        Ok(())
    }
}

impl Iterator for LogIter<'_> {
    type Item = SchedulerResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.step() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

impl fmt::Debug for LogIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogIter")
            .field("filter", &self.filter.as_ref().map(Regex::as_str))
            .field("should_tail", &self.should_tail)
            .field("buffered", &self.ready.len())
            .field("finished", &self.finished)
            .finish()
    }
}

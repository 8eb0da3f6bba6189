//! In-memory sources for exercising tailers without a real event log.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventmux::{ChannelConfig, ChannelId, OpenError, ReadError, Source};

/// Record as handed out by the fakes: `(bookmark, name)`.
pub type Record = (u64, String);

/// What the fakes observed, shared with the test.
#[derive(Debug, Default)]
pub struct Calls {
    /// Start bookmark of every successful open.
    pub opens: Vec<u64>,
    pub closes: usize,
    pub reads: usize,
}

pub type SharedCalls = Arc<Mutex<Calls>>;

pub fn recorder() -> SharedCalls {
    Arc::new(Mutex::new(Calls::default()))
}

/// One scripted answer to `read`.
#[derive(Clone, Debug)]
pub enum Step {
    Batch(Vec<(u64, &'static str)>),
    Fail,
    Panic,
}

pub fn batch(records: &[(u64, &'static str)]) -> Step {
    Step::Batch(records.to_vec())
}

pub fn empty() -> Step {
    Step::Batch(Vec::new())
}

/// Answers reads from a fixed script, then with empty batches forever.
pub struct ScriptedSource {
    script: VecDeque<Step>,
    fail_open: bool,
    calls: SharedCalls,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Step>, calls: SharedCalls) -> Self {
        ScriptedSource {
            script: script.into_iter().collect(),
            fail_open: false,
            calls,
        }
    }

    pub fn failing_open(calls: SharedCalls) -> Self {
        ScriptedSource {
            script: VecDeque::new(),
            fail_open: true,
            calls,
        }
    }
}

#[async_trait]
impl Source for ScriptedSource {
    type Handle = ();
    type Record = Record;
    type Event = String;
    type Bookmark = u64;

    async fn open(&mut self, _config: &ChannelConfig, start: &u64) -> Result<(), OpenError> {
        if self.fail_open {
            return Err(OpenError::new(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "access denied",
            )));
        }
        self.calls.lock().unwrap().opens.push(*start);
        Ok(())
    }

    async fn read(&mut self, _handle: &mut ()) -> Result<Vec<Record>, ReadError> {
        self.calls.lock().unwrap().reads += 1;
        match self.script.pop_front() {
            Some(Step::Batch(records)) => Ok(records
                .into_iter()
                .map(|(bookmark, name)| (bookmark, name.to_string()))
                .collect()),
            Some(Step::Fail) => Err(ReadError::new("rpc server unavailable")),
            Some(Step::Panic) => panic!("driver blew up"),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&mut self, _handle: ()) {
        self.calls.lock().unwrap().closes += 1;
    }

    fn bookmark(&self, record: &Record) -> u64 {
        record.0
    }

    fn decode(&self, record: Record) -> String {
        record.1
    }
}

/// A well-behaved source over a fixed log: reads resume strictly after the
/// bookmark given to `open` and return at most `batch_read_size` records.
/// After `fail_after` reads every further read fails.
pub struct LogSource {
    log: Arc<Vec<Record>>,
    fail_after: Option<usize>,
    calls: SharedCalls,
}

pub struct Cursor {
    after: u64,
    batch: usize,
}

impl LogSource {
    pub fn new(log: Arc<Vec<Record>>, calls: SharedCalls) -> Self {
        LogSource {
            log,
            fail_after: None,
            calls,
        }
    }

    pub fn fail_after(mut self, reads: usize) -> Self {
        self.fail_after = Some(reads);
        self
    }
}

/// Records named `<channel>-<n>` with bookmarks `1..=len`.
pub fn log(channel: &str, len: u64) -> Arc<Vec<Record>> {
    Arc::new((1..=len).map(|n| (n, format!("{channel}-{n}"))).collect())
}

#[async_trait]
impl Source for LogSource {
    type Handle = Cursor;
    type Record = Record;
    type Event = String;
    type Bookmark = u64;

    async fn open(&mut self, config: &ChannelConfig, start: &u64) -> Result<Cursor, OpenError> {
        self.calls.lock().unwrap().opens.push(*start);
        Ok(Cursor {
            after: *start,
            batch: config.batch_read_size,
        })
    }

    async fn read(&mut self, cursor: &mut Cursor) -> Result<Vec<Record>, ReadError> {
        let reads = {
            let mut calls = self.calls.lock().unwrap();
            calls.reads += 1;
            calls.reads
        };
        if matches!(self.fail_after, Some(limit) if reads > limit) {
            return Err(ReadError::new("event log handle is invalid"));
        }

        let records: Vec<Record> = self
            .log
            .iter()
            .filter(|(bookmark, _)| *bookmark > cursor.after)
            .take(cursor.batch)
            .cloned()
            .collect();
        if let Some((last, _)) = records.last() {
            cursor.after = *last;
        }
        Ok(records)
    }

    async fn close(&mut self, _cursor: Cursor) {
        self.calls.lock().unwrap().closes += 1;
    }

    fn bookmark(&self, record: &Record) -> u64 {
        record.0
    }

    fn decode(&self, record: Record) -> String {
        record.1
    }
}

/// Sink collecting `(channel, event)` pairs.
pub type Collected = Arc<Mutex<Vec<(ChannelId, String)>>>;

pub fn collector() -> (Collected, impl FnMut(&ChannelId, String) + Clone + Send + 'static) {
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink_side = collected.clone();
    let sink = move |channel: &ChannelId, event: String| {
        sink_side.lock().unwrap().push((channel.clone(), event));
    };

    (collected, sink)
}

pub fn events(collected: &Collected) -> Vec<String> {
    collected
        .lock()
        .unwrap()
        .iter()
        .map(|(_, event)| event.clone())
        .collect()
}

//! Everything related to following a single channel.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures_util::future::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::channel::ChannelId;
use crate::checkpoint::Checkpoint;
use crate::config::{ChannelConfig, HandlePolicy, NoMoreEvents};
use crate::error::{panic_message, TerminationReason};
use crate::sink::Sink;
use crate::source::Source;

/// Where a [`Tailer`] is in its polling loop.
///
/// ```text
/// Unopened ──open──► Open ──read──► Reading ◄──┐
///    ▲                 │               │       │
///    └──── Reopen ◄────┴── batch ──────┤     sleep
///                                      └─ [] ─► Backoff
///
/// open/read errors and cancellation ──► Terminated(reason)
/// ```
#[derive(Debug)]
pub enum TailerState {
    Unopened,
    /// A handle is open but has not been read from yet.
    Open,
    Reading,
    Backoff,
    Terminated(TerminationReason),
}

impl TailerState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, TailerState::Terminated(_))
    }

    fn replace(&mut self, new_state: Self) -> TailerState {
        std::mem::replace(self, new_state)
    }
}

impl fmt::Display for TailerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailerState::Unopened => write!(f, "unopened"),
            TailerState::Open => write!(f, "open"),
            TailerState::Reading => write!(f, "reading"),
            TailerState::Backoff => write!(f, "backoff"),
            TailerState::Terminated(reason) => write!(f, "terminated({})", reason.as_label()),
        }
    }
}

/// Counters kept by a tailer over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TailerStats {
    pub opens: u64,
    pub closes: u64,
    pub batches: u64,
    pub records: u64,
    pub empty_reads: u64,
}

/// Final report of a terminated tailer.
#[derive(Debug)]
pub struct ChannelOutcome<B> {
    pub channel: ChannelId,
    pub reason: TerminationReason,
    pub checkpoint: Checkpoint<B>,
    pub stats: TailerStats,
}

/// Drives one channel: reads forward from its checkpoint, emits every record
/// and advances the checkpoint after each fully emitted batch.
///
/// A tailer can be run to completion with [`run`](Tailer::run), or driven one
/// transition at a time with [`step`](Tailer::step).
pub struct Tailer<S: Source, K> {
    config: ChannelConfig,
    source: S,
    sink: K,
    checkpoint: Checkpoint<S::Bookmark>,
    handle: Option<S::Handle>,
    state: TailerState,
    stats: TailerStats,
    token: CancellationToken,
}

impl<S, K> fmt::Debug for Tailer<S, K>
where
    S: Source,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tailer")
            .field("channel", &self.config.name)
            .field("state", &self.state)
            .field("checkpoint", self.checkpoint.get())
            .field("open", &self.handle.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<S, K> Tailer<S, K>
where
    S: Source,
    K: Sink<S::Event>,
{
    /// Creates a tailer for `config.name`, resuming from `checkpoint`.
    ///
    /// `token` cancels the tailer at its next safe point.
    pub fn new(
        config: ChannelConfig,
        source: S,
        sink: K,
        checkpoint: Checkpoint<S::Bookmark>,
        token: CancellationToken,
    ) -> Self {
        debug_assert_eq!(&config.name, checkpoint.channel());

        Tailer {
            config,
            source,
            sink,
            checkpoint,
            handle: None,
            state: TailerState::Unopened,
            stats: TailerStats::default(),
            token,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.config.name
    }

    pub fn state(&self) -> &TailerState {
        &self.state
    }

    pub fn checkpoint(&self) -> &S::Bookmark {
        self.checkpoint.get()
    }

    pub fn stats(&self) -> TailerStats {
        self.stats
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Performs a single state transition.
    ///
    /// Does nothing once terminated.
    pub async fn step(&mut self) -> &TailerState {
        match self.state {
            TailerState::Unopened => self.open().await,
            TailerState::Open | TailerState::Reading => self.read().await,
            TailerState::Backoff => self.backoff().await,
            TailerState::Terminated(_) => {}
        }

        &self.state
    }

    /// Runs until terminated or cancelled.
    ///
    /// Cancellation is honoured before every step and during backoff, never
    /// in the middle of emitting a batch. The handle is always closed before
    /// this returns, including when the source or sink panics; the tailer then
    /// terminates with [`TerminationReason::Panicked`] and keeps the
    /// checkpoint of the last fully emitted batch.
    pub async fn run(mut self) -> ChannelOutcome<S::Bookmark> {
        debug!(channel = %self.config.name, policy = ?self.config.handle_policy, "tailer started");

        while !self.state.is_terminated() {
            if self.token.is_cancelled() {
                self.cancel().await;
                break;
            }
            let stepped = AssertUnwindSafe(self.step()).catch_unwind().await.map(|_| ());
            if let Err(payload) = stepped {
                self.close().await;
                self.state = TailerState::Terminated(TerminationReason::Panicked(panic_message(
                    &*payload,
                )));
            }
        }

        self.finish().await
    }

    /// Terminates (cancelling if still live) and produces the final report.
    pub async fn finish(mut self) -> ChannelOutcome<S::Bookmark> {
        if !self.state.is_terminated() {
            self.cancel().await;
        }

        let reason = match self.state.replace(TailerState::Unopened) {
            TailerState::Terminated(reason) => reason,
            _ => TerminationReason::Cancelled,
        };

        if reason.is_clean() {
            info!(channel = %self.config.name, reason = reason.as_label(), records = self.stats.records, "tailer stopped");
        } else {
            warn!(channel = %self.config.name, reason = reason.as_label(), error = %reason, "tailer failed");
        }

        ChannelOutcome {
            channel: self.config.name,
            reason,
            checkpoint: self.checkpoint,
            stats: self.stats,
        }
    }

    async fn open(&mut self) {
        match self.source.open(&self.config, self.checkpoint.get()).await {
            Ok(handle) => {
                trace!(channel = %self.config.name, from = ?self.checkpoint.get(), "opened");
                self.stats.opens += 1;
                self.handle = Some(handle);
                self.state = TailerState::Open;
            }
            Err(e) => {
                // Nothing to close, the handle never existed
                self.state = TailerState::Terminated(TerminationReason::OpenFailed(e));
            }
        }
    }

    async fn read(&mut self) {
        let handle = match self.handle.as_mut() {
            Some(handle) => handle,
            None => {
                self.state = TailerState::Unopened;
                return;
            }
        };

        let records = match self.source.read(handle).await {
            Ok(records) => records,
            Err(e) => {
                self.close().await;
                self.state = TailerState::Terminated(TerminationReason::ReadFailed(e));
                return;
            }
        };

        if records.is_empty() {
            self.stats.empty_reads += 1;
            match self.config.no_more_events {
                NoMoreEvents::Wait => self.state = TailerState::Backoff,
                NoMoreEvents::Stop => {
                    self.close().await;
                    self.state = TailerState::Terminated(TerminationReason::Drained);
                }
            }
            return;
        }

        self.emit_batch(records);

        match self.config.handle_policy {
            HandlePolicy::Reuse => self.state = TailerState::Reading,
            HandlePolicy::Reopen => {
                self.close().await;
                self.state = TailerState::Unopened;
            }
        }
    }

    /// Emits in source order, then acknowledges the last record.
    fn emit_batch(&mut self, records: Vec<S::Record>) {
        let count = records.len();
        let mut last = None;

        for record in records {
            last = Some(self.source.bookmark(&record));
            let event = self.source.decode(record);
            self.sink.emit(&self.config.name, event);
        }

        if let Some(bookmark) = last {
            self.checkpoint.set(bookmark);
        }

        self.stats.batches += 1;
        self.stats.records += count as u64;
        debug!(channel = %self.config.name, count, checkpoint = ?self.checkpoint.get(), "batch emitted");
    }

    async fn backoff(&mut self) {
        trace!(channel = %self.config.name, wait = ?self.config.empty_read_wait, "no new records");

        let cancelled = tokio::select! {
            _ = time::sleep(self.config.empty_read_wait) => false,
            _ = self.token.cancelled() => true,
        };

        if cancelled {
            self.cancel().await;
        } else {
            self.state = TailerState::Reading;
        }
    }

    async fn cancel(&mut self) {
        self.close().await;
        self.state = TailerState::Terminated(TerminationReason::Cancelled);
    }

    async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.close(handle).await;
            self.stats.closes += 1;
            trace!(channel = %self.config.name, "closed");
        }
    }
}

//! Runs one [`Tailer`] per channel and collects how each of them ended.
//!
//! ```text
//! channels ──► resolve config ──► lease checkpoint ──► spawn Tailer::run
//!                                                          │ (one task each)
//! JoinResult ◄── restore checkpoints ◄── join all ◄────────┘
//! ```
//!
//! The supervisor never restarts a channel. Restarting after `open_failed` or
//! `read_failed` is left to whoever owns the process, so that it can apply its
//! own backoff instead of spinning on a broken source.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::channel::ChannelId;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::{ChannelConfig, ConfigResolver};
use crate::error::{panic_message, ConfigError, Error, TerminationReason};
use crate::sink::Sink;
use crate::source::Source;
use crate::tailer::{ChannelOutcome, Tailer, TailerStats};

/// Terminal status of every channel of a [`Supervisor::run`], in the order the
/// channels were given.
#[derive(Debug)]
pub struct JoinResult<B> {
    outcomes: Vec<ChannelOutcome<B>>,
}

impl<B> JoinResult<B> {
    pub fn outcomes(&self) -> &[ChannelOutcome<B>] {
        &self.outcomes
    }

    pub fn get(&self, channel: &str) -> Option<&ChannelOutcome<B>> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.channel.as_str() == channel)
    }

    /// Returns `true` if every channel was cancelled or drained.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.reason.is_clean())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelOutcome<B>> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.reason.is_clean())
    }

    /// Total number of records emitted across all channels.
    pub fn records(&self) -> u64 {
        self.outcomes.iter().map(|outcome| outcome.stats.records).sum()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn into_outcomes(self) -> Vec<ChannelOutcome<B>> {
        self.outcomes
    }
}

impl<B> IntoIterator for JoinResult<B> {
    type Item = ChannelOutcome<B>;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// A spawned tailer the supervisor has not joined yet.
#[derive(Debug)]
struct Running<B> {
    channel: ChannelId,
    start: B,
    task: JoinHandle<ChannelOutcome<B>>,
}

/// Starts and joins the tailers of a set of channels.
///
/// The supervisor owns every tailer it spawns. If a [`run`](Supervisor::run)
/// future is dropped before it completes, its tailers are cancelled and keep
/// their checkpoints leased until the next `run` or
/// [`reclaim`](Supervisor::reclaim) joins them and writes their progress back.
#[derive(Debug)]
pub struct Supervisor<B> {
    store: CheckpointStore<B>,
    token: CancellationToken,
    running: VecDeque<Running<B>>,
}

impl<B> Supervisor<B>
where
    B: Clone + Debug + Default + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_store(CheckpointStore::new())
    }

    /// Resumes every channel from the bookmarks in `store`.
    pub fn with_store(store: CheckpointStore<B>) -> Self {
        Supervisor {
            store,
            token: CancellationToken::new(),
            running: VecDeque::new(),
        }
    }

    /// Token that stops every running tailer once cancelled.
    ///
    /// Cancellation is final: afterwards [`run`](Supervisor::run) returns
    /// [`Error::Cancelled`]. Resume with a new supervisor built from
    /// [`into_store`](Supervisor::into_store).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn store(&self) -> &CheckpointStore<B> {
        &self.store
    }

    pub fn into_store(self) -> CheckpointStore<B> {
        self.store
    }

    /// Tails every channel concurrently until each one terminates.
    ///
    /// `sources` builds an independent [`Source`] for each resolved channel
    /// and every tailer gets its own clone of `sink`. Fails without starting
    /// anything if the supervisor was cancelled, a channel is listed twice or
    /// a config is invalid. Tailers left over from an interrupted run are
    /// joined first.
    pub async fn run<I, C, R, F, S, K>(
        &mut self,
        channels: I,
        resolver: &R,
        mut sources: F,
        sink: K,
    ) -> Result<JoinResult<B>, Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<ChannelId>,
        R: ConfigResolver + ?Sized,
        F: FnMut(&ChannelConfig) -> S,
        S: Source<Bookmark = B>,
        K: Sink<S::Event> + Clone,
    {
        self.reclaim().await;
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let configs = self.resolve(channels, resolver)?;
        let leases = self.lease_all(&configs)?;

        // Dropping this future cancels every tailer it started
        let run_token = self.token.child_token();
        let _cancel_on_drop = run_token.clone().drop_guard();

        for (config, checkpoint) in configs.into_iter().zip(leases) {
            let channel = config.name.clone();
            let start = checkpoint.get().clone();

            let source = sources(&config);
            let tailer = Tailer::new(
                config,
                source,
                sink.clone(),
                checkpoint,
                run_token.child_token(),
            );
            self.running.push_back(Running {
                channel,
                start,
                task: tokio::spawn(tailer.run()),
            });
        }
        drop(sink);

        info!(channels = self.running.len(), "tailers started");

        let result = self.join().await;
        info!(
            channels = result.len(),
            failed = result.failures().count(),
            records = result.records(),
            "all tailers terminated"
        );

        Ok(result)
    }

    /// Joins tailers whose `run` was dropped and returns their checkpoints to
    /// the store. Returns an empty result if there are none.
    pub async fn reclaim(&mut self) -> JoinResult<B> {
        if !self.running.is_empty() {
            info!(channels = self.running.len(), "joining tailers of an interrupted run");
        }

        self.join().await
    }

    /// Awaits the owned tailers in order. Each one is only removed after its
    /// checkpoint is back in the store, so dropping this future loses nothing.
    async fn join(&mut self) -> JoinResult<B> {
        let mut outcomes = Vec::with_capacity(self.running.len());

        while let Some(running) = self.running.front_mut() {
            let res = (&mut running.task).await;
            let Running { channel, start, .. } = match self.running.pop_front() {
                Some(running) => running,
                None => break,
            };

            let outcome = res.unwrap_or_else(|e| panicked(channel, start, e));
            self.store.restore(outcome.checkpoint.clone());
            outcomes.push(outcome);
        }

        JoinResult { outcomes }
    }

    fn resolve<I, C, R>(&self, channels: I, resolver: &R) -> Result<Vec<ChannelConfig>, Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<ChannelId>,
        R: ConfigResolver + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut configs = Vec::new();

        for channel in channels {
            let channel = channel.into();
            if !seen.insert(channel.clone()) {
                return Err(Error::DuplicateChannel(channel));
            }
            if self.store.is_leased(channel.as_str()) {
                return Err(Error::AlreadyLeased(channel));
            }

            let config = resolver.resolve(&channel);
            if config.name != channel {
                return Err(ConfigError::NameMismatch {
                    expected: channel,
                    got: config.name,
                }
                .into());
            }
            config.validate()?;
            configs.push(config);
        }

        Ok(configs)
    }

    /// Leases every checkpoint, or none of them.
    fn lease_all(&mut self, configs: &[ChannelConfig]) -> Result<Vec<Checkpoint<B>>, Error> {
        let mut leases = Vec::with_capacity(configs.len());

        for config in configs {
            match self.store.lease(config.name.clone()) {
                Some(checkpoint) => leases.push(checkpoint),
                None => {
                    for checkpoint in leases {
                        self.store.restore(checkpoint);
                    }
                    return Err(Error::AlreadyLeased(config.name.clone()));
                }
            }
        }

        Ok(leases)
    }
}

impl<B> Default for Supervisor<B>
where
    B: Clone + Debug + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome for a tailer task that never returned, e.g. because closing the
/// handle after a panic panicked again. Its checkpoint falls back to the
/// bookmark it started from.
fn panicked<B>(channel: ChannelId, start: B, err: JoinError) -> ChannelOutcome<B> {
    let message = if err.is_panic() {
        panic_message(&*err.into_panic())
    } else {
        err.to_string()
    };

    error!(channel = %channel, error = %message, "tailer task died");

    ChannelOutcome {
        checkpoint: Checkpoint::with_bookmark(channel.clone(), start),
        channel,
        reason: TerminationReason::Panicked(message),
        stats: TailerStats::default(),
    }
}

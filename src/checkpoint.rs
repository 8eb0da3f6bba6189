//! Per-channel bookmark bookkeeping.
//!
//! The store is partitioned by [`ChannelId`]. A tailer takes its entry out of
//! the store with [`CheckpointStore::lease`] and hands it back with
//! [`CheckpointStore::restore`] once it terminates. While an entry is leased
//! no second lease can be taken for the same channel, so every key has a
//! single writer without any locking.

use std::collections::{HashMap, HashSet};

use crate::channel::ChannelId;

/// The last acknowledged bookmark of one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint<B> {
    channel: ChannelId,
    bookmark: B,
}

impl<B: Default> Checkpoint<B> {
    /// An empty checkpoint, meaning "start from the configured origin".
    pub fn new(channel: impl Into<ChannelId>) -> Self {
        Checkpoint {
            channel: channel.into(),
            bookmark: B::default(),
        }
    }
}

impl<B> Checkpoint<B> {
    pub fn with_bookmark(channel: impl Into<ChannelId>, bookmark: B) -> Self {
        Checkpoint {
            channel: channel.into(),
            bookmark,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn get(&self) -> &B {
        &self.bookmark
    }

    /// Overwrites the bookmark unconditionally.
    pub fn set(&mut self, bookmark: B) {
        self.bookmark = bookmark;
    }

    pub fn into_inner(self) -> (ChannelId, B) {
        (self.channel, self.bookmark)
    }
}

/// In-memory map of channel checkpoints.
#[derive(Debug)]
pub struct CheckpointStore<B> {
    entries: HashMap<ChannelId, B>,
    leased: HashSet<ChannelId>,
}

impl<B: Clone + Default> CheckpointStore<B> {
    pub fn new() -> Self {
        CheckpointStore {
            entries: HashMap::new(),
            leased: HashSet::new(),
        }
    }

    /// Creates an empty entry for `channel` unless one already exists.
    pub fn register(&mut self, channel: impl Into<ChannelId>) {
        self.entries.entry(channel.into()).or_default();
    }

    /// Returns the stored bookmark, or the empty bookmark if none was set.
    ///
    /// While a channel is leased this is the value it was leased with.
    pub fn get(&self, channel: &str) -> B {
        self.entries.get(channel).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, channel: impl Into<ChannelId>, bookmark: B) {
        self.entries.insert(channel.into(), bookmark);
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    pub fn is_leased(&self, channel: &str) -> bool {
        self.leased.contains(channel)
    }

    /// Hands out the entry for `channel` to its single writer.
    ///
    /// Registers the channel first if needed. Returns `None` if the entry is
    /// already leased.
    pub fn lease(&mut self, channel: impl Into<ChannelId>) -> Option<Checkpoint<B>> {
        let channel = channel.into();
        if !self.leased.insert(channel.clone()) {
            return None;
        }

        let bookmark = self.entries.entry(channel.clone()).or_default().clone();
        Some(Checkpoint::with_bookmark(channel, bookmark))
    }

    /// Writes a leased entry back and ends the lease.
    pub fn restore(&mut self, checkpoint: Checkpoint<B>) {
        let (channel, bookmark) = checkpoint.into_inner();
        self.leased.remove(&channel);
        self.entries.insert(channel, bookmark);
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B: Clone + Default> Default for CheckpointStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

//! The driver side of a channel: opening, reading and closing it.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::config::ChannelConfig;
use crate::error::{OpenError, ReadError};

/// An event-log driver for a single channel.
///
/// Each [`Tailer`](crate::Tailer) owns its own `Source`, so implementations
/// need no internal synchronisation. A handle returned by [`open`] is only
/// ever read from by that tailer and is passed by value to [`close`], which
/// the tailer calls at most once per successful `open`.
///
/// [`open`]: Source::open
/// [`close`]: Source::close
#[async_trait]
pub trait Source: Send + 'static {
    /// Connection to an open channel.
    type Handle: Send + 'static;
    /// A raw record as returned by [`read`](Source::read).
    type Record: Send + 'static;
    /// A decoded record, handed to the [`Sink`](crate::Sink).
    type Event: Send + 'static;
    /// Resume position. `Default` is the empty bookmark, meaning "start at
    /// [`ChannelConfig::origin`]".
    type Bookmark: Clone + Debug + Default + Send + Sync + 'static;

    /// Connects to the channel positioned right after `start`.
    async fn open(
        &mut self,
        config: &ChannelConfig,
        start: &Self::Bookmark,
    ) -> Result<Self::Handle, OpenError>;

    /// Returns the records currently available, oldest first.
    ///
    /// Must not wait for new records to arrive; an empty batch simply means
    /// the channel is caught up.
    async fn read(&mut self, handle: &mut Self::Handle) -> Result<Vec<Self::Record>, ReadError>;

    /// Releases the driver resources held by `handle`.
    async fn close(&mut self, handle: Self::Handle);

    fn bookmark(&self, record: &Self::Record) -> Self::Bookmark;

    fn decode(&self, record: Self::Record) -> Self::Event;
}

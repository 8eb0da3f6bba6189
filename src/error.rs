//! Errors reported by sources, tailers and the supervisor.

use std::any::Any;
use std::error::Error as StdError;

use thiserror::Error;

use crate::channel::ChannelId;

/// Boxed error type used by [`Source`](crate::Source) implementations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The source could not establish a connection to a channel.
#[derive(Debug, Error)]
#[error("failed to open channel: {0}")]
pub struct OpenError(#[source] BoxError);

impl OpenError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        OpenError(err.into())
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

/// The connection to a channel degraded while reading.
#[derive(Debug, Error)]
#[error("failed to read channel: {0}")]
pub struct ReadError(#[source] BoxError);

impl ReadError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        ReadError(err.into())
    }

    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

/// Why a tailer stopped.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TerminationReason {
    #[error(transparent)]
    OpenFailed(OpenError),
    #[error(transparent)]
    ReadFailed(ReadError),
    #[error("cancelled")]
    Cancelled,
    /// An empty read with `no_more_events = stop`.
    #[error("no more events")]
    Drained,
    #[error("tailer panicked: {0}")]
    Panicked(String),
}

impl TerminationReason {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TerminationReason::OpenFailed(_) => "open_failed",
            TerminationReason::ReadFailed(_) => "read_failed",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::Drained => "drained",
            TerminationReason::Panicked(_) => "panicked",
        }
    }

    /// `true` for reasons that do not indicate a fault.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            TerminationReason::Cancelled | TerminationReason::Drained
        )
    }
}

/// Invalid channel configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("channel name is empty")]
    EmptyName,
    #[error("batch_read_size for channel {0} must be greater than zero")]
    ZeroBatchSize(ChannelId),
    #[error("resolver returned config for {got} when asked for {expected}")]
    NameMismatch { expected: ChannelId, got: ChannelId },
}

/// Errors that prevent the supervisor from starting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("channel {0} configured more than once")]
    DuplicateChannel(ChannelId),
    #[error("channel {0} is already being tailed")]
    AlreadyLeased(ChannelId),
    /// The supervisor's token was cancelled; it will not start tailers again.
    #[error("supervisor has been cancelled")]
    Cancelled,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

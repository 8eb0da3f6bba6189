//! A library providing asynchronous, multiplexed tailing for event-log
//! channels, resuming each one from the bookmark of the last record it
//! emitted.
//!
//! Every channel is followed by its own [`Tailer`], which reads forward from
//! its checkpoint, emits records in source order and only then advances the
//! checkpoint, so a crash between the two re-delivers rather than drops. An
//! empty read backs off for a configurable interval; an open or read failure
//! terminates the channel. The [`Supervisor`] runs one tailer per channel and
//! reports how each of them ended.
//!
//! ## Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use eventmux::{mux, ChannelConfig, Defaults, OpenError, ReadError, Source, Supervisor};
//!
//! /// A driver that has nothing to say.
//! struct Quiet;
//!
//! #[async_trait]
//! impl Source for Quiet {
//!     type Handle = ();
//!     type Record = u64;
//!     type Event = String;
//!     type Bookmark = u64;
//!
//!     async fn open(&mut self, _: &ChannelConfig, _: &u64) -> Result<(), OpenError> {
//!         Ok(())
//!     }
//!
//!     async fn read(&mut self, _: &mut ()) -> Result<Vec<u64>, ReadError> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn close(&mut self, _: ()) {}
//!
//!     fn bookmark(&self, record: &u64) -> u64 {
//!         *record
//!     }
//!
//!     fn decode(&self, record: u64) -> String {
//!         record.to_string()
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut supervisor = Supervisor::new();
//!     let token = supervisor.cancellation_token();
//!     let (sink, mut events) = mux();
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.next_event().await {
//!             println!("channel[{}] event[{}]", event.source(), event.event());
//!         }
//!     });
//!     tokio::spawn(async move {
//!         let _ = eventmux::shutdown_signal().await;
//!         token.cancel();
//!     });
//!
//!     let result = supervisor
//!         .run(["System", "Application"], &Defaults, |_: &ChannelConfig| Quiet, sink)
//!         .await?;
//!     for outcome in result {
//!         println!("{}: {}", outcome.channel, outcome.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! Neither `open` nor `read` is wrapped in a timeout; a driver call that never
//! returns keeps its tailer (and therefore the supervisor's join) waiting.
//! Cancellation is only observed between steps and during backoff.

mod channel;
mod checkpoint;
mod config;
mod error;
mod signal;
mod sink;
mod source;
mod supervisor;
mod tailer;

pub use channel::ChannelId;
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::{
    ChannelConfig, ConfigResolver, Defaults, HandlePolicy, NoMoreEvents, Origin,
    DEFAULT_BATCH_READ_SIZE, DEFAULT_EMPTY_READ_WAIT,
};
pub use error::{BoxError, ConfigError, Error, OpenError, ReadError, TerminationReason};
pub use signal::shutdown_signal;
pub use sink::{mux, ChannelEvent, MuxSender, MuxedEvents, Sink};
pub use source::Source;
pub use supervisor::{JoinResult, Supervisor};
pub use tailer::{ChannelOutcome, Tailer, TailerState, TailerStats};
pub use tokio_util::sync::CancellationToken;

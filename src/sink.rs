//! Everything related to handing decoded events downstream.

use std::fmt;
use std::pin::Pin;
use std::task;

use futures_util::stream::Stream as FuturesStream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;

use crate::channel::ChannelId;

/// Receives every decoded event, once, in the order its channel produced it.
///
/// Failures inside the sink are the sink's own concern; the tailer neither
/// observes nor retries them.
pub trait Sink<E>: Send + 'static {
    fn emit(&mut self, channel: &ChannelId, event: E);
}

impl<E, F> Sink<E> for F
where
    F: FnMut(&ChannelId, E) + Send + 'static,
{
    fn emit(&mut self, channel: &ChannelId, event: E) {
        self(channel, event)
    }
}

/// An event together with the channel it was read from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChannelEvent<E> {
    source: ChannelId,
    event: E,
}

impl<E> ChannelEvent<E> {
    /// Returns the channel the event was read from.
    pub fn source(&self) -> &ChannelId {
        &self.source
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn into_inner(self) -> (ChannelId, E) {
        let ChannelEvent { source, event } = self;

        (source, event)
    }
}

/// Sending half of [`mux`]. Clone one per tailer.
pub struct MuxSender<E> {
    tx: mpsc::UnboundedSender<ChannelEvent<E>>,
}

impl<E> Clone for MuxSender<E> {
    fn clone(&self) -> Self {
        MuxSender {
            tx: self.tx.clone(),
        }
    }
}

impl<E> fmt::Debug for MuxSender<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<E: Send + 'static> Sink<E> for MuxSender<E> {
    fn emit(&mut self, channel: &ChannelId, event: E) {
        // Only fails once `MuxedEvents` is dropped, at which point nobody is
        // listening anymore.
        if self
            .tx
            .send(ChannelEvent {
                source: channel.clone(),
                event,
            })
            .is_err()
        {
            tracing::trace!(channel = %channel, "muxed receiver dropped, discarding event");
        }
    }
}

pin_project! {
/// Multiplexed stream of events from every channel.
///
/// Yields [`ChannelEvent`]s in per-channel order. Ends once every
/// [`MuxSender`] is dropped, i.e. once all tailers have terminated.
pub struct MuxedEvents<E> {
    #[pin]
    rx: mpsc::UnboundedReceiver<ChannelEvent<E>>,
}
}

impl<E> MuxedEvents<E> {
    /// Waits for the next event, or `None` once all senders are gone.
    pub async fn next_event(&mut self) -> Option<ChannelEvent<E>> {
        self.rx.recv().await
    }

    /// Returns an event if one is ready right now.
    pub fn try_next_event(&mut self) -> Option<ChannelEvent<E>> {
        self.rx.try_recv().ok()
    }
}

impl<E> fmt::Debug for MuxedEvents<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxedEvents").finish_non_exhaustive()
    }
}

impl<E> FuturesStream for MuxedEvents<E> {
    type Item = ChannelEvent<E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Option<Self::Item>> {
        self.project().rx.poll_recv(cx)
    }
}

/// Creates a sink that merges every channel into one [`MuxedEvents`] stream.
pub fn mux<E>() -> (MuxSender<E>, MuxedEvents<E>) {
    let (tx, rx) = mpsc::unbounded_channel();

    (MuxSender { tx }, MuxedEvents { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::StreamExt;

    #[test]
    fn test_channel_event_fns() {
        let event = ChannelEvent {
            source: ChannelId::from("System"),
            event: "e1".to_string(),
        };

        assert_eq!(event.source().as_str(), "System");
        assert_eq!(event.event(), "e1");

        let (source, inner) = event.into_inner();
        assert_eq!(source, ChannelId::from("System"));
        assert_eq!(inner, "e1");
    }

    #[tokio::test]
    async fn test_mux_preserves_order_and_ends() {
        let (tx, events) = mux();
        let mut system = tx.clone();
        let mut app = tx;

        system.emit(&ChannelId::from("System"), 1);
        app.emit(&ChannelId::from("Application"), 2);
        system.emit(&ChannelId::from("System"), 3);
        drop(system);
        drop(app);

        let collected: Vec<_> = events.map(ChannelEvent::into_inner).collect().await;
        assert_eq!(
            collected,
            vec![
                (ChannelId::from("System"), 1),
                (ChannelId::from("Application"), 2),
                (ChannelId::from("System"), 3),
            ]
        );
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (mut tx, events) = mux::<u8>();
        drop(events);

        // Must not panic
        tx.emit(&ChannelId::from("System"), 1);
    }

    #[test]
    fn test_closure_sink() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_sink = seen.clone();
        let mut sink = move |channel: &ChannelId, event: u8| {
            seen_sink.lock().unwrap().push((channel.to_string(), event))
        };
        Sink::emit(&mut sink, &ChannelId::from("System"), 7);

        assert_eq!(*seen.lock().unwrap(), vec![("System".to_string(), 7)]);
    }
}

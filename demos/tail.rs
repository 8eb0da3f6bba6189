//! Tails a few synthetic channels until interrupted.
//!
//! Usage:
//!     RUST_LOG=eventmux=debug cargo run --example tail
//!
//! "System" and "Application" produce a record every few hundred
//! milliseconds. "Security" refuses to open, the way a real event log does
//! without elevated privileges.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use eventmux::{
    mux, ChannelConfig, ChannelId, HandlePolicy, OpenError, ReadError, Source, Supervisor,
};

struct Synthetic {
    epoch: Instant,
    every: Duration,
}

struct Clock {
    next: u64,
    batch: usize,
}

#[async_trait]
impl Source for Synthetic {
    type Handle = Clock;
    type Record = (u64, Instant);
    type Event = String;
    type Bookmark = u64;

    async fn open(&mut self, config: &ChannelConfig, start: &u64) -> Result<Clock, OpenError> {
        if config.params.get("privileged").map(String::as_str) == Some("true") {
            return Err(OpenError::new("a required privilege is not held by the client"));
        }

        Ok(Clock {
            next: *start + 1,
            batch: config.batch_read_size,
        })
    }

    async fn read(&mut self, clock: &mut Clock) -> Result<Vec<(u64, Instant)>, ReadError> {
        let now = Instant::now();
        let due = (now - self.epoch).as_millis() / self.every.as_millis().max(1);
        let mut records = Vec::new();

        while u128::from(clock.next) <= due && records.len() < clock.batch {
            records.push((clock.next, now));
            clock.next += 1;
        }

        Ok(records)
    }

    async fn close(&mut self, _clock: Clock) {}

    fn bookmark(&self, record: &(u64, Instant)) -> u64 {
        record.0
    }

    fn decode(&self, record: (u64, Instant)) -> String {
        format!("record {} read at {:?}", record.0, record.1)
    }
}

fn resolve(channel: &ChannelId) -> ChannelConfig {
    let config = ChannelConfig::new(channel)
        .batch_read_size(100)
        .ignore_older(Duration::from_secs(60))
        .empty_read_wait(Duration::from_secs(1));

    match channel.as_str() {
        "Security" => config.param("privileged", "true"),
        "Application" => config.handle_policy(HandlePolicy::Reopen),
        _ => config,
    }
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut supervisor = Supervisor::new();
    let token = supervisor.cancellation_token();
    let (sink, mut events) = mux();

    tokio::spawn(async move {
        while let Some(event) = events.next_event().await {
            println!("channel[{}] event[{}]", event.source(), event.event());
        }
    });

    tokio::spawn(async move {
        if let Err(e) = eventmux::shutdown_signal().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        token.cancel();
    });

    let result = supervisor
        .run(
            ["System", "Application", "Security"],
            &resolve,
            |config: &ChannelConfig| Synthetic {
                epoch: Instant::now(),
                every: if config.name.as_str() == "System" {
                    Duration::from_millis(300)
                } else {
                    Duration::from_millis(700)
                },
            },
            sink,
        )
        .await?;

    for outcome in result.outcomes() {
        println!(
            "channel[{}] reason[{}] count[{}] bookmark[{}]",
            outcome.channel,
            outcome.reason,
            outcome.stats.records,
            outcome.checkpoint.get()
        );
    }

    Ok(())
}

//! Per-channel configuration.
//!
//! Field names follow the familiar event-log shipper keys, so a channel can be
//! described as
//!
//! ```
//! use eventmux::{ChannelConfig, NoMoreEvents};
//! use std::time::Duration;
//!
//! let config = ChannelConfig::new("System")
//!     .batch_read_size(100)
//!     .ignore_older(Duration::from_secs(60))
//!     .no_more_events(NoMoreEvents::Wait);
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::error::ConfigError;

pub const DEFAULT_BATCH_READ_SIZE: usize = 100;
pub const DEFAULT_EMPTY_READ_WAIT: Duration = Duration::from_secs(10);

/// What a tailer does when a read returns no records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMoreEvents {
    /// Back off for `empty_read_wait` and read again.
    #[default]
    Wait,
    /// Close the channel and terminate once caught up.
    Stop,
}

/// Whether the reader handle survives across reads.
///
/// `Reuse` keeps one handle for the whole life of the tailer, which avoids
/// per-read open/close latency but holds driver resources indefinitely.
/// `Reopen` closes the handle after every non-empty batch and reopens it from
/// the fresh checkpoint, bounding whatever a long-lived handle accumulates at
/// the cost of an open/close round trip per batch. Some drivers are suspected
/// of leaking on open/close cycling, so neither choice is free.
///
/// Under both policies an empty read keeps the handle open through the
/// backoff sleep and reads from it again afterwards. `Reopen` only cycles the
/// handle after a batch that advanced the checkpoint, unlike a loop that
/// reopens before every read whether or not anything arrived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlePolicy {
    #[default]
    Reuse,
    Reopen,
}

/// Where a source starts reading when the checkpoint is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Oldest,
    Newest,
}

/// Configuration of a single channel.
///
/// `params`, `include_raw`, `ignore_older`, `batch_read_size` and `origin` are
/// opaque to the tailer and only interpreted by the [`Source`](crate::Source).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: ChannelId,
    /// Source specific connection parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default, alias = "include_xml")]
    pub include_raw: bool,
    #[serde(default, with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub ignore_older: Option<Duration>,
    #[serde(default)]
    pub no_more_events: NoMoreEvents,
    #[serde(default = "default_batch_read_size")]
    pub batch_read_size: usize,
    #[serde(default = "default_empty_read_wait", with = "humantime_dur")]
    pub empty_read_wait: Duration,
    #[serde(default)]
    pub handle_policy: HandlePolicy,
    #[serde(default)]
    pub origin: Origin,
}

fn default_batch_read_size() -> usize {
    DEFAULT_BATCH_READ_SIZE
}

fn default_empty_read_wait() -> Duration {
    DEFAULT_EMPTY_READ_WAIT
}

impl ChannelConfig {
    pub fn new(name: impl Into<ChannelId>) -> Self {
        ChannelConfig {
            name: name.into(),
            params: BTreeMap::new(),
            include_raw: false,
            ignore_older: None,
            no_more_events: NoMoreEvents::default(),
            batch_read_size: DEFAULT_BATCH_READ_SIZE,
            empty_read_wait: DEFAULT_EMPTY_READ_WAIT,
            handle_policy: HandlePolicy::default(),
            origin: Origin::default(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn include_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }

    pub fn ignore_older(mut self, age: Duration) -> Self {
        self.ignore_older = Some(age);
        self
    }

    pub fn no_more_events(mut self, policy: NoMoreEvents) -> Self {
        self.no_more_events = policy;
        self
    }

    pub fn batch_read_size(mut self, size: usize) -> Self {
        self.batch_read_size = size;
        self
    }

    pub fn empty_read_wait(mut self, wait: Duration) -> Self {
        self.empty_read_wait = wait;
        self
    }

    pub fn handle_policy(mut self, policy: HandlePolicy) -> Self {
        self.handle_policy = policy;
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.as_str().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.batch_read_size == 0 {
            return Err(ConfigError::ZeroBatchSize(self.name.clone()));
        }
        Ok(())
    }
}

/// Supplies the configuration of each channel the supervisor starts.
pub trait ConfigResolver {
    fn resolve(&self, channel: &ChannelId) -> ChannelConfig;
}

impl<F> ConfigResolver for F
where
    F: Fn(&ChannelId) -> ChannelConfig,
{
    fn resolve(&self, channel: &ChannelId) -> ChannelConfig {
        self(channel)
    }
}

/// Resolves every channel to [`ChannelConfig::new`] with default settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct Defaults;

impl ConfigResolver for Defaults {
    fn resolve(&self, channel: &ChannelId) -> ChannelConfig {
        ChannelConfig::new(channel)
    }
}

mod humantime_dur {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::humantime_dur::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| humantime::parse_duration(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::new("System");
        assert_eq!(config.batch_read_size, 100);
        assert_eq!(config.empty_read_wait, Duration::from_secs(10));
        assert_eq!(config.no_more_events, NoMoreEvents::Wait);
        assert_eq!(config.handle_policy, HandlePolicy::Reuse);
        assert_eq!(config.origin, Origin::Oldest);
        assert!(config.ignore_older.is_none());
        assert_eq!(Defaults.resolve(&ChannelId::from("System")), config);
    }

    #[test]
    fn test_deserialize_shipper_keys() {
        let config: ChannelConfig = serde_json::from_str(
            r#"{
                "name": "Application",
                "params": { "api": "wineventlog" },
                "include_xml": false,
                "ignore_older": "1m",
                "no_more_events": "stop",
                "batch_read_size": 50,
                "empty_read_wait": "250ms",
                "handle_policy": "reopen"
            }"#,
        )
        .unwrap();

        assert_eq!(config.name.as_str(), "Application");
        assert_eq!(config.params.get("api").map(String::as_str), Some("wineventlog"));
        assert_eq!(config.ignore_older, Some(Duration::from_secs(60)));
        assert_eq!(config.no_more_events, NoMoreEvents::Stop);
        assert_eq!(config.batch_read_size, 50);
        assert_eq!(config.empty_read_wait, Duration::from_millis(250));
        assert_eq!(config.handle_policy, HandlePolicy::Reopen);
        assert_eq!(config.origin, Origin::Oldest);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: ChannelConfig = serde_json::from_str(r#"{ "name": "System" }"#).unwrap();
        assert_eq!(config, ChannelConfig::new("System"));
    }

    #[test]
    fn test_bad_duration() {
        let res: Result<ChannelConfig, _> =
            serde_json::from_str(r#"{ "name": "System", "empty_read_wait": "soon" }"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_serialize_roundtrips_durations() {
        let config = ChannelConfig::new("System")
            .ignore_older(Duration::from_secs(90))
            .empty_read_wait(Duration::from_millis(1500));
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["ignore_older"], "1m 30s");
        assert_eq!(json["empty_read_wait"], "1s 500ms");
    }

    #[test]
    fn test_validate() {
        assert_eq!(ChannelConfig::new("").validate(), Err(ConfigError::EmptyName));
        assert_eq!(
            ChannelConfig::new("System").batch_read_size(0).validate(),
            Err(ConfigError::ZeroBatchSize(ChannelId::from("System")))
        );
    }
}

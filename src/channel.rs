use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable name of an event-log channel, such as `"System"` or `"Application"`.
///
/// Cloning is cheap; the name is shared between the supervisor, the tailer
/// that owns the channel and every event it emits.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    pub fn new(name: impl AsRef<str>) -> Self {
        ChannelId(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        ChannelId::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        ChannelId(Arc::from(name))
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0.as_ref().to_owned()
    }
}

impl From<&ChannelId> for ChannelId {
    fn from(id: &ChannelId) -> Self {
        id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelId;
    use std::collections::HashMap;

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ChannelId::from("System"), 1);

        assert_eq!(map.get("System"), Some(&1));
        assert_eq!(ChannelId::from(String::from("System")).to_string(), "System");
    }
}

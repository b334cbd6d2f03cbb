//! Service configuration read from the environment.

use std::collections::BTreeMap;
use std::time::Duration;

use atlas_shared::Topic;

const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_TEMPORAL_FLUSH_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: Option<String>,
    pub temporal_flush_interval: Duration,
    /// Base URL of the peer service gateway. In-process stubs are used when unset.
    pub peer_base_url: Option<String>,
    /// Optional JSON files seeding conversations and quest data at startup.
    pub conversation_data_path: Option<String>,
    pub quest_data_path: Option<String>,
    pub topics: TopicNames,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            cors_allowed_origins: None,
            temporal_flush_interval: Duration::from_millis(DEFAULT_TEMPORAL_FLUSH_INTERVAL_MS),
            peer_base_url: None,
            conversation_data_path: None,
            quest_data_path: None,
            topics: TopicNames::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server_port = var("SERVER_PORT")
            .or_else(|| var("PORT"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);
        let flush_ms = var("TEMPORAL_FLUSH_INTERVAL_MS")
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TEMPORAL_FLUSH_INTERVAL_MS);

        let mut topics = TopicNames::default();
        for topic in Topic::ALL {
            if let Some(name) = var(topic.env_name()) {
                topics.names.insert(topic, name);
            }
        }

        Self {
            server_host: var("SERVER_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            server_port,
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
            temporal_flush_interval: Duration::from_millis(flush_ms),
            peer_base_url: var("PEER_BASE_URL"),
            conversation_data_path: var("CONVERSATION_DATA_PATH"),
            quest_data_path: var("QUEST_DATA_PATH"),
            topics,
        }
    }
}

/// Resolved topic names. A topic without an override is named after its
/// environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicNames {
    names: BTreeMap<Topic, String>,
}

impl TopicNames {
    pub fn name(&self, topic: Topic) -> &str {
        self.names
            .get(&topic)
            .map(String::as_str)
            .unwrap_or_else(|| topic.env_name())
    }

    /// Reverse lookup used by consumers to route inbound messages.
    pub fn topic(&self, name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| self.name(*t) == name)
    }
}

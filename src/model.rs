//! # Channel and Ability Records
//!
//! Data entities loaded from the persistent store. A channel is a configured
//! upstream credential set that serves one or more models for one or more
//! groups; an ability only contributes its group name to the routing index.

use serde::{Deserialize, Serialize};

/// # Channel Status
///
/// Only `Enabled` channels are routable. The other states keep the record
/// addressable by id but out of every candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Unknown,
    Enabled,
    ManuallyDisabled,
    AutoDisabled,
}

impl ChannelStatus {
    pub fn is_enabled(self) -> bool {
        self == ChannelStatus::Enabled
    }
}

/// How a multi-key channel picks the credential for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultiKeyMode {
    #[default]
    Random,
    /// Round-robin over the key list using `multi_key_polling_index`.
    Polling,
}

/// # Channel Info
///
/// Multi-credential settings of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelInfo {
    /// Whether `Channel::key` holds several newline-separated credentials
    #[serde(default)]
    pub is_multi_key: bool,
    /// Rotation mode for multi-key channels
    #[serde(default)]
    pub multi_key_mode: MultiKeyMode,
    /// Rotation cursor, only meaningful in polling mode
    #[serde(default)]
    pub multi_key_polling_index: usize,
}

impl ChannelInfo {
    /// True when the rotation cursor is live state worth carrying across rebuilds.
    pub fn is_polling_multi_key(&self) -> bool {
        self.is_multi_key && self.multi_key_mode == MultiKeyMode::Polling
    }
}

/// # Channel
///
/// A routable upstream. `group` and `models` keep the store's
/// comma-separated form; use [`Channel::groups`] and [`Channel::model_names`]
/// to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ChannelStatus,
    /// Comma-separated group names
    #[serde(default)]
    pub group: String,
    /// Comma-separated model names
    #[serde(default)]
    pub models: String,
    /// Higher value is preferred; missing means 0
    #[serde(default)]
    pub priority: Option<i64>,
    /// Relative share within a priority tier; missing means 0
    #[serde(default)]
    pub weight: Option<u32>,
    /// JSON object mapping requested model names to upstream model names
    #[serde(default)]
    pub model_mapping: Option<String>,
    /// Credential, or newline-separated credentials for multi-key channels
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub channel_info: ChannelInfo,
}

impl Channel {
    /// Create an enabled channel with no groups, models or key.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: ChannelStatus::Enabled,
            group: String::new(),
            models: String::new(),
            priority: None,
            weight: None,
            model_mapping: None,
            key: String::new(),
            channel_info: ChannelInfo::default(),
        }
    }

    pub fn priority(&self) -> i64 {
        self.priority.unwrap_or(0)
    }

    pub fn weight(&self) -> u32 {
        self.weight.unwrap_or(0)
    }

    /// Group names with surrounding whitespace removed. Empty entries are dropped.
    pub fn groups(&self) -> Vec<String> {
        split_list(&self.group, ',')
    }

    /// Raw model names exactly as split from the store field, untrimmed.
    ///
    /// The index trims and filters after mapping expansion, so the expander
    /// sees the list the way the store holds it.
    pub fn model_names(&self) -> Vec<String> {
        if self.models.is_empty() {
            return Vec::new();
        }
        self.models.split(',').map(str::to_string).collect()
    }

    /// Credentials of this channel, one per non-empty line.
    pub fn keys(&self) -> Vec<String> {
        split_list(&self.key, '\n')
    }

    // Builder-style setters, mostly used to assemble fixtures.

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_models(mut self, models: impl Into<String>) -> Self {
        self.models = models.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_status(mut self, status: ChannelStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_model_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.model_mapping = Some(mapping.into());
        self
    }

    /// Configure newline-separated credentials and the rotation mode.
    pub fn with_multi_key(mut self, keys: &[&str], mode: MultiKeyMode) -> Self {
        self.key = keys.join("\n");
        self.channel_info.is_multi_key = true;
        self.channel_info.multi_key_mode = mode;
        self
    }
}

/// # Ability
///
/// A stored (group, model, channel) capability row. The routing index only
/// reads `group`, to know which groups exist even with no enabled channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub group: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub channel_id: i64,
    #[serde(default)]
    pub enabled: bool,
}

impl Ability {
    pub fn for_group(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            model: String::new(),
            channel_id: 0,
            enabled: false,
        }
    }
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

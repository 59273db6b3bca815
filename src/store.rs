//! # Channel Store
//!
//! The persistent-store collaborator. Routing only needs full snapshots of
//! channels and abilities, plus a direct (uncached) path with the same
//! contract as the cache for deployments that turn the memory cache off.

use crate::{
    error::RouterError,
    index::RoutingIndex,
    model::{Ability, Channel},
    model_mapping::ModelMappingExpander,
    normalize::ModelNameNormalizer,
    selector::select_channel,
    Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// # Channel Store Trait
///
/// `list_all_*` return best-effort full snapshots. The direct methods are
/// only called when the memory cache is disabled.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn list_all_channels(&self) -> Result<Vec<Channel>>;

    async fn list_all_abilities(&self) -> Result<Vec<Ability>>;

    /// Uncached equivalent of `ChannelCache::pick_channel`. The caller passes
    /// its own expander and normalizer so both paths route alike.
    async fn pick_channel(
        &self,
        group: &str,
        model: &str,
        retry: usize,
        expander: &dyn ModelMappingExpander,
        normalizer: &dyn ModelNameNormalizer,
    ) -> Result<Option<Arc<Channel>>>;

    /// Uncached point lookup. A missing id is `RouterError::ChannelNotFound`.
    async fn get_channel(&self, id: i64) -> Result<Channel>;
}

/// On-disk and in-memory snapshot layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl StoreSnapshot {
    /// Build a transient index and run the normal selection over it.
    fn pick(
        &self,
        group: &str,
        model: &str,
        retry: usize,
        expander: &dyn ModelMappingExpander,
        normalizer: &dyn ModelNameNormalizer,
    ) -> Result<Option<Arc<Channel>>> {
        let index = RoutingIndex::build(self.channels.clone(), &self.abilities, expander);
        let mut rng = fastrand::Rng::new();
        select_channel(&index, group, model, retry, normalizer, &mut rng)
    }

    fn get(&self, id: i64) -> Result<Channel> {
        self.channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(RouterError::ChannelNotFound(id))
    }
}

/// # In-Memory Channel Store
///
/// Holds a snapshot behind an async lock. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryChannelStore {
    snapshot: RwLock<StoreSnapshot>,
}

impl InMemoryChannelStore {
    pub fn new(channels: Vec<Channel>, abilities: Vec<Ability>) -> Self {
        Self {
            snapshot: RwLock::new(StoreSnapshot { channels, abilities }),
        }
    }

    /// Insert or replace a channel by id.
    pub async fn put_channel(&self, channel: Channel) {
        let mut snapshot = self.snapshot.write().await;
        match snapshot.channels.iter_mut().find(|c| c.id == channel.id) {
            Some(existing) => *existing = channel,
            None => snapshot.channels.push(channel),
        }
    }

    pub async fn remove_channel(&self, id: i64) -> bool {
        let mut snapshot = self.snapshot.write().await;
        let before = snapshot.channels.len();
        snapshot.channels.retain(|c| c.id != id);
        snapshot.channels.len() != before
    }

    pub async fn put_ability(&self, ability: Ability) {
        self.snapshot.write().await.abilities.push(ability);
    }

    /// Replace the whole snapshot.
    pub async fn replace(&self, channels: Vec<Channel>, abilities: Vec<Ability>) {
        *self.snapshot.write().await = StoreSnapshot { channels, abilities };
    }
}

#[async_trait]
impl ChannelStore for InMemoryChannelStore {
    async fn list_all_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.snapshot.read().await.channels.clone())
    }

    async fn list_all_abilities(&self) -> Result<Vec<Ability>> {
        Ok(self.snapshot.read().await.abilities.clone())
    }

    async fn pick_channel(
        &self,
        group: &str,
        model: &str,
        retry: usize,
        expander: &dyn ModelMappingExpander,
        normalizer: &dyn ModelNameNormalizer,
    ) -> Result<Option<Arc<Channel>>> {
        self.snapshot.read().await.pick(group, model, retry, expander, normalizer)
    }

    async fn get_channel(&self, id: i64) -> Result<Channel> {
        self.snapshot.read().await.get(id)
    }
}

/// # JSON File Channel Store
///
/// Reads a [`StoreSnapshot`] from a JSON file on every call, so edits to the
/// file show up at the next rebuild.
#[derive(Debug, Clone)]
pub struct JsonFileChannelStore {
    path: PathBuf,
}

impl JsonFileChannelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl ChannelStore for JsonFileChannelStore {
    async fn list_all_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.load().await?.channels)
    }

    async fn list_all_abilities(&self) -> Result<Vec<Ability>> {
        Ok(self.load().await?.abilities)
    }

    async fn pick_channel(
        &self,
        group: &str,
        model: &str,
        retry: usize,
        expander: &dyn ModelMappingExpander,
        normalizer: &dyn ModelNameNormalizer,
    ) -> Result<Option<Arc<Channel>>> {
        self.load().await?.pick(group, model, retry, expander, normalizer)
    }

    async fn get_channel(&self, id: i64) -> Result<Channel> {
        self.load().await?.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_mapping::{JsonModelMappingExpander, NoopModelMappingExpander};
    use crate::normalize::{IdentityNormalizer, WildcardModelNormalizer};
    use std::io::Write;

    fn channel(id: i64) -> Channel {
        Channel::new(id, format!("c{}", id)).with_group("default").with_models("gpt-4")
    }

    #[tokio::test]
    async fn test_in_memory_put_and_remove() {
        let store = InMemoryChannelStore::new(vec![channel(1)], vec![]);
        store.put_channel(channel(2)).await;
        store.put_channel(channel(1).with_weight(30)).await;

        let channels = store.list_all_channels().await.unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(store.get_channel(1).await.unwrap().weight(), 30);

        assert!(store.remove_channel(2).await);
        assert!(!store.remove_channel(2).await);
        assert!(matches!(store.get_channel(2).await, Err(RouterError::ChannelNotFound(2))));
    }

    #[tokio::test]
    async fn test_in_memory_direct_pick() {
        let store = InMemoryChannelStore::new(vec![channel(1)], vec![Ability::for_group("vip")]);
        let picked = store.pick_channel("default", "gpt-4", 0, &JsonModelMappingExpander, &WildcardModelNormalizer).await.unwrap();
        assert_eq!(picked.map(|c| c.id), Some(1));
        assert!(store.pick_channel("vip", "gpt-4", 0, &JsonModelMappingExpander, &WildcardModelNormalizer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_direct_pick_uses_given_collaborators() {
        let gizmo = Channel::new(1, "gizmo")
            .with_group("default")
            .with_models("gpt-4-gizmo-*")
            .with_model_mapping(r#"{"gpt-4-gizmo-*": "gpt-4o"}"#);
        let store = InMemoryChannelStore::new(vec![gizmo], vec![]);

        let strict = store
            .pick_channel("default", "gpt-4-gizmo-abc", 0, &NoopModelMappingExpander, &IdentityNormalizer)
            .await
            .unwrap();
        assert!(strict.is_none());
        let mapped = store
            .pick_channel("default", "gpt-4o", 0, &NoopModelMappingExpander, &IdentityNormalizer)
            .await
            .unwrap();
        assert!(mapped.is_none());

        let wildcard = store
            .pick_channel("default", "gpt-4-gizmo-abc", 0, &JsonModelMappingExpander, &WildcardModelNormalizer)
            .await
            .unwrap();
        assert_eq!(wildcard.map(|c| c.id), Some(1));
        let mapped = store
            .pick_channel("default", "gpt-4o", 0, &JsonModelMappingExpander, &WildcardModelNormalizer)
            .await
            .unwrap();
        assert_eq!(mapped.map(|c| c.id), Some(1));
    }

    #[tokio::test]
    async fn test_json_file_store_reads_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "channels": [
                    {{"id": 1, "name": "primary", "status": "enabled", "group": "default", "models": "gpt-4", "priority": 10, "weight": 5}},
                    {{"id": 2, "name": "backup", "status": "auto_disabled", "group": "default", "models": "gpt-4"}}
                ],
                "abilities": [{{"group": "default"}}, {{"group": "vip"}}]
            }}"#
        )
        .unwrap();

        let store = JsonFileChannelStore::new(file.path());
        assert_eq!(store.list_all_channels().await.unwrap().len(), 2);
        assert_eq!(store.list_all_abilities().await.unwrap().len(), 2);
        assert_eq!(store.get_channel(2).await.unwrap().name, "backup");

        let picked = store.pick_channel("default", "gpt-4", 0, &JsonModelMappingExpander, &WildcardModelNormalizer).await.unwrap();
        assert_eq!(picked.map(|c| c.id), Some(1));
    }

    #[tokio::test]
    async fn test_json_file_store_missing_file() {
        let store = JsonFileChannelStore::new("/nonexistent/channels.json");
        let err = store.list_all_channels().await.unwrap_err();
        assert!(matches!(err, RouterError::Store(_)));
    }

    #[tokio::test]
    async fn test_json_file_store_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[not a snapshot").unwrap();
        let store = JsonFileChannelStore::new(file.path());
        let err = store.list_all_abilities().await.unwrap_err();
        assert!(matches!(err, RouterError::Serialization(_)));
    }
}

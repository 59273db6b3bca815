//! # Channel Cache
//!
//! Owns the in-memory [`RoutingIndex`] and everything that reads or replaces
//! it: the periodic rebuild, channel selection, and the point-update API.
//!
//! ## Concurrency
//!
//! Candidate lists and channel records live in one `RoutingIndex` behind one
//! `RwLock`, so a reader always sees both from the same generation. Rebuilds
//! read the store before taking the write lock and only swap under it.
//! Rebuilds themselves run one at a time, so a slow load can never publish
//! over a newer one.
//!
//! ## Cache disabled
//!
//! With `memory_cache_enabled = false` picks and lookups go straight to the
//! store, while rebuilds and point updates do nothing.

use crate::{
    config::Config,
    error::RouterError,
    index::RoutingIndex,
    model::{Channel, ChannelInfo, ChannelStatus, MultiKeyMode},
    model_mapping::{JsonModelMappingExpander, ModelMappingExpander},
    normalize::{ModelNameNormalizer, WildcardModelNormalizer},
    selector::select_channel,
    store::ChannelStore,
    Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// # Cache Statistics
///
/// Snapshot of the current routing index generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Whether the in-memory index is in use at all
    pub enabled: bool,
    /// Number of rebuilds published since startup
    pub generation: u64,
    /// Records in the record map, any status
    pub channel_count: usize,
    /// Records whose status is enabled
    pub enabled_channel_count: usize,
    /// Groups known to the candidate index
    pub group_count: usize,
    /// Non-empty (group, model) candidate lists
    pub candidate_list_count: usize,
    /// When the current generation was published
    pub synced_at: Option<DateTime<Utc>>,
}

/// # Channel Cache
///
/// Construct once at startup, share behind an `Arc`.
pub struct ChannelCache {
    index: RwLock<RoutingIndex>,
    rebuild_lock: Mutex<()>,
    store: Arc<dyn ChannelStore>,
    expander: Arc<dyn ModelMappingExpander>,
    normalizer: Arc<dyn ModelNameNormalizer>,
    enabled: bool,
}

impl ChannelCache {
    /// Create a cache with the JSON model-mapping expander and the wildcard
    /// normalizer. The index starts empty until the first [`rebuild`](Self::rebuild).
    pub fn new(store: Arc<dyn ChannelStore>, enabled: bool) -> Self {
        Self::with_collaborators(
            store,
            Arc::new(JsonModelMappingExpander),
            Arc::new(WildcardModelNormalizer),
            enabled,
        )
    }

    pub fn from_config(config: &Config, store: Arc<dyn ChannelStore>) -> Self {
        Self::new(store, config.memory_cache_enabled)
    }

    pub fn with_collaborators(
        store: Arc<dyn ChannelStore>,
        expander: Arc<dyn ModelMappingExpander>,
        normalizer: Arc<dyn ModelNameNormalizer>,
        enabled: bool,
    ) -> Self {
        Self {
            index: RwLock::new(RoutingIndex::empty()),
            rebuild_lock: Mutex::new(()),
            store,
            expander,
            normalizer,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // =============================================================================
    // REBUILD
    // =============================================================================

    /// # Rebuild
    ///
    /// Reload every channel and ability, build a fresh index, carry polling
    /// cursors over from the current generation and publish it. A store error
    /// leaves the current generation untouched. Concurrent calls queue up
    /// and each loads after the previous one has published.
    pub async fn rebuild(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let _rebuilding = self.rebuild_lock.lock().await;

        let channels = self.store.list_all_channels().await?;
        let abilities = self.store.list_all_abilities().await?;
        let mut fresh = RoutingIndex::build(channels, &abilities, self.expander.as_ref());

        let mut index = self.index.write().await;
        fresh.carry_over_polling_cursors(&index);
        fresh.mark_synced(&index);
        *index = fresh;

        info!(
            "Channels synced from store: generation {}, {} channels ({} enabled), {} groups",
            index.generation(),
            index.channel_count(),
            index.enabled_channel_count(),
            index.group_count()
        );
        Ok(())
    }

    /// Force a rebuild now, outside the periodic schedule.
    pub async fn trigger_rebuild(&self) -> Result<()> {
        info!("Manual channel cache rebuild requested");
        self.rebuild().await
    }

    /// # Spawn Sync Task
    ///
    /// Rebuild every `frequency` for the rest of the process. Failed rebuilds
    /// are logged and the previous generation keeps serving.
    pub fn spawn_sync_task(self: &Arc<Self>, frequency: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(frequency).await;
                debug!("Syncing channels from store");
                if let Err(err) = cache.rebuild().await {
                    warn!("Channel sync failed, keeping generation {}: {}", cache.generation().await, err);
                }
            }
        })
    }

    // =============================================================================
    // SELECTION
    // =============================================================================

    /// # Pick Channel
    ///
    /// Choose a channel for (group, model). `retry` is the number of failed
    /// attempts so far and moves the pick to lower priority tiers. `Ok(None)`
    /// means nothing serves the pair.
    pub async fn pick_channel(&self, group: &str, model: &str, retry: usize) -> Result<Option<Arc<Channel>>> {
        if !self.enabled {
            return self
                .store
                .pick_channel(group, model, retry, self.expander.as_ref(), self.normalizer.as_ref())
                .await;
        }

        let index = self.index.read().await;
        let mut rng = fastrand::Rng::new();
        select_channel(&index, group, model, retry, self.normalizer.as_ref(), &mut rng)
    }

    // =============================================================================
    // POINT UPDATES
    // =============================================================================

    /// Channel by id, whatever its status.
    pub async fn get_channel(&self, id: i64) -> Result<Arc<Channel>> {
        if !self.enabled {
            return self.store.get_channel(id).await.map(Arc::new);
        }

        self.index
            .read()
            .await
            .channel(id)
            .cloned()
            .ok_or(RouterError::ChannelNotFound(id))
    }

    /// Multi-key settings of a channel by id.
    pub async fn get_channel_info(&self, id: i64) -> Result<ChannelInfo> {
        if !self.enabled {
            return self.store.get_channel(id).await.map(|c| c.channel_info);
        }

        self.index
            .read()
            .await
            .channel(id)
            .map(|c| c.channel_info.clone())
            .ok_or(RouterError::ChannelNotFound(id))
    }

    /// # Update Channel Status
    ///
    /// Set the status of a cached record. Any non-enabled status also removes
    /// the channel from every candidate list immediately. Enabling does not
    /// add it back: that waits for the next rebuild.
    pub async fn update_channel_status(&self, id: i64, status: ChannelStatus) {
        if !self.enabled {
            return;
        }

        let mut index = self.index.write().await;
        if let Some(channel) = index.channel_mut(id) {
            channel.status = status;
        }
        if !status.is_enabled() {
            let removed = index.remove_candidate(id);
            info!("Channel #{} set to {:?}, removed from {} candidate lists", id, status, removed);
        }
    }

    /// Replace the cached record for `channel.id`. Candidate lists are not
    /// touched, so routing changes (groups, models, priority, status) wait
    /// for the next rebuild.
    pub async fn update_channel(&self, channel: Channel) {
        if !self.enabled {
            return;
        }

        let id = channel.id;
        self.index.write().await.upsert_channel(channel);
        debug!("Channel #{} record replaced in cache", id);
    }

    /// # Next Channel Key
    ///
    /// Credential to use for the next request on channel `id`. Polling
    /// multi-key channels advance their rotation cursor; random mode draws a
    /// key uniformly.
    pub async fn next_channel_key(&self, id: i64) -> Result<String> {
        if !self.enabled {
            let channel = self.store.get_channel(id).await?;
            return next_key(&channel);
        }

        let mut index = self.index.write().await;
        let channel = index.channel_mut(id).ok_or(RouterError::ChannelNotFound(id))?;
        let key = next_key(channel)?;
        if channel.channel_info.is_polling_multi_key() {
            channel.channel_info.multi_key_polling_index = channel.channel_info.multi_key_polling_index.wrapping_add(1);
        }
        Ok(key)
    }

    // =============================================================================
    // INTROSPECTION
    // =============================================================================

    pub async fn generation(&self) -> u64 {
        self.index.read().await.generation()
    }

    pub async fn stats(&self) -> CacheStats {
        let index = self.index.read().await;
        CacheStats {
            enabled: self.enabled,
            generation: index.generation(),
            channel_count: index.channel_count(),
            enabled_channel_count: index.enabled_channel_count(),
            group_count: index.group_count(),
            candidate_list_count: index.candidate_list_count(),
            synced_at: index.synced_at(),
        }
    }

    /// Run `f` against the current index under the read lock.
    pub async fn with_index<R>(&self, f: impl FnOnce(&RoutingIndex) -> R) -> R {
        let index = self.index.read().await;
        f(&*index)
    }
}

/// Key selected by the channel's current cursor, without advancing it.
fn next_key(channel: &Channel) -> Result<String> {
    let keys = channel.keys();
    if keys.is_empty() {
        return Err(RouterError::Config(format!("channel #{} has no keys configured", channel.id)));
    }
    if !channel.channel_info.is_multi_key {
        return Ok(keys[0].clone());
    }

    let pos = match channel.channel_info.multi_key_mode {
        MultiKeyMode::Polling => channel.channel_info.multi_key_polling_index % keys.len(),
        MultiKeyMode::Random => fastrand::usize(0..keys.len()),
    };
    Ok(keys[pos].clone())
}

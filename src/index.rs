//! # Routing Index
//!
//! The two structures routing reads, kept together as one value:
//!
//! - the candidate index, group -> model -> channel ids sorted by descending
//!   priority, holding enabled channels only;
//! - the record map, id -> channel, holding every channel whatever its status.
//!
//! Building and merging are pure; the owner swaps whole indexes under its lock.

use crate::{
    model::{Ability, Channel},
    model_mapping::ModelMappingExpander,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Model name -> candidate channel ids.
pub type ModelCandidates = HashMap<String, Vec<i64>>;

#[derive(Debug, Clone, Default)]
pub struct RoutingIndex {
    candidates: HashMap<String, ModelCandidates>,
    channels: HashMap<i64, Arc<Channel>>,
    generation: u64,
    synced_at: Option<DateTime<Utc>>,
}

impl RoutingIndex {
    /// An index with no groups and no channels.
    pub fn empty() -> Self {
        Self::default()
    }

    /// # Build
    ///
    /// Seeds one empty model map per ability group, registers every enabled
    /// channel under each (group, model) it serves, then orders each
    /// candidate list by descending priority.
    pub fn build(
        channels: Vec<Channel>,
        abilities: &[Ability],
        expander: &dyn ModelMappingExpander,
    ) -> Self {
        let mut candidates: HashMap<String, ModelCandidates> = HashMap::new();
        for ability in abilities {
            candidates.entry(ability.group.clone()).or_default();
        }

        let channels: Vec<Arc<Channel>> = channels.into_iter().map(Arc::new).collect();

        // Store order decides the order of equal-priority candidates.
        for channel in &channels {
            if !channel.status.is_enabled() {
                continue;
            }

            let base_models = channel.model_names();
            let base_len = base_models.len();
            let models = expander.expand(channel, base_models);
            if models.len() != base_len {
                debug!(
                    "Channel #{}: models expanded from {} to {}: {:?}",
                    channel.id,
                    base_len,
                    models.len(),
                    models
                );
            }

            for group in channel.groups() {
                let model_map = candidates.entry(group).or_default();
                for model in &models {
                    let model = model.trim();
                    if model.is_empty() {
                        continue;
                    }
                    model_map.entry(model.to_string()).or_default().push(channel.id);
                }
            }
        }

        let channels: HashMap<i64, Arc<Channel>> = channels
            .into_iter()
            .map(|channel| (channel.id, channel))
            .collect();

        for model_map in candidates.values_mut() {
            for ids in model_map.values_mut() {
                ids.sort_by_key(|id| {
                    std::cmp::Reverse(channels.get(id).map(|c| c.priority()).unwrap_or(i64::MIN))
                });
            }
        }

        Self {
            candidates,
            channels,
            generation: 0,
            synced_at: None,
        }
    }

    /// Ids registered for (group, model), or an empty slice.
    pub fn candidates(&self, group: &str, model: &str) -> &[i64] {
        self.candidates
            .get(group)
            .and_then(|models| models.get(model))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Model map of a group; `None` means the group is unknown.
    pub fn group(&self, group: &str) -> Option<&ModelCandidates> {
        self.candidates.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.candidates.keys().map(String::as_str)
    }

    pub fn channel(&self, id: i64) -> Option<&Arc<Channel>> {
        self.channels.get(&id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels.values()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn enabled_channel_count(&self) -> usize {
        self.channels.values().filter(|c| c.status.is_enabled()).count()
    }

    pub fn group_count(&self) -> usize {
        self.candidates.len()
    }

    /// Number of non-empty (group, model) candidate lists.
    pub fn candidate_list_count(&self) -> usize {
        self.candidates
            .values()
            .flat_map(HashMap::values)
            .filter(|ids| !ids.is_empty())
            .count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    /// Stamp this index as the successor of `previous`.
    pub(crate) fn mark_synced(&mut self, previous: &RoutingIndex) {
        self.generation = previous.generation + 1;
        self.synced_at = Some(Utc::now());
    }

    /// # Carry Over Polling Cursors
    ///
    /// For every channel that is a polling multi-key channel in both this
    /// index and `previous`, keep the cursor from `previous`. The store's
    /// value is stale as soon as the first request rotated the key.
    pub fn carry_over_polling_cursors(&mut self, previous: &RoutingIndex) {
        for (id, channel) in self.channels.iter_mut() {
            if !channel.channel_info.is_polling_multi_key() {
                continue;
            }
            let Some(old) = previous.channels.get(id) else {
                continue;
            };
            if !old.channel_info.is_polling_multi_key() {
                continue;
            }
            let cursor = old.channel_info.multi_key_polling_index;
            if channel.channel_info.multi_key_polling_index != cursor {
                Arc::make_mut(channel).channel_info.multi_key_polling_index = cursor;
            }
        }
    }

    /// Drop `id` from every candidate list. Returns how many lists changed.
    pub fn remove_candidate(&mut self, id: i64) -> usize {
        let mut removed = 0;
        for model_map in self.candidates.values_mut() {
            for ids in model_map.values_mut() {
                let before = ids.len();
                ids.retain(|candidate| *candidate != id);
                if ids.len() != before {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Mutable access to a record, cloning it first if a reader still holds it.
    pub fn channel_mut(&mut self, id: i64) -> Option<&mut Channel> {
        self.channels.get_mut(&id).map(Arc::make_mut)
    }

    #[cfg(test)]
    pub(crate) fn remove_record(&mut self, id: i64) {
        self.channels.remove(&id);
    }

    /// Replace the record for `channel.id`. Candidate lists are untouched.
    pub fn upsert_channel(&mut self, channel: Channel) {
        self.channels.insert(channel.id, Arc::new(channel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelStatus, MultiKeyMode};
    use crate::model_mapping::{JsonModelMappingExpander, NoopModelMappingExpander};

    fn channel(id: i64, priority: i64) -> Channel {
        Channel::new(id, format!("c{}", id))
            .with_group("default")
            .with_models("gpt-4")
            .with_priority(priority)
            .with_weight(10)
    }

    #[test]
    fn test_sorted_by_descending_priority() {
        let index = RoutingIndex::build(
            vec![channel(1, 0), channel(2, 10), channel(3, 5), channel(4, -2)],
            &[],
            &NoopModelMappingExpander,
        );
        assert_eq!(index.candidates("default", "gpt-4"), &[2, 3, 1, 4]);
    }

    #[test]
    fn test_disabled_channels_only_in_record_map() {
        let index = RoutingIndex::build(
            vec![channel(1, 0), channel(2, 0).with_status(ChannelStatus::ManuallyDisabled)],
            &[],
            &NoopModelMappingExpander,
        );
        assert_eq!(index.candidates("default", "gpt-4"), &[1]);
        assert!(index.channel(2).is_some());
        assert_eq!(index.channel_count(), 2);
        assert_eq!(index.enabled_channel_count(), 1);
    }

    #[test]
    fn test_ability_groups_are_seeded() {
        let index = RoutingIndex::build(vec![], &[Ability::for_group("vip")], &NoopModelMappingExpander);
        assert!(index.group("vip").is_some());
        assert!(index.group("vip").unwrap().is_empty());
        assert!(index.group("unknown").is_none());
        assert!(index.candidates("vip", "gpt-4").is_empty());
    }

    #[test]
    fn test_multiple_groups_and_trimmed_models() {
        let c = Channel::new(1, "c1").with_group("default,vip").with_models(" gpt-4 , ,claude-3");
        let index = RoutingIndex::build(vec![c], &[], &NoopModelMappingExpander);
        for group in ["default", "vip"] {
            assert_eq!(index.candidates(group, "gpt-4"), &[1]);
            assert_eq!(index.candidates(group, "claude-3"), &[1]);
            assert!(index.candidates(group, "").is_empty());
        }
        assert_eq!(index.candidate_list_count(), 4);
    }

    #[test]
    fn test_mapping_targets_are_indexed() {
        let c = Channel::new(1, "c1")
            .with_group("default")
            .with_models("gpt-4")
            .with_model_mapping(r#"{"gpt-4": "gpt-4-0613"}"#);
        let index = RoutingIndex::build(vec![c], &[], &JsonModelMappingExpander);
        assert_eq!(index.candidates("default", "gpt-4-0613"), &[1]);
    }

    #[test]
    fn test_cursor_carried_over() {
        let mut old_channel = channel(1, 0).with_multi_key(&["a", "b", "c", "d"], MultiKeyMode::Polling);
        old_channel.channel_info.multi_key_polling_index = 3;
        let old = RoutingIndex::build(vec![old_channel], &[], &NoopModelMappingExpander);

        let fresh = channel(1, 0).with_multi_key(&["a", "b", "c", "d"], MultiKeyMode::Polling);
        let mut new = RoutingIndex::build(vec![fresh], &[], &NoopModelMappingExpander);
        new.carry_over_polling_cursors(&old);

        assert_eq!(new.channel(1).unwrap().channel_info.multi_key_polling_index, 3);
    }

    #[test]
    fn test_cursor_not_carried_when_mode_changes() {
        let mut old_channel = channel(1, 0).with_multi_key(&["a", "b"], MultiKeyMode::Random);
        old_channel.channel_info.multi_key_polling_index = 5;
        let old = RoutingIndex::build(vec![old_channel], &[], &NoopModelMappingExpander);

        let fresh = channel(1, 0).with_multi_key(&["a", "b"], MultiKeyMode::Polling);
        let mut new = RoutingIndex::build(vec![fresh.clone()], &[], &NoopModelMappingExpander);
        new.carry_over_polling_cursors(&old);
        assert_eq!(new.channel(1).unwrap().channel_info.multi_key_polling_index, 0);

        // New generation switched to random: nothing to carry.
        let mut polling_old = fresh;
        polling_old.channel_info.multi_key_polling_index = 4;
        let old = RoutingIndex::build(vec![polling_old], &[], &NoopModelMappingExpander);
        let random = channel(1, 0).with_multi_key(&["a", "b"], MultiKeyMode::Random);
        let mut new = RoutingIndex::build(vec![random], &[], &NoopModelMappingExpander);
        new.carry_over_polling_cursors(&old);
        assert_eq!(new.channel(1).unwrap().channel_info.multi_key_polling_index, 0);
    }

    #[test]
    fn test_remove_candidate_everywhere() {
        let c = Channel::new(1, "c1").with_group("default,vip").with_models("a,b");
        let mut index = RoutingIndex::build(vec![c, channel(2, 0)], &[], &NoopModelMappingExpander);
        assert_eq!(index.remove_candidate(1), 4);
        assert!(index.candidates("vip", "a").is_empty());
        assert_eq!(index.candidates("default", "gpt-4"), &[2]);
        assert!(index.channel(1).is_some());
    }

    #[test]
    fn test_mark_synced_advances_generation() {
        let first = RoutingIndex::empty();
        let mut second = RoutingIndex::empty();
        second.mark_synced(&first);
        assert_eq!(second.generation(), 1);
        assert!(second.synced_at().is_some());
    }
}

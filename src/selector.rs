//! # Channel Selection
//!
//! Priority-tiered weighted selection over a [`RoutingIndex`].
//!
//! ## Algorithm
//!
//! 1. Look up the candidates for (group, model), falling back once to the
//!    normalized model name.
//! 2. A single candidate is returned as-is.
//! 3. Otherwise the distinct priorities are sorted descending and the retry
//!    count picks the tier, clamped to the lowest one.
//! 4. A roulette-wheel draw over the tier's weights picks the channel. Tiny or
//!    all-zero weights are smoothed first so the draw stays fair.

use crate::{
    error::RouterError,
    index::RoutingIndex,
    model::Channel,
    normalize::ModelNameNormalizer,
    Result,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Weight multiplier applied when the tier's average weight is below
/// [`SMALL_WEIGHT_THRESHOLD`].
pub const SMOOTHING_FACTOR: u64 = 100;

/// Effective weight every channel gets when the whole tier has weight 0.
pub const ZERO_WEIGHT_BONUS: u64 = 100;

/// Average weight below which weights are scaled by [`SMOOTHING_FACTOR`].
pub const SMALL_WEIGHT_THRESHOLD: u64 = 10;

/// # Select Channel
///
/// Returns `Ok(None)` when nothing serves the pair. Any candidate id missing
/// from the record map aborts the call with [`RouterError::DataInconsistency`].
pub fn select_channel(
    index: &RoutingIndex,
    group: &str,
    model: &str,
    retry: usize,
    normalizer: &dyn ModelNameNormalizer,
    rng: &mut fastrand::Rng,
) -> Result<Option<Arc<Channel>>> {
    let mut candidates = index.candidates(group, model);
    debug!("Channel lookup: group={}, model={}, found={}", group, model, candidates.len());

    if candidates.is_empty() {
        let normalized = normalizer.normalize(model);
        if normalized != model {
            candidates = index.candidates(group, &normalized);
            debug!("Normalized model {} -> {}, found={}", model, normalized, candidates.len());
        }
    }

    if candidates.is_empty() {
        log_cache_miss(index, group);
        return Ok(None);
    }

    if let [only] = candidates {
        return resolve(index, *only).map(Some);
    }

    let tier = tier_priority(index, candidates, retry)?;

    let mut tied = Vec::new();
    for id in candidates {
        let channel = resolve(index, *id)?;
        if channel.priority() == tier {
            tied.push(channel);
        }
    }

    if tied.is_empty() {
        return Err(exhausted(group, model, tier));
    }

    let weights: Vec<u32> = tied.iter().map(|c| c.weight()).collect();
    match weighted_draw(&weights, rng) {
        Some(pos) => Ok(Some(Arc::clone(&tied[pos]))),
        None => Err(exhausted(group, model, tier)),
    }
}

/// Priority of the tier used for attempt number `retry`.
fn tier_priority(index: &RoutingIndex, candidates: &[i64], retry: usize) -> Result<i64> {
    let mut priorities = Vec::with_capacity(candidates.len());
    for id in candidates {
        priorities.push(resolve(index, *id)?.priority());
    }
    priorities.sort_unstable_by(|a, b| b.cmp(a));
    priorities.dedup();

    let tier = retry.min(priorities.len() - 1);
    if tier != retry {
        debug!("Retry {} exceeds {} priority tiers, using tier {}", retry, priorities.len(), tier);
    }
    Ok(priorities[tier])
}

/// # Weighted Draw
///
/// Roulette-wheel draw over `weights`, iterating in slice order. Returns the
/// chosen position, or `None` for an empty slice.
///
/// - all weights 0: each entry counts as [`ZERO_WEIGHT_BONUS`] (uniform);
/// - average below [`SMALL_WEIGHT_THRESHOLD`]: every weight is scaled by
///   [`SMOOTHING_FACTOR`];
/// - otherwise weights are used as-is.
pub fn weighted_draw(weights: &[u32], rng: &mut fastrand::Rng) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let count = weights.len() as u64;
    let sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();

    let (factor, bonus, total) = if sum == 0 {
        (1, ZERO_WEIGHT_BONUS, count * ZERO_WEIGHT_BONUS)
    } else if sum / count < SMALL_WEIGHT_THRESHOLD {
        (SMOOTHING_FACTOR, 0, sum * SMOOTHING_FACTOR)
    } else {
        (1, 0, sum)
    };

    let mut remaining = rng.u64(0..total);
    for (pos, weight) in weights.iter().enumerate() {
        let effective = u64::from(*weight) * factor + bonus;
        if remaining < effective {
            return Some(pos);
        }
        remaining -= effective;
    }
    None
}

fn resolve(index: &RoutingIndex, id: i64) -> Result<Arc<Channel>> {
    match index.channel(id) {
        Some(channel) => Ok(Arc::clone(channel)),
        None => {
            error!("Channel #{} is indexed as a candidate but missing from the record map", id);
            Err(RouterError::DataInconsistency { channel_id: id })
        }
    }
}

fn exhausted(group: &str, model: &str, priority: i64) -> RouterError {
    RouterError::SelectionExhausted {
        group: group.to_string(),
        model: model.to_string(),
        priority,
    }
}

fn log_cache_miss(index: &RoutingIndex, group: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let groups: Vec<&str> = index.groups().collect();
    debug!("Channel cache miss, known groups: {:?}", groups);
    if let Some(models) = index.group(group) {
        let models: Vec<&String> = models.keys().collect();
        debug!("Models known in group '{}': {:?}", group, models);
    }
}

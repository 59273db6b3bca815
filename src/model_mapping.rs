//! # Model Mapping Expansion
//!
//! A channel may rename requested models before sending them upstream
//! (`model_mapping`, a JSON object of requested name to upstream name). The
//! routing index also registers the mapping targets so that a request naming
//! the upstream model directly still reaches the channel.

use crate::model::Channel;
use std::collections::HashMap;
use tracing::warn;

/// # Model Mapping Expander
///
/// Pure and deterministic for a given channel configuration. The result must
/// contain every input name, in input order, and may append more.
pub trait ModelMappingExpander: Send + Sync {
    fn expand(&self, channel: &Channel, models: Vec<String>) -> Vec<String>;
}

/// Expander that appends the targets of `Channel::model_mapping`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelMappingExpander;

impl ModelMappingExpander for JsonModelMappingExpander {
    fn expand(&self, channel: &Channel, mut models: Vec<String>) -> Vec<String> {
        let Some(raw) = channel.model_mapping.as_deref() else {
            return models;
        };
        let raw = raw.trim();
        if raw.is_empty() || raw == "{}" {
            return models;
        }

        let mapping: HashMap<String, String> = match serde_json::from_str(raw) {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!("Channel #{} has an invalid model_mapping, ignoring it: {}", channel.id, err);
                return models;
            }
        };

        let mut targets = Vec::new();
        for model in &models {
            if let Some(target) = mapping.get(model.trim()) {
                let target = target.trim();
                if !target.is_empty()
                    && !models.iter().any(|m| m.trim() == target)
                    && !targets.iter().any(|t: &String| t == target)
                {
                    targets.push(target.to_string());
                }
            }
        }
        models.extend(targets);
        models
    }
}

/// Expander that returns the raw list untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopModelMappingExpander;

impl ModelMappingExpander for NoopModelMappingExpander {
    fn expand(&self, _channel: &Channel, models: Vec<String>) -> Vec<String> {
        models
    }
}

//! # Model Name Normalization
//!
//! Fallback lookup key used when a requested model name has no exact match
//! in the routing index.

/// Maps a requested model name to the canonical name channels declare.
pub trait ModelNameNormalizer: Send + Sync {
    fn normalize(&self, model: &str) -> String;
}

/// Returns every name unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl ModelNameNormalizer for IdentityNormalizer {
    fn normalize(&self, model: &str) -> String {
        model.to_string()
    }
}

/// Bases whose `-thinking-<budget>` variants share one wildcard entry.
/// Longer prefixes come first so `flash-lite` is not caught by `flash`.
const THINKING_BUDGET_BASES: [&str; 3] = ["gemini-2.5-flash-lite", "gemini-2.5-flash", "gemini-2.5-pro"];

/// Prefixes that collapse to `<prefix>-*`.
const WILDCARD_PREFIXES: [&str; 2] = ["gpt-4-gizmo", "gpt-4o-gizmo"];

/// # Wildcard Normalizer
///
/// Collapses families of generated model names onto the wildcard name an
/// operator declares once on a channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardModelNormalizer;

impl ModelNameNormalizer for WildcardModelNormalizer {
    fn normalize(&self, model: &str) -> String {
        for base in THINKING_BUDGET_BASES {
            if let Some(rest) = model.strip_prefix(base) {
                if rest.starts_with("-thinking-") {
                    return format!("{}-thinking-*", base);
                }
                break;
            }
        }

        for prefix in WILDCARD_PREFIXES {
            if model.starts_with(prefix) {
                return format!("{}-*", prefix);
            }
        }

        model.to_string()
    }
}

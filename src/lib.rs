//! # Channel Router
//!
//! The routing core of an LLM API gateway. Given a tenant group and a model
//! name it picks one of many configured upstream channels, honoring priority
//! tiers, weighted distribution inside a tier, channel status, and failover
//! to lower tiers on retry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use channel_router::{ChannelCache, JsonFileChannelStore};
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> channel_router::Result<()> {
//!     let store = Arc::new(JsonFileChannelStore::new("channels.json"));
//!     let cache = Arc::new(ChannelCache::new(store, true));
//!
//!     cache.rebuild().await?;
//!     cache.spawn_sync_task(Duration::from_secs(60));
//!
//!     if let Some(channel) = cache.pick_channel("default", "gpt-4", 0).await? {
//!         println!("routing to channel #{} ({})", channel.id, channel.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - Channel and ability records
//! - [`index`] - The routing index: candidate lists plus the record map
//! - [`selector`] - Priority-tiered weighted selection
//! - [`cache`] - Owned cache component: rebuild loop, picks, point updates
//! - [`store`] - Persistent store collaborator and bundled stores
//! - [`model_mapping`] - Model mapping expansion used while indexing
//! - [`normalize`] - Fallback model name normalization
//! - [`config`] - Configuration management with CLI and environment support
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod model_mapping;
pub mod normalize;
pub mod selector;
pub mod store;

pub use cache::{CacheStats, ChannelCache};
pub use config::Config;
pub use error::RouterError;
pub use index::RoutingIndex;
pub use model::{Ability, Channel, ChannelInfo, ChannelStatus, MultiKeyMode};
pub use model_mapping::{JsonModelMappingExpander, ModelMappingExpander, NoopModelMappingExpander};
pub use normalize::{IdentityNormalizer, ModelNameNormalizer, WildcardModelNormalizer};
pub use selector::{select_channel, weighted_draw};
pub use store::{ChannelStore, InMemoryChannelStore, JsonFileChannelStore, StoreSnapshot};

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, RouterError>;

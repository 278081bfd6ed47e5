//! PStream - secure network boundary for the PStream streaming client
//!
//! The client reaches the internal backend only through the edge proxy.
//! Both halves live here.
//!
//! # Modules
//!
//! - `api` - Secure API client, error normalization, domain adapter, mock data
//! - `proxy` - Edge proxy that forwards approved routes to the backend
//! - `settings` - Instance URL settings
//! - `store` - Persistent key-value settings
//! - `models` - Media items and playable sources
//! - `config` - Client and proxy configuration

pub mod api;
pub mod config;
pub mod models;
pub mod proxy;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, BackendAccessForbidden, ClientError, PStreamApi};
pub use config::{ClientConfig, ProxyConfig};
pub use models::{MediaItem, MediaKind, Source, SourceKind};
pub use settings::InstanceSettings;
pub use store::{FileStore, KeyValueStore, MemoryStore};

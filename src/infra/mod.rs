//! Infrastructure - configuration, metrics, and request pacing
//!
//! - `config` - Application configuration (TOML loading, env overrides, defaults)
//! - `metrics` - Lock-free metrics collection
//! - `pacer` - Minimum spacing between remote calls

pub mod config;
pub mod metrics;
pub mod pacer;

// Re-export commonly used types
pub use config::Config;
pub use metrics::Metrics;
pub use pacer::Pacer;

//! The shortening service of Snicket.
//!
//! Ties the pieces together: URL normalization, collision-checked code
//! generation against a [`Store`](snicket_core::Store), lifetime metrics,
//! health probing and the periodic purge task.

pub mod config;
pub mod error;
pub mod health;
pub mod normalize;
pub mod scheduler;
pub mod service;

pub use config::{LimiterConfig, ServiceConfig};
pub use error::ServiceError;
pub use health::{HealthReport, HealthService, HealthStatus, StorageHealth};
pub use normalize::normalize_url;
pub use scheduler::{run_purge, spawn_purge};
pub use service::ShortenerService;

mod admin_executor;
mod app_config;
mod observability;

pub use admin_executor::{AdminConfig, ExecutorConfig};
pub use app_config::AppConfig;
pub use observability::ObservabilityConfig;

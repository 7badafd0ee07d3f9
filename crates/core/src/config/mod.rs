//! 配置管理
//!
//! 加载顺序: 内置默认值 -> TOML 配置文件 -> 环境变量覆盖（前缀 `TASKMESH`，层级分隔符 `__`）。
//!
//! ```toml
//! [admin]
//! bind_address = "0.0.0.0:8080"
//! access_token = "default_token"
//!
//! [executor]
//! app_name = "taskmesh-executor-sample"
//! admin_addresses = ["http://127.0.0.1:8080"]
//! ```

pub mod models;

pub use models::{AdminConfig, AppConfig, ExecutorConfig, ObservabilityConfig};

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    admin_executor::{AdminConfig, ExecutorConfig},
    observability::ObservabilityConfig,
};

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/taskmesh.toml",
    "taskmesh.toml",
    "/etc/taskmesh/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub admin: AdminConfig,
    pub executor: ExecutorConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: TASKMESH__)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKMESH")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("executor.admin_addresses")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin.enabled {
            self.admin.validate().context("调度中心配置验证失败")?;
        }

        if self.executor.enabled {
            self.executor.validate().context("执行器配置验证失败")?;
        }

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_toml_partial_sections() {
        let toml_str = r#"
            [executor]
            app_name = "order-executor"
            admin_addresses = ["http://10.0.0.1:8080", "http://10.0.0.2:8080"]
            log_retention_days = 7

            [observability]
            log_format = "json"
        "#;

        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.executor.app_name, "order-executor");
        assert_eq!(config.executor.admin_addresses.len(), 2);
        assert_eq!(config.executor.log_retention_days, 7);
        assert_eq!(config.executor.poll_wait_seconds, 3);
        assert_eq!(config.admin.trigger_pool_fast_max, 200);
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.admin.bind_address, config.admin.bind_address);
        assert_eq!(parsed.executor.idle_limit, config.executor.idle_limit);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let toml_str = r#"
            [observability]
            log_level = "verbose"
        "#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[admin]\nbind_address = \"127.0.0.1:18080\"\naccess_token = \"token\"\n"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.admin.bind_address, "127.0.0.1:18080");
        assert_eq!(config.admin.access_token(), Some("token"));
        assert_eq!(config.executor.beat_interval_seconds, 30);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AppConfig::load(Some("/nonexistent/taskmesh.toml")).is_err());
    }
}

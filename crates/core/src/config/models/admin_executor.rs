use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 调度中心配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    pub bind_address: String,
    /// 对外公布的调度中心地址，写入调度日志
    pub public_address: String,
    /// 为空表示不校验访问令牌
    pub access_token: String,
    pub rpc_timeout_seconds: u64,
    pub trigger_pool_fast_max: usize,
    pub trigger_pool_slow_max: usize,
    pub schedule_enabled: bool,
    pub beat_interval_seconds: u64,
    pub fail_monitor_interval_seconds: u64,
    pub lost_result_minutes: i64,
    /// 启动时导入的执行器分组与任务定义（JSON）
    pub bootstrap_file: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            public_address: "http://127.0.0.1:8080".to_string(),
            access_token: String::new(),
            rpc_timeout_seconds: 3,
            trigger_pool_fast_max: 200,
            trigger_pool_slow_max: 100,
            schedule_enabled: true,
            beat_interval_seconds: 30,
            fail_monitor_interval_seconds: 10,
            lost_result_minutes: 10,
            bootstrap_file: None,
        }
    }
}

impl AdminConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("调度中心监听地址不能为空"));
        }

        if self.trigger_pool_fast_max == 0 || self.trigger_pool_slow_max == 0 {
            return Err(anyhow::anyhow!("触发线程池大小必须大于0"));
        }

        if self.beat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.rpc_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("RPC超时时间必须大于0"));
        }

        if self.lost_result_minutes <= 0 {
            return Err(anyhow::anyhow!("结果丢失判定时间必须大于0"));
        }

        Ok(())
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn beat_interval(&self) -> Duration {
        Duration::from_secs(self.beat_interval_seconds)
    }

    /// 注册信息超过三个心跳周期未更新视为下线
    pub fn dead_timeout(&self) -> Duration {
        Duration::from_secs(self.beat_interval_seconds * 3)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}

/// 执行器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub enabled: bool,
    pub app_name: String,
    pub bind_address: String,
    /// 注册到调度中心的地址，为空时根据主机名和端口生成
    pub address: Option<String>,
    pub admin_addresses: Vec<String>,
    pub access_token: String,
    pub log_path: String,
    /// 小于3天时不清理日志文件
    pub log_retention_days: i64,
    pub beat_interval_seconds: u64,
    pub poll_wait_seconds: u64,
    pub idle_limit: u32,
    pub callback_retry_attempts: u32,
    pub callback_retry_delay_ms: u64,
    pub rpc_timeout_seconds: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "taskmesh-executor-sample".to_string(),
            bind_address: "0.0.0.0:9999".to_string(),
            address: None,
            admin_addresses: vec!["http://127.0.0.1:8080".to_string()],
            access_token: String::new(),
            log_path: "logs/jobhandler".to_string(),
            log_retention_days: 30,
            beat_interval_seconds: 30,
            poll_wait_seconds: 3,
            idle_limit: 30,
            callback_retry_attempts: 3,
            callback_retry_delay_ms: 500,
            rpc_timeout_seconds: 3,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(anyhow::anyhow!("执行器AppName不能为空"));
        }

        if self.app_name.len() > 64 {
            return Err(anyhow::anyhow!(
                "执行器AppName长度不能超过64: {}",
                self.app_name
            ));
        }

        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("执行器监听地址不能为空"));
        }

        for admin in &self.admin_addresses {
            if !admin.starts_with("http://") && !admin.starts_with("https://") {
                return Err(anyhow::anyhow!("无效的调度中心地址: {}", admin));
            }
        }

        if self.log_path.is_empty() {
            return Err(anyhow::anyhow!("日志目录不能为空"));
        }

        if self.beat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.poll_wait_seconds == 0 {
            return Err(anyhow::anyhow!("任务轮询等待时间必须大于0"));
        }

        if self.callback_retry_attempts == 0 {
            return Err(anyhow::anyhow!("回调重试次数必须大于0"));
        }

        Ok(())
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn beat_interval(&self) -> Duration {
        Duration::from_secs(self.beat_interval_seconds)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.poll_wait_seconds)
    }

    pub fn callback_retry_delay(&self) -> Duration {
        Duration::from_millis(self.callback_retry_delay_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

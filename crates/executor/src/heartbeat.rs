use std::sync::Arc;
use std::time::Duration;

use taskmesh_domain::{AdminClient, RegistryParam, RegistryType};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 定期向调度中心注册，停止时注销
pub struct HeartbeatRegistrar {
    admins: Vec<Arc<dyn AdminClient>>,
    app_name: String,
    address: String,
    beat_interval: Duration,
}

impl HeartbeatRegistrar {
    pub fn new(
        admins: Vec<Arc<dyn AdminClient>>,
        app_name: impl Into<String>,
        address: impl Into<String>,
        beat_interval: Duration,
    ) -> Self {
        Self {
            admins,
            app_name: app_name.into(),
            address: address.into(),
            beat_interval,
        }
    }

    fn param(&self) -> RegistryParam {
        RegistryParam::new(
            RegistryType::Executor.as_str(),
            self.app_name.clone(),
            self.address.clone(),
        )
    }

    /// 依次尝试各调度中心，任一成功即返回 true
    pub async fn register_once(&self) -> bool {
        let param = self.param();
        for admin in &self.admins {
            match admin.registry(param.clone()).await {
                Ok(result) if result.is_success() => {
                    debug!("执行器注册成功, 调度中心={}", admin.address());
                    return true;
                }
                Ok(result) => warn!(
                    "执行器注册失败, 调度中心={}, msg={}",
                    admin.address(),
                    result.msg_or_empty()
                ),
                Err(e) => warn!("执行器注册失败, 调度中心={}: {}", admin.address(), e),
            }
        }
        false
    }

    pub async fn deregister_once(&self) -> bool {
        let param = self.param();
        for admin in &self.admins {
            match admin.registry_remove(param.clone()).await {
                Ok(result) if result.is_success() => {
                    info!("执行器注销成功, 调度中心={}", admin.address());
                    return true;
                }
                Ok(result) => warn!(
                    "执行器注销失败, 调度中心={}, msg={}",
                    admin.address(),
                    result.msg_or_empty()
                ),
                Err(e) => warn!("执行器注销失败, 调度中心={}: {}", admin.address(), e),
            }
        }
        false
    }

    /// 启动心跳任务；应用名为空或没有调度中心地址时不启动
    pub fn start(self: Arc<Self>, stop: CancellationToken) -> Option<JoinHandle<()>> {
        if self.app_name.trim().is_empty() {
            warn!("执行器应用名为空, 不进行注册");
            return None;
        }
        if self.admins.is_empty() {
            warn!("未配置调度中心地址, 不进行注册");
            return None;
        }

        info!(
            "执行器心跳已启动, appName={}, address={}",
            self.app_name, self.address
        );
        Some(tokio::spawn(async move {
            loop {
                self.register_once().await;
                tokio::select! {
                    _ = tokio::time::sleep(self.beat_interval) => {}
                    _ = stop.cancelled() => break,
                }
            }
            self.deregister_once().await;
            info!("执行器心跳已停止");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmesh_testing_utils::RecordingAdminClient;

    #[tokio::test]
    async fn test_register_until_first_success_and_deregister_on_stop() {
        let down = Arc::new(RecordingAdminClient::new("http://down"));
        down.set_failing(true);
        let up = Arc::new(RecordingAdminClient::new("http://up"));
        let registrar = Arc::new(HeartbeatRegistrar::new(
            vec![down.clone() as Arc<dyn AdminClient>, up.clone()],
            "demo",
            "http://127.0.0.1:9999/",
            Duration::from_secs(30),
        ));

        let stop = CancellationToken::new();
        let handle = registrar.clone().start(stop.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.cancel();
        handle.await.unwrap();

        let registries = up.registries();
        assert_eq!(registries.len(), 1);
        assert_eq!(registries[0].registry_group, "EXECUTOR");
        assert_eq!(registries[0].registry_key, "demo");
        assert_eq!(up.removals().len(), 1);
    }

    #[test]
    fn test_empty_app_name_does_not_start() {
        let registrar = Arc::new(HeartbeatRegistrar::new(
            vec![Arc::new(RecordingAdminClient::new("http://up")) as Arc<dyn AdminClient>],
            "",
            "http://127.0.0.1:9999/",
            Duration::from_secs(30),
        ));
        assert!(registrar.start(CancellationToken::new()).is_none());
    }
}

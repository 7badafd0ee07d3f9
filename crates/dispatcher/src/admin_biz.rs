//! 调度中心对执行器暴露的业务接口：结果回调、注册与注销

use std::sync::Arc;

use chrono::Utc;
use taskmesh_domain::{
    HandleCallbackParam, JobLogRepository, RegistryParam, RegistryRepository, ReturnT,
};
use tracing::{debug, error, info, warn};

use crate::completion::CompletionHandler;
use crate::registry_monitor::RegistryMonitor;

pub struct AdminBiz {
    logs: Arc<dyn JobLogRepository>,
    registry: Arc<dyn RegistryRepository>,
    completion: Arc<CompletionHandler>,
    registry_monitor: Arc<RegistryMonitor>,
}

impl AdminBiz {
    pub fn new(
        logs: Arc<dyn JobLogRepository>,
        registry: Arc<dyn RegistryRepository>,
        completion: Arc<CompletionHandler>,
        registry_monitor: Arc<RegistryMonitor>,
    ) -> Self {
        Self {
            logs,
            registry,
            completion,
            registry_monitor,
        }
    }

    /// 批量处理执行结果。单条失败只记录日志，整体总是返回成功，
    /// 否则执行器会无限重投同一批回调
    pub async fn callback(&self, params: Vec<HandleCallbackParam>) -> ReturnT<String> {
        for param in params {
            let log_id = param.log_id;
            let result = self.handle_callback(param).await;
            if !result.is_success() {
                warn!("回调处理失败, logId={}: {}", log_id, result.msg_or_empty());
            } else {
                debug!("回调处理成功, logId={}", log_id);
            }
        }
        ReturnT::success()
    }

    async fn handle_callback(&self, param: HandleCallbackParam) -> ReturnT<String> {
        let mut log = match self.logs.find_by_id(param.log_id).await {
            Ok(Some(log)) => log,
            Ok(None) => return ReturnT::fail("log item not found."),
            Err(e) => {
                error!("查询调度日志失败, logId={}: {}", param.log_id, e);
                return ReturnT::fail(e.to_string());
            }
        };
        if log.handle_code > 0 {
            return ReturnT::fail("log repeate callback.");
        }

        let mut handle_msg = log.handle_msg.take().unwrap_or_default();
        if let Some(msg) = param.handle_msg.filter(|m| !m.is_empty()) {
            if !handle_msg.is_empty() {
                handle_msg.push('\n');
            }
            handle_msg.push_str(&msg);
        }

        log.handle_time = Some(Utc::now());
        log.handle_code = param.handle_code;
        log.handle_msg = Some(handle_msg);

        match self.completion.update_handle_info_and_finish(log).await {
            Ok(()) => ReturnT::success(),
            Err(e) => {
                error!("回写执行结果失败, logId={}: {}", param.log_id, e);
                ReturnT::fail(e.to_string())
            }
        }
    }

    pub async fn registry(&self, param: RegistryParam) -> ReturnT<String> {
        if param.has_empty_field() {
            return ReturnT::fail("Illegal Argument.");
        }
        if let Err(e) = self
            .registry
            .upsert(
                &param.registry_group,
                &param.registry_key,
                &param.registry_value,
                Utc::now(),
            )
            .await
        {
            error!("执行器注册失败: {}", e);
            return ReturnT::fail(e.to_string());
        }
        debug!(
            "执行器注册: {} {} {}",
            param.registry_group, param.registry_key, param.registry_value
        );
        self.refresh_groups().await;
        ReturnT::success()
    }

    pub async fn registry_remove(&self, param: RegistryParam) -> ReturnT<String> {
        if param.has_empty_field() {
            return ReturnT::fail("Illegal Argument.");
        }
        match self
            .registry
            .remove(
                &param.registry_group,
                &param.registry_key,
                &param.registry_value,
            )
            .await
        {
            Ok(removed) => {
                if removed {
                    info!(
                        "执行器注销: {} {}",
                        param.registry_key, param.registry_value
                    );
                }
            }
            Err(e) => {
                error!("执行器注销失败: {}", e);
                return ReturnT::fail(e.to_string());
            }
        }
        self.refresh_groups().await;
        ReturnT::success()
    }

    async fn refresh_groups(&self) {
        if let Err(e) = self.registry_monitor.refresh_groups().await {
            warn!("刷新执行器分组地址失败: {}", e);
        }
    }
}

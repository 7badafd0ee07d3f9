//! 单次任务触发
//!
//! 一次触发可能展开为多次调度（分片广播时每台执行器一次），每次调度都会：
//! 保存调度日志 -> 组装触发参数 -> 选择执行器地址 -> 调用执行器 `run` -> 回写调度结果。
//! 任何失败都只记录在调度日志和系统日志中，不会向调用方传播。

use std::sync::Arc;

use chrono::Utc;
use taskmesh_core::text::{truncate_chars, MAX_HANDLE_MSG_CHARS};
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{
    AddressType, ExecutorClientFactory, ExecutorGroup, ExecutorGroupRepository, JobDefinition,
    JobLog, JobLogRepository, JobRepository, ReturnT, RouteStrategy, TriggerParam, TriggerType,
    FAIL_CODE,
};
use tracing::{debug, error, info, warn};

use crate::route::ExecutorRouter;

/// 触发请求，除任务ID与触发类型外均为本次调度的临时覆盖
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub job_id: i64,
    pub trigger_type: TriggerType,
    /// 大于等于0时覆盖任务配置的失败重试次数
    pub fail_retry_count: Option<i32>,
    /// 形如 `index/total`
    pub sharding_param: Option<String>,
    pub executor_param: Option<String>,
    /// 逗号分隔，非空时本次使用手动地址
    pub address_list: Option<String>,
}

impl TriggerRequest {
    pub fn new(job_id: i64, trigger_type: TriggerType) -> Self {
        Self {
            job_id,
            trigger_type,
            fail_retry_count: None,
            sharding_param: None,
            executor_param: None,
            address_list: None,
        }
    }

    pub fn with_fail_retry_count(mut self, count: i32) -> Self {
        self.fail_retry_count = Some(count);
        self
    }

    pub fn with_sharding_param(mut self, sharding_param: Option<String>) -> Self {
        self.sharding_param = sharding_param;
        self
    }

    pub fn with_executor_param(mut self, executor_param: Option<String>) -> Self {
        self.executor_param = executor_param;
        self
    }

    pub fn with_address_list(mut self, address_list: Option<String>) -> Self {
        self.address_list = address_list;
        self
    }
}

/// 解析 `index/total` 形式的分片参数，两部分都必须是非负整数
pub fn parse_sharding_param(raw: &str) -> Option<(usize, usize)> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 2 {
        return None;
    }
    let index = parts[0].trim().parse::<usize>().ok()?;
    let total = parts[1].trim().parse::<usize>().ok()?;
    Some((index, total))
}

pub struct TriggerDispatcher {
    jobs: Arc<dyn JobRepository>,
    groups: Arc<dyn ExecutorGroupRepository>,
    logs: Arc<dyn JobLogRepository>,
    router: Arc<ExecutorRouter>,
    clients: Arc<dyn ExecutorClientFactory>,
    admin_address: String,
}

struct Attempt<'a> {
    job: &'a JobDefinition,
    group: &'a ExecutorGroup,
    registry: &'a [String],
    trigger_type: TriggerType,
    fail_retry_count: i32,
    index: usize,
    total: usize,
}

impl TriggerDispatcher {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        groups: Arc<dyn ExecutorGroupRepository>,
        logs: Arc<dyn JobLogRepository>,
        router: Arc<ExecutorRouter>,
        clients: Arc<dyn ExecutorClientFactory>,
        admin_address: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            groups,
            logs,
            router,
            clients,
            admin_address: admin_address.into(),
        }
    }

    /// 触发任务，返回本次创建的调度日志ID；任务不存在时返回空列表
    pub async fn trigger(&self, request: TriggerRequest) -> Vec<i64> {
        let job_id = request.job_id;
        let trigger_type = request.trigger_type;
        match self.try_trigger(request).await {
            Ok(log_ids) => {
                metrics::counter!("taskmesh_trigger_total", "trigger_type" => trigger_type.as_str())
                    .increment(log_ids.len() as u64);
                log_ids
            }
            Err(e) => {
                error!("任务 {} 触发异常: {}", job_id, e);
                Vec::new()
            }
        }
    }

    async fn try_trigger(&self, request: TriggerRequest) -> SchedulerResult<Vec<i64>> {
        let Some(mut job) = self.jobs.find_by_id(request.job_id).await? else {
            warn!("触发任务失败, 任务不存在, jobId={}", request.job_id);
            return Ok(Vec::new());
        };

        if let Some(param) = request.executor_param {
            job.executor_param = Some(param);
        }
        let fail_retry_count = match request.fail_retry_count {
            Some(count) if count >= 0 => count,
            _ => job.executor_fail_retry_count,
        };

        let Some(mut group) = self.groups.find_by_id(job.job_group).await? else {
            warn!(
                "触发任务失败, 执行器分组不存在, jobId={}, jobGroup={}",
                job.id, job.job_group
            );
            return Ok(Vec::new());
        };

        if let Some(address_list) = request
            .address_list
            .map(|list| list.trim().to_string())
            .filter(|list| !list.is_empty())
        {
            group.address_type = AddressType::Manual;
            group.address_list = Some(address_list);
        }

        let sharding = request
            .sharding_param
            .as_deref()
            .and_then(parse_sharding_param);
        let registry = group.registry_list();

        let mut log_ids = Vec::new();
        if job.executor_route_strategy == RouteStrategy::ShardingBroadcast
            && !registry.is_empty()
            && sharding.is_none()
        {
            for index in 0..registry.len() {
                let attempt = Attempt {
                    job: &job,
                    group: &group,
                    registry: &registry,
                    trigger_type: request.trigger_type,
                    fail_retry_count,
                    index,
                    total: registry.len(),
                };
                log_ids.push(self.process_trigger(attempt).await?);
            }
        } else {
            let (index, total) = sharding.unwrap_or((0, 1));
            let attempt = Attempt {
                job: &job,
                group: &group,
                registry: &registry,
                trigger_type: request.trigger_type,
                fail_retry_count,
                index,
                total,
            };
            log_ids.push(self.process_trigger(attempt).await?);
        }

        Ok(log_ids)
    }

    async fn process_trigger(&self, attempt: Attempt<'_>) -> SchedulerResult<i64> {
        let job = attempt.job;
        let broadcast = job.executor_route_strategy == RouteStrategy::ShardingBroadcast;
        let shard_param = broadcast.then(|| format!("{}/{}", attempt.index, attempt.total));

        // 1. 保存调度日志
        let mut job_log = self
            .logs
            .create(&JobLog::pending(job.job_group, job.id, Utc::now()))
            .await?;
        debug!("调度日志已创建, jobId={}, logId={}", job.id, job_log.id);

        // 2. 组装触发参数
        let trigger_param = TriggerParam {
            job_id: job.id,
            executor_handler: job.executor_handler.clone(),
            executor_params: job.executor_param.clone(),
            executor_block_strategy: job.executor_block_strategy,
            executor_timeout: job.executor_timeout,
            log_id: job_log.id,
            log_date_time: job_log.trigger_date_time_millis(),
            glue_type: job.glue_type.as_str().to_string(),
            glue_source: job.glue_source.clone(),
            glue_updatetime: job.glue_updatetime,
            broadcast_index: attempt.index as i32,
            broadcast_total: attempt.total as i32,
        };

        // 3. 选择执行器地址
        let mut route_msg = None;
        let address = if attempt.registry.is_empty() {
            route_msg = Some("调度失败：执行器地址为空".to_string());
            None
        } else if broadcast {
            attempt
                .registry
                .get(attempt.index)
                .or_else(|| attempt.registry.first())
                .cloned()
        } else {
            let decision = self
                .router
                .route(job.executor_route_strategy, job.id, attempt.registry)
                .await;
            route_msg = decision.message;
            decision.address
        };

        // 4. 调用执行器
        let trigger_result = match &address {
            Some(address) => self.run_executor(trigger_param, address).await,
            None => ReturnT::with_code(FAIL_CODE, ""),
        };

        // 5. 回写调度结果
        let trigger_msg = self.compose_trigger_msg(&attempt, route_msg.as_deref(), &trigger_result);

        job_log.executor_address = address;
        job_log.executor_handler = Some(job.executor_handler.clone());
        job_log.executor_param = job.executor_param.clone();
        job_log.executor_sharding_param = shard_param;
        job_log.executor_fail_retry_count = attempt.fail_retry_count;
        job_log.trigger_code = trigger_result.code;
        job_log.trigger_msg = Some(truncate_chars(&trigger_msg, MAX_HANDLE_MSG_CHARS));
        self.logs.update_trigger_info(&job_log).await?;

        info!(
            "任务触发完成, jobId={}, logId={}, 触发类型={}, code={}",
            job.id,
            job_log.id,
            attempt.trigger_type,
            trigger_result.code
        );
        metrics::counter!(
            "taskmesh_trigger_attempt_total",
            "success" => if trigger_result.is_success() { "true" } else { "false" }
        )
        .increment(1);

        Ok(job_log.id)
    }

    /// 调用执行器 `run`，传输错误转为失败结果
    pub async fn run_executor(&self, trigger_param: TriggerParam, address: &str) -> ReturnT<String> {
        let log_id = trigger_param.log_id;
        let result = match self.clients.client(address) {
            Ok(client) => client.run(trigger_param).await,
            Err(e) => Err(e),
        };
        let result = result.unwrap_or_else(|e| {
            error!("调用执行器失败, address={}, logId={}: {}", address, log_id, e);
            ReturnT::fail(e.to_string())
        });

        let msg = format!(
            "触发调度：\naddress：{}\ncode：{}\nmsg：{}",
            address,
            result.code,
            result.msg_or_empty()
        );
        ReturnT::with_code(result.code, msg)
    }

    fn compose_trigger_msg(
        &self,
        attempt: &Attempt<'_>,
        route_msg: Option<&str>,
        trigger_result: &ReturnT<String>,
    ) -> String {
        let job = attempt.job;
        let mut route_title = job.executor_route_strategy.title().to_string();
        if job.executor_route_strategy == RouteStrategy::ShardingBroadcast {
            route_title.push_str(&format!("({}/{})", attempt.index, attempt.total));
        }

        let mut msg = String::new();
        msg.push_str(&format!("任务触发类型：{}\n", attempt.trigger_type.title()));
        msg.push_str(&format!("调度机器：{}\n", self.admin_address));
        msg.push_str(&format!(
            "执行器-注册方式：{}\n",
            attempt.group.address_type.title()
        ));
        msg.push_str(&format!("执行器-地址列表：{:?}\n", attempt.registry));
        msg.push_str(&format!("路由策略：{}\n", route_title));
        msg.push_str(&format!(
            "阻塞处理策略：{}\n",
            job.executor_block_strategy.title()
        ));
        msg.push_str(&format!("任务超时时间：{}\n", job.executor_timeout));
        msg.push_str(&format!("失败重试次数：{}\n", attempt.fail_retry_count));
        msg.push_str("\n>>>>>>>>>>>触发调度<<<<<<<<<<<\n");
        if let Some(route_msg) = route_msg.filter(|m| !m.is_empty()) {
            msg.push_str(route_msg);
            msg.push_str("\n\n");
        }
        msg.push_str(trigger_result.msg_or_empty());
        msg
    }
}

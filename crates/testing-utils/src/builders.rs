//! Test data builders for creating test entities

use chrono::Utc;
use taskmesh_domain::{
    AddressType, BlockStrategy, ExecutorGroup, GlueType, JobDefinition, RouteStrategy,
    TriggerParam,
};

/// Builder for creating test JobDefinition entities
pub struct JobDefinitionBuilder {
    job: JobDefinition,
}

impl JobDefinitionBuilder {
    pub fn new() -> Self {
        Self {
            job: JobDefinition {
                id: 1,
                job_group: 1,
                job_desc: "test_job".to_string(),
                executor_handler: "demoJobHandler".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.job.id = id;
        self
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.job.job_group = group_id;
        self
    }

    pub fn with_handler(mut self, handler: &str) -> Self {
        self.job.executor_handler = handler.to_string();
        self
    }

    pub fn with_param(mut self, param: &str) -> Self {
        self.job.executor_param = Some(param.to_string());
        self
    }

    pub fn with_route(mut self, strategy: RouteStrategy) -> Self {
        self.job.executor_route_strategy = strategy;
        self
    }

    pub fn with_block(mut self, strategy: BlockStrategy) -> Self {
        self.job.executor_block_strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, seconds: i32) -> Self {
        self.job.executor_timeout = seconds;
        self
    }

    pub fn with_fail_retry(mut self, count: i32) -> Self {
        self.job.executor_fail_retry_count = count;
        self
    }

    pub fn with_children(mut self, child_ids: &str) -> Self {
        self.job.child_job_id = Some(child_ids.to_string());
        self
    }

    pub fn with_glue(mut self, glue_type: GlueType, source: &str, updatetime: i64) -> Self {
        self.job.glue_type = glue_type;
        self.job.glue_source = Some(source.to_string());
        self.job.glue_updatetime = updatetime;
        self
    }

    pub fn with_cron(mut self, expression: &str) -> Self {
        self.job.schedule_type = taskmesh_domain::ScheduleType::Cron;
        self.job.schedule_conf = Some(expression.to_string());
        self.job.trigger_status = true;
        self
    }

    pub fn build(self) -> JobDefinition {
        self.job
    }
}

impl Default for JobDefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ExecutorGroup entities
pub struct ExecutorGroupBuilder {
    group: ExecutorGroup,
}

impl ExecutorGroupBuilder {
    pub fn new() -> Self {
        Self {
            group: ExecutorGroup {
                id: 1,
                app_name: "taskmesh-executor-sample".to_string(),
                title: "示例执行器".to_string(),
                address_type: AddressType::Auto,
                address_list: None,
                update_time: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.group.id = id;
        self
    }

    pub fn with_app_name(mut self, app_name: &str) -> Self {
        self.group.app_name = app_name.to_string();
        self
    }

    /// 手动录入的地址列表
    pub fn with_addresses(mut self, addresses: &[&str]) -> Self {
        self.group.address_type = AddressType::Manual;
        self.group.address_list = if addresses.is_empty() {
            None
        } else {
            Some(addresses.join(","))
        };
        self
    }

    pub fn build(self) -> ExecutorGroup {
        self.group
    }
}

impl Default for ExecutorGroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test TriggerParam values
pub struct TriggerParamBuilder {
    param: TriggerParam,
}

impl TriggerParamBuilder {
    pub fn new(job_id: i64, log_id: i64) -> Self {
        Self {
            param: TriggerParam {
                job_id,
                executor_handler: "demoJobHandler".to_string(),
                executor_params: None,
                executor_block_strategy: BlockStrategy::SerialExecution,
                executor_timeout: 0,
                log_id,
                log_date_time: Utc::now().timestamp_millis(),
                glue_type: GlueType::Bean.as_str().to_string(),
                glue_source: None,
                glue_updatetime: 0,
                broadcast_index: 0,
                broadcast_total: 1,
            },
        }
    }

    pub fn with_handler(mut self, handler: &str) -> Self {
        self.param.executor_handler = handler.to_string();
        self
    }

    pub fn with_params(mut self, params: &str) -> Self {
        self.param.executor_params = Some(params.to_string());
        self
    }

    pub fn with_block(mut self, strategy: BlockStrategy) -> Self {
        self.param.executor_block_strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, seconds: i32) -> Self {
        self.param.executor_timeout = seconds;
        self
    }

    pub fn with_glue(mut self, glue_type: &str, source: &str, updatetime: i64) -> Self {
        self.param.glue_type = glue_type.to_string();
        self.param.glue_source = Some(source.to_string());
        self.param.glue_updatetime = updatetime;
        self
    }

    pub fn with_shard(mut self, index: i32, total: i32) -> Self {
        self.param.broadcast_index = index;
        self.param.broadcast_total = total;
        self
    }

    pub fn build(self) -> TriggerParam {
        self.param
    }
}

//! 启动时导入执行器分组与任务定义
//!
//! ```json
//! {
//!   "groups": [{"id": 1, "app_name": "taskmesh-executor-sample", "title": "示例执行器"}],
//!   "jobs": [{"id": 1, "job_group": 1, "executor_handler": "demoJobHandler",
//!             "schedule_type": "CRON", "schedule_conf": "0/30 * * * * *", "trigger_status": true}]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{ExecutorGroup, ExecutorGroupRepository, JobDefinition, JobRepository};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapData {
    pub groups: Vec<ExecutorGroup>,
    pub jobs: Vec<JobDefinition>,
}

impl BootstrapData {
    pub fn from_json(text: &str) -> SchedulerResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub async fn load_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            SchedulerError::Configuration(format!("读取初始化文件失败 {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// 写入仓储，任务引用的分组必须存在
    pub async fn apply(
        &self,
        groups: &dyn ExecutorGroupRepository,
        jobs: &dyn JobRepository,
    ) -> SchedulerResult<()> {
        for group in &self.groups {
            groups.save(group).await?;
        }

        for job in &self.jobs {
            if groups.find_by_id(job.job_group).await?.is_none() {
                return Err(SchedulerError::GroupNotFound { id: job.job_group });
            }
            jobs.save(job).await?;
        }

        info!(
            "导入初始化数据完成: {} 个执行器分组, {} 个任务",
            self.groups.len(),
            self.jobs.len()
        );
        Ok(())
    }
}

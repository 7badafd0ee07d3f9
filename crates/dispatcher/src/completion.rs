use std::sync::Arc;

use taskmesh_core::text::{truncate_chars, MAX_HANDLE_MSG_CHARS};
use taskmesh_core::SchedulerResult;
use taskmesh_domain::{JobLog, JobLogRepository, JobRepository, TriggerType, SUCCESS_CODE};
use tracing::{debug, warn};

use crate::trigger::TriggerRequest;
use crate::trigger_pool::TriggerSubmitter;

/// 任务执行结束后的收尾：成功时触发子任务，并回写执行结果
pub struct CompletionHandler {
    jobs: Arc<dyn JobRepository>,
    logs: Arc<dyn JobLogRepository>,
    trigger: Arc<dyn TriggerSubmitter>,
}

impl CompletionHandler {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        logs: Arc<dyn JobLogRepository>,
        trigger: Arc<dyn TriggerSubmitter>,
    ) -> Self {
        Self { jobs, logs, trigger }
    }

    pub async fn update_handle_info_and_finish(&self, mut log: JobLog) -> SchedulerResult<()> {
        let child_msg = self.finish_job(&log).await?;

        let mut handle_msg = log.handle_msg.take().unwrap_or_default();
        if let Some(child_msg) = child_msg {
            handle_msg.push_str(&child_msg);
        }
        log.handle_msg = Some(truncate_chars(&handle_msg, MAX_HANDLE_MSG_CHARS));

        self.logs.update_handle_info(&log).await
    }

    /// 执行成功时触发子任务，返回追加到执行备注中的内容
    async fn finish_job(&self, log: &JobLog) -> SchedulerResult<Option<String>> {
        if log.handle_code != SUCCESS_CODE {
            return Ok(None);
        }
        let Some(job) = self.jobs.find_by_id(log.job_id).await? else {
            return Ok(None);
        };
        let children = job.child_job_ids();
        if children.is_empty() {
            return Ok(None);
        }

        let total = children.len();
        let mut msg = String::from("\n\n>>>>>>>>>>>触发子任务<<<<<<<<<<<\n");
        for (i, raw) in children.iter().enumerate() {
            let index = i + 1;
            let line = match raw.parse::<i64>() {
                Ok(child_id) if child_id > 0 => {
                    let request = TriggerRequest::new(child_id, TriggerType::Parent);
                    match self.trigger.submit(request) {
                        Ok(()) => {
                            debug!("子任务已提交, parent={}, child={}", job.id, child_id);
                            format!(
                                "{}/{} [任务ID={}], 触发成功, 触发备注: 成功\n",
                                index, total, raw
                            )
                        }
                        Err(e) => {
                            warn!("子任务提交失败, parent={}, child={}: {}", job.id, child_id, e);
                            format!(
                                "{}/{} [任务ID={}], 触发失败, 触发备注: {}\n",
                                index, total, raw, e
                            )
                        }
                    }
                }
                _ => format!(
                    "{}/{} [任务ID={}], 触发失败, 触发备注: 任务ID格式错误\n",
                    index, total, raw
                ),
            };
            msg.push_str(&line);
        }
        Ok(Some(msg))
    }
}

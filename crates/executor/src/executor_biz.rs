//! 执行器对调度中心暴露的业务接口

use std::str::FromStr;
use std::sync::Arc;

use taskmesh_domain::{
    GlueType, IdleBeatParam, KillParam, LogParam, LogResult, ReturnT, TriggerParam,
};
use tracing::{debug, info};

use crate::handler::{HandlerRegistry, JobHandler};
use crate::job_worker::HandlerKey;
use crate::log_file::JobFileAppender;
use crate::script::ScriptJobHandler;
use crate::worker_registry::{WorkerRegistry, KILL_REASON};

pub struct ExecutorBiz {
    handlers: Arc<HandlerRegistry>,
    workers: Arc<WorkerRegistry>,
    appender: Arc<JobFileAppender>,
}

impl ExecutorBiz {
    pub fn new(
        handlers: Arc<HandlerRegistry>,
        workers: Arc<WorkerRegistry>,
        appender: Arc<JobFileAppender>,
    ) -> Self {
        Self {
            handlers,
            workers,
            appender,
        }
    }

    pub fn beat(&self) -> ReturnT<String> {
        ReturnT::success()
    }

    pub fn idle_beat(&self, param: IdleBeatParam) -> ReturnT<String> {
        let busy = self
            .workers
            .get(param.job_id)
            .map(|worker| worker.is_running_or_has_queue())
            .unwrap_or(false);
        if busy {
            return ReturnT::fail("job thread is running or has trigger queue.");
        }
        ReturnT::success()
    }

    pub fn run(&self, param: TriggerParam) -> ReturnT<String> {
        debug!(
            "收到触发请求, jobId={}, logId={}, glueType={}",
            param.job_id, param.log_id, param.glue_type
        );
        let glue_type = match GlueType::from_str(&param.glue_type) {
            Ok(glue_type) => glue_type,
            Err(_) => {
                return ReturnT::fail(format!("glueType[{}] is not valid.", param.glue_type))
            }
        };

        match glue_type {
            GlueType::Bean => {
                let name = param.executor_handler.clone();
                let key = HandlerKey::Bean(name.clone());
                let handlers = self.handlers.clone();
                self.workers.dispatch(param, key, move || {
                    handlers
                        .lookup(&name)
                        .ok_or_else(|| ReturnT::fail(format!("job handler [{name}] not found.")))
                })
            }
            glue_type if glue_type.is_script() => {
                let key = HandlerKey::Glue(glue_type, param.glue_updatetime);
                let handler: Arc<dyn JobHandler> = Arc::new(ScriptJobHandler::new(
                    param.job_id,
                    glue_type,
                    param.glue_source.clone().unwrap_or_default(),
                    param.glue_updatetime,
                    self.appender.glue_source_path(),
                ));
                self.workers.dispatch(param, key, move || Ok(handler))
            }
            other => ReturnT::fail(format!("glueType[{}] is not valid.", other)),
        }
    }

    /// 终止任务线程，重复调用返回成功
    pub fn kill(&self, param: KillParam) -> ReturnT<String> {
        if self.workers.remove(param.job_id, KILL_REASON) {
            info!("任务已终止, jobId={}", param.job_id);
            return ReturnT::success();
        }
        ReturnT::success_msg("job thread already killed.")
    }

    pub async fn log(&self, param: LogParam) -> ReturnT<LogResult> {
        let log_file = self
            .appender
            .make_log_file_name(param.log_date_time, param.log_id);
        ReturnT::success_with(self.appender.read_log(&log_file, param.from_line_num).await)
    }
}

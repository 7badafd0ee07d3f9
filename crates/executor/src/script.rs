//! 脚本任务
//!
//! 脚本源码写入 `<log_path>/gluesource/<jobId>_<glueUpdateTime><suffix>`，以子进程执行，
//! 参数依次为任务参数、分片序号、分片总数。标准输出与标准错误逐行写入任务日志，
//! 退出码为0视为成功。

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::GlueType;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use crate::context::JobContext;
use crate::handler::JobHandler;

pub struct ScriptJobHandler {
    job_id: i64,
    glue_type: GlueType,
    glue_source: String,
    glue_updatetime: i64,
    source_dir: PathBuf,
}

impl ScriptJobHandler {
    pub fn new(
        job_id: i64,
        glue_type: GlueType,
        glue_source: String,
        glue_updatetime: i64,
        source_dir: PathBuf,
    ) -> Self {
        Self {
            job_id,
            glue_type,
            glue_source,
            glue_updatetime,
            source_dir,
        }
    }

    pub fn script_file(&self) -> PathBuf {
        let suffix = self.glue_type.script_suffix().unwrap_or("");
        self.source_dir
            .join(format!("{}_{}{}", self.job_id, self.glue_updatetime, suffix))
    }
}

async fn pump_lines<R>(reader: R, ctx: JobContext)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        ctx.log(line).await;
    }
}

#[async_trait]
impl JobHandler for ScriptJobHandler {
    async fn execute(&self, ctx: &JobContext) -> SchedulerResult<()> {
        let command = self.glue_type.script_command().ok_or_else(|| {
            SchedulerError::Execution(format!("glueType[{}] is not valid.", self.glue_type))
        })?;

        let script_file = self.script_file();
        tokio::fs::create_dir_all(&self.source_dir).await?;
        tokio::fs::write(&script_file, self.glue_source.as_bytes()).await?;

        ctx.log(format!(
            "----------- script file:{} -----------",
            script_file.display()
        ))
        .await;

        let mut child = Command::new(command)
            .arg(&script_file)
            .arg(ctx.job_param().unwrap_or(""))
            .arg(ctx.shard_index().to_string())
            .arg(ctx.shard_total().to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SchedulerError::Execution(format!("启动脚本进程失败: {e}")))?;
        info!(
            "脚本任务已启动, jobId={}, command={}, pid={:?}",
            self.job_id,
            command,
            child.id()
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let output_ctx = ctx.clone();
        // 子进程归 run 所有，取消时 run 被丢弃，子进程随之被杀死
        let run = async move {
            let out = async {
                if let Some(stdout) = stdout {
                    pump_lines(stdout, output_ctx.clone()).await;
                }
            };
            let err = async {
                if let Some(stderr) = stderr {
                    pump_lines(stderr, output_ctx.clone()).await;
                }
            };
            tokio::join!(out, err);
            child.wait().await
        };

        let status = tokio::select! {
            status = run => status?,
            _ = ctx.cancelled() => {
                warn!("脚本任务被终止, jobId={}", self.job_id);
                return Err(SchedulerError::Execution("script job killed.".to_string()));
            }
        };

        match status.code() {
            Some(0) => {
                ctx.handle_success();
            }
            code => {
                let code = code.map(|c| c.to_string()).unwrap_or_else(|| "-1".to_string());
                ctx.handle_fail(format!("script exit value({code}) is failed"));
            }
        }
        Ok(())
    }
}

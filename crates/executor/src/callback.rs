//! 执行结果回调
//!
//! 工作线程通过 [`CallbackSink::push`] 提交结果，后台消费者把积压的结果合并成一批，
//! 依次尝试各个调度中心地址。多轮重试仍失败时批次以 JSON 落盘到
//! `<log_path>/callbacklog/`，由重试任务按心跳周期重新投递。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskmesh_core::SchedulerResult;
use taskmesh_domain::{AdminClient, HandleCallbackParam};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::log_file::JobFileAppender;

const CALLBACK_FILE_EXT: &str = "log";

/// 执行结果的接收方
pub trait CallbackSink: Send + Sync {
    fn push(&self, param: HandleCallbackParam);
}

#[derive(Debug, Clone)]
pub struct CallbackSettings {
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// 落盘文件的重试周期
    pub retry_interval: Duration,
}

pub struct CallbackDispatcher {
    sender: mpsc::UnboundedSender<HandleCallbackParam>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<HandleCallbackParam>>>,
    admins: Vec<Arc<dyn AdminClient>>,
    appender: Arc<JobFileAppender>,
    settings: CallbackSettings,
    stop: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CallbackSink for CallbackDispatcher {
    fn push(&self, param: HandleCallbackParam) {
        debug!("提交执行结果回调, logId={}", param.log_id);
        if self.sender.send(param).is_err() {
            error!("回调队列已关闭, 执行结果丢弃");
        }
    }
}

impl CallbackDispatcher {
    pub fn new(
        admins: Vec<Arc<dyn AdminClient>>,
        appender: Arc<JobFileAppender>,
        settings: CallbackSettings,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            admins,
            appender,
            settings,
            stop: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// 启动回调消费者与落盘重试任务，重复调用无效
    pub fn start(self: &Arc<Self>) {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(receiver) = receiver else {
            return;
        };
        if self.admins.is_empty() {
            warn!("未配置调度中心地址, 执行结果将只会落盘");
        }

        let consumer = tokio::spawn(self.clone().consume(receiver));
        let retry = tokio::spawn(self.clone().retry_loop());
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend([consumer, retry]);
        info!("回调线程已启动");
    }

    /// 停止后台任务，消费者退出前会把队列中剩余结果投递一次
    pub async fn stop(&self) {
        self.stop.cancel();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("回调任务异常退出: {}", e);
            }
        }
        info!("回调线程已停止");
    }

    async fn consume(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<HandleCallbackParam>) {
        loop {
            tokio::select! {
                received = receiver.recv() => {
                    let Some(first) = received else { break };
                    let mut batch = vec![first];
                    while let Ok(param) = receiver.try_recv() {
                        batch.push(param);
                    }
                    self.deliver(batch, self.settings.retry_attempts).await;
                }
                _ = self.stop.cancelled() => break,
            }
        }

        let mut remaining = Vec::new();
        while let Ok(param) = receiver.try_recv() {
            remaining.push(param);
        }
        if !remaining.is_empty() {
            info!("停止前投递剩余回调 {} 条", remaining.len());
            self.deliver(remaining, 1).await;
        }
    }

    async fn retry_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.settings.retry_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.retry_failed_callbacks().await {
                        warn!("重试落盘回调失败: {}", e);
                    }
                }
                _ = self.stop.cancelled() => break,
            }
        }
    }

    /// 投递一批结果，`attempts` 轮都失败后落盘，返回是否投递成功
    pub async fn deliver(&self, batch: Vec<HandleCallbackParam>, attempts: u32) -> bool {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            for admin in &self.admins {
                match admin.callback(batch.clone()).await {
                    Ok(result) if result.is_success() => {
                        debug!("回调成功, 地址={}, 数量={}", admin.address(), batch.len());
                        metrics::counter!("taskmesh_callback_total", "result" => "success")
                            .increment(batch.len() as u64);
                        self.append_job_logs(&batch, "----------- taskmesh job callback finish.")
                            .await;
                        return true;
                    }
                    Ok(result) => warn!(
                        "回调失败, 地址={}, code={}, msg={}",
                        admin.address(),
                        result.code,
                        result.msg_or_empty()
                    ),
                    Err(e) => warn!("回调失败, 地址={}: {}", admin.address(), e),
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        metrics::counter!("taskmesh_callback_total", "result" => "fail")
            .increment(batch.len() as u64);
        self.append_job_logs(&batch, "----------- taskmesh job callback fail.")
            .await;
        if let Err(e) = self.persist(&batch).await {
            error!("回调落盘失败, 结果丢失 {} 条: {}", batch.len(), e);
        }
        false
    }

    async fn append_job_logs(&self, batch: &[HandleCallbackParam], message: &str) {
        for param in batch {
            let log_file = self
                .appender
                .make_log_file_name(param.log_date_time, param.log_id);
            if let Err(e) = self.appender.append(&log_file, message).await {
                debug!("写入回调日志失败, logId={}: {}", param.log_id, e);
            }
        }
    }

    async fn persist(&self, batch: &[HandleCallbackParam]) -> SchedulerResult<PathBuf> {
        let bytes = serde_json::to_vec(batch)?;
        let dir = self.appender.callback_log_path();
        tokio::fs::create_dir_all(&dir).await?;
        let name = format!("taskmesh-callback-{:x}.{}", md5::compute(&bytes), CALLBACK_FILE_EXT);
        let path = dir.join(&name);
        // 写完整后再改名为 .log，重试任务只读取 .log 文件
        let staging = dir.join(format!("{name}.tmp"));
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        warn!("回调失败已落盘: {:?}", path);
        Ok(path)
    }

    /// 读取并重新投递落盘的回调，返回处理的文件数
    pub async fn retry_failed_callbacks(&self) -> SchedulerResult<usize> {
        let dir = self.appender.callback_log_path();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_callback_file =
                path.extension().and_then(|ext| ext.to_str()) == Some(CALLBACK_FILE_EXT);
            if is_callback_file && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        for path in &files {
            let bytes = tokio::fs::read(path).await?;
            tokio::fs::remove_file(path).await?;
            match serde_json::from_slice::<Vec<HandleCallbackParam>>(&bytes) {
                Ok(batch) if !batch.is_empty() => {
                    info!("重新投递落盘回调 {:?}, 数量={}", path, batch.len());
                    self.deliver(batch, 1).await;
                }
                Ok(_) => {}
                Err(e) => warn!("落盘回调文件格式错误, 已删除 {:?}: {}", path, e),
            }
        }
        Ok(files.len())
    }
}

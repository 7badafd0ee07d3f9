//! 任务日志文件
//!
//! 每次调度一个文件：`<log_path>/<yyyy-MM-dd>/<logId>.log`，日期取触发时间的本地日期。

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, TimeZone};
use taskmesh_core::SchedulerResult;
use taskmesh_domain::LogResult;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const GLUE_SOURCE_DIR: &str = "gluesource";
const CALLBACK_LOG_DIR: &str = "callbacklog";
const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct JobFileAppender {
    log_path: PathBuf,
}

impl JobFileAppender {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// 脚本任务源码目录
    pub fn glue_source_path(&self) -> PathBuf {
        self.log_path.join(GLUE_SOURCE_DIR)
    }

    /// 回调失败落盘目录
    pub fn callback_log_path(&self) -> PathBuf {
        self.log_path.join(CALLBACK_LOG_DIR)
    }

    pub fn make_log_file_name(&self, log_date_time: i64, log_id: i64) -> PathBuf {
        let date = Local
            .timestamp_millis_opt(log_date_time)
            .single()
            .unwrap_or_else(Local::now)
            .format(DATE_DIR_FORMAT)
            .to_string();
        self.log_path.join(date).join(format!("{log_id}.log"))
    }

    /// 追加一行日志，自动补充时间前缀
    pub async fn append(&self, log_file: &Path, message: &str) -> SchedulerResult<()> {
        if let Some(parent) = log_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = format!(
            "{} {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            message
        );
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// 从 `from_line_num`（从1开始）读取到文件末尾
    pub async fn read_log(&self, log_file: &Path, from_line_num: usize) -> LogResult {
        let content = match tokio::fs::read_to_string(log_file).await {
            Ok(content) => content,
            Err(_) => {
                return LogResult {
                    from_line_num,
                    to_line_num: 0,
                    log_content: "readLog fail, logFile not exists".to_string(),
                    is_end: true,
                }
            }
        };

        let from_line_num = from_line_num.max(1);
        let mut to_line_num = 0;
        let mut log_content = String::new();
        for (index, line) in content.lines().enumerate() {
            to_line_num = index + 1;
            if to_line_num >= from_line_num {
                log_content.push_str(line);
                log_content.push('\n');
            }
        }

        LogResult {
            from_line_num,
            to_line_num,
            log_content,
            is_end: false,
        }
    }

    /// 删除超过保留天数的日期目录，保留天数小于3时不清理
    pub async fn clean_expired(&self, retention_days: i64) -> SchedulerResult<usize> {
        if retention_days < 3 {
            return Ok(0);
        }
        let today = Local::now().date_naive();
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.log_path).await {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, DATE_DIR_FORMAT).ok())
            else {
                continue;
            };
            if (today - date).num_days() >= retention_days {
                match tokio::fs::remove_dir_all(entry.path()).await {
                    Ok(()) => {
                        debug!("删除过期日志目录: {:?}", entry.path());
                        removed += 1;
                    }
                    Err(e) => warn!("删除过期日志目录失败 {:?}: {}", entry.path(), e),
                }
            }
        }
        if removed > 0 {
            info!("清理过期任务日志目录 {} 个", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_read_from_line() {
        let dir = TempDir::new().unwrap();
        let appender = JobFileAppender::new(dir.path());
        let file = appender.make_log_file_name(Local::now().timestamp_millis(), 7);
        assert!(file.ends_with("7.log"));

        for msg in ["first", "second", "third"] {
            appender.append(&file, msg).await.unwrap();
        }

        let result = appender.read_log(&file, 2).await;
        assert_eq!(result.from_line_num, 2);
        assert_eq!(result.to_line_num, 3);
        assert!(!result.log_content.contains("first"));
        assert!(result.log_content.contains("second"));
        assert!(result.log_content.contains("third"));
    }

    #[tokio::test]
    async fn test_read_missing_log() {
        let dir = TempDir::new().unwrap();
        let appender = JobFileAppender::new(dir.path());
        let result = appender.read_log(&dir.path().join("nope.log"), 1).await;
        assert!(result.is_end);
        assert_eq!(result.log_content, "readLog fail, logFile not exists");
    }

    #[tokio::test]
    async fn test_clean_expired_date_dirs() {
        let dir = TempDir::new().unwrap();
        let appender = JobFileAppender::new(dir.path());
        let old = (Local::now() - chrono::Duration::days(40))
            .format(DATE_DIR_FORMAT)
            .to_string();
        let today = Local::now().format(DATE_DIR_FORMAT).to_string();
        std::fs::create_dir_all(dir.path().join(&old)).unwrap();
        std::fs::create_dir_all(dir.path().join(&today)).unwrap();
        std::fs::create_dir_all(dir.path().join(GLUE_SOURCE_DIR)).unwrap();

        assert_eq!(appender.clean_expired(1).await.unwrap(), 0);
        assert_eq!(appender.clean_expired(30).await.unwrap(), 1);
        assert!(!dir.path().join(&old).exists());
        assert!(dir.path().join(&today).exists());
        assert!(dir.path().join(GLUE_SOURCE_DIR).exists());
    }
}

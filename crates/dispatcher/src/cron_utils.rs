use chrono::{DateTime, Duration, TimeZone, Utc};
use cron::Schedule;
use std::str::FromStr;
use tracing::warn;

use taskmesh_core::{SchedulerError, SchedulerResult};
use taskmesh_domain::{JobDefinition, ScheduleType};

/// CRON表达式解析和调度工具
///
/// 表达式带秒字段（6或7段），`?` 视为 `*`。
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let normalized = cron_expr.trim().replace('?', "*");
        let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule })
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> SchedulerResult<()> {
        Self::new(cron_expr).map(|_| ())
    }
}

/// 计算任务在 `from_ms` 之后的下一次触发时间（毫秒）
///
/// 不参与自动调度的任务返回 `Ok(None)`，配置无效时返回错误。
pub fn next_trigger_time(job: &JobDefinition, from_ms: i64) -> SchedulerResult<Option<i64>> {
    let conf = job.schedule_conf.as_deref().unwrap_or("").trim();
    match job.schedule_type {
        ScheduleType::None => Ok(None),
        ScheduleType::Cron => {
            let scheduler = CronScheduler::new(conf)?;
            let from = Utc
                .timestamp_millis_opt(from_ms)
                .single()
                .ok_or_else(|| SchedulerError::Validation(format!("无效的时间戳: {from_ms}")))?;
            Ok(scheduler
                .next_execution_time(from)
                .map(|next| next.timestamp_millis()))
        }
        ScheduleType::FixRate => {
            let seconds = conf.parse::<i64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                SchedulerError::Validation(format!("固定速度配置无效: {conf}"))
            })?;
            Ok(Some(from_ms + Duration::seconds(seconds).num_milliseconds()))
        }
    }
}

/// 校验任务的调度配置
pub fn validate_schedule(job: &JobDefinition) -> SchedulerResult<()> {
    match next_trigger_time(job, Utc::now().timestamp_millis()) {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("任务 {} 调度配置无效: {}", job.id, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(schedule_type: ScheduleType, conf: &str) -> JobDefinition {
        JobDefinition {
            id: 1,
            schedule_type,
            schedule_conf: Some(conf.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cron_next_time() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let scheduler = CronScheduler::new("0 */5 * * * ?").unwrap();
        let times = scheduler.upcoming_times(from, 2);
        assert_eq!(times[0], Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap());
        assert_eq!(times[1], Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap());
    }

    #[test]
    fn test_invalid_cron_expression() {
        let err = CronScheduler::validate_cron_expression("not a cron").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    }

    #[test]
    fn test_next_trigger_time_by_schedule_type() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp_millis();

        assert_eq!(next_trigger_time(&job(ScheduleType::FixRate, "30"), from).unwrap(), Some(from + 30_000));
        assert_eq!(
            next_trigger_time(&job(ScheduleType::Cron, "0 0 * * * *"), from).unwrap(),
            Some(from + 3_600_000)
        );
        assert_eq!(next_trigger_time(&job(ScheduleType::None, ""), from).unwrap(), None);
        assert!(next_trigger_time(&job(ScheduleType::FixRate, "abc"), from).is_err());
        assert!(next_trigger_time(&job(ScheduleType::FixRate, "0"), from).is_err());
    }
}

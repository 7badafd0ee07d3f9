//! 调度中心核心逻辑
//!
//! 包含执行器路由、任务触发、执行结果处理、注册表维护以及后台调度与巡检循环。

pub mod admin_biz;
pub mod completion;
pub mod cron_utils;
pub mod monitor;
pub mod registry_monitor;
pub mod route;
pub mod scheduler;
pub mod trigger;
pub mod trigger_pool;

pub use admin_biz::AdminBiz;
pub use completion::CompletionHandler;
pub use cron_utils::{next_trigger_time, CronScheduler};
pub use monitor::{JobFailMonitor, LostResultMonitor};
pub use registry_monitor::RegistryMonitor;
pub use route::{ExecutorRouteStrategy, ExecutorRouter, RouteDecision};
pub use scheduler::JobScheduler;
pub use trigger::{TriggerDispatcher, TriggerRequest};
pub use trigger_pool::{JobTriggerPool, TriggerSubmitter};

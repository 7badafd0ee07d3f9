//! 执行器
//!
//! 接收调度中心的触发请求，按任务ID串行执行处理器，并把执行结果可靠地回调给调度中心。

pub mod callback;
pub mod context;
pub mod executor;
pub mod executor_biz;
pub mod handler;
pub mod heartbeat;
pub mod job_worker;
pub mod log_file;
pub mod script;
pub mod worker_registry;

pub use callback::{CallbackDispatcher, CallbackSettings, CallbackSink};
pub use context::{HandleOutcome, JobContext};
pub use executor::JobExecutor;
pub use executor_biz::ExecutorBiz;
pub use handler::{HandlerRegistry, JobHandler};
pub use heartbeat::HeartbeatRegistrar;
pub use job_worker::{HandlerKey, JobWorker, WorkerSettings};
pub use log_file::JobFileAppender;
pub use script::ScriptJobHandler;
pub use worker_registry::WorkerRegistry;

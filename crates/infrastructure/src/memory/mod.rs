//! 内存仓储实现
//!
//! 适用于单机部署与测试场景，进程重启后数据丢失。

mod group_repository;
mod job_log_repository;
mod job_repository;
mod registry_repository;

pub use group_repository::InMemoryExecutorGroupRepository;
pub use job_log_repository::InMemoryJobLogRepository;
pub use job_repository::InMemoryJobRepository;
pub use registry_repository::InMemoryRegistryRepository;

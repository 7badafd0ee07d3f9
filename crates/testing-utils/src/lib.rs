//! 测试辅助：实体构建器与可编排的RPC桩

pub mod builders;
pub mod mocks;

pub use builders::{ExecutorGroupBuilder, JobDefinitionBuilder, TriggerParamBuilder};
pub use mocks::{RecordedCall, RecordingAdminClient, Scripted, ScriptedClientFactory, ScriptedExecutorClient};

//! 任务处理器与处理器注册表

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use taskmesh_core::{SchedulerError, SchedulerResult};
use tracing::info;

use crate::context::JobContext;

/// 任务处理器
///
/// `execute` 返回 `Ok` 时以上下文中设置的结果为准，未设置视为结果丢失；
/// 返回 `Err` 或发生 panic 时本次执行失败。
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, ctx: &JobContext) -> SchedulerResult<()>;

    /// 任务线程启动时调用
    async fn init(&self) -> SchedulerResult<()> {
        Ok(())
    }

    /// 任务线程退出时调用
    async fn destroy(&self) -> SchedulerResult<()> {
        Ok(())
    }
}

/// 闭包处理器
pub struct FnJobHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnJobHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SchedulerResult<()>> + Send + 'static,
{
    async fn execute(&self, ctx: &JobContext) -> SchedulerResult<()> {
        (self.f)(ctx.clone()).await
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，名称为空或重复时返回错误
    pub fn register(&self, name: &str, handler: Arc<dyn JobHandler>) -> SchedulerResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchedulerError::Validation("任务处理器名称不能为空".to_string()));
        }
        match self.handlers.entry(name.to_string()) {
            Entry::Occupied(_) => Err(SchedulerError::Validation(format!(
                "任务处理器[{name}]命名冲突"
            ))),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                info!("注册任务处理器: {}", name);
                Ok(())
            }
        }
    }

    pub fn register_fn<F, Fut>(&self, name: &str, f: F) -> SchedulerResult<()>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SchedulerResult<()>> + Send + 'static,
    {
        self.register(name, Arc::new(FnJobHandler { f }))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = HandlerRegistry::new();
        registry
            .register_fn("demoJobHandler", |ctx: JobContext| async move {
                ctx.handle_success();
                Ok(())
            })
            .unwrap();

        let err = registry
            .register_fn("demoJobHandler", |_ctx: JobContext| async move { Ok(()) })
            .unwrap_err();
        assert!(err.to_string().contains("命名冲突"));
        assert!(registry.register_fn(" ", |_ctx: JobContext| async move { Ok(()) }).is_err());

        assert!(registry.lookup("demoJobHandler").is_some());
        assert!(registry.lookup("missing").is_none());
        assert_eq!(registry.names(), vec!["demoJobHandler"]);
    }
}

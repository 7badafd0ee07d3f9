//! 内置的示例任务处理器

use std::sync::Arc;

use taskmesh_core::SchedulerResult;
use taskmesh_executor::{HandlerRegistry, JobContext};

/// 注册内置处理器：`demoJobHandler`、`shardingJobHandler`
pub fn builtin_handlers() -> SchedulerResult<Arc<HandlerRegistry>> {
    let handlers = HandlerRegistry::new();

    handlers.register_fn("demoJobHandler", |ctx: JobContext| async move {
        ctx.log(format!(
            "demoJobHandler 执行, jobId={}, param={}",
            ctx.job_id(),
            ctx.job_param().unwrap_or("")
        ))
        .await;
        ctx.handle_success();
        Ok(())
    })?;

    handlers.register_fn("shardingJobHandler", |ctx: JobContext| async move {
        ctx.log(format!(
            "分片参数：当前分片序号 = {}, 总分片数 = {}",
            ctx.shard_index(),
            ctx.shard_total()
        ))
        .await;
        ctx.handle_success_msg(format!("{}/{}", ctx.shard_index(), ctx.shard_total()));
        Ok(())
    })?;

    Ok(Arc::new(handlers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_handlers_registered() {
        let handlers = builtin_handlers().unwrap();
        assert!(handlers.lookup("demoJobHandler").is_some());
        assert!(handlers.lookup("shardingJobHandler").is_some());
        assert_eq!(handlers.len(), 2);
    }
}

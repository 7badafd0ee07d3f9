pub mod bootstrap;
pub mod memory;
pub mod rpc;

pub use bootstrap::BootstrapData;
pub use memory::{
    InMemoryExecutorGroupRepository, InMemoryJobLogRepository, InMemoryJobRepository,
    InMemoryRegistryRepository,
};
pub use rpc::{ExecutorClientPool, HttpAdminClient, HttpExecutorClient};

pub mod entities;
pub mod ports;
pub mod repositories;
pub mod rpc;
pub mod value_objects;

pub use entities::*;
pub use ports::*;
pub use repositories::*;
pub use rpc::*;
pub use taskmesh_core::{SchedulerError, SchedulerResult};
pub use value_objects::*;

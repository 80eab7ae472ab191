//! master 侧控制面
//!
//! [`MasterModel`] 定义对外暴露的操作集合，[`CoordinatedMasterModel`] 在共享的
//! 协调存储之上实现它；[`MasterService`] 负责启动引导与存活登记。

pub mod coordinated;
pub mod history;
pub mod model;
pub mod retry;
pub mod service;

pub use coordinated::CoordinatedMasterModel;
pub use history::merge_events;
pub use model::MasterModel;
pub use retry::RetryPolicy;
pub use service::MasterService;

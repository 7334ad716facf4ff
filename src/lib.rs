//! # Clinic
//!
//! 排班与门诊就诊流程管理的统一入口，重新导出各子模块。

pub use clinic_core as core;
pub use clinic_database as database;
pub use clinic_workflow as workflow;

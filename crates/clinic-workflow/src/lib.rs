//! # Clinic工作流模块
//!
//! 门诊排班与就诊流程的核心逻辑，包括：
//! - 排班重复规则：按不重复、每天、每周、每月生成排班日期
//! - 排班服务：批量创建、修改、删除排班，以及医护离职时的未来排班清理
//! - 门诊状态机：候诊、就诊中、已完成、已取消之间的状态转换
//! - 关联数据补全：按批次查询医生、护士和患者档案并合并到结果中

pub mod enrichment;
pub mod outpatient;
pub mod recurrence;
pub mod schedule;
pub mod state_machine;

// 重新导出主要类型
pub use enrichment::{apply_waiting_counts, Enricher};
pub use outpatient::OutpatientService;
pub use recurrence::{generate, RepeatPolicy};
pub use schedule::ScheduleService;
pub use state_machine::{OutpatientStateMachine, VisitEvent};

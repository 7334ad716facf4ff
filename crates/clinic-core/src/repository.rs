//! 仓储接口
//!
//! 排班与门诊的持久化契约。级联删除必须作为一个整体生效：要么全部删除，要么都不删除。

use crate::error::Result;
use crate::models::{Outpatient, OutpatientStatus, ScheduleWindow, WorkSchedule};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// 排班仓储
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// 批量插入同一批次的排班
    async fn insert_batch(&self, schedules: &[WorkSchedule]) -> Result<()>;

    /// 按ID查询，不存在时返回 `NotFound`
    async fn find_by_id(&self, id: Uuid) -> Result<WorkSchedule>;

    /// 窗口内的全部排班，按日期和开始时间排序
    async fn find_all(&self, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>>;

    async fn find_by_doctor(&self, doctor_id: Uuid, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>>;

    async fn find_by_nurse(&self, nurse_id: Uuid, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>>;

    /// 覆盖医生、护士、日期和起止时间
    async fn update(&self, schedule: &WorkSchedule) -> Result<()>;

    /// 删除排班，连同其门诊和处方
    async fn delete_by_id(&self, id: Uuid) -> Result<()>;

    /// 删除医生在窗口内的排班（级联），返回删除的排班数
    async fn delete_by_doctor(&self, doctor_id: Uuid, window: &ScheduleWindow) -> Result<u64>;

    /// 清空护士在窗口内排班上的引用，返回受影响的排班数
    async fn clear_nurse(&self, nurse_id: Uuid, window: &ScheduleWindow) -> Result<u64>;

    /// 各排班的候诊人数，没有候诊的排班可以不出现在结果中
    async fn count_waiting(&self, schedule_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>>;
}

/// 门诊仓储
#[async_trait]
pub trait OutpatientRepository: Send + Sync {
    async fn insert(&self, outpatient: &Outpatient) -> Result<()>;

    /// 按ID查询（含处方），不存在时返回 `NotFound`
    async fn find_by_id(&self, id: Uuid) -> Result<Outpatient>;

    /// 某个排班下的全部门诊，按创建时间排序
    async fn find_by_schedule(&self, schedule_id: Uuid) -> Result<Vec<Outpatient>>;

    /// 某个患者的全部门诊
    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Outpatient>>;

    /// 只更新主诉，不改变状态
    async fn update_complaint(&self, id: Uuid, complaint: &str, updated_at: DateTime<Utc>) -> Result<()>;

    /// 状态转换：仅当存储中的状态仍为 `expected` 时写入状态和就诊时间，
    /// 否则返回 `Unprocessable`
    async fn update_status(&self, outpatient: &Outpatient, expected: OutpatientStatus) -> Result<()>;

    /// 结束就诊：更新状态与结束时间，并整体替换处方；要求存储中的状态为就诊中
    async fn finish(&self, outpatient: &Outpatient) -> Result<()>;

    /// 删除门诊及其处方，就诊中的门诊返回 `Unprocessable`
    async fn delete_by_id(&self, id: Uuid) -> Result<()>;

    /// 删除患者所有候诊中的门诊，返回删除数
    async fn delete_waiting_by_patient(&self, patient_id: Uuid) -> Result<u64>;
}

//! 核心数据模型定义

use crate::error::{ClinicError, Result};
use crate::utils::parse_date;
use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 可通过ID唯一标识的实体
pub trait Identified {
    fn id(&self) -> Uuid;
}

/// 外键引用
///
/// 仓储层只返回 `Id`，补全层把它替换为目录服务返回的只读快照 `Loaded`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef<T> {
    Loaded(T),
    Id(Uuid),
}

impl<T: Identified> EntityRef<T> {
    pub fn id(&self) -> Uuid {
        match self {
            EntityRef::Loaded(entity) => entity.id(),
            EntityRef::Id(id) => *id,
        }
    }

    /// 已补全的快照
    pub fn loaded(&self) -> Option<&T> {
        match self {
            EntityRef::Loaded(entity) => Some(entity),
            EntityRef::Id(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, EntityRef::Loaded(_))
    }
}

impl<T> From<Uuid> for EntityRef<T> {
    fn from(id: Uuid) -> Self {
        EntityRef::Id(id)
    }
}

/// 医生信息（医生目录的只读快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialty: String, // 专科
    pub room: String,      // 诊室
}

/// 护士信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nurse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// 患者信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub national_id: String, // 身份证号
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
}

impl Identified for Doctor {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for Nurse {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for Patient {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// 医护排班：一名医生和一名护士在某一天的一个班次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub id: Uuid,
    pub group: Uuid, // 同一次创建请求生成的所有排班共享
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub doctor: EntityRef<Doctor>,
    pub nurse: Option<EntityRef<Nurse>>, // 护士被移除后为空
    pub total_waiting: i64,             // 计算得出，不落库
    pub outpatients: Vec<Outpatient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkSchedule {
    pub fn doctor_id(&self) -> Uuid {
        self.doctor.id()
    }

    pub fn nurse_id(&self) -> Option<Uuid> {
        self.nurse.as_ref().map(EntityRef::id)
    }

    /// 班次在给定的本地时间是否已经结束
    pub fn has_elapsed(&self, now: NaiveDateTime) -> bool {
        now > self.date.and_time(self.end_time)
    }
}

/// 门诊状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutpatientStatus {
    Waiting,       // 候诊中
    OnExamination, // 就诊中
    Finished,      // 已完成
    Canceled,      // 已取消
}

impl fmt::Display for OutpatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 门诊就诊记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outpatient {
    pub id: Uuid,
    pub work_schedule_id: Uuid,
    pub patient: EntityRef<Patient>,
    pub complaint: String, // 主诉
    pub status: OutpatientStatus,
    pub start_time: Option<NaiveTime>, // 开始就诊时才设置
    pub end_time: Option<NaiveTime>,   // 结束就诊时才设置
    pub prescriptions: Vec<Prescription>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Outpatient {
    pub fn patient_id(&self) -> Uuid {
        self.patient.id()
    }
}

/// 处方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub outpatient_id: Uuid,
    pub medicine: String,
    pub instruction: String,
    pub created_at: DateTime<Utc>,
}

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Patient => "patient",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "patient" => Ok(Role::Patient),
            other => Err(ClinicError::InvalidArgument(format!("unknown role: {}", other))),
        }
    }
}

/// 已认证的调用者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// 排班查询条件，每个请求单独构造
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleQuery {
    pub start_date: String,
    pub end_date: String,
    pub limit: Option<i64>,
    pub repeat: String, // 仅创建时使用
}

impl ScheduleQuery {
    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_repeat(mut self, repeat: impl Into<String>) -> Self {
        self.repeat = repeat.into();
        self
    }

    /// 解析为仓储层使用的日期窗口
    pub fn window(&self) -> Result<ScheduleWindow> {
        let start = parse_date(&self.start_date)?;
        let end = parse_date(&self.end_date)?;
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(ClinicError::InvalidArgument(format!(
                    "limit must not be negative: {}",
                    limit
                )));
            }
        }
        Ok(ScheduleWindow {
            start,
            end,
            limit: self.limit,
        })
    }
}

/// 闭区间日期窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub limit: Option<i64>,
}

impl ScheduleWindow {
    /// 从今天起一百年，用于“未来所有排班”
    pub fn from_today(today: NaiveDate) -> Self {
        let end = today
            .checked_add_months(Months::new(100 * 12))
            .unwrap_or(NaiveDate::MAX);
        Self {
            start: today,
            end,
            limit: None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// 创建排班请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    pub doctor_id: Uuid,
    pub nurse_id: Uuid,
    pub start_time: String,
    pub end_time: String,
}

/// 修改排班请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEdit {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub nurse_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

/// 挂号请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutpatient {
    pub work_schedule_id: Uuid,
    pub patient_id: Uuid,
    pub complaint: String,
}

/// 处方输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionInput {
    pub medicine: String,
    pub instruction: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor(id: Uuid) -> Doctor {
        Doctor {
            id,
            name: "Dr. Li".into(),
            email: "li@clinic.local".into(),
            phone: "555-0100".into(),
            specialty: "Cardiology".into(),
            room: "A-201".into(),
        }
    }

    #[test]
    fn test_entity_ref_keeps_id() {
        let id = Uuid::new_v4();
        let bare: EntityRef<Doctor> = id.into();
        let loaded = EntityRef::Loaded(doctor(id));

        assert_eq!(bare.id(), id);
        assert_eq!(loaded.id(), id);
        assert!(!bare.is_loaded());
        assert_eq!(loaded.loaded().map(|d| d.room.as_str()), Some("A-201"));
    }

    #[test]
    fn test_entity_ref_serializes_untagged() {
        let id = Uuid::new_v4();
        let bare: EntityRef<Doctor> = EntityRef::Id(id);
        assert_eq!(serde_json::to_value(&bare).unwrap(), serde_json::json!(id.to_string()));

        let loaded = EntityRef::Loaded(doctor(id));
        let value = serde_json::to_value(&loaded).unwrap();
        assert_eq!(value["specialty"], "Cardiology");

        let back: EntityRef<Doctor> = serde_json::from_value(value).unwrap();
        assert!(back.is_loaded());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("nurse".parse::<Role>().unwrap(), Role::Nurse);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_query_window() {
        let window = ScheduleQuery::new("2020-01-01", "2020-01-31")
            .with_limit(10)
            .window()
            .unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(window.limit, Some(10));

        assert!(ScheduleQuery::new("2020-13-01", "2020-01-31").window().is_err());
        assert!(ScheduleQuery::new("2020-01-01", "2020-01-31")
            .with_limit(-1)
            .window()
            .is_err());
    }

    #[test]
    fn test_window_from_today_spans_a_century() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let window = ScheduleWindow::from_today(today);
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2124, 2, 29).unwrap());
        assert!(window.contains(today));
        assert!(!window.contains(today.pred_opt().unwrap()));
    }
}

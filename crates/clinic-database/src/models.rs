//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::models::*;
use clinic_core::{ClinicError, Result};
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 门诊状态的存储形式
pub fn status_to_db(status: OutpatientStatus) -> &'static str {
    match status {
        OutpatientStatus::Waiting => "WAITING",
        OutpatientStatus::OnExamination => "ON_EXAMINATION",
        OutpatientStatus::Finished => "FINISHED",
        OutpatientStatus::Canceled => "CANCELED",
    }
}

pub fn status_from_db(value: &str) -> Result<OutpatientStatus> {
    match value {
        "WAITING" => Ok(OutpatientStatus::Waiting),
        "ON_EXAMINATION" => Ok(OutpatientStatus::OnExamination),
        "FINISHED" => Ok(OutpatientStatus::Finished),
        "CANCELED" => Ok(OutpatientStatus::Canceled),
        other => Err(ClinicError::Database(format!(
            "unknown outpatient status: {}",
            other
        ))),
    }
}

/// 数据库排班表
#[derive(Debug, FromRow)]
pub struct DbWorkSchedule {
    pub id: Uuid,
    pub group_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub doctor_id: Uuid,
    pub nurse_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbWorkSchedule> for WorkSchedule {
    fn from(row: DbWorkSchedule) -> Self {
        WorkSchedule {
            id: row.id,
            group: row.group_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            doctor: EntityRef::Id(row.doctor_id),
            nurse: row.nurse_id.map(EntityRef::Id),
            total_waiting: 0,
            outpatients: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 数据库门诊表
#[derive(Debug, FromRow)]
pub struct DbOutpatient {
    pub id: Uuid,
    pub work_schedule_id: Uuid,
    pub patient_id: Uuid,
    pub complaint: String,
    pub status: String, // 存储为字符串，转换为OutpatientStatus枚举
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbOutpatient> for Outpatient {
    type Error = ClinicError;

    fn try_from(row: DbOutpatient) -> Result<Self> {
        Ok(Outpatient {
            id: row.id,
            work_schedule_id: row.work_schedule_id,
            patient: EntityRef::Id(row.patient_id),
            complaint: row.complaint,
            status: status_from_db(&row.status)?,
            start_time: row.start_time,
            end_time: row.end_time,
            prescriptions: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 数据库处方表
#[derive(Debug, FromRow)]
pub struct DbPrescription {
    pub id: Uuid,
    pub outpatient_id: Uuid,
    pub medicine: String,
    pub instruction: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbPrescription> for Prescription {
    fn from(row: DbPrescription) -> Self {
        Prescription {
            id: row.id,
            outpatient_id: row.outpatient_id,
            medicine: row.medicine,
            instruction: row.instruction,
            created_at: row.created_at,
        }
    }
}

// 目录表模型 - 由各自的管理模块维护，这里只读

#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialty: String,
    pub room: String,
}

impl From<DbDoctor> for Doctor {
    fn from(row: DbDoctor) -> Self {
        Doctor {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            specialty: row.specialty,
            room: row.room,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DbNurse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<DbNurse> for Nurse {
    fn from(row: DbNurse) -> Self {
        Nurse {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub national_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
}

impl From<DbPatient> for Patient {
    fn from(row: DbPatient) -> Self {
        Patient {
            id: row.id,
            national_id: row.national_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            birth_date: row.birth_date,
        }
    }
}

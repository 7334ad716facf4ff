//! 外部目录服务接口
//!
//! 医生、护士、患者的档案由各自的目录服务维护，本系统只按ID查询。

use crate::error::Result;
use crate::models::{Doctor, Nurse, Patient};
use async_trait::async_trait;
use uuid::Uuid;

/// 按ID查询的只读目录
#[async_trait]
pub trait Directory<T>: Send + Sync {
    /// 查询单个实体，不存在时返回 `NotFound`
    async fn find_by_id(&self, id: Uuid) -> Result<T>;

    /// 批量查询，不存在的ID不会出现在结果中
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<T>>;
}

/// 医生目录
pub type DoctorDirectory = dyn Directory<Doctor>;

/// 护士目录
pub type NurseDirectory = dyn Directory<Nurse>;

#[async_trait]
pub trait PatientDirectory: Directory<Patient> {
    /// 按身份证号查询，供患者模块做唯一性校验
    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Patient>>;
}

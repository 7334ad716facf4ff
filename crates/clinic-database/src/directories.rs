//! 基于数据库表的只读目录服务

use crate::connection::DatabasePool;
use crate::models::{DbDoctor, DbNurse, DbPatient};
use async_trait::async_trait;
use clinic_core::{ClinicError, Directory, Doctor, Nurse, Patient, PatientDirectory, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// 医生、护士、患者目录，直接读取各自的档案表
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }
}

#[async_trait]
impl Directory<Doctor> for PgDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Doctor> {
        sqlx::query_as::<_, DbDoctor>("SELECT id, name, email, phone, specialty, room FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Doctor::from)
            .ok_or_else(|| ClinicError::NotFound(format!("doctor {} not found", id)))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, DbDoctor>(
            "SELECT id, name, email, phone, specialty, room FROM doctors WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Doctor::from).collect())
    }
}

#[async_trait]
impl Directory<Nurse> for PgDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Nurse> {
        sqlx::query_as::<_, DbNurse>("SELECT id, name, email, phone FROM nurses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Nurse::from)
            .ok_or_else(|| ClinicError::NotFound(format!("nurse {} not found", id)))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Nurse>> {
        let rows = sqlx::query_as::<_, DbNurse>(
            "SELECT id, name, email, phone FROM nurses WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Nurse::from).collect())
    }
}

const SELECT_PATIENTS: &str = "SELECT id, national_id, name, email, phone, birth_date FROM patients";

#[async_trait]
impl Directory<Patient> for PgDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Patient> {
        sqlx::query_as::<_, DbPatient>(&format!("{} WHERE id = $1", SELECT_PATIENTS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Patient::from)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {} not found", id)))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Patient>> {
        let rows = sqlx::query_as::<_, DbPatient>(&format!("{} WHERE id = ANY($1)", SELECT_PATIENTS))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Patient::from).collect())
    }
}

#[async_trait]
impl PatientDirectory for PgDirectory {
    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, DbPatient>(&format!("{} WHERE national_id = $1", SELECT_PATIENTS))
            .bind(national_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Patient::from))
    }
}

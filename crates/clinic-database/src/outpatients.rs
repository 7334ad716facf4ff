//! 门诊仓储的PostgreSQL实现

use crate::connection::DatabasePool;
use crate::models::{status_to_db, DbOutpatient, DbPrescription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_core::{ClinicError, Outpatient, OutpatientRepository, OutpatientStatus, Prescription, Result};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

const SELECT_OUTPATIENTS: &str = "SELECT id, work_schedule_id, patient_id, complaint, status, \
     start_time, end_time, created_at, updated_at FROM outpatients";

#[derive(Debug, Clone)]
pub struct PgOutpatientRepository {
    pool: PgPool,
}

impl PgOutpatientRepository {
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// 为一批门诊加载处方
    async fn attach_prescriptions(&self, rows: Vec<DbOutpatient>) -> Result<Vec<Outpatient>> {
        let mut outpatients = rows
            .into_iter()
            .map(Outpatient::try_from)
            .collect::<Result<Vec<_>>>()?;
        if outpatients.is_empty() {
            return Ok(outpatients);
        }

        let ids: Vec<Uuid> = outpatients.iter().map(|o| o.id).collect();
        let prescriptions = sqlx::query_as::<_, DbPrescription>(
            "SELECT id, outpatient_id, medicine, instruction, created_at FROM prescriptions \
             WHERE outpatient_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_outpatient: HashMap<Uuid, Vec<Prescription>> = HashMap::new();
        for row in prescriptions {
            by_outpatient
                .entry(row.outpatient_id)
                .or_default()
                .push(Prescription::from(row));
        }
        for outpatient in &mut outpatients {
            if let Some(list) = by_outpatient.remove(&outpatient.id) {
                outpatient.prescriptions = list;
            }
        }

        Ok(outpatients)
    }

    async fn find_where(&self, column: &str, id: Uuid) -> Result<Vec<Outpatient>> {
        let rows = sqlx::query_as::<_, DbOutpatient>(&format!(
            "{} WHERE {} = $1 ORDER BY created_at, id",
            SELECT_OUTPATIENTS, column
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_prescriptions(rows).await
    }
}

/// 条件写入未命中时区分门诊不存在和状态已变化
async fn rejected_write<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    reason: &str,
) -> ClinicError {
    let current: std::result::Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM outpatients WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await;

    match current {
        Ok(Some(status)) => {
            tracing::warn!("Write to outpatient {} rejected in status {}", id, status);
            ClinicError::Unprocessable(format!("outpatient {} {}", id, reason))
        }
        Ok(None) => ClinicError::NotFound(format!("outpatient {} not found", id)),
        Err(e) => ClinicError::from(e),
    }
}

#[async_trait]
impl OutpatientRepository for PgOutpatientRepository {
    async fn insert(&self, outpatient: &Outpatient) -> Result<()> {
        sqlx::query(
            "INSERT INTO outpatients (id, work_schedule_id, patient_id, complaint, status, \
             start_time, end_time, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(outpatient.id)
        .bind(outpatient.work_schedule_id)
        .bind(outpatient.patient_id())
        .bind(&outpatient.complaint)
        .bind(status_to_db(outpatient.status))
        .bind(outpatient.start_time)
        .bind(outpatient.end_time)
        .bind(outpatient.created_at)
        .bind(outpatient.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Outpatient> {
        let row = sqlx::query_as::<_, DbOutpatient>(&format!("{} WHERE id = $1", SELECT_OUTPATIENTS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("outpatient {} not found", id)))?;

        self.attach_prescriptions(vec![row])
            .await?
            .pop()
            .ok_or_else(|| ClinicError::NotFound(format!("outpatient {} not found", id)))
    }

    async fn find_by_schedule(&self, schedule_id: Uuid) -> Result<Vec<Outpatient>> {
        self.find_where("work_schedule_id", schedule_id).await
    }

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Outpatient>> {
        self.find_where("patient_id", patient_id).await
    }

    async fn update_complaint(&self, id: Uuid, complaint: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE outpatients SET complaint = $1, updated_at = $2 WHERE id = $3")
            .bind(complaint)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ClinicError::NotFound(format!("outpatient {} not found", id)));
        }
        Ok(())
    }

    async fn update_status(&self, outpatient: &Outpatient, expected: OutpatientStatus) -> Result<()> {
        // 违反就诊中唯一索引时 sqlx 错误会映射为 Unprocessable
        let result = sqlx::query(
            "UPDATE outpatients SET status = $1, start_time = $2, end_time = $3, updated_at = $4 \
             WHERE id = $5 AND status = $6",
        )
        .bind(status_to_db(outpatient.status))
        .bind(outpatient.start_time)
        .bind(outpatient.end_time)
        .bind(outpatient.updated_at)
        .bind(outpatient.id)
        .bind(status_to_db(expected))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let reason = format!("is no longer {}", expected);
            return Err(rejected_write(&self.pool, outpatient.id, &reason).await);
        }
        Ok(())
    }

    async fn finish(&self, outpatient: &Outpatient) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // 仅当仍在就诊中时才能结束
        let result = sqlx::query(
            "UPDATE outpatients SET status = $1, end_time = $2, updated_at = $3 \
             WHERE id = $4 AND status = $5",
        )
        .bind(status_to_db(outpatient.status))
        .bind(outpatient.end_time)
        .bind(outpatient.updated_at)
        .bind(outpatient.id)
        .bind(status_to_db(OutpatientStatus::OnExamination))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(rejected_write(&mut *tx, outpatient.id, "is not on examination").await);
        }

        sqlx::query("DELETE FROM prescriptions WHERE outpatient_id = $1")
            .bind(outpatient.id)
            .execute(&mut *tx)
            .await?;

        if !outpatient.prescriptions.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO prescriptions (id, outpatient_id, medicine, instruction, created_at) ",
            );
            builder.push_values(&outpatient.prescriptions, |mut row, prescription| {
                row.push_bind(prescription.id)
                    .push_bind(prescription.outpatient_id)
                    .push_bind(prescription.medicine.clone())
                    .push_bind(prescription.instruction.clone())
                    .push_bind(prescription.created_at);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!(
            "Finished outpatient {} with {} prescriptions",
            outpatient.id,
            outpatient.prescriptions.len()
        );
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM prescriptions WHERE outpatient_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM outpatients WHERE id = $1 AND status <> $2")
            .bind(id)
            .bind(status_to_db(OutpatientStatus::OnExamination))
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(rejected_write(&mut *tx, id, "is on examination").await);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_waiting_by_patient(&self, patient_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let waiting = status_to_db(OutpatientStatus::Waiting);

        sqlx::query(
            "DELETE FROM prescriptions WHERE outpatient_id IN \
             (SELECT id FROM outpatients WHERE patient_id = $1 AND status = $2)",
        )
        .bind(patient_id)
        .bind(waiting)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM outpatients WHERE patient_id = $1 AND status = $2")
            .bind(patient_id)
            .bind(waiting)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

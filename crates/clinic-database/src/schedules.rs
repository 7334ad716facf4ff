//! 排班仓储的PostgreSQL实现

use crate::connection::DatabasePool;
use crate::models::DbWorkSchedule;
use async_trait::async_trait;
use clinic_core::{ClinicError, Result, ScheduleRepository, ScheduleWindow, WorkSchedule};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// 每行绑定的参数个数
const SCHEDULE_COLUMNS: usize = 9;

/// PostgreSQL单条语句的绑定参数上限
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// 批量插入时每条语句的行数
const INSERT_CHUNK_ROWS: usize = MAX_BIND_PARAMS / SCHEDULE_COLUMNS;

const SELECT_SCHEDULES: &str = "SELECT id, group_id, date, start_time, end_time, doctor_id, nurse_id, \
     created_at, updated_at FROM work_schedules";

#[derive(Debug, Clone)]
pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// 按过滤条件和窗口查询，`column` 为空时不按人员过滤
    async fn find_in_window(
        &self,
        column: Option<(&str, Uuid)>,
        window: &ScheduleWindow,
    ) -> Result<Vec<WorkSchedule>> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_SCHEDULES);
        builder.push(" WHERE date BETWEEN ");
        builder.push_bind(window.start);
        builder.push(" AND ");
        builder.push_bind(window.end);
        if let Some((column, id)) = column {
            builder.push(format!(" AND {} = ", column));
            builder.push_bind(id);
        }
        builder.push(" ORDER BY date, start_time");
        if let Some(limit) = window.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        let rows = builder
            .build_query_as::<DbWorkSchedule>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Loaded {} schedules between {} and {}", rows.len(), window.start, window.end);
        Ok(rows.into_iter().map(WorkSchedule::from).collect())
    }
}

/// 在事务内删除给定排班下的处方和门诊
async fn delete_schedule_children(
    tx: &mut Transaction<'_, Postgres>,
    schedule_ids: &[Uuid],
) -> Result<()> {
    sqlx::query(
        "DELETE FROM prescriptions WHERE outpatient_id IN \
         (SELECT id FROM outpatients WHERE work_schedule_id = ANY($1))",
    )
    .bind(schedule_ids)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM outpatients WHERE work_schedule_id = ANY($1)")
        .bind(schedule_ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn insert_batch(&self, schedules: &[WorkSchedule]) -> Result<()> {
        if schedules.is_empty() {
            return Ok(());
        }

        // 长周期的批次会超过单条语句的参数上限，分段写入但在同一事务内提交
        let mut tx = self.pool.begin().await?;
        for chunk in schedules.chunks(INSERT_CHUNK_ROWS) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO work_schedules \
                 (id, group_id, date, start_time, end_time, doctor_id, nurse_id, created_at, updated_at) ",
            );
            builder.push_values(chunk, |mut row, schedule| {
                row.push_bind(schedule.id)
                    .push_bind(schedule.group)
                    .push_bind(schedule.date)
                    .push_bind(schedule.start_time)
                    .push_bind(schedule.end_time)
                    .push_bind(schedule.doctor_id())
                    .push_bind(schedule.nurse_id())
                    .push_bind(schedule.created_at)
                    .push_bind(schedule.updated_at);
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::info!("Inserted {} schedules", schedules.len());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<WorkSchedule> {
        let row = sqlx::query_as::<_, DbWorkSchedule>(&format!("{} WHERE id = $1", SELECT_SCHEDULES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(WorkSchedule::from)
            .ok_or_else(|| ClinicError::NotFound(format!("work schedule {} not found", id)))
    }

    async fn find_all(&self, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>> {
        self.find_in_window(None, window).await
    }

    async fn find_by_doctor(&self, doctor_id: Uuid, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>> {
        self.find_in_window(Some(("doctor_id", doctor_id)), window).await
    }

    async fn find_by_nurse(&self, nurse_id: Uuid, window: &ScheduleWindow) -> Result<Vec<WorkSchedule>> {
        self.find_in_window(Some(("nurse_id", nurse_id)), window).await
    }

    async fn update(&self, schedule: &WorkSchedule) -> Result<()> {
        let result = sqlx::query(
            "UPDATE work_schedules SET doctor_id = $1, nurse_id = $2, date = $3, \
             start_time = $4, end_time = $5, updated_at = $6 WHERE id = $7",
        )
        .bind(schedule.doctor_id())
        .bind(schedule.nurse_id())
        .bind(schedule.date)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.updated_at)
        .bind(schedule.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ClinicError::NotFound(format!("work schedule {} not found", schedule.id)));
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        delete_schedule_children(&mut tx, &[id]).await?;
        let result = sqlx::query("DELETE FROM work_schedules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ClinicError::NotFound(format!("work schedule {} not found", id)));
        }

        tx.commit().await?;
        tracing::info!("Deleted work schedule {}", id);
        Ok(())
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid, window: &ScheduleWindow) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = sqlx::query(
            "SELECT id FROM work_schedules WHERE doctor_id = $1 AND date BETWEEN $2 AND $3",
        )
        .bind(doctor_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| row.get("id"))
        .collect();

        delete_schedule_children(&mut tx, &ids).await?;
        let result = sqlx::query("DELETE FROM work_schedules WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn clear_nurse(&self, nurse_id: Uuid, window: &ScheduleWindow) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE work_schedules SET nurse_id = NULL, updated_at = NOW() \
             WHERE nurse_id = $1 AND date BETWEEN $2 AND $3",
        )
        .bind(nurse_id)
        .bind(window.start)
        .bind(window.end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_waiting(&self, schedule_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        if schedule_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT work_schedule_id, COUNT(*) AS total FROM outpatients \
             WHERE work_schedule_id = ANY($1) AND status = 'WAITING' \
             GROUP BY work_schedule_id",
        )
        .bind(schedule_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let schedule_id: Uuid = row.get("work_schedule_id");
                let total: i64 = row.get("total");
                (schedule_id, total)
            })
            .collect())
    }
}
